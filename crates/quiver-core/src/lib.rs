//! # Quiver Core
//!
//! Foundation types shared by every Quiver crate:
//!
//! - [`ServiceUrl`] - the immutable configuration carrier read by adaptive
//!   dispatch, activation filtering, and pool sizing
//! - [`logging`] - one-shot `tracing` subscriber bootstrap
//!
//! Quiver's core never constructs or mutates a [`ServiceUrl`] on behalf of a
//! caller; the URL is supplied entirely by the embedding application and
//! flows through the runtime by reference.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod logging;
mod url;

pub use crate::url::{ServiceUrl, UrlError};
