//! # Quiver Extension
//!
//! The extension registry at the heart of the Quiver runtime. Every
//! pluggable seam - protocols, filters, listeners, thread pools, the
//! dependency resolver itself - is a *capability*: a trait object type
//! implementing [`Extensible`], whose implementations are registered in a
//! [`ProviderCatalog`], named by descriptor text, and served by an
//! [`ExtensionRegistry`].
//!
//! ## Shape of the crate
//!
//! - [`ExtensionContext`] - explicit root object; owns resources,
//!   catalogs, and registries. No global state.
//! - [`LayeredResources`] - descriptor text in three merge layers
//!   (internal, user, legacy).
//! - [`ExtensionRegistry`] - per-capability cache: named instances,
//!   shared raw instances, decorators, the adaptive instance, and
//!   activation filtering.
//! - [`DependencyResolver`] / [`StaticResolver`] - best-effort typed
//!   injection into provider factories.
//!
//! ## A capability in five lines
//!
//! ```ignore
//! impl Extensible for dyn Compressor {
//!     const CAPABILITY: &'static str = "compressor";
//!     const INTERFACE: &'static str = "Compressor";
//!     const DEFAULT_NAME: Option<&'static str> = Some("gzip");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod activate;
mod catalog;
mod context;
mod descriptor;
mod error;
mod extensible;
mod registry;
mod resolver;
mod resources;

pub use crate::activate::{DEFAULT_TOKEN, EXCLUDE_PREFIX};
pub use crate::catalog::{ActivateMeta, InjectionSite, ProviderCatalog};
pub use crate::context::ExtensionContext;
pub use crate::error::ExtensionError;
pub use crate::extensible::Extensible;
pub use crate::registry::{DEFAULT_ALIAS, ExtensionRegistry};
pub use crate::resolver::{DependencyResolver, StaticResolver};
pub use crate::resources::{LayeredResources, ResourceLayer};
