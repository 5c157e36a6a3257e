//! # Quiver RPC
//!
//! The invocation layer: callable units ([`Invoker`]), their publication
//! lifecycle ([`Exporter`]), cross-cutting [`Filter`] chains, lifecycle
//! listeners, and the [`Protocol`] capability that ties them together.
//!
//! Protocols, filters, and listeners are all extension capabilities; the
//! decorator stack registered by [`bootstrap::install_defaults`] gives
//! every named protocol instance filter and listener behavior:
//!
//! ```text
//! FilterProtocolWrapper -> ListenerProtocolWrapper -> InjvmProtocol
//! ```
//!
//! A typical embedding:
//!
//! ```ignore
//! let context = ExtensionContext::new();
//! bootstrap::install_defaults(&context)?;
//! let protocols = context.registry::<dyn Protocol>()?;
//! let exporter = protocols.adaptive()?.export(my_invoker)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod constants;
mod error;
mod filter;
mod filters;
mod injvm;
mod invocation;
mod invoker;
mod listener;
mod protocol;
mod wrapper;

pub use crate::error::RpcError;
pub use crate::filter::{Filter, build_invoker_chain};
pub use crate::filters::{AccessLogFilter, ECHO_METHOD, EchoFilter};
pub use crate::injvm::InjvmProtocol;
pub use crate::invocation::{Invocation, RpcResult};
pub use crate::invoker::{Exporter, Invoker};
pub use crate::listener::{
    ExporterListener, InvokerListener, ListenerExporterWrapper, ListenerInvokerWrapper,
};
pub use crate::protocol::Protocol;
pub use crate::wrapper::{FilterProtocolWrapper, ListenerProtocolWrapper};
