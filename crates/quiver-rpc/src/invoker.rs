//! The two lifecycle-bearing objects of the invocation layer.

use std::fmt;
use std::sync::Arc;

use quiver_core::ServiceUrl;

use crate::error::RpcError;
use crate::invocation::{Invocation, RpcResult};

/// A callable unit: one service endpoint, local or remote.
pub trait Invoker: Send + Sync {
    /// Service interface name this invoker serves.
    fn interface(&self) -> &str;

    /// The URL this invoker was built from.
    fn url(&self) -> &ServiceUrl;

    /// Perform one call.
    fn invoke(&self, invocation: &Invocation) -> Result<RpcResult, RpcError>;

    /// Whether calls are currently expected to succeed.
    fn is_available(&self) -> bool;

    /// Release resources. Further calls fail; calling this twice is fine.
    fn destroy(&self);
}

/// A published invoker: the handle a protocol returns from `export`.
pub trait Exporter: Send + Sync {
    /// The invoker that was exported.
    fn invoker(&self) -> Arc<dyn Invoker>;

    /// Withdraw the service. Idempotent, and must not fail even after a
    /// partially failed export.
    fn unexport(&self);
}

impl fmt::Debug for dyn Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("interface", &self.invoker().interface())
            .finish_non_exhaustive()
    }
}
