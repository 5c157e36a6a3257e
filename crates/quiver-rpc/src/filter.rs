//! The filter capability and the invoker chain built from it.
//!
//! Filters are the cross-cutting seam of the invocation layer: each one
//! sees the invocation and the `next` invoker and chooses to delegate,
//! short-circuit, or annotate. The chain is composed right to left so the
//! first activated filter is the outermost.

use std::sync::Arc;

use quiver_core::ServiceUrl;
use quiver_extension::{ExtensionContext, Extensible};

use crate::error::RpcError;
use crate::invocation::{Invocation, RpcResult};
use crate::invoker::Invoker;

/// A cross-cutting interceptor around invokers.
pub trait Filter: Send + Sync {
    /// Handle one call, normally by delegating to `next`.
    fn invoke(&self, next: &dyn Invoker, invocation: &Invocation) -> Result<RpcResult, RpcError>;
}

impl Extensible for dyn Filter {
    const CAPABILITY: &'static str = "filter";
    const INTERFACE: &'static str = "Filter";
}

/// One link of a filter chain.
///
/// Delegates `invoke` through its filter, and everything else - interface,
/// URL, availability, destruction - straight to the original terminal
/// invoker, so lifecycle calls on the chain head act on the endpoint, not
/// on intermediate links.
struct FilterInvoker {
    filter: Arc<dyn Filter>,
    next: Arc<dyn Invoker>,
    original: Arc<dyn Invoker>,
}

impl Invoker for FilterInvoker {
    fn interface(&self) -> &str {
        self.original.interface()
    }

    fn url(&self) -> &ServiceUrl {
        self.original.url()
    }

    fn invoke(&self, invocation: &Invocation) -> Result<RpcResult, RpcError> {
        self.filter.invoke(self.next.as_ref(), invocation)
    }

    fn is_available(&self) -> bool {
        self.original.is_available()
    }

    fn destroy(&self) {
        self.original.destroy()
    }
}

/// Wrap `invoker` in the filters active for its URL.
///
/// `key` is the URL parameter listing explicitly requested filter names
/// and `group` the activation group (`provider` when exporting,
/// `consumer` when referring). No active filters returns `invoker`
/// untouched.
pub fn build_invoker_chain(
    context: &Arc<ExtensionContext>,
    invoker: Arc<dyn Invoker>,
    key: &str,
    group: &str,
) -> Result<Arc<dyn Invoker>, RpcError> {
    let registry = context.registry::<dyn Filter>()?;
    let filters = registry.activate_by_key(invoker.url(), key, Some(group))?;
    if filters.is_empty() {
        return Ok(invoker);
    }
    tracing::debug!(
        interface = invoker.interface(),
        filters = filters.len(),
        group,
        "building filter chain"
    );
    let original = invoker.clone();
    let mut chain = invoker;
    for filter in filters.into_iter().rev() {
        chain = Arc::new(FilterInvoker {
            filter,
            next: chain,
            original: original.clone(),
        });
    }
    Ok(chain)
}
