//! The protocol capability and its adaptive dispatch stub.

use std::sync::{Arc, Weak};

use quiver_core::ServiceUrl;
use quiver_extension::{ExtensionError, ExtensionRegistry, Extensible};

use crate::error::RpcError;
use crate::invoker::{Exporter, Invoker};

/// Publishes and consumes services for one transport scheme.
pub trait Protocol: Send + Sync {
    /// Publish `invoker`; the returned exporter withdraws it.
    fn export(&self, invoker: Arc<dyn Invoker>) -> Result<Arc<dyn Exporter>, RpcError>;

    /// Obtain an invoker for the service addressed by `url`.
    fn refer(&self, interface: &str, url: &ServiceUrl) -> Result<Arc<dyn Invoker>, RpcError>;

    /// Tear down every service this protocol instance exported.
    fn destroy(&self);
}

impl Extensible for dyn Protocol {
    const CAPABILITY: &'static str = "protocol";
    const INTERFACE: &'static str = "Protocol";
    const DEFAULT_NAME: Option<&'static str> = Some("injvm");
    const ADAPTIVE_KEYS: &'static [&'static str] = &["protocol"];

    fn synthesize_adaptive(registry: &Arc<ExtensionRegistry<Self>>) -> Option<Arc<Self>> {
        Some(Arc::new(AdaptiveProtocol {
            registry: Arc::downgrade(registry),
        }))
    }
}

/// Dispatch stub: reads the protocol name off each URL and delegates to
/// the extension of that name.
struct AdaptiveProtocol {
    registry: Weak<ExtensionRegistry<dyn Protocol>>,
}

impl AdaptiveProtocol {
    fn target(&self, url: &ServiceUrl) -> Result<Arc<dyn Protocol>, RpcError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(ExtensionError::ContextDropped)?;
        let name = registry.resolve_adaptive_name(url)?;
        Ok(registry.get(&name)?)
    }
}

impl Protocol for AdaptiveProtocol {
    fn export(&self, invoker: Arc<dyn Invoker>) -> Result<Arc<dyn Exporter>, RpcError> {
        self.target(invoker.url())?.export(invoker)
    }

    fn refer(&self, interface: &str, url: &ServiceUrl) -> Result<Arc<dyn Invoker>, RpcError> {
        self.target(url)?.refer(interface, url)
    }

    fn destroy(&self) {
        // Not URL-dispatchable: the stub owns no instances to tear down.
        tracing::warn!("destroy() called on the adaptive protocol stub; ignored");
    }
}
