//! Protocol decorators: filter chains and listener notification.
//!
//! Both wrappers are registered as decorators of the `protocol`
//! capability, so every named protocol instance comes wrapped. Both skip
//! `registry://` URLs: registry traffic carries service metadata, not
//! service calls.

use std::fmt;
use std::sync::{Arc, Weak};

use quiver_core::ServiceUrl;
use quiver_extension::{ExtensionContext, ExtensionError};

use crate::constants::{
    CONSUMER_GROUP, EXPORTER_LISTENER_KEY, INVOKER_LISTENER_KEY, PROVIDER_GROUP,
    REFERENCE_FILTER_KEY, REGISTRY_PROTOCOL, SERVICE_FILTER_KEY,
};
use crate::error::RpcError;
use crate::filter::build_invoker_chain;
use crate::invoker::{Exporter, Invoker};
use crate::listener::{
    ExporterListener, InvokerListener, ListenerExporterWrapper, ListenerInvokerWrapper,
};
use crate::protocol::Protocol;

fn is_registry(url: &ServiceUrl) -> bool {
    url.protocol() == REGISTRY_PROTOCOL
}

/// Wraps a protocol so exported and referred invokers carry their active
/// filter chains.
pub struct FilterProtocolWrapper {
    inner: Arc<dyn Protocol>,
    context: Weak<ExtensionContext>,
}

impl FilterProtocolWrapper {
    /// Decorate `inner`. `context` is the context whose filter registry
    /// supplies the chains.
    pub fn new(inner: Arc<dyn Protocol>, context: Weak<ExtensionContext>) -> Self {
        Self { inner, context }
    }

    fn context(&self) -> Result<Arc<ExtensionContext>, RpcError> {
        Ok(self.context.upgrade().ok_or(ExtensionError::ContextDropped)?)
    }
}

impl Protocol for FilterProtocolWrapper {
    fn export(&self, invoker: Arc<dyn Invoker>) -> Result<Arc<dyn Exporter>, RpcError> {
        if is_registry(invoker.url()) {
            return self.inner.export(invoker);
        }
        let chained = build_invoker_chain(
            &self.context()?,
            invoker,
            SERVICE_FILTER_KEY,
            PROVIDER_GROUP,
        )?;
        self.inner.export(chained)
    }

    fn refer(&self, interface: &str, url: &ServiceUrl) -> Result<Arc<dyn Invoker>, RpcError> {
        if is_registry(url) {
            return self.inner.refer(interface, url);
        }
        let invoker = self.inner.refer(interface, url)?;
        build_invoker_chain(
            &self.context()?,
            invoker,
            REFERENCE_FILTER_KEY,
            CONSUMER_GROUP,
        )
    }

    fn destroy(&self) {
        self.inner.destroy()
    }
}

/// Wraps a protocol so lifecycle listeners hear about every export and
/// refer.
pub struct ListenerProtocolWrapper {
    inner: Arc<dyn Protocol>,
    context: Weak<ExtensionContext>,
}

impl ListenerProtocolWrapper {
    /// Decorate `inner`. `context` supplies the listener registries.
    pub fn new(inner: Arc<dyn Protocol>, context: Weak<ExtensionContext>) -> Self {
        Self { inner, context }
    }

    fn context(&self) -> Result<Arc<ExtensionContext>, RpcError> {
        Ok(self.context.upgrade().ok_or(ExtensionError::ContextDropped)?)
    }
}

impl Protocol for ListenerProtocolWrapper {
    fn export(&self, invoker: Arc<dyn Invoker>) -> Result<Arc<dyn Exporter>, RpcError> {
        if is_registry(invoker.url()) {
            return self.inner.export(invoker);
        }
        let url = invoker.url().clone();
        let exporter = self.inner.export(invoker)?;
        let listeners: Vec<Arc<dyn ExporterListener>> = self
            .context()?
            .registry::<dyn ExporterListener>()?
            .activate_by_key(&url, EXPORTER_LISTENER_KEY, None)?;
        ListenerExporterWrapper::attach(exporter, listeners)
    }

    fn refer(&self, interface: &str, url: &ServiceUrl) -> Result<Arc<dyn Invoker>, RpcError> {
        if is_registry(url) {
            return self.inner.refer(interface, url);
        }
        let invoker = self.inner.refer(interface, url)?;
        let listeners: Vec<Arc<dyn InvokerListener>> = self
            .context()?
            .registry::<dyn InvokerListener>()?
            .activate_by_key(url, INVOKER_LISTENER_KEY, None)?;
        ListenerInvokerWrapper::attach(invoker, listeners)
    }

    fn destroy(&self) {
        self.inner.destroy()
    }
}

impl fmt::Debug for FilterProtocolWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterProtocolWrapper").finish_non_exhaustive()
    }
}

impl fmt::Debug for ListenerProtocolWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerProtocolWrapper").finish_non_exhaustive()
    }
}
