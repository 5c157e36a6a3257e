//! Default wiring: the catalogs and descriptor text for the builtin
//! protocol, filter, and listener capabilities.
//!
//! [`install_defaults`] is the one-call setup for the common case. An
//! application adding its own providers builds on the catalog functions
//! instead: extend the returned catalog, concatenate its descriptor lines
//! with the builtin text, and install the result itself.

use std::sync::Arc;

use quiver_extension::{ExtensionContext, ExtensionError, ProviderCatalog};

use crate::filter::Filter;
use crate::filters::{AccessLogFilter, EchoFilter};
use crate::injvm::InjvmProtocol;
use crate::listener::{ExporterListener, InvokerListener};
use crate::protocol::Protocol;
use crate::wrapper::{FilterProtocolWrapper, ListenerProtocolWrapper};

/// Builtin descriptor text for the `protocol` capability.
///
/// The wrappers are decorators; their order here nests the listener
/// wrapper inside the filter wrapper, so an export builds the filter
/// chain first and the listener wrapper sees the chained invoker's
/// exporter.
pub const PROTOCOL_DESCRIPTORS: &str = "\
injvm=quiver_rpc::InjvmProtocol
quiver_rpc::ListenerProtocolWrapper
quiver_rpc::FilterProtocolWrapper
";

/// Builtin descriptor text for the `filter` capability. The access log
/// line is deliberately bare: its name derives to `accesslog`.
pub const FILTER_DESCRIPTORS: &str = "\
echo=quiver_rpc::EchoFilter
quiver_rpc::AccessLogFilter
";

/// Catalog holding the builtin protocol providers and wrappers.
pub fn protocol_catalog() -> ProviderCatalog<dyn Protocol> {
    let mut catalog = ProviderCatalog::<dyn Protocol>::new();
    catalog.plain("quiver_rpc::InjvmProtocol", |_| {
        Ok(Arc::new(InjvmProtocol::new()))
    });
    catalog.decorator("quiver_rpc::ListenerProtocolWrapper", |inner, site| {
        Ok(Arc::new(ListenerProtocolWrapper::new(
            inner,
            site.context_handle(),
        )))
    });
    catalog.decorator("quiver_rpc::FilterProtocolWrapper", |inner, site| {
        Ok(Arc::new(FilterProtocolWrapper::new(
            inner,
            site.context_handle(),
        )))
    });
    catalog
}

/// Catalog holding the builtin filters.
pub fn filter_catalog() -> ProviderCatalog<dyn Filter> {
    let mut catalog = ProviderCatalog::<dyn Filter>::new();
    catalog.activate("quiver_rpc::EchoFilter", EchoFilter::ACTIVATE, |_| {
        Ok(Arc::new(EchoFilter))
    });
    catalog.activate(
        "quiver_rpc::AccessLogFilter",
        AccessLogFilter::ACTIVATE,
        |_| Ok(Arc::new(AccessLogFilter)),
    );
    catalog
}

/// Install the four invocation-layer capabilities with their builtin
/// providers. The listener capabilities start empty; register listener
/// providers yourself instead of calling this if you need them.
pub fn install_defaults(context: &Arc<ExtensionContext>) -> Result<(), ExtensionError> {
    context.install(protocol_catalog(), PROTOCOL_DESCRIPTORS)?;
    context.install(filter_catalog(), FILTER_DESCRIPTORS)?;
    context.install(ProviderCatalog::<dyn ExporterListener>::new(), "")?;
    context.install(ProviderCatalog::<dyn InvokerListener>::new(), "")?;
    Ok(())
}
