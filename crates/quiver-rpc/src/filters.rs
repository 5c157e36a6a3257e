//! Builtin filters.

use quiver_extension::ActivateMeta;

use crate::error::RpcError;
use crate::filter::Filter;
use crate::invocation::{Invocation, RpcResult};
use crate::invoker::Invoker;

/// Method name the echo filter intercepts.
pub const ECHO_METHOD: &str = "$echo";

/// Liveness probe: answers `$echo` calls with their first argument
/// without touching the service. Auto-activates on every provider.
#[derive(Debug, Default)]
pub struct EchoFilter;

impl EchoFilter {
    /// Activation: provider side, ahead of user filters.
    pub const ACTIVATE: ActivateMeta = ActivateMeta::new()
        .with_groups(&[crate::constants::PROVIDER_GROUP])
        .with_order(-110);
}

impl Filter for EchoFilter {
    fn invoke(&self, next: &dyn Invoker, invocation: &Invocation) -> Result<RpcResult, RpcError> {
        if invocation.method() == ECHO_METHOD {
            return Ok(RpcResult::new(invocation.arguments().first().cloned()));
        }
        next.invoke(invocation)
    }
}

/// Logs one line per call. Auto-activates on providers whose URL carries
/// an `accesslog` parameter.
#[derive(Debug, Default)]
pub struct AccessLogFilter;

impl AccessLogFilter {
    /// Activation: provider side, only when `accesslog` is configured.
    pub const ACTIVATE: ActivateMeta = ActivateMeta::new()
        .with_groups(&[crate::constants::PROVIDER_GROUP])
        .with_conditions(&[crate::constants::ACCESS_LOG_KEY]);
}

impl Filter for AccessLogFilter {
    fn invoke(&self, next: &dyn Invoker, invocation: &Invocation) -> Result<RpcResult, RpcError> {
        tracing::info!(
            target: "quiver::accesslog",
            interface = next.interface(),
            method = invocation.method(),
            arguments = invocation.arguments().len(),
            "access"
        );
        next.invoke(invocation)
    }
}
