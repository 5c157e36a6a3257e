//! Errors surfaced by the invocation layer.

use quiver_extension::ExtensionError;

/// Everything the invocation layer can fail with.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// An extension lookup failed underneath a protocol or chain builder.
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// A lifecycle listener callback failed. Raised by the listener
    /// wrappers only after every listener has been notified.
    #[error("lifecycle listener failed: {0}")]
    Listener(String),

    /// Nothing is exported under the requested service key.
    #[error("no provider is exported under service key `{service}`")]
    NoProvider {
        /// The service key that was looked up.
        service: String,
    },

    /// The invoker was destroyed before this call.
    #[error("invoker for `{interface}` has been destroyed")]
    Destroyed {
        /// Service interface of the dead invoker.
        interface: String,
    },
}
