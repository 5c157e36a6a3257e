//! Error taxonomy for the extension registry.
//!
//! Errors are `Clone` because adaptive-instance failures and descriptor
//! failures are cached: the same error is handed back verbatim on every
//! retry, so callers can tell a repeated failure from a fresh one.

/// Everything that can go wrong while installing, loading, or instantiating
/// extensions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtensionError {
    /// The descriptor set or the catalog is malformed; nothing for this
    /// capability will load until it is fixed.
    #[error("capability `{capability}`: {message}")]
    Config {
        /// Capability identifier (e.g. `filter`).
        capability: &'static str,
        /// What is wrong.
        message: String,
    },

    /// No extension is bound to the requested name. `causes` carries any
    /// per-line descriptor failures recorded during loading, since a bad
    /// line is the most common reason a name is missing.
    #[error("no extension named `{name}` for capability `{capability}`{causes}")]
    NotFound {
        /// Capability identifier.
        capability: &'static str,
        /// The name that was asked for.
        name: String,
        /// Pre-rendered diagnostic suffix, possibly empty.
        causes: String,
    },

    /// An extension's factory refused to produce an instance.
    #[error("capability `{capability}`: extension `{name}` failed to instantiate: {message}")]
    Instantiation {
        /// Capability identifier.
        capability: &'static str,
        /// Extension name or provider type.
        name: String,
        /// Factory diagnostic.
        message: String,
    },

    /// The adaptive instance could not be produced. Cached: subsequent
    /// requests for the adaptive instance return this same error.
    #[error("capability `{capability}`: cannot create adaptive instance: {message}")]
    AdaptiveGeneration {
        /// Capability identifier.
        capability: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Adaptive dispatch found no extension name: none of the capability's
    /// adaptive keys is set on the URL and there is no default name.
    #[error(
        "capability `{capability}`: no extension name on url `{url}` \
         (looked at keys {keys:?}) and no default is declared"
    )]
    NameUnresolved {
        /// Capability identifier.
        capability: &'static str,
        /// The URL that was consulted, rendered.
        url: String,
        /// The adaptive keys that were checked, in order.
        keys: &'static [&'static str],
    },

    /// The owning [`ExtensionContext`](crate::ExtensionContext) was dropped
    /// while a registry, stub, or wrapper still held a weak handle to it.
    #[error("extension context has been dropped")]
    ContextDropped,
}

impl ExtensionError {
    /// Shorthand for a [`ExtensionError::Config`].
    pub fn config(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            capability,
            message: message.into(),
        }
    }

    /// Shorthand for an [`ExtensionError::Instantiation`].
    pub fn instantiation(
        capability: &'static str,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Instantiation {
            capability,
            name: name.into(),
            message: message.into(),
        }
    }
}
