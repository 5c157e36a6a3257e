//! URL parameter keys and group names read by the protocol wrappers.

/// Comma-separated filter names applied around an exported service.
pub const SERVICE_FILTER_KEY: &str = "service.filter";

/// Comma-separated filter names applied around a referred service.
pub const REFERENCE_FILTER_KEY: &str = "reference.filter";

/// Comma-separated exporter listener names notified on export/unexport.
pub const EXPORTER_LISTENER_KEY: &str = "exporter.listener";

/// Comma-separated invoker listener names notified on refer/destroy.
pub const INVOKER_LISTENER_KEY: &str = "invoker.listener";

/// Activation group for the providing (exporting) side.
pub const PROVIDER_GROUP: &str = "provider";

/// Activation group for the consuming (referring) side.
pub const CONSUMER_GROUP: &str = "consumer";

/// Protocol name that bypasses filter and listener wrapping entirely;
/// registry traffic is not service traffic.
pub const REGISTRY_PROTOCOL: &str = "registry";

/// Parameter key whose presence activates the access log filter.
pub const ACCESS_LOG_KEY: &str = "accesslog";
