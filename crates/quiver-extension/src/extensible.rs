//! The [`Extensible`] marker trait: what a trait object must declare to be
//! managed by an [`ExtensionRegistry`](crate::ExtensionRegistry).

use std::sync::Arc;

use crate::registry::ExtensionRegistry;

/// Declares a capability: a trait object type whose implementations are
/// named, loaded, decorated, and dispatched by the registry.
///
/// Implemented on the *object* type, e.g.:
///
/// ```ignore
/// impl Extensible for dyn Filter {
///     const CAPABILITY: &'static str = "filter";
///     const INTERFACE: &'static str = "Filter";
/// }
/// ```
///
/// `CAPABILITY` is the descriptor resource id; `INTERFACE` is the suffix
/// stripped when deriving a name from a bare provider type in a legacy
/// descriptor line (`quiver_rpc::EchoFilter` minus `Filter` gives `echo`).
///
/// Registries are shared across threads, so the capability object type
/// must be `Send + Sync`; for a trait object that means declaring both as
/// supertraits of the capability trait.
pub trait Extensible: Send + Sync + 'static {
    /// Stable capability identifier; names the descriptor resource.
    const CAPABILITY: &'static str;

    /// Simple interface name, stripped when deriving legacy extension names.
    const INTERFACE: &'static str;

    /// Name used when a caller asks for `"true"` or adaptive dispatch finds
    /// no name on the URL. `None` means the capability has no default.
    const DEFAULT_NAME: Option<&'static str> = None;

    /// URL parameter keys consulted, in order, by adaptive dispatch. The
    /// key `"protocol"` is special-cased to read the URL's protocol rather
    /// than a parameter.
    const ADAPTIVE_KEYS: &'static [&'static str] = &[];

    /// Produce the capability's hand-written adaptive stub, if it has one.
    ///
    /// Called only when no descriptor line names an adaptive provider. The
    /// stub should hold a [`Weak`](std::sync::Weak) handle derived from
    /// `registry`, not the `Arc` itself, so a cached adaptive instance does
    /// not keep its own registry alive.
    fn synthesize_adaptive(registry: &Arc<ExtensionRegistry<Self>>) -> Option<Arc<Self>> {
        let _ = registry;
        None
    }
}
