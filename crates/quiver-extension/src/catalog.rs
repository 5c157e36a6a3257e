//! Provider catalogs: the compile-time half of the registry.
//!
//! A descriptor line binds a *name* to a *provider type*; the catalog is
//! where those provider types are registered, each with a factory closure
//! and a role (plain, decorator, or adaptive). Registration order of
//! decorators is irrelevant here - decorator application order is the
//! order their types first appear across descriptor lines.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::context::ExtensionContext;
use crate::error::ExtensionError;
use crate::extensible::Extensible;
use crate::resolver::DependencyResolver;

/// Activation metadata carried by a plain provider.
///
/// All fields are `'static` so the whole struct is `Copy` and can be built
/// in a `const` context:
///
/// ```ignore
/// ActivateMeta::new().with_groups(&["provider"]).with_order(-100)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ActivateMeta {
    /// Groups in which the extension auto-activates. Empty means all.
    pub groups: &'static [&'static str],
    /// URL parameter keys that must be present (with a non-empty value,
    /// matching the key exactly or any `prefix.key`). Empty means
    /// unconditional.
    pub conditions: &'static [&'static str],
    /// Sort order among auto-activated extensions; lower runs earlier.
    pub order: i32,
}

impl ActivateMeta {
    /// Unconditional activation in every group, order 0.
    pub const fn new() -> Self {
        Self {
            groups: &[],
            conditions: &[],
            order: 0,
        }
    }

    /// Restrict activation to `groups`.
    pub const fn with_groups(mut self, groups: &'static [&'static str]) -> Self {
        self.groups = groups;
        self
    }

    /// Require one of `conditions` to appear as a URL parameter key.
    pub const fn with_conditions(mut self, conditions: &'static [&'static str]) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the sort order.
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Default for ActivateMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Context handed to provider factories at construction time.
///
/// Gives a factory access to the owning [`ExtensionContext`] (for looking
/// up sibling capabilities) and to dependency resolution.
pub struct InjectionSite<'a> {
    capability: &'static str,
    context: &'a Weak<ExtensionContext>,
    resolver: Option<&'a Arc<dyn DependencyResolver>>,
}

impl<'a> InjectionSite<'a> {
    pub(crate) fn new(
        capability: &'static str,
        context: &'a Weak<ExtensionContext>,
        resolver: Option<&'a Arc<dyn DependencyResolver>>,
    ) -> Self {
        Self {
            capability,
            context,
            resolver,
        }
    }

    /// Capability the instance under construction belongs to.
    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// The owning context, if it is still alive.
    pub fn context(&self) -> Result<Arc<ExtensionContext>, ExtensionError> {
        self.context.upgrade().ok_or(ExtensionError::ContextDropped)
    }

    /// A weak handle to the owning context, for factories that build
    /// long-lived instances which must not keep the context alive.
    pub fn context_handle(&self) -> Weak<ExtensionContext> {
        self.context.clone()
    }

    /// Resolve a typed dependency for the property named `property`.
    ///
    /// Injection is best-effort: an unresolvable or wrongly-typed
    /// dependency is logged and yields `None`, it never fails the
    /// instantiation.
    pub fn resolve<D>(&self, property: &str) -> Option<Arc<D>>
    where
        D: Send + Sync + 'static,
    {
        let resolver = self.resolver?;
        let type_name = std::any::type_name::<D>();
        let value = resolver.resolve(TypeId::of::<D>(), type_name, property)?;
        match value.downcast::<D>() {
            Ok(typed) => Some(typed),
            Err(_) => {
                tracing::warn!(
                    capability = self.capability,
                    property,
                    type_name,
                    "resolved dependency has the wrong type; skipping injection"
                );
                None
            }
        }
    }
}

impl fmt::Debug for InjectionSite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionSite")
            .field("capability", &self.capability)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

type PlainFactory<T> =
    Box<dyn Fn(&InjectionSite<'_>) -> Result<Arc<T>, ExtensionError> + Send + Sync>;
type DecoratorFactory<T> =
    Box<dyn Fn(Arc<T>, &InjectionSite<'_>) -> Result<Arc<T>, ExtensionError> + Send + Sync>;

pub(crate) enum Provider<T: ?Sized> {
    Plain {
        construct: PlainFactory<T>,
        activate: Option<ActivateMeta>,
    },
    Decorator {
        wrap: DecoratorFactory<T>,
    },
    Adaptive {
        construct: PlainFactory<T>,
    },
}

impl<T: ?Sized> Provider<T> {
    fn role(&self) -> &'static str {
        match self {
            Provider::Plain { .. } => "plain",
            Provider::Decorator { .. } => "decorator",
            Provider::Adaptive { .. } => "adaptive",
        }
    }
}

/// All provider types registered for one capability, keyed by the type
/// token that descriptor lines refer to.
pub struct ProviderCatalog<T: Extensible + ?Sized> {
    providers: HashMap<&'static str, Provider<T>>,
}

impl<T: Extensible + ?Sized> ProviderCatalog<T> {
    /// Empty catalog.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a plain provider.
    ///
    /// `type_name` is the token descriptor lines use to refer to it,
    /// conventionally the provider's Rust path (`quiver_rpc::EchoFilter`).
    /// Re-registering a token replaces the previous provider.
    pub fn plain<F>(&mut self, type_name: &'static str, construct: F) -> &mut Self
    where
        F: Fn(&InjectionSite<'_>) -> Result<Arc<T>, ExtensionError> + Send + Sync + 'static,
    {
        self.insert(
            type_name,
            Provider::Plain {
                construct: Box::new(construct),
                activate: None,
            },
        )
    }

    /// Register a plain provider that auto-activates per `meta`.
    pub fn activate<F>(&mut self, type_name: &'static str, meta: ActivateMeta, construct: F) -> &mut Self
    where
        F: Fn(&InjectionSite<'_>) -> Result<Arc<T>, ExtensionError> + Send + Sync + 'static,
    {
        self.insert(
            type_name,
            Provider::Plain {
                construct: Box::new(construct),
                activate: Some(meta),
            },
        )
    }

    /// Register a decorator: it wraps every plain instance of this
    /// capability, in the order decorator types first appear across
    /// descriptor lines.
    pub fn decorator<F>(&mut self, type_name: &'static str, wrap: F) -> &mut Self
    where
        F: Fn(Arc<T>, &InjectionSite<'_>) -> Result<Arc<T>, ExtensionError> + Send + Sync + 'static,
    {
        self.insert(
            type_name,
            Provider::Decorator {
                wrap: Box::new(wrap),
            },
        )
    }

    /// Register a hand-written adaptive provider. At most one adaptive
    /// type may be named across a capability's descriptor lines.
    pub fn adaptive<F>(&mut self, type_name: &'static str, construct: F) -> &mut Self
    where
        F: Fn(&InjectionSite<'_>) -> Result<Arc<T>, ExtensionError> + Send + Sync + 'static,
    {
        self.insert(
            type_name,
            Provider::Adaptive {
                construct: Box::new(construct),
            },
        )
    }

    /// Number of registered provider types.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the catalog has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn insert(&mut self, type_name: &'static str, provider: Provider<T>) -> &mut Self {
        if let Some(previous) = self.providers.insert(type_name, provider) {
            tracing::warn!(
                capability = T::CAPABILITY,
                type_name,
                previous_role = previous.role(),
                "provider type re-registered; the earlier registration is discarded"
            );
        }
        self
    }

    pub(crate) fn lookup(&self, type_name: &str) -> Option<(&'static str, &Provider<T>)> {
        self.providers
            .get_key_value(type_name)
            .map(|(key, provider)| (*key, provider))
    }
}

impl<T: Extensible + ?Sized> Default for ProviderCatalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Extensible + ?Sized> fmt::Debug for ProviderCatalog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCatalog")
            .field("capability", &T::CAPABILITY)
            .field("providers", &self.providers.len())
            .finish()
    }
}
