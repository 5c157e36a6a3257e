//! Dependency resolution: how provider factories obtain collaborators.
//!
//! Resolution is itself a capability. The context installs it before
//! anything else, so every other registry is built with the adaptive
//! resolver in hand. The adaptive resolver is a composite that asks each
//! named resolver in turn; the builtin `static` resolver serves values the
//! application registered up front.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::extensible::Extensible;
use crate::registry::ExtensionRegistry;

/// Provides dependencies to extension factories.
///
/// `ty`/`type_name` identify the requested type (`type_name` only for
/// diagnostics), `property` is the name of the dependency slot being
/// filled. Returning `None` means "not mine"; the composite then asks the
/// next resolver.
pub trait DependencyResolver: Send + Sync {
    /// Resolve one dependency, or decline.
    fn resolve(
        &self,
        ty: TypeId,
        type_name: &str,
        property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>>;
}

impl Extensible for dyn DependencyResolver {
    const CAPABILITY: &'static str = "resolver";
    const INTERFACE: &'static str = "Resolver";

    fn synthesize_adaptive(registry: &Arc<ExtensionRegistry<Self>>) -> Option<Arc<Self>> {
        Some(Arc::new(CompositeResolver {
            registry: Arc::downgrade(registry),
        }))
    }
}

/// Adaptive stub for the resolver capability: tries every named resolver
/// in name order until one produces a value.
struct CompositeResolver {
    registry: Weak<ExtensionRegistry<dyn DependencyResolver>>,
}

impl DependencyResolver for CompositeResolver {
    fn resolve(
        &self,
        ty: TypeId,
        type_name: &str,
        property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        let registry = self.registry.upgrade()?;
        let names = registry.supported_names().ok()?;
        for name in names {
            match registry.get(&name) {
                Ok(resolver) => {
                    if let Some(value) = resolver.resolve(ty, type_name, property) {
                        return Some(value);
                    }
                }
                Err(error) => {
                    tracing::warn!(resolver = %name, %error, "skipping broken dependency resolver");
                }
            }
        }
        None
    }
}

/// The builtin resolver: a bag of values the application registered before
/// wiring anything up.
///
/// Lookup prefers a value registered for the exact `(type, property)`
/// pair, then falls back to a value registered for the type alone.
#[derive(Default)]
pub struct StaticResolver {
    by_property: DashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>,
    by_type: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl StaticResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` for the dependency slot named `property`.
    pub fn provide<D: Send + Sync + 'static>(&self, property: impl Into<String>, value: Arc<D>) {
        self.by_property
            .insert((TypeId::of::<D>(), property.into()), value);
    }

    /// Register `value` for any slot requesting type `D`.
    pub fn provide_type<D: Send + Sync + 'static>(&self, value: Arc<D>) {
        self.by_type.insert(TypeId::of::<D>(), value);
    }
}

impl DependencyResolver for StaticResolver {
    fn resolve(
        &self,
        ty: TypeId,
        _type_name: &str,
        property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        self.by_property
            .get(&(ty, property.to_owned()))
            .map(|entry| entry.value().clone())
            .or_else(|| self.by_type.get(&ty).map(|entry| entry.value().clone()))
    }
}

impl fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticResolver")
            .field("by_property", &self.by_property.len())
            .field("by_type", &self.by_type.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn property_binding_beats_type_binding() {
        let resolver = StaticResolver::new();
        resolver.provide_type(Arc::new("by-type".to_owned()));
        resolver.provide("greeting", Arc::new("by-property".to_owned()));

        let ty = TypeId::of::<String>();
        let hit = resolver.resolve(ty, "String", "greeting").unwrap();
        assert_eq!(*hit.downcast::<String>().unwrap(), "by-property");

        let fallback = resolver.resolve(ty, "String", "other").unwrap();
        assert_eq!(*fallback.downcast::<String>().unwrap(), "by-type");

        assert!(resolver.resolve(TypeId::of::<u32>(), "u32", "greeting").is_none());
    }
}
