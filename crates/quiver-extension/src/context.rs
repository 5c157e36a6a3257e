//! The extension context: explicit ownership of every registry.
//!
//! Nothing in this crate is a process-wide singleton. An application
//! creates a context, installs capability catalogs into it, and asks it
//! for registries; two contexts never share caches. Registries hold weak
//! handles back to the context, so dropping the context (and the
//! registries obtained from it) tears everything down.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::catalog::ProviderCatalog;
use crate::error::ExtensionError;
use crate::extensible::Extensible;
use crate::registry::ExtensionRegistry;
use crate::resolver::{DependencyResolver, StaticResolver};
use crate::resources::{LayeredResources, ResourceLayer};

const STATIC_RESOLVER_TYPE: &str = "quiver_extension::StaticResolver";

/// Owns the descriptor resources, the installed catalogs, and one lazily
/// built [`ExtensionRegistry`] per capability.
pub struct ExtensionContext {
    resources: Arc<LayeredResources>,
    registries: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Catalogs installed but not yet turned into registries. A catalog is
    /// moved out of here exactly once, when its registry is first built.
    catalogs: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    /// Serializes registry construction across capabilities.
    creation: Mutex<()>,
    statics: Arc<StaticResolver>,
}

impl ExtensionContext {
    /// A fresh context with the resolver capability pre-installed: its
    /// `static` extension serves values registered through
    /// [`static_dependencies`](Self::static_dependencies).
    pub fn new() -> Arc<Self> {
        let context = Arc::new(Self {
            resources: Arc::new(LayeredResources::new()),
            registries: DashMap::new(),
            catalogs: Mutex::new(HashMap::new()),
            creation: Mutex::new(()),
            statics: Arc::new(StaticResolver::new()),
        });
        let statics = context.statics.clone();
        let mut catalog = ProviderCatalog::<dyn DependencyResolver>::new();
        catalog.plain(STATIC_RESOLVER_TYPE, move |_| Ok(statics.clone()));
        context.install_unchecked(catalog, &format!("static={STATIC_RESOLVER_TYPE}\n"));
        context
    }

    /// The descriptor resource store, for registering user or legacy
    /// descriptor text before registries are built.
    pub fn resources(&self) -> &Arc<LayeredResources> {
        &self.resources
    }

    /// The builtin static dependency resolver.
    pub fn static_dependencies(&self) -> &Arc<StaticResolver> {
        &self.statics
    }

    /// Install a capability: its provider catalog plus the builtin
    /// descriptor text that names those providers.
    ///
    /// Fails if the capability is already installed in this context.
    pub fn install<T: Extensible + ?Sized>(
        &self,
        catalog: ProviderCatalog<T>,
        builtin_descriptors: &str,
    ) -> Result<(), ExtensionError> {
        let id = TypeId::of::<T>();
        let mut catalogs = self.catalogs.lock();
        if catalogs.contains_key(&id) || self.registries.contains_key(&id) {
            return Err(ExtensionError::config(
                T::CAPABILITY,
                "capability is already installed in this context",
            ));
        }
        catalogs.insert(id, Box::new(catalog));
        drop(catalogs);
        if !builtin_descriptors.is_empty() {
            self.resources
                .put(ResourceLayer::Internal, T::CAPABILITY, builtin_descriptors);
        }
        tracing::debug!(capability = T::CAPABILITY, "installed capability");
        Ok(())
    }

    /// The registry for capability `T`, building it on first request.
    ///
    /// Building a registry consumes the installed catalog and captures the
    /// adaptive dependency resolver, so descriptor text registered after
    /// this call has no effect on `T`.
    pub fn registry<T: Extensible + ?Sized>(
        self: &Arc<Self>,
    ) -> Result<Arc<ExtensionRegistry<T>>, ExtensionError> {
        let id = TypeId::of::<T>();
        if let Some(existing) = self.registries.get(&id) {
            return downcast_registry::<T>(existing.value().clone());
        }
        // The resolver's own registry is built through this same method,
        // so fetch it before taking the creation lock.
        let resolver = if id == TypeId::of::<dyn DependencyResolver>() {
            None
        } else {
            match self
                .registry::<dyn DependencyResolver>()
                .and_then(|registry| registry.adaptive())
            {
                Ok(resolver) => Some(resolver),
                Err(error) => {
                    tracing::warn!(
                        capability = T::CAPABILITY,
                        %error,
                        "dependency resolver unavailable; extensions load without injection"
                    );
                    None
                }
            }
        };
        let _creation = self.creation.lock();
        if let Some(existing) = self.registries.get(&id) {
            return downcast_registry::<T>(existing.value().clone());
        }
        let catalog = self
            .catalogs
            .lock()
            .remove(&id)
            .ok_or_else(|| {
                ExtensionError::config(
                    T::CAPABILITY,
                    "capability is not installed in this context",
                )
            })?
            .downcast::<ProviderCatalog<T>>()
            .map_err(|_| {
                ExtensionError::config(T::CAPABILITY, "installed catalog has the wrong type")
            })?;
        let registry = Arc::new(ExtensionRegistry::new(
            Arc::downgrade(self),
            *catalog,
            self.resources.clone(),
            resolver,
        ));
        self.registries.insert(id, registry.clone());
        Ok(registry)
    }

    /// Install during construction, before the context is shared:
    /// duplicate checks are unnecessary and failure is impossible.
    fn install_unchecked<T: Extensible + ?Sized>(
        &self,
        catalog: ProviderCatalog<T>,
        builtin_descriptors: &str,
    ) {
        self.catalogs
            .lock()
            .insert(TypeId::of::<T>(), Box::new(catalog));
        self.resources
            .put(ResourceLayer::Internal, T::CAPABILITY, builtin_descriptors);
    }
}

fn downcast_registry<T: Extensible + ?Sized>(
    entry: Arc<dyn Any + Send + Sync>,
) -> Result<Arc<ExtensionRegistry<T>>, ExtensionError> {
    entry
        .downcast::<ExtensionRegistry<T>>()
        .map_err(|_| ExtensionError::config(T::CAPABILITY, "cached registry has the wrong type"))
}

impl fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("registries", &self.registries.len())
            .field("pending_catalogs", &self.catalogs.lock().len())
            .finish()
    }
}
