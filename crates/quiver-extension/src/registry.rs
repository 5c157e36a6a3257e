//! Per-capability extension registry: caching, decoration, and adaptive
//! dispatch.
//!
//! One registry exists per capability per context. It owns the merged
//! descriptors (loaded lazily, result cached including failure), a
//! per-name instance cache, a per-provider-type raw instance cache shared
//! across names bound to the same type, and the single adaptive instance.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use quiver_core::ServiceUrl;

use crate::catalog::{InjectionSite, Provider, ProviderCatalog};
use crate::context::ExtensionContext;
use crate::descriptor::Descriptors;
use crate::error::ExtensionError;
use crate::extensible::Extensible;
use crate::resolver::DependencyResolver;
use crate::resources::LayeredResources;

/// Name alias that resolves to the capability's default extension.
pub const DEFAULT_ALIAS: &str = "true";

enum AdaptiveSlot<T: ?Sized> {
    Unresolved,
    Ready(Arc<T>),
    Failed(ExtensionError),
}

/// Registry for one capability within one [`ExtensionContext`].
pub struct ExtensionRegistry<T: Extensible + ?Sized> {
    context: Weak<ExtensionContext>,
    catalog: ProviderCatalog<T>,
    resources: Arc<LayeredResources>,
    resolver: Option<Arc<dyn DependencyResolver>>,
    descriptors: OnceCell<Result<Arc<Descriptors>, ExtensionError>>,
    /// Per-name holders. The cell is cloned out of the map before
    /// initialization so a slow factory never holds a map shard lock.
    instances: DashMap<String, Arc<OnceCell<Arc<T>>>>,
    /// Undecorated instances, shared by every name bound to the same
    /// provider type.
    raw_instances: DashMap<&'static str, Arc<T>>,
    adaptive: Mutex<AdaptiveSlot<T>>,
}

impl<T: Extensible + ?Sized> ExtensionRegistry<T> {
    pub(crate) fn new(
        context: Weak<ExtensionContext>,
        catalog: ProviderCatalog<T>,
        resources: Arc<LayeredResources>,
        resolver: Option<Arc<dyn DependencyResolver>>,
    ) -> Self {
        Self {
            context,
            catalog,
            resources,
            resolver,
            descriptors: OnceCell::new(),
            instances: DashMap::new(),
            raw_instances: DashMap::new(),
            adaptive: Mutex::new(AdaptiveSlot::Unresolved),
        }
    }

    /// The extension bound to `name`, instantiating it on first request.
    ///
    /// `"true"` aliases the capability's default name. Every call for the
    /// same name returns the same instance; two names bound to the same
    /// provider type share one undecorated instance under their own
    /// decorator stacks.
    pub fn get(&self, name: &str) -> Result<Arc<T>, ExtensionError> {
        if name.trim().is_empty() {
            return Err(ExtensionError::config(
                T::CAPABILITY,
                "extension name must not be empty",
            ));
        }
        let resolved = if name == DEFAULT_ALIAS {
            self.default_name()
                .ok_or_else(|| {
                    ExtensionError::config(
                        T::CAPABILITY,
                        "`true` was requested but the capability declares no default name",
                    )
                })?
                .to_owned()
        } else {
            name.to_owned()
        };
        let cell = self
            .instances
            .entry(resolved.clone())
            .or_insert_with(Default::default)
            .clone();
        cell.get_or_try_init(|| self.create(&resolved))
            .map(Arc::clone)
    }

    /// Whether `name` is bound by the merged descriptors. A registry whose
    /// descriptors fail to load supports nothing.
    pub fn has(&self, name: &str) -> bool {
        self.descriptors()
            .map(|d| d.names.contains_key(name))
            .unwrap_or(false)
    }

    /// All bound names, sorted.
    pub fn supported_names(&self) -> Result<Vec<String>, ExtensionError> {
        Ok(self.descriptors()?.names.keys().cloned().collect())
    }

    /// Names whose instances have already been created, sorted.
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .instances
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// The capability's default extension name, if declared.
    pub fn default_name(&self) -> Option<&'static str> {
        T::DEFAULT_NAME.filter(|name| *name != DEFAULT_ALIAS)
    }

    /// The capability's single adaptive instance.
    ///
    /// Preference order: a descriptor-named adaptive provider, then the
    /// capability's synthesized stub. Both success and failure are cached;
    /// a failed creation is never retried.
    pub fn adaptive(self: &Arc<Self>) -> Result<Arc<T>, ExtensionError> {
        let mut slot = self.adaptive.lock();
        match &*slot {
            AdaptiveSlot::Ready(instance) => Ok(instance.clone()),
            AdaptiveSlot::Failed(error) => Err(error.clone()),
            AdaptiveSlot::Unresolved => match self.create_adaptive() {
                Ok(instance) => {
                    *slot = AdaptiveSlot::Ready(instance.clone());
                    Ok(instance)
                }
                Err(error) => {
                    tracing::error!(
                        capability = T::CAPABILITY,
                        %error,
                        "adaptive instance creation failed; the failure is cached"
                    );
                    *slot = AdaptiveSlot::Failed(error.clone());
                    Err(error)
                }
            },
        }
    }

    /// The extension name adaptive dispatch would pick for `url`: the
    /// first adaptive key with a value, else the default name.
    pub fn resolve_adaptive_name(&self, url: &ServiceUrl) -> Result<String, ExtensionError> {
        for key in T::ADAPTIVE_KEYS {
            let value = if *key == "protocol" {
                Some(url.protocol())
            } else {
                url.parameter(key)
            };
            if let Some(value) = value
                && !value.is_empty()
            {
                return Ok(value.to_owned());
            }
        }
        if let Some(default) = self.default_name() {
            return Ok(default.to_owned());
        }
        Err(ExtensionError::NameUnresolved {
            capability: T::CAPABILITY,
            url: url.to_string(),
            keys: T::ADAPTIVE_KEYS,
        })
    }

    /// Dispatch through [`resolve_adaptive_name`](Self::resolve_adaptive_name)
    /// and fetch the chosen extension.
    pub fn get_by_url(&self, url: &ServiceUrl) -> Result<Arc<T>, ExtensionError> {
        let name = self.resolve_adaptive_name(url)?;
        self.get(&name)
    }

    pub(crate) fn descriptors(&self) -> Result<Arc<Descriptors>, ExtensionError> {
        self.descriptors
            .get_or_init(|| Descriptors::load(&self.catalog, &self.resources).map(Arc::new))
            .clone()
    }

    pub(crate) fn site(&self) -> InjectionSite<'_> {
        InjectionSite::new(T::CAPABILITY, &self.context, self.resolver.as_ref())
    }

    fn create(&self, name: &str) -> Result<Arc<T>, ExtensionError> {
        let descriptors = self.descriptors()?;
        let type_name = *descriptors.names.get(name).ok_or_else(|| {
            ExtensionError::NotFound {
                capability: T::CAPABILITY,
                name: name.to_owned(),
                causes: descriptors.render_causes(name),
            }
        })?;
        let site = self.site();
        let raw = match self.raw_instances.get(type_name) {
            Some(existing) => existing.value().clone(),
            None => {
                let built = self.construct(type_name, &site)?;
                // First writer wins: a racing construction of the same
                // provider type yields the earlier instance.
                self.raw_instances
                    .entry(type_name)
                    .or_insert(built)
                    .value()
                    .clone()
            }
        };
        let mut instance = raw;
        for decorator in &descriptors.decorators {
            instance = self.wrap(decorator, instance, &site)?;
        }
        tracing::debug!(capability = T::CAPABILITY, name, type_name, "created extension");
        Ok(instance)
    }

    fn create_adaptive(self: &Arc<Self>) -> Result<Arc<T>, ExtensionError> {
        let descriptors = self.descriptors()?;
        if let Some(type_name) = descriptors.adaptive {
            return self.construct(type_name, &self.site());
        }
        if let Some(stub) = T::synthesize_adaptive(self) {
            return Ok(stub);
        }
        Err(ExtensionError::AdaptiveGeneration {
            capability: T::CAPABILITY,
            message: "no descriptor line names an adaptive provider and the capability \
                      declares no synthesized dispatch stub"
                .to_owned(),
        })
    }

    fn construct(
        &self,
        type_name: &'static str,
        site: &InjectionSite<'_>,
    ) -> Result<Arc<T>, ExtensionError> {
        match self.catalog.lookup(type_name) {
            Some((_, Provider::Plain { construct, .. }))
            | Some((_, Provider::Adaptive { construct })) => construct(site),
            _ => Err(ExtensionError::instantiation(
                T::CAPABILITY,
                type_name,
                "provider type vanished from the catalog",
            )),
        }
    }

    fn wrap(
        &self,
        type_name: &'static str,
        inner: Arc<T>,
        site: &InjectionSite<'_>,
    ) -> Result<Arc<T>, ExtensionError> {
        match self.catalog.lookup(type_name) {
            Some((_, Provider::Decorator { wrap })) => wrap(inner, site),
            _ => Err(ExtensionError::instantiation(
                T::CAPABILITY,
                type_name,
                "decorator type vanished from the catalog",
            )),
        }
    }
}

impl<T: Extensible + ?Sized> fmt::Debug for ExtensionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("capability", &T::CAPABILITY)
            .field("catalog", &self.catalog)
            .field("cached_instances", &self.instances.len())
            .finish()
    }
}
