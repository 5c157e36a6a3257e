//! Descriptor loading: turning layered descriptor text into name bindings.
//!
//! A descriptor line is `name=prov::Type` or a bare `prov::Type`; `#`
//! starts a comment, blank lines are skipped. Bare lines derive their name
//! from the provider type's simple name minus the capability's interface
//! suffix, lowercased. A line whose provider type is unknown to the
//! catalog is recorded, not fatal: the failure surfaces later inside the
//! not-found error for whatever name the line would have bound.

use std::collections::BTreeMap;

use crate::catalog::{ActivateMeta, Provider, ProviderCatalog};
use crate::error::ExtensionError;
use crate::extensible::Extensible;
use crate::resources::LayeredResources;

/// The merged result of loading every descriptor layer for one capability.
#[derive(Debug, Default)]
pub(crate) struct Descriptors {
    /// Extension name -> provider type. Later layers overwrite earlier
    /// bindings only when they bind the same type; a conflicting rebind is
    /// fatal.
    pub(crate) names: BTreeMap<String, &'static str>,
    /// Activation metadata, keyed by the first name of the binding line.
    pub(crate) activates: BTreeMap<String, ActivateMeta>,
    /// Decorator types in the order they first appeared.
    pub(crate) decorators: Vec<&'static str>,
    /// The single adaptive provider type, if any line named one.
    pub(crate) adaptive: Option<&'static str>,
    /// Per-line failures: offending line -> reason.
    pub(crate) line_errors: BTreeMap<String, String>,
}

impl Descriptors {
    pub(crate) fn load<T: Extensible + ?Sized>(
        catalog: &ProviderCatalog<T>,
        resources: &LayeredResources,
    ) -> Result<Self, ExtensionError> {
        let mut descriptors = Self::default();
        for (layer, text) in resources.merged(T::CAPABILITY) {
            tracing::debug!(
                capability = T::CAPABILITY,
                ?layer,
                "loading descriptor layer"
            );
            descriptors.merge_text(catalog, &text)?;
        }
        Ok(descriptors)
    }

    fn merge_text<T: Extensible + ?Sized>(
        &mut self,
        catalog: &ProviderCatalog<T>,
        text: &str,
    ) -> Result<(), ExtensionError> {
        for raw in text.lines() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let (bound_name, type_token) = match line.split_once('=') {
                Some((name, ty)) => (Some(name.trim()), ty.trim()),
                None => (None, line),
            };
            if type_token.is_empty() {
                self.line_errors.insert(
                    line.to_owned(),
                    "line has a name but no provider type".to_owned(),
                );
                continue;
            }
            let Some((type_name, provider)) = catalog.lookup(type_token) else {
                self.line_errors.insert(
                    line.to_owned(),
                    format!(
                        "provider type `{type_token}` is not registered in the \
                         `{}` catalog",
                        T::CAPABILITY
                    ),
                );
                continue;
            };
            match provider {
                Provider::Adaptive { .. } => self.merge_adaptive::<T>(type_name)?,
                Provider::Decorator { .. } => {
                    if !self.decorators.contains(&type_name) {
                        self.decorators.push(type_name);
                    }
                }
                Provider::Plain { activate, .. } => {
                    self.merge_plain::<T>(bound_name, type_name, *activate)?;
                }
            }
        }
        Ok(())
    }

    fn merge_adaptive<T: Extensible + ?Sized>(
        &mut self,
        type_name: &'static str,
    ) -> Result<(), ExtensionError> {
        match self.adaptive {
            None => {
                self.adaptive = Some(type_name);
                Ok(())
            }
            Some(existing) if existing == type_name => Ok(()),
            Some(existing) => Err(ExtensionError::config(
                T::CAPABILITY,
                format!(
                    "more than one adaptive provider is named: `{existing}` and `{type_name}`"
                ),
            )),
        }
    }

    fn merge_plain<T: Extensible + ?Sized>(
        &mut self,
        bound_name: Option<&str>,
        type_name: &'static str,
        activate: Option<ActivateMeta>,
    ) -> Result<(), ExtensionError> {
        let name_spec = match bound_name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => derive_legacy_name(type_name, T::INTERFACE).ok_or_else(|| {
                ExtensionError::config(
                    T::CAPABILITY,
                    format!(
                        "cannot derive an extension name for provider type \
                         `{type_name}`; bind one explicitly as `name={type_name}`"
                    ),
                )
            })?,
        };
        let names: Vec<&str> = name_spec
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        let Some(first) = names.first() else {
            return Err(ExtensionError::config(
                T::CAPABILITY,
                format!("provider type `{type_name}` is bound to an empty name list"),
            ));
        };
        if let Some(meta) = activate {
            self.activates.entry((*first).to_owned()).or_insert(meta);
        }
        for name in names {
            match self.names.get(name) {
                Some(existing) if *existing != type_name => {
                    return Err(ExtensionError::config(
                        T::CAPABILITY,
                        format!(
                            "extension name `{name}` is bound to two provider types: \
                             `{existing}` and `{type_name}`"
                        ),
                    ));
                }
                _ => {
                    self.names.insert(name.to_owned(), type_name);
                }
            }
        }
        Ok(())
    }

    /// Render accumulated line failures as a suffix for a not-found error.
    /// Lines mentioning `name` are preferred; when none do, every failure
    /// is listed.
    pub(crate) fn render_causes(&self, name: &str) -> String {
        if self.line_errors.is_empty() {
            return String::new();
        }
        let matching: Vec<(&String, &String)> = self
            .line_errors
            .iter()
            .filter(|(line, _)| line.contains(name))
            .collect();
        let selected = if matching.is_empty() {
            self.line_errors.iter().collect()
        } else {
            matching
        };
        let mut rendered = String::from(", possible causes:");
        for (i, (line, reason)) in selected.iter().enumerate() {
            rendered.push_str(&format!(" ({}) `{line}`: {reason}", i + 1));
        }
        rendered
    }
}

/// `prov::DemoEagerThreadPool` with interface `ThreadPool` gives
/// `demoeager`; a simple name equal to the interface gives `None`.
fn derive_legacy_name(type_name: &str, interface: &str) -> Option<String> {
    let simple = type_name.rsplit("::").next().unwrap_or(type_name);
    let stem = simple.strip_suffix(interface).unwrap_or(simple);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::resources::ResourceLayer;

    trait Codec: Send + Sync {}

    impl Extensible for dyn Codec {
        const CAPABILITY: &'static str = "codec";
        const INTERFACE: &'static str = "Codec";
    }

    struct FixedCodec;

    impl Codec for FixedCodec {}

    fn catalog() -> ProviderCatalog<dyn Codec> {
        let mut catalog = ProviderCatalog::<dyn Codec>::new();
        catalog.plain("demo::JsonCodec", |_| Ok(Arc::new(FixedCodec)));
        catalog.plain("demo::RawCodec", |_| Ok(Arc::new(FixedCodec)));
        catalog.decorator("demo::TracingCodec", |inner, _| Ok(inner));
        catalog.adaptive("demo::AdaptiveCodec", |_| Ok(Arc::new(FixedCodec)));
        catalog
    }

    fn load(text: &str) -> Result<Descriptors, ExtensionError> {
        let resources = LayeredResources::new();
        resources.put(ResourceLayer::User, "codec", text);
        Descriptors::load(&catalog(), &resources)
    }

    #[test]
    fn parses_names_comments_and_blanks() {
        let descriptors = load(
            "# leading comment\n\
             json=demo::JsonCodec # trailing comment\n\
             \n\
             raw , binary = demo::RawCodec\n",
        )
        .unwrap();
        assert_eq!(descriptors.names.get("json"), Some(&"demo::JsonCodec"));
        assert_eq!(descriptors.names.get("raw"), Some(&"demo::RawCodec"));
        assert_eq!(descriptors.names.get("binary"), Some(&"demo::RawCodec"));
        assert!(descriptors.line_errors.is_empty());
    }

    #[test]
    fn bare_line_derives_legacy_name() {
        let descriptors = load("demo::JsonCodec\n").unwrap();
        assert_eq!(descriptors.names.get("json"), Some(&"demo::JsonCodec"));
    }

    #[test]
    fn rebinding_a_name_to_another_type_is_fatal() {
        let error = load("json=demo::JsonCodec\njson=demo::RawCodec\n").unwrap_err();
        assert!(matches!(error, ExtensionError::Config { .. }), "{error}");
    }

    #[test]
    fn rebinding_a_name_to_the_same_type_is_fine() {
        let descriptors = load("json=demo::JsonCodec\njson=demo::JsonCodec\n").unwrap();
        assert_eq!(descriptors.names.len(), 1);
    }

    #[test]
    fn unknown_provider_type_is_recorded_not_fatal() {
        let descriptors = load("json=demo::JsonCodec\nbad=demo::Missing\n").unwrap();
        assert_eq!(descriptors.names.len(), 1);
        assert_eq!(descriptors.line_errors.len(), 1);
        let causes = descriptors.render_causes("bad");
        assert!(causes.contains("demo::Missing"), "{causes}");
    }

    #[test]
    fn two_adaptive_types_are_fatal() {
        let mut catalog = catalog();
        catalog.adaptive("demo::OtherAdaptive", |_| Ok(Arc::new(FixedCodec)));
        let resources = LayeredResources::new();
        resources.put(
            ResourceLayer::User,
            "codec",
            "demo::AdaptiveCodec\ndemo::OtherAdaptive\n",
        );
        let error = Descriptors::load(&catalog, &resources).unwrap_err();
        assert!(matches!(error, ExtensionError::Config { .. }), "{error}");
    }

    #[test]
    fn decorators_keep_first_appearance_order_without_duplicates() {
        let mut catalog = catalog();
        catalog.decorator("demo::MetricsCodec", |inner, _| Ok(inner));
        let resources = LayeredResources::new();
        resources.put(
            ResourceLayer::User,
            "codec",
            "demo::MetricsCodec\ndemo::TracingCodec\ndemo::MetricsCodec\n",
        );
        let descriptors = Descriptors::load(&catalog, &resources).unwrap();
        assert_eq!(
            descriptors.decorators,
            vec!["demo::MetricsCodec", "demo::TracingCodec"]
        );
    }
}
