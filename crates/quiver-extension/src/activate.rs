//! Activation: merging auto-activated extensions with explicitly
//! requested names.
//!
//! The merge rules, using `values` for the caller-supplied name list:
//!
//! - `-default` in `values` suppresses the whole auto-activated segment
//! - `-name` excludes `name` wherever it would appear
//! - names listed before a literal `default` token are prepended to the
//!   auto segment, names after it are appended; with no token, explicit
//!   names follow the auto segment
//! - the auto segment is sorted by activation order, ties broken by name

use std::sync::Arc;

use quiver_core::ServiceUrl;

use crate::catalog::ActivateMeta;
use crate::error::ExtensionError;
use crate::extensible::Extensible;
use crate::registry::ExtensionRegistry;

/// The literal marking where the auto-activated segment sits among
/// explicitly requested names.
pub const DEFAULT_TOKEN: &str = "default";

/// Prefix that excludes a name (`-name`) or the auto segment (`-default`).
pub const EXCLUDE_PREFIX: char = '-';

impl<T: Extensible + ?Sized> ExtensionRegistry<T> {
    /// [`activate`](Self::activate) with `values` read from the URL
    /// parameter `key`, split on commas.
    pub fn activate_by_key(
        &self,
        url: &ServiceUrl,
        key: &str,
        group: Option<&str>,
    ) -> Result<Vec<Arc<T>>, ExtensionError> {
        let raw = url.parameter(key).unwrap_or_default();
        let values: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect();
        self.activate(url, &values, group)
    }

    /// The ordered list of extensions active for `url` in `group`.
    ///
    /// Auto-activation considers every name carrying activation metadata
    /// whose group list is empty or contains `group`, and whose condition
    /// keys (if any) appear on the URL - exactly or as a `.key` suffix -
    /// with a non-empty value.
    pub fn activate(
        &self,
        url: &ServiceUrl,
        values: &[&str],
        group: Option<&str>,
    ) -> Result<Vec<Arc<T>>, ExtensionError> {
        let mut active: Vec<Arc<T>> = Vec::new();
        let suppress_auto = values
            .iter()
            .any(|value| *value == format!("{EXCLUDE_PREFIX}{DEFAULT_TOKEN}"));
        if !suppress_auto {
            let descriptors = self.descriptors()?;
            let mut auto: Vec<(&str, &ActivateMeta)> = descriptors
                .activates
                .iter()
                .filter(|(name, meta)| {
                    group_matches(group, meta.groups)
                        && !values.contains(&name.as_str())
                        && !excluded(values, name)
                        && conditions_hold(meta.conditions, url)
                })
                .map(|(name, meta)| (name.as_str(), meta))
                .collect();
            auto.sort_by(|a, b| a.1.order.cmp(&b.1.order).then_with(|| a.0.cmp(b.0)));
            for (name, _) in auto {
                active.push(self.get(name)?);
            }
        }
        let mut requested: Vec<Arc<T>> = Vec::new();
        for value in values {
            if value.starts_with(EXCLUDE_PREFIX) || excluded(values, value) {
                continue;
            }
            if *value == DEFAULT_TOKEN {
                if !requested.is_empty() {
                    let head = std::mem::take(&mut requested);
                    active.splice(0..0, head);
                }
            } else {
                requested.push(self.get(value)?);
            }
        }
        active.extend(requested);
        Ok(active)
    }
}

fn group_matches(group: Option<&str>, groups: &[&str]) -> bool {
    groups.is_empty()
        || match group {
            None => true,
            Some(group) => groups.contains(&group),
        }
}

fn excluded(values: &[&str], name: &str) -> bool {
    values
        .iter()
        .any(|value| value.strip_prefix(EXCLUDE_PREFIX) == Some(name))
}

fn conditions_hold(conditions: &[&str], url: &ServiceUrl) -> bool {
    if conditions.is_empty() {
        return true;
    }
    conditions.iter().any(|key| {
        url.parameters().iter().any(|(param, value)| {
            (param == key || param.ends_with(&format!(".{key}"))) && !value.is_empty()
        })
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::ProviderCatalog;
    use crate::context::ExtensionContext;
    use crate::resources::ResourceLayer;

    trait Stage: Send + Sync {
        fn tag(&self) -> &'static str;
    }

    impl Extensible for dyn Stage {
        const CAPABILITY: &'static str = "stage";
        const INTERFACE: &'static str = "Stage";
    }

    struct Tagged(&'static str);

    impl Stage for Tagged {
        fn tag(&self) -> &'static str {
            self.0
        }
    }

    fn registry() -> Arc<ExtensionRegistry<dyn Stage>> {
        let context = ExtensionContext::new();
        let mut catalog = ProviderCatalog::<dyn Stage>::new();
        catalog.activate(
            "t::BaseStage",
            ActivateMeta::new(),
            |_| Ok(Arc::new(Tagged("base"))),
        );
        catalog.activate(
            "t::AuditStage",
            ActivateMeta::new()
                .with_groups(&["provider"])
                .with_conditions(&["audit"])
                .with_order(10),
            |_| Ok(Arc::new(Tagged("audit"))),
        );
        catalog.activate(
            "t::ConsumerStage",
            ActivateMeta::new().with_groups(&["consumer"]).with_order(-5),
            |_| Ok(Arc::new(Tagged("consumer"))),
        );
        catalog.plain("t::DemoStage", |_| Ok(Arc::new(Tagged("demo"))));
        catalog.plain("t::ExtraStage", |_| Ok(Arc::new(Tagged("extra"))));
        context
            .install(
                catalog,
                "base=t::BaseStage\naudit=t::AuditStage\nconsumer=t::ConsumerStage\n\
                 demo=t::DemoStage\nextra=t::ExtraStage\n",
            )
            .unwrap();
        context.registry::<dyn Stage>().unwrap()
    }

    fn tags(stages: &[Arc<dyn Stage>]) -> Vec<&'static str> {
        stages.iter().map(|stage| stage.tag()).collect()
    }

    #[test]
    fn auto_segment_respects_group_conditions_and_order() {
        let registry = registry();
        let url = ServiceUrl::new("injvm", "localhost", None, "svc");
        let active = registry.activate(&url, &[], Some("provider")).unwrap();
        assert_eq!(tags(&active), vec!["base"]);

        let url = url.with_parameter("service.audit", "on");
        let active = registry.activate(&url, &[], Some("provider")).unwrap();
        assert_eq!(tags(&active), vec!["base", "audit"]);

        let active = registry.activate(&url, &[], Some("consumer")).unwrap();
        assert_eq!(tags(&active), vec!["consumer", "base"]);
    }

    #[test]
    fn empty_condition_value_does_not_activate() {
        let registry = registry();
        let url = ServiceUrl::new("injvm", "localhost", None, "svc").with_parameter("audit", "");
        let active = registry.activate(&url, &[], Some("provider")).unwrap();
        assert_eq!(tags(&active), vec!["base"]);
    }

    #[test]
    fn default_token_splits_requested_names_around_auto_segment() {
        let registry = registry();
        let url = ServiceUrl::new("injvm", "localhost", None, "svc");
        let active = registry
            .activate(&url, &["demo", "default", "extra"], Some("provider"))
            .unwrap();
        assert_eq!(tags(&active), vec!["demo", "base", "extra"]);
    }

    #[test]
    fn minus_default_keeps_only_requested_names() {
        let registry = registry();
        let url = ServiceUrl::new("injvm", "localhost", None, "svc");
        let active = registry
            .activate(&url, &["extra", "-default"], Some("provider"))
            .unwrap();
        assert_eq!(tags(&active), vec!["extra"]);
    }

    #[test]
    fn minus_name_excludes_everywhere() {
        let registry = registry();
        let url = ServiceUrl::new("injvm", "localhost", None, "svc");
        let active = registry
            .activate(&url, &["-base", "demo"], Some("provider"))
            .unwrap();
        assert_eq!(tags(&active), vec!["demo"]);
    }

    #[test]
    fn explicit_mention_moves_a_name_out_of_the_auto_segment() {
        let registry = registry();
        let url = ServiceUrl::new("injvm", "localhost", None, "svc");
        let active = registry
            .activate(&url, &["base"], Some("provider"))
            .unwrap();
        assert_eq!(tags(&active), vec!["base"]);
    }

    #[test]
    fn activate_by_key_splits_commas() {
        let registry = registry();
        let url = ServiceUrl::new("injvm", "localhost", None, "svc")
            .with_parameter("stages", "demo, default ,extra");
        let active = registry
            .activate_by_key(&url, "stages", Some("provider"))
            .unwrap();
        assert_eq!(tags(&active), vec!["demo", "base", "extra"]);
    }
}
