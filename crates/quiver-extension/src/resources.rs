//! Layered descriptor resources.
//!
//! Descriptor text for a capability can come from three layers, merged in
//! a fixed order. Layers add names; binding an existing name to a
//! different provider type in a later layer is a configuration error, not
//! an override:
//!
//! 1. [`ResourceLayer::Internal`] - text registered by the crates that
//!    install builtin capabilities
//! 2. [`ResourceLayer::User`] - text registered by the embedding application
//! 3. [`ResourceLayer::Legacy`] - text in the old `services/` layout, kept
//!    for compatibility

use std::collections::HashMap;
use std::io;
use std::path::Path;

use parking_lot::RwLock;

/// The three descriptor layers, in merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceLayer {
    /// Builtin descriptors shipped with the runtime crates.
    Internal,
    /// Application-supplied descriptors.
    User,
    /// Compatibility layer for the old `services/` directory layout.
    Legacy,
}

impl ResourceLayer {
    const ALL: [ResourceLayer; 3] = [
        ResourceLayer::Internal,
        ResourceLayer::User,
        ResourceLayer::Legacy,
    ];

    fn index(self) -> usize {
        match self {
            ResourceLayer::Internal => 0,
            ResourceLayer::User => 1,
            ResourceLayer::Legacy => 2,
        }
    }
}

/// In-memory store of descriptor text, keyed by layer and capability.
///
/// Multiple registrations for the same capability within one layer are
/// concatenated, mirroring multiple descriptor files for one service on a
/// classpath.
#[derive(Debug, Default)]
pub struct LayeredResources {
    layers: [RwLock<HashMap<String, String>>; 3],
}

impl LayeredResources {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register descriptor text for `capability` in `layer`, appending to
    /// any text already registered there.
    pub fn put(&self, layer: ResourceLayer, capability: &str, text: &str) {
        let mut map = self.layers[layer.index()].write();
        let entry = map.entry(capability.to_owned()).or_default();
        if !entry.is_empty() && !entry.ends_with('\n') {
            entry.push('\n');
        }
        entry.push_str(text);
    }

    /// Load every regular file under `dir` as descriptor text, using the
    /// file name as the capability id. Returns how many files were loaded.
    ///
    /// Unreadable entries are logged and skipped; only a failure to list
    /// the directory itself is an error.
    pub fn scan_dir(&self, layer: ResourceLayer, dir: &Path) -> io::Result<usize> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(capability) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    self.put(layer, capability, &text);
                    loaded += 1;
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable descriptor file");
                }
            }
        }
        Ok(loaded)
    }

    /// Descriptor text for `capability` in `layer`, if any was registered.
    pub(crate) fn get(&self, layer: ResourceLayer, capability: &str) -> Option<String> {
        self.layers[layer.index()].read().get(capability).cloned()
    }

    /// Descriptor text for `capability` across all layers, in merge order.
    pub(crate) fn merged(&self, capability: &str) -> Vec<(ResourceLayer, String)> {
        ResourceLayer::ALL
            .into_iter()
            .filter_map(|layer| self.get(layer, capability).map(|text| (layer, text)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn registrations_within_a_layer_concatenate() {
        let resources = LayeredResources::new();
        resources.put(ResourceLayer::User, "filter", "echo=a::EchoFilter");
        resources.put(ResourceLayer::User, "filter", "log=a::LogFilter\n");
        assert_eq!(
            resources.get(ResourceLayer::User, "filter").as_deref(),
            Some("echo=a::EchoFilter\nlog=a::LogFilter\n")
        );
    }

    #[test]
    fn merged_preserves_layer_order() {
        let resources = LayeredResources::new();
        resources.put(ResourceLayer::Legacy, "proto", "legacy");
        resources.put(ResourceLayer::Internal, "proto", "internal");
        let merged = resources.merged("proto");
        assert_eq!(
            merged,
            vec![
                (ResourceLayer::Internal, "internal".to_owned()),
                (ResourceLayer::Legacy, "legacy".to_owned()),
            ]
        );
    }
}
