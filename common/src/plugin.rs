// Plugin host collaborator
// Knows which sibling plugins are loaded, what resources they publish, and can toggle them

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// PluginHost is the narrow interface the engine uses to talk to sibling plugins
#[cfg_attr(test, mockall::automock)]
pub trait PluginHost: Send + Sync {
    /// Whether a plugin with this internal name is currently loaded
    fn is_loaded(&self, plugin: &str) -> bool;

    /// A named resource published by a loaded plugin
    fn resource(&self, plugin: &str, key: &str) -> Option<String>;

    /// Enable or disable a plugin, returns false when the plugin is unknown
    fn set_enabled(&self, plugin: &str, enabled: bool) -> bool;
}

#[derive(Debug, Default)]
struct PluginEntry {
    enabled: bool,
    resources: HashMap<String, String>,
}

/// StaticPluginHost is an in-memory plugin host seeded from configuration
#[derive(Debug, Default)]
pub struct StaticPluginHost {
    plugins: RwLock<HashMap<String, PluginEntry>>,
}

impl StaticPluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host reporting every listed plugin as loaded and enabled
    pub fn with_loaded<I, S>(plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let host = Self::new();
        for plugin in plugins {
            host.add_plugin(plugin);
        }
        host
    }

    pub fn with_plugin(self, plugin: impl Into<String>) -> Self {
        self.add_plugin(plugin);
        self
    }

    pub fn with_resource(
        self,
        plugin: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        plugins
            .entry(plugin.into())
            .or_insert_with(|| PluginEntry {
                enabled: true,
                resources: HashMap::new(),
            })
            .resources
            .insert(key.into(), value.into());
        drop(plugins);
        self
    }

    pub fn add_plugin(&self, plugin: impl Into<String>) {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        plugins.entry(plugin.into()).or_insert_with(|| PluginEntry {
            enabled: true,
            resources: HashMap::new(),
        });
    }

    pub fn remove_plugin(&self, plugin: &str) -> bool {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        plugins.remove(plugin).is_some()
    }

    pub fn is_enabled(&self, plugin: &str) -> bool {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        plugins.get(plugin).map(|entry| entry.enabled).unwrap_or(false)
    }

    /// Names of loaded plugins that are currently disabled
    pub fn disabled(&self) -> HashSet<String> {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        plugins
            .iter()
            .filter(|(_, entry)| !entry.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl PluginHost for StaticPluginHost {
    fn is_loaded(&self, plugin: &str) -> bool {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        plugins.contains_key(plugin)
    }

    fn resource(&self, plugin: &str, key: &str) -> Option<String> {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        plugins
            .get(plugin)
            .and_then(|entry| entry.resources.get(key).cloned())
    }

    fn set_enabled(&self, plugin: &str, enabled: bool) -> bool {
        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        match plugins.get_mut(plugin) {
            Some(entry) => {
                entry.enabled = enabled;
                tracing::debug!(plugin = plugin, enabled = enabled, "Plugin toggled");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_host_reports_loaded_plugins() {
        let host = StaticPluginHost::with_loaded(["vnavmesh", "Lifestream"]);
        assert!(host.is_loaded("vnavmesh"));
        assert!(host.is_loaded("Lifestream"));
        assert!(!host.is_loaded("TextAdvance"));
    }

    #[test]
    fn test_static_host_resources() {
        let host = StaticPluginHost::new().with_resource("Questionable", "routes", "[]");
        assert!(host.is_loaded("Questionable"));
        assert_eq!(host.resource("Questionable", "routes").as_deref(), Some("[]"));
        assert_eq!(host.resource("Questionable", "missing"), None);
        assert_eq!(host.resource("Other", "routes"), None);
    }

    #[test]
    fn test_set_enabled_toggles_known_plugins_only() {
        let host = StaticPluginHost::new().with_plugin("TextAdvance");
        assert!(host.is_enabled("TextAdvance"));

        assert!(host.set_enabled("TextAdvance", false));
        assert!(!host.is_enabled("TextAdvance"));
        assert!(host.disabled().contains("TextAdvance"));

        assert!(host.set_enabled("TextAdvance", true));
        assert!(host.disabled().is_empty());

        assert!(!host.set_enabled("Unknown", false));
    }

    #[test]
    fn test_remove_plugin_unloads() {
        let host = StaticPluginHost::with_loaded(["a"]);
        assert!(host.remove_plugin("a"));
        assert!(!host.is_loaded("a"));
        assert!(!host.remove_plugin("a"));
    }
}
