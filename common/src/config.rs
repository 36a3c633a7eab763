// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub dependencies: DependencySettings,
    pub triggers: TriggerSettings,
    pub plugins: PluginSettings,
    pub macros: MacroSettings,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Upper bound on dependency validation during a start request
    pub dependency_timeout_seconds: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            dependency_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencySettings {
    pub http_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self {
            http_timeout_seconds: 15,
            user_agent: format!("macro-orchestrator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    /// Buffered notifications per subscriber before lagging
    pub notification_capacity: usize,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            notification_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PluginSettings {
    /// Plugins reported as loaded by the static plugin host
    pub loaded: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroSettings {
    /// Directory holding macro definition files (*.json)
    pub directory: String,
}

impl Default for MacroSettings {
    fn default() -> Self {
        Self {
            directory: "macros".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
            metrics_port: None,
        }
    }
}

/// `APP__SECTION__KEY` overrides; `APP__PLUGINS__LOADED` takes a comma-separated list
fn environment() -> Environment {
    Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("plugins.loaded")
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        Self::load_with_environment(config_dir.as_ref(), environment())
    }

    fn load_with_environment(config_dir: &Path, env: Environment) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(env);

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.dependency_timeout_seconds == 0 {
            return Err("Scheduler dependency_timeout_seconds must be greater than 0".to_string());
        }

        if self.dependencies.http_timeout_seconds == 0 {
            return Err("Dependency http_timeout_seconds must be greater than 0".to_string());
        }
        if self.dependencies.user_agent.trim().is_empty() {
            return Err("Dependency user_agent cannot be empty".to_string());
        }

        if self.triggers.notification_capacity == 0 {
            return Err("Trigger notification_capacity must be greater than 0".to_string());
        }

        if self.macros.directory.trim().is_empty() {
            return Err("Macro directory cannot be empty".to_string());
        }

        if self.observability.metrics_port == Some(0) {
            return Err("Metrics port must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_zero_dependency_timeout() {
        let mut settings = Settings::default();
        settings.scheduler.dependency_timeout_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_notification_capacity() {
        let mut settings = Settings::default();
        settings.triggers.notification_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_metrics_port() {
        let mut settings = Settings::default();
        settings.observability.metrics_port = Some(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_directory_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.scheduler.dependency_timeout_seconds, 30);
        assert_eq!(settings.triggers.notification_capacity, 256);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            "[scheduler]\ndependency_timeout_seconds = 5\n\n[plugins]\nloaded = [\"vnavmesh\"]"
        )
        .unwrap();

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.scheduler.dependency_timeout_seconds, 5);
        assert_eq!(settings.plugins.loaded, vec!["vnavmesh".to_string()]);
        assert_eq!(settings.dependencies.http_timeout_seconds, 15);
    }

    #[test]
    fn test_environment_overrides_file_and_parses_plugin_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(file, "[plugins]\nloaded = [\"vnavmesh\"]").unwrap();

        let mut vars = config::Map::new();
        vars.insert(
            "APP__PLUGINS__LOADED".to_string(),
            "TextAdvance,YesAlready".to_string(),
        );
        vars.insert(
            "APP__SCHEDULER__DEPENDENCY_TIMEOUT_SECONDS".to_string(),
            "7".to_string(),
        );
        vars.insert(
            "APP__DEPENDENCIES__USER_AGENT".to_string(),
            "orchestrator, test".to_string(),
        );

        let settings =
            Settings::load_with_environment(dir.path(), environment().source(Some(vars))).unwrap();
        assert_eq!(
            settings.plugins.loaded,
            vec!["TextAdvance".to_string(), "YesAlready".to_string()]
        );
        assert_eq!(settings.scheduler.dependency_timeout_seconds, 7);
        assert_eq!(settings.dependencies.user_agent, "orchestrator, test");
    }
}
