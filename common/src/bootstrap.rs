// Bootstrap utilities for binary initialization

use crate::config::Settings;
use crate::executor::MacroExecutor;
use crate::models::Macro;
use crate::orchestration::Orchestrator;
use crate::plugin::{PluginHost, StaticPluginHost};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A macro definition file: the macro itself plus the functions it exposes
/// to function-level triggers
#[derive(Debug, Clone, Deserialize)]
pub struct MacroDefinition {
    #[serde(flatten)]
    pub macro_def: Macro,
    #[serde(default)]
    pub functions: Vec<String>,
}

/// Initialize the plugin host from the configured list of loaded plugins
pub fn init_plugin_host(settings: &Settings) -> Arc<StaticPluginHost> {
    let host = StaticPluginHost::with_loaded(settings.plugins.loaded.iter().cloned());
    info!(plugins = ?settings.plugins.loaded, "Plugin host initialized");
    Arc::new(host)
}

/// Initialize the orchestrator
///
/// # Errors
/// Returns error if the dependency HTTP client cannot be built
#[tracing::instrument(skip_all)]
pub fn init_orchestrator(
    settings: &Settings,
    executor: Arc<dyn MacroExecutor>,
    plugins: Arc<dyn PluginHost>,
) -> Result<Arc<Orchestrator>> {
    info!("Initializing orchestrator");

    let orchestrator = Orchestrator::new(settings, executor, plugins)
        .context("Failed to initialize orchestrator")?;

    info!(
        dependency_timeout_seconds = settings.scheduler.dependency_timeout_seconds,
        notification_capacity = settings.triggers.notification_capacity,
        "Orchestrator initialized"
    );
    Ok(Arc::new(orchestrator))
}

/// Load every `*.json` macro definition in `dir`, sorted by file name.
///
/// A missing directory yields no definitions. Unreadable or malformed files
/// are skipped with a warning.
///
/// # Errors
/// Returns error if the directory exists but cannot be listed
#[tracing::instrument]
pub async fn load_macro_definitions(dir: &Path) -> Result<Vec<MacroDefinition>> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        warn!(path = %dir.display(), "Macro directory not found");
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read macro directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("Failed to list macro directory")?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut definitions = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read macro definition");
                continue;
            }
        };
        match serde_json::from_str::<MacroDefinition>(&raw) {
            Ok(definition) => definitions.push(definition),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid macro definition");
            }
        }
    }

    info!(count = definitions.len(), path = %dir.display(), "Macro definitions loaded");
    Ok(definitions)
}
