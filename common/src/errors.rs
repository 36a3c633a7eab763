// Error handling framework for the orchestration engine

use crate::models::MacroType;
use std::time::Duration;
use thiserror::Error;

/// Trigger dispatch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error(
        "Trigger event handling for {macro_type} macros is not supported (macro '{macro_name}', function '{function_name}')"
    )]
    UnsupportedMacroType {
        macro_name: String,
        macro_type: MacroType,
        function_name: String,
    },

    #[error("Notification sink panicked while dispatching to macro '{macro_name}' (function '{function_name}')")]
    SinkPanicked {
        macro_name: String,
        function_name: String,
    },
}

/// Dependency fetch errors
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("HTTP request failed with status code: {status}")]
    HttpStatus { url: String, status: String },

    #[error("Failed to read dependency content from {source_path}: {reason}")]
    ReadFailed { source_path: String, reason: String },

    #[error("Plugin not loaded: {0}")]
    PluginNotLoaded(String),

    #[error("Plugin '{plugin}' does not provide resource '{resource}'")]
    ResourceNotFound { plugin: String, resource: String },
}

/// Macro execution collaborator errors
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Unknown macro: {0}")]
    UnknownMacro(String),

    #[error("Execution failed: {0}")]
    Failed(String),
}

/// Scheduler errors
///
/// The display strings are shown to users when a manual start is refused.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Macro '{macro_name}' cannot start: dependency '{dependency}' failed validation: {reason}")]
    DependencyFailed {
        macro_name: String,
        dependency: String,
        reason: String,
    },

    #[error("Macro '{macro_name}' cannot start: required plugin '{plugin}' is not loaded")]
    PluginNotLoaded { macro_name: String, plugin: String },

    #[error("Macro '{macro_name}' cannot start: dependency validation timed out after {timeout:?}")]
    DependencyTimeout { macro_name: String, timeout: Duration },

    #[error("Macro '{0}' is already being started")]
    StartInProgress(String),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
