// Dependency module for resources a macro needs before it may run
// Provides the MacroDependency trait and its remote, plugin and local sources

pub mod http;
pub mod local;
pub mod plugin;
pub mod resolver;

pub use http::{build_http_client, HttpDependency};
pub use local::LocalDependency;
pub use plugin::PluginDependency;
pub use resolver::{DependencyFailure, DependencyResolver};

use crate::errors::DependencyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// DependencyType identifies where a dependency is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    Remote,
    Plugin,
    Local,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Remote => f.write_str("remote"),
            DependencyType::Plugin => f.write_str("plugin"),
            DependencyType::Local => f.write_str("local"),
        }
    }
}

/// Outcome of a dependency validation, never an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyValidationResult {
    pub is_valid: bool,
    pub error_message: Option<String>,
}

impl DependencyValidationResult {
    pub fn success() -> Self {
        Self {
            is_valid: true,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
        }
    }
}

/// MacroDependency is an external resource declared by a macro.
///
/// Implementations hold no resolved state: every call goes back to the source.
#[async_trait]
pub trait MacroDependency: Send + Sync {
    /// Generated at construction, unique per dependency object
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn dependency_type(&self) -> DependencyType;

    /// Locator of the resource (URL, plugin/resource pair or path)
    fn source(&self) -> &str;

    /// Retrieve the payload, failing on any transport or status error
    async fn get_content(&self) -> Result<String, DependencyError>;

    /// Best-effort reachability probe
    async fn is_available(&self) -> bool;

    /// Confirm the payload can be fetched and read
    async fn validate(&self) -> DependencyValidationResult;
}
