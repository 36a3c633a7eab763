// Plugin dependency: a resource published by another loaded plugin

use crate::dependency::{DependencyType, DependencyValidationResult, MacroDependency};
use crate::errors::DependencyError;
use crate::plugin::PluginHost;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub struct PluginDependency {
    host: Arc<dyn PluginHost>,
    id: String,
    name: String,
    plugin: String,
    resource: String,
    source: String,
}

impl PluginDependency {
    pub fn new(
        host: Arc<dyn PluginHost>,
        name: impl Into<String>,
        plugin: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        let plugin = plugin.into();
        let resource = resource.into();
        let source = format!("{}/{}", plugin, resource);
        Self {
            host,
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            plugin,
            resource,
            source,
        }
    }
}

#[async_trait]
impl MacroDependency for PluginDependency {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dependency_type(&self) -> DependencyType {
        DependencyType::Plugin
    }

    fn source(&self) -> &str {
        &self.source
    }

    async fn get_content(&self) -> Result<String, DependencyError> {
        if !self.host.is_loaded(&self.plugin) {
            return Err(DependencyError::PluginNotLoaded(self.plugin.clone()));
        }
        self.host
            .resource(&self.plugin, &self.resource)
            .ok_or_else(|| DependencyError::ResourceNotFound {
                plugin: self.plugin.clone(),
                resource: self.resource.clone(),
            })
    }

    async fn is_available(&self) -> bool {
        self.host.is_loaded(&self.plugin)
    }

    async fn validate(&self) -> DependencyValidationResult {
        match self.get_content().await {
            Ok(_) => DependencyValidationResult::success(),
            Err(e) => DependencyValidationResult::failure(e.to_string()),
        }
    }
}
