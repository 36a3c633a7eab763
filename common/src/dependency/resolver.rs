// Dependency resolver
// Builds dependency objects from metadata descriptors and validates a macro's declared list

use crate::dependency::{
    DependencyType, HttpDependency, LocalDependency, MacroDependency, PluginDependency,
};
use crate::models::DependencyDescriptor;
use crate::plugin::PluginHost;
use crate::telemetry;
use futures::future::join_all;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;

/// First dependency that failed validation, with its human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyFailure {
    pub name: String,
    pub dependency_type: DependencyType,
    pub source: String,
    pub reason: String,
}

impl fmt::Display for DependencyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dependency '{}' ({}): {}",
            self.dependency_type, self.name, self.source, self.reason
        )
    }
}

/// DependencyResolver turns descriptors into live dependency objects
pub struct DependencyResolver {
    client: Client,
    plugins: Arc<dyn PluginHost>,
}

impl DependencyResolver {
    pub fn new(client: Client, plugins: Arc<dyn PluginHost>) -> Self {
        Self { client, plugins }
    }

    /// Build the dependency object for one descriptor
    pub fn resolve(&self, descriptor: &DependencyDescriptor) -> Box<dyn MacroDependency> {
        match descriptor {
            DependencyDescriptor::Remote { name, url } => {
                Box::new(HttpDependency::new(self.client.clone(), url.clone(), name.clone()))
            }
            DependencyDescriptor::Plugin {
                name,
                plugin,
                resource,
            } => Box::new(PluginDependency::new(
                Arc::clone(&self.plugins),
                name.clone(),
                plugin.clone(),
                resource.clone(),
            )),
            DependencyDescriptor::Local { name, path } => {
                Box::new(LocalDependency::new(path.clone(), name.clone()))
            }
        }
    }

    pub fn resolve_all(&self, descriptors: &[DependencyDescriptor]) -> Vec<Box<dyn MacroDependency>> {
        descriptors.iter().map(|d| self.resolve(d)).collect()
    }

    /// Validate every descriptor concurrently.
    ///
    /// Nothing is cached: each call re-checks every source. When several
    /// dependencies fail, the first one in declaration order is reported.
    #[tracing::instrument(skip_all, fields(dependency_count = descriptors.len()))]
    pub async fn validate_all(
        &self,
        descriptors: &[DependencyDescriptor],
    ) -> Result<(), DependencyFailure> {
        if descriptors.is_empty() {
            return Ok(());
        }

        let dependencies = self.resolve_all(descriptors);
        let results = join_all(dependencies.iter().map(|dep| dep.validate())).await;

        let mut first_failure = None;
        for ((descriptor, dependency), result) in
            descriptors.iter().zip(dependencies.iter()).zip(results)
        {
            if result.is_valid {
                continue;
            }

            let reason = result
                .error_message
                .unwrap_or_else(|| "validation failed".to_string());
            telemetry::record_dependency_failure(descriptor);
            tracing::warn!(
                dependency = dependency.name(),
                dependency_type = %dependency.dependency_type(),
                source = dependency.source(),
                reason = %reason,
                "Dependency validation failed"
            );

            if first_failure.is_none() {
                first_failure = Some(DependencyFailure {
                    name: dependency.name().to_string(),
                    dependency_type: dependency.dependency_type(),
                    source: dependency.source().to_string(),
                    reason,
                });
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::build_http_client;
    use crate::plugin::StaticPluginHost;
    use std::io::Write;

    fn resolver(host: StaticPluginHost) -> DependencyResolver {
        DependencyResolver::new(build_http_client(5, "test").unwrap(), Arc::new(host))
    }

    #[test]
    fn test_resolve_picks_variant_by_descriptor() {
        let resolver = resolver(StaticPluginHost::new());
        let remote = resolver.resolve(&DependencyDescriptor::Remote {
            name: "lib".to_string(),
            url: "https://example.com/lib.lua".to_string(),
        });
        assert_eq!(remote.dependency_type(), DependencyType::Remote);
        assert_eq!(remote.source(), "https://example.com/lib.lua");

        let plugin = resolver.resolve(&DependencyDescriptor::Plugin {
            name: "routes".to_string(),
            plugin: "Questionable".to_string(),
            resource: "routes".to_string(),
        });
        assert_eq!(plugin.dependency_type(), DependencyType::Plugin);
        assert_eq!(plugin.name(), "routes");
    }

    #[tokio::test]
    async fn test_validate_all_with_no_dependencies() {
        let resolver = resolver(StaticPluginHost::new());
        assert!(resolver.validate_all(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_all_reports_first_failure_in_declaration_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "ok").unwrap();

        let resolver = resolver(StaticPluginHost::new());
        let descriptors = vec![
            DependencyDescriptor::Local {
                name: "present".to_string(),
                path: file.path().to_string_lossy().into_owned(),
            },
            DependencyDescriptor::Plugin {
                name: "first-bad".to_string(),
                plugin: "Absent".to_string(),
                resource: "x".to_string(),
            },
            DependencyDescriptor::Local {
                name: "second-bad".to_string(),
                path: "/definitely/not/here.lua".to_string(),
            },
        ];

        let failure = resolver.validate_all(&descriptors).await.unwrap_err();
        assert_eq!(failure.name, "first-bad");
        assert_eq!(failure.dependency_type, DependencyType::Plugin);
        assert_eq!(failure.reason, "Plugin not loaded: Absent");
    }

    #[tokio::test]
    async fn test_validate_all_passes_when_every_source_resolves() {
        let host = StaticPluginHost::new().with_resource("Questionable", "routes", "[]");
        let resolver = resolver(host);
        let descriptors = vec![DependencyDescriptor::Plugin {
            name: "routes".to_string(),
            plugin: "Questionable".to_string(),
            resource: "routes".to_string(),
        }];
        assert!(resolver.validate_all(&descriptors).await.is_ok());
    }
}
