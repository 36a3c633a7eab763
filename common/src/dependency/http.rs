// HTTP dependency: a file fetched from a remote URL

use crate::dependency::{DependencyType, DependencyValidationResult, MacroDependency};
use crate::errors::DependencyError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use uuid::Uuid;

/// Build the HTTP client shared by every remote dependency
pub fn build_http_client(timeout_seconds: u64, user_agent: &str) -> Result<Client, DependencyError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(user_agent)
        .build()
        .map_err(|e| DependencyError::ClientBuild(e.to_string()))
}

/// HttpDependency fetches its content with a GET request to `url`
pub struct HttpDependency {
    client: Client,
    id: String,
    name: String,
    url: String,
}

impl HttpDependency {
    /// The client is cheap to clone and shares its connection pool
    pub fn new(client: Client, url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            url: url.into(),
        }
    }

    async fn fetch(&self) -> Result<reqwest::Response, DependencyError> {
        self.client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DependencyError::RequestFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl MacroDependency for HttpDependency {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dependency_type(&self) -> DependencyType {
        DependencyType::Remote
    }

    fn source(&self) -> &str {
        &self.url
    }

    #[tracing::instrument(skip(self), fields(dependency = %self.name, url = %self.url))]
    async fn get_content(&self) -> Result<String, DependencyError> {
        let response = self.fetch().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DependencyError::HttpStatus {
                url: self.url.clone(),
                status: status.to_string(),
            });
        }

        response.text().await.map_err(|e| DependencyError::ReadFailed {
            source_path: self.url.clone(),
            reason: e.to_string(),
        })
    }

    async fn is_available(&self) -> bool {
        match self.fetch().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(dependency = %self.name, error = %e, "Remote dependency unreachable");
                false
            }
        }
    }

    #[tracing::instrument(skip(self), fields(dependency = %self.name, url = %self.url))]
    async fn validate(&self) -> DependencyValidationResult {
        let response = match self.fetch().await {
            Ok(response) => response,
            Err(e) => {
                return DependencyValidationResult::failure(format!(
                    "Error validating HTTP dependency: {}",
                    e
                ))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return DependencyValidationResult::failure(format!(
                "HTTP request failed with status code: {}",
                status
            ));
        }

        match response.text().await {
            Ok(_) => DependencyValidationResult::success(),
            Err(e) => DependencyValidationResult::failure(format!(
                "Error validating HTTP dependency: {}",
                e
            )),
        }
    }
}
