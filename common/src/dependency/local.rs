// Local dependency: a file on the local filesystem

use crate::dependency::{DependencyType, DependencyValidationResult, MacroDependency};
use crate::errors::DependencyError;
use async_trait::async_trait;
use uuid::Uuid;

pub struct LocalDependency {
    id: String,
    name: String,
    path: String,
}

impl LocalDependency {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl MacroDependency for LocalDependency {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dependency_type(&self) -> DependencyType {
        DependencyType::Local
    }

    fn source(&self) -> &str {
        &self.path
    }

    async fn get_content(&self) -> Result<String, DependencyError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DependencyError::ReadFailed {
                source_path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn validate(&self) -> DependencyValidationResult {
        match self.get_content().await {
            Ok(_) => DependencyValidationResult::success(),
            Err(e) => DependencyValidationResult::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "print('hello')").unwrap();

        let dep = LocalDependency::new(file.path().to_string_lossy(), "helper");
        assert_eq!(dep.get_content().await.unwrap(), "print('hello')");
        assert!(dep.is_available().await);
        assert!(dep.validate().await.is_valid);
    }

    #[tokio::test]
    async fn test_missing_file_fails_with_path_in_reason() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.lua");
        let dep = LocalDependency::new(missing.to_string_lossy(), "helper");

        assert!(!dep.is_available().await);
        let result = dep.validate().await;
        assert!(!result.is_valid);
        assert!(result.error_message.unwrap().contains("nope.lua"));
    }

    #[tokio::test]
    async fn test_directory_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let dep = LocalDependency::new(dir.path().to_string_lossy(), "dir");
        assert!(!dep.is_available().await);
        assert!(!dep.validate().await.is_valid);
    }
}
