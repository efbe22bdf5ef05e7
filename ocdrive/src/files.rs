use std::path::Path;

use async_trait::async_trait;

/// Read-only filesystem access
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Fails with `NotFound` when `path` is absent
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// Local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

#[async_trait]
impl FileReader for LocalFiles {
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}
