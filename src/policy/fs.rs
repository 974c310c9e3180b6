use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use super::{PolicyStore, ResolveError};

/// Policy files laid out flat in a single directory.
pub struct FsPolicyStore {
    root: PathBuf,
}

impl FsPolicyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PolicyStore for FsPolicyStore {
    async fn fetch(&self, name: &str) -> Result<Bytes, ResolveError> {
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(contents) => {
                trace!(path = %path.display(), bytes = contents.len(), "policy file read");
                Ok(Bytes::from(contents))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ResolveError::NotFound(name.to_owned())),
            Err(e) => Err(ResolveError::IoFailure(e)),
        }
    }
}
