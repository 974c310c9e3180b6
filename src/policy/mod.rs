//! Policy resource resolution.
//!
//! Maps an already-authenticated username to the bytes of its policy
//! resource.  The resolver performs no authorization of its own; callers must
//! only pass usernames that came out of [`crate::auth::gate::authenticate`].

pub mod fs;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("policy resource {0:?} not found")]
    NotFound(String),
    #[error("failed to read policy resource: {0}")]
    IoFailure(#[from] std::io::Error),
}

/// Storage collaborator that owns the policy blobs.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch the resource stored under `name`, verbatim.
    async fn fetch(&self, name: &str) -> Result<Bytes, ResolveError>;
}

/// Derives resource names from usernames and fetches them with a deadline.
#[derive(Clone)]
pub struct PolicyResolver {
    store: Arc<dyn PolicyStore>,
    suffix: String,
    read_timeout: Duration,
}

impl PolicyResolver {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        suffix: impl Into<String>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            store,
            suffix: suffix.into(),
            read_timeout,
        }
    }

    /// Resource name for `username`: the username followed by the suffix.
    pub fn resource_name(&self, username: &str) -> String {
        format!("{username}{}", self.suffix)
    }

    /// Return the policy bytes owned by `username`.
    #[instrument(skip(self))]
    pub async fn resolve(&self, username: &str) -> Result<Bytes, ResolveError> {
        let name = self.resource_name(username);
        if !is_plain_name(&name) {
            return Err(ResolveError::NotFound(name));
        }

        debug!(%name, "reading policies");
        match tokio::time::timeout(self.read_timeout, self.store.fetch(&name)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("reading {name:?} exceeded {:?}", self.read_timeout),
            ))),
        }
    }
}

/// A name that addresses a single entry directly under the storage root.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
