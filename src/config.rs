use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Socket address for the policy listener (e.g. `127.0.0.1:9000`).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
    /// Socket address for the Prometheus listener.  No metrics endpoint is
    /// served when unset.
    #[serde(default)]
    pub metrics_listen: Option<String>,
    /// Realm advertised in the `WWW-Authenticate` challenge.
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Registered users, keyed by username.
    #[serde(default = "default_users")]
    pub users: HashMap<String, UserEntry>,
    #[serde(default)]
    pub policies: PolicyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
            metrics_listen: None,
            realm: default_realm(),
            users: default_users(),
            policies: PolicyConfig::default(),
        }
    }
}

fn default_http_listen() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_realm() -> String {
    "Policies".to_string()
}

fn default_users() -> HashMap<String, UserEntry> {
    HashMap::from([(
        "someuser".to_string(),
        UserEntry::Plain("password".to_string()),
    )])
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A configured secret, either in plaintext or pre-hashed.
///
/// Pre-hashed entries carry `sha256 = hex(SHA-256(salt ":" secret))`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UserEntry {
    Plain(String),
    Hashed { salt: String, sha256: String },
}

impl fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain(<redacted>)"),
            Self::Hashed { salt, .. } => f
                .debug_struct("Hashed")
                .field("salt", salt)
                .field("sha256", &"<redacted>")
                .finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Directory holding the `<username><suffix>` files.
    #[serde(default = "default_policy_dir")]
    pub dir: PathBuf,
    /// Suffix appended to the username to form the resource name.
    #[serde(default = "default_policy_suffix")]
    pub suffix: String,
    /// `Content-Type` sent with a successful policy response.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Upper bound (seconds) on a single policy read.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dir: default_policy_dir(),
            suffix: default_policy_suffix(),
            content_type: default_content_type(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

fn default_policy_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_policy_suffix() -> String {
    ".policies".to_string()
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_read_timeout_secs() -> u64 {
    5
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Sanity checks that cannot be expressed purely with serde.
pub fn validate_config(config: &Config) -> Result<()> {
    config
        .http_listen
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid http_listen address: {}", config.http_listen))?;
    if let Some(ref addr) = config.metrics_listen {
        addr.parse::<SocketAddr>()
            .with_context(|| format!("invalid metrics_listen address: {addr}"))?;
    }
    anyhow::ensure!(!config.users.is_empty(), "at least one user must be configured");
    for username in config.users.keys() {
        anyhow::ensure!(!username.is_empty(), "usernames must not be empty");
        anyhow::ensure!(
            !username.contains([':', '/', '\\']),
            "username {username:?} must not contain ':', '/' or '\\'"
        );
    }
    anyhow::ensure!(
        config.policies.read_timeout_secs > 0,
        "policies.read_timeout_secs must be greater than 0"
    );
    anyhow::ensure!(
        !config.policies.content_type.trim().is_empty(),
        "policies.content_type must not be empty"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
