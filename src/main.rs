mod auth;
mod config;
mod http;
mod metrics;
mod policy;

use std::io::BufRead as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::auth::credentials::CredentialStore;
use crate::config::Config;
use crate::metrics::MetricsRegistry;
use crate::policy::fs::FsPolicyStore;
use crate::policy::PolicyResolver;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "policyserver", about = "Basic-auth gated policy file server")]
struct Cli {
    /// Path to the YAML configuration file.  Built-in defaults are used when
    /// omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Override `http_listen` from the configuration.
    #[arg(short, long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a secret from stdin and print the `sha256` value for a pre-hashed
    /// `users` entry.
    HashSecret {
        /// Salt to store alongside the digest.
        #[arg(long)]
        salt: String,
    },
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Read-only state shared by every request handler.
pub struct AppState {
    pub credentials: CredentialStore,
    pub resolver: PolicyResolver,
    pub metrics: MetricsRegistry,
    /// Pre-rendered `WWW-Authenticate` value.
    pub challenge: HeaderValue,
    /// `Content-Type` of successful policy responses.
    pub content_type: HeaderValue,
}

impl AppState {
    /// Build the state for `config`, reading policies from `policies.dir`.
    pub fn from_config(config: &Config, metrics: MetricsRegistry) -> Result<Self> {
        let credentials = CredentialStore::from_config(&config.users)?;
        anyhow::ensure!(!credentials.is_empty(), "at least one user must be configured");

        let store = Arc::new(FsPolicyStore::new(&config.policies.dir));
        let resolver = PolicyResolver::new(
            store,
            config.policies.suffix.clone(),
            Duration::from_secs(config.policies.read_timeout_secs),
        );

        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", config.realm))
            .with_context(|| format!("invalid realm: {:?}", config.realm))?;
        let content_type = HeaderValue::from_str(&config.policies.content_type).with_context(|| {
            format!("invalid content_type: {:?}", config.policies.content_type)
        })?;

        Ok(Self {
            credentials,
            resolver,
            metrics,
            challenge,
            content_type,
        })
    }
}

// ---------------------------------------------------------------------------
// HTTP servers (axum)
// ---------------------------------------------------------------------------

async fn run_http_server(state: Arc<AppState>, listen: String) -> Result<()> {
    let app = http::handler::create_router(state);

    let listen_addr: std::net::SocketAddr =
        listen.parse().context("invalid http_listen address")?;

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn run_metrics_server(metrics: MetricsRegistry, listen: String) -> Result<()> {
    let app = http::handler::create_metrics_router(metrics);

    let listen_addr: std::net::SocketAddr =
        listen.parse().context("invalid metrics_listen address")?;

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "metrics server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("metrics server error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn hash_secret_from_stdin(salt: &str) -> Result<()> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read secret from stdin")?;
    let secret = line.trim_end_matches(['\r', '\n']);
    println!("{}", auth::credentials::hash_secret(salt, secret));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    if let Some(Command::HashSecret { salt }) = &cli.command {
        return hash_secret_from_stdin(salt);
    }

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // ---- Config ----
    let mut config = match cli.config.as_deref() {
        Some(path) => {
            tracing::info!(config_path = %path, "loading configuration");
            config::load_config(path)?
        }
        None => {
            tracing::warn!("no --config given, using built-in defaults");
            Config::default()
        }
    };
    if let Some(listen) = cli.listen {
        config.http_listen = listen;
    }
    config::validate_config(&config)?;
    let config = Arc::new(config);

    // ---- Metrics ----
    let metrics = MetricsRegistry::new();

    // ---- App state ----
    let state = Arc::new(AppState::from_config(&config, metrics.clone())?);
    tracing::info!(
        users = state.credentials.len(),
        policy_dir = %config.policies.dir.display(),
        "starting policyserver"
    );

    // ---- Spawn services ----
    let metrics_handle = config.metrics_listen.clone().map(|listen| {
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(metrics, listen).await {
                tracing::error!(error = %e, "metrics server failed");
            }
        })
    });

    let result = run_http_server(state, config.http_listen.clone()).await;

    if let Some(handle) = metrics_handle {
        if result.is_err() {
            handle.abort();
        }
        let _ = handle.await;
    }

    result?;
    tracing::info!("policyserver shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_from_default_config() {
        let state = AppState::from_config(&Config::default(), MetricsRegistry::new()).unwrap();
        assert_eq!(state.challenge, "Basic realm=\"Policies\"");
        assert_eq!(state.content_type, "application/json");
        assert!(state.credentials.verify("someuser", "password"));
        assert_eq!(state.resolver.resource_name("someuser"), "someuser.policies");
    }

    #[test]
    fn state_rejects_unencodable_realm() {
        let config = Config {
            realm: "bad\nrealm".to_string(),
            ..Config::default()
        };
        assert!(AppState::from_config(&config, MetricsRegistry::new()).is_err());
    }

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::parse_from(["policyserver", "--config", "p.yaml", "--listen", "0.0.0.0:9000"]);
        assert_eq!(cli.config.as_deref(), Some("p.yaml"));
        assert_eq!(cli.listen.as_deref(), Some("0.0.0.0:9000"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_hash_secret() {
        let cli = Cli::parse_from(["policyserver", "hash-secret", "--salt", "pepper"]);
        assert!(matches!(cli.command, Some(Command::HashSecret { salt }) if salt == "pepper"));
    }
}
