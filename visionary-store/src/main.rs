//! visionary-store - template storefront service
//!
//! Serves the catalog, visitor chat, admin back-office and AI assistant over
//! HTTP. Configuration priority: CLI > environment > TOML file > defaults.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visionary_assistant::{Assistant, GeminiClient, UnconfiguredAssistant};
use visionary_common::catalog::sample_templates;
use visionary_common::config::{load_toml_or_default, ConfigOverrides, StoreConfig};
use visionary_store::backend::{Backend, DisconnectedBackend, MemoryBackend, RestBackend};
use visionary_store::feed::spawn_poller;
use visionary_store::{build_router, AppState};

/// Command-line arguments for visionary-store
#[derive(Parser, Debug)]
#[command(name = "visionary-store")]
#[command(about = "Video template storefront with live chat and admin back-office")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/visionary/store.toml)
    #[arg(short, long, env = "VISIONARY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Hosted backend project URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Hosted backend anon key
    #[arg(long)]
    backend_key: Option<String>,

    /// Admin passcode (empty disables the admin gate)
    #[arg(long)]
    admin_passcode: Option<String>,

    /// Seconds between backend polls (0 = off)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Run against an in-process store seeded with the sample catalog
    #[arg(long)]
    offline: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend_url: self.backend_url.clone(),
            backend_key: self.backend_key.clone(),
            admin_passcode: self.admin_passcode.clone(),
            bind: self.bind.clone(),
            port: self.port,
            poll_interval_secs: self.poll_interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "visionary_store=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Visionary Store (visionary-store) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml_config = load_toml_or_default(args.config.as_deref());
    let config = StoreConfig::resolve(&args.overrides(), &toml_config)
        .context("Failed to resolve configuration")?;

    let backend = select_backend(&args, &config)?;
    info!("Backend: {}", backend.name());

    let assistant = select_assistant(&config)?;

    if config.admin_gate_enabled() {
        info!("Admin gate enabled");
    } else {
        warn!("Admin passcode is empty: admin endpoints are open to everyone");
    }

    let state = AppState::new(backend, assistant, &config);

    state.storefront.refresh().await;
    let (source, connection_error) = state.storefront.data_source().await;
    match connection_error {
        Some(e) => warn!("Serving built-in catalog ({:?}): {}", source, e),
        None => info!("Catalog loaded from {:?}", source),
    }

    let poller = config
        .poll_interval()
        .map(|period| spawn_poller(state.storefront.clone(), period));

    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("visionary-store listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(poller) = poller {
        poller.abort();
    }
    info!("Server shutdown complete");
    Ok(())
}

fn select_backend(args: &Args, config: &StoreConfig) -> Result<Arc<dyn Backend>> {
    if args.offline {
        info!("Offline mode: in-memory store seeded with the sample catalog");
        return Ok(Arc::new(MemoryBackend::with_templates(sample_templates())));
    }

    if !config.is_backend_configured() {
        warn!("Backend credentials missing or malformed; the storefront will show its built-in catalog");
        return Ok(Arc::new(DisconnectedBackend::default()));
    }

    let backend = RestBackend::new(&config.backend_url, &config.backend_key, config.request_timeout())
        .context("Failed to create backend client")?;
    info!("Backend URL: {}", backend.base_url());
    Ok(Arc::new(backend))
}

fn select_assistant(config: &StoreConfig) -> Result<Arc<dyn Assistant>> {
    match &config.gemini_api_key {
        Some(key) => {
            let client = GeminiClient::new(
                key.clone(),
                config.gemini_model.clone(),
                config.gemini_base_url.clone(),
                config.request_timeout(),
            )
            .context("Failed to create assistant client")?;
            info!("Assistant model: {}", client.model());
            Ok(Arc::new(client))
        }
        None => {
            warn!("No assistant API key configured; assistant replies will be apologies");
            Ok(Arc::new(UnconfiguredAssistant))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
