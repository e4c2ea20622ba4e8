use anyhow::{Context, Result};
use clap::Parser;
use coup_server::{Api, Catalog, Server, ServerConfig};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Coup table server")]
struct Args {
    /// Host interface to bind (default: localhost, or COUP_HOST).
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind (default: 8080, or COUP_PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Outbound messages buffered per connection (0 uses default).
    #[arg(long)]
    mailbox_capacity: Option<usize>,

    /// Largest inbound frame in bytes (0 uses default).
    #[arg(long)]
    max_frame_bytes: Option<usize>,

    /// Close a connection after this long without inbound traffic (0 uses default).
    #[arg(long)]
    read_deadline_ms: Option<u64>,

    /// Close a connection when a write takes longer than this (0 uses default).
    #[arg(long)]
    write_deadline_ms: Option<u64>,

    /// Ping idle connections at this interval (0 uses default).
    #[arg(long)]
    keepalive_ms: Option<u64>,

    /// Directory of <lang>.json translation files.
    #[arg(long)]
    locales_dir: Option<PathBuf>,

    #[arg(long)]
    default_language: Option<String>,

    /// Players needed before a table may start (0 uses default).
    #[arg(long)]
    min_players: Option<usize>,

    /// Seats per table (0 uses default).
    #[arg(long)]
    max_players: Option<usize>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("invalid {key}={raw}: {err}")),
        _ => Ok(None),
    }
}

fn map_optional_default_on_zero<T: Copy + PartialEq + From<u8>>(arg: Option<T>, default: T) -> T {
    match arg {
        Some(v) if v == T::from(0) => default,
        Some(v) => v,
        None => default,
    }
}

fn build_config(args: &Args) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    let host = match args.host {
        Some(host) => host,
        None => read_env("COUP_HOST")?.unwrap_or(defaults.host),
    };
    let port = match args.port {
        Some(port) => port,
        None => read_env("COUP_PORT")?.unwrap_or(defaults.port),
    };

    let config = ServerConfig {
        host,
        port,
        mailbox_capacity: map_optional_default_on_zero(args.mailbox_capacity, defaults.mailbox_capacity),
        max_frame_bytes: map_optional_default_on_zero(args.max_frame_bytes, defaults.max_frame_bytes),
        read_deadline_ms: map_optional_default_on_zero(args.read_deadline_ms, defaults.read_deadline_ms),
        write_deadline_ms: map_optional_default_on_zero(args.write_deadline_ms, defaults.write_deadline_ms),
        keepalive_ms: map_optional_default_on_zero(args.keepalive_ms, defaults.keepalive_ms),
        locales_dir: args.locales_dir.clone().unwrap_or(defaults.locales_dir),
        default_language: args
            .default_language
            .clone()
            .unwrap_or(defaults.default_language),
        min_players: map_optional_default_on_zero(args.min_players, defaults.min_players),
        max_players: map_optional_default_on_zero(args.max_players, defaults.max_players),
        log_level: args.log_level.clone().unwrap_or(defaults.log_level),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(?err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    init_tracing(&config.log_level);

    let catalog = Catalog::load(&config.locales_dir, &config.default_language)
        .with_context(|| format!("failed to load locales from {}", config.locales_dir.display()))?;
    info!(languages = ?catalog.languages(), "translations loaded");

    let addr = config.bind_addr();
    let server = Arc::new(Server::new(config, Arc::new(catalog)).context("invalid configuration")?);
    let app = Api::new(server.clone()).router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "coup server listening");

    let shutdown_server = server.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let closed = shutdown_server.shutdown();
            info!(closed, "shutting down");
        })
        .await
        .context("axum server error")?;

    Ok(())
}
