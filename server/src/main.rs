use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tapcoin_engine::{MemoryStore, PlayerStore};
use tapcoin_server::{Api, App, AuthVerifier, ServerConfig, SqliteStore};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Path to the SQLite player database (in-memory store when omitted).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Number of rows returned by the leaderboard (0 uses default).
    #[arg(long)]
    leaderboard_limit: Option<usize>,

    /// Budget for a single player-store call in milliseconds (0 uses default).
    #[arg(long)]
    store_timeout_ms: Option<u64>,

    /// HTTP rate limit per IP in requests per second (0 disables rate limiting).
    #[arg(long)]
    http_rate_limit_per_second: Option<u64>,

    /// HTTP rate limit burst size (0 disables rate limiting).
    #[arg(long)]
    http_rate_limit_burst: Option<u32>,

    /// Max request body size in bytes (0 disables limit).
    #[arg(long)]
    http_body_limit_bytes: Option<usize>,

    /// Combo probability per accepted tap, in [0, 1] (default: 0.05).
    #[arg(long)]
    combo_chance: Option<f64>,

    /// Skip init-data verification and trust the identity header.
    /// Local development only.
    #[arg(long, default_value_t = false)]
    insecure_allow_unverified: bool,
}

fn is_production() -> bool {
    matches!(
        std::env::var("NODE_ENV").as_deref(),
        Ok("production") | Ok("prod")
    )
}

/// Maps an optional arg value to Option: 0 => None, Some(v) => Some(v), None => default
fn map_optional_limit<T: Copy + PartialEq + From<u8>>(
    arg: Option<T>,
    default: Option<T>,
) -> Option<T> {
    match arg {
        Some(v) if v == T::from(0) => None,
        Some(v) => Some(v),
        None => default,
    }
}

/// Maps an optional arg value keeping default on 0: 0 => default, Some(v) => Some(v), None => default
fn map_default_on_zero<T: Copy + PartialEq + From<u8>>(arg: Option<T>, default: T) -> T {
    match arg {
        Some(v) if v == T::from(0) => default,
        Some(v) => v,
        None => default,
    }
}

fn build_config(args: &Args) -> ServerConfig {
    let defaults = ServerConfig::default();
    ServerConfig {
        leaderboard_limit: map_default_on_zero(args.leaderboard_limit, defaults.leaderboard_limit),
        store_timeout_ms: map_default_on_zero(args.store_timeout_ms, defaults.store_timeout_ms),
        combo_chance: args
            .combo_chance
            .map(|chance| chance.clamp(0.0, 1.0))
            .unwrap_or(defaults.combo_chance),
        http_rate_limit_per_second: map_optional_limit(
            args.http_rate_limit_per_second,
            defaults.http_rate_limit_per_second,
        ),
        http_rate_limit_burst: map_optional_limit(
            args.http_rate_limit_burst,
            defaults.http_rate_limit_burst,
        ),
        http_body_limit_bytes: map_optional_limit(
            args.http_body_limit_bytes,
            defaults.http_body_limit_bytes,
        ),
    }
}

fn require_env(var: &str) -> Result<String> {
    let value = std::env::var(var).unwrap_or_default();
    if value.trim().is_empty() {
        anyhow::bail!("Missing required env: {var}");
    }
    Ok(value)
}

fn ensure_production_env(args: &Args) -> Result<()> {
    if !is_production() {
        return Ok(());
    }
    if args.insecure_allow_unverified {
        anyhow::bail!("--insecure-allow-unverified is not permitted in production");
    }
    require_env("ALLOWED_HTTP_ORIGINS")?;
    require_env("METRICS_AUTH_TOKEN")?;
    if args.db_path.is_none() {
        anyhow::bail!("--db-path is required in production");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    init_tracing();

    ensure_production_env(&args)?;

    let verifier = if args.insecure_allow_unverified {
        tracing::warn!("identity verification disabled; trusting the identity header");
        AuthVerifier::Insecure
    } else {
        let bot_token = require_env("BOT_TOKEN").context("init-data verification needs the bot token")?;
        AuthVerifier::telegram(&bot_token)
    };

    let store: Arc<dyn PlayerStore> = match &args.db_path {
        Some(path) => {
            let store = SqliteStore::open(path).context("open player store")?;
            Arc::new(store)
        }
        None => {
            info!("no --db-path given; using in-memory player store");
            Arc::new(MemoryStore::new())
        }
    };

    let config = build_config(&args);
    let app = Arc::new(App::new(store, verifier, config));
    let api = Api::new(app);
    let router = api.router();

    // Start server
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}
