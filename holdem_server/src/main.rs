//! Multi-table authoritative Texas Hold'em server.
//!
//! Spawns one actor per table behind a registry, with session-based
//! reconnect and a durable chip ledger. Without a `DATABASE_URL` the
//! server runs on the in-memory ledger and mock authentication, which is
//! the local-play and test configuration.

mod api;
mod config;
mod logging;
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use ctrlc::set_handler;
use holdem::ledger::{Ledger, MemoryLedger, PgLedger};
use holdem::session::{MockVerifier, SessionManager, TicketVerifier};
use holdem::social::SocialHub;
use holdem::table::TableRegistry;

use config::ServerConfig;

const HELP: &str = "\
Run a multi-table authoritative hold'em server

USAGE:
  holdem_server [OPTIONS]

OPTIONS:
  --port      PORT       TCP port for HTTP/WebSocket     [default: env PORT or 8080]
  --db-url    URL        Postgres connection string      [default: env DATABASE_URL; in-memory ledger when unset]
  --tables    N          Number of tables on startup     [default: env NUM_TABLES or 1]

FLAGS:
  -h, --help             Print help information

ENVIRONMENT:
  PORT, DATABASE_URL, STEAM_API_KEY, STEAM_APP_ID, NUM_TABLES
  DEFAULT_BUY_IN, DEFAULT_SMALL_BLIND, DEFAULT_BIG_BLIND
  TURN_TIMEOUT_MS, COUNTDOWN_MS, PAYOUT_ANIMATION_MS, BANTER_PHASE_MS
  SESSION_GRACE_MS, SOCIAL_TICK_HZ, LEDGER_TIMEOUT_MS
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // .env never overrides real environment variables.
    let _ = dotenvy::dotenv();

    let mut pargs = pico_args::Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    let port_override: Option<u16> = pargs.opt_value_from_str("--port")?;
    let db_override: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let tables_override: Option<usize> = pargs.opt_value_from_str("--tables")?;

    set_handler(|| std::process::exit(0))?;
    logging::init();

    let metrics_addr: SocketAddr = std::env::var("METRICS_BIND")
        .unwrap_or_else(|_| "127.0.0.1:9090".to_string())
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid METRICS_BIND: {e}"))?;
    if let Err(e) = metrics::init_metrics(metrics_addr) {
        tracing::warn!("metrics unavailable: {e}");
    } else {
        tracing::info!("metrics endpoint at http://{metrics_addr}/metrics");
    }

    let config = ServerConfig::from_env(port_override, db_override, tables_override);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    tracing::info!("configuration loaded and validated");

    // Ledger: Postgres when configured, in-memory otherwise.
    let (ledger, pg): (Arc<dyn Ledger>, Option<PgLedger>) = match &config.database_url {
        Some(url) => {
            tracing::info!("connecting to database");
            let pg = PgLedger::connect(url, config.default_buy_in, config.ledger_timeout)
                .await
                .map_err(|e| anyhow::anyhow!("database connection failed: {e}"))?;
            tracing::info!("database connected");
            (Arc::new(pg.clone()), Some(pg))
        }
        None => {
            tracing::warn!("no DATABASE_URL set; chip balances are in-memory only");
            (Arc::new(MemoryLedger::new(config.default_buy_in)), None)
        }
    };

    // Identity: the Steam Web API adapter is wired in by the deployment;
    // this binary ships the mock mode.
    let verifier: Arc<dyn TicketVerifier> = Arc::new(MockVerifier);
    if config.steam_api_key.is_some() {
        tracing::warn!(
            app_id = config.steam_app_id,
            "STEAM_API_KEY is set but this build links the mock verifier; \
             wire the Steam adapter in the deployment"
        );
    } else {
        tracing::info!("mock authentication active (tickets: mock:<id>:<name>)");
    }

    let (sessions, expired) = SessionManager::new(verifier, config.session_grace);
    let registry = TableRegistry::new(Arc::clone(&sessions), Arc::clone(&ledger));
    registry.spawn_expiry_sweeper(expired);

    let social = SocialHub::new(holdem::social::DEFAULT_OUTBOX_CAPACITY);
    social.spawn_flusher(Arc::clone(&sessions), config.social_tick_hz);

    tracing::info!("creating {} table(s)", config.num_tables);
    for i in 0..config.num_tables {
        let table_config = config.table_config(format!("Table {}", i + 1));
        match registry.create_table(table_config).await {
            Ok(id) => tracing::info!("created table {id}"),
            Err(e) => tracing::error!("failed to create table {}: {e}", i + 1),
        }
    }
    for summary in registry.list().await {
        tracing::info!(
            "  - {} (id {}) {}/{} seats, blinds {}",
            summary.name,
            summary.id,
            summary.seats_filled,
            summary.max_seats,
            summary.blinds,
        );
    }

    // Gauge refresher.
    {
        let registry = Arc::clone(&registry);
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(15));
            loop {
                interval.tick().await;
                metrics::active_tables(registry.table_count().await);
                metrics::active_sessions(sessions.session_count().await);
            }
        });
    }

    let state = api::AppState {
        sessions,
        registry,
        social,
        pg,
        config: config.clone(),
    };
    let app = api::create_router(state);

    let bind: SocketAddr = ([0, 0, 0, 0], config.port).into();
    tracing::info!("listening on http://{bind}");
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {bind}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    tracing::info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
}
