//! Spend guard service for the affiliate ads marketplace.
//!
//! Businesses list offers, affiliates promote them with ads that run on Meta,
//! and every ad's spend is funded from the affiliate's prepaid wallet. This
//! service keeps the stored spend of live ads in line with Meta and pauses ads
//! whose affiliate can no longer pay for them.
//!
//!
//!
//! # General Infrastructure
//! - All state lives in the hosted Postgres, reached through its REST endpoint
//! - Meta is the source of truth for spend and clicks, stored values are overwritten
//! - An operational caller (`process`) hits the spend check on a schedule
//! - No request is retried here, the next scheduled run is the retry
//!
//!
//!
//! # Wallet Guard
//!
//! **Goal**: an ad must not keep running once its affiliate's wallet cannot cover
//! the ad's unpaid spend.
//!
//! - `unpaid = max(0, spend - spend_transferred)`
//! - `available = sum(max(0, net - refunded))` over succeeded top-ups, minus deductions
//! - Keep delivering only while `available > 0 && available >= unpaid`
//! - Ads already paused, archived or deleted are left alone, as are ads with nothing unpaid
//! - Pausing calls Meta first, then flips the local row with a conditional update
//!   so a concurrent pause or settlement cannot be overwritten
//!
//!
//!
//! # Endpoints
//! - `POST /ads/spend-check` with `{ "adId": ".." }` or `{ "adIds": [..] }`
//! - `POST /ads/sync-insights` same body, syncs spend without the guard
//! - `GET /wallets/{email}/balance`
//! - `GET /health`
//!
//! Batch endpoints answer 200 when every ad succeeded and 207 otherwise, with one
//! result per requested id. Bad input is a 400.
//!
//!
//!
//! # Setup
//!
//! Secrets are read from `/run/secrets` (override with `SECRETS_DIR`) and fall back
//! to environment variables of the same name.
//! ```sh
//! export SUPABASE_URL=https://project.supabase.co
//! export SUPABASE_SERVICE_ROLE_KEY=...
//! export META_ACCESS_TOKEN=...
//! RUST_LOG=server=debug,info cargo run -p backend
//! ```
//!
//! Run a spend check over a list of ads every 15 minutes.
//! ```sh
//! cargo run -p process -- --file ads.txt --interval-mins 15
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod meta;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod utils;

#[cfg(test)]
mod testing;

use config::Config;
use routes::{health_handler, spend_check_handler, sync_insights_handler, wallet_balance_handler};
use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/ads/spend-check", post(spend_check_handler))
        .route("/ads/sync-insights", post(sync_insights_handler))
        .route("/wallets/{email}/balance", get(wallet_balance_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
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
