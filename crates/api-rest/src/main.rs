//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the intake REST API on its own.
//!
//! ## Intended use
//! Useful for development when you only want the REST server. The workspace's main
//! `intake-run` binary serves the same router.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the intake REST API server
///
/// # Environment Variables
/// - `INTAKE_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `INTAKE_SESSION_TTL_SECS`: Idle time before a session is evicted (default: 1800)
/// - Store, collection and phone policy variables as read by `IntakeConfig::from_lookup`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("intake_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("INTAKE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let config = api_rest::config_from_env()?;
    tracing::info!(
        "-- Starting intake REST API on {} (collection: {})",
        addr,
        config.collection()
    );

    let state = api_rest::AppState::from_config(config)?
        .with_session_ttl(api_rest::session_ttl_from_env()?);
    api_rest::serve(&addr, state).await
}
