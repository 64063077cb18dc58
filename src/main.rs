use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use intake_core::StoreBackend;

/// Main entry point for the patient intake service
///
/// Starts the REST server that hosts intake wizard sessions.
///
/// # Environment Variables
/// - `INTAKE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `INTAKE_SESSION_TTL_SECS`: Idle time before a wizard session is evicted (default: 1800)
/// - `INTAKE_STORE`: `file` (default) or `http`
/// - `PATIENT_DATA_DIR`: Directory for the file store (default: "patient_data")
/// - `INTAKE_STORE_URL`, `INTAKE_STORE_API_KEY`, `INTAKE_STORE_TIMEOUT_SECS`: HTTP store settings
/// - `INTAKE_COLLECTION`: Collection registrations are written to (default: "patients")
/// - `INTAKE_PHONE_PATTERN`, `INTAKE_PHONE_DESCRIPTION`: Regional phone number rule
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("intake_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("INTAKE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let config = api_rest::config_from_env()?;
    match config.store_backend() {
        StoreBackend::File { data_dir } => {
            tracing::info!("++ Storing registrations under {}", data_dir.display())
        }
        StoreBackend::Http { base_url, .. } => {
            tracing::info!("++ Storing registrations at {}", base_url)
        }
    }
    tracing::info!("++ Starting intake REST on {}", rest_addr);

    let state =
        AppState::from_config(config)?.with_session_ttl(api_rest::session_ttl_from_env()?);
    api_rest::serve(&rest_addr, state).await
}
