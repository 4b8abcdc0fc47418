use crate::core::{config::Settings, telemetry};

/// One-call initialization for embedding applications: environment file,
/// settings, tracing. Returns the loaded settings for building the client.
pub fn init() -> anyhow::Result<Settings> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    tracing::info!(
        base_url = %settings.api().base_url,
        "Examflow client initialized"
    );

    Ok(settings)
}
