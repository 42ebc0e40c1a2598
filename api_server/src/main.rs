use std::sync::Arc;

use api_server::{build_router, AppState};
use core_logic::config::Settings;
use core_logic::db;
use core_logic::email::Mailer;
use core_logic::prediction::{LinearModel, PerformanceModel};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    info!("Starting Aula API ({:?} environment)", settings.environment);

    let pool = db::init_db(&settings).await?;
    let mailer = Mailer::from_settings(&settings).await;
    let model: Arc<dyn PerformanceModel> = Arc::new(LinearModel::load(settings.prediction_model_path.as_deref())?);

    let bind_addr = settings.bind_addr.clone();
    let app = build_router(AppState::new(pool, settings, mailer, model));

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{} (docs at /docs)", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
