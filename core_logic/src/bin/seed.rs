use core_logic::{config::Settings, db, seed};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let pool = db::init_db(&settings).await?;
    let summary = seed::run(&pool, settings.bcrypt_cost).await?;

    info!("Seeding complete: {} rows created, {} already present", summary.created, summary.existing);
    info!("Admin login: {} / {}", seed::ADMIN_EMAIL, seed::ADMIN_PASSWORD);
    pool.close().await;
    Ok(())
}
