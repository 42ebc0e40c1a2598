use std::sync::Arc;

use core_logic::cloudinary::CloudinaryClient;
use core_logic::config::Settings;
use core_logic::email::Mailer;
use core_logic::prediction::PerformanceModel;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub settings: Arc<Settings>,
    pub mailer: Mailer,
    pub model: Arc<dyn PerformanceModel>,
    pub cloudinary: Option<CloudinaryClient>,
}

impl AppState {
    pub fn new(pool: SqlitePool, settings: Settings, mailer: Mailer, model: Arc<dyn PerformanceModel>) -> Self {
        let cloudinary = settings.cloudinary.clone().map(CloudinaryClient::new);
        Self { pool, settings: Arc::new(settings), mailer, model, cloudinary }
    }
}
