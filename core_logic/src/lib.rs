pub mod academic_info;
pub mod academics;
pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod cloudinary;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod geo;
pub mod grading;
pub mod models;
pub mod notifications;
pub mod people;
pub mod prediction;
pub mod rabbitmq;
pub mod reports;
pub mod seed;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Ответ на операции без собственного тела (удаление, отвязка и т.п.)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
