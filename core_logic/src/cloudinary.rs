//! Загрузка фотографий студентов в Cloudinary (подписанный upload API).

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::config::CloudinarySettings;
use crate::error::{CoreError, CoreResult};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    settings: CloudinarySettings,
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Папка для фото: `profile/<имя>_<фамилия>`, пробелы заменяются подчёркиванием.
pub fn profile_folder(first_name: &str, last_name: &str) -> String {
    let clean = |s: &str| s.split_whitespace().collect::<Vec<_>>().join("_");
    format!("profile/{}_{}", clean(first_name), clean(last_name))
}

/// Подпись SHA-256: параметры по алфавиту через `&`, затем секрет.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl CloudinaryClient {
    pub fn new(settings: CloudinarySettings) -> Self {
        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        let base_url = format!("https://api.cloudinary.com/v1_1/{}", settings.cloud_name);
        Self { settings, client, base_url }
    }

    /// Загружает изображение и возвращает его `secure_url`.
    pub async fn upload_image(
        &self,
        data: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        folder: &str,
    ) -> CoreResult<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&[("folder", folder), ("timestamp", &timestamp)], &self.settings.api_secret);

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| CoreError::validation(format!("invalid content type: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.settings.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(format!("{}/image/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CoreError::Internal(format!("cloudinary request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.to_string());
            error!("Cloudinary upload failed: {} {}", status, message);
            return Err(CoreError::Internal(format!("cloudinary upload failed: {message}")));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Internal(format!("unexpected cloudinary response: {e}")))?;
        info!("Image uploaded to {}", body.secure_url);
        Ok(body.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_uses_names() {
        assert_eq!(profile_folder("Ana Maria", "Rojas"), "profile/Ana_Maria_Rojas");
    }

    #[test]
    fn signature_is_order_independent() {
        let a = sign(&[("timestamp", "1700000000"), ("folder", "profile/x")], "secret");
        let b = sign(&[("folder", "profile/x"), ("timestamp", "1700000000")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sign(&[("folder", "profile/x"), ("timestamp", "1700000000")], "other"));
    }
}
