use std::str::FromStr;

use crate::error::ConfigError;

// Значения по умолчанию
const DEFAULT_DATABASE_URL: &str = "sqlite://aula.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_SECRET_KEY: &str = "change-me";
const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
const DEFAULT_FROM_NAME: &str = "Academic Management System";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Local,
    Cloud,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Настройки процесса, читаются один раз при старте.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub local_database_url: String,
    pub cloud_database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub secret_key: String,
    pub jwt_expiration_hours: i64,
    pub bcrypt_cost: u32,
    pub rabbitmq_url: Option<String>,
    pub smtp: SmtpSettings,
    pub cloudinary: Option<CloudinarySettings>,
    pub parent_alert_threshold: f64,
    pub prediction_model_path: Option<String>,
}

impl Settings {
    /// Читает настройки из окружения (после `dotenvy::dotenv()`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Пустые строки считаем отсутствующими значениями
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("ENVIRONMENT").as_deref() {
            None | Some("local") => Environment::Local,
            Some("cloud") => Environment::Cloud,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "ENVIRONMENT".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let cloudinary = match (get("CLOUD_NAME"), get("CLOUD_API_KEY"), get("CLOUD_API_SECRET")) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinarySettings {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let parent_alert_threshold: f64 = parse_or(&get, "PARENT_ALERT_THRESHOLD", 50.0)?;
        if !(0.0..=100.0).contains(&parent_alert_threshold) {
            return Err(ConfigError::Invalid {
                key: "PARENT_ALERT_THRESHOLD".to_string(),
                value: parent_alert_threshold.to_string(),
            });
        }

        Ok(Settings {
            environment,
            local_database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            cloud_database_url: get("CLOUD_DATABASE_URL"),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            secret_key: get("SECRET_KEY").unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
            jwt_expiration_hours: parse_or(&get, "JWT_EXPIRATION_HOURS", 24)?,
            bcrypt_cost: parse_or(&get, "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            rabbitmq_url: get("RABBITMQ_URL"),
            smtp: SmtpSettings {
                server: get("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
                port: parse_or(&get, "SMTP_PORT", 587)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from_email: get("FROM_EMAIL"),
                from_name: get("FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            },
            cloudinary,
            parent_alert_threshold,
            prediction_model_path: get("PREDICTION_MODEL_PATH"),
        })
    }

    /// URL базы: облачный при ENVIRONMENT=cloud, если он задан.
    pub fn database_url(&self) -> &str {
        match (&self.environment, &self.cloud_database_url) {
            (Environment::Cloud, Some(url)) => url,
            _ => &self.local_database_url,
        }
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp.username.is_some() && self.smtp.password.is_some()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.environment, Environment::Local);
        assert_eq!(s.database_url(), "sqlite://aula.db");
        assert_eq!(s.bind_addr, "127.0.0.1:8000");
        assert_eq!(s.jwt_expiration_hours, 24);
        assert_eq!(s.smtp.port, 587);
        assert_eq!(s.parent_alert_threshold, 50.0);
        assert!(s.cloudinary.is_none());
        assert!(s.rabbitmq_url.is_none());
    }

    #[test]
    fn cloud_environment_prefers_cloud_url() {
        let s = settings(&[
            ("ENVIRONMENT", "cloud"),
            ("DATABASE_URL", "sqlite://local.db"),
            ("CLOUD_DATABASE_URL", "sqlite://cloud.db"),
        ])
        .unwrap();
        assert_eq!(s.database_url(), "sqlite://cloud.db");

        let s = settings(&[("ENVIRONMENT", "cloud"), ("CLOUD_DATABASE_URL", "  ")]).unwrap();
        assert_eq!(s.database_url(), "sqlite://aula.db");
    }

    #[test]
    fn invalid_numbers_are_errors() {
        assert!(settings(&[("SMTP_PORT", "abc")]).is_err());
        assert!(settings(&[("PARENT_ALERT_THRESHOLD", "150")]).is_err());
        assert!(settings(&[("ENVIRONMENT", "staging")]).is_err());
    }

    #[test]
    fn cloudinary_requires_all_three_keys() {
        let s = settings(&[("CLOUD_NAME", "demo"), ("CLOUD_API_KEY", "k")]).unwrap();
        assert!(s.cloudinary.is_none());
        let s = settings(&[
            ("CLOUD_NAME", "demo"),
            ("CLOUD_API_KEY", "k"),
            ("CLOUD_API_SECRET", "s"),
        ])
        .unwrap();
        assert_eq!(s.cloudinary.unwrap().cloud_name, "demo");
    }
}
