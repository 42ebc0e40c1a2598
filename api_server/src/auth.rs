use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use core_logic::auth::{decode_token, UserType};
use core_logic::db::people;
use sqlx::SqlitePool;

use crate::error::ApiError;
use crate::state::AppState;

/// Пользователь из bearer-токена.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub user_type: UserType,
    pub email: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

        let claims = decode_token(token.trim(), &state.settings.secret_key)?;
        Ok(AuthUser { id: claims.user_id()?, user_type: claims.user_type, email: claims.email })
    }
}

impl AuthUser {
    fn require(&self, allowed: bool) -> Result<&Self, ApiError> {
        if allowed {
            Ok(self)
        } else {
            Err(ApiError::forbidden("insufficient permissions"))
        }
    }

    pub fn admin(&self) -> Result<&Self, ApiError> {
        self.require(self.user_type == UserType::Admin)
    }

    pub fn staff(&self) -> Result<&Self, ApiError> {
        self.require(self.user_type.is_staff())
    }

    pub fn student(&self) -> Result<&Self, ApiError> {
        self.require(self.user_type == UserType::Student)
    }

    pub fn parent(&self) -> Result<&Self, ApiError> {
        self.require(self.user_type == UserType::Parent)
    }

    pub fn parent_or_admin(&self) -> Result<&Self, ApiError> {
        self.require(matches!(self.user_type, UserType::Parent | UserType::Admin))
    }

    pub fn teacher(&self) -> Result<&Self, ApiError> {
        self.require(self.user_type == UserType::Teacher)
    }
}

impl AuthUser {
    /// Данные студента видят персонал, сам студент и его родители.
    pub async fn can_view_student(&self, pool: &SqlitePool, student_id: i64) -> Result<(), ApiError> {
        let allowed = match self.user_type {
            UserType::Admin | UserType::Teacher => true,
            UserType::Student => self.id == student_id,
            UserType::Parent => people::is_parent_of(pool, self.id, student_id).await?,
        };
        if allowed {
            Ok(())
        } else {
            Err(ApiError::forbidden("no access to this student"))
        }
    }
}
