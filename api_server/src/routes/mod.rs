pub mod analytics;
pub mod assignments;
pub mod attendance;
pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod evaluations;
pub mod grades;
pub mod notifications;
pub mod people;
pub mod predictions;
pub mod reports;
pub mod student_info;

use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use core_logic::db::{self, DEFAULT_QUERY_LIMIT, DEFAULT_QUERY_OFFSET};
use core_logic::ApiResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Page {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Page {
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(DEFAULT_QUERY_OFFSET).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, 1000)
    }
}

pub type Created<T> = (StatusCode, Json<T>);

pub fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

pub fn today() -> NaiveDate {
    db::now().date()
}

/// Ответ на DELETE: 404, если строки не было.
pub fn deleted(found: bool, what: &str) -> ApiResult<Json<ApiResponse>> {
    if found {
        Ok(Json(ApiResponse::ok(format!("{what} deleted"))))
    } else {
        Err(ApiError::not_found(what))
    }
}
