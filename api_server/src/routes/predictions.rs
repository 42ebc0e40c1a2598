//! Прогноз успеваемости.

use axum::extract::{Query, State};
use axum::Json;
use core_logic::db::predictions as db;
use core_logic::models::{PredictionFilter, StoredPrediction};
use core_logic::prediction::{self, AtRiskStudent, BatchItem, Features, ModelInfo, PredictionResult, StudentPrediction};
use core_logic::ErrorResponse;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::today;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_RISK_THRESHOLD: f64 = 60.0;
const DEFAULT_RISK_LIMIT: usize = 20;
const STORED_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudentPredictionRequest {
    pub student_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CoursePredictionRequest {
    pub course_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseBatch {
    pub course_id: i64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItem>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RiskQuery {
    /// Балл ниже порога считается риском (по умолчанию 60)
    pub threshold: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StoredQuery {
    pub student_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub term_id: Option<i64>,
    /// Low, Medium или High
    pub classification: Option<String>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/predictions/predict",
    tag = "predictions",
    request_body = Features,
    responses(
        (status = 200, description = "Prediction for the given features", body = PredictionResult),
        (status = 400, description = "Feature outside 0..100", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn predict(
    State(state): State<AppState>,
    user: AuthUser,
    Json(features): Json<Features>,
) -> ApiResult<Json<PredictionResult>> {
    user.staff()?;
    Ok(Json(prediction::predict(state.model.as_ref(), &features)?))
}

#[utoipa::path(
    post,
    path = "/predictions/student",
    tag = "predictions",
    request_body = StudentPredictionRequest,
    responses(
        (status = 200, description = "Stored prediction with breakdown", body = StudentPrediction),
        (status = 400, description = "No teacher assigned to the subject", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn predict_student(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<StudentPredictionRequest>,
) -> ApiResult<Json<StudentPrediction>> {
    user.staff()?;
    let result =
        prediction::predict_for_student(&state.pool, state.model.as_ref(), req.student_id, req.subject_id, req.term_id)
            .await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/predictions/course",
    tag = "predictions",
    request_body = CoursePredictionRequest,
    responses((status = 200, description = "Per-student results for the course", body = CourseBatch)),
    security(("bearer" = []))
)]
pub async fn predict_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CoursePredictionRequest>,
) -> ApiResult<Json<CourseBatch>> {
    user.staff()?;
    let items =
        prediction::predict_course(&state.pool, state.model.as_ref(), req.course_id, req.subject_id, req.term_id)
            .await?;
    let failed = items.iter().filter(|i| i.error.is_some()).count();
    info!("Course {} predictions: {} ok, {} failed", req.course_id, items.len() - failed, failed);
    Ok(Json(CourseBatch {
        course_id: req.course_id,
        total: items.len(),
        succeeded: items.len() - failed,
        failed,
        items,
    }))
}

#[utoipa::path(
    get,
    path = "/predictions/at-risk",
    tag = "predictions",
    params(RiskQuery),
    responses((status = 200, description = "Students at risk, critical first", body = Vec<AtRiskStudent>)),
    security(("bearer" = []))
)]
pub async fn at_risk(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RiskQuery>,
) -> ApiResult<Json<Vec<AtRiskStudent>>> {
    user.staff()?;
    let threshold = query.threshold.unwrap_or(DEFAULT_RISK_THRESHOLD);
    if !(0.0..=100.0).contains(&threshold) {
        return Err(ApiError::bad_request("threshold must be between 0 and 100"));
    }
    let limit = query.limit.unwrap_or(DEFAULT_RISK_LIMIT).max(1);
    let students = prediction::students_at_risk(&state.pool, state.model.as_ref(), threshold, limit, today()).await?;
    Ok(Json(students))
}

#[utoipa::path(
    get,
    path = "/predictions",
    tag = "predictions",
    params(StoredQuery),
    responses((status = 200, description = "Stored predictions", body = Vec<StoredPrediction>)),
    security(("bearer" = []))
)]
pub async fn stored(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StoredQuery>,
) -> ApiResult<Json<Vec<StoredPrediction>>> {
    match query.student_id {
        Some(student_id) => user.can_view_student(&state.pool, student_id).await?,
        None => {
            user.staff()?;
        }
    }
    let filter = PredictionFilter {
        student_id: query.student_id,
        subject_id: query.subject_id,
        term_id: query.term_id,
        classification: query.classification,
    };
    let limit = query.limit.unwrap_or(STORED_LIMIT).clamp(1, 1000);
    Ok(Json(db::list_predictions(&state.pool, &filter, limit).await?))
}

#[utoipa::path(
    get,
    path = "/predictions/model-info",
    tag = "predictions",
    responses((status = 200, description = "Model coefficients and class thresholds", body = ModelInfo)),
    security(("bearer" = []))
)]
pub async fn model_info(State(state): State<AppState>, _user: AuthUser) -> Json<ModelInfo> {
    Json(state.model.info())
}
