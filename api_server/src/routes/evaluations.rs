//! Оценки. Создание и изменение сразу рассылают двойные уведомления.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::db::evaluations as db;
use core_logic::models::{
    CreateEvaluationRequest, DualNotificationResult, Evaluation, EvaluationFilter, EvaluationTypeSummary,
    RegisterEvaluationRequest, UpdateEvaluationRequest,
};
use core_logic::{academics, notifications, ApiResponse, ErrorResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{created, deleted, Created, Page};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ThresholdQuery {
    /// Порог оповещения родителей, по умолчанию из настроек
    pub parent_threshold: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluationWithNotifications {
    pub evaluation: Evaluation,
    pub notifications: DualNotificationResult,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EvaluationQuery {
    pub student_id: Option<i64>,
    pub term_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub evaluation_type_id: Option<i64>,
    /// Только предметы, которые ведёт преподаватель
    pub teacher_id: Option<i64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    pub student_id: i64,
    pub term_id: i64,
    pub subject_id: Option<i64>,
}

async fn with_notifications(
    state: &AppState,
    evaluation: Evaluation,
    threshold: Option<f64>,
) -> ApiResult<EvaluationWithNotifications> {
    let threshold = threshold.unwrap_or(state.settings.parent_alert_threshold);
    let notifications = notifications::notify_evaluation(&state.pool, evaluation.id, threshold).await?;
    if notifications.parent_alert {
        info!(
            "Low grade alert for student {}: {} parent notification(s)",
            evaluation.student_id,
            notifications.parents.len()
        );
    }
    Ok(EvaluationWithNotifications { evaluation, notifications })
}

#[utoipa::path(
    post,
    path = "/evaluations",
    tag = "evaluations",
    params(ThresholdQuery),
    request_body = CreateEvaluationRequest,
    responses(
        (status = 201, description = "Evaluation stored and notifications sent", body = EvaluationWithNotifications),
        (status = 400, description = "Score or threshold outside 0..100", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_evaluation(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ThresholdQuery>,
    Json(req): Json<CreateEvaluationRequest>,
) -> ApiResult<Created<EvaluationWithNotifications>> {
    user.staff()?;
    if let Some(threshold) = query.parent_threshold {
        notifications::validate_threshold(threshold)?;
    }
    let evaluation = academics::create_evaluation(&state.pool, &req).await?;
    Ok(created(with_notifications(&state, evaluation, query.parent_threshold).await?))
}

#[utoipa::path(
    post,
    path = "/evaluations/register/{kind}",
    tag = "evaluations",
    params(
        ("kind" = String, Path, description = "exam, homework, presentation, participation, attendance, practice, project, group, essay or quiz"),
        ThresholdQuery
    ),
    request_body = RegisterEvaluationRequest,
    responses(
        (status = 201, description = "Evaluation stored", body = EvaluationWithNotifications),
        (status = 400, description = "Unknown kind", body = ErrorResponse),
        (status = 404, description = "Evaluation type missing from the catalog", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn register_evaluation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(kind): Path<String>,
    Query(query): Query<ThresholdQuery>,
    Json(req): Json<RegisterEvaluationRequest>,
) -> ApiResult<Created<EvaluationWithNotifications>> {
    user.staff()?;
    if let Some(threshold) = query.parent_threshold {
        notifications::validate_threshold(threshold)?;
    }
    let evaluation = academics::register_evaluation(&state.pool, &kind, &req).await?;
    Ok(created(with_notifications(&state, evaluation, query.parent_threshold).await?))
}

#[utoipa::path(
    get,
    path = "/evaluations",
    tag = "evaluations",
    params(EvaluationQuery),
    responses((status = 200, description = "Evaluations, newest first", body = Vec<Evaluation>)),
    security(("bearer" = []))
)]
pub async fn list_evaluations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EvaluationQuery>,
) -> ApiResult<Json<Vec<Evaluation>>> {
    user.staff()?;
    let filter = EvaluationFilter {
        student_id: query.student_id,
        term_id: query.term_id,
        subject_id: query.subject_id,
        evaluation_type_id: query.evaluation_type_id,
        teacher_id: query.teacher_id,
    };
    let page = Page { skip: query.skip, limit: query.limit };
    Ok(Json(db::list_evaluations(&state.pool, &filter, page.skip(), page.limit()).await?))
}

#[utoipa::path(
    get,
    path = "/evaluations/summary",
    tag = "evaluations",
    params(SummaryQuery),
    responses((status = 200, description = "Count and average per evaluation type", body = Vec<EvaluationTypeSummary>)),
    security(("bearer" = []))
)]
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<Vec<EvaluationTypeSummary>>> {
    user.can_view_student(&state.pool, query.student_id).await?;
    let rows = db::summary_by_type(&state.pool, query.student_id, query.term_id, query.subject_id).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/evaluations/{id}",
    tag = "evaluations",
    params(("id" = i64, Path, description = "Evaluation id")),
    responses((status = 200, description = "Evaluation", body = Evaluation)),
    security(("bearer" = []))
)]
pub async fn get_evaluation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Evaluation>> {
    let evaluation = db::get_evaluation(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Evaluation"))?;
    user.can_view_student(&state.pool, evaluation.student_id).await?;
    Ok(Json(evaluation))
}

#[utoipa::path(
    put,
    path = "/evaluations/{id}",
    tag = "evaluations",
    params(("id" = i64, Path, description = "Evaluation id"), ThresholdQuery),
    request_body = UpdateEvaluationRequest,
    responses((status = 200, description = "Evaluation updated", body = EvaluationWithNotifications)),
    security(("bearer" = []))
)]
pub async fn update_evaluation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Query(query): Query<ThresholdQuery>,
    Json(req): Json<UpdateEvaluationRequest>,
) -> ApiResult<Json<EvaluationWithNotifications>> {
    user.staff()?;
    if let Some(threshold) = query.parent_threshold {
        notifications::validate_threshold(threshold)?;
    }
    let evaluation = academics::update_evaluation(&state.pool, id, &req).await?;
    Ok(Json(with_notifications(&state, evaluation, query.parent_threshold).await?))
}

#[utoipa::path(
    delete,
    path = "/evaluations/{id}",
    tag = "evaluations",
    params(("id" = i64, Path, description = "Evaluation id")),
    responses((status = 200, description = "Evaluation deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_evaluation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.staff()?;
    deleted(db::delete_evaluation(&state.pool, id).await?, "Evaluation")
}
