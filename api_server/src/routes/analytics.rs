//! Сводная аналитика прогнозов. Ничего не сохраняет.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::analytics::{self, CourseAnalysis, InstitutionalReport, ModelOverview, RecommendationPlan, TeacherOutlook};
use core_logic::auth::UserType;
use core_logic::ErrorResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use super::today;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TermQuery {
    pub term_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InstitutionalQuery {
    pub school_year_id: i64,
    pub term_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlanQuery {
    pub subject_id: i64,
    pub term_id: i64,
}

#[utoipa::path(
    get,
    path = "/predictions/teacher/{teacher_id}/subjects",
    tag = "predictions",
    params(("teacher_id" = i64, Path, description = "Teacher id"), TermQuery),
    responses(
        (status = 200, description = "Predictions per subject and course", body = TeacherOutlook),
        (status = 403, description = "Teachers may only request their own subjects", body = ErrorResponse),
        (status = 404, description = "Teacher has no subjects", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn teacher_subjects(
    State(state): State<AppState>,
    user: AuthUser,
    Path(teacher_id): Path<i64>,
    Query(query): Query<TermQuery>,
) -> ApiResult<Json<TeacherOutlook>> {
    user.staff()?;
    if user.user_type == UserType::Teacher && user.id != teacher_id {
        return Err(ApiError::forbidden("teachers may only see their own subjects"));
    }
    let outlook = analytics::teacher_outlook(&state.pool, state.model.as_ref(), teacher_id, query.term_id).await?;
    Ok(Json(outlook))
}

#[utoipa::path(
    get,
    path = "/predictions/course/{course_id}/subject/{subject_id}/analysis",
    tag = "predictions",
    params(
        ("course_id" = i64, Path, description = "Course id"),
        ("subject_id" = i64, Path, description = "Subject id"),
        TermQuery
    ),
    responses(
        (status = 200, description = "Statistics, distributions and course recommendations", body = CourseAnalysis),
        (status = 404, description = "No students to analyse", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn course_analysis(
    State(state): State<AppState>,
    user: AuthUser,
    Path((course_id, subject_id)): Path<(i64, i64)>,
    Query(query): Query<TermQuery>,
) -> ApiResult<Json<CourseAnalysis>> {
    user.staff()?;
    let analysis =
        analytics::course_analysis(&state.pool, state.model.as_ref(), course_id, subject_id, query.term_id).await?;
    Ok(Json(analysis))
}

#[utoipa::path(
    get,
    path = "/predictions/institutional-report",
    tag = "predictions",
    params(InstitutionalQuery),
    responses(
        (status = 200, description = "School-wide prediction summary", body = InstitutionalReport),
        (status = 400, description = "Term belongs to another school year", body = ErrorResponse),
        (status = 404, description = "Nothing to predict for the school year", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn institutional_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<InstitutionalQuery>,
) -> ApiResult<Json<InstitutionalReport>> {
    user.admin()?;
    let report =
        analytics::institutional_report(&state.pool, state.model.as_ref(), query.school_year_id, query.term_id)
            .await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/predictions/overview",
    tag = "predictions",
    responses((status = 200, description = "Model summary and students at risk today", body = ModelOverview)),
    security(("bearer" = []))
)]
pub async fn overview(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ModelOverview>> {
    user.staff()?;
    Ok(Json(analytics::model_overview(&state.pool, state.model.as_ref(), today()).await?))
}

#[utoipa::path(
    get,
    path = "/predictions/recommendations/{student_id}",
    tag = "predictions",
    params(("student_id" = i64, Path, description = "Student id"), PlanQuery),
    responses((status = 200, description = "Recommendations grouped by urgency", body = RecommendationPlan)),
    security(("bearer" = []))
)]
pub async fn recommendations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<i64>,
    Query(query): Query<PlanQuery>,
) -> ApiResult<Json<RecommendationPlan>> {
    user.staff()?;
    let plan = analytics::recommendation_plan(
        &state.pool,
        state.model.as_ref(),
        student_id,
        query.subject_id,
        query.term_id,
    )
    .await?;
    Ok(Json(plan))
}
