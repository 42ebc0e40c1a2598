use axum::extract::{Query, State};
use axum::Json;
use core_logic::academics::{self, TeacherDashboard};
use core_logic::db::dashboard::{self as db, AdminCounters, SubjectSummary};
use core_logic::ErrorResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use super::today;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubjectSummaryQuery {
    pub course_id: i64,
    pub subject_id: i64,
    pub school_year_id: i64,
}

#[utoipa::path(
    get,
    path = "/dashboard/admin",
    tag = "dashboard",
    responses((status = 200, description = "School-wide counters", body = AdminCounters)),
    security(("bearer" = []))
)]
pub async fn admin(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<AdminCounters>> {
    user.admin()?;
    Ok(Json(db::admin_counters(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/dashboard/teacher",
    tag = "dashboard",
    responses(
        (status = 200, description = "Counters for the current school year", body = TeacherDashboard),
        (status = 404, description = "No current school year or no subjects assigned", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn teacher(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<TeacherDashboard>> {
    user.teacher()?;
    Ok(Json(academics::teacher_dashboard(&state.pool, user.id, today()).await?))
}

#[utoipa::path(
    get,
    path = "/dashboard/subject-summary",
    tag = "dashboard",
    params(SubjectSummaryQuery),
    responses((status = 200, description = "Per-term averages for a subject in a course", body = SubjectSummary)),
    security(("bearer" = []))
)]
pub async fn subject_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SubjectSummaryQuery>,
) -> ApiResult<Json<SubjectSummary>> {
    user.staff()?;
    let summary = db::subject_summary(&state.pool, query.course_id, query.subject_id, query.school_year_id).await?;
    Ok(Json(summary))
}
