//! Академический отчёт: просмотр и отправка по почте.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::auth::{self, UserType};
use core_logic::db::people;
use core_logic::email::{Delivery, EmailJob};
use core_logic::reports::{self, AcademicReport};
use core_logic::ErrorResponse;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    pub school_year_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailReportRequest {
    pub student_id: i64,
    pub school_year_id: i64,
    /// Отправить родителям студента вместо автора запроса
    #[serde(default)]
    pub to_parents: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailDelivery {
    pub to: String,
    pub status: Delivery,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailReportResponse {
    pub student_id: i64,
    pub school_year_id: i64,
    pub deliveries: Vec<EmailDelivery>,
}

#[utoipa::path(
    get,
    path = "/reports/academic/{student_id}",
    tag = "reports",
    params(("student_id" = i64, Path, description = "Student id"), ReportQuery),
    responses(
        (status = 200, description = "Grades per term, predictions and overall average", body = AcademicReport),
        (status = 404, description = "Student or school year not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn academic_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<i64>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<AcademicReport>> {
    user.can_view_student(&state.pool, student_id).await?;
    Ok(Json(reports::academic_report(&state.pool, student_id, query.school_year_id).await?))
}

/// Адресаты письма: сам пользователь или родители студента.
async fn recipients(
    state: &AppState,
    user: &AuthUser,
    req: &EmailReportRequest,
) -> ApiResult<(UserType, Vec<(String, String)>)> {
    if req.to_parents {
        user.parent_or_admin()?;
        let parents: Vec<(String, String)> = people::parents_of_student(&state.pool, req.student_id)
            .await?
            .into_iter()
            .map(|p| (p.email, format!("{} {}", p.first_name, p.last_name)))
            .collect();
        if parents.is_empty() {
            return Err(ApiError::not_found("Parents of the student"));
        }
        return Ok((UserType::Parent, parents));
    }

    let profile = auth::profile(&state.pool, user.user_type, user.id).await?;
    let email = profile.email.clone().unwrap_or_else(|| user.email.clone());
    if email.trim().is_empty() {
        return Err(ApiError::bad_request("the requesting user has no e-mail address"));
    }
    let name = format!("{} {}", profile.first_name, profile.last_name);
    Ok((user.user_type, vec![(email, name)]))
}

#[utoipa::path(
    post,
    path = "/reports/email",
    tag = "reports",
    request_body = EmailReportRequest,
    responses(
        (status = 200, description = "Report queued, sent or skipped per recipient", body = EmailReportResponse),
        (status = 403, description = "No access to the student", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn email_report(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<EmailReportRequest>,
) -> ApiResult<Json<EmailReportResponse>> {
    user.can_view_student(&state.pool, req.student_id).await?;
    let report = reports::academic_report(&state.pool, req.student_id, req.school_year_id).await?;
    let (audience, to) = recipients(&state, &user, &req).await?;
    let subject = reports::email_subject(&report, audience);

    let mut deliveries = Vec::with_capacity(to.len());
    for (email, name) in to {
        let job = EmailJob {
            to: email.clone(),
            to_name: name.clone(),
            subject: subject.clone(),
            html_body: reports::render_html(&report, &name),
        };
        let status = state.mailer.dispatch(&job).await?;
        deliveries.push(EmailDelivery { to: email, status });
    }
    info!(
        "Academic report of student {} dispatched to {} recipient(s)",
        req.student_id,
        deliveries.len()
    );

    Ok(Json(EmailReportResponse {
        student_id: req.student_id,
        school_year_id: req.school_year_id,
        deliveries,
    }))
}
