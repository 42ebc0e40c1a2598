//! Итоговые оценки: ручной ввод, расчёт по весам и отчёт по курсу.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::auth::UserType;
use core_logic::db::{assignments, grades as db};
use core_logic::grading::{self, CourseReport, FinalGradeResult, TermGrades};
use core_logic::models::{CreateFinalGradeRequest, FinalGrade, UpdateFinalGradeRequest};
use core_logic::{academics, ApiResponse, ErrorResponse};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{created, deleted, Created};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComputeRequest {
    pub student_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub school_year_id: i64,
    /// Чьи веса использовать; по умолчанию текущий преподаватель или закреплённый за предметом
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComputeAllRequest {
    pub student_id: i64,
    pub term_id: i64,
    pub school_year_id: i64,
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComputeAllTermsRequest {
    pub student_id: i64,
    pub school_year_id: i64,
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FinalGradeQuery {
    pub student_id: Option<i64>,
    pub term_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/final-grades/compute",
    tag = "final-grades",
    request_body = ComputeRequest,
    responses(
        (status = 200, description = "Final grade with per-type breakdown", body = FinalGradeResult),
        (status = 400, description = "No teacher to take weights from", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn compute(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ComputeRequest>,
) -> ApiResult<Json<FinalGradeResult>> {
    user.staff()?;
    let teacher_id = match req.teacher_id {
        Some(id) => id,
        None if user.user_type == UserType::Teacher => user.id,
        None => assignments::assigned_teacher(&state.pool, req.subject_id)
            .await?
            .ok_or_else(|| ApiError::bad_request("no teacher is assigned to this subject"))?,
    };
    let result = grading::compute_final_grade(
        &state.pool,
        req.student_id,
        req.subject_id,
        req.term_id,
        req.school_year_id,
        teacher_id,
    )
    .await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/final-grades/compute-all",
    tag = "final-grades",
    request_body = ComputeAllRequest,
    responses(
        (status = 200, description = "Final grades for every subject of the student's courses", body = Vec<FinalGradeResult>),
        (status = 404, description = "Student not enrolled in the school year", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn compute_all(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ComputeAllRequest>,
) -> ApiResult<Json<Vec<FinalGradeResult>>> {
    user.staff()?;
    let results = grading::compute_all_for_student(
        &state.pool,
        req.student_id,
        req.term_id,
        req.school_year_id,
        req.teacher_id,
    )
    .await?;
    Ok(Json(results))
}

#[utoipa::path(
    post,
    path = "/final-grades/compute-all-terms",
    tag = "final-grades",
    request_body = ComputeAllTermsRequest,
    responses(
        (status = 200, description = "Final grades grouped by term", body = Vec<TermGrades>),
        (status = 404, description = "School year has no terms", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn compute_all_terms(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ComputeAllTermsRequest>,
) -> ApiResult<Json<Vec<TermGrades>>> {
    user.staff()?;
    let results =
        grading::compute_all_terms(&state.pool, req.student_id, req.school_year_id, req.teacher_id).await?;
    Ok(Json(results))
}

#[utoipa::path(
    get,
    path = "/final-grades/course/{course_id}/school-year/{school_year_id}",
    tag = "final-grades",
    params(
        ("course_id" = i64, Path, description = "Course id"),
        ("school_year_id" = i64, Path, description = "School year id")
    ),
    responses((status = 200, description = "Every enrolled student with final grades", body = CourseReport)),
    security(("bearer" = []))
)]
pub async fn course_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path((course_id, school_year_id)): Path<(i64, i64)>,
) -> ApiResult<Json<CourseReport>> {
    user.staff()?;
    Ok(Json(grading::course_report(&state.pool, course_id, school_year_id).await?))
}

#[utoipa::path(
    post,
    path = "/final-grades",
    tag = "final-grades",
    request_body = CreateFinalGradeRequest,
    responses(
        (status = 201, description = "Final grade stored", body = FinalGrade),
        (status = 409, description = "Grade already exists for this student, subject and term", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_final_grade(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateFinalGradeRequest>,
) -> ApiResult<Created<FinalGrade>> {
    user.staff()?;
    academics::validate_score(req.final_score)?;
    let grade =
        db::create_final_grade(&state.pool, req.student_id, req.subject_id, req.term_id, req.final_score).await?;
    Ok(created(grade))
}

#[utoipa::path(
    get,
    path = "/final-grades",
    tag = "final-grades",
    params(FinalGradeQuery),
    responses((status = 200, description = "Final grades", body = Vec<FinalGrade>)),
    security(("bearer" = []))
)]
pub async fn list_final_grades(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<FinalGradeQuery>,
) -> ApiResult<Json<Vec<FinalGrade>>> {
    match query.student_id {
        Some(student_id) => user.can_view_student(&state.pool, student_id).await?,
        None => {
            user.staff()?;
        }
    }
    Ok(Json(db::list_final_grades(&state.pool, query.student_id, query.term_id).await?))
}

#[utoipa::path(
    get,
    path = "/final-grades/{id}",
    tag = "final-grades",
    params(("id" = i64, Path, description = "Final grade id")),
    responses((status = 200, description = "Final grade", body = FinalGrade)),
    security(("bearer" = []))
)]
pub async fn get_final_grade(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<FinalGrade>> {
    let grade = db::get_final_grade(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Final grade"))?;
    user.can_view_student(&state.pool, grade.student_id).await?;
    Ok(Json(grade))
}

#[utoipa::path(
    put,
    path = "/final-grades/{id}",
    tag = "final-grades",
    params(("id" = i64, Path, description = "Final grade id")),
    request_body = UpdateFinalGradeRequest,
    responses((status = 200, description = "Final grade updated", body = FinalGrade)),
    security(("bearer" = []))
)]
pub async fn update_final_grade(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFinalGradeRequest>,
) -> ApiResult<Json<FinalGrade>> {
    user.staff()?;
    let grade = match req.final_score {
        Some(score) => {
            academics::validate_score(score)?;
            db::update_final_grade(&state.pool, id, score).await?
        }
        None => db::get_final_grade(&state.pool, id).await?,
    };
    Ok(Json(grade.ok_or_else(|| ApiError::not_found("Final grade"))?))
}

#[utoipa::path(
    delete,
    path = "/final-grades/{id}",
    tag = "final-grades",
    params(("id" = i64, Path, description = "Final grade id")),
    responses((status = 200, description = "Final grade deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_final_grade(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.staff()?;
    deleted(db::delete_final_grade(&state.pool, id).await?, "Final grade")
}
