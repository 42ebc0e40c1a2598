//! Справочники: предметы, курсы, учебные годы, периоды и типы оценок.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use core_logic::academics;
use core_logic::db::{assignments, catalog as db};
use core_logic::models::{
    require_non_blank, Course, CreateCourseRequest, CreateSchoolYearRequest, CreateSubjectRequest,
    CreateTermRequest, EvaluationType, EvaluationTypeRequest, SchoolYear, Subject, Term, UpdateCourseRequest,
    UpdateSchoolYearRequest, UpdateSubjectRequest, UpdateTermRequest,
};
use core_logic::{ApiResponse, ErrorResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{created, deleted, today, Created};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ---- subjects ----

#[utoipa::path(
    post,
    path = "/subjects",
    tag = "catalog",
    request_body = CreateSubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = Subject),
        (status = 409, description = "Name already in use", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSubjectRequest>,
) -> ApiResult<Created<Subject>> {
    user.admin()?;
    require_non_blank(&[("name", req.name.as_str())])?;
    Ok(created(db::create_subject(&state.pool, &req).await?))
}

#[utoipa::path(
    get,
    path = "/subjects",
    tag = "catalog",
    responses((status = 200, description = "Subjects", body = Vec<Subject>)),
    security(("bearer" = []))
)]
pub async fn list_subjects(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Json<Vec<Subject>>> {
    Ok(Json(db::list_subjects(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/subjects/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Subject id")),
    responses((status = 200, description = "Subject", body = Subject)),
    security(("bearer" = []))
)]
pub async fn get_subject(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Subject>> {
    let subject = db::get_subject(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Subject"))?;
    Ok(Json(subject))
}

#[utoipa::path(
    put,
    path = "/subjects/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Subject id")),
    request_body = UpdateSubjectRequest,
    responses((status = 200, description = "Subject updated", body = Subject)),
    security(("bearer" = []))
)]
pub async fn update_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSubjectRequest>,
) -> ApiResult<Json<Subject>> {
    user.admin()?;
    let subject = db::update_subject(&state.pool, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Subject"))?;
    Ok(Json(subject))
}

#[utoipa::path(
    delete,
    path = "/subjects/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Subject id")),
    responses((status = 200, description = "Subject deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_subject(&state.pool, id).await?, "Subject")
}

// ---- courses ----

#[utoipa::path(
    post,
    path = "/courses",
    tag = "catalog",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 409, description = "Name already in use", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCourseRequest>,
) -> ApiResult<Created<Course>> {
    user.admin()?;
    require_non_blank(&[
        ("name", req.name.as_str()),
        ("level", req.level.as_str()),
        ("shift", req.shift.as_str()),
    ])?;
    Ok(created(db::create_course(&state.pool, &req).await?))
}

#[utoipa::path(
    get,
    path = "/courses",
    tag = "catalog",
    responses((status = 200, description = "Courses", body = Vec<Course>)),
    security(("bearer" = []))
)]
pub async fn list_courses(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Json<Vec<Course>>> {
    Ok(Json(db::list_courses(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Course id")),
    responses((status = 200, description = "Course", body = Course)),
    security(("bearer" = []))
)]
pub async fn get_course(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Course>> {
    let course = db::get_course(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Course"))?;
    Ok(Json(course))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Course id")),
    request_body = UpdateCourseRequest,
    responses((status = 200, description = "Course updated", body = Course)),
    security(("bearer" = []))
)]
pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCourseRequest>,
) -> ApiResult<Json<Course>> {
    user.admin()?;
    let course = db::update_course(&state.pool, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    Ok(Json(course))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Course id")),
    responses((status = 200, description = "Course deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_course(&state.pool, id).await?, "Course")
}

#[utoipa::path(
    get,
    path = "/courses/{id}/subjects",
    tag = "catalog",
    params(("id" = i64, Path, description = "Course id")),
    responses((status = 200, description = "Subjects of the course", body = Vec<Subject>)),
    security(("bearer" = []))
)]
pub async fn course_subjects(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Subject>>> {
    db::get_course(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Course"))?;
    Ok(Json(assignments::subjects_of_course(&state.pool, id).await?))
}

// ---- school years ----

#[utoipa::path(
    post,
    path = "/school-years",
    tag = "catalog",
    request_body = CreateSchoolYearRequest,
    responses(
        (status = 201, description = "School year created", body = SchoolYear),
        (status = 409, description = "Year already exists", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_school_year(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSchoolYearRequest>,
) -> ApiResult<Created<SchoolYear>> {
    user.admin()?;
    require_non_blank(&[("year", req.year.as_str())])?;
    Ok(created(db::create_school_year(&state.pool, &req).await?))
}

#[utoipa::path(
    get,
    path = "/school-years",
    tag = "catalog",
    responses((status = 200, description = "School years", body = Vec<SchoolYear>)),
    security(("bearer" = []))
)]
pub async fn list_school_years(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Json<Vec<SchoolYear>>> {
    Ok(Json(db::list_school_years(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/school-years/current",
    tag = "catalog",
    responses(
        (status = 200, description = "School year containing today", body = SchoolYear),
        (status = 404, description = "No term covers today", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn current_school_year(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Json<SchoolYear>> {
    Ok(Json(academics::current_school_year(&state.pool, today()).await?))
}

#[utoipa::path(
    get,
    path = "/school-years/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "School year id")),
    responses((status = 200, description = "School year", body = SchoolYear)),
    security(("bearer" = []))
)]
pub async fn get_school_year(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SchoolYear>> {
    let year = db::get_school_year(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("School year"))?;
    Ok(Json(year))
}

#[utoipa::path(
    put,
    path = "/school-years/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "School year id")),
    request_body = UpdateSchoolYearRequest,
    responses((status = 200, description = "School year updated", body = SchoolYear)),
    security(("bearer" = []))
)]
pub async fn update_school_year(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSchoolYearRequest>,
) -> ApiResult<Json<SchoolYear>> {
    user.admin()?;
    let year = db::update_school_year(&state.pool, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("School year"))?;
    Ok(Json(year))
}

#[utoipa::path(
    delete,
    path = "/school-years/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "School year id")),
    responses((status = 200, description = "School year deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_school_year(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_school_year(&state.pool, id).await?, "School year")
}

// ---- terms ----

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TermQuery {
    pub school_year_id: Option<i64>,
    /// Часть названия периода
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[utoipa::path(
    post,
    path = "/terms",
    tag = "catalog",
    request_body = CreateTermRequest,
    responses(
        (status = 201, description = "Term created", body = Term),
        (status = 400, description = "start_date after end_date", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_term(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTermRequest>,
) -> ApiResult<Created<Term>> {
    user.admin()?;
    Ok(created(academics::create_term(&state.pool, &req).await?))
}

#[utoipa::path(
    get,
    path = "/terms",
    tag = "catalog",
    params(TermQuery),
    responses((status = 200, description = "Terms ordered by start date", body = Vec<Term>)),
    security(("bearer" = []))
)]
pub async fn list_terms(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<TermQuery>,
) -> ApiResult<Json<Vec<Term>>> {
    Ok(Json(db::list_terms(&state.pool, query.school_year_id, query.name.as_deref()).await?))
}

#[utoipa::path(
    get,
    path = "/terms/for-date",
    tag = "catalog",
    params(DateQuery),
    responses(
        (status = 200, description = "Term containing the date", body = Term),
        (status = 400, description = "Date outside every term", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn term_for_date(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Term>> {
    Ok(Json(academics::term_for_date(&state.pool, query.date).await?))
}

#[utoipa::path(
    get,
    path = "/terms/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Term id")),
    responses((status = 200, description = "Term", body = Term)),
    security(("bearer" = []))
)]
pub async fn get_term(State(state): State<AppState>, _user: AuthUser, Path(id): Path<i64>) -> ApiResult<Json<Term>> {
    let term = db::get_term(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Term"))?;
    Ok(Json(term))
}

#[utoipa::path(
    put,
    path = "/terms/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Term id")),
    request_body = UpdateTermRequest,
    responses((status = 200, description = "Term updated", body = Term)),
    security(("bearer" = []))
)]
pub async fn update_term(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTermRequest>,
) -> ApiResult<Json<Term>> {
    user.admin()?;
    Ok(Json(academics::update_term(&state.pool, id, &req).await?))
}

#[utoipa::path(
    delete,
    path = "/terms/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Term id")),
    responses((status = 200, description = "Term deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_term(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_term(&state.pool, id).await?, "Term")
}

// ---- evaluation types ----

#[utoipa::path(
    post,
    path = "/evaluation-types",
    tag = "catalog",
    request_body = EvaluationTypeRequest,
    responses(
        (status = 201, description = "Evaluation type created", body = EvaluationType),
        (status = 409, description = "Name already in use", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_evaluation_type(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<EvaluationTypeRequest>,
) -> ApiResult<Created<EvaluationType>> {
    user.admin()?;
    require_non_blank(&[("name", req.name.as_str())])?;
    Ok(created(db::create_evaluation_type(&state.pool, req.name.trim()).await?))
}

#[utoipa::path(
    get,
    path = "/evaluation-types",
    tag = "catalog",
    responses((status = 200, description = "Evaluation types", body = Vec<EvaluationType>)),
    security(("bearer" = []))
)]
pub async fn list_evaluation_types(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<EvaluationType>>> {
    Ok(Json(db::list_evaluation_types(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/evaluation-types/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Evaluation type id")),
    responses((status = 200, description = "Evaluation type", body = EvaluationType)),
    security(("bearer" = []))
)]
pub async fn get_evaluation_type(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<EvaluationType>> {
    let kind = db::get_evaluation_type(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Evaluation type"))?;
    Ok(Json(kind))
}

#[utoipa::path(
    put,
    path = "/evaluation-types/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Evaluation type id")),
    request_body = EvaluationTypeRequest,
    responses((status = 200, description = "Evaluation type updated", body = EvaluationType)),
    security(("bearer" = []))
)]
pub async fn update_evaluation_type(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<EvaluationTypeRequest>,
) -> ApiResult<Json<EvaluationType>> {
    user.admin()?;
    require_non_blank(&[("name", req.name.as_str())])?;
    let kind = db::update_evaluation_type(&state.pool, id, req.name.trim())
        .await?
        .ok_or_else(|| ApiError::not_found("Evaluation type"))?;
    Ok(Json(kind))
}

#[utoipa::path(
    delete,
    path = "/evaluation-types/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "Evaluation type id")),
    responses((status = 200, description = "Evaluation type deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_evaluation_type(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_evaluation_type(&state.pool, id).await?, "Evaluation type")
}
