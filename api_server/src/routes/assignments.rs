//! Зачисления, предметы курсов, закрепление преподавателей и веса оценок.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::academics;
use core_logic::db::{assignments as db, catalog};
use core_logic::models::{
    CourseSubject, CourseSubjectRequest, CreateEnrollmentRequest, CreateWeightRequest, Enrollment,
    EnrollmentDetail, EvaluationWeight, Teacher, TeacherSubject, TeacherSubjectRequest, UpdateEnrollmentRequest,
    UpdateWeightRequest,
};
use core_logic::{ApiResponse, ErrorResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{created, deleted, Created};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ---- enrollments ----

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EnrollmentQuery {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub school_year_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/enrollments",
    tag = "assignments",
    request_body = CreateEnrollmentRequest,
    responses((status = 201, description = "Enrollment created", body = Enrollment)),
    security(("bearer" = []))
)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateEnrollmentRequest>,
) -> ApiResult<Created<Enrollment>> {
    user.admin()?;
    Ok(created(db::create_enrollment(&state.pool, &req).await?))
}

#[utoipa::path(
    get,
    path = "/enrollments",
    tag = "assignments",
    params(EnrollmentQuery),
    responses((status = 200, description = "Enrollments with names", body = Vec<EnrollmentDetail>)),
    security(("bearer" = []))
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EnrollmentQuery>,
) -> ApiResult<Json<Vec<EnrollmentDetail>>> {
    user.staff()?;
    let rows = db::list_enrollments(&state.pool, query.student_id, query.course_id, query.school_year_id).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/enrollments/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Enrollment id")),
    responses((status = 200, description = "Enrollment", body = Enrollment)),
    security(("bearer" = []))
)]
pub async fn get_enrollment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Enrollment>> {
    user.staff()?;
    let enrollment = db::get_enrollment(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Enrollment"))?;
    Ok(Json(enrollment))
}

#[utoipa::path(
    put,
    path = "/enrollments/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Enrollment id")),
    request_body = UpdateEnrollmentRequest,
    responses((status = 200, description = "Enrollment updated", body = Enrollment)),
    security(("bearer" = []))
)]
pub async fn update_enrollment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEnrollmentRequest>,
) -> ApiResult<Json<Enrollment>> {
    user.admin()?;
    let enrollment = db::update_enrollment(&state.pool, id, &req)
        .await?
        .ok_or_else(|| ApiError::not_found("Enrollment"))?;
    Ok(Json(enrollment))
}

#[utoipa::path(
    delete,
    path = "/enrollments/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Enrollment id")),
    responses((status = 200, description = "Enrollment deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_enrollment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_enrollment(&state.pool, id).await?, "Enrollment")
}

// ---- course subjects ----

#[utoipa::path(
    post,
    path = "/course-subjects",
    tag = "assignments",
    request_body = CourseSubjectRequest,
    responses(
        (status = 201, description = "Subject added to course", body = CourseSubject),
        (status = 409, description = "Pair already exists", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_course_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CourseSubjectRequest>,
) -> ApiResult<Created<CourseSubject>> {
    user.admin()?;
    Ok(created(db::create_course_subject(&state.pool, req.course_id, req.subject_id).await?))
}

#[utoipa::path(
    get,
    path = "/course-subjects",
    tag = "assignments",
    responses((status = 200, description = "Course/subject pairs", body = Vec<CourseSubject>)),
    security(("bearer" = []))
)]
pub async fn list_course_subjects(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<CourseSubject>>> {
    Ok(Json(db::list_course_subjects(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/course-subjects/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Course subject id")),
    responses((status = 200, description = "Course/subject pair", body = CourseSubject)),
    security(("bearer" = []))
)]
pub async fn get_course_subject(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CourseSubject>> {
    let row = db::get_course_subject(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course subject"))?;
    Ok(Json(row))
}

#[utoipa::path(
    put,
    path = "/course-subjects/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Course subject id")),
    request_body = CourseSubjectRequest,
    responses((status = 200, description = "Pair updated", body = CourseSubject)),
    security(("bearer" = []))
)]
pub async fn update_course_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<CourseSubjectRequest>,
) -> ApiResult<Json<CourseSubject>> {
    user.admin()?;
    let row = db::update_course_subject(&state.pool, id, req.course_id, req.subject_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course subject"))?;
    Ok(Json(row))
}

#[utoipa::path(
    delete,
    path = "/course-subjects/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Course subject id")),
    responses((status = 200, description = "Pair deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_course_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_course_subject(&state.pool, id).await?, "Course subject")
}

// ---- teacher subjects ----

#[utoipa::path(
    post,
    path = "/teacher-subjects",
    tag = "assignments",
    request_body = TeacherSubjectRequest,
    responses(
        (status = 201, description = "Subject assigned to teacher", body = TeacherSubject),
        (status = 409, description = "Pair already exists", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_teacher_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TeacherSubjectRequest>,
) -> ApiResult<Created<TeacherSubject>> {
    user.admin()?;
    Ok(created(db::create_teacher_subject(&state.pool, req.teacher_id, req.subject_id).await?))
}

#[utoipa::path(
    get,
    path = "/teacher-subjects",
    tag = "assignments",
    responses((status = 200, description = "Teacher/subject pairs", body = Vec<TeacherSubject>)),
    security(("bearer" = []))
)]
pub async fn list_teacher_subjects(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<TeacherSubject>>> {
    user.staff()?;
    Ok(Json(db::list_teacher_subjects(&state.pool).await?))
}

#[utoipa::path(
    delete,
    path = "/teacher-subjects/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Teacher subject id")),
    responses((status = 200, description = "Pair deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_teacher_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_teacher_subject(&state.pool, id).await?, "Teacher subject")
}

#[utoipa::path(
    get,
    path = "/subjects/{id}/teachers",
    tag = "assignments",
    params(("id" = i64, Path, description = "Subject id")),
    responses((status = 200, description = "Teachers of the subject", body = Vec<Teacher>)),
    security(("bearer" = []))
)]
pub async fn subject_teachers(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Teacher>>> {
    user.staff()?;
    catalog::get_subject(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Subject"))?;
    Ok(Json(db::teachers_of_subject(&state.pool, id).await?))
}

// ---- weights ----

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeightQuery {
    pub teacher_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub school_year_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/weights",
    tag = "assignments",
    request_body = CreateWeightRequest,
    responses(
        (status = 201, description = "Weight created", body = EvaluationWeight),
        (status = 400, description = "Percentage outside 0..100", body = ErrorResponse),
        (status = 409, description = "Group total above 100", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_weight(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateWeightRequest>,
) -> ApiResult<Created<EvaluationWeight>> {
    user.staff()?;
    Ok(created(academics::create_weight(&state.pool, &req).await?))
}

#[utoipa::path(
    get,
    path = "/weights",
    tag = "assignments",
    params(WeightQuery),
    responses((status = 200, description = "Weights", body = Vec<EvaluationWeight>)),
    security(("bearer" = []))
)]
pub async fn list_weights(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<WeightQuery>,
) -> ApiResult<Json<Vec<EvaluationWeight>>> {
    user.staff()?;
    let rows = db::list_weights(&state.pool, query.teacher_id, query.subject_id, query.school_year_id).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/weights/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Weight id")),
    responses((status = 200, description = "Weight", body = EvaluationWeight)),
    security(("bearer" = []))
)]
pub async fn get_weight(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<EvaluationWeight>> {
    user.staff()?;
    let weight = db::get_weight(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Evaluation weight"))?;
    Ok(Json(weight))
}

#[utoipa::path(
    put,
    path = "/weights/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Weight id")),
    request_body = UpdateWeightRequest,
    responses(
        (status = 200, description = "Weight updated", body = EvaluationWeight),
        (status = 409, description = "Group total above 100", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_weight(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateWeightRequest>,
) -> ApiResult<Json<EvaluationWeight>> {
    user.staff()?;
    Ok(Json(academics::update_weight(&state.pool, id, &req).await?))
}

#[utoipa::path(
    delete,
    path = "/weights/{id}",
    tag = "assignments",
    params(("id" = i64, Path, description = "Weight id")),
    responses((status = 200, description = "Weight deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_weight(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.staff()?;
    deleted(db::delete_weight(&state.pool, id).await?, "Evaluation weight")
}
