//! Учебные сведения для самого студента.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::academic_info::{
    self, AcademicInfo, AcademicSummary, EnrollmentStatus, SubjectWithTeacher, TeacherWithSubjects,
};
use core_logic::models::Course;
use core_logic::ErrorResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SchoolYearQuery {
    /// По умолчанию последний учебный год
    pub school_year_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/students/me/academic-info",
    tag = "students",
    params(SchoolYearQuery),
    responses(
        (status = 200, description = "Enrollment, course and subjects with teachers", body = AcademicInfo),
        (status = 404, description = "Not enrolled in the school year", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn academic_info(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SchoolYearQuery>,
) -> ApiResult<Json<AcademicInfo>> {
    user.student()?;
    Ok(Json(academic_info::academic_info(&state.pool, user.id, query.school_year_id).await?))
}

#[utoipa::path(
    get,
    path = "/students/me/course",
    tag = "students",
    params(SchoolYearQuery),
    responses(
        (status = 200, description = "Course of the enrollment", body = Course),
        (status = 404, description = "Not enrolled in the school year", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn course(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SchoolYearQuery>,
) -> ApiResult<Json<Course>> {
    user.student()?;
    Ok(Json(academic_info::student_course(&state.pool, user.id, query.school_year_id).await?))
}

#[utoipa::path(
    get,
    path = "/students/me/subjects",
    tag = "students",
    params(SchoolYearQuery),
    responses((status = 200, description = "Subjects of the course", body = Vec<SubjectWithTeacher>)),
    security(("bearer" = []))
)]
pub async fn subjects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SchoolYearQuery>,
) -> ApiResult<Json<Vec<SubjectWithTeacher>>> {
    user.student()?;
    Ok(Json(academic_info::student_subjects(&state.pool, user.id, query.school_year_id).await?))
}

#[utoipa::path(
    get,
    path = "/students/me/teachers",
    tag = "students",
    params(SchoolYearQuery),
    responses((status = 200, description = "Teachers of the course with their subjects", body = Vec<TeacherWithSubjects>)),
    security(("bearer" = []))
)]
pub async fn teachers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SchoolYearQuery>,
) -> ApiResult<Json<Vec<TeacherWithSubjects>>> {
    user.student()?;
    Ok(Json(academic_info::student_teachers(&state.pool, user.id, query.school_year_id).await?))
}

#[utoipa::path(
    get,
    path = "/students/me/academic-summary",
    tag = "students",
    params(SchoolYearQuery),
    responses((status = 200, description = "Subject and teacher counts", body = AcademicSummary)),
    security(("bearer" = []))
)]
pub async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SchoolYearQuery>,
) -> ApiResult<Json<AcademicSummary>> {
    user.student()?;
    Ok(Json(academic_info::academic_summary(&state.pool, user.id, query.school_year_id).await?))
}

#[utoipa::path(
    get,
    path = "/students/me/subjects/{subject_id}/teacher",
    tag = "students",
    params(("subject_id" = i64, Path, description = "Subject id"), SchoolYearQuery),
    responses(
        (status = 200, description = "Subject and its teacher, if any", body = SubjectWithTeacher),
        (status = 404, description = "Subject is not part of the student's course", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn subject_teacher(
    State(state): State<AppState>,
    user: AuthUser,
    Path(subject_id): Path<i64>,
    Query(query): Query<SchoolYearQuery>,
) -> ApiResult<Json<SubjectWithTeacher>> {
    user.student()?;
    let found = academic_info::subject_teacher(&state.pool, user.id, subject_id, query.school_year_id).await?;
    Ok(Json(found))
}

#[utoipa::path(
    get,
    path = "/students/me/enrollment-status",
    tag = "students",
    params(SchoolYearQuery),
    responses((status = 200, description = "Whether the student is enrolled", body = EnrollmentStatus)),
    security(("bearer" = []))
)]
pub async fn enrollment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SchoolYearQuery>,
) -> ApiResult<Json<EnrollmentStatus>> {
    user.student()?;
    Ok(Json(academic_info::enrollment_status(&state.pool, user.id, query.school_year_id).await?))
}
