//! Посещаемость по геолокации: сессии преподавателя, отметка студентов и справочные расчёты.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::attendance as service;
use core_logic::auth::UserType;
use core_logic::db::{self, attendance as store};
use core_logic::geo::{self, Coordinate, Coverage, LocationCheck, SessionPreset, StudentLocationCheck};
use core_logic::models::{
    AttendanceCheck, AttendanceSession, CloseSessionResult, CreateSessionRequest, GlobalAttendanceStats,
    JustifyAbsenceRequest, MarkAttendanceRequest, SessionDetail, SessionFilter, StudentAttendance,
    StudentAttendanceView, UpdateSessionRequest,
};
use core_logic::ErrorResponse;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{created, Created};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const OUTLINE_POINTS: usize = 36;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    /// active, closed или cancelled
    pub status: Option<String>,
    pub course_id: Option<i64>,
    pub subject_id: Option<i64>,
    /// Только для администратора
    pub teacher_id: Option<i64>,
    pub limit: Option<i64>,
}

impl SessionQuery {
    fn filter(&self) -> SessionFilter {
        SessionFilter { status: self.status.clone(), course_id: self.course_id, subject_id: self.subject_id }
    }

    fn limit(&self) -> i64 {
        self.limit.unwrap_or(store::SESSION_LIST_LIMIT).clamp(1, 500)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecordsQuery {
    pub course_id: Option<i64>,
    pub subject_id: Option<i64>,
}

/// Сессию меняет только её преподаватель или администратор.
async fn managed_session(state: &AppState, user: &AuthUser, id: i64) -> ApiResult<AttendanceSession> {
    user.staff()?;
    let session = store::get_session(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance session"))?;
    if user.user_type == UserType::Teacher && session.teacher_id != user.id {
        return Err(ApiError::forbidden("session belongs to another teacher"));
    }
    Ok(session)
}

#[utoipa::path(
    post,
    path = "/attendance/sessions",
    tag = "attendance",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session opened with one absent row per enrolled student", body = AttendanceSession),
        (status = 409, description = "Active session already exists", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn open_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Created<AttendanceSession>> {
    user.staff()?;
    Ok(created(service::open_session(&state.pool, user.id, &req).await?))
}

#[utoipa::path(
    get,
    path = "/attendance/sessions",
    tag = "attendance",
    params(SessionQuery),
    responses((status = 200, description = "Own sessions, newest first", body = Vec<AttendanceSession>)),
    security(("bearer" = []))
)]
pub async fn my_sessions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<AttendanceSession>>> {
    user.staff()?;
    Ok(Json(store::list_sessions(&state.pool, Some(user.id), &query.filter(), query.limit()).await?))
}

#[utoipa::path(
    get,
    path = "/attendance/sessions/{id}",
    tag = "attendance",
    params(("id" = i64, Path, description = "Session id")),
    responses((status = 200, description = "Session with stats and records", body = SessionDetail)),
    security(("bearer" = []))
)]
pub async fn session_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SessionDetail>> {
    managed_session(&state, &user, id).await?;
    Ok(Json(service::session_detail(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/attendance/sessions/{id}",
    tag = "attendance",
    params(("id" = i64, Path, description = "Session id")),
    request_body = UpdateSessionRequest,
    responses((status = 200, description = "Session updated", body = AttendanceSession)),
    security(("bearer" = []))
)]
pub async fn update_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSessionRequest>,
) -> ApiResult<Json<AttendanceSession>> {
    managed_session(&state, &user, id).await?;
    Ok(Json(service::update_session(&state.pool, id, &req).await?))
}

#[utoipa::path(
    post,
    path = "/attendance/sessions/{id}/close",
    tag = "attendance",
    params(("id" = i64, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session closed and synced to attendance evaluations", body = CloseSessionResult),
        (status = 400, description = "Session not active or Attendance type missing", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn close_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CloseSessionResult>> {
    managed_session(&state, &user, id).await?;
    let result = service::close_session(&state.pool, id, db::now()).await?;
    info!(
        "Session {} closed: {} evaluations created, {} updated",
        id, result.evaluations_created, result.evaluations_updated
    );
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/attendance/sessions/{id}/justify",
    tag = "attendance",
    params(("id" = i64, Path, description = "Session id")),
    request_body = JustifyAbsenceRequest,
    responses((status = 200, description = "Absence justified", body = StudentAttendance)),
    security(("bearer" = []))
)]
pub async fn justify_absence(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<JustifyAbsenceRequest>,
) -> ApiResult<Json<StudentAttendance>> {
    managed_session(&state, &user, id).await?;
    Ok(Json(service::justify_absence(&state.pool, id, &req).await?))
}

#[utoipa::path(
    post,
    path = "/attendance/sessions/{id}/mark",
    tag = "attendance",
    params(("id" = i64, Path, description = "Session id")),
    request_body = MarkAttendanceRequest,
    responses(
        (status = 200, description = "Attendance marked", body = StudentAttendance),
        (status = 400, description = "Session closed, already marked or out of range", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn mark_attendance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<MarkAttendanceRequest>,
) -> ApiResult<Json<StudentAttendance>> {
    user.student()?;
    Ok(Json(service::mark_attendance(&state.pool, id, user.id, &req, db::now()).await?))
}

#[utoipa::path(
    get,
    path = "/attendance/sessions/{id}/check",
    tag = "attendance",
    params(("id" = i64, Path, description = "Session id"), LocationQuery),
    responses((status = 200, description = "Whether the student could mark now", body = AttendanceCheck)),
    security(("bearer" = []))
)]
pub async fn check_attendance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Query(location): Query<LocationQuery>,
) -> ApiResult<Json<AttendanceCheck>> {
    user.student()?;
    let check =
        service::check_attendance(&state.pool, id, user.id, location.latitude, location.longitude, db::now()).await?;
    Ok(Json(check))
}

#[utoipa::path(
    get,
    path = "/attendance/student/active-sessions",
    tag = "attendance",
    responses((status = 200, description = "Active sessions of the student's courses", body = Vec<AttendanceSession>)),
    security(("bearer" = []))
)]
pub async fn student_active_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<AttendanceSession>>> {
    user.student()?;
    Ok(Json(store::active_sessions_for_student(&state.pool, user.id).await?))
}

#[utoipa::path(
    get,
    path = "/attendance/student/records",
    tag = "attendance",
    params(RecordsQuery),
    responses((status = 200, description = "Own attendance history", body = Vec<StudentAttendanceView>)),
    security(("bearer" = []))
)]
pub async fn student_records(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RecordsQuery>,
) -> ApiResult<Json<Vec<StudentAttendanceView>>> {
    user.student()?;
    Ok(Json(store::student_records(&state.pool, user.id, query.course_id, query.subject_id).await?))
}

#[utoipa::path(
    get,
    path = "/attendance/admin/sessions",
    tag = "attendance",
    params(SessionQuery),
    responses((status = 200, description = "All sessions", body = Vec<AttendanceSession>)),
    security(("bearer" = []))
)]
pub async fn all_sessions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<AttendanceSession>>> {
    user.admin()?;
    Ok(Json(store::list_sessions(&state.pool, query.teacher_id, &query.filter(), query.limit()).await?))
}

#[utoipa::path(
    get,
    path = "/attendance/admin/stats",
    tag = "attendance",
    responses((status = 200, description = "Totals across all sessions", body = GlobalAttendanceStats)),
    security(("bearer" = []))
)]
pub async fn global_stats(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<GlobalAttendanceStats>> {
    user.admin()?;
    Ok(Json(store::global_stats(&state.pool).await?))
}

// ---- geo helpers ----

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlaceQuery {
    /// small_room, classroom, auditorium, lab, library, yard, sports_field, outdoor
    pub place: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendedRadius {
    pub place: String,
    pub radius_m: i64,
    pub coverage: Coverage,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoverageQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CoverageArea {
    pub coverage: Coverage,
    pub outline: Vec<Coordinate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudentLocationRequest {
    pub student: Coordinate,
    pub teacher: Coordinate,
    pub allowed_radius_m: i64,
    pub gps_precision_m: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/attendance/geo/presets",
    tag = "attendance",
    responses((status = 200, description = "Typical session setups", body = Vec<SessionPreset>)),
    security(("bearer" = []))
)]
pub async fn presets(_user: AuthUser) -> Json<Vec<SessionPreset>> {
    Json(geo::presets())
}

#[utoipa::path(
    get,
    path = "/attendance/geo/recommended-radius",
    tag = "attendance",
    params(PlaceQuery),
    responses((status = 200, description = "Radius for the kind of place", body = RecommendedRadius)),
    security(("bearer" = []))
)]
pub async fn recommended_radius(_user: AuthUser, Query(query): Query<PlaceQuery>) -> Json<RecommendedRadius> {
    let radius_m = geo::recommended_radius(&query.place);
    Json(RecommendedRadius { place: query.place, radius_m, coverage: geo::coverage(radius_m) })
}

#[utoipa::path(
    get,
    path = "/attendance/geo/coverage",
    tag = "attendance",
    params(CoverageQuery),
    responses(
        (status = 200, description = "Area and outline of the allowed zone", body = CoverageArea),
        (status = 400, description = "Invalid coordinates or radius", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn coverage(_user: AuthUser, Query(query): Query<CoverageQuery>) -> ApiResult<Json<CoverageArea>> {
    if query.radius_m <= 0 {
        return Err(ApiError::bad_request("radius_m must be positive"));
    }
    let center = Coordinate::new(query.latitude, query.longitude)?;
    Ok(Json(CoverageArea {
        coverage: geo::coverage(query.radius_m),
        outline: geo::circle_points(center, query.radius_m as f64, OUTLINE_POINTS),
    }))
}

#[utoipa::path(
    post,
    path = "/attendance/geo/validate-teacher-location",
    tag = "attendance",
    request_body = Coordinate,
    responses((status = 200, description = "Errors and warnings for a session centre", body = LocationCheck)),
    security(("bearer" = []))
)]
pub async fn validate_teacher_location(user: AuthUser, Json(point): Json<Coordinate>) -> ApiResult<Json<LocationCheck>> {
    user.staff()?;
    let point = Coordinate::new(point.latitude, point.longitude)?;
    Ok(Json(geo::validate_teacher_location(point)))
}

#[utoipa::path(
    post,
    path = "/attendance/geo/validate-student-location",
    tag = "attendance",
    request_body = StudentLocationRequest,
    responses((status = 200, description = "Distance check with suggestions", body = StudentLocationCheck)),
    security(("bearer" = []))
)]
pub async fn validate_student_location(
    _user: AuthUser,
    Json(req): Json<StudentLocationRequest>,
) -> ApiResult<Json<StudentLocationCheck>> {
    let student = Coordinate::new(req.student.latitude, req.student.longitude)?;
    let teacher = Coordinate::new(req.teacher.latitude, req.teacher.longitude)?;
    Ok(Json(geo::validate_student_location(student, teacher, req.allowed_radius_m, req.gps_precision_m)))
}
