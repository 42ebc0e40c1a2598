use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub const SESSION_ACTIVE: &str = "active";
pub const SESSION_CLOSED: &str = "closed";
pub const SESSION_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSession {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub teacher_id: i64,
    pub course_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    pub duration_minutes: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub reference_address: Option<String>,
    pub allowed_radius_m: i64,
    pub allow_late: bool,
    pub tolerance_minutes: i64,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub title: String,
    pub description: Option<String>,
    pub course_id: i64,
    pub subject_id: i64,
    /// Если не указан, определяется по дате начала.
    pub term_id: Option<i64>,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub reference_address: Option<String>,
    pub allowed_radius_m: Option<i64>,
    pub allow_late: Option<bool>,
    pub tolerance_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub reference_address: Option<String>,
    pub allowed_radius_m: Option<i64>,
    pub allow_late: Option<bool>,
    pub tolerance_minutes: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct StudentAttendance {
    pub id: i64,
    pub session_id: i64,
    pub student_id: i64,
    pub present: bool,
    pub marked_at: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_m: Option<f64>,
    pub method: String,
    pub notes: Option<String>,
    pub late: bool,
    pub justified: bool,
    pub justification: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

/// Запись посещаемости с именем студента (детали сессии).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecordView {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub present: bool,
    pub late: bool,
    pub justified: bool,
    pub marked_at: Option<NaiveDateTime>,
    pub distance_m: Option<f64>,
    pub justification: Option<String>,
    pub status: String,
}

/// Запись посещаемости студента вместе с данными сессии.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct StudentAttendanceView {
    pub id: i64,
    pub session_id: i64,
    pub title: String,
    pub course_id: i64,
    pub subject_id: i64,
    pub starts_at: NaiveDateTime,
    pub present: bool,
    pub late: bool,
    pub justified: bool,
    pub marked_at: Option<NaiveDateTime>,
    pub distance_m: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MarkAttendanceRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct JustifyAbsenceRequest {
    pub student_id: i64,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceCheck {
    pub can_mark: bool,
    pub message: String,
    pub distance_m: Option<f64>,
    pub within_range: bool,
    pub minutes_left: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SessionStats {
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub justified: i64,
    pub attendance_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionDetail {
    pub session: AttendanceSession,
    pub stats: SessionStats,
    pub records: Vec<AttendanceRecordView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CloseSessionResult {
    pub session: AttendanceSession,
    pub stats: SessionStats,
    pub evaluations_created: i64,
    pub evaluations_updated: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GlobalAttendanceStats {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub closed_sessions: i64,
    pub total_records: i64,
    pub present_records: i64,
    pub attendance_pct: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionFilter {
    pub status: Option<String>,
    pub course_id: Option<i64>,
    pub subject_id: Option<i64>,
}
