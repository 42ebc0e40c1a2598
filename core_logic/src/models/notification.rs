use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub const KIND_LOW_GRADE: &str = "low_grade";
pub const KIND_EVALUATION: &str = "evaluation";
pub const KIND_GENERAL: &str = "general";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read: bool,
    pub parent_id: Option<i64>,
    pub student_id: i64,
    pub evaluation_id: Option<i64>,
    pub for_student: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

/// Уведомление для отображения получателю.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct NotificationView {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read: bool,
    pub student_id: i64,
    pub student_name: String,
    pub evaluation_id: Option<i64>,
    pub subject_name: Option<String>,
    pub score: Option<f64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct NotificationStats {
    pub total: i64,
    pub unread: i64,
    pub low_grade: i64,
    pub evaluation: i64,
    pub general: i64,
}

/// Кому адресован список уведомлений.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Student(i64),
    Parent(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DualNotificationResult {
    pub student: Vec<i64>,
    pub parents: Vec<i64>,
    pub score: f64,
    pub threshold: f64,
    pub parent_alert: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DirectNotificationRequest {
    pub student_id: i64,
    pub title: String,
    pub message: String,
    pub kind: Option<String>,
}
