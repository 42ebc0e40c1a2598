use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// Хэши паролей в эти структуры не попадают: их читают отдельные запросы в db::people.

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub image_url: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub home_address: Option<String>,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateStudentRequest {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub image_url: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub home_address: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateStudentRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub image_url: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub home_address: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Преподаватель; `is_teacher = false` означает администратора.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Teacher {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub is_teacher: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTeacherRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub is_teacher: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateTeacherRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub password: Option<String>,
    pub is_teacher: Option<bool>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Parent {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateParentRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub gender: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateParentRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct ParentStudent {
    pub id: i64,
    pub parent_id: i64,
    pub student_id: i64,
    pub created_at: NaiveDateTime,
}

fn default_true() -> bool {
    true
}

/// Проверяет, что обязательные текстовые поля не пустые.
pub fn require_non_blank(fields: &[(&str, &str)]) -> Result<(), crate::error::CoreError> {
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(crate::error::CoreError::validation(format!("{name} must not be empty")));
        }
    }
    Ok(())
}
