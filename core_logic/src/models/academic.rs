use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    pub id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub student_id: i64,
    pub course_id: i64,
    pub school_year_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

/// Зачисление вместе с именами связанных сущностей.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentDetail {
    pub id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub student_id: i64,
    pub student_name: String,
    pub course_id: i64,
    pub course_name: String,
    pub school_year_id: i64,
    pub school_year: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEnrollmentRequest {
    pub description: String,
    pub date: NaiveDate,
    pub student_id: i64,
    pub course_id: i64,
    pub school_year_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEnrollmentRequest {
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub school_year_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct CourseSubject {
    pub id: i64,
    pub course_id: i64,
    pub subject_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CourseSubjectRequest {
    pub course_id: i64,
    pub subject_id: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct TeacherSubject {
    pub id: i64,
    pub teacher_id: i64,
    pub subject_id: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TeacherSubjectRequest {
    pub teacher_id: i64,
    pub subject_id: i64,
}

/// Вес типа оценки в итоговой оценке: (преподаватель, предмет, учебный год, тип).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EvaluationWeight {
    pub id: i64,
    pub percentage: f64,
    pub teacher_id: i64,
    pub subject_id: i64,
    pub school_year_id: i64,
    pub evaluation_type_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateWeightRequest {
    pub percentage: f64,
    pub teacher_id: i64,
    pub subject_id: i64,
    pub school_year_id: i64,
    pub evaluation_type_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateWeightRequest {
    pub percentage: Option<f64>,
    pub teacher_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub school_year_id: Option<i64>,
    pub evaluation_type_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Evaluation {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub score: f64,
    pub student_id: i64,
    pub subject_id: i64,
    pub evaluation_type_id: i64,
    pub term_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEvaluationRequest {
    pub date: NaiveDate,
    pub description: String,
    pub score: f64,
    pub student_id: i64,
    pub subject_id: i64,
    pub evaluation_type_id: i64,
    pub term_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEvaluationRequest {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub score: Option<f64>,
    pub student_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub evaluation_type_id: Option<i64>,
    pub term_id: Option<i64>,
}

/// Тело запроса для /evaluations/register/{kind}: тип определяется путём.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterEvaluationRequest {
    pub date: NaiveDate,
    pub description: String,
    pub score: f64,
    pub student_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationFilter {
    pub student_id: Option<i64>,
    pub term_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub evaluation_type_id: Option<i64>,
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EvaluationTypeSummary {
    pub evaluation_type_id: i64,
    pub evaluation_type: String,
    pub count: i64,
    pub average: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct FinalGrade {
    pub id: i64,
    pub final_score: f64,
    pub computed_at: NaiveDateTime,
    pub student_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFinalGradeRequest {
    pub final_score: f64,
    pub student_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateFinalGradeRequest {
    pub final_score: Option<f64>,
}

/// Итоговая оценка с названием предмета и периода (для отчётов).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct FinalGradeDetail {
    pub id: i64,
    pub final_score: f64,
    pub student_id: i64,
    pub subject_id: i64,
    pub subject_name: String,
    pub term_id: i64,
    pub term_name: String,
    pub computed_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct StoredPrediction {
    pub id: i64,
    pub grade_average: f64,
    pub attendance_pct: f64,
    pub participation_avg: f64,
    pub predicted_score: f64,
    pub classification: String,
    pub generated_at: NaiveDateTime,
    pub student_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionFilter {
    pub student_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub term_id: Option<i64>,
    pub classification: Option<String>,
}
