use sqlx::SqlitePool;

use super::now;
use crate::models::{PredictionFilter, StoredPrediction};

pub struct PredictionRow<'a> {
    pub student_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub grade_average: f64,
    pub attendance_pct: f64,
    pub participation_avg: f64,
    pub predicted_score: f64,
    pub classification: &'a str,
}

pub async fn upsert_prediction(pool: &SqlitePool, row: &PredictionRow<'_>) -> Result<StoredPrediction, sqlx::Error> {
    let ts = now();
    sqlx::query_as::<_, StoredPrediction>(
        "INSERT INTO predictions (grade_average, attendance_pct, participation_avg, predicted_score,
            classification, generated_at, student_id, subject_id, term_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (student_id, subject_id, term_id) DO UPDATE SET
            grade_average = excluded.grade_average,
            attendance_pct = excluded.attendance_pct,
            participation_avg = excluded.participation_avg,
            predicted_score = excluded.predicted_score,
            classification = excluded.classification,
            generated_at = excluded.generated_at,
            updated_at = excluded.generated_at
         RETURNING *",
    )
    .bind(row.grade_average)
    .bind(row.attendance_pct)
    .bind(row.participation_avg)
    .bind(row.predicted_score)
    .bind(row.classification)
    .bind(ts)
    .bind(row.student_id)
    .bind(row.subject_id)
    .bind(row.term_id)
    .bind(ts)
    .fetch_one(pool)
    .await
}

pub async fn list_predictions(
    pool: &SqlitePool,
    filter: &PredictionFilter,
    limit: i64,
) -> Result<Vec<StoredPrediction>, sqlx::Error> {
    sqlx::query_as::<_, StoredPrediction>(
        "SELECT * FROM predictions
         WHERE (? IS NULL OR student_id = ?)
           AND (? IS NULL OR subject_id = ?)
           AND (? IS NULL OR term_id = ?)
           AND (? IS NULL OR classification = ?)
         ORDER BY generated_at DESC, id DESC LIMIT ?",
    )
    .bind(filter.student_id)
    .bind(filter.student_id)
    .bind(filter.subject_id)
    .bind(filter.subject_id)
    .bind(filter.term_id)
    .bind(filter.term_id)
    .bind(&filter.classification)
    .bind(&filter.classification)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn student_predictions_for_year(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: i64,
) -> Result<Vec<StoredPrediction>, sqlx::Error> {
    sqlx::query_as::<_, StoredPrediction>(
        "SELECT p.* FROM predictions p JOIN terms t ON t.id = p.term_id
         WHERE p.student_id = ? AND t.school_year_id = ?
         ORDER BY t.start_date, p.subject_id",
    )
    .bind(student_id)
    .bind(school_year_id)
    .fetch_all(pool)
    .await
}

/// Пара (студент, предмет) для сводного прогноза по учебному году.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PredictionTarget {
    pub student_id: i64,
    pub subject_id: i64,
    pub level: String,
}

/// Зачисленные в учебный год студенты вместе с предметами их курса.
pub async fn prediction_targets(
    pool: &SqlitePool,
    school_year_id: i64,
    limit: i64,
) -> Result<Vec<PredictionTarget>, sqlx::Error> {
    sqlx::query_as::<_, PredictionTarget>(
        "SELECT e.student_id, cs.subject_id, c.level
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         JOIN course_subjects cs ON cs.course_id = e.course_id
         WHERE e.school_year_id = ?
         ORDER BY e.student_id, cs.subject_id
         LIMIT ?",
    )
    .bind(school_year_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
