use sqlx::SqlitePool;

use super::now;
use crate::models::{FinalGrade, FinalGradeDetail};

/// Создаёт или обновляет итоговую оценку (уникальна по студенту, предмету и периоду).
pub async fn upsert_final_grade(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
    final_score: f64,
) -> Result<FinalGrade, sqlx::Error> {
    let ts = now();
    sqlx::query_as::<_, FinalGrade>(
        "INSERT INTO final_grades (final_score, computed_at, student_id, subject_id, term_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (student_id, subject_id, term_id)
         DO UPDATE SET final_score = excluded.final_score, computed_at = excluded.computed_at, updated_at = excluded.computed_at
         RETURNING *",
    )
    .bind(final_score)
    .bind(ts)
    .bind(student_id)
    .bind(subject_id)
    .bind(term_id)
    .bind(ts)
    .fetch_one(pool)
    .await
}

pub async fn create_final_grade(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
    final_score: f64,
) -> Result<FinalGrade, sqlx::Error> {
    let ts = now();
    sqlx::query_as::<_, FinalGrade>(
        "INSERT INTO final_grades (final_score, computed_at, student_id, subject_id, term_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(final_score)
    .bind(ts)
    .bind(student_id)
    .bind(subject_id)
    .bind(term_id)
    .bind(ts)
    .fetch_one(pool)
    .await
}

pub async fn get_final_grade(pool: &SqlitePool, id: i64) -> Result<Option<FinalGrade>, sqlx::Error> {
    sqlx::query_as::<_, FinalGrade>("SELECT * FROM final_grades WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_final_grade(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
) -> Result<Option<FinalGrade>, sqlx::Error> {
    sqlx::query_as::<_, FinalGrade>(
        "SELECT * FROM final_grades WHERE student_id = ? AND subject_id = ? AND term_id = ?",
    )
    .bind(student_id)
    .bind(subject_id)
    .bind(term_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_final_grade(pool: &SqlitePool, id: i64, final_score: f64) -> Result<Option<FinalGrade>, sqlx::Error> {
    sqlx::query_as::<_, FinalGrade>(
        "UPDATE final_grades SET final_score = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(final_score)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_final_grade(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM final_grades WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_final_grades(
    pool: &SqlitePool,
    student_id: Option<i64>,
    term_id: Option<i64>,
) -> Result<Vec<FinalGrade>, sqlx::Error> {
    sqlx::query_as::<_, FinalGrade>(
        "SELECT * FROM final_grades
         WHERE (? IS NULL OR student_id = ?) AND (? IS NULL OR term_id = ?)
         ORDER BY term_id, subject_id",
    )
    .bind(student_id)
    .bind(student_id)
    .bind(term_id)
    .bind(term_id)
    .fetch_all(pool)
    .await
}

/// Итоговые оценки студента за учебный год с названиями предметов и периодов.
pub async fn student_grades_for_year(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: i64,
) -> Result<Vec<FinalGradeDetail>, sqlx::Error> {
    sqlx::query_as::<_, FinalGradeDetail>(
        "SELECT fg.id, fg.final_score, fg.student_id, fg.subject_id, s.name AS subject_name,
                fg.term_id, t.name AS term_name, fg.computed_at
         FROM final_grades fg
         JOIN subjects s ON s.id = fg.subject_id
         JOIN terms t ON t.id = fg.term_id
         WHERE fg.student_id = ? AND t.school_year_id = ?
         ORDER BY t.start_date, s.name",
    )
    .bind(student_id)
    .bind(school_year_id)
    .fetch_all(pool)
    .await
}
