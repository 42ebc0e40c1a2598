use chrono::NaiveDate;
use sqlx::SqlitePool;

use super::now;
use crate::models::{
    CreateEvaluationRequest, Evaluation, EvaluationFilter, EvaluationTypeSummary, UpdateEvaluationRequest,
};

pub async fn create_evaluation(pool: &SqlitePool, req: &CreateEvaluationRequest) -> Result<Evaluation, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(
        "INSERT INTO evaluations (date, description, score, student_id, subject_id, evaluation_type_id, term_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(req.date)
    .bind(&req.description)
    .bind(req.score)
    .bind(req.student_id)
    .bind(req.subject_id)
    .bind(req.evaluation_type_id)
    .bind(req.term_id)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_evaluation(pool: &SqlitePool, id: i64) -> Result<Option<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>("SELECT * FROM evaluations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Фильтр по студенту, периоду, предмету, типу и преподавателю (его предметы).
pub async fn list_evaluations(
    pool: &SqlitePool,
    filter: &EvaluationFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(
        "SELECT * FROM evaluations
         WHERE (? IS NULL OR student_id = ?)
           AND (? IS NULL OR term_id = ?)
           AND (? IS NULL OR subject_id = ?)
           AND (? IS NULL OR evaluation_type_id = ?)
           AND (? IS NULL OR subject_id IN (SELECT subject_id FROM teacher_subjects WHERE teacher_id = ?))
         ORDER BY date DESC, id DESC
         LIMIT ? OFFSET ?",
    )
    .bind(filter.student_id)
    .bind(filter.student_id)
    .bind(filter.term_id)
    .bind(filter.term_id)
    .bind(filter.subject_id)
    .bind(filter.subject_id)
    .bind(filter.evaluation_type_id)
    .bind(filter.evaluation_type_id)
    .bind(filter.teacher_id)
    .bind(filter.teacher_id)
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await
}

pub async fn update_evaluation(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateEvaluationRequest,
) -> Result<Option<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(
        "UPDATE evaluations SET date = COALESCE(?, date), description = COALESCE(?, description),
            score = COALESCE(?, score), student_id = COALESCE(?, student_id),
            subject_id = COALESCE(?, subject_id), evaluation_type_id = COALESCE(?, evaluation_type_id),
            term_id = COALESCE(?, term_id), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(req.date)
    .bind(&req.description)
    .bind(req.score)
    .bind(req.student_id)
    .bind(req.subject_id)
    .bind(req.evaluation_type_id)
    .bind(req.term_id)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_evaluation(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM evaluations WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Количество и средний балл по типам оценок.
pub async fn summary_by_type(
    pool: &SqlitePool,
    student_id: i64,
    term_id: i64,
    subject_id: Option<i64>,
) -> Result<Vec<EvaluationTypeSummary>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationTypeSummary>(
        "SELECT et.id AS evaluation_type_id, et.name AS evaluation_type,
                COUNT(e.id) AS count, AVG(e.score) AS average
         FROM evaluations e JOIN evaluation_types et ON et.id = e.evaluation_type_id
         WHERE e.student_id = ? AND e.term_id = ? AND (? IS NULL OR e.subject_id = ?)
         GROUP BY et.id, et.name
         ORDER BY et.name",
    )
    .bind(student_id)
    .bind(term_id)
    .bind(subject_id)
    .bind(subject_id)
    .fetch_all(pool)
    .await
}

/// Средний балл по каждому типу оценок студента в (предмет, период).
pub async fn averages_by_type(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
) -> Result<Vec<(i64, f64)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, f64)>(
        "SELECT evaluation_type_id, AVG(score) FROM evaluations
         WHERE student_id = ? AND subject_id = ? AND term_id = ?
         GROUP BY evaluation_type_id",
    )
    .bind(student_id)
    .bind(subject_id)
    .bind(term_id)
    .fetch_all(pool)
    .await
}

/// Средний балл по типу с заданным названием (например, "Attendance").
pub async fn average_for_type_name(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
    type_name: &str,
) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT AVG(e.score) FROM evaluations e
         JOIN evaluation_types et ON et.id = e.evaluation_type_id
         WHERE e.student_id = ? AND e.subject_id = ? AND e.term_id = ? AND LOWER(et.name) = LOWER(?)",
    )
    .bind(student_id)
    .bind(subject_id)
    .bind(term_id)
    .bind(type_name)
    .fetch_one(pool)
    .await
}

/// Оценка указанного типа на конкретную дату (для синхронизации посещаемости).
pub async fn find_on_date(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
    evaluation_type_id: i64,
    date: NaiveDate,
) -> Result<Option<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(
        "SELECT * FROM evaluations
         WHERE student_id = ? AND subject_id = ? AND term_id = ? AND evaluation_type_id = ? AND date = ?
         LIMIT 1",
    )
    .bind(student_id)
    .bind(subject_id)
    .bind(term_id)
    .bind(evaluation_type_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

pub async fn set_score(
    pool: &SqlitePool,
    id: i64,
    score: f64,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE evaluations SET score = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(score)
        .bind(description)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog;
    use crate::models::CreateSubjectRequest;
    use crate::testing;

    #[tokio::test]
    async fn summary_groups_by_type() {
        let school = testing::school().await;
        school.evaluation(school.student_id, school.exam_type_id, 80.0).await;
        school.evaluation(school.student_id, school.exam_type_id, 90.0).await;
        school.evaluation(school.student_id, school.homework_type_id, 70.0).await;
        school.evaluation(school.second_student_id, school.exam_type_id, 10.0).await;

        let physics = catalog::create_subject(
            &school.pool,
            &CreateSubjectRequest { name: "Physics".to_string(), description: "Mechanics".to_string() },
        )
        .await
        .unwrap();
        create_evaluation(
            &school.pool,
            &CreateEvaluationRequest {
                date: testing::date(2025, 3, 4),
                description: "Lab".to_string(),
                score: 40.0,
                student_id: school.student_id,
                subject_id: physics.id,
                evaluation_type_id: school.exam_type_id,
                term_id: school.term_ids[0],
            },
        )
        .await
        .unwrap();

        let math = summary_by_type(&school.pool, school.student_id, school.term_ids[0], Some(school.subject_id))
            .await
            .unwrap();
        let rows: Vec<(&str, i64, f64)> =
            math.iter().map(|r| (r.evaluation_type.as_str(), r.count, r.average)).collect();
        assert_eq!(rows, vec![("Exam", 2, 85.0), ("Homework", 1, 70.0)]);

        // Без фильтра по предмету экзамен по физике попадает в ту же группу
        let all = summary_by_type(&school.pool, school.student_id, school.term_ids[0], None).await.unwrap();
        assert_eq!(all[0].evaluation_type_id, school.exam_type_id);
        assert_eq!((all[0].count, all[0].average), (3, 70.0));

        let empty = summary_by_type(&school.pool, school.student_id, school.term_ids[1], None).await.unwrap();
        assert!(empty.is_empty());
    }
}
