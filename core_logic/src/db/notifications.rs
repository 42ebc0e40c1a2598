use sqlx::SqlitePool;

use super::now;
use crate::models::{Notification, NotificationStats, NotificationView, Recipient};

pub struct NewNotification<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub kind: &'a str,
    pub parent_id: Option<i64>,
    pub student_id: i64,
    pub evaluation_id: Option<i64>,
    pub for_student: bool,
}

pub async fn create_notification(pool: &SqlitePool, new: &NewNotification<'_>) -> Result<Notification, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (title, message, kind, read, parent_id, student_id, evaluation_id, for_student, created_at)
         VALUES (?, ?, ?, 0, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new.title)
    .bind(new.message)
    .bind(new.kind)
    .bind(new.parent_id)
    .bind(new.student_id)
    .bind(new.evaluation_id)
    .bind(new.for_student)
    .bind(now())
    .fetch_one(pool)
    .await
}

/// Уже есть уведомление студенту об этой оценке?
pub async fn student_notified(pool: &SqlitePool, evaluation_id: i64) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE evaluation_id = ? AND for_student = 1",
    )
    .bind(evaluation_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn parent_notified(pool: &SqlitePool, evaluation_id: i64, parent_id: i64) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE evaluation_id = ? AND parent_id = ? AND for_student = 0",
    )
    .bind(evaluation_id)
    .bind(parent_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

// Условие адресата: (student_id, parent_id) ровно один из них задан
const RECIPIENT_CLAUSE: &str =
    "((?1 IS NOT NULL AND n.student_id = ?1 AND n.for_student = 1) OR (?2 IS NOT NULL AND n.parent_id = ?2 AND n.for_student = 0))";

fn recipient_ids(recipient: Recipient) -> (Option<i64>, Option<i64>) {
    match recipient {
        Recipient::Student(id) => (Some(id), None),
        Recipient::Parent(id) => (None, Some(id)),
    }
}

/// Уведомления получателя, новые первыми.
pub async fn list_for_recipient(
    pool: &SqlitePool,
    recipient: Recipient,
    unread_only: bool,
    limit: i64,
) -> Result<Vec<NotificationView>, sqlx::Error> {
    let (student_id, parent_id) = recipient_ids(recipient);
    let sql = format!(
        "SELECT n.id, n.title, n.message, n.kind, n.read, n.student_id,
                st.first_name || ' ' || st.last_name AS student_name,
                n.evaluation_id, sb.name AS subject_name, e.score, n.created_at
         FROM notifications n
         JOIN students st ON st.id = n.student_id
         LEFT JOIN evaluations e ON e.id = n.evaluation_id
         LEFT JOIN subjects sb ON sb.id = e.subject_id
         WHERE {RECIPIENT_CLAUSE} AND (?3 = 0 OR n.read = 0)
         ORDER BY n.created_at DESC, n.id DESC
         LIMIT ?4"
    );
    sqlx::query_as::<_, NotificationView>(&sql)
        .bind(student_id)
        .bind(parent_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn unread_count(pool: &SqlitePool, recipient: Recipient) -> Result<i64, sqlx::Error> {
    let (student_id, parent_id) = recipient_ids(recipient);
    let sql = format!("SELECT COUNT(*) FROM notifications n WHERE {RECIPIENT_CLAUSE} AND n.read = 0");
    sqlx::query_scalar(&sql).bind(student_id).bind(parent_id).fetch_one(pool).await
}

/// Отмечает прочитанным; false, если уведомление не принадлежит получателю.
pub async fn mark_read(pool: &SqlitePool, recipient: Recipient, id: i64) -> Result<bool, sqlx::Error> {
    let (student_id, parent_id) = recipient_ids(recipient);
    let sql = format!(
        "UPDATE notifications AS n SET read = 1, updated_at = ?3 WHERE {RECIPIENT_CLAUSE} AND n.id = ?4"
    );
    let result = sqlx::query(&sql)
        .bind(student_id)
        .bind(parent_id)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(pool: &SqlitePool, recipient: Recipient) -> Result<u64, sqlx::Error> {
    let (student_id, parent_id) = recipient_ids(recipient);
    let sql = format!(
        "UPDATE notifications AS n SET read = 1, updated_at = ?3 WHERE {RECIPIENT_CLAUSE} AND n.read = 0"
    );
    let result = sqlx::query(&sql)
        .bind(student_id)
        .bind(parent_id)
        .bind(now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_for_recipient(pool: &SqlitePool, recipient: Recipient, id: i64) -> Result<bool, sqlx::Error> {
    let (student_id, parent_id) = recipient_ids(recipient);
    let sql = format!("DELETE FROM notifications AS n WHERE {RECIPIENT_CLAUSE} AND n.id = ?3");
    let result = sqlx::query(&sql)
        .bind(student_id)
        .bind(parent_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn stats(pool: &SqlitePool, recipient: Recipient) -> Result<NotificationStats, sqlx::Error> {
    let (student_id, parent_id) = recipient_ids(recipient);
    let sql = format!(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN n.read = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN n.kind = 'low_grade' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN n.kind = 'evaluation' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN n.kind = 'general' THEN 1 ELSE 0 END), 0)
         FROM notifications n WHERE {RECIPIENT_CLAUSE}"
    );
    let (total, unread, low_grade, evaluation, general): (i64, i64, i64, i64, i64) = sqlx::query_as(&sql)
        .bind(student_id)
        .bind(parent_id)
        .fetch_one(pool)
        .await?;
    Ok(NotificationStats { total, unread, low_grade, evaluation, general })
}
