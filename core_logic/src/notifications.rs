//! Двойные уведомления: студенту всегда, родителям только при низком балле.

use sqlx::SqlitePool;
use tracing::info;

use crate::db::notifications::{self as db, NewNotification};
use crate::db::{catalog, evaluations, people};
use crate::error::{CoreError, CoreResult};
use crate::models::{DualNotificationResult, Notification, KIND_EVALUATION, KIND_GENERAL, KIND_LOW_GRADE};

pub fn validate_threshold(threshold: f64) -> CoreResult<()> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(CoreError::validation("parent_threshold must be between 0 and 100"));
    }
    Ok(())
}

/// Уведомляет о новой или изменённой оценке. Повторный вызов не создаёт дублей.
pub async fn notify_evaluation(
    pool: &SqlitePool,
    evaluation_id: i64,
    parent_threshold: f64,
) -> CoreResult<DualNotificationResult> {
    validate_threshold(parent_threshold)?;
    let evaluation = evaluations::get_evaluation(pool, evaluation_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Evaluation"))?;
    let student = people::get_student(pool, evaluation.student_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Student"))?;
    let subject_name = catalog::get_subject(pool, evaluation.subject_id)
        .await?
        .map(|s| s.name)
        .unwrap_or_else(|| "a subject".to_string());

    let mut result = DualNotificationResult {
        student: Vec::new(),
        parents: Vec::new(),
        score: evaluation.score,
        threshold: parent_threshold,
        parent_alert: evaluation.score < parent_threshold,
    };

    if !db::student_notified(pool, evaluation.id).await? {
        let message = format!(
            "You received {:.1} in {} ({}).",
            evaluation.score, subject_name, evaluation.description
        );
        let created = db::create_notification(
            pool,
            &NewNotification {
                title: "New evaluation",
                message: &message,
                kind: KIND_EVALUATION,
                parent_id: None,
                student_id: student.id,
                evaluation_id: Some(evaluation.id),
                for_student: true,
            },
        )
        .await?;
        result.student.push(created.id);
    }

    if result.parent_alert {
        let message = format!(
            "{} received {:.1} in {}, below the alert threshold of {:.1}.",
            student.full_name(),
            evaluation.score,
            subject_name,
            parent_threshold
        );
        for parent in people::parents_of_student(pool, student.id).await? {
            if db::parent_notified(pool, evaluation.id, parent.id).await? {
                continue;
            }
            let created = db::create_notification(
                pool,
                &NewNotification {
                    title: "Low grade alert",
                    message: &message,
                    kind: KIND_LOW_GRADE,
                    parent_id: Some(parent.id),
                    student_id: student.id,
                    evaluation_id: Some(evaluation.id),
                    for_student: false,
                },
            )
            .await?;
            result.parents.push(created.id);
        }
    }

    info!(
        "Evaluation {} notifications: student={:?}, parents={:?}",
        evaluation.id, result.student, result.parents
    );
    Ok(result)
}

/// Прямое уведомление студенту от сотрудника.
pub async fn notify_student(
    pool: &SqlitePool,
    student_id: i64,
    title: &str,
    message: &str,
    kind: Option<&str>,
) -> CoreResult<Notification> {
    people::get_student(pool, student_id).await?.ok_or_else(|| CoreError::not_found("Student"))?;
    Ok(db::create_notification(
        pool,
        &NewNotification {
            title,
            message,
            kind: kind.unwrap_or(KIND_GENERAL),
            parent_id: None,
            student_id,
            evaluation_id: None,
            for_student: true,
        },
    )
    .await?)
}

/// Прямое уведомление всем родителям студента.
pub async fn notify_parents(
    pool: &SqlitePool,
    student_id: i64,
    title: &str,
    message: &str,
    kind: Option<&str>,
) -> CoreResult<Vec<Notification>> {
    people::get_student(pool, student_id).await?.ok_or_else(|| CoreError::not_found("Student"))?;
    let mut out = Vec::new();
    for parent in people::parents_of_student(pool, student_id).await? {
        out.push(
            db::create_notification(
                pool,
                &NewNotification {
                    title,
                    message,
                    kind: kind.unwrap_or(KIND_GENERAL),
                    parent_id: Some(parent.id),
                    student_id,
                    evaluation_id: None,
                    for_student: false,
                },
            )
            .await?,
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recipient;
    use crate::testing;

    #[tokio::test]
    async fn high_score_notifies_only_student() {
        let school = testing::school().await;
        let evaluation = school.evaluation(school.student_id, school.exam_type_id, 85.0).await;
        let result = notify_evaluation(&school.pool, evaluation.id, 50.0).await.unwrap();
        assert_eq!(result.student.len(), 1);
        assert!(result.parents.is_empty());
        assert!(!result.parent_alert);
    }

    #[tokio::test]
    async fn low_score_alerts_parents_once() {
        let school = testing::school().await;
        let evaluation = school.evaluation(school.student_id, school.exam_type_id, 35.0).await;
        let first = notify_evaluation(&school.pool, evaluation.id, 50.0).await.unwrap();
        assert_eq!((first.student.len(), first.parents.len()), (1, 1));

        let again = notify_evaluation(&school.pool, evaluation.id, 50.0).await.unwrap();
        assert!(again.student.is_empty());
        assert!(again.parents.is_empty());
        assert!(again.parent_alert);

        let parent_inbox = db::list_for_recipient(&school.pool, Recipient::Parent(school.parent_id), false, 50)
            .await
            .unwrap();
        assert_eq!(parent_inbox.len(), 1);
        assert_eq!(parent_inbox[0].kind, KIND_LOW_GRADE);
        assert_eq!(parent_inbox[0].subject_name.as_deref(), Some("Mathematics"));
        assert_eq!(parent_inbox[0].score, Some(35.0));
    }

    #[tokio::test]
    async fn inbox_operations_are_scoped_to_recipient() {
        let school = testing::school().await;
        let evaluation = school.evaluation(school.student_id, school.exam_type_id, 20.0).await;
        let result = notify_evaluation(&school.pool, evaluation.id, 50.0).await.unwrap();
        let student = Recipient::Student(school.student_id);
        let parent = Recipient::Parent(school.parent_id);

        assert_eq!(db::unread_count(&school.pool, student).await.unwrap(), 1);
        // Родитель не может отметить уведомление студента
        assert!(!db::mark_read(&school.pool, parent, result.student[0]).await.unwrap());
        assert!(db::mark_read(&school.pool, student, result.student[0]).await.unwrap());
        assert_eq!(db::unread_count(&school.pool, student).await.unwrap(), 0);
        assert!(db::list_for_recipient(&school.pool, student, true, 50).await.unwrap().is_empty());

        notify_parents(&school.pool, school.student_id, "Meeting", "Parents meeting on Friday", None)
            .await
            .unwrap();
        let stats = db::stats(&school.pool, parent).await.unwrap();
        assert_eq!((stats.total, stats.unread, stats.low_grade, stats.general), (2, 2, 1, 1));
        assert_eq!(db::mark_all_read(&school.pool, parent).await.unwrap(), 2);

        assert!(db::delete_for_recipient(&school.pool, parent, result.parents[0]).await.unwrap());
        assert_eq!(db::stats(&school.pool, parent).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn threshold_is_validated() {
        let school = testing::school().await;
        let evaluation = school.evaluation(school.student_id, school.exam_type_id, 20.0).await;
        assert!(matches!(
            notify_evaluation(&school.pool, evaluation.id, 120.0).await,
            Err(CoreError::Validation(_))
        ));
    }
}
