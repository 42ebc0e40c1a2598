//! Правила каталога, весов и оценок поверх слоя db.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use utoipa::ToSchema;

use crate::db::dashboard::{self, TeacherCounters};
use crate::db::{assignments, catalog, evaluations};
use crate::error::{CoreError, CoreResult};
use crate::grading::round2;
use crate::models::{
    CreateEvaluationRequest, CreateTermRequest, CreateWeightRequest, Evaluation, EvaluationWeight,
    RegisterEvaluationRequest, SchoolYear, Term, UpdateEvaluationRequest, UpdateTermRequest,
    UpdateWeightRequest,
};

// ---------- Периоды ----------

pub async fn create_term(pool: &SqlitePool, req: &CreateTermRequest) -> CoreResult<Term> {
    if req.start_date > req.end_date {
        return Err(CoreError::validation("start_date must not be after end_date"));
    }
    if req.name.trim().is_empty() {
        return Err(CoreError::validation("name must not be empty"));
    }
    catalog::get_school_year(pool, req.school_year_id)
        .await?
        .ok_or_else(|| CoreError::not_found("School year"))?;
    Ok(catalog::create_term(pool, req).await?)
}

pub async fn update_term(pool: &SqlitePool, id: i64, req: &UpdateTermRequest) -> CoreResult<Term> {
    let current = catalog::get_term(pool, id).await?.ok_or_else(|| CoreError::not_found("Term"))?;
    let start = req.start_date.unwrap_or(current.start_date);
    let end = req.end_date.unwrap_or(current.end_date);
    if start > end {
        return Err(CoreError::validation("start_date must not be after end_date"));
    }
    catalog::update_term(pool, id, req)
        .await?
        .ok_or_else(|| CoreError::not_found("Term"))
}

/// Период, содержащий дату; если его нет - ошибка валидации.
pub async fn term_for_date(pool: &SqlitePool, date: NaiveDate) -> CoreResult<Term> {
    catalog::term_for_date(pool, date).await?.ok_or_else(|| {
        CoreError::validation(format!(
            "date {date} does not fall within any configured term"
        ))
    })
}

pub async fn current_school_year(pool: &SqlitePool, today: NaiveDate) -> CoreResult<SchoolYear> {
    catalog::current_school_year(pool, today)
        .await?
        .ok_or_else(|| CoreError::not_found("Current school year"))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeacherDashboard {
    pub teacher_id: i64,
    pub school_year: SchoolYear,
    pub counters: TeacherCounters,
}

/// Счётчики преподавателя за текущий учебный год. Без назначенных предметов - NotFound.
pub async fn teacher_dashboard(pool: &SqlitePool, teacher_id: i64, today: NaiveDate) -> CoreResult<TeacherDashboard> {
    let school_year = current_school_year(pool, today).await?;
    let counters = dashboard::teacher_counters(pool, teacher_id, school_year.id).await?;
    if counters.subjects == 0 {
        return Err(CoreError::not_found("Assigned subjects"));
    }
    Ok(TeacherDashboard { teacher_id, school_year, counters })
}

// ---------- Веса ----------

fn validate_percentage(percentage: f64) -> CoreResult<()> {
    if !(0.0..=100.0).contains(&percentage) {
        return Err(CoreError::validation("percentage must be between 0 and 100"));
    }
    Ok(())
}

/// Сумма весов группы (преподаватель, предмет, год) не может превышать 100.
async fn ensure_group_capacity(
    pool: &SqlitePool,
    teacher_id: i64,
    subject_id: i64,
    school_year_id: i64,
    percentage: f64,
    exclude_id: Option<i64>,
) -> CoreResult<()> {
    let used = assignments::weight_group_sum(pool, teacher_id, subject_id, school_year_id, exclude_id).await?;
    // Сумма дробных процентов в f64 может чуть превышать 100
    let total = round2(used + percentage);
    if total > 100.0 {
        return Err(CoreError::conflict(format!(
            "weights for this teacher, subject and school year would total {total:.2}%, above 100%"
        )));
    }
    Ok(())
}

pub async fn create_weight(pool: &SqlitePool, req: &CreateWeightRequest) -> CoreResult<EvaluationWeight> {
    validate_percentage(req.percentage)?;
    ensure_group_capacity(pool, req.teacher_id, req.subject_id, req.school_year_id, req.percentage, None).await?;
    Ok(assignments::create_weight(pool, req).await?)
}

pub async fn update_weight(pool: &SqlitePool, id: i64, req: &UpdateWeightRequest) -> CoreResult<EvaluationWeight> {
    let current = assignments::get_weight(pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Evaluation weight"))?;
    let percentage = req.percentage.unwrap_or(current.percentage);
    validate_percentage(percentage)?;
    ensure_group_capacity(
        pool,
        req.teacher_id.unwrap_or(current.teacher_id),
        req.subject_id.unwrap_or(current.subject_id),
        req.school_year_id.unwrap_or(current.school_year_id),
        percentage,
        Some(id),
    )
    .await?;
    assignments::update_weight(pool, id, req)
        .await?
        .ok_or_else(|| CoreError::not_found("Evaluation weight"))
}

// ---------- Оценки ----------

pub fn validate_score(score: f64) -> CoreResult<()> {
    if !(0.0..=100.0).contains(&score) {
        return Err(CoreError::validation("score must be between 0 and 100"));
    }
    Ok(())
}

pub async fn create_evaluation(pool: &SqlitePool, req: &CreateEvaluationRequest) -> CoreResult<Evaluation> {
    validate_score(req.score)?;
    let evaluation = evaluations::create_evaluation(pool, req).await?;
    info!(
        "Evaluation {} registered: student={}, subject={}, score={}",
        evaluation.id, evaluation.student_id, evaluation.subject_id, evaluation.score
    );
    Ok(evaluation)
}

pub async fn update_evaluation(pool: &SqlitePool, id: i64, req: &UpdateEvaluationRequest) -> CoreResult<Evaluation> {
    if let Some(score) = req.score {
        validate_score(score)?;
    }
    evaluations::update_evaluation(pool, id, req)
        .await?
        .ok_or_else(|| CoreError::not_found("Evaluation"))
}

/// Виды оценок, регистрируемые через /evaluations/register/{kind}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationKind {
    Exam,
    Homework,
    Presentation,
    Participation,
    Attendance,
    Practice,
    Project,
    Group,
    Essay,
    Quiz,
}

impl EvaluationKind {
    pub fn from_path(kind: &str) -> Option<Self> {
        let kind = match kind.to_lowercase().as_str() {
            "exam" => EvaluationKind::Exam,
            "homework" => EvaluationKind::Homework,
            "presentation" => EvaluationKind::Presentation,
            "participation" => EvaluationKind::Participation,
            "attendance" => EvaluationKind::Attendance,
            "practice" => EvaluationKind::Practice,
            "project" => EvaluationKind::Project,
            "group" => EvaluationKind::Group,
            "essay" => EvaluationKind::Essay,
            "quiz" => EvaluationKind::Quiz,
            _ => return None,
        };
        Some(kind)
    }

    /// Название типа оценки в справочнике.
    pub fn type_name(self) -> &'static str {
        match self {
            EvaluationKind::Exam => "Exam",
            EvaluationKind::Homework => "Homework",
            EvaluationKind::Presentation => "Presentation",
            EvaluationKind::Participation => "Participation",
            EvaluationKind::Attendance => "Attendance",
            EvaluationKind::Practice => "Practice",
            EvaluationKind::Project => "Project",
            EvaluationKind::Group => "Group Work",
            EvaluationKind::Essay => "Essay",
            EvaluationKind::Quiz => "Quiz",
        }
    }
}

pub async fn register_evaluation(
    pool: &SqlitePool,
    kind: &str,
    req: &RegisterEvaluationRequest,
) -> CoreResult<Evaluation> {
    let kind = EvaluationKind::from_path(kind)
        .ok_or_else(|| CoreError::validation(format!("unknown evaluation kind '{kind}'")))?;
    let evaluation_type = catalog::find_evaluation_type_by_name(pool, kind.type_name())
        .await?
        .ok_or_else(|| CoreError::not_found(format!("Evaluation type '{}'", kind.type_name())))?;

    let create = CreateEvaluationRequest {
        date: req.date,
        description: req.description.clone(),
        score: req.score,
        student_id: req.student_id,
        subject_id: req.subject_id,
        evaluation_type_id: evaluation_type.id,
        term_id: req.term_id,
    };
    create_evaluation(pool, &create).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn term_dates_must_be_ordered() {
        let school = testing::school().await;
        let req = CreateTermRequest {
            name: "Broken".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            school_year_id: school.school_year_id,
        };
        assert!(matches!(create_term(&school.pool, &req).await, Err(CoreError::Validation(_))));

        let update = UpdateTermRequest {
            end_date: Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            ..Default::default()
        };
        let err = update_term(&school.pool, school.term_ids[0], &update).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn weight_group_cannot_exceed_hundred() {
        let school = testing::school().await;
        // В фикстуре уже 100% (50 + 30 + 20)
        let req = CreateWeightRequest {
            percentage: 10.0,
            teacher_id: school.teacher_id,
            subject_id: school.subject_id,
            school_year_id: school.school_year_id,
            evaluation_type_id: school.attendance_type_id,
        };
        assert!(matches!(create_weight(&school.pool, &req).await, Err(CoreError::Conflict(_))));

        // Уменьшаем экзамен до 40% и освобождаем место
        let weights = assignments::list_weights(&school.pool, Some(school.teacher_id), None, None).await.unwrap();
        let exam = weights.iter().find(|w| w.evaluation_type_id == school.exam_type_id).unwrap();
        let update = UpdateWeightRequest { percentage: Some(40.0), ..Default::default() };
        update_weight(&school.pool, exam.id, &update).await.unwrap();
        create_weight(&school.pool, &req).await.unwrap();

        let bad = CreateWeightRequest { percentage: 120.0, ..req };
        assert!(matches!(create_weight(&school.pool, &bad).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn fractional_weights_may_fill_exactly_hundred() {
        let school = testing::school().await;
        let existing = assignments::list_weights(&school.pool, Some(school.teacher_id), None, None).await.unwrap();
        for weight in existing {
            assignments::delete_weight(&school.pool, weight.id).await.unwrap();
        }

        let types = [school.exam_type_id, school.homework_type_id, school.participation_type_id];
        for (percentage, evaluation_type_id) in [0.2, 83.9, 15.9].into_iter().zip(types) {
            let req = CreateWeightRequest {
                percentage,
                teacher_id: school.teacher_id,
                subject_id: school.subject_id,
                school_year_id: school.school_year_id,
                evaluation_type_id,
            };
            create_weight(&school.pool, &req).await.unwrap();
        }

        let over = CreateWeightRequest {
            percentage: 0.1,
            teacher_id: school.teacher_id,
            subject_id: school.subject_id,
            school_year_id: school.school_year_id,
            evaluation_type_id: school.attendance_type_id,
        };
        assert!(matches!(create_weight(&school.pool, &over).await, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn register_resolves_type_by_kind() {
        let school = testing::school().await;
        let req = RegisterEvaluationRequest {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            description: "Unit test".to_string(),
            score: 88.0,
            student_id: school.student_id,
            subject_id: school.subject_id,
            term_id: school.term_ids[0],
        };
        let evaluation = register_evaluation(&school.pool, "EXAM", &req).await.unwrap();
        assert_eq!(evaluation.evaluation_type_id, school.exam_type_id);

        assert!(matches!(register_evaluation(&school.pool, "poem", &req).await, Err(CoreError::Validation(_))));
        // Тип "Quiz" в справочнике отсутствует
        assert!(matches!(register_evaluation(&school.pool, "quiz", &req).await, Err(CoreError::NotFound(_))));

        let bad = RegisterEvaluationRequest { score: 101.0, ..req };
        assert!(matches!(register_evaluation(&school.pool, "exam", &bad).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn term_lookup_reports_validation_error() {
        let school = testing::school().await;
        let gap = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
        assert!(matches!(term_for_date(&school.pool, gap).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn teacher_dashboard_counts_current_year() {
        let school = testing::school().await;
        school.evaluation(school.student_id, school.exam_type_id, 80.0).await;

        let board = teacher_dashboard(&school.pool, school.teacher_id, testing::date(2025, 3, 10)).await.unwrap();
        assert_eq!(board.school_year.id, school.school_year_id);
        assert_eq!(
            board.counters,
            TeacherCounters { subjects: 1, courses: 1, students: 2, enrollments: 2, evaluations: 1, final_grades: 0, terms: 3 }
        );
    }

    #[tokio::test]
    async fn teacher_dashboard_not_found_cases() {
        let school = testing::school().await;
        // Между вторым и третьим периодом и после конца года
        for day in [testing::date(2025, 8, 15), testing::date(2026, 1, 15)] {
            let err = teacher_dashboard(&school.pool, school.teacher_id, day).await.unwrap_err();
            assert!(matches!(err, CoreError::NotFound(ref what) if what == "Current school year"));
        }

        let idle = crate::db::people::create_teacher(
            &school.pool,
            &crate::models::CreateTeacherRequest {
                first_name: "Rosa".to_string(),
                last_name: "Vaca".to_string(),
                phone: "72222222".to_string(),
                email: "rosa@docente.edu".to_string(),
                gender: "F".to_string(),
                password: testing::PASSWORD.to_string(),
                is_teacher: true,
            },
            "unused-hash",
        )
        .await
        .unwrap();
        let err = teacher_dashboard(&school.pool, idle.id, testing::date(2025, 3, 10)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(ref what) if what == "Assigned subjects"));
    }
}
