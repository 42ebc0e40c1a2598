//! Итоговая оценка: взвешенная сумма средних по типам оценок.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::db::{assignments, catalog, evaluations, grades, people};
use crate::error::{CoreError, CoreResult};
use crate::models::{EvaluationWeight, FinalGrade, FinalGradeDetail};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TypeContribution {
    pub evaluation_type_id: i64,
    pub average: f64,
    pub percentage: f64,
    pub contribution: f64,
}

/// Сумма average * percentage / 100 по типам, у которых есть и вес, и оценки.
pub fn weighted_final_score(averages: &[(i64, f64)], weights: &[EvaluationWeight]) -> (f64, Vec<TypeContribution>) {
    let mut total = 0.0;
    let mut breakdown = Vec::new();
    for weight in weights {
        let Some(&(_, average)) = averages.iter().find(|(type_id, _)| *type_id == weight.evaluation_type_id) else {
            continue;
        };
        let contribution = average * weight.percentage / 100.0;
        total += contribution;
        breakdown.push(TypeContribution {
            evaluation_type_id: weight.evaluation_type_id,
            average: round2(average),
            percentage: weight.percentage,
            contribution: round2(contribution),
        });
    }
    (round2(total), breakdown)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinalGradeResult {
    pub grade: FinalGrade,
    pub breakdown: Vec<TypeContribution>,
}

/// Пересчитывает и сохраняет итоговую оценку студента по предмету за период.
pub async fn compute_final_grade(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    term_id: i64,
    school_year_id: i64,
    teacher_id: i64,
) -> CoreResult<FinalGradeResult> {
    people::get_student(pool, student_id).await?.ok_or_else(|| CoreError::not_found("Student"))?;
    catalog::get_subject(pool, subject_id).await?.ok_or_else(|| CoreError::not_found("Subject"))?;
    catalog::get_term(pool, term_id).await?.ok_or_else(|| CoreError::not_found("Term"))?;

    let weights = assignments::list_weights(pool, Some(teacher_id), Some(subject_id), Some(school_year_id)).await?;
    if weights.is_empty() {
        warn!(
            "No evaluation weights for teacher={}, subject={}, school_year={}",
            teacher_id, subject_id, school_year_id
        );
    }
    let averages = evaluations::averages_by_type(pool, student_id, subject_id, term_id).await?;
    let (score, breakdown) = weighted_final_score(&averages, &weights);

    let grade = grades::upsert_final_grade(pool, student_id, subject_id, term_id, score).await?;
    info!(
        "Final grade computed: student={}, subject={}, term={}, score={}",
        student_id, subject_id, term_id, score
    );
    Ok(FinalGradeResult { grade, breakdown })
}

/// Все предметы всех курсов, в которые студент зачислен в учебном году.
pub async fn compute_all_for_student(
    pool: &SqlitePool,
    student_id: i64,
    term_id: i64,
    school_year_id: i64,
    teacher_id: Option<i64>,
) -> CoreResult<Vec<FinalGradeResult>> {
    let enrollments = assignments::list_enrollments(pool, Some(student_id), None, Some(school_year_id)).await?;
    if enrollments.is_empty() {
        return Err(CoreError::not_found("Enrollment for this school year"));
    }

    let mut results = Vec::new();
    let mut seen = Vec::new();
    for enrollment in enrollments {
        for subject in assignments::subjects_of_course(pool, enrollment.course_id).await? {
            if seen.contains(&subject.id) {
                continue;
            }
            seen.push(subject.id);

            let teacher = match teacher_id {
                Some(id) => Some(id),
                None => assignments::assigned_teacher(pool, subject.id).await?,
            };
            let Some(teacher) = teacher else {
                warn!("Subject {} has no assigned teacher, skipping", subject.id);
                continue;
            };
            results.push(compute_final_grade(pool, student_id, subject.id, term_id, school_year_id, teacher).await?);
        }
    }
    Ok(results)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TermGrades {
    pub term_id: i64,
    pub term_name: String,
    pub grades: Vec<FinalGradeResult>,
}

pub async fn compute_all_terms(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: i64,
    teacher_id: Option<i64>,
) -> CoreResult<Vec<TermGrades>> {
    let terms = catalog::list_terms(pool, Some(school_year_id), None).await?;
    if terms.is_empty() {
        return Err(CoreError::not_found("Terms for this school year"));
    }
    let mut out = Vec::with_capacity(terms.len());
    for term in terms {
        let grades = compute_all_for_student(pool, student_id, term.id, school_year_id, teacher_id).await?;
        out.push(TermGrades { term_id: term.id, term_name: term.name, grades });
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentGrades {
    pub student_id: i64,
    pub student_name: String,
    pub grades: Vec<FinalGradeDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseReport {
    pub course_id: i64,
    pub course_name: String,
    pub school_year_id: i64,
    pub school_year: String,
    pub students: Vec<StudentGrades>,
}

/// Итоговые оценки всех студентов курса за учебный год.
pub async fn course_report(pool: &SqlitePool, course_id: i64, school_year_id: i64) -> CoreResult<CourseReport> {
    let course = catalog::get_course(pool, course_id).await?.ok_or_else(|| CoreError::not_found("Course"))?;
    let year = catalog::get_school_year(pool, school_year_id)
        .await?
        .ok_or_else(|| CoreError::not_found("School year"))?;

    let enrollments = assignments::list_enrollments(pool, None, Some(course_id), Some(school_year_id)).await?;
    let mut students = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let grades = grades::student_grades_for_year(pool, enrollment.student_id, school_year_id).await?;
        students.push(StudentGrades {
            student_id: enrollment.student_id,
            student_name: enrollment.student_name,
            grades,
        });
    }
    Ok(CourseReport {
        course_id,
        course_name: course.name,
        school_year_id,
        school_year: year.year,
        students,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn weight(type_id: i64, percentage: f64) -> EvaluationWeight {
        EvaluationWeight {
            id: type_id,
            percentage,
            teacher_id: 1,
            subject_id: 1,
            school_year_id: 1,
            evaluation_type_id: type_id,
            created_at: crate::db::now(),
            updated_at: None,
        }
    }

    #[test]
    fn types_without_weight_or_evaluations_contribute_nothing() {
        let weights = [weight(1, 50.0), weight(2, 30.0), weight(3, 20.0)];
        // Тип 3 без оценок, тип 9 без веса
        let averages = [(1, 80.0), (2, 90.0), (9, 100.0)];
        let (score, breakdown) = weighted_final_score(&averages, &weights);
        assert_eq!(score, 67.0);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[1].contribution, 27.0);
    }

    #[test]
    fn score_is_rounded_to_two_decimals() {
        let (score, _) = weighted_final_score(&[(1, 66.666_666)], &[weight(1, 100.0)]);
        assert_eq!(score, 66.67);
        assert_eq!(weighted_final_score(&[], &[weight(1, 100.0)]).0, 0.0);
    }

    #[tokio::test]
    async fn compute_upserts_final_grade() {
        let school = testing::school().await;
        school.evaluation(school.student_id, school.exam_type_id, 70.0).await;
        school.evaluation(school.student_id, school.exam_type_id, 90.0).await;
        school.evaluation(school.student_id, school.homework_type_id, 60.0).await;

        let first = compute_final_grade(
            &school.pool,
            school.student_id,
            school.subject_id,
            school.term_ids[0],
            school.school_year_id,
            school.teacher_id,
        )
        .await
        .unwrap();
        // 80 * 0.5 + 60 * 0.3
        assert_eq!(first.grade.final_score, 58.0);

        school.evaluation(school.student_id, school.participation_type_id, 100.0).await;
        let second = compute_final_grade(
            &school.pool,
            school.student_id,
            school.subject_id,
            school.term_ids[0],
            school.school_year_id,
            school.teacher_id,
        )
        .await
        .unwrap();
        assert_eq!(second.grade.id, first.grade.id);
        assert_eq!(second.grade.final_score, 78.0);
        assert_eq!(second.breakdown.len(), 3);
    }

    #[tokio::test]
    async fn compute_all_requires_enrollment() {
        let school = testing::school().await;
        let results = compute_all_for_student(
            &school.pool,
            school.student_id,
            school.term_ids[0],
            school.school_year_id,
            None,
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 1);

        let err = compute_all_for_student(&school.pool, 999, school.term_ids[0], school.school_year_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let terms = compute_all_terms(&school.pool, school.student_id, school.school_year_id, None).await.unwrap();
        assert_eq!(terms.len(), 3);
    }

    #[tokio::test]
    async fn course_report_lists_enrolled_students() {
        let school = testing::school().await;
        school.evaluation(school.student_id, school.exam_type_id, 100.0).await;
        compute_all_for_student(&school.pool, school.student_id, school.term_ids[0], school.school_year_id, None)
            .await
            .unwrap();
        let report = course_report(&school.pool, school.course_id, school.school_year_id).await.unwrap();
        assert_eq!(report.students.len(), 2);
        let ana = report.students.iter().find(|s| s.student_id == school.student_id).unwrap();
        assert_eq!(ana.grades[0].final_score, 50.0);
        assert_eq!(ana.grades[0].subject_name, "Mathematics");
    }
}
