use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;

use crate::grading::round2;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AdminCounters {
    pub students: i64,
    pub courses: i64,
    pub admins: i64,
    pub teachers: i64,
    pub subjects: i64,
    pub school_years: i64,
    pub terms: i64,
    pub evaluation_types: i64,
    pub evaluations: i64,
    pub enrollments: i64,
    pub final_grades: i64,
}

pub async fn admin_counters(pool: &SqlitePool) -> Result<AdminCounters, sqlx::Error> {
    sqlx::query_as::<_, AdminCounters>(
        "SELECT
            (SELECT COUNT(*) FROM students) AS students,
            (SELECT COUNT(*) FROM courses) AS courses,
            (SELECT COUNT(*) FROM teachers WHERE is_teacher = 0) AS admins,
            (SELECT COUNT(*) FROM teachers WHERE is_teacher = 1) AS teachers,
            (SELECT COUNT(*) FROM subjects) AS subjects,
            (SELECT COUNT(*) FROM school_years) AS school_years,
            (SELECT COUNT(*) FROM terms) AS terms,
            (SELECT COUNT(*) FROM evaluation_types) AS evaluation_types,
            (SELECT COUNT(*) FROM evaluations) AS evaluations,
            (SELECT COUNT(*) FROM enrollments) AS enrollments,
            (SELECT COUNT(*) FROM final_grades) AS final_grades",
    )
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TeacherCounters {
    pub subjects: i64,
    pub courses: i64,
    pub students: i64,
    pub enrollments: i64,
    pub evaluations: i64,
    pub final_grades: i64,
    pub terms: i64,
}

/// Счётчики преподавателя в рамках учебного года.
pub async fn teacher_counters(
    pool: &SqlitePool,
    teacher_id: i64,
    school_year_id: i64,
) -> Result<TeacherCounters, sqlx::Error> {
    sqlx::query_as::<_, TeacherCounters>(
        "WITH my_subjects AS (SELECT subject_id FROM teacher_subjects WHERE teacher_id = ?1),
              my_courses AS (SELECT DISTINCT course_id FROM course_subjects WHERE subject_id IN (SELECT subject_id FROM my_subjects)),
              my_enrollments AS (SELECT * FROM enrollments WHERE school_year_id = ?2 AND course_id IN (SELECT course_id FROM my_courses)),
              year_terms AS (SELECT id FROM terms WHERE school_year_id = ?2)
         SELECT
            (SELECT COUNT(*) FROM my_subjects) AS subjects,
            (SELECT COUNT(*) FROM my_courses) AS courses,
            (SELECT COUNT(DISTINCT student_id) FROM my_enrollments) AS students,
            (SELECT COUNT(*) FROM my_enrollments) AS enrollments,
            (SELECT COUNT(*) FROM evaluations
                WHERE subject_id IN (SELECT subject_id FROM my_subjects)
                  AND term_id IN (SELECT id FROM year_terms)) AS evaluations,
            (SELECT COUNT(*) FROM final_grades
                WHERE subject_id IN (SELECT subject_id FROM my_subjects)
                  AND term_id IN (SELECT id FROM year_terms)) AS final_grades,
            (SELECT COUNT(*) FROM year_terms) AS terms",
    )
    .bind(teacher_id)
    .bind(school_year_id)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TermAverages {
    pub term_id: i64,
    pub term_name: String,
    pub grade_average: Option<f64>,
    pub attendance_average: Option<f64>,
    pub participation_average: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectSummary {
    pub course_id: i64,
    pub subject_id: i64,
    pub school_year_id: i64,
    pub terms: Vec<TermAverages>,
    pub overall_grade_average: Option<f64>,
    pub overall_attendance_average: Option<f64>,
    pub overall_participation_average: Option<f64>,
}

/// Средние по периодам для предмета в курсе: итоговые оценки, посещаемость, участие.
pub async fn subject_summary(
    pool: &SqlitePool,
    course_id: i64,
    subject_id: i64,
    school_year_id: i64,
) -> Result<SubjectSummary, sqlx::Error> {
    let rows: Vec<(i64, String, Option<f64>, Option<f64>, Option<f64>)> = sqlx::query_as(
        "WITH course_students AS (
            SELECT student_id FROM enrollments WHERE course_id = ?1 AND school_year_id = ?3)
         SELECT t.id, t.name,
            (SELECT AVG(fg.final_score) FROM final_grades fg
                WHERE fg.term_id = t.id AND fg.subject_id = ?2
                  AND fg.student_id IN (SELECT student_id FROM course_students)),
            (SELECT AVG(e.score) FROM evaluations e JOIN evaluation_types et ON et.id = e.evaluation_type_id
                WHERE e.term_id = t.id AND e.subject_id = ?2 AND LOWER(et.name) = 'attendance'
                  AND e.student_id IN (SELECT student_id FROM course_students)),
            (SELECT AVG(e.score) FROM evaluations e JOIN evaluation_types et ON et.id = e.evaluation_type_id
                WHERE e.term_id = t.id AND e.subject_id = ?2 AND LOWER(et.name) = 'participation'
                  AND e.student_id IN (SELECT student_id FROM course_students))
         FROM terms t WHERE t.school_year_id = ?3
         ORDER BY t.start_date",
    )
    .bind(course_id)
    .bind(subject_id)
    .bind(school_year_id)
    .fetch_all(pool)
    .await?;

    let terms: Vec<TermAverages> = rows
        .into_iter()
        .map(|(term_id, term_name, grade, attendance, participation)| TermAverages {
            term_id,
            term_name,
            grade_average: grade.map(round2),
            attendance_average: attendance.map(round2),
            participation_average: participation.map(round2),
        })
        .collect();

    Ok(SubjectSummary {
        course_id,
        subject_id,
        school_year_id,
        overall_grade_average: mean(terms.iter().filter_map(|t| t.grade_average)),
        overall_attendance_average: mean(terms.iter().filter_map(|t| t.attendance_average)),
        overall_participation_average: mean(terms.iter().filter_map(|t| t.participation_average)),
        terms,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| round2(sum / count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::grades::upsert_final_grade;
    use crate::testing;

    #[tokio::test]
    async fn counters_follow_recorded_work() {
        let school = testing::school().await;
        let fresh = admin_counters(&school.pool).await.unwrap();
        assert_eq!(
            fresh,
            AdminCounters {
                students: 2,
                courses: 1,
                admins: 1,
                teachers: 1,
                subjects: 1,
                school_years: 1,
                terms: 3,
                evaluation_types: 4,
                evaluations: 0,
                enrollments: 2,
                final_grades: 0,
            }
        );

        school.evaluation(school.student_id, school.exam_type_id, 80.0).await;
        school.evaluation(school.second_student_id, school.exam_type_id, 60.0).await;
        upsert_final_grade(&school.pool, school.student_id, school.subject_id, school.term_ids[0], 61.0)
            .await
            .unwrap();

        let after = admin_counters(&school.pool).await.unwrap();
        assert_eq!((after.evaluations, after.final_grades), (2, 1));

        let teacher = teacher_counters(&school.pool, school.teacher_id, school.school_year_id).await.unwrap();
        assert_eq!(
            teacher,
            TeacherCounters { subjects: 1, courses: 1, students: 2, enrollments: 2, evaluations: 2, final_grades: 1, terms: 3 }
        );

        // Администратор предметов не ведёт
        let admin = teacher_counters(&school.pool, school.admin_id, school.school_year_id).await.unwrap();
        assert_eq!((admin.subjects, admin.courses, admin.students), (0, 0, 0));
    }

    #[tokio::test]
    async fn subject_summary_averages_terms() {
        let school = testing::school().await;
        let [first, second, third] = school.term_ids;
        upsert_final_grade(&school.pool, school.student_id, school.subject_id, first, 61.0).await.unwrap();
        upsert_final_grade(&school.pool, school.second_student_id, school.subject_id, first, 70.0).await.unwrap();
        upsert_final_grade(&school.pool, school.student_id, school.subject_id, second, 80.0).await.unwrap();
        school.evaluation(school.student_id, school.attendance_type_id, 100.0).await;
        school.evaluation(school.second_student_id, school.attendance_type_id, 80.0).await;
        school.evaluation(school.student_id, school.participation_type_id, 70.0).await;

        let summary = subject_summary(&school.pool, school.course_id, school.subject_id, school.school_year_id)
            .await
            .unwrap();
        assert_eq!(summary.terms.len(), 3);
        assert_eq!(summary.terms.iter().map(|t| t.term_id).collect::<Vec<_>>(), vec![first, second, third]);

        let t1 = &summary.terms[0];
        assert_eq!(t1.grade_average, Some(65.5));
        assert_eq!(t1.attendance_average, Some(90.0));
        assert_eq!(t1.participation_average, Some(70.0));
        assert_eq!(summary.terms[1].grade_average, Some(80.0));
        assert_eq!(summary.terms[1].attendance_average, None);
        assert_eq!(summary.terms[2].grade_average, None);

        // Общие средние считаются только по периодам с данными
        assert_eq!(summary.overall_grade_average, Some(72.75));
        assert_eq!(summary.overall_attendance_average, Some(90.0));
        assert_eq!(summary.overall_participation_average, Some(70.0));
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean(std::iter::empty()), None);
        assert_eq!(mean([1.0, 2.0, 2.0].into_iter()), Some(1.67));
    }
}
