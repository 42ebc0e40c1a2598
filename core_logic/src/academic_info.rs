//! Учебные сведения студента за учебный год: курс, предметы и их преподаватели.
//!
//! Без явного учебного года берётся последний созданный.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::db::{assignments, catalog, people};
use crate::error::{CoreError, CoreResult};
use crate::models::{Course, Enrollment, SchoolYear, Student, Subject, Teacher};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeacherContact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl From<Teacher> for TeacherContact {
    fn from(t: Teacher) -> Self {
        Self { id: t.id, first_name: t.first_name, last_name: t.last_name, email: t.email, phone: t.phone }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectWithTeacher {
    pub subject: Subject,
    /// Первый назначенный преподаватель
    pub teacher: Option<TeacherContact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherWithSubjects {
    pub teacher: TeacherContact,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcademicInfo {
    pub student: Student,
    pub school_year: SchoolYear,
    pub enrollment: Enrollment,
    pub course: Course,
    pub subjects: Vec<SubjectWithTeacher>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcademicSummary {
    pub student_id: i64,
    pub school_year: SchoolYear,
    pub course: Course,
    pub total_subjects: usize,
    pub subjects_with_teacher: usize,
    pub subjects_without_teacher: usize,
    pub total_teachers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentStatus {
    pub enrolled: bool,
    pub school_year: Option<SchoolYear>,
    pub course: Option<Course>,
}

async fn resolve_school_year(pool: &SqlitePool, school_year_id: Option<i64>) -> CoreResult<Option<SchoolYear>> {
    Ok(match school_year_id {
        Some(id) => Some(catalog::get_school_year(pool, id).await?.ok_or_else(|| CoreError::not_found("School year"))?),
        None => catalog::latest_school_year(pool).await?,
    })
}

struct Placement {
    school_year: SchoolYear,
    enrollment: Enrollment,
    course: Course,
}

async fn placement(pool: &SqlitePool, student_id: i64, school_year_id: Option<i64>) -> CoreResult<Placement> {
    let school_year = resolve_school_year(pool, school_year_id)
        .await?
        .ok_or_else(|| CoreError::not_found("School year"))?;
    let enrollment = assignments::enrollment_for_year(pool, student_id, school_year.id)
        .await?
        .ok_or_else(|| CoreError::not_found("Enrollment in the school year"))?;
    let course = catalog::get_course(pool, enrollment.course_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Course"))?;
    Ok(Placement { school_year, enrollment, course })
}

async fn with_teachers(pool: &SqlitePool, subjects: Vec<Subject>) -> CoreResult<Vec<SubjectWithTeacher>> {
    let mut out = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let teacher = assignments::teachers_of_subject(pool, subject.id).await?.into_iter().next();
        out.push(SubjectWithTeacher { subject, teacher: teacher.map(TeacherContact::from) });
    }
    Ok(out)
}

pub async fn academic_info(pool: &SqlitePool, student_id: i64, school_year_id: Option<i64>) -> CoreResult<AcademicInfo> {
    let student = people::get_student(pool, student_id).await?.ok_or_else(|| CoreError::not_found("Student"))?;
    let Placement { school_year, enrollment, course } = placement(pool, student_id, school_year_id).await?;
    let subjects = with_teachers(pool, assignments::subjects_of_course(pool, course.id).await?).await?;
    Ok(AcademicInfo { student, school_year, enrollment, course, subjects })
}

pub async fn student_course(pool: &SqlitePool, student_id: i64, school_year_id: Option<i64>) -> CoreResult<Course> {
    Ok(placement(pool, student_id, school_year_id).await?.course)
}

pub async fn student_subjects(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: Option<i64>,
) -> CoreResult<Vec<SubjectWithTeacher>> {
    let course = placement(pool, student_id, school_year_id).await?.course;
    with_teachers(pool, assignments::subjects_of_course(pool, course.id).await?).await
}

/// Все преподаватели предметов курса, с предметами, которые они ведут в этом курсе.
pub async fn student_teachers(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: Option<i64>,
) -> CoreResult<Vec<TeacherWithSubjects>> {
    let course = placement(pool, student_id, school_year_id).await?.course;
    let mut by_teacher: BTreeMap<i64, TeacherWithSubjects> = BTreeMap::new();
    for subject in assignments::subjects_of_course(pool, course.id).await? {
        for teacher in assignments::teachers_of_subject(pool, subject.id).await? {
            by_teacher
                .entry(teacher.id)
                .or_insert_with(|| TeacherWithSubjects { teacher: teacher.into(), subjects: Vec::new() })
                .subjects
                .push(subject.clone());
        }
    }
    let mut teachers: Vec<_> = by_teacher.into_values().collect();
    teachers.sort_by(|a, b| {
        (&a.teacher.last_name, &a.teacher.first_name).cmp(&(&b.teacher.last_name, &b.teacher.first_name))
    });
    Ok(teachers)
}

pub async fn academic_summary(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: Option<i64>,
) -> CoreResult<AcademicSummary> {
    let Placement { school_year, course, .. } = placement(pool, student_id, school_year_id).await?;
    let subjects = with_teachers(pool, assignments::subjects_of_course(pool, course.id).await?).await?;
    let subjects_with_teacher = subjects.iter().filter(|s| s.teacher.is_some()).count();
    let teachers = student_teachers(pool, student_id, Some(school_year.id)).await?;
    Ok(AcademicSummary {
        student_id,
        total_subjects: subjects.len(),
        subjects_with_teacher,
        subjects_without_teacher: subjects.len() - subjects_with_teacher,
        total_teachers: teachers.len(),
        school_year,
        course,
    })
}

/// Предмет из курса студента и его преподаватель. Предмет вне курса - NotFound.
pub async fn subject_teacher(
    pool: &SqlitePool,
    student_id: i64,
    subject_id: i64,
    school_year_id: Option<i64>,
) -> CoreResult<SubjectWithTeacher> {
    let course = placement(pool, student_id, school_year_id).await?.course;
    let subject = assignments::subjects_of_course(pool, course.id)
        .await?
        .into_iter()
        .find(|s| s.id == subject_id)
        .ok_or_else(|| CoreError::not_found("Subject in the student's course"))?;
    let mut found = with_teachers(pool, vec![subject]).await?;
    found.pop().ok_or_else(|| CoreError::not_found("Subject in the student's course"))
}

pub async fn enrollment_status(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: Option<i64>,
) -> CoreResult<EnrollmentStatus> {
    let Some(school_year) = resolve_school_year(pool, school_year_id).await? else {
        return Ok(EnrollmentStatus { enrolled: false, school_year: None, course: None });
    };
    let course = match assignments::enrollment_for_year(pool, student_id, school_year.id).await? {
        Some(enrollment) => catalog::get_course(pool, enrollment.course_id).await?,
        None => None,
    };
    Ok(EnrollmentStatus { enrolled: course.is_some(), school_year: Some(school_year), course })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateCourseRequest, CreateSchoolYearRequest, CreateSubjectRequest};
    use crate::testing;

    #[tokio::test]
    async fn info_lists_course_subjects_with_teacher() {
        let school = testing::school().await;
        let physics = catalog::create_subject(
            &school.pool,
            &CreateSubjectRequest { name: "Physics".to_string(), description: "Mechanics".to_string() },
        )
        .await
        .unwrap();
        assignments::create_course_subject(&school.pool, school.course_id, physics.id).await.unwrap();

        let info = academic_info(&school.pool, school.student_id, None).await.unwrap();
        assert_eq!(info.school_year.id, school.school_year_id);
        assert_eq!(info.course.name, "1A");
        let names: Vec<_> = info.subjects.iter().map(|s| s.subject.name.as_str()).collect();
        assert_eq!(names, vec!["Mathematics", "Physics"]);
        assert_eq!(info.subjects[0].teacher.as_ref().map(|t| t.id), Some(school.teacher_id));
        assert!(info.subjects[1].teacher.is_none());

        let summary = academic_summary(&school.pool, school.student_id, None).await.unwrap();
        assert_eq!(summary.total_subjects, 2);
        assert_eq!(summary.subjects_with_teacher, 1);
        assert_eq!(summary.subjects_without_teacher, 1);
        assert_eq!(summary.total_teachers, 1);

        let teachers = student_teachers(&school.pool, school.student_id, None).await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].subjects.len(), 1);

        let bare = subject_teacher(&school.pool, school.student_id, physics.id, None).await.unwrap();
        assert!(bare.teacher.is_none());
    }

    #[tokio::test]
    async fn subject_outside_course_is_not_found() {
        let school = testing::school().await;
        let art = catalog::create_subject(
            &school.pool,
            &CreateSubjectRequest { name: "Art".to_string(), description: "Drawing".to_string() },
        )
        .await
        .unwrap();
        let other = catalog::create_course(
            &school.pool,
            &CreateCourseRequest {
                name: "2B".to_string(),
                level: "Secondary".to_string(),
                section: "B".to_string(),
                shift: "Afternoon".to_string(),
            },
        )
        .await
        .unwrap();
        assignments::create_course_subject(&school.pool, other.id, art.id).await.unwrap();

        let err = subject_teacher(&school.pool, school.student_id, art.id, None).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        let found = subject_teacher(&school.pool, school.student_id, school.subject_id, None).await.unwrap();
        assert_eq!(found.teacher.map(|t| t.email), Some(testing::TEACHER_EMAIL.to_string()));
    }

    #[tokio::test]
    async fn newest_year_without_enrollment() {
        let school = testing::school().await;
        let next = catalog::create_school_year(
            &school.pool,
            &CreateSchoolYearRequest { year: "2026".to_string(), description: "School year 2026".to_string() },
        )
        .await
        .unwrap();

        let status = enrollment_status(&school.pool, school.student_id, None).await.unwrap();
        assert!(!status.enrolled);
        assert_eq!(status.school_year.map(|y| y.id), Some(next.id));
        assert!(matches!(student_course(&school.pool, school.student_id, None).await, Err(CoreError::NotFound(_))));

        let earlier = enrollment_status(&school.pool, school.student_id, Some(school.school_year_id)).await.unwrap();
        assert!(earlier.enrolled);
        assert_eq!(earlier.course.map(|c| c.id), Some(school.course_id));

        assert!(matches!(
            enrollment_status(&school.pool, school.student_id, Some(9999)).await,
            Err(CoreError::NotFound(_))
        ));
    }
}
