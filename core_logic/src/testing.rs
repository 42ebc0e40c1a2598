//! Фикстуры для тестов: небольшая школа в базе в памяти.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::auth::hash_password;
use crate::db::{self, assignments, catalog, evaluations, people};
use crate::models::{
    CreateCourseRequest, CreateEnrollmentRequest, CreateEvaluationRequest, CreateParentRequest,
    CreateSchoolYearRequest, CreateStudentRequest, CreateSubjectRequest, CreateTeacherRequest,
    CreateTermRequest, CreateWeightRequest, Evaluation,
};

pub const PASSWORD: &str = "password123";
pub const ADMIN_EMAIL: &str = "admin@admin.edu";
pub const TEACHER_EMAIL: &str = "carlos@docente.edu";
pub const STUDENT_EMAIL: &str = "ana.rojas@mail.com";
pub const SECOND_STUDENT_EMAIL: &str = "luis@estudiante.edu.bo";
pub const PARENT_EMAIL: &str = "maria@madre.com";
pub const BCRYPT_TEST_COST: u32 = 4;

pub struct School {
    pub pool: SqlitePool,
    pub admin_id: i64,
    pub teacher_id: i64,
    pub student_id: i64,
    pub second_student_id: i64,
    pub parent_id: i64,
    pub school_year_id: i64,
    pub term_ids: [i64; 3],
    pub subject_id: i64,
    pub course_id: i64,
    pub exam_type_id: i64,
    pub homework_type_id: i64,
    pub participation_type_id: i64,
    pub attendance_type_id: i64,
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Школа 2025 года: администратор, преподаватель математики, курс "1A" с двумя
/// студентами, родитель первого студента, три периода и веса 50/30/20.
pub async fn school() -> School {
    let pool = db::memory_pool().await.expect("memory pool");
    let hash = hash_password(PASSWORD, BCRYPT_TEST_COST).expect("hash");

    let staff = |first: &str, email: &str, is_teacher: bool| CreateTeacherRequest {
        first_name: first.to_string(),
        last_name: "Mendoza".to_string(),
        phone: "70000000".to_string(),
        email: email.to_string(),
        gender: "M".to_string(),
        password: PASSWORD.to_string(),
        is_teacher,
    };
    let admin = people::create_teacher(&pool, &staff("Admin", ADMIN_EMAIL, false), &hash)
        .await
        .expect("admin");
    let teacher = people::create_teacher(&pool, &staff("Carlos", TEACHER_EMAIL, true), &hash)
        .await
        .expect("teacher");

    let student_req = |first: &str, email: &str, gender: &str| CreateStudentRequest {
        first_name: first.to_string(),
        last_name: "Rojas".to_string(),
        birth_date: date(2010, 6, 15),
        gender: gender.to_string(),
        image_url: None,
        guardian_name: Some("Maria Rojas".to_string()),
        guardian_phone: Some("71111111".to_string()),
        home_address: None,
        email: Some(email.to_string()),
        password: None,
    };
    let student = people::create_student(&pool, &student_req("Ana", STUDENT_EMAIL, "F"), Some(hash.clone()))
        .await
        .expect("student");
    let second = people::create_student(&pool, &student_req("Luis", SECOND_STUDENT_EMAIL, "M"), None)
        .await
        .expect("second student");

    let parent = people::create_parent(
        &pool,
        &CreateParentRequest {
            first_name: "Maria".to_string(),
            last_name: "Rojas".to_string(),
            phone: "71111111".to_string(),
            email: PARENT_EMAIL.to_string(),
            gender: "F".to_string(),
            password: PASSWORD.to_string(),
        },
        &hash,
    )
    .await
    .expect("parent");
    people::link_parent_student(&pool, parent.id, student.id).await.expect("link");

    let year = catalog::create_school_year(
        &pool,
        &CreateSchoolYearRequest { year: "2025".to_string(), description: "School year 2025".to_string() },
    )
    .await
    .expect("school year");

    let mut term_ids = [0; 3];
    let ranges = [
        ("First Term", date(2025, 2, 1), date(2025, 4, 30)),
        ("Second Term", date(2025, 5, 1), date(2025, 8, 10)),
        ("Third Term", date(2025, 8, 20), date(2025, 11, 30)),
    ];
    for (slot, (name, start, end)) in term_ids.iter_mut().zip(ranges) {
        let term = catalog::create_term(
            &pool,
            &CreateTermRequest { name: name.to_string(), start_date: start, end_date: end, school_year_id: year.id },
        )
        .await
        .expect("term");
        *slot = term.id;
    }

    let subject = catalog::create_subject(
        &pool,
        &CreateSubjectRequest { name: "Mathematics".to_string(), description: "Algebra and geometry".to_string() },
    )
    .await
    .expect("subject");
    let course = catalog::create_course(
        &pool,
        &CreateCourseRequest {
            name: "1A".to_string(),
            level: "Secondary".to_string(),
            section: "A".to_string(),
            shift: "Morning".to_string(),
        },
    )
    .await
    .expect("course");
    assignments::create_course_subject(&pool, course.id, subject.id).await.expect("course subject");
    assignments::create_teacher_subject(&pool, teacher.id, subject.id).await.expect("teacher subject");

    let mut type_ids = Vec::new();
    for name in ["Exam", "Homework", "Participation", "Attendance"] {
        type_ids.push(catalog::create_evaluation_type(&pool, name).await.expect("type").id);
    }

    for s in [student.id, second.id] {
        assignments::create_enrollment(
            &pool,
            &CreateEnrollmentRequest {
                description: "Regular enrollment".to_string(),
                date: date(2025, 1, 20),
                student_id: s,
                course_id: course.id,
                school_year_id: year.id,
            },
        )
        .await
        .expect("enrollment");
    }

    for (type_id, percentage) in [(type_ids[0], 50.0), (type_ids[1], 30.0), (type_ids[2], 20.0)] {
        assignments::create_weight(
            &pool,
            &CreateWeightRequest {
                percentage,
                teacher_id: teacher.id,
                subject_id: subject.id,
                school_year_id: year.id,
                evaluation_type_id: type_id,
            },
        )
        .await
        .expect("weight");
    }

    School {
        pool,
        admin_id: admin.id,
        teacher_id: teacher.id,
        student_id: student.id,
        second_student_id: second.id,
        parent_id: parent.id,
        school_year_id: year.id,
        term_ids,
        subject_id: subject.id,
        course_id: course.id,
        exam_type_id: type_ids[0],
        homework_type_id: type_ids[1],
        participation_type_id: type_ids[2],
        attendance_type_id: type_ids[3],
    }
}

impl School {
    /// Оценка студента по математике в первом периоде.
    pub async fn evaluation(&self, student_id: i64, type_id: i64, score: f64) -> Evaluation {
        evaluations::create_evaluation(
            &self.pool,
            &CreateEvaluationRequest {
                date: date(2025, 3, 3),
                description: "fixture".to_string(),
                score,
                student_id,
                subject_id: self.subject_id,
                evaluation_type_id: type_id,
                term_id: self.term_ids[0],
            },
        )
        .await
        .expect("evaluation")
    }
}
