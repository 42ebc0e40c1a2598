//! Демонстрационные данные. Повторный запуск ничего не дублирует:
//! строки, уже найденные по уникальному ключу, остаются как есть.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::hash_password;
use crate::db::{assignments, catalog, people};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    CreateCourseRequest, CreateEnrollmentRequest, CreateParentRequest, CreateSchoolYearRequest,
    CreateStudentRequest, CreateSubjectRequest, CreateTeacherRequest, CreateTermRequest, CreateWeightRequest,
};

pub const ADMIN_EMAIL: &str = "admin@colegio.edu.bo";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const TEACHER_PASSWORD: &str = "docente123";
pub const STUDENT_PASSWORD: &str = "estudiante123";
pub const PARENT_PASSWORD: &str = "padre123";

// (имя, фамилия, e-mail, предметы)
const TEACHERS: [(&str, &str, &str, &[&str]); 3] = [
    ("Carlos", "Rodriguez", "carlos.rodriguez@colegio.edu.bo", &["Mathematics", "Natural Sciences"]),
    ("Maria", "Gonzalez", "maria.gonzalez@colegio.edu.bo", &["Language", "Social Studies"]),
    ("Luis", "Mamani", "luis.mamani@colegio.edu.bo", &["Physical Education"]),
];

// (имя, фамилия, пол, дата рождения, e-mail, курс)
const STUDENTS: [(&str, &str, &str, (i32, u32, u32), &str, &str); 5] = [
    ("Ana", "Perez", "F", (2010, 3, 12), "ana.perez@estudiante.edu.bo", "1A"),
    ("Carlos", "Gonzalez", "M", (2010, 7, 2), "carlos.gonzalez@estudiante.edu.bo", "1A"),
    ("Sofia", "Mamani", "F", (2009, 11, 25), "sofia.mamani@estudiante.edu.bo", "2A"),
    ("Diego", "Vargas", "M", (2009, 5, 9), "diego.vargas@estudiante.edu.bo", "2A"),
    ("Valeria", "Condori", "F", (2010, 1, 30), "valeria.condori@estudiante.edu.bo", "1B"),
];

const PARENTS: [(&str, &str, &str, &str); 5] = [
    ("Juan", "Perez", "M", "juan.perez@padre.com"),
    ("Maria", "Gonzalez", "F", "maria.gonzalez@madre.com"),
    ("Rosa", "Choque", "F", "rosa.choque@madre.com"),
    ("Roberto", "Vargas", "M", "roberto.vargas@padre.com"),
    ("Carmen", "Silva", "F", "carmen.silva@madre.com"),
];

const PARENT_LINKS: [(&str, &str); 7] = [
    ("juan.perez@padre.com", "ana.perez@estudiante.edu.bo"),
    ("maria.gonzalez@madre.com", "ana.perez@estudiante.edu.bo"),
    ("maria.gonzalez@madre.com", "carlos.gonzalez@estudiante.edu.bo"),
    ("rosa.choque@madre.com", "sofia.mamani@estudiante.edu.bo"),
    ("roberto.vargas@padre.com", "diego.vargas@estudiante.edu.bo"),
    ("carmen.silva@madre.com", "valeria.condori@estudiante.edu.bo"),
    ("maria.gonzalez@madre.com", "valeria.condori@estudiante.edu.bo"),
];

const SUBJECTS: [(&str, &str); 5] = [
    ("Mathematics", "Algebra, geometry and arithmetic"),
    ("Language", "Reading, writing and literature"),
    ("Natural Sciences", "Biology, physics and chemistry basics"),
    ("Social Studies", "History, geography and civics"),
    ("Physical Education", "Sports and health"),
];

const COURSES: [(&str, &str, &str, &str); 3] = [
    ("1A", "Secondary", "A", "Morning"),
    ("1B", "Secondary", "B", "Afternoon"),
    ("2A", "Secondary", "A", "Morning"),
];

pub const EVALUATION_TYPES: [&str; 10] = [
    "Exam",
    "Homework",
    "Presentation",
    "Participation",
    "Attendance",
    "Practice",
    "Project",
    "Group Work",
    "Essay",
    "Quiz",
];

const WEIGHTS: [(&str, f64); 5] = [
    ("Exam", 40.0),
    ("Homework", 20.0),
    ("Participation", 15.0),
    ("Attendance", 15.0),
    ("Project", 10.0),
];

const YEARS: [i32; 2] = [2024, 2025];

#[derive(Debug, Default, Clone, Serialize)]
pub struct SeedSummary {
    pub created: usize,
    pub existing: usize,
}

struct Seeder<'a> {
    pool: &'a SqlitePool,
    summary: SeedSummary,
}

fn ymd(y: i32, m: u32, d: u32) -> CoreResult<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| CoreError::Internal(format!("invalid date {y}-{m}-{d}")))
}

impl<'a> Seeder<'a> {
    async fn lookup(&self, sql: &str, keys: &[&str]) -> CoreResult<Option<i64>> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        for key in keys {
            query = query.bind(*key);
        }
        Ok(query.fetch_optional(self.pool).await?)
    }

    async fn lookup_ids(&self, sql: &str, ids: &[i64]) -> CoreResult<Option<i64>> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        for id in ids {
            query = query.bind(*id);
        }
        Ok(query.fetch_optional(self.pool).await?)
    }

    fn found(&mut self, id: i64) -> i64 {
        self.summary.existing += 1;
        id
    }

    fn made(&mut self, id: i64) -> i64 {
        self.summary.created += 1;
        id
    }

    async fn staff(&mut self, first: &str, last: &str, email: &str, is_teacher: bool, hash: &str) -> CoreResult<i64> {
        if let Some((id, _, _)) = people::teacher_credentials(self.pool, email).await? {
            return Ok(self.found(id));
        }
        let req = CreateTeacherRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: "70000000".to_string(),
            email: email.to_string(),
            gender: "M".to_string(),
            password: String::new(),
            is_teacher,
        };
        let teacher = people::create_teacher(self.pool, &req, hash).await?;
        info!("Seeded staff member {}", email);
        Ok(self.made(teacher.id))
    }

    async fn subject(&mut self, name: &str, description: &str) -> CoreResult<i64> {
        if let Some(id) = self.lookup("SELECT id FROM subjects WHERE name = ?", &[name]).await? {
            return Ok(self.found(id));
        }
        let req = CreateSubjectRequest { name: name.to_string(), description: description.to_string() };
        let id = catalog::create_subject(self.pool, &req).await?.id;
        Ok(self.made(id))
    }

    async fn course(&mut self, (name, level, section, shift): (&str, &str, &str, &str)) -> CoreResult<i64> {
        if let Some(id) = self.lookup("SELECT id FROM courses WHERE name = ?", &[name]).await? {
            return Ok(self.found(id));
        }
        let req = CreateCourseRequest {
            name: name.to_string(),
            level: level.to_string(),
            section: section.to_string(),
            shift: shift.to_string(),
        };
        let id = catalog::create_course(self.pool, &req).await?.id;
        Ok(self.made(id))
    }

    async fn evaluation_type(&mut self, name: &str) -> CoreResult<i64> {
        if let Some(t) = catalog::find_evaluation_type_by_name(self.pool, name).await? {
            return Ok(self.found(t.id));
        }
        let id = catalog::create_evaluation_type(self.pool, name).await?.id;
        Ok(self.made(id))
    }

    async fn school_year(&mut self, year: i32) -> CoreResult<i64> {
        let label = year.to_string();
        if let Some(y) = catalog::find_school_year_by_year(self.pool, &label).await? {
            return Ok(self.found(y.id));
        }
        let req = CreateSchoolYearRequest { year: label, description: format!("School year {year}") };
        let id = catalog::create_school_year(self.pool, &req).await?.id;
        Ok(self.made(id))
    }

    async fn terms(&mut self, year: i32, school_year_id: i64) -> CoreResult<()> {
        let ranges = [
            ("First Term", ymd(year, 2, 1)?, ymd(year, 4, 30)?),
            ("Second Term", ymd(year, 5, 1)?, ymd(year, 8, 10)?),
            ("Third Term", ymd(year, 8, 20)?, ymd(year, 11, 30)?),
        ];
        for (name, start_date, end_date) in ranges {
            let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM terms WHERE name = ? AND school_year_id = ?")
                .bind(name)
                .bind(school_year_id)
                .fetch_optional(self.pool)
                .await?;
            match existing {
                Some(id) => {
                    self.found(id);
                }
                None => {
                    let req = CreateTermRequest { name: name.to_string(), start_date, end_date, school_year_id };
                    let id = catalog::create_term(self.pool, &req).await?.id;
                    self.made(id);
                }
            }
        }
        Ok(())
    }
}

/// Заполняет базу демонстрационными данными; `bcrypt_cost` влияет только на новые пароли.
pub async fn run(pool: &SqlitePool, bcrypt_cost: u32) -> CoreResult<SeedSummary> {
    let mut s = Seeder { pool, summary: SeedSummary::default() };

    let admin_hash = hash_password(ADMIN_PASSWORD, bcrypt_cost)?;
    let teacher_hash = hash_password(TEACHER_PASSWORD, bcrypt_cost)?;
    let student_hash = hash_password(STUDENT_PASSWORD, bcrypt_cost)?;
    let parent_hash = hash_password(PARENT_PASSWORD, bcrypt_cost)?;

    s.staff("System", "Administrator", ADMIN_EMAIL, false, &admin_hash).await?;

    let mut subject_ids = Vec::new();
    for (name, description) in SUBJECTS {
        subject_ids.push((name, s.subject(name, description).await?));
    }
    let subject_id = |name: &str| {
        subject_ids
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| *id)
            .ok_or_else(|| CoreError::Internal(format!("unknown subject {name}")))
    };

    let mut course_ids = Vec::new();
    for course in COURSES {
        course_ids.push((course.0, s.course(course).await?));
    }

    let mut type_ids = Vec::new();
    for name in EVALUATION_TYPES {
        type_ids.push((name, s.evaluation_type(name).await?));
    }

    let mut year_ids = Vec::new();
    for year in YEARS {
        let id = s.school_year(year).await?;
        s.terms(year, id).await?;
        year_ids.push(id);
    }
    let current_year = *year_ids.last().ok_or_else(|| CoreError::Internal("no school years".to_string()))?;

    // Каждый курс изучает все предметы
    for (_, course_id) in &course_ids {
        for (_, subj) in &subject_ids {
            let existing = s
                .lookup_ids("SELECT id FROM course_subjects WHERE course_id = ? AND subject_id = ?", &[*course_id, *subj])
                .await?;
            match existing {
                Some(id) => s.found(id),
                None => {
                    let id = assignments::create_course_subject(pool, *course_id, *subj).await?.id;
                    s.made(id)
                }
            };
        }
    }

    for (first, last, email, subjects) in TEACHERS {
        let teacher_id = s.staff(first, last, email, true, &teacher_hash).await?;
        for name in subjects {
            let subj = subject_id(*name)?;
            let existing = s
                .lookup_ids("SELECT id FROM teacher_subjects WHERE teacher_id = ? AND subject_id = ?", &[teacher_id, subj])
                .await?;
            match existing {
                Some(id) => s.found(id),
                None => {
                    let id = assignments::create_teacher_subject(pool, teacher_id, subj).await?.id;
                    s.made(id)
                }
            };

            for &school_year_id in &year_ids {
                for (type_name, percentage) in WEIGHTS {
                    let Some(&(_, type_id)) = type_ids.iter().find(|(n, _)| *n == type_name) else {
                        continue;
                    };
                    let existing = s
                        .lookup_ids(
                            "SELECT id FROM evaluation_weights
                             WHERE teacher_id = ? AND subject_id = ? AND school_year_id = ? AND evaluation_type_id = ?",
                            &[teacher_id, subj, school_year_id, type_id],
                        )
                        .await?;
                    match existing {
                        Some(id) => s.found(id),
                        None => {
                            let req = CreateWeightRequest {
                                percentage,
                                teacher_id,
                                subject_id: subj,
                                school_year_id,
                                evaluation_type_id: type_id,
                            };
                            let id = assignments::create_weight(pool, &req).await?.id;
                            s.made(id)
                        }
                    };
                }
            }
        }
    }

    for (first, last, gender, (y, m, d), email, course) in STUDENTS {
        let student_id = match people::student_credentials(pool, email).await? {
            Some((id, _)) => s.found(id),
            None => {
                let req = CreateStudentRequest {
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    birth_date: ymd(y, m, d)?,
                    gender: gender.to_string(),
                    image_url: None,
                    guardian_name: None,
                    guardian_phone: None,
                    home_address: Some("La Paz".to_string()),
                    email: Some(email.to_string()),
                    password: None,
                };
                let id = people::create_student(pool, &req, Some(student_hash.clone())).await?.id;
                s.made(id)
            }
        };

        let Some(&(_, course_id)) = course_ids.iter().find(|(n, _)| *n == course) else {
            continue;
        };
        match assignments::enrollment_for_year(pool, student_id, current_year).await? {
            Some(enrollment) => s.found(enrollment.id),
            None => {
                let req = CreateEnrollmentRequest {
                    description: "Regular enrollment".to_string(),
                    date: ymd(YEARS[1], 1, 20)?,
                    student_id,
                    course_id,
                    school_year_id: current_year,
                };
                let id = assignments::create_enrollment(pool, &req).await?.id;
                s.made(id)
            }
        };
    }

    for (first, last, gender, email) in PARENTS {
        if let Some((id, _)) = people::parent_credentials(pool, email).await? {
            s.found(id);
            continue;
        }
        let req = CreateParentRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: "71000000".to_string(),
            email: email.to_string(),
            gender: gender.to_string(),
            password: String::new(),
        };
        let id = people::create_parent(pool, &req, &parent_hash).await?.id;
        s.made(id);
    }

    for (parent_email, student_email) in PARENT_LINKS {
        let parent = people::parent_credentials(pool, parent_email).await?;
        let student = people::student_credentials(pool, student_email).await?;
        if let (Some((parent_id, _)), Some((student_id, _))) = (parent, student) {
            if people::link_parent_student(pool, parent_id, student_id).await? {
                s.summary.created += 1;
            } else {
                s.summary.existing += 1;
            }
        }
    }

    info!("Seed finished: {} created, {} already present", s.summary.created, s.summary.existing);
    Ok(s.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{authenticate, UserType};
    use crate::db;

    #[tokio::test]
    async fn seeding_twice_creates_nothing_new() {
        let pool = db::memory_pool().await.unwrap();
        let first = run(&pool, 4).await.unwrap();
        assert!(first.created > 0);
        assert_eq!(first.existing, 0);

        let second = run(&pool, 4).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.existing, first.created);

        let attendance = catalog::find_evaluation_type_by_name(&pool, "attendance").await.unwrap();
        assert!(attendance.is_some());
        assert_eq!(catalog::list_terms(&pool, None, None).await.unwrap().len(), 6);

        let (user_type, _) = authenticate(&pool, ADMIN_EMAIL, ADMIN_PASSWORD, None).await.unwrap();
        assert_eq!(user_type, UserType::Admin);
    }
}
