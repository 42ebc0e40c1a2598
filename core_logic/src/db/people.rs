use sqlx::SqlitePool;

use super::now;
use crate::models::{
    CreateParentRequest, CreateStudentRequest, CreateTeacherRequest, Parent, Student, Teacher,
    UpdateParentRequest, UpdateStudentRequest, UpdateTeacherRequest,
};

const STUDENT_COLUMNS: &str = "id, first_name, last_name, birth_date, gender, image_url, guardian_name, \
     guardian_phone, home_address, email, created_at, updated_at";
const TEACHER_COLUMNS: &str =
    "id, first_name, last_name, phone, email, gender, is_teacher, created_at, updated_at";
const PARENT_COLUMNS: &str = "id, first_name, last_name, phone, email, gender, created_at, updated_at";

// ---------- Студенты ----------

pub async fn create_student(
    pool: &SqlitePool,
    req: &CreateStudentRequest,
    password_hash: Option<String>,
) -> Result<Student, sqlx::Error> {
    let sql = format!(
        "INSERT INTO students (first_name, last_name, birth_date, gender, image_url, guardian_name, \
         guardian_phone, home_address, email, password_hash, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {STUDENT_COLUMNS}"
    );
    sqlx::query_as::<_, Student>(&sql)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.birth_date)
        .bind(&req.gender)
        .bind(&req.image_url)
        .bind(&req.guardian_name)
        .bind(&req.guardian_phone)
        .bind(&req.home_address)
        .bind(&req.email)
        .bind(password_hash)
        .bind(now())
        .fetch_one(pool)
        .await
}

pub async fn get_student(pool: &SqlitePool, id: i64) -> Result<Option<Student>, sqlx::Error> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    sqlx::query_as::<_, Student>(&sql).bind(id).fetch_optional(pool).await
}

pub async fn list_students(pool: &SqlitePool, skip: i64, limit: i64) -> Result<Vec<Student>, sqlx::Error> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY last_name, first_name LIMIT ? OFFSET ?");
    sqlx::query_as::<_, Student>(&sql).bind(limit).bind(skip).fetch_all(pool).await
}

pub async fn update_student(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateStudentRequest,
    password_hash: Option<String>,
) -> Result<Option<Student>, sqlx::Error> {
    let sql = format!(
        "UPDATE students SET \
            first_name = COALESCE(?, first_name), last_name = COALESCE(?, last_name), \
            birth_date = COALESCE(?, birth_date), gender = COALESCE(?, gender), \
            image_url = COALESCE(?, image_url), guardian_name = COALESCE(?, guardian_name), \
            guardian_phone = COALESCE(?, guardian_phone), home_address = COALESCE(?, home_address), \
            email = COALESCE(?, email), password_hash = COALESCE(?, password_hash), updated_at = ? \
         WHERE id = ? RETURNING {STUDENT_COLUMNS}"
    );
    sqlx::query_as::<_, Student>(&sql)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.birth_date)
        .bind(&req.gender)
        .bind(&req.image_url)
        .bind(&req.guardian_name)
        .bind(&req.guardian_phone)
        .bind(&req.home_address)
        .bind(&req.email)
        .bind(password_hash)
        .bind(now())
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn set_student_image(pool: &SqlitePool, id: i64, url: &str) -> Result<Option<Student>, sqlx::Error> {
    let sql = format!("UPDATE students SET image_url = ?, updated_at = ? WHERE id = ? RETURNING {STUDENT_COLUMNS}");
    sqlx::query_as::<_, Student>(&sql)
        .bind(url)
        .bind(now())
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_student(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM students WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// (id, хэш пароля) студента по e-mail.
pub async fn student_credentials(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<(i64, Option<String>)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, Option<String>)>("SELECT id, password_hash FROM students WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

// ---------- Преподаватели и администраторы ----------

pub async fn create_teacher(
    pool: &SqlitePool,
    req: &CreateTeacherRequest,
    password_hash: &str,
) -> Result<Teacher, sqlx::Error> {
    let sql = format!(
        "INSERT INTO teachers (first_name, last_name, phone, email, gender, password_hash, is_teacher, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {TEACHER_COLUMNS}"
    );
    sqlx::query_as::<_, Teacher>(&sql)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.gender)
        .bind(password_hash)
        .bind(req.is_teacher)
        .bind(now())
        .fetch_one(pool)
        .await
}

pub async fn get_teacher(pool: &SqlitePool, id: i64) -> Result<Option<Teacher>, sqlx::Error> {
    let sql = format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?");
    sqlx::query_as::<_, Teacher>(&sql).bind(id).fetch_optional(pool).await
}

/// `is_teacher`: Some(true) только преподаватели, Some(false) только администраторы.
pub async fn list_teachers(
    pool: &SqlitePool,
    is_teacher: Option<bool>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Teacher>, sqlx::Error> {
    let sql = format!(
        "SELECT {TEACHER_COLUMNS} FROM teachers WHERE (? IS NULL OR is_teacher = ?) \
         ORDER BY last_name, first_name LIMIT ? OFFSET ?"
    );
    sqlx::query_as::<_, Teacher>(&sql)
        .bind(is_teacher)
        .bind(is_teacher)
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await
}

pub async fn update_teacher(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateTeacherRequest,
    password_hash: Option<String>,
) -> Result<Option<Teacher>, sqlx::Error> {
    let sql = format!(
        "UPDATE teachers SET \
            first_name = COALESCE(?, first_name), last_name = COALESCE(?, last_name), \
            phone = COALESCE(?, phone), email = COALESCE(?, email), gender = COALESCE(?, gender), \
            password_hash = COALESCE(?, password_hash), is_teacher = COALESCE(?, is_teacher), updated_at = ? \
         WHERE id = ? RETURNING {TEACHER_COLUMNS}"
    );
    sqlx::query_as::<_, Teacher>(&sql)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.gender)
        .bind(password_hash)
        .bind(req.is_teacher)
        .bind(now())
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_teacher(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM teachers WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// (id, хэш, is_teacher) по e-mail.
pub async fn teacher_credentials(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<(i64, String, bool)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String, bool)>(
        "SELECT id, password_hash, is_teacher FROM teachers WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Курсы, в которых преподаются предметы преподавателя.
pub async fn teacher_courses(pool: &SqlitePool, teacher_id: i64) -> Result<Vec<crate::models::Course>, sqlx::Error> {
    sqlx::query_as::<_, crate::models::Course>(
        "SELECT DISTINCT c.id, c.name, c.level, c.section, c.shift, c.created_at, c.updated_at
         FROM courses c
         JOIN course_subjects cs ON cs.course_id = c.id
         JOIN teacher_subjects ts ON ts.subject_id = cs.subject_id
         WHERE ts.teacher_id = ?
         ORDER BY c.name",
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}

/// Студенты, зачисленные в курсы преподавателя.
pub async fn teacher_students(pool: &SqlitePool, teacher_id: i64) -> Result<Vec<Student>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM students s WHERE s.id IN (
            SELECT e.student_id FROM enrollments e
            JOIN course_subjects cs ON cs.course_id = e.course_id
            JOIN teacher_subjects ts ON ts.subject_id = cs.subject_id
            WHERE ts.teacher_id = ?)
         ORDER BY s.last_name, s.first_name",
        prefixed(STUDENT_COLUMNS, "s")
    );
    sqlx::query_as::<_, Student>(&sql).bind(teacher_id).fetch_all(pool).await
}

// ---------- Родители ----------

pub async fn create_parent(
    pool: &SqlitePool,
    req: &CreateParentRequest,
    password_hash: &str,
) -> Result<Parent, sqlx::Error> {
    let sql = format!(
        "INSERT INTO parents (first_name, last_name, phone, email, gender, password_hash, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {PARENT_COLUMNS}"
    );
    sqlx::query_as::<_, Parent>(&sql)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.gender)
        .bind(password_hash)
        .bind(now())
        .fetch_one(pool)
        .await
}

pub async fn get_parent(pool: &SqlitePool, id: i64) -> Result<Option<Parent>, sqlx::Error> {
    let sql = format!("SELECT {PARENT_COLUMNS} FROM parents WHERE id = ?");
    sqlx::query_as::<_, Parent>(&sql).bind(id).fetch_optional(pool).await
}

pub async fn list_parents(pool: &SqlitePool, skip: i64, limit: i64) -> Result<Vec<Parent>, sqlx::Error> {
    let sql = format!("SELECT {PARENT_COLUMNS} FROM parents ORDER BY last_name, first_name LIMIT ? OFFSET ?");
    sqlx::query_as::<_, Parent>(&sql).bind(limit).bind(skip).fetch_all(pool).await
}

pub async fn update_parent(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateParentRequest,
    password_hash: Option<String>,
) -> Result<Option<Parent>, sqlx::Error> {
    let sql = format!(
        "UPDATE parents SET \
            first_name = COALESCE(?, first_name), last_name = COALESCE(?, last_name), \
            phone = COALESCE(?, phone), email = COALESCE(?, email), gender = COALESCE(?, gender), \
            password_hash = COALESCE(?, password_hash), updated_at = ? \
         WHERE id = ? RETURNING {PARENT_COLUMNS}"
    );
    sqlx::query_as::<_, Parent>(&sql)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.gender)
        .bind(password_hash)
        .bind(now())
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_parent(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM parents WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn parent_credentials(pool: &SqlitePool, email: &str) -> Result<Option<(i64, String)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String)>("SELECT id, password_hash FROM parents WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Связывает родителя и ребёнка; повторная связь ничего не меняет.
pub async fn link_parent_student(pool: &SqlitePool, parent_id: i64, student_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO parent_students (parent_id, student_id, created_at) VALUES (?, ?, ?)
         ON CONFLICT (parent_id, student_id) DO NOTHING",
    )
    .bind(parent_id)
    .bind(student_id)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn unlink_parent_student(pool: &SqlitePool, parent_id: i64, student_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM parent_students WHERE parent_id = ? AND student_id = ?")
        .bind(parent_id)
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn children_of_parent(pool: &SqlitePool, parent_id: i64) -> Result<Vec<Student>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM students s JOIN parent_students ps ON ps.student_id = s.id
         WHERE ps.parent_id = ? ORDER BY s.first_name",
        prefixed(STUDENT_COLUMNS, "s")
    );
    sqlx::query_as::<_, Student>(&sql).bind(parent_id).fetch_all(pool).await
}

pub async fn parents_of_student(pool: &SqlitePool, student_id: i64) -> Result<Vec<Parent>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM parents p JOIN parent_students ps ON ps.parent_id = p.id
         WHERE ps.student_id = ? ORDER BY p.id",
        prefixed(PARENT_COLUMNS, "p")
    );
    sqlx::query_as::<_, Parent>(&sql).bind(student_id).fetch_all(pool).await
}

pub async fn is_parent_of(pool: &SqlitePool, parent_id: i64, student_id: i64) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM parent_students WHERE parent_id = ? AND student_id = ?",
    )
    .bind(parent_id)
    .bind(student_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// "a, b" -> "s.a, s.b"
fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use chrono::NaiveDate;

    pub(crate) fn student_request(first: &str, email: Option<&str>) -> CreateStudentRequest {
        CreateStudentRequest {
            first_name: first.to_string(),
            last_name: "Rojas".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2010, 5, 3).unwrap(),
            gender: "F".to_string(),
            image_url: None,
            guardian_name: None,
            guardian_phone: None,
            home_address: None,
            email: email.map(str::to_string),
            password: None,
        }
    }

    #[test]
    fn prefixes_column_lists() {
        assert_eq!(prefixed("id, name", "s"), "s.id, s.name");
    }

    #[tokio::test]
    async fn student_crud_roundtrip() {
        let pool = memory_pool().await.unwrap();
        let created = create_student(&pool, &student_request("Ana", Some("ana@estudiante.edu.bo")), None)
            .await
            .unwrap();
        assert_eq!(created.full_name(), "Ana Rojas");

        let update = UpdateStudentRequest {
            guardian_name: Some("Luis Rojas".to_string()),
            ..Default::default()
        };
        let updated = update_student(&pool, created.id, &update, None).await.unwrap().unwrap();
        assert_eq!(updated.guardian_name.as_deref(), Some("Luis Rojas"));
        assert_eq!(updated.first_name, "Ana");
        assert!(updated.updated_at.is_some());

        assert!(delete_student(&pool, created.id).await.unwrap());
        assert!(get_student(&pool, created.id).await.unwrap().is_none());
        assert!(!delete_student(&pool, created.id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_student_email_is_unique_violation() {
        let pool = memory_pool().await.unwrap();
        create_student(&pool, &student_request("Ana", Some("x@estudiante.edu.bo")), None)
            .await
            .unwrap();
        let err = create_student(&pool, &student_request("Eva", Some("x@estudiante.edu.bo")), None)
            .await
            .unwrap_err();
        assert!(matches!(crate::error::CoreError::from(err), crate::error::CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn parent_links_are_idempotent() {
        let pool = memory_pool().await.unwrap();
        let student = create_student(&pool, &student_request("Ana", None), None).await.unwrap();
        let parent = create_parent(
            &pool,
            &CreateParentRequest {
                first_name: "Luis".to_string(),
                last_name: "Rojas".to_string(),
                phone: "700".to_string(),
                email: "luis@padre.com".to_string(),
                gender: "M".to_string(),
                password: "x".to_string(),
            },
            "hash",
        )
        .await
        .unwrap();

        assert!(link_parent_student(&pool, parent.id, student.id).await.unwrap());
        assert!(!link_parent_student(&pool, parent.id, student.id).await.unwrap());
        assert!(is_parent_of(&pool, parent.id, student.id).await.unwrap());
        assert_eq!(children_of_parent(&pool, parent.id).await.unwrap().len(), 1);
        assert_eq!(parents_of_student(&pool, student.id).await.unwrap()[0].email, "luis@padre.com");

        assert!(unlink_parent_student(&pool, parent.id, student.id).await.unwrap());
        assert!(children_of_parent(&pool, parent.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn teacher_role_filter() {
        let pool = memory_pool().await.unwrap();
        for (email, is_teacher) in [("a@admin.edu", false), ("t@docente.edu", true)] {
            let req = CreateTeacherRequest {
                first_name: "N".to_string(),
                last_name: "M".to_string(),
                phone: "1".to_string(),
                email: email.to_string(),
                gender: "M".to_string(),
                password: "p".to_string(),
                is_teacher,
            };
            create_teacher(&pool, &req, "hash").await.unwrap();
        }
        assert_eq!(list_teachers(&pool, None, 0, 100).await.unwrap().len(), 2);
        let admins = list_teachers(&pool, Some(false), 0, 100).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "a@admin.edu");
    }
}
