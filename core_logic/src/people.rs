use sqlx::SqlitePool;
use tracing::info;

use crate::auth::hash_password;
use crate::db::people as db;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    require_non_blank, CreateParentRequest, CreateStudentRequest, CreateTeacherRequest, Parent, Student,
    Teacher, UpdateParentRequest, UpdateStudentRequest, UpdateTeacherRequest,
};

fn hash_optional(password: Option<&str>, cost: u32) -> CoreResult<Option<String>> {
    match password.filter(|p| !p.is_empty()) {
        Some(p) => Ok(Some(hash_password(p, cost)?)),
        None => Ok(None),
    }
}

fn reject_blank_updates(fields: &[(&str, Option<&String>)]) -> CoreResult<()> {
    let present: Vec<(&str, &str)> = fields
        .iter()
        .filter_map(|(name, value)| value.map(|v| (*name, v.as_str())))
        .collect();
    require_non_blank(&present)
}

pub async fn create_student(pool: &SqlitePool, req: &CreateStudentRequest, cost: u32) -> CoreResult<Student> {
    require_non_blank(&[
        ("first_name", req.first_name.as_str()),
        ("last_name", req.last_name.as_str()),
        ("gender", req.gender.as_str()),
    ])?;
    let hash = hash_optional(req.password.as_deref(), cost)?;
    let student = db::create_student(pool, req, hash).await?;
    info!("Student {} created", student.id);
    Ok(student)
}

pub async fn update_student(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateStudentRequest,
    cost: u32,
) -> CoreResult<Student> {
    reject_blank_updates(&[
        ("first_name", req.first_name.as_ref()),
        ("last_name", req.last_name.as_ref()),
        ("gender", req.gender.as_ref()),
    ])?;
    let hash = hash_optional(req.password.as_deref(), cost)?;
    db::update_student(pool, id, req, hash)
        .await?
        .ok_or_else(|| CoreError::not_found("Student"))
}

pub async fn create_teacher(pool: &SqlitePool, req: &CreateTeacherRequest, cost: u32) -> CoreResult<Teacher> {
    require_non_blank(&[
        ("first_name", req.first_name.as_str()),
        ("last_name", req.last_name.as_str()),
        ("email", req.email.as_str()),
        ("password", req.password.as_str()),
    ])?;
    let hash = hash_password(&req.password, cost)?;
    let teacher = db::create_teacher(pool, req, &hash).await?;
    info!("Teacher {} created (is_teacher={})", teacher.id, teacher.is_teacher);
    Ok(teacher)
}

pub async fn update_teacher(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateTeacherRequest,
    cost: u32,
) -> CoreResult<Teacher> {
    reject_blank_updates(&[
        ("first_name", req.first_name.as_ref()),
        ("last_name", req.last_name.as_ref()),
        ("email", req.email.as_ref()),
    ])?;
    let hash = hash_optional(req.password.as_deref(), cost)?;
    db::update_teacher(pool, id, req, hash)
        .await?
        .ok_or_else(|| CoreError::not_found("Teacher"))
}

pub async fn create_parent(pool: &SqlitePool, req: &CreateParentRequest, cost: u32) -> CoreResult<Parent> {
    require_non_blank(&[
        ("first_name", req.first_name.as_str()),
        ("last_name", req.last_name.as_str()),
        ("email", req.email.as_str()),
        ("password", req.password.as_str()),
    ])?;
    let hash = hash_password(&req.password, cost)?;
    Ok(db::create_parent(pool, req, &hash).await?)
}

pub async fn update_parent(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateParentRequest,
    cost: u32,
) -> CoreResult<Parent> {
    reject_blank_updates(&[
        ("first_name", req.first_name.as_ref()),
        ("last_name", req.last_name.as_ref()),
        ("email", req.email.as_ref()),
    ])?;
    let hash = hash_optional(req.password.as_deref(), cost)?;
    db::update_parent(pool, id, req, hash)
        .await?
        .ok_or_else(|| CoreError::not_found("Parent"))
}

/// Связывает родителя с ребёнком; оба должны существовать.
pub async fn link_child(pool: &SqlitePool, parent_id: i64, student_id: i64) -> CoreResult<Vec<Student>> {
    db::get_parent(pool, parent_id).await?.ok_or_else(|| CoreError::not_found("Parent"))?;
    db::get_student(pool, student_id).await?.ok_or_else(|| CoreError::not_found("Student"))?;
    db::link_parent_student(pool, parent_id, student_id).await?;
    Ok(db::children_of_parent(pool, parent_id).await?)
}

pub async fn unlink_child(pool: &SqlitePool, parent_id: i64, student_id: i64) -> CoreResult<()> {
    if !db::unlink_parent_student(pool, parent_id, student_id).await? {
        return Err(CoreError::not_found("Parent-student link"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use chrono::NaiveDate;

    fn student(first: &str) -> CreateStudentRequest {
        CreateStudentRequest {
            first_name: first.to_string(),
            last_name: "Vargas".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2011, 1, 9).unwrap(),
            gender: "M".to_string(),
            image_url: None,
            guardian_name: None,
            guardian_phone: None,
            home_address: None,
            email: Some(format!("{}@estudiante.edu.bo", first.to_lowercase())),
            password: Some("secret".to_string()),
        }
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let pool = memory_pool().await.unwrap();
        let err = create_student(&pool, &student("  "), 4).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let created = create_student(&pool, &student("Juan"), 4).await.unwrap();
        let update = UpdateStudentRequest { last_name: Some(String::new()), ..Default::default() };
        let err = update_student(&pool, created.id, &update, 4).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn student_password_is_hashed() {
        let pool = memory_pool().await.unwrap();
        create_student(&pool, &student("Juan"), 4).await.unwrap();
        let (_, hash) = db::student_credentials(&pool, "juan@estudiante.edu.bo").await.unwrap().unwrap();
        let hash = hash.unwrap();
        assert_ne!(hash, "secret");
        assert!(crate::auth::verify_password("secret", &hash));
    }

    #[tokio::test]
    async fn updating_missing_records_is_not_found() {
        let pool = memory_pool().await.unwrap();
        let err = update_parent(&pool, 99, &UpdateParentRequest::default(), 4).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        let err = link_child(&pool, 1, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
