//! Студенты, преподаватели и родители.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use core_logic::auth::UserType;
use core_logic::cloudinary::profile_folder;
use core_logic::db::{assignments, people as db};
use core_logic::models::{
    Course, CreateParentRequest, CreateStudentRequest, CreateTeacherRequest, Parent, Student, Subject, Teacher,
    UpdateParentRequest, UpdateStudentRequest, UpdateTeacherRequest,
};
use core_logic::{people, ApiResponse, ErrorResponse};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use super::{created, deleted, Created, Page};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ---- students ----

#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    request_body = CreateStudentRequest,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 409, description = "E-mail already in use", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_student(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateStudentRequest>,
) -> ApiResult<Created<Student>> {
    user.admin()?;
    let student = people::create_student(&state.pool, &req, state.settings.bcrypt_cost).await?;
    Ok(created(student))
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    params(Page),
    responses((status = 200, description = "Students", body = Vec<Student>)),
    security(("bearer" = []))
)]
pub async fn list_students(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Student>>> {
    user.staff()?;
    Ok(Json(db::list_students(&state.pool, page.skip(), page.limit()).await?))
}

#[utoipa::path(
    get,
    path = "/students/me",
    tag = "students",
    responses((status = 200, description = "Own record", body = Student)),
    security(("bearer" = []))
)]
pub async fn current_student(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Student>> {
    user.student()?;
    let student = db::get_student(&state.pool, user.id).await?.ok_or_else(|| ApiError::not_found("Student"))?;
    Ok(Json(student))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student", body = Student),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_student(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Student>> {
    user.can_view_student(&state.pool, id).await?;
    let student = db::get_student(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Student"))?;
    Ok(Json(student))
}

#[utoipa::path(
    put,
    path = "/students/{id}",
    tag = "students",
    params(("id" = i64, Path, description = "Student id")),
    request_body = UpdateStudentRequest,
    responses((status = 200, description = "Student updated", body = Student)),
    security(("bearer" = []))
)]
pub async fn update_student(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStudentRequest>,
) -> ApiResult<Json<Student>> {
    user.admin()?;
    Ok(Json(people::update_student(&state.pool, id, &req, state.settings.bcrypt_cost).await?))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    params(("id" = i64, Path, description = "Student id")),
    responses((status = 200, description = "Student deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_student(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_student(&state.pool, id).await?, "Student")
}

#[utoipa::path(
    get,
    path = "/students/{id}/parents",
    tag = "students",
    params(("id" = i64, Path, description = "Student id")),
    responses((status = 200, description = "Parents of the student", body = Vec<Parent>)),
    security(("bearer" = []))
)]
pub async fn student_parents(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Parent>>> {
    user.staff()?;
    db::get_student(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Student"))?;
    Ok(Json(db::parents_of_student(&state.pool, id).await?))
}

/// Загрузка фото студента в Cloudinary, поле формы `file`.
#[utoipa::path(
    post,
    path = "/students/{id}/image",
    tag = "students",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Image stored", body = Student),
        (status = 400, description = "No image or storage not configured", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn upload_student_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Json<Student>> {
    user.admin()?;
    info!("POST /students/{}/image", id);
    let student = db::get_student(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Student"))?;
    let cloudinary = state
        .cloudinary
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("image storage is not configured"))?;

    let mut file_data = Vec::new();
    let mut file_name = String::new();
    let mut mime_type = String::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("error reading multipart: {e}")))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().unwrap_or("photo").to_string();
            mime_type = field.content_type().unwrap_or("application/octet-stream").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("error reading file data: {e}")))?;
            file_data = data.to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err(ApiError::bad_request("no file provided"));
    }
    if !mime_type.starts_with("image/") {
        return Err(ApiError::bad_request("file must be an image"));
    }

    let folder = profile_folder(&student.first_name, &student.last_name);
    let url = cloudinary.upload_image(file_data, &file_name, &mime_type, &folder).await?;
    let student = db::set_student_image(&state.pool, id, &url)
        .await?
        .ok_or_else(|| ApiError::not_found("Student"))?;
    Ok(Json(student))
}

// ---- teachers ----

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TeacherQuery {
    /// `teacher` или `admin`
    pub role: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/teachers",
    tag = "teachers",
    request_body = CreateTeacherRequest,
    responses(
        (status = 201, description = "Teacher created", body = Teacher),
        (status = 409, description = "E-mail already in use", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_teacher(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTeacherRequest>,
) -> ApiResult<Created<Teacher>> {
    user.admin()?;
    Ok(created(people::create_teacher(&state.pool, &req, state.settings.bcrypt_cost).await?))
}

#[utoipa::path(
    get,
    path = "/teachers",
    tag = "teachers",
    params(TeacherQuery),
    responses((status = 200, description = "Teachers and administrators", body = Vec<Teacher>)),
    security(("bearer" = []))
)]
pub async fn list_teachers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TeacherQuery>,
) -> ApiResult<Json<Vec<Teacher>>> {
    user.staff()?;
    let is_teacher = match query.role.as_deref() {
        None => None,
        Some("teacher") => Some(true),
        Some("admin") => Some(false),
        Some(other) => return Err(ApiError::bad_request(format!("unknown role '{other}'"))),
    };
    let page = Page { skip: query.skip, limit: query.limit };
    Ok(Json(db::list_teachers(&state.pool, is_teacher, page.skip(), page.limit()).await?))
}

#[utoipa::path(
    get,
    path = "/teachers/me",
    tag = "teachers",
    responses((status = 200, description = "Own record", body = Teacher)),
    security(("bearer" = []))
)]
pub async fn current_teacher(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Teacher>> {
    user.staff()?;
    let teacher = db::get_teacher(&state.pool, user.id).await?.ok_or_else(|| ApiError::not_found("Teacher"))?;
    Ok(Json(teacher))
}

#[utoipa::path(
    get,
    path = "/teachers/{id}",
    tag = "teachers",
    params(("id" = i64, Path, description = "Teacher id")),
    responses((status = 200, description = "Teacher", body = Teacher)),
    security(("bearer" = []))
)]
pub async fn get_teacher(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Teacher>> {
    user.staff()?;
    let teacher = db::get_teacher(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Teacher"))?;
    Ok(Json(teacher))
}

#[utoipa::path(
    put,
    path = "/teachers/{id}",
    tag = "teachers",
    params(("id" = i64, Path, description = "Teacher id")),
    request_body = UpdateTeacherRequest,
    responses((status = 200, description = "Teacher updated", body = Teacher)),
    security(("bearer" = []))
)]
pub async fn update_teacher(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTeacherRequest>,
) -> ApiResult<Json<Teacher>> {
    user.admin()?;
    Ok(Json(people::update_teacher(&state.pool, id, &req, state.settings.bcrypt_cost).await?))
}

#[utoipa::path(
    delete,
    path = "/teachers/{id}",
    tag = "teachers",
    params(("id" = i64, Path, description = "Teacher id")),
    responses((status = 200, description = "Teacher deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_teacher(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_teacher(&state.pool, id).await?, "Teacher")
}

async fn existing_teacher(state: &AppState, id: i64) -> ApiResult<Teacher> {
    db::get_teacher(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Teacher"))
}

#[utoipa::path(
    get,
    path = "/teachers/{id}/subjects",
    tag = "teachers",
    params(("id" = i64, Path, description = "Teacher id")),
    responses((status = 200, description = "Subjects taught", body = Vec<Subject>)),
    security(("bearer" = []))
)]
pub async fn teacher_subjects(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Subject>>> {
    user.staff()?;
    existing_teacher(&state, id).await?;
    Ok(Json(assignments::subjects_of_teacher(&state.pool, id).await?))
}

#[utoipa::path(
    get,
    path = "/teachers/{id}/courses",
    tag = "teachers",
    params(("id" = i64, Path, description = "Teacher id")),
    responses((status = 200, description = "Courses that include the teacher's subjects", body = Vec<Course>)),
    security(("bearer" = []))
)]
pub async fn teacher_courses(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Course>>> {
    user.staff()?;
    existing_teacher(&state, id).await?;
    Ok(Json(db::teacher_courses(&state.pool, id).await?))
}

#[utoipa::path(
    get,
    path = "/teachers/{id}/students",
    tag = "teachers",
    params(("id" = i64, Path, description = "Teacher id")),
    responses((status = 200, description = "Students enrolled in those courses", body = Vec<Student>)),
    security(("bearer" = []))
)]
pub async fn teacher_students(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Student>>> {
    user.staff()?;
    existing_teacher(&state, id).await?;
    Ok(Json(db::teacher_students(&state.pool, id).await?))
}

// ---- parents ----

#[utoipa::path(
    post,
    path = "/parents",
    tag = "parents",
    request_body = CreateParentRequest,
    responses(
        (status = 201, description = "Parent created", body = Parent),
        (status = 409, description = "E-mail already in use", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_parent(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateParentRequest>,
) -> ApiResult<Created<Parent>> {
    user.admin()?;
    Ok(created(people::create_parent(&state.pool, &req, state.settings.bcrypt_cost).await?))
}

#[utoipa::path(
    get,
    path = "/parents",
    tag = "parents",
    params(Page),
    responses((status = 200, description = "Parents", body = Vec<Parent>)),
    security(("bearer" = []))
)]
pub async fn list_parents(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Parent>>> {
    user.admin()?;
    Ok(Json(db::list_parents(&state.pool, page.skip(), page.limit()).await?))
}

#[utoipa::path(
    get,
    path = "/parents/me",
    tag = "parents",
    responses((status = 200, description = "Own record", body = Parent)),
    security(("bearer" = []))
)]
pub async fn current_parent(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Parent>> {
    user.parent()?;
    let parent = db::get_parent(&state.pool, user.id).await?.ok_or_else(|| ApiError::not_found("Parent"))?;
    Ok(Json(parent))
}

#[utoipa::path(
    get,
    path = "/parents/me/children",
    tag = "parents",
    responses((status = 200, description = "Own children", body = Vec<Student>)),
    security(("bearer" = []))
)]
pub async fn my_children(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Student>>> {
    user.parent()?;
    Ok(Json(db::children_of_parent(&state.pool, user.id).await?))
}

#[utoipa::path(
    get,
    path = "/parents/{id}",
    tag = "parents",
    params(("id" = i64, Path, description = "Parent id")),
    responses((status = 200, description = "Parent", body = Parent)),
    security(("bearer" = []))
)]
pub async fn get_parent(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Parent>> {
    user.admin()?;
    let parent = db::get_parent(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Parent"))?;
    Ok(Json(parent))
}

#[utoipa::path(
    put,
    path = "/parents/{id}",
    tag = "parents",
    params(("id" = i64, Path, description = "Parent id")),
    request_body = UpdateParentRequest,
    responses((status = 200, description = "Parent updated", body = Parent)),
    security(("bearer" = []))
)]
pub async fn update_parent(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateParentRequest>,
) -> ApiResult<Json<Parent>> {
    user.admin()?;
    Ok(Json(people::update_parent(&state.pool, id, &req, state.settings.bcrypt_cost).await?))
}

#[utoipa::path(
    delete,
    path = "/parents/{id}",
    tag = "parents",
    params(("id" = i64, Path, description = "Parent id")),
    responses((status = 200, description = "Parent deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_parent(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    deleted(db::delete_parent(&state.pool, id).await?, "Parent")
}

#[utoipa::path(
    get,
    path = "/parents/{id}/children",
    tag = "parents",
    params(("id" = i64, Path, description = "Parent id")),
    responses((status = 200, description = "Linked children", body = Vec<Student>)),
    security(("bearer" = []))
)]
pub async fn parent_children(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Student>>> {
    user.parent_or_admin()?;
    // Родитель видит только своих детей
    if user.user_type == UserType::Parent && user.id != id {
        return Err(ApiError::forbidden("no access to another parent's children"));
    }
    db::get_parent(&state.pool, id).await?.ok_or_else(|| ApiError::not_found("Parent"))?;
    Ok(Json(db::children_of_parent(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/parents/{id}/children/{student_id}",
    tag = "parents",
    params(
        ("id" = i64, Path, description = "Parent id"),
        ("student_id" = i64, Path, description = "Student id")
    ),
    responses(
        (status = 200, description = "Children after linking", body = Vec<Student>),
        (status = 409, description = "Already linked", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn link_child(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, student_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Vec<Student>>> {
    user.admin()?;
    Ok(Json(people::link_child(&state.pool, id, student_id).await?))
}

#[utoipa::path(
    delete,
    path = "/parents/{id}/children/{student_id}",
    tag = "parents",
    params(
        ("id" = i64, Path, description = "Parent id"),
        ("student_id" = i64, Path, description = "Student id")
    ),
    responses((status = 200, description = "Link removed", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn unlink_child(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, student_id)): Path<(i64, i64)>,
) -> ApiResult<Json<ApiResponse>> {
    user.admin()?;
    people::unlink_child(&state.pool, id, student_id).await?;
    Ok(Json(ApiResponse::ok("Child unlinked")))
}
