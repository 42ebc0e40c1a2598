use sqlx::SqlitePool;

use super::now;
use crate::models::{
    Course, CourseSubject, CreateEnrollmentRequest, CreateWeightRequest, Enrollment, EnrollmentDetail,
    EvaluationWeight, Subject, Teacher, TeacherSubject, UpdateEnrollmentRequest, UpdateWeightRequest,
};

// ---------- Зачисления ----------

pub async fn create_enrollment(pool: &SqlitePool, req: &CreateEnrollmentRequest) -> Result<Enrollment, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "INSERT INTO enrollments (description, date, student_id, course_id, school_year_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(&req.description)
    .bind(req.date)
    .bind(req.student_id)
    .bind(req.course_id)
    .bind(req.school_year_id)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_enrollment(pool: &SqlitePool, id: i64) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_enrollments(
    pool: &SqlitePool,
    student_id: Option<i64>,
    course_id: Option<i64>,
    school_year_id: Option<i64>,
) -> Result<Vec<EnrollmentDetail>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentDetail>(
        "SELECT e.id, e.description, e.date,
                e.student_id, s.first_name || ' ' || s.last_name AS student_name,
                e.course_id, c.name AS course_name,
                e.school_year_id, sy.year AS school_year
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         JOIN courses c ON c.id = e.course_id
         JOIN school_years sy ON sy.id = e.school_year_id
         WHERE (? IS NULL OR e.student_id = ?)
           AND (? IS NULL OR e.course_id = ?)
           AND (? IS NULL OR e.school_year_id = ?)
         ORDER BY sy.year DESC, c.name, s.last_name",
    )
    .bind(student_id)
    .bind(student_id)
    .bind(course_id)
    .bind(course_id)
    .bind(school_year_id)
    .bind(school_year_id)
    .fetch_all(pool)
    .await
}

/// Зачисление студента в конкретном учебном году.
pub async fn enrollment_for_year(
    pool: &SqlitePool,
    student_id: i64,
    school_year_id: i64,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE student_id = ? AND school_year_id = ? ORDER BY date DESC LIMIT 1",
    )
    .bind(student_id)
    .bind(school_year_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_enrollment(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateEnrollmentRequest,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "UPDATE enrollments SET description = COALESCE(?, description), date = COALESCE(?, date),
            student_id = COALESCE(?, student_id), course_id = COALESCE(?, course_id),
            school_year_id = COALESCE(?, school_year_id), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&req.description)
    .bind(req.date)
    .bind(req.student_id)
    .bind(req.course_id)
    .bind(req.school_year_id)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_enrollment(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM enrollments WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// id студентов, зачисленных в курс (во всех годах).
pub async fn course_student_ids(pool: &SqlitePool, course_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT student_id FROM enrollments WHERE course_id = ? ORDER BY student_id")
        .bind(course_id)
        .fetch_all(pool)
        .await
}

// ---------- Предметы курсов ----------

pub async fn create_course_subject(
    pool: &SqlitePool,
    course_id: i64,
    subject_id: i64,
) -> Result<CourseSubject, sqlx::Error> {
    sqlx::query_as::<_, CourseSubject>(
        "INSERT INTO course_subjects (course_id, subject_id, created_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(course_id)
    .bind(subject_id)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_course_subject(pool: &SqlitePool, id: i64) -> Result<Option<CourseSubject>, sqlx::Error> {
    sqlx::query_as::<_, CourseSubject>("SELECT * FROM course_subjects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_course_subjects(pool: &SqlitePool) -> Result<Vec<CourseSubject>, sqlx::Error> {
    sqlx::query_as::<_, CourseSubject>("SELECT * FROM course_subjects ORDER BY course_id, subject_id")
        .fetch_all(pool)
        .await
}

pub async fn update_course_subject(
    pool: &SqlitePool,
    id: i64,
    course_id: i64,
    subject_id: i64,
) -> Result<Option<CourseSubject>, sqlx::Error> {
    sqlx::query_as::<_, CourseSubject>(
        "UPDATE course_subjects SET course_id = ?, subject_id = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(course_id)
    .bind(subject_id)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_course_subject(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM course_subjects WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn subjects_of_course(pool: &SqlitePool, course_id: i64) -> Result<Vec<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        "SELECT s.* FROM subjects s JOIN course_subjects cs ON cs.subject_id = s.id
         WHERE cs.course_id = ? ORDER BY s.name",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub async fn courses_of_subject(pool: &SqlitePool, subject_id: i64) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT c.* FROM courses c JOIN course_subjects cs ON cs.course_id = c.id
         WHERE cs.subject_id = ? ORDER BY c.name",
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await
}

// ---------- Предметы преподавателей ----------

pub async fn create_teacher_subject(
    pool: &SqlitePool,
    teacher_id: i64,
    subject_id: i64,
) -> Result<TeacherSubject, sqlx::Error> {
    sqlx::query_as::<_, TeacherSubject>(
        "INSERT INTO teacher_subjects (teacher_id, subject_id, created_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(teacher_id)
    .bind(subject_id)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn list_teacher_subjects(pool: &SqlitePool) -> Result<Vec<TeacherSubject>, sqlx::Error> {
    sqlx::query_as::<_, TeacherSubject>("SELECT * FROM teacher_subjects ORDER BY teacher_id, subject_id")
        .fetch_all(pool)
        .await
}

pub async fn delete_teacher_subject(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM teacher_subjects WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn subjects_of_teacher(pool: &SqlitePool, teacher_id: i64) -> Result<Vec<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        "SELECT s.* FROM subjects s JOIN teacher_subjects ts ON ts.subject_id = s.id
         WHERE ts.teacher_id = ? ORDER BY s.name",
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}

pub async fn teachers_of_subject(pool: &SqlitePool, subject_id: i64) -> Result<Vec<Teacher>, sqlx::Error> {
    sqlx::query_as::<_, Teacher>(
        "SELECT t.id, t.first_name, t.last_name, t.phone, t.email, t.gender, t.is_teacher, t.created_at, t.updated_at
         FROM teachers t JOIN teacher_subjects ts ON ts.teacher_id = t.id
         WHERE ts.subject_id = ? ORDER BY t.id",
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await
}

/// Первый преподаватель, назначенный на предмет.
pub async fn assigned_teacher(pool: &SqlitePool, subject_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT teacher_id FROM teacher_subjects WHERE subject_id = ? ORDER BY id LIMIT 1")
        .bind(subject_id)
        .fetch_optional(pool)
        .await
}

pub async fn teaches_subject(pool: &SqlitePool, teacher_id: i64, subject_id: i64) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM teacher_subjects WHERE teacher_id = ? AND subject_id = ?")
            .bind(teacher_id)
            .bind(subject_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

// ---------- Веса типов оценок ----------

pub async fn create_weight(pool: &SqlitePool, req: &CreateWeightRequest) -> Result<EvaluationWeight, sqlx::Error> {
    sqlx::query_as::<_, EvaluationWeight>(
        "INSERT INTO evaluation_weights (percentage, teacher_id, subject_id, school_year_id, evaluation_type_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(req.percentage)
    .bind(req.teacher_id)
    .bind(req.subject_id)
    .bind(req.school_year_id)
    .bind(req.evaluation_type_id)
    .bind(now())
    .fetch_one(pool)
    .await
}

pub async fn get_weight(pool: &SqlitePool, id: i64) -> Result<Option<EvaluationWeight>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationWeight>("SELECT * FROM evaluation_weights WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_weights(
    pool: &SqlitePool,
    teacher_id: Option<i64>,
    subject_id: Option<i64>,
    school_year_id: Option<i64>,
) -> Result<Vec<EvaluationWeight>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationWeight>(
        "SELECT * FROM evaluation_weights
         WHERE (? IS NULL OR teacher_id = ?)
           AND (? IS NULL OR subject_id = ?)
           AND (? IS NULL OR school_year_id = ?)
         ORDER BY teacher_id, subject_id, evaluation_type_id",
    )
    .bind(teacher_id)
    .bind(teacher_id)
    .bind(subject_id)
    .bind(subject_id)
    .bind(school_year_id)
    .bind(school_year_id)
    .fetch_all(pool)
    .await
}

/// Сумма процентов группы без учёта веса `exclude_id`.
pub async fn weight_group_sum(
    pool: &SqlitePool,
    teacher_id: i64,
    subject_id: i64,
    school_year_id: i64,
    exclude_id: Option<i64>,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(percentage), 0.0) FROM evaluation_weights
         WHERE teacher_id = ? AND subject_id = ? AND school_year_id = ? AND (? IS NULL OR id <> ?)",
    )
    .bind(teacher_id)
    .bind(subject_id)
    .bind(school_year_id)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub async fn update_weight(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateWeightRequest,
) -> Result<Option<EvaluationWeight>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationWeight>(
        "UPDATE evaluation_weights SET percentage = COALESCE(?, percentage),
            teacher_id = COALESCE(?, teacher_id), subject_id = COALESCE(?, subject_id),
            school_year_id = COALESCE(?, school_year_id), evaluation_type_id = COALESCE(?, evaluation_type_id),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(req.percentage)
    .bind(req.teacher_id)
    .bind(req.subject_id)
    .bind(req.school_year_id)
    .bind(req.evaluation_type_id)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_weight(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM evaluation_weights WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
