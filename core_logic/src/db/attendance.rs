use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use super::now;
use crate::models::{
    AttendanceRecordView, AttendanceSession, GlobalAttendanceStats, SessionFilter, SessionStats,
    StudentAttendance, StudentAttendanceView, UpdateSessionRequest, SESSION_ACTIVE, SESSION_CLOSED,
};

// Лимит списков сессий
pub const SESSION_LIST_LIMIT: i64 = 50;

pub struct NewSession<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub teacher_id: i64,
    pub course_id: i64,
    pub subject_id: i64,
    pub term_id: i64,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub reference_address: Option<&'a str>,
    pub allowed_radius_m: i64,
    pub allow_late: bool,
    pub tolerance_minutes: i64,
}

/// Создаёт сессию и по одной записи "отсутствует" на каждого студента курса.
pub async fn create_session(
    pool: &SqlitePool,
    new: &NewSession<'_>,
    student_ids: &[i64],
) -> Result<AttendanceSession, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let ts = now();

    let session = sqlx::query_as::<_, AttendanceSession>(
        "INSERT INTO attendance_sessions (title, description, teacher_id, course_id, subject_id, term_id,
            starts_at, duration_minutes, latitude, longitude, reference_address, allowed_radius_m,
            allow_late, tolerance_minutes, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new.title)
    .bind(new.description)
    .bind(new.teacher_id)
    .bind(new.course_id)
    .bind(new.subject_id)
    .bind(new.term_id)
    .bind(new.starts_at)
    .bind(new.duration_minutes)
    .bind(new.latitude)
    .bind(new.longitude)
    .bind(new.reference_address)
    .bind(new.allowed_radius_m)
    .bind(new.allow_late)
    .bind(new.tolerance_minutes)
    .bind(SESSION_ACTIVE)
    .bind(ts)
    .fetch_one(&mut *tx)
    .await?;

    for student_id in student_ids {
        sqlx::query(
            "INSERT INTO student_attendance (session_id, student_id, present, method, created_at)
             VALUES (?, ?, 0, 'gps', ?)",
        )
        .bind(session.id)
        .bind(student_id)
        .bind(ts)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(session)
}

pub async fn get_session(pool: &SqlitePool, id: i64) -> Result<Option<AttendanceSession>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceSession>("SELECT * FROM attendance_sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_session(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateSessionRequest,
) -> Result<Option<AttendanceSession>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceSession>(
        "UPDATE attendance_sessions SET title = COALESCE(?, title), description = COALESCE(?, description),
            duration_minutes = COALESCE(?, duration_minutes), reference_address = COALESCE(?, reference_address),
            allowed_radius_m = COALESCE(?, allowed_radius_m), allow_late = COALESCE(?, allow_late),
            tolerance_minutes = COALESCE(?, tolerance_minutes), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.duration_minutes)
    .bind(&req.reference_address)
    .bind(req.allowed_radius_m)
    .bind(req.allow_late)
    .bind(req.tolerance_minutes)
    .bind(now())
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn active_session_exists(
    pool: &SqlitePool,
    teacher_id: i64,
    course_id: i64,
    subject_id: i64,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance_sessions
         WHERE teacher_id = ? AND course_id = ? AND subject_id = ? AND status = ?",
    )
    .bind(teacher_id)
    .bind(course_id)
    .bind(subject_id)
    .bind(SESSION_ACTIVE)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Сессии преподавателя (или все, если teacher_id = None), новые первыми.
pub async fn list_sessions(
    pool: &SqlitePool,
    teacher_id: Option<i64>,
    filter: &SessionFilter,
    limit: i64,
) -> Result<Vec<AttendanceSession>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceSession>(
        "SELECT * FROM attendance_sessions
         WHERE (? IS NULL OR teacher_id = ?)
           AND (? IS NULL OR status = ?)
           AND (? IS NULL OR course_id = ?)
           AND (? IS NULL OR subject_id = ?)
         ORDER BY starts_at DESC LIMIT ?",
    )
    .bind(teacher_id)
    .bind(teacher_id)
    .bind(&filter.status)
    .bind(&filter.status)
    .bind(filter.course_id)
    .bind(filter.course_id)
    .bind(filter.subject_id)
    .bind(filter.subject_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Активные сессии, в которых у студента есть запись.
pub async fn active_sessions_for_student(
    pool: &SqlitePool,
    student_id: i64,
) -> Result<Vec<AttendanceSession>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceSession>(
        "SELECT s.* FROM attendance_sessions s
         JOIN student_attendance a ON a.session_id = s.id
         WHERE a.student_id = ? AND s.status = ?
         ORDER BY s.starts_at DESC",
    )
    .bind(student_id)
    .bind(SESSION_ACTIVE)
    .fetch_all(pool)
    .await
}

pub async fn get_record(
    pool: &SqlitePool,
    session_id: i64,
    student_id: i64,
) -> Result<Option<StudentAttendance>, sqlx::Error> {
    sqlx::query_as::<_, StudentAttendance>(
        "SELECT * FROM student_attendance WHERE session_id = ? AND student_id = ?",
    )
    .bind(session_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub async fn session_records(pool: &SqlitePool, session_id: i64) -> Result<Vec<StudentAttendance>, sqlx::Error> {
    sqlx::query_as::<_, StudentAttendance>(
        "SELECT * FROM student_attendance WHERE session_id = ? ORDER BY student_id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

pub async fn session_record_views(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Vec<AttendanceRecordView>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecordView>(
        "SELECT a.id, a.student_id, st.first_name || ' ' || st.last_name AS student_name,
                a.present, a.late, a.justified, a.marked_at, a.distance_m, a.justification,
                CASE WHEN a.present = 1 AND a.late = 1 THEN 'late'
                     WHEN a.present = 1 THEN 'present'
                     WHEN a.justified = 1 THEN 'justified'
                     ELSE 'absent' END AS status
         FROM student_attendance a JOIN students st ON st.id = a.student_id
         WHERE a.session_id = ?
         ORDER BY st.last_name, st.first_name",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

pub struct MarkPresent<'a> {
    pub latitude: f64,
    pub longitude: f64,
    pub distance_m: f64,
    pub late: bool,
    pub notes: Option<&'a str>,
    pub marked_at: NaiveDateTime,
}

pub async fn mark_present(
    pool: &SqlitePool,
    record_id: i64,
    mark: &MarkPresent<'_>,
) -> Result<StudentAttendance, sqlx::Error> {
    sqlx::query_as::<_, StudentAttendance>(
        "UPDATE student_attendance SET present = 1, marked_at = ?, latitude = ?, longitude = ?,
            distance_m = ?, method = 'gps', notes = ?, late = ?, updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(mark.marked_at)
    .bind(mark.latitude)
    .bind(mark.longitude)
    .bind(mark.distance_m)
    .bind(mark.notes)
    .bind(mark.late)
    .bind(now())
    .bind(record_id)
    .fetch_one(pool)
    .await
}

pub async fn justify(
    pool: &SqlitePool,
    record_id: i64,
    reason: &str,
    notes: Option<&str>,
) -> Result<StudentAttendance, sqlx::Error> {
    sqlx::query_as::<_, StudentAttendance>(
        "UPDATE student_attendance SET justified = 1, justification = ?, notes = COALESCE(?, notes), updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(reason)
    .bind(notes)
    .bind(now())
    .bind(record_id)
    .fetch_one(pool)
    .await
}

pub async fn close_session(
    pool: &SqlitePool,
    session_id: i64,
    ends_at: NaiveDateTime,
) -> Result<AttendanceSession, sqlx::Error> {
    sqlx::query_as::<_, AttendanceSession>(
        "UPDATE attendance_sessions SET status = ?, ends_at = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(SESSION_CLOSED)
    .bind(ends_at)
    .bind(now())
    .bind(session_id)
    .fetch_one(pool)
    .await
}

pub async fn session_stats(pool: &SqlitePool, session_id: i64) -> Result<SessionStats, sqlx::Error> {
    let (total, present, late, justified): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN present = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN present = 1 AND late = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN present = 0 AND justified = 1 THEN 1 ELSE 0 END), 0)
         FROM student_attendance WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(SessionStats::from_counts(total, present, late, justified))
}

/// Записи посещаемости студента (фильтры по курсу и предмету).
pub async fn student_records(
    pool: &SqlitePool,
    student_id: i64,
    course_id: Option<i64>,
    subject_id: Option<i64>,
) -> Result<Vec<StudentAttendanceView>, sqlx::Error> {
    sqlx::query_as::<_, StudentAttendanceView>(
        "SELECT a.id, a.session_id, s.title, s.course_id, s.subject_id, s.starts_at,
                a.present, a.late, a.justified, a.marked_at, a.distance_m
         FROM student_attendance a JOIN attendance_sessions s ON s.id = a.session_id
         WHERE a.student_id = ?
           AND (? IS NULL OR s.course_id = ?)
           AND (? IS NULL OR s.subject_id = ?)
         ORDER BY s.starts_at DESC",
    )
    .bind(student_id)
    .bind(course_id)
    .bind(course_id)
    .bind(subject_id)
    .bind(subject_id)
    .fetch_all(pool)
    .await
}

pub async fn global_stats(pool: &SqlitePool) -> Result<GlobalAttendanceStats, sqlx::Error> {
    let (total_sessions, active_sessions, closed_sessions): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'closed' THEN 1 ELSE 0 END), 0)
         FROM attendance_sessions",
    )
    .fetch_one(pool)
    .await?;
    let (total_records, present_records): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN present = 1 THEN 1 ELSE 0 END), 0) FROM student_attendance",
    )
    .fetch_one(pool)
    .await?;
    Ok(GlobalAttendanceStats {
        total_sessions,
        active_sessions,
        closed_sessions,
        total_records,
        present_records,
        attendance_pct: percentage(present_records, total_records),
    })
}

impl SessionStats {
    pub fn from_counts(total: i64, present: i64, late: i64, justified: i64) -> Self {
        SessionStats {
            total,
            present,
            absent: total - present,
            late,
            justified,
            attendance_pct: percentage(present, total),
        }
    }
}

fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 10000.0 / total as f64).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_from_counts() {
        let stats = SessionStats::from_counts(4, 3, 1, 1);
        assert_eq!(stats.absent, 1);
        assert_eq!(stats.attendance_pct, 75.0);
        assert_eq!(SessionStats::from_counts(0, 0, 0, 0).attendance_pct, 0.0);
        assert_eq!(SessionStats::from_counts(3, 1, 0, 0).attendance_pct, 33.33);
    }
}
