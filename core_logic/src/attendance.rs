//! Сессии посещаемости с геозоной: открытие, отметка, обоснование, закрытие.

use chrono::{Duration, NaiveDateTime};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::academics;
use crate::db::attendance::{self as db, MarkPresent, NewSession};
use crate::db::{assignments, catalog, evaluations};
use crate::error::{CoreError, CoreResult};
use crate::geo::{self, Coordinate};
use crate::models::{
    AttendanceCheck, AttendanceSession, CloseSessionResult, CreateEvaluationRequest, CreateSessionRequest,
    JustifyAbsenceRequest, MarkAttendanceRequest, SessionDetail, StudentAttendance, UpdateSessionRequest,
    SESSION_ACTIVE,
};

pub const ATTENDANCE_TYPE_NAME: &str = "Attendance";

// Значения по умолчанию для новой сессии
const DEFAULT_DURATION_MINUTES: i64 = 60;
const DEFAULT_RADIUS_M: i64 = 100;
const DEFAULT_TOLERANCE_MINUTES: i64 = 15;
const MAX_TOLERANCE_MINUTES: i64 = 60;

/// Балл посещаемости: присутствие 100, опоздание 50, уважительная причина 75, пропуск 0.
pub fn attendance_value(record: &StudentAttendance) -> f64 {
    if record.present {
        if record.late {
            50.0
        } else {
            100.0
        }
    } else if record.justified {
        75.0
    } else {
        0.0
    }
}

pub fn status_label(present: bool, late: bool, justified: bool) -> &'static str {
    match (present, late, justified) {
        (true, true, _) => "late",
        (true, false, _) => "present",
        (false, _, true) => "justified",
        _ => "absent",
    }
}

/// Можно ли сейчас отмечаться в сессии.
pub fn is_open_for_marking(session: &AttendanceSession, now: NaiveDateTime) -> bool {
    if session.status != SESSION_ACTIVE {
        return false;
    }
    if session.ends_at.is_some_and(|end| now > end) {
        return false;
    }
    if !session.allow_late {
        return now <= session.starts_at;
    }
    now <= session.starts_at + Duration::minutes(session.tolerance_minutes)
}

pub fn minutes_left(session: &AttendanceSession, now: NaiveDateTime) -> i64 {
    let deadline = session.starts_at + Duration::minutes(session.tolerance_minutes);
    (deadline - now).num_minutes().max(0)
}

fn validate_session_numbers(radius: i64, tolerance: i64, duration: i64) -> CoreResult<()> {
    if radius <= 0 {
        return Err(CoreError::validation("allowed_radius_m must be positive"));
    }
    if !(0..=MAX_TOLERANCE_MINUTES).contains(&tolerance) {
        return Err(CoreError::validation("tolerance_minutes must be between 0 and 60"));
    }
    if duration <= 0 {
        return Err(CoreError::validation("duration_minutes must be positive"));
    }
    Ok(())
}

/// Открывает сессию и создаёт записи "отсутствует" для всех студентов курса.
pub async fn open_session(
    pool: &SqlitePool,
    teacher_id: i64,
    req: &CreateSessionRequest,
) -> CoreResult<AttendanceSession> {
    if req.title.trim().is_empty() {
        return Err(CoreError::validation("title must not be empty"));
    }
    let coord = Coordinate::new(req.latitude, req.longitude)?;
    let location = geo::validate_teacher_location(coord);
    if !location.valid {
        return Err(CoreError::validation(location.errors.join("; ")));
    }
    for warning in &location.warnings {
        warn!("Session location warning for teacher {}: {}", teacher_id, warning);
    }

    let radius = req.allowed_radius_m.unwrap_or(DEFAULT_RADIUS_M);
    let tolerance = req.tolerance_minutes.unwrap_or(DEFAULT_TOLERANCE_MINUTES);
    let duration = req.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    validate_session_numbers(radius, tolerance, duration)?;

    catalog::get_course(pool, req.course_id).await?.ok_or_else(|| CoreError::not_found("Course"))?;
    catalog::get_subject(pool, req.subject_id).await?.ok_or_else(|| CoreError::not_found("Subject"))?;
    let term_id = match req.term_id {
        Some(id) => catalog::get_term(pool, id).await?.ok_or_else(|| CoreError::not_found("Term"))?.id,
        None => academics::term_for_date(pool, req.starts_at.date()).await?.id,
    };

    if db::active_session_exists(pool, teacher_id, req.course_id, req.subject_id).await? {
        return Err(CoreError::conflict("an active session already exists for this course and subject"));
    }

    let students = assignments::course_student_ids(pool, req.course_id).await?;
    let new = NewSession {
        title: &req.title,
        description: req.description.as_deref(),
        teacher_id,
        course_id: req.course_id,
        subject_id: req.subject_id,
        term_id,
        starts_at: req.starts_at,
        duration_minutes: duration,
        latitude: coord.latitude,
        longitude: coord.longitude,
        reference_address: req.reference_address.as_deref(),
        allowed_radius_m: radius,
        allow_late: req.allow_late.unwrap_or(true),
        tolerance_minutes: tolerance,
    };
    let session = db::create_session(pool, &new, &students).await?;
    info!(
        "Attendance session {} opened by teacher {} with {} students",
        session.id,
        teacher_id,
        students.len()
    );
    Ok(session)
}

pub async fn update_session(pool: &SqlitePool, id: i64, req: &UpdateSessionRequest) -> CoreResult<AttendanceSession> {
    let current = db::get_session(pool, id).await?.ok_or_else(|| CoreError::not_found("Attendance session"))?;
    validate_session_numbers(
        req.allowed_radius_m.unwrap_or(current.allowed_radius_m),
        req.tolerance_minutes.unwrap_or(current.tolerance_minutes),
        req.duration_minutes.unwrap_or(current.duration_minutes),
    )?;
    db::update_session(pool, id, req)
        .await?
        .ok_or_else(|| CoreError::not_found("Attendance session"))
}

/// Студент отмечается по координатам.
pub async fn mark_attendance(
    pool: &SqlitePool,
    session_id: i64,
    student_id: i64,
    req: &MarkAttendanceRequest,
    now: NaiveDateTime,
) -> CoreResult<StudentAttendance> {
    let session = db::get_session(pool, session_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Attendance session"))?;
    if !is_open_for_marking(&session, now) {
        return Err(CoreError::validation("the session is not active or has expired"));
    }
    let record = db::get_record(pool, session_id, student_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Student in this session"))?;
    if record.present {
        return Err(CoreError::conflict("attendance already marked"));
    }

    let student = Coordinate::new(req.latitude, req.longitude)?;
    let center = Coordinate::new(session.latitude, session.longitude)?;
    let (inside, distance) = geo::within_radius(student, center, session.allowed_radius_m as f64);
    if !inside {
        return Err(CoreError::validation(format!(
            "outside the allowed range ({}m), distance: {}m",
            session.allowed_radius_m, distance
        )));
    }

    let mark = MarkPresent {
        latitude: student.latitude,
        longitude: student.longitude,
        distance_m: distance,
        late: now > session.starts_at,
        notes: req.notes.as_deref(),
        marked_at: now,
    };
    let updated = db::mark_present(pool, record.id, &mark).await?;
    info!(
        "Student {} marked attendance in session {} (distance={}m, late={})",
        student_id, session_id, distance, updated.late
    );
    Ok(updated)
}

/// Проверка без записи: можно ли отметиться из этой точки.
pub async fn check_attendance(
    pool: &SqlitePool,
    session_id: i64,
    student_id: i64,
    latitude: f64,
    longitude: f64,
    now: NaiveDateTime,
) -> CoreResult<AttendanceCheck> {
    let session = db::get_session(pool, session_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Attendance session"))?;
    let refuse = |message: &str| AttendanceCheck {
        can_mark: false,
        message: message.to_string(),
        distance_m: None,
        within_range: false,
        minutes_left: None,
    };

    if !is_open_for_marking(&session, now) {
        return Ok(refuse("the session is not active or has expired"));
    }
    let Some(record) = db::get_record(pool, session_id, student_id).await? else {
        return Ok(refuse("student is not part of this session"));
    };
    if record.present {
        return Ok(refuse("attendance already marked"));
    }

    let student = Coordinate::new(latitude, longitude)?;
    let center = Coordinate::new(session.latitude, session.longitude)?;
    let (inside, distance) = geo::within_radius(student, center, session.allowed_radius_m as f64);
    if !inside {
        return Ok(AttendanceCheck {
            can_mark: false,
            message: format!(
                "outside the allowed range ({}m), your distance: {}m",
                session.allowed_radius_m, distance
            ),
            distance_m: Some(distance),
            within_range: false,
            minutes_left: None,
        });
    }
    Ok(AttendanceCheck {
        can_mark: true,
        message: "you can mark attendance".to_string(),
        distance_m: Some(distance),
        within_range: true,
        minutes_left: Some(minutes_left(&session, now)),
    })
}

pub async fn justify_absence(
    pool: &SqlitePool,
    session_id: i64,
    req: &JustifyAbsenceRequest,
) -> CoreResult<StudentAttendance> {
    if req.reason.trim().is_empty() {
        return Err(CoreError::validation("reason must not be empty"));
    }
    let record = db::get_record(pool, session_id, req.student_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Attendance record"))?;
    Ok(db::justify(pool, record.id, &req.reason, req.notes.as_deref()).await?)
}

/// Закрывает активную сессию и переносит посещаемость в оценки типа "Attendance".
pub async fn close_session(pool: &SqlitePool, session_id: i64, now: NaiveDateTime) -> CoreResult<CloseSessionResult> {
    let session = db::get_session(pool, session_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Attendance session"))?;
    if session.status != SESSION_ACTIVE {
        return Err(CoreError::validation("the session is not active"));
    }
    let attendance_type = catalog::find_evaluation_type_by_name(pool, ATTENDANCE_TYPE_NAME)
        .await?
        .ok_or_else(|| CoreError::validation("evaluation type 'Attendance' not found"))?;

    let session = db::close_session(pool, session_id, now).await?;

    let day = session.starts_at.date();
    let description = format!("Attendance - {}", session.title);
    let (mut created, mut updated) = (0, 0);
    for record in db::session_records(pool, session_id).await? {
        let value = attendance_value(&record);
        let existing = evaluations::find_on_date(
            pool,
            record.student_id,
            session.subject_id,
            session.term_id,
            attendance_type.id,
            day,
        )
        .await?;
        match existing {
            Some(evaluation) => {
                evaluations::set_score(pool, evaluation.id, value, &description).await?;
                updated += 1;
            }
            None => {
                let req = CreateEvaluationRequest {
                    date: day,
                    description: description.clone(),
                    score: value,
                    student_id: record.student_id,
                    subject_id: session.subject_id,
                    evaluation_type_id: attendance_type.id,
                    term_id: session.term_id,
                };
                evaluations::create_evaluation(pool, &req).await?;
                created += 1;
            }
        }
    }

    let stats = db::session_stats(pool, session_id).await?;
    info!(
        "Attendance session {} closed: {} evaluations created, {} updated",
        session_id, created, updated
    );
    Ok(CloseSessionResult {
        session,
        stats,
        evaluations_created: created,
        evaluations_updated: updated,
    })
}

pub async fn session_detail(pool: &SqlitePool, session_id: i64) -> CoreResult<SessionDetail> {
    let session = db::get_session(pool, session_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Attendance session"))?;
    let stats = db::session_stats(pool, session_id).await?;
    let records = db::session_record_views(pool, session_id).await?;
    Ok(SessionDetail { session, stats, records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, date};

    const LAT: f64 = -17.7833;
    const LON: f64 = -63.1821;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date(2025, 3, 10).and_hms_opt(h, m, 0).unwrap()
    }

    fn session_request(school: &testing::School) -> CreateSessionRequest {
        CreateSessionRequest {
            title: "Algebra".to_string(),
            description: None,
            course_id: school.course_id,
            subject_id: school.subject_id,
            term_id: None,
            starts_at: at(8, 0),
            duration_minutes: None,
            latitude: LAT,
            longitude: LON,
            reference_address: None,
            allowed_radius_m: Some(50),
            allow_late: None,
            tolerance_minutes: None,
        }
    }

    fn nearby() -> MarkAttendanceRequest {
        MarkAttendanceRequest { latitude: LAT - 0.0002, longitude: LON, notes: None }
    }

    #[test]
    fn value_and_label_follow_record_state() {
        let school_free = |present, late, justified| StudentAttendance {
            id: 1,
            session_id: 1,
            student_id: 1,
            present,
            marked_at: None,
            latitude: None,
            longitude: None,
            distance_m: None,
            method: "gps".to_string(),
            notes: None,
            late,
            justified,
            justification: None,
            created_at: at(7, 0),
            updated_at: None,
        };
        assert_eq!(attendance_value(&school_free(true, false, false)), 100.0);
        assert_eq!(attendance_value(&school_free(true, true, false)), 50.0);
        assert_eq!(attendance_value(&school_free(false, false, true)), 75.0);
        assert_eq!(attendance_value(&school_free(false, false, false)), 0.0);
        assert_eq!(status_label(true, true, false), "late");
        assert_eq!(status_label(false, false, true), "justified");
        assert_eq!(status_label(false, false, false), "absent");
    }

    #[tokio::test]
    async fn open_detects_term_and_creates_records() {
        let school = testing::school().await;
        let session = open_session(&school.pool, school.teacher_id, &session_request(&school)).await.unwrap();
        assert_eq!(session.term_id, school.term_ids[0]);
        assert_eq!(session.tolerance_minutes, 15);
        assert!(session.allow_late);

        let detail = session_detail(&school.pool, session.id).await.unwrap();
        assert_eq!(detail.records.len(), 2);
        assert_eq!(detail.stats.absent, 2);

        let err = open_session(&school.pool, school.teacher_id, &session_request(&school)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn open_rejects_null_island_and_gaps() {
        let school = testing::school().await;
        let mut req = session_request(&school);
        req.latitude = 0.0;
        req.longitude = 0.0;
        assert!(matches!(open_session(&school.pool, school.teacher_id, &req).await, Err(CoreError::Validation(_))));

        let mut req = session_request(&school);
        req.starts_at = date(2025, 8, 15).and_hms_opt(8, 0, 0).unwrap();
        assert!(matches!(open_session(&school.pool, school.teacher_id, &req).await, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn marking_respects_window_distance_and_duplicates() {
        let school = testing::school().await;
        let session = open_session(&school.pool, school.teacher_id, &session_request(&school)).await.unwrap();

        // Слишком далеко
        let far = MarkAttendanceRequest { latitude: LAT - 0.01, longitude: LON, notes: None };
        let err = mark_attendance(&school.pool, session.id, school.student_id, &far, at(7, 55)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let record = mark_attendance(&school.pool, session.id, school.student_id, &nearby(), at(7, 55)).await.unwrap();
        assert!(record.present);
        assert!(!record.late);
        assert!(record.distance_m.unwrap() < 50.0);

        let err = mark_attendance(&school.pool, session.id, school.student_id, &nearby(), at(7, 56)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        // Опоздание в пределах допуска
        let late = mark_attendance(&school.pool, session.id, school.second_student_id, &nearby(), at(8, 10))
            .await
            .unwrap();
        assert!(late.late);

        let stats = db::session_stats(&school.pool, session.id).await.unwrap();
        assert_eq!((stats.present, stats.late, stats.attendance_pct), (2, 1, 100.0));
    }

    #[tokio::test]
    async fn window_closes_after_tolerance() {
        let school = testing::school().await;
        let session = open_session(&school.pool, school.teacher_id, &session_request(&school)).await.unwrap();
        assert!(is_open_for_marking(&session, at(8, 15)));
        assert!(!is_open_for_marking(&session, at(8, 16)));
        assert_eq!(minutes_left(&session, at(8, 5)), 10);
        assert_eq!(minutes_left(&session, at(9, 0)), 0);

        let check = check_attendance(&school.pool, session.id, school.student_id, LAT, LON, at(9, 0)).await.unwrap();
        assert!(!check.can_mark);

        let check = check_attendance(&school.pool, session.id, school.student_id, LAT, LON, at(8, 0)).await.unwrap();
        assert!(check.can_mark);
        assert_eq!(check.distance_m, Some(0.0));
        assert_eq!(check.minutes_left, Some(15));

        let mut strict = session.clone();
        strict.allow_late = false;
        assert!(!is_open_for_marking(&strict, at(8, 1)));
    }

    #[tokio::test]
    async fn close_syncs_attendance_evaluations() {
        let school = testing::school().await;
        let session = open_session(&school.pool, school.teacher_id, &session_request(&school)).await.unwrap();
        mark_attendance(&school.pool, session.id, school.student_id, &nearby(), at(8, 5)).await.unwrap();
        justify_absence(
            &school.pool,
            session.id,
            &JustifyAbsenceRequest { student_id: school.second_student_id, reason: "medical".to_string(), notes: None },
        )
        .await
        .unwrap();

        let result = close_session(&school.pool, session.id, at(9, 0)).await.unwrap();
        assert_eq!(result.session.status, "closed");
        assert_eq!(result.evaluations_created, 2);

        let ana = evaluations::find_on_date(
            &school.pool,
            school.student_id,
            school.subject_id,
            school.term_ids[0],
            school.attendance_type_id,
            date(2025, 3, 10),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(ana.score, 50.0);

        let err = close_session(&school.pool, session.id, at(9, 5)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        // Вторая сессия в тот же день обновляет, а не дублирует
        let second = open_session(&school.pool, school.teacher_id, &session_request(&school)).await.unwrap();
        let result = close_session(&school.pool, second.id, at(10, 0)).await.unwrap();
        assert_eq!((result.evaluations_created, result.evaluations_updated), (0, 2));
    }
}
