pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::routes::{
    analytics, assignments, attendance, auth as auth_routes, catalog, dashboard, evaluations, grades, notifications,
    people, predictions, reports, student_info,
};
pub use crate::state::AppState;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Aula API", description = "School management and academic performance service"),
    modifiers(&BearerAuth),
    paths(
        auth_routes::login,
        auth_routes::profile,
        people::create_student,
        people::list_students,
        people::current_student,
        student_info::academic_info,
        student_info::course,
        student_info::subjects,
        student_info::teachers,
        student_info::summary,
        student_info::subject_teacher,
        student_info::enrollment_status,
        people::get_student,
        people::update_student,
        people::delete_student,
        people::student_parents,
        people::upload_student_image,
        people::create_teacher,
        people::list_teachers,
        people::current_teacher,
        people::get_teacher,
        people::update_teacher,
        people::delete_teacher,
        people::teacher_subjects,
        people::teacher_courses,
        people::teacher_students,
        people::create_parent,
        people::list_parents,
        people::current_parent,
        people::my_children,
        people::get_parent,
        people::update_parent,
        people::delete_parent,
        people::parent_children,
        people::link_child,
        people::unlink_child,
        catalog::create_subject,
        catalog::list_subjects,
        catalog::get_subject,
        catalog::update_subject,
        catalog::delete_subject,
        catalog::create_course,
        catalog::list_courses,
        catalog::get_course,
        catalog::update_course,
        catalog::delete_course,
        catalog::course_subjects,
        catalog::create_school_year,
        catalog::list_school_years,
        catalog::current_school_year,
        catalog::get_school_year,
        catalog::update_school_year,
        catalog::delete_school_year,
        catalog::create_term,
        catalog::list_terms,
        catalog::term_for_date,
        catalog::get_term,
        catalog::update_term,
        catalog::delete_term,
        catalog::create_evaluation_type,
        catalog::list_evaluation_types,
        catalog::get_evaluation_type,
        catalog::update_evaluation_type,
        catalog::delete_evaluation_type,
        assignments::create_enrollment,
        assignments::list_enrollments,
        assignments::get_enrollment,
        assignments::update_enrollment,
        assignments::delete_enrollment,
        assignments::create_course_subject,
        assignments::list_course_subjects,
        assignments::get_course_subject,
        assignments::update_course_subject,
        assignments::delete_course_subject,
        assignments::create_teacher_subject,
        assignments::list_teacher_subjects,
        assignments::delete_teacher_subject,
        assignments::subject_teachers,
        assignments::create_weight,
        assignments::list_weights,
        assignments::get_weight,
        assignments::update_weight,
        assignments::delete_weight,
        evaluations::create_evaluation,
        evaluations::register_evaluation,
        evaluations::list_evaluations,
        evaluations::summary,
        evaluations::get_evaluation,
        evaluations::update_evaluation,
        evaluations::delete_evaluation,
        grades::compute,
        grades::compute_all,
        grades::compute_all_terms,
        grades::course_report,
        grades::create_final_grade,
        grades::list_final_grades,
        grades::get_final_grade,
        grades::update_final_grade,
        grades::delete_final_grade,
        attendance::open_session,
        attendance::my_sessions,
        attendance::session_detail,
        attendance::update_session,
        attendance::close_session,
        attendance::justify_absence,
        attendance::mark_attendance,
        attendance::check_attendance,
        attendance::student_active_sessions,
        attendance::student_records,
        attendance::all_sessions,
        attendance::global_stats,
        attendance::presets,
        attendance::recommended_radius,
        attendance::coverage,
        attendance::validate_teacher_location,
        attendance::validate_student_location,
        notifications::inbox,
        notifications::unread_count,
        notifications::stats,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        notifications::send_to_student,
        notifications::send_to_parents,
        predictions::predict,
        predictions::predict_student,
        predictions::predict_course,
        predictions::at_risk,
        predictions::stored,
        predictions::model_info,
        analytics::teacher_subjects,
        analytics::course_analysis,
        analytics::institutional_report,
        analytics::overview,
        analytics::recommendations,
        dashboard::admin,
        dashboard::teacher,
        dashboard::subject_summary,
        reports::academic_report,
        reports::email_report,
    ),
    components(schemas(core_logic::ErrorResponse, core_logic::ApiResponse))
)]
pub struct ApiDoc;

async fn health() -> &'static str {
    "ok"
}

pub fn build_router(state: AppState) -> Router {
    let people_routes = Router::new()
        .route("/students", post(people::create_student).get(people::list_students))
        .route("/students/me", get(people::current_student))
        .route("/students/me/academic-info", get(student_info::academic_info))
        .route("/students/me/course", get(student_info::course))
        .route("/students/me/subjects", get(student_info::subjects))
        .route("/students/me/teachers", get(student_info::teachers))
        .route("/students/me/academic-summary", get(student_info::summary))
        .route("/students/me/subjects/{subject_id}/teacher", get(student_info::subject_teacher))
        .route("/students/me/enrollment-status", get(student_info::enrollment_status))
        .route(
            "/students/{id}",
            get(people::get_student).put(people::update_student).delete(people::delete_student),
        )
        .route("/students/{id}/parents", get(people::student_parents))
        .route("/students/{id}/image", post(people::upload_student_image))
        .route("/teachers", post(people::create_teacher).get(people::list_teachers))
        .route("/teachers/me", get(people::current_teacher))
        .route(
            "/teachers/{id}",
            get(people::get_teacher).put(people::update_teacher).delete(people::delete_teacher),
        )
        .route("/teachers/{id}/subjects", get(people::teacher_subjects))
        .route("/teachers/{id}/courses", get(people::teacher_courses))
        .route("/teachers/{id}/students", get(people::teacher_students))
        .route("/parents", post(people::create_parent).get(people::list_parents))
        .route("/parents/me", get(people::current_parent))
        .route("/parents/me/children", get(people::my_children))
        .route(
            "/parents/{id}",
            get(people::get_parent).put(people::update_parent).delete(people::delete_parent),
        )
        .route("/parents/{id}/children", get(people::parent_children))
        .route(
            "/parents/{id}/children/{student_id}",
            post(people::link_child).delete(people::unlink_child),
        );

    let catalog_routes = Router::new()
        .route("/subjects", post(catalog::create_subject).get(catalog::list_subjects))
        .route(
            "/subjects/{id}",
            get(catalog::get_subject).put(catalog::update_subject).delete(catalog::delete_subject),
        )
        .route("/subjects/{id}/teachers", get(assignments::subject_teachers))
        .route("/courses", post(catalog::create_course).get(catalog::list_courses))
        .route(
            "/courses/{id}",
            get(catalog::get_course).put(catalog::update_course).delete(catalog::delete_course),
        )
        .route("/courses/{id}/subjects", get(catalog::course_subjects))
        .route("/school-years", post(catalog::create_school_year).get(catalog::list_school_years))
        .route("/school-years/current", get(catalog::current_school_year))
        .route(
            "/school-years/{id}",
            get(catalog::get_school_year)
                .put(catalog::update_school_year)
                .delete(catalog::delete_school_year),
        )
        .route("/terms", post(catalog::create_term).get(catalog::list_terms))
        .route("/terms/for-date", get(catalog::term_for_date))
        .route(
            "/terms/{id}",
            get(catalog::get_term).put(catalog::update_term).delete(catalog::delete_term),
        )
        .route(
            "/evaluation-types",
            post(catalog::create_evaluation_type).get(catalog::list_evaluation_types),
        )
        .route(
            "/evaluation-types/{id}",
            get(catalog::get_evaluation_type)
                .put(catalog::update_evaluation_type)
                .delete(catalog::delete_evaluation_type),
        );

    let assignment_routes = Router::new()
        .route("/enrollments", post(assignments::create_enrollment).get(assignments::list_enrollments))
        .route(
            "/enrollments/{id}",
            get(assignments::get_enrollment)
                .put(assignments::update_enrollment)
                .delete(assignments::delete_enrollment),
        )
        .route(
            "/course-subjects",
            post(assignments::create_course_subject).get(assignments::list_course_subjects),
        )
        .route(
            "/course-subjects/{id}",
            get(assignments::get_course_subject)
                .put(assignments::update_course_subject)
                .delete(assignments::delete_course_subject),
        )
        .route(
            "/teacher-subjects",
            post(assignments::create_teacher_subject).get(assignments::list_teacher_subjects),
        )
        .route("/teacher-subjects/{id}", delete(assignments::delete_teacher_subject))
        .route("/weights", post(assignments::create_weight).get(assignments::list_weights))
        .route(
            "/weights/{id}",
            get(assignments::get_weight).put(assignments::update_weight).delete(assignments::delete_weight),
        );

    let grading_routes = Router::new()
        .route("/evaluations", post(evaluations::create_evaluation).get(evaluations::list_evaluations))
        .route("/evaluations/summary", get(evaluations::summary))
        .route("/evaluations/register/{kind}", post(evaluations::register_evaluation))
        .route(
            "/evaluations/{id}",
            get(evaluations::get_evaluation)
                .put(evaluations::update_evaluation)
                .delete(evaluations::delete_evaluation),
        )
        .route("/final-grades", post(grades::create_final_grade).get(grades::list_final_grades))
        .route("/final-grades/compute", post(grades::compute))
        .route("/final-grades/compute-all", post(grades::compute_all))
        .route("/final-grades/compute-all-terms", post(grades::compute_all_terms))
        .route(
            "/final-grades/course/{course_id}/school-year/{school_year_id}",
            get(grades::course_report),
        )
        .route(
            "/final-grades/{id}",
            get(grades::get_final_grade)
                .put(grades::update_final_grade)
                .delete(grades::delete_final_grade),
        );

    let attendance_routes = Router::new()
        .route("/attendance/sessions", post(attendance::open_session).get(attendance::my_sessions))
        .route(
            "/attendance/sessions/{id}",
            get(attendance::session_detail).put(attendance::update_session),
        )
        .route("/attendance/sessions/{id}/close", post(attendance::close_session))
        .route("/attendance/sessions/{id}/justify", post(attendance::justify_absence))
        .route("/attendance/sessions/{id}/mark", post(attendance::mark_attendance))
        .route("/attendance/sessions/{id}/check", get(attendance::check_attendance))
        .route("/attendance/student/active-sessions", get(attendance::student_active_sessions))
        .route("/attendance/student/records", get(attendance::student_records))
        .route("/attendance/admin/sessions", get(attendance::all_sessions))
        .route("/attendance/admin/stats", get(attendance::global_stats))
        .route("/attendance/geo/presets", get(attendance::presets))
        .route("/attendance/geo/recommended-radius", get(attendance::recommended_radius))
        .route("/attendance/geo/coverage", get(attendance::coverage))
        .route("/attendance/geo/validate-teacher-location", post(attendance::validate_teacher_location))
        .route("/attendance/geo/validate-student-location", post(attendance::validate_student_location));

    let notification_routes = Router::new()
        .route("/notifications", get(notifications::inbox))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/stats", get(notifications::stats))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete_notification))
        .route("/notifications/student", post(notifications::send_to_student))
        .route("/notifications/parents", post(notifications::send_to_parents));

    let insight_routes = Router::new()
        .route("/predictions", get(predictions::stored))
        .route("/predictions/predict", post(predictions::predict))
        .route("/predictions/student", post(predictions::predict_student))
        .route("/predictions/course", post(predictions::predict_course))
        .route("/predictions/at-risk", get(predictions::at_risk))
        .route("/predictions/model-info", get(predictions::model_info))
        .route("/predictions/overview", get(analytics::overview))
        .route("/predictions/institutional-report", get(analytics::institutional_report))
        .route("/predictions/teacher/{teacher_id}/subjects", get(analytics::teacher_subjects))
        .route(
            "/predictions/course/{course_id}/subject/{subject_id}/analysis",
            get(analytics::course_analysis),
        )
        .route("/predictions/recommendations/{student_id}", get(analytics::recommendations))
        .route("/dashboard/admin", get(dashboard::admin))
        .route("/dashboard/teacher", get(dashboard::teacher))
        .route("/dashboard/subject-summary", get(dashboard::subject_summary))
        .route("/reports/academic/{student_id}", get(reports::academic_report))
        .route("/reports/email", post(reports::email_report));

    Router::new()
        .route("/", get(health))
        .route("/auth/login", post(auth_routes::login))
        .route("/auth/profile", get(auth_routes::profile))
        .merge(people_routes)
        .merge(catalog_routes)
        .merge(assignment_routes)
        .merge(grading_routes)
        .merge(attendance_routes)
        .merge(notification_routes)
        .merge(insight_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
