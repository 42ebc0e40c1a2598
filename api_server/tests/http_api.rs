//! Проверки HTTP-слоя: роутер поверх школы из фикстуры, запросы через `oneshot`.

use std::sync::Arc;

use api_server::{build_router, AppState};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use core_logic::config::Settings;
use core_logic::email::Mailer;
use core_logic::prediction::LinearModel;
use core_logic::testing::{self, School};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> (Router, School) {
    let school = testing::school().await;
    let settings = Settings::from_lookup(|_| None).unwrap();
    let state = AppState::new(school.pool.clone(), settings, Mailer::Disabled, Arc::new(LinearModel::default()));
    (build_router(state), school)
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn login(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": testing::PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed for {email}: {body}");
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn login_returns_token_and_profile() {
    let (app, school) = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": testing::TEACHER_EMAIL, "password": testing::PASSWORD })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user_type"], "teacher");
    assert_eq!(body["user_id"], school.teacher_id);

    let token = body["access_token"].as_str().unwrap();
    let (status, profile) = send(&app, Method::GET, "/auth/profile", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], school.teacher_id);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let (app, _school) = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": testing::ADMIN_EMAIL, "password": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn protected_routes_require_token() {
    let (app, _school) = app().await;
    let (status, _) = send(&app, Method::GET, "/students", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/students", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn student_cannot_use_admin_routes() {
    let (app, _school) = app().await;
    let token = login(&app, testing::STUDENT_EMAIL).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/subjects",
        Some(&token),
        Some(json!({ "name": "Chemistry", "description": "Labs" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/dashboard/admin", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn student_sees_only_own_record() {
    let (app, school) = app().await;
    let token = login(&app, testing::STUDENT_EMAIL).await;

    let (status, me) = send(&app, Method::GET, "/students/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], school.student_id);

    let uri = format!("/students/{}", school.second_student_id);
    let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn subject_crud_maps_errors_to_statuses() {
    let (app, _school) = app().await;
    let token = login(&app, testing::ADMIN_EMAIL).await;

    let (status, subject) = send(
        &app,
        Method::POST,
        "/subjects",
        Some(&token),
        Some(json!({ "name": "Chemistry", "description": "Labs" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = subject["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/subjects",
        Some(&token),
        Some(json!({ "name": "Chemistry", "description": "Again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::DELETE, &format!("/subjects/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, &format!("/subjects/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn score_outside_range_is_rejected() {
    let (app, school) = app().await;
    let token = login(&app, testing::TEACHER_EMAIL).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/evaluations",
        Some(&token),
        Some(json!({
            "date": "2025-03-10",
            "description": "Midterm",
            "score": 120.0,
            "student_id": school.student_id,
            "subject_id": school.subject_id,
            "evaluation_type_id": school.exam_type_id,
            "term_id": school.term_ids[0],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn low_grade_reaches_student_and_parent() {
    let (app, school) = app().await;
    let teacher = login(&app, testing::TEACHER_EMAIL).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/evaluations?parent_threshold=60",
        Some(&teacher),
        Some(json!({
            "date": "2025-03-10",
            "description": "Midterm",
            "score": 35.0,
            "student_id": school.student_id,
            "subject_id": school.subject_id,
            "evaluation_type_id": school.exam_type_id,
            "term_id": school.term_ids[0],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["notifications"]["parent_alert"], true);
    assert_eq!(body["notifications"]["student"].as_array().unwrap().len(), 1);
    assert_eq!(body["notifications"]["parents"].as_array().unwrap().len(), 1);

    let student = login(&app, testing::STUDENT_EMAIL).await;
    let (status, count) = send(&app, Method::GET, "/notifications/unread-count", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["unread"], 1);

    let parent = login(&app, testing::PARENT_EMAIL).await;
    let (status, inbox) = send(&app, Method::GET, "/notifications", Some(&parent), None).await;
    assert_eq!(status, StatusCode::OK);
    let inbox = inbox.as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["student_id"], school.student_id);

    let (status, marked) = send(&app, Method::PUT, "/notifications/read-all", Some(&parent), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["updated"], 1);

    // Персонал своих входящих не имеет
    let (status, _) = send(&app, Method::GET, "/notifications", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn parent_sees_linked_child_only() {
    let (app, school) = app().await;
    let token = login(&app, testing::PARENT_EMAIL).await;

    let (status, children) = send(&app, Method::GET, "/parents/me/children", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(children.as_array().unwrap().len(), 1);

    let uri = format!("/reports/academic/{}?school_year_id={}", school.second_student_id, school.school_year_id);
    let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn emailed_report_is_skipped_without_transport() {
    let (app, school) = app().await;
    let token = login(&app, testing::STUDENT_EMAIL).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/reports/email",
        Some(&token),
        Some(json!({ "student_id": school.student_id, "school_year_id": school.school_year_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let deliveries = body["deliveries"].as_array().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0]["to"], testing::STUDENT_EMAIL);
    assert_eq!(deliveries[0]["status"], "skipped");
}

#[tokio::test]
async fn geo_helpers_are_public_to_authenticated_users() {
    let (app, _school) = app().await;
    let token = login(&app, testing::STUDENT_EMAIL).await;

    let (status, presets) = send(&app, Method::GET, "/attendance/geo/presets", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!presets.as_array().unwrap().is_empty());

    let (status, area) = send(
        &app,
        Method::GET,
        "/attendance/geo/coverage?latitude=-17.78&longitude=-63.18&radius_m=50",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(area["outline"].as_array().unwrap().len(), 36);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _school) = app().await;
    let (status, doc) = send(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/evaluations"].is_object());
    assert!(doc["paths"]["/students/me/academic-info"].is_object());
    assert!(doc["paths"]["/predictions/course/{course_id}/subject/{subject_id}/analysis"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer"].is_object());
}

#[tokio::test]
async fn evaluation_summary_counts_each_type() {
    let (app, school) = app().await;
    school.evaluation(school.student_id, school.exam_type_id, 80.0).await;
    school.evaluation(school.student_id, school.exam_type_id, 90.0).await;
    school.evaluation(school.student_id, school.homework_type_id, 70.0).await;
    let token = login(&app, testing::STUDENT_EMAIL).await;

    let uri = format!("/evaluations/summary?student_id={}&term_id={}", school.student_id, school.term_ids[0]);
    let (status, rows) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{rows}");
    assert_eq!(
        rows,
        json!([
            { "evaluation_type_id": school.exam_type_id, "evaluation_type": "Exam", "count": 2, "average": 85.0 },
            { "evaluation_type_id": school.homework_type_id, "evaluation_type": "Homework", "count": 1, "average": 70.0 },
        ])
    );

    let uri = format!("/evaluations/summary?student_id={}&term_id={}", school.second_student_id, school.term_ids[0]);
    let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn teacher_dashboard_needs_current_school_year() {
    let (app, _school) = app().await;
    // Периоды фикстуры относятся к 2025 году
    let teacher = login(&app, testing::TEACHER_EMAIL).await;
    let (status, body) = send(&app, Method::GET, "/dashboard/teacher", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Current school year"));

    let admin = login(&app, testing::ADMIN_EMAIL).await;
    let (status, _) = send(&app, Method::GET, "/dashboard/teacher", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn student_reads_own_academic_info() {
    let (app, school) = app().await;
    let token = login(&app, testing::STUDENT_EMAIL).await;

    let (status, info) = send(&app, Method::GET, "/students/me/academic-info", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{info}");
    assert_eq!(info["student"]["id"], school.student_id);
    assert_eq!(info["course"]["name"], "1A");
    assert_eq!(info["subjects"][0]["teacher"]["email"], testing::TEACHER_EMAIL);

    let (status, summary) = send(&app, Method::GET, "/students/me/academic-summary", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_subjects"], 1);
    assert_eq!(summary["subjects_without_teacher"], 0);
    assert_eq!(summary["total_teachers"], 1);

    let uri = format!("/students/me/subjects/{}/teacher", school.subject_id);
    let (status, found) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["teacher"]["id"], school.teacher_id);
    let (status, _) = send(&app, Method::GET, "/students/me/subjects/9999/teacher", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, enrolled) = send(&app, Method::GET, "/students/me/enrollment-status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(enrolled["enrolled"], true);

    let teacher = login(&app, testing::TEACHER_EMAIL).await;
    let (status, _) = send(&app, Method::GET, "/students/me/course", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn prediction_analytics_by_role() {
    let (app, school) = app().await;
    let teacher = login(&app, testing::TEACHER_EMAIL).await;
    let admin = login(&app, testing::ADMIN_EMAIL).await;
    let term = school.term_ids[0];

    let uri = format!("/predictions/teacher/{}/subjects?term_id={term}", school.teacher_id);
    let (status, outlook) = send(&app, Method::GET, &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK, "{outlook}");
    assert_eq!(outlook["subjects"][0]["total_students"], 2);
    let uri = format!("/predictions/teacher/{}/subjects?term_id={term}", school.admin_id);
    let (status, _) = send(&app, Method::GET, &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/predictions/course/{}/subject/{}/analysis?term_id={term}", school.course_id, school.subject_id);
    let (status, analysis) = send(&app, Method::GET, &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK, "{analysis}");
    assert_eq!(analysis["total_students"], 2);
    assert_eq!(analysis["students"].as_array().unwrap().len(), 2);

    let uri = format!("/predictions/institutional-report?school_year_id={}&term_id={term}", school.school_year_id);
    let (status, _) = send(&app, Method::GET, &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, report) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["sample_size"], 2);

    let uri = format!("/predictions/recommendations/{}?subject_id={}&term_id={term}", school.student_id, school.subject_id);
    let (status, plan) = send(&app, Method::GET, &uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK, "{plan}");
    assert!(!plan["recommendations"].as_array().unwrap().is_empty());

    // Сегодня вне периодов фикстуры: список риска пуст
    let (status, overview) = send(&app, Method::GET, "/predictions/overview", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["at_risk_detected"], 0);
    assert_eq!(overview["model"]["name"], "LinearModel");

    let (status, stored) = send(&app, Method::GET, "/predictions", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(stored.as_array().unwrap().is_empty());

    let student = login(&app, testing::STUDENT_EMAIL).await;
    let (status, _) = send(&app, Method::GET, "/predictions/overview", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
