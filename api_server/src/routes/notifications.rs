//! Входящие уведомления студентов и родителей, прямые рассылки от персонала.

use axum::extract::{Path, Query, State};
use axum::Json;
use core_logic::auth::UserType;
use core_logic::db::notifications as db;
use core_logic::models::{
    require_non_blank, DirectNotificationRequest, Notification, NotificationStats, NotificationView, Recipient,
};
use core_logic::{notifications, ApiResponse, ErrorResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{created, deleted, Created};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const INBOX_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkedRead {
    pub updated: u64,
}

fn recipient(user: &AuthUser) -> ApiResult<Recipient> {
    match user.user_type {
        UserType::Student => Ok(Recipient::Student(user.id)),
        UserType::Parent => Ok(Recipient::Parent(user.id)),
        UserType::Admin | UserType::Teacher => {
            Err(ApiError::forbidden("notifications are available to students and parents"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(InboxQuery),
    responses((status = 200, description = "Own notifications, newest first", body = Vec<NotificationView>)),
    security(("bearer" = []))
)]
pub async fn inbox(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Vec<NotificationView>>> {
    let recipient = recipient(&user)?;
    let limit = query.limit.unwrap_or(INBOX_LIMIT).clamp(1, 500);
    Ok(Json(db::list_for_recipient(&state.pool, recipient, query.unread_only, limit).await?))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    tag = "notifications",
    responses((status = 200, description = "Unread notifications", body = UnreadCount)),
    security(("bearer" = []))
)]
pub async fn unread_count(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UnreadCount>> {
    let recipient = recipient(&user)?;
    Ok(Json(UnreadCount { unread: db::unread_count(&state.pool, recipient).await? }))
}

#[utoipa::path(
    get,
    path = "/notifications/stats",
    tag = "notifications",
    responses((status = 200, description = "Totals by kind", body = NotificationStats)),
    security(("bearer" = []))
)]
pub async fn stats(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<NotificationStats>> {
    let recipient = recipient(&user)?;
    Ok(Json(db::stats(&state.pool, recipient).await?))
}

#[utoipa::path(
    put,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read", body = ApiResponse),
        (status = 404, description = "Not found in own inbox", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    let recipient = recipient(&user)?;
    if db::mark_read(&state.pool, recipient, id).await? {
        Ok(Json(ApiResponse::ok("Notification marked as read")))
    } else {
        Err(ApiError::not_found("Notification"))
    }
}

#[utoipa::path(
    put,
    path = "/notifications/read-all",
    tag = "notifications",
    responses((status = 200, description = "Number of notifications marked", body = MarkedRead)),
    security(("bearer" = []))
)]
pub async fn mark_all_read(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<MarkedRead>> {
    let recipient = recipient(&user)?;
    Ok(Json(MarkedRead { updated: db::mark_all_read(&state.pool, recipient).await? }))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    params(("id" = i64, Path, description = "Notification id")),
    responses((status = 200, description = "Notification deleted", body = ApiResponse)),
    security(("bearer" = []))
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse>> {
    let recipient = recipient(&user)?;
    deleted(db::delete_for_recipient(&state.pool, recipient, id).await?, "Notification")
}

#[utoipa::path(
    post,
    path = "/notifications/student",
    tag = "notifications",
    request_body = DirectNotificationRequest,
    responses((status = 201, description = "Notification sent to the student", body = Notification)),
    security(("bearer" = []))
)]
pub async fn send_to_student(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DirectNotificationRequest>,
) -> ApiResult<Created<Notification>> {
    user.staff()?;
    require_non_blank(&[("title", req.title.as_str()), ("message", req.message.as_str())])?;
    let notification =
        notifications::notify_student(&state.pool, req.student_id, &req.title, &req.message, req.kind.as_deref())
            .await?;
    Ok(created(notification))
}

#[utoipa::path(
    post,
    path = "/notifications/parents",
    tag = "notifications",
    request_body = DirectNotificationRequest,
    responses((status = 201, description = "One notification per linked parent", body = Vec<Notification>)),
    security(("bearer" = []))
)]
pub async fn send_to_parents(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DirectNotificationRequest>,
) -> ApiResult<Created<Vec<Notification>>> {
    user.staff()?;
    require_non_blank(&[("title", req.title.as_str()), ("message", req.message.as_str())])?;
    let sent =
        notifications::notify_parents(&state.pool, req.student_id, &req.title, &req.message, req.kind.as_deref())
            .await?;
    Ok(created(sent))
}
