use crate::{
    auth::AuthUser, errors::AppResult, handlers::ApiResponse, models::NotificationListResponse,
    services::notification, state::AppState,
};
use axum::{Json, extract::State};

/// The caller's most recent in-app notifications
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    responses((status = 200, description = "Notifications", body = NotificationListResponse)),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<NotificationListResponse>>> {
    let notifications = notification::list_for(&state.db, auth.employee_id).await?;
    Ok(ApiResponse::ok(NotificationListResponse { notifications }))
}
