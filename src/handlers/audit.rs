use crate::{
    auth::AuthUser,
    errors::AppResult,
    handlers::ApiResponse,
    models::{AuditFilter, AuditLogListResponse},
    services::audit,
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
};

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(AuditFilter),
    responses(
        (status = 200, description = "Audit entries, newest first", body = AuditLogListResponse),
        (status = 403, description = "Administrator role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "Audit"
)]
pub async fn list_audit_logs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> AppResult<Json<ApiResponse<AuditLogListResponse>>> {
    auth.require_admin()?;
    let logs = audit::list(&state.db, &filter).await?;
    Ok(ApiResponse::ok(AuditLogListResponse { logs }))
}
