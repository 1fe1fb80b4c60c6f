use crate::{
    auth::AuthUser,
    errors::AppResult,
    handlers::{ApiResponse, AppJson},
    models::{
        AdjustmentFilter, AdjustmentListResponse, AdjustmentResponse, CreateAdjustmentRequest,
        DecisionRequest,
    },
    services::adjustment,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Record a bonus, penalty, refund or correction
#[utoipa::path(
    post,
    path = "/api/v1/adjustments",
    request_body = CreateAdjustmentRequest,
    responses(
        (status = 201, description = "Adjustment created", body = AdjustmentResponse),
        (status = 400, description = "Non-positive amount or foreign attendance record"),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Employee or attendance record not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Adjustments"
)]
pub async fn create_adjustment(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateAdjustmentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AdjustmentResponse>>)> {
    auth.require_admin()?;
    let response = adjustment::create(&state.db, &auth.actor(), body).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/adjustments",
    params(AdjustmentFilter),
    responses(
        (status = 200, description = "Adjustments", body = AdjustmentListResponse),
        (status = 403, description = "Administrator role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "Adjustments"
)]
pub async fn list_adjustments(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<AdjustmentFilter>,
) -> AppResult<Json<ApiResponse<AdjustmentListResponse>>> {
    auth.require_admin()?;
    let response = adjustment::list(&state.db, &filter).await?;
    Ok(ApiResponse::ok(response))
}

/// Approve or reject a pending adjustment
#[utoipa::path(
    post,
    path = "/api/v1/adjustments/{adjustment_id}/decision",
    request_body = DecisionRequest,
    params(("adjustment_id" = Uuid, Path, description = "Adjustment ID")),
    responses(
        (status = 200, description = "Adjustment decided", body = AdjustmentResponse),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Adjustment not found"),
        (status = 409, description = "Adjustment already decided"),
    ),
    security(("bearer_auth" = [])),
    tag = "Adjustments"
)]
pub async fn decide_adjustment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(adjustment_id): Path<Uuid>,
    AppJson(body): AppJson<DecisionRequest>,
) -> AppResult<Json<ApiResponse<AdjustmentResponse>>> {
    auth.require_admin()?;
    let response =
        adjustment::decide(&state.db, &auth.actor(), adjustment_id, body.decision).await?;
    Ok(ApiResponse::ok(response))
}
