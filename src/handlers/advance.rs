use crate::{
    auth::AuthUser,
    errors::AppResult,
    handlers::{ApiResponse, AppJson, business_today},
    models::{
        AdvanceFilter, AdvanceListResponse, AdvanceResponse, DecisionRequest, PayAdvanceRequest,
        RequestAdvanceRequest,
    },
    services::advance,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Request a salary advance
#[utoipa::path(
    post,
    path = "/api/v1/advances",
    request_body = RequestAdvanceRequest,
    responses(
        (status = 201, description = "Advance requested", body = AdvanceResponse),
        (status = 400, description = "Amount not positive or above the cap"),
        (status = 404, description = "Employee not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn request_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<RequestAdvanceRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AdvanceResponse>>)> {
    let employee_id = auth.target(body.employee_id)?;
    let response = advance::request(
        &state.db,
        state.config.advance_cap_ratio,
        &auth.actor(),
        employee_id,
        body,
    )
    .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(response)))
}

/// List advances with aggregate statistics. Staff only see their own.
#[utoipa::path(
    get,
    path = "/api/v1/advances",
    params(AdvanceFilter),
    responses((status = 200, description = "Advances and stats", body = AdvanceListResponse)),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn list_advances(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(mut filter): Query<AdvanceFilter>,
) -> AppResult<Json<ApiResponse<AdvanceListResponse>>> {
    if !auth.is_admin() {
        filter.employee_id = Some(auth.target(filter.employee_id)?);
    }
    let response = advance::list(&state.db, &filter).await?;
    Ok(ApiResponse::ok(response))
}

/// Approve or reject a pending advance
#[utoipa::path(
    post,
    path = "/api/v1/advances/{advance_id}/decision",
    request_body = DecisionRequest,
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses(
        (status = 200, description = "Advance decided", body = AdvanceResponse),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Advance not found"),
        (status = 409, description = "Advance is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn decide_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
    AppJson(body): AppJson<DecisionRequest>,
) -> AppResult<Json<ApiResponse<AdvanceResponse>>> {
    auth.require_admin()?;
    let response = advance::decide(&state.db, &auth.actor(), advance_id, body.decision).await?;
    Ok(ApiResponse::ok(response))
}

/// Pay out an approved advance; it becomes a pending payroll deduction
#[utoipa::path(
    post,
    path = "/api/v1/advances/{advance_id}/pay",
    request_body = PayAdvanceRequest,
    params(("advance_id" = Uuid, Path, description = "Advance ID")),
    responses(
        (status = 200, description = "Advance paid", body = AdvanceResponse),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Advance is not approved"),
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn pay_advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(advance_id): Path<Uuid>,
    AppJson(body): AppJson<PayAdvanceRequest>,
) -> AppResult<Json<ApiResponse<AdvanceResponse>>> {
    auth.require_admin()?;
    let today = business_today(&state);
    let response = advance::pay(&state.db, &auth.actor(), advance_id, body, today).await?;
    Ok(ApiResponse::ok(response))
}
