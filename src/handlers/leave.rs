use crate::{
    auth::AuthUser,
    errors::AppResult,
    handlers::{ApiResponse, AppJson, business_today},
    models::{
        EndLeaveRequest, LeaveListResponse, LeaveResponse, StartLeaveRequest,
        UpdateLeaveAllowanceRequest,
    },
    services::leave,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

/// Start a leave span, consuming balance
#[utoipa::path(
    post,
    path = "/api/v1/leave/start",
    request_body = StartLeaveRequest,
    responses(
        (status = 200, description = "Leave started", body = LeaveResponse),
        (status = 400, description = "End date before start date"),
        (status = 409, description = "Already on leave or overlapping leave"),
        (status = 422, description = "Insufficient leave balance"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn start_leave(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<StartLeaveRequest>,
) -> AppResult<Json<ApiResponse<LeaveResponse>>> {
    let employee_id = auth.target(body.employee_id)?;
    let today = business_today(&state);
    let response = leave::start_leave(&state.db, &auth.actor(), employee_id, body, today).await?;
    Ok(ApiResponse::ok(response))
}

/// End the current leave span and refund unused days
#[utoipa::path(
    post,
    path = "/api/v1/leave/end",
    request_body = EndLeaveRequest,
    responses(
        (status = 200, description = "Leave ended", body = LeaveResponse),
        (status = 422, description = "Employee is not on leave"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn end_leave(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<EndLeaveRequest>,
) -> AppResult<Json<ApiResponse<LeaveResponse>>> {
    let employee_id = auth.target(body.employee_id)?;
    let today = business_today(&state);
    let response = leave::end_leave(&state.db, &auth.actor(), employee_id, today).await?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}/leave",
    params(("employee_id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Leave history and balance", body = LeaveListResponse),
        (status = 404, description = "Employee not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leave(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LeaveListResponse>>> {
    let employee_id = auth.target(Some(employee_id))?;
    let response = leave::list(&state.db, employee_id).await?;
    Ok(ApiResponse::ok(response))
}

/// Override the monthly allotment and optionally the remaining balance
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}/leave-allowance",
    request_body = UpdateLeaveAllowanceRequest,
    params(("employee_id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Allowance updated", body = LeaveResponse),
        (status = 400, description = "Negative day counts"),
        (status = 403, description = "Administrator role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_allowance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
    AppJson(body): AppJson<UpdateLeaveAllowanceRequest>,
) -> AppResult<Json<ApiResponse<LeaveResponse>>> {
    auth.require_admin()?;
    let response = leave::update_allowance(&state.db, &auth.actor(), employee_id, body).await?;
    Ok(ApiResponse::ok(response))
}
