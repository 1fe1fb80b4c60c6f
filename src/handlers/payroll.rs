use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    handlers::{ApiResponse, AppJson, business_today},
    models::{
        CalculatePayrollRequest, CreateTaxRateConfigRequest, PayrollDecisionRequest,
        PayrollFilter, PayrollListResponse, PayrollResponse, TaxRateResponse,
    },
    services::payroll::{self, PayrollContext},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Calculate (or recalculate) one employee's payroll for a month
#[utoipa::path(
    post,
    path = "/api/v1/payroll/calculate",
    request_body = CalculatePayrollRequest,
    responses(
        (status = 200, description = "Payroll calculated", body = PayrollResponse),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Payroll for this period is already paid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn calculate_payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<CalculatePayrollRequest>,
) -> AppResult<Json<ApiResponse<PayrollResponse>>> {
    auth.require_admin()?;

    let ctx = PayrollContext {
        offset: state.config.attendance.utc_offset,
        overtime_multiplier: state.config.attendance.overtime_multiplier,
        work_days: state.work_days.as_ref(),
    };
    let payroll = payroll::calculate(&state.db, &ctx, &auth.actor(), body).await?;

    Ok(ApiResponse::ok(PayrollResponse { payroll }))
}

/// List payrolls. Staff only see their own.
#[utoipa::path(
    get,
    path = "/api/v1/payroll",
    params(PayrollFilter),
    responses((status = 200, description = "Payrolls", body = PayrollListResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(mut filter): Query<PayrollFilter>,
) -> AppResult<Json<ApiResponse<PayrollListResponse>>> {
    if !auth.is_admin() {
        filter.employee_id = Some(auth.target(filter.employee_id)?);
    }
    let payrolls = payroll::list(&state.db, &filter).await?;
    Ok(ApiResponse::ok(PayrollListResponse { payrolls }))
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll/{payroll_id}",
    params(("payroll_id" = Uuid, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll detail", body = PayrollResponse),
        (status = 404, description = "Payroll not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PayrollResponse>>> {
    let payroll = payroll::get(&state.db, payroll_id).await?;
    if !auth.is_admin() && payroll.employee_id != auth.employee_id {
        return Err(AppError::NotFound(format!("Payroll {} not found", payroll_id)));
    }
    Ok(ApiResponse::ok(PayrollResponse { payroll }))
}

/// Approve, pay or cancel a payroll
#[utoipa::path(
    post,
    path = "/api/v1/payroll/{payroll_id}/decision",
    request_body = PayrollDecisionRequest,
    params(("payroll_id" = Uuid, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll updated", body = PayrollResponse),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Transition not allowed from the current status"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn decide_payroll(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(payroll_id): Path<Uuid>,
    AppJson(body): AppJson<PayrollDecisionRequest>,
) -> AppResult<Json<ApiResponse<PayrollResponse>>> {
    auth.require_admin()?;
    let today = business_today(&state);
    let payroll = payroll::decide(
        &state.db,
        state.notifier.as_ref(),
        &auth.actor(),
        payroll_id,
        body,
        today,
    )
    .await?;
    Ok(ApiResponse::ok(PayrollResponse { payroll }))
}

// ─── Tax Rates ────────────────────────────────────────────────────────────────

/// Publish a new tax-rate version
#[utoipa::path(
    post,
    path = "/api/v1/tax-rates",
    request_body = CreateTaxRateConfigRequest,
    responses(
        (status = 201, description = "Tax rates published", body = TaxRateResponse),
        (status = 400, description = "Rates outside 0-100 or inverted date range"),
        (status = 403, description = "Administrator role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tax Rates"
)]
pub async fn create_tax_rates(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateTaxRateConfigRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<TaxRateResponse>>)> {
    auth.require_admin()?;
    let config = payroll::create_tax_rates(&state.db, &auth.actor(), body).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(TaxRateResponse {
            tax_rates: Some(config),
        }),
    ))
}

/// Tax rates in effect today
#[utoipa::path(
    get,
    path = "/api/v1/tax-rates/current",
    responses((status = 200, description = "Current version or null", body = TaxRateResponse)),
    security(("bearer_auth" = [])),
    tag = "Tax Rates"
)]
pub async fn current_tax_rates(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<TaxRateResponse>>> {
    let tax_rates = payroll::effective_tax_rates(&state.db, business_today(&state)).await?;
    Ok(ApiResponse::ok(TaxRateResponse { tax_rates }))
}
