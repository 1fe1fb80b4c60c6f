use crate::{
    auth::AuthUser,
    errors::{AppError, AppResult},
    handlers::{ApiResponse, AppJson},
    models::{
        AttendanceFilter, AttendanceListResponse, AttendanceMethod, AttendanceResponse,
        ClockRequest, ClockResponse,
    },
    services::attendance,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use uuid::Uuid;

/// Check in or out at a location
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock",
    request_body = ClockRequest,
    responses(
        (status = 200, description = "Clock event recorded", body = ClockResponse),
        (status = 400, description = "Inactive employee or location"),
        (status = 404, description = "Employee or location not found"),
        (status = 409, description = "Already checked in, or nothing to check out"),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<ClockRequest>,
) -> AppResult<Json<ApiResponse<ClockResponse>>> {
    let employee_id = auth.target(body.employee_id)?;

    let response = attendance::clock(
        &state.db,
        &state.config.attendance,
        &auth.actor(),
        employee_id,
        body.location_id,
        body.action,
        body.method.unwrap_or(AttendanceMethod::Qr),
        Utc::now(),
    )
    .await?;

    Ok(ApiResponse::ok(response))
}

/// List attendance records. Staff only see their own.
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceFilter),
    responses((status = 200, description = "Attendance records", body = AttendanceListResponse)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(mut filter): Query<AttendanceFilter>,
) -> AppResult<Json<ApiResponse<AttendanceListResponse>>> {
    if !auth.is_admin() {
        filter.employee_id = Some(auth.target(filter.employee_id)?);
    }
    let records = attendance::list(&state.db, state.config.attendance.utc_offset, &filter).await?;
    Ok(ApiResponse::ok(AttendanceListResponse { records }))
}

/// The caller's open attendance record, if any
#[utoipa::path(
    get,
    path = "/api/v1/attendance/open",
    responses((status = 200, description = "Open record or null", body = AttendanceResponse)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn open_attendance(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<AttendanceResponse>>> {
    let attendance = attendance::current_open(&state.db, auth.employee_id).await?;
    Ok(ApiResponse::ok(AttendanceResponse { attendance }))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/{attendance_id}",
    params(("attendance_id" = Uuid, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceResponse),
        (status = 404, description = "Record not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(attendance_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<AttendanceResponse>>> {
    let record = attendance::get(&state.db, attendance_id).await?;
    if !auth.is_admin() && record.employee_id != auth.employee_id {
        // Indistinguishable from a missing record for other staff
        return Err(AppError::NotFound(format!(
            "Attendance record {} not found",
            attendance_id
        )));
    }
    Ok(ApiResponse::ok(AttendanceResponse {
        attendance: Some(record),
    }))
}
