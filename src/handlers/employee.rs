use crate::{
    auth::AuthUser,
    errors::AppResult,
    handlers::{ApiResponse, AppJson},
    models::{
        CreateEmployeeRequest, CreateLocationRequest, EmployeeListResponse, EmployeeResponse,
        LocationListResponse, LocationResponse, UpdateEmployeeRequest,
    },
    services::employee,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Register a new employee
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Invalid salary, hours or leave days"),
        (status = 403, description = "Administrator role required"),
        (status = 409, description = "Email already registered"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn create_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateEmployeeRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<EmployeeResponse>>)> {
    auth.require_admin()?;
    let created = employee::create(&state.db, &auth.actor(), body).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(EmployeeResponse {
            employee: employee::view(created),
        }),
    ))
}

/// List employees with their derived wage rates
#[utoipa::path(
    get,
    path = "/api/v1/employees",
    responses(
        (status = 200, description = "Employees", body = EmployeeListResponse),
        (status = 403, description = "Administrator role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn list_employees(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<EmployeeListResponse>>> {
    auth.require_admin()?;
    let employees = employee::list(&state.db)
        .await?
        .into_iter()
        .map(employee::view)
        .collect();

    Ok(ApiResponse::ok(EmployeeListResponse { employees }))
}

/// Get one employee. Staff may only read themselves.
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}",
    params(("employee_id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee detail", body = EmployeeResponse),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Employee not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn get_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    let employee_id = auth.target(Some(employee_id))?;
    let found = employee::find(&state.db, employee_id).await?;

    Ok(ApiResponse::ok(EmployeeResponse {
        employee: employee::view(found),
    }))
}

/// Update salary, hours, shift or status. Rates follow immediately.
#[utoipa::path(
    patch,
    path = "/api/v1/employees/{employee_id}",
    request_body = UpdateEmployeeRequest,
    params(("employee_id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Invalid salary or hours"),
        (status = 403, description = "Administrator role required"),
        (status = 404, description = "Employee not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Employees"
)]
pub async fn update_employee(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
    AppJson(body): AppJson<UpdateEmployeeRequest>,
) -> AppResult<Json<ApiResponse<EmployeeResponse>>> {
    auth.require_admin()?;
    let updated = employee::update(&state.db, &auth.actor(), employee_id, body).await?;

    Ok(ApiResponse::ok(EmployeeResponse {
        employee: employee::view(updated),
    }))
}

// ─── Locations ────────────────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/api/v1/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = LocationResponse),
        (status = 403, description = "Administrator role required"),
    ),
    security(("bearer_auth" = [])),
    tag = "Locations"
)]
pub async fn create_location(
    auth: AuthUser,
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateLocationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<LocationResponse>>)> {
    auth.require_admin()?;
    let location = employee::create_location(&state.db, &auth.actor(), body).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(LocationResponse { location })))
}

#[utoipa::path(
    get,
    path = "/api/v1/locations",
    responses((status = 200, description = "Locations", body = LocationListResponse)),
    security(("bearer_auth" = [])),
    tag = "Locations"
)]
pub async fn list_locations(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<LocationListResponse>>> {
    let locations = employee::list_locations(&state.db).await?;
    Ok(ApiResponse::ok(LocationListResponse { locations }))
}
