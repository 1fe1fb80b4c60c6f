// src/openapi.rs

use crate::models::{
    AdjustmentListResponse, AdjustmentResponse, AdjustmentStatus, AdjustmentType, AdvanceListResponse,
    AdvancePayment, AdvanceResponse, AdvanceStats, AdvanceStatus, AttendanceListResponse,
    AttendanceMethod, AttendanceRecord, AttendanceResponse, AttendanceStatus, AuditLog,
    AuditLogListResponse, CalculatePayrollRequest, ClockAction, ClockRequest, ClockResponse,
    CreateAdjustmentRequest, CreateEmployeeRequest, CreateLocationRequest,
    CreateTaxRateConfigRequest, Decision, DecisionRequest, DeductionStatus, Employee,
    EmployeeListResponse, EmployeeResponse, EmployeeView, EndLeaveRequest, LeaveListResponse,
    LeaveRecord, LeaveResponse, LeaveStatus, LeaveType, Location, LocationListResponse,
    LocationResponse, Notification, NotificationListResponse, PayAdvanceRequest, Payroll,
    PayrollAction, PayrollDecisionRequest, PayrollListResponse, PayrollResponse, PayrollStatus,
    RequestAdvanceRequest, Role, SalaryAdjustment, StartLeaveRequest, TaxRateConfig,
    TaxRateResponse, UpdateEmployeeRequest, UpdateLeaveAllowanceRequest, WageRates,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance & Payroll API",
        version = "0.1.0",
        description = "Turns clock-in/clock-out events into pay. Daily earnings with overtime \
            and lateness rules, leave balances, salary advances, approved adjustments and \
            monthly payroll runs with configurable deduction rates. Every success response is \
            `{ success: true, ...payload }`; every error is `{ success: false, error, kind }`.",
        license(name = "MIT")
    ),
    paths(
        crate::handlers::general::health_handler,
        // Employees & locations
        crate::handlers::employee::create_employee,
        crate::handlers::employee::list_employees,
        crate::handlers::employee::get_employee,
        crate::handlers::employee::update_employee,
        crate::handlers::employee::create_location,
        crate::handlers::employee::list_locations,
        // Attendance
        crate::handlers::attendance::clock,
        crate::handlers::attendance::list_attendance,
        crate::handlers::attendance::open_attendance,
        crate::handlers::attendance::get_attendance,
        // Leave
        crate::handlers::leave::start_leave,
        crate::handlers::leave::end_leave,
        crate::handlers::leave::list_leave,
        crate::handlers::leave::update_allowance,
        // Advances
        crate::handlers::advance::request_advance,
        crate::handlers::advance::list_advances,
        crate::handlers::advance::decide_advance,
        crate::handlers::advance::pay_advance,
        // Adjustments
        crate::handlers::adjustment::create_adjustment,
        crate::handlers::adjustment::list_adjustments,
        crate::handlers::adjustment::decide_adjustment,
        // Payroll & tax rates
        crate::handlers::payroll::calculate_payroll,
        crate::handlers::payroll::list_payrolls,
        crate::handlers::payroll::get_payroll,
        crate::handlers::payroll::decide_payroll,
        crate::handlers::payroll::create_tax_rates,
        crate::handlers::payroll::current_tax_rates,
        // Notifications & audit
        crate::handlers::notification::list_notifications,
        crate::handlers::audit::list_audit_logs,
    ),
    components(
        schemas(
            Role, Location, CreateLocationRequest, LocationResponse, LocationListResponse,
            Employee, WageRates, EmployeeView, CreateEmployeeRequest, UpdateEmployeeRequest,
            EmployeeResponse, EmployeeListResponse,
            AttendanceStatus, AttendanceMethod, ClockAction, AttendanceRecord, ClockRequest,
            ClockResponse, AttendanceResponse, AttendanceListResponse,
            LeaveType, LeaveStatus, LeaveRecord, StartLeaveRequest, EndLeaveRequest,
            UpdateLeaveAllowanceRequest, LeaveResponse, LeaveListResponse,
            Decision, DecisionRequest,
            AdvanceStatus, DeductionStatus, AdvancePayment, RequestAdvanceRequest,
            PayAdvanceRequest, AdvanceStats, AdvanceResponse, AdvanceListResponse,
            AdjustmentType, AdjustmentStatus, SalaryAdjustment, CreateAdjustmentRequest,
            AdjustmentResponse, AdjustmentListResponse,
            TaxRateConfig, CreateTaxRateConfigRequest, TaxRateResponse,
            PayrollStatus, PayrollAction, Payroll, CalculatePayrollRequest,
            PayrollDecisionRequest, PayrollResponse, PayrollListResponse,
            Notification, NotificationListResponse, AuditLog, AuditLogListResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Employees", description = "Employee registry with derived wage rates"),
        (name = "Locations", description = "Places where staff clock in"),
        (name = "Attendance", description = "Clock events and daily earnings"),
        (name = "Leave", description = "Leave spans and balances"),
        (name = "Advances", description = "Salary advances and their payroll deduction"),
        (name = "Adjustments", description = "Bonuses, penalties, refunds and corrections"),
        (name = "Payroll", description = "Monthly payroll calculation and approval"),
        (name = "Tax Rates", description = "Versioned deduction percentages"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Audit", description = "Audit trail of every change"),
        (name = "Health", description = "Liveness and database connectivity"),
    )
)]
pub struct ApiDoc;
