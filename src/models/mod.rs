// src/models/mod.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ─── Identity ─────────────────────────────────────────────────────────────────

// sqlx 0.8: custom Postgres enums need #[sqlx(type_name = "...")] on the enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "employee_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
}

/// Claims carried by the externally issued bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

// ─── Locations ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLocationRequest {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationResponse {
    pub location: Location,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationListResponse {
    pub locations: Vec<Location>,
}

// ─── Employee ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub monthly_salary: Decimal,
    /// Standard daily work hours, default 8
    pub standard_hours: Decimal,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub location_id: Option<Uuid>,
    pub is_active: bool,
    pub monthly_leave_days: i32,
    pub remaining_leave_days: i32,
    pub on_leave: bool,
    pub leave_start: Option<NaiveDate>,
    pub leave_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pay rates derived from monthly salary and standard hours. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct WageRates {
    pub daily_wage: Decimal,
    pub hourly_wage: Decimal,
    pub minute_wage: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,
    pub rates: WageRates,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmployeeRequest {
    pub full_name: String,
    pub email: String,
    pub role: Option<Role>,
    pub monthly_salary: Decimal,
    pub standard_hours: Option<Decimal>,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
    pub location_id: Option<Uuid>,
    pub monthly_leave_days: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeResponse {
    pub employee: EmployeeView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub employees: Vec<EmployeeView>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEmployeeRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub monthly_salary: Option<Decimal>,
    pub standard_hours: Option<Decimal>,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
    pub location_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

// ─── Attendance ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    EarlyLeave,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "attendance_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceMethod {
    Qr,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ClockAction {
    CheckIn,
    CheckOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub location_id: Uuid,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_in_method: AttendanceMethod,
    pub check_out_method: Option<AttendanceMethod>,
    pub status: AttendanceStatus,
    pub work_hours: Option<Decimal>,
    pub overtime_minutes: i32,
    pub late_minutes: i32,
    pub early_leave_minutes: i32,
    pub daily_earnings: Decimal,
    pub overtime_pay: Decimal,
    pub late_penalty: Decimal,
    pub early_leave_penalty: Decimal,
    pub net_earnings: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClockRequest {
    /// Defaults to the caller; only admins may clock someone else
    pub employee_id: Option<Uuid>,
    pub location_id: Uuid,
    pub action: ClockAction,
    pub method: Option<AttendanceMethod>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClockResponse {
    pub attendance: AttendanceRecord,
    pub action: ClockAction,
    pub work_hours: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub attendance: Option<AttendanceRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    pub employee_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    /// Inclusive first day (business time)
    pub from: Option<NaiveDate>,
    /// Inclusive last day (business time)
    pub to: Option<NaiveDate>,
}

// ─── Leave ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "leave_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Personal,
    Unpaid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "leave_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveRecord {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i32,
    pub leave_type: LeaveType,
    pub status: LeaveStatus,
    pub reason: Option<String>,
    pub created_by: String,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartLeaveRequest {
    pub employee_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EndLeaveRequest {
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLeaveAllowanceRequest {
    pub monthly_leave_days: i32,
    pub remaining_leave_days: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveResponse {
    pub leave: Option<LeaveRecord>,
    pub remaining_leave_days: i32,
    pub monthly_leave_days: i32,
    pub on_leave: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub leaves: Vec<LeaveRecord>,
    pub remaining_leave_days: i32,
    pub on_leave: bool,
}

// ─── Approval decisions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionRequest {
    pub decision: Decision,
}

// ─── Advances ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "advance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "deduction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeductionStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AdvancePayment {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub status: AdvanceStatus,
    pub deduction_status: Option<DeductionStatus>,
    /// Payroll that deducted this advance
    pub payroll_id: Option<Uuid>,
    pub requested_by: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub paid_by: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestAdvanceRequest {
    pub employee_id: Option<Uuid>,
    pub amount: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayAdvanceRequest {
    /// Defaults to today (business time)
    pub payment_date: Option<NaiveDate>,
    pub payment_method: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdvanceFilter {
    pub employee_id: Option<Uuid>,
    pub status: Option<AdvanceStatus>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
pub struct AdvanceStats {
    pub pending_count: i64,
    pub pending_amount: Decimal,
    pub approved_count: i64,
    pub approved_amount: Decimal,
    pub rejected_count: i64,
    pub rejected_amount: Decimal,
    pub paid_count: i64,
    pub paid_amount: Decimal,
    /// Paid advances not yet offset against a payroll
    pub outstanding_deduction: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceResponse {
    pub advance: AdvancePayment,
    pub stats: AdvanceStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceListResponse {
    pub advances: Vec<AdvancePayment>,
    pub stats: AdvanceStats,
}

// ─── Salary Adjustments ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "adjustment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Bonus,
    Penalty,
    Refund,
    Correction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "adjustment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SalaryAdjustment {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub attendance_id: Option<Uuid>,
    pub adjustment_type: AdjustmentType,
    /// Always positive; the type decides the sign
    pub amount: Decimal,
    pub reason: String,
    pub status: AdjustmentStatus,
    pub created_by: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Set when the signed amount was written to the linked attendance record
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdjustmentRequest {
    pub employee_id: Uuid,
    pub adjustment_type: AdjustmentType,
    pub amount: Decimal,
    pub reason: String,
    pub attendance_id: Option<Uuid>,
    #[serde(default)]
    pub auto_approve: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdjustmentFilter {
    pub employee_id: Option<Uuid>,
    pub status: Option<AdjustmentStatus>,
    pub adjustment_type: Option<AdjustmentType>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustmentResponse {
    pub adjustment: SalaryAdjustment,
    /// The linked attendance record after any applied effect
    pub attendance: Option<AttendanceRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustmentListResponse {
    pub adjustments: Vec<SalaryAdjustment>,
}

// ─── Tax Rates ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TaxRateConfig {
    pub id: Uuid,
    pub name: String,
    /// Employee social insurance as a percentage, e.g. 7.5 means 7.5%
    pub social_insurance_rate: Decimal,
    pub unemployment_rate: Decimal,
    pub income_tax_rate: Decimal,
    pub stamp_tax_rate: Decimal,
    pub employer_social_insurance_rate: Decimal,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaxRateConfigRequest {
    pub name: String,
    pub social_insurance_rate: Decimal,
    pub unemployment_rate: Decimal,
    pub income_tax_rate: Decimal,
    pub stamp_tax_rate: Decimal,
    pub employer_social_insurance_rate: Decimal,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaxRateResponse {
    pub tax_rates: Option<TaxRateConfig>,
}

// ─── Payroll ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "payroll_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    Draft,
    Calculated,
    Approved,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayrollAction {
    Approve,
    Pay,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payroll {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub period_year: i32,
    pub period_month: i32,
    pub total_work_days: i32,
    pub work_days: i32,
    pub absent_days: i32,
    pub leave_days: i32,
    pub total_hours: Decimal,
    pub overtime_hours: Decimal,
    pub attendance_earnings: Decimal,
    pub base_salary: Decimal,
    pub overtime_pay: Decimal,
    pub gross_salary: Decimal,
    pub social_insurance: Decimal,
    pub unemployment_insurance: Decimal,
    pub income_tax: Decimal,
    pub stamp_tax: Decimal,
    pub advance_deduction: Decimal,
    pub penalty_deduction: Decimal,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
    pub employer_social_insurance: Decimal,
    pub employer_cost: Decimal,
    pub status: PayrollStatus,
    pub calculated_by: String,
    pub calculated_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_by: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculatePayrollRequest {
    pub employee_id: Uuid,
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub auto_approve: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayrollDecisionRequest {
    pub action: PayrollAction,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayrollFilter {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub employee_id: Option<Uuid>,
    pub status: Option<PayrollStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollResponse {
    pub payroll: Payroll,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollListResponse {
    pub payrolls: Vec<Payroll>,
}

// ─── Notifications ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
}

// ─── Audit Log ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditFilter {
    pub table_name: Option<String>,
    pub record_id: Option<Uuid>,
    pub actor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogListResponse {
    pub logs: Vec<AuditLog>,
}
