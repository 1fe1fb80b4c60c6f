// src/services/payroll.rs

use crate::{
    errors::{AppError, AppResult},
    models::{
        CalculatePayrollRequest, CreateTaxRateConfigRequest, Employee, Payroll, PayrollAction,
        PayrollDecisionRequest, PayrollFilter, PayrollStatus, TaxRateConfig, WageRates,
    },
    services::{
        adjustment, advance, attendance::day_start_utc, audit, employee, finish,
        notification::Notifier, wage::round_money,
    },
};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

// ─── Period & work-day policy ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayPeriod {
    pub year: i32,
    pub month: u32,
    first_day: NaiveDate,
    next_first_day: NaiveDate,
}

impl PayPeriod {
    pub fn new(year: i32, month: u32) -> AppResult<Self> {
        let invalid = || AppError::Validation(format!("Invalid payroll period {}-{}", year, month));
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let next_first_day = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(invalid)?;

        Ok(Self {
            year,
            month,
            first_day,
            next_first_day,
        })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next_first_day - Duration::days(1)
    }

    pub fn days_in_month(&self) -> i32 {
        self.last_day().day() as i32
    }

    /// Half-open `[start, end)` instants of the month in business time.
    pub fn bounds_utc(&self, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            day_start_utc(self.first_day, offset),
            day_start_utc(self.next_first_day, offset),
        )
    }
}

/// How many working days a period is expected to have.
pub trait WorkDayPolicy: Send + Sync {
    fn total_work_days(&self, period: &PayPeriod) -> i32;
}

/// Days in the month minus a fixed weekend allowance.
pub struct WeekendApproximation {
    pub weekend_days: i32,
}

impl WorkDayPolicy for WeekendApproximation {
    fn total_work_days(&self, period: &PayPeriod) -> i32 {
        (period.days_in_month() - self.weekend_days).max(0)
    }
}

// ─── Pure calculation ─────────────────────────────────────────────────────────

/// Percentages, e.g. 7.5 means 7.5%.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxRates {
    pub social_insurance: Decimal,
    pub unemployment: Decimal,
    pub income_tax: Decimal,
    pub stamp_tax: Decimal,
    pub employer_social_insurance: Decimal,
}

impl From<&TaxRateConfig> for TaxRates {
    fn from(config: &TaxRateConfig) -> Self {
        Self {
            social_insurance: config.social_insurance_rate,
            unemployment: config.unemployment_rate,
            income_tax: config.income_tax_rate,
            stamp_tax: config.stamp_tax_rate,
            employer_social_insurance: config.employer_social_insurance_rate,
        }
    }
}

/// Ledger totals for one employee and period.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayrollInputs {
    pub monthly_salary: Decimal,
    pub standard_hours: Decimal,
    pub total_work_days: i32,
    pub work_days: i32,
    pub leave_days: i32,
    pub total_hours: Decimal,
    pub overtime_minutes: i64,
    pub attendance_earnings: Decimal,
    pub advance_deduction: Decimal,
    pub penalty_deduction: Decimal,
}

/// Every figure stored on a payroll row, rounded for persistence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayrollBreakdown {
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
}

pub struct PayrollService;

impl PayrollService {
    pub fn calculate(
        inputs: &PayrollInputs,
        rates: &TaxRates,
        overtime_multiplier: Decimal,
    ) -> PayrollBreakdown {
        let hundred = dec!(100);
        let wage = WageRates::derive(inputs.monthly_salary, inputs.standard_hours);

        let overtime_hours = Decimal::from(inputs.overtime_minutes) / dec!(60);
        let overtime_pay = overtime_hours * wage.hourly_wage * overtime_multiplier;
        let gross_salary = inputs.monthly_salary + overtime_pay;

        let social_insurance = gross_salary * rates.social_insurance / hundred;
        let unemployment_insurance = gross_salary * rates.unemployment / hundred;
        let income_tax = gross_salary * rates.income_tax / hundred;
        let stamp_tax = gross_salary * rates.stamp_tax / hundred;

        let total_deductions = social_insurance
            + unemployment_insurance
            + income_tax
            + stamp_tax
            + inputs.advance_deduction
            + inputs.penalty_deduction;
        let net_salary = gross_salary - total_deductions;

        let employer_social_insurance = gross_salary * rates.employer_social_insurance / hundred;
        let employer_cost = gross_salary + employer_social_insurance;

        let absent_days =
            (inputs.total_work_days - inputs.work_days - inputs.leave_days).max(0);

        PayrollBreakdown {
            total_work_days: inputs.total_work_days,
            work_days: inputs.work_days,
            absent_days,
            leave_days: inputs.leave_days,
            total_hours: round_money(inputs.total_hours),
            overtime_hours: round_money(overtime_hours),
            attendance_earnings: round_money(inputs.attendance_earnings),
            base_salary: round_money(inputs.monthly_salary),
            overtime_pay: round_money(overtime_pay),
            gross_salary: round_money(gross_salary),
            social_insurance: round_money(social_insurance),
            unemployment_insurance: round_money(unemployment_insurance),
            income_tax: round_money(income_tax),
            stamp_tax: round_money(stamp_tax),
            advance_deduction: round_money(inputs.advance_deduction),
            penalty_deduction: round_money(inputs.penalty_deduction),
            total_deductions: round_money(total_deductions),
            net_salary: round_money(net_salary),
            employer_social_insurance: round_money(employer_social_insurance),
            employer_cost: round_money(employer_cost),
        }
    }
}

impl PayrollStatus {
    /// calculated → approved → paid; cancel from anything not yet paid.
    pub fn transition(self, action: PayrollAction) -> AppResult<PayrollStatus> {
        match (self, action) {
            (PayrollStatus::Calculated, PayrollAction::Approve) => Ok(PayrollStatus::Approved),
            (PayrollStatus::Approved, PayrollAction::Pay) => Ok(PayrollStatus::Paid),
            (
                PayrollStatus::Draft | PayrollStatus::Calculated | PayrollStatus::Approved,
                PayrollAction::Cancel,
            ) => Ok(PayrollStatus::Cancelled),
            (status, action) => Err(AppError::InvalidState(format!(
                "Cannot {:?} a payroll that is {:?}",
                action, status
            ))),
        }
    }
}

// ─── Ledger aggregation ───────────────────────────────────────────────────────

async fn gather_inputs(
    conn: &mut PgConnection,
    employee: &Employee,
    period: &PayPeriod,
    offset: FixedOffset,
    work_days: &dyn WorkDayPolicy,
) -> AppResult<PayrollInputs> {
    let (from, to) = period.bounds_utc(offset);
    let offset_minutes = offset.local_minus_utc() / 60;

    let (days_worked, total_hours, overtime_minutes, attendance_earnings) =
        sqlx::query_as::<_, (i64, Decimal, i64, Decimal)>(
            r#"SELECT
                   COUNT(DISTINCT ((check_in_time AT TIME ZONE 'UTC') + make_interval(mins => $4))::date),
                   COALESCE(SUM(work_hours), 0),
                   COALESCE(SUM(overtime_minutes), 0)::BIGINT,
                   COALESCE(SUM(net_earnings), 0)
               FROM attendance_records
               WHERE employee_id = $1
                 AND check_out_time IS NOT NULL
                 AND check_in_time >= $2 AND check_in_time < $3"#,
        )
        .bind(employee.id)
        .bind(from)
        .bind(to)
        .bind(offset_minutes)
        .fetch_one(&mut *conn)
        .await?;

    let leave_days: i32 = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(LEAST(end_date, $3) - GREATEST(start_date, $2) + 1), 0)::INT
           FROM leave_records
           WHERE employee_id = $1
             AND status = 'approved'
             AND start_date <= $3 AND end_date >= $2"#,
    )
    .bind(employee.id)
    .bind(period.first_day())
    .bind(period.last_day())
    .fetch_one(&mut *conn)
    .await?;

    let advance_deduction = advance::outstanding_total(conn, employee.id).await?;
    let penalty_deduction = adjustment::approved_penalties(conn, employee.id, from, to).await?;

    Ok(PayrollInputs {
        monthly_salary: employee.monthly_salary,
        standard_hours: employee.standard_hours,
        total_work_days: work_days.total_work_days(period),
        work_days: i32::try_from(days_worked).unwrap_or(i32::MAX),
        leave_days,
        total_hours,
        overtime_minutes,
        attendance_earnings,
        advance_deduction,
        penalty_deduction,
    })
}

/// Latest version in effect on `on`.
pub async fn effective_tax_rates<'e, E>(executor: E, on: NaiveDate) -> AppResult<Option<TaxRateConfig>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let config = sqlx::query_as::<_, TaxRateConfig>(
        r#"SELECT * FROM tax_rate_configs
           WHERE effective_from <= $1
             AND (effective_to IS NULL OR effective_to >= $1)
           ORDER BY effective_from DESC, created_at DESC
           LIMIT 1"#,
    )
    .bind(on)
    .fetch_optional(executor)
    .await?;
    Ok(config)
}

pub struct PayrollContext<'a> {
    pub offset: FixedOffset,
    pub overtime_multiplier: Decimal,
    pub work_days: &'a dyn WorkDayPolicy,
}

pub async fn calculate(
    db: &PgPool,
    ctx: &PayrollContext<'_>,
    actor: &str,
    body: CalculatePayrollRequest,
) -> AppResult<Payroll> {
    let period = PayPeriod::new(body.year, body.month)?;

    let mut tx = db.begin().await?;
    let result: AppResult<Payroll> = async {
        let employee = employee::lock(&mut tx, body.employee_id).await?;
        let inputs = gather_inputs(&mut tx, &employee, &period, ctx.offset, ctx.work_days).await?;

        let rates = match effective_tax_rates(&mut *tx, period.last_day()).await? {
            Some(config) => TaxRates::from(&config),
            None => {
                warn!(
                    "No tax rates in effect for {}-{:02}; using zero rates",
                    period.year, period.month
                );
                TaxRates::default()
            }
        };

        let b = PayrollService::calculate(&inputs, &rates, ctx.overtime_multiplier);

        let status = if body.auto_approve {
            PayrollStatus::Approved
        } else {
            PayrollStatus::Calculated
        };
        let approved_by = body.auto_approve.then_some(actor);

        // Paid rows are frozen: the conflict update is skipped and nothing is returned
        let payroll = sqlx::query_as::<_, Payroll>(
            r#"INSERT INTO payrolls (
                id, employee_id, period_year, period_month,
                total_work_days, work_days, absent_days, leave_days,
                total_hours, overtime_hours, attendance_earnings,
                base_salary, overtime_pay, gross_salary,
                social_insurance, unemployment_insurance, income_tax, stamp_tax,
                advance_deduction, penalty_deduction, total_deductions, net_salary,
                employer_social_insurance, employer_cost,
                status, calculated_by, calculated_at,
                approved_by, approved_at, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24,
                $25, $26, NOW(), $27, CASE WHEN $27::text IS NULL THEN NULL ELSE NOW() END,
                NOW(), NOW()
            )
            ON CONFLICT (employee_id, period_year, period_month) DO UPDATE SET
                total_work_days = EXCLUDED.total_work_days,
                work_days = EXCLUDED.work_days,
                absent_days = EXCLUDED.absent_days,
                leave_days = EXCLUDED.leave_days,
                total_hours = EXCLUDED.total_hours,
                overtime_hours = EXCLUDED.overtime_hours,
                attendance_earnings = EXCLUDED.attendance_earnings,
                base_salary = EXCLUDED.base_salary,
                overtime_pay = EXCLUDED.overtime_pay,
                gross_salary = EXCLUDED.gross_salary,
                social_insurance = EXCLUDED.social_insurance,
                unemployment_insurance = EXCLUDED.unemployment_insurance,
                income_tax = EXCLUDED.income_tax,
                stamp_tax = EXCLUDED.stamp_tax,
                advance_deduction = EXCLUDED.advance_deduction,
                penalty_deduction = EXCLUDED.penalty_deduction,
                total_deductions = EXCLUDED.total_deductions,
                net_salary = EXCLUDED.net_salary,
                employer_social_insurance = EXCLUDED.employer_social_insurance,
                employer_cost = EXCLUDED.employer_cost,
                status = EXCLUDED.status,
                calculated_by = EXCLUDED.calculated_by,
                calculated_at = EXCLUDED.calculated_at,
                approved_by = EXCLUDED.approved_by,
                approved_at = EXCLUDED.approved_at,
                cancelled_by = NULL,
                cancelled_at = NULL,
                updated_at = NOW()
            WHERE payrolls.status <> 'paid'
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(employee.id)
        .bind(period.year)
        .bind(period.month as i32)
        .bind(b.total_work_days)
        .bind(b.work_days)
        .bind(b.absent_days)
        .bind(b.leave_days)
        .bind(b.total_hours)
        .bind(b.overtime_hours)
        .bind(b.attendance_earnings)
        .bind(b.base_salary)
        .bind(b.overtime_pay)
        .bind(b.gross_salary)
        .bind(b.social_insurance)
        .bind(b.unemployment_insurance)
        .bind(b.income_tax)
        .bind(b.stamp_tax)
        .bind(b.advance_deduction)
        .bind(b.penalty_deduction)
        .bind(b.total_deductions)
        .bind(b.net_salary)
        .bind(b.employer_social_insurance)
        .bind(b.employer_cost)
        .bind(status)
        .bind(actor)
        .bind(approved_by)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::InvalidState(format!(
                "Payroll for {}-{:02} is already paid",
                period.year, period.month
            ))
        })?;

        audit::record(
            &mut tx,
            actor,
            "payroll.calculate",
            "payrolls",
            Some(payroll.id),
            Some(json!({
                "period": format!("{}-{:02}", period.year, period.month),
                "gross_salary": payroll.gross_salary,
                "net_salary": payroll.net_salary,
                "status": payroll.status,
            })),
        )
        .await?;

        Ok(payroll)
    }
    .await;

    let payroll = finish(tx, result, "payroll.calculate").await?;
    info!(
        "Payroll {} calculated for employee {} ({}-{:02}): net {}",
        payroll.id, payroll.employee_id, payroll.period_year, payroll.period_month, payroll.net_salary
    );
    Ok(payroll)
}

pub async fn decide(
    db: &PgPool,
    notifier: &dyn Notifier,
    actor: &str,
    payroll_id: Uuid,
    body: PayrollDecisionRequest,
    today: NaiveDate,
) -> AppResult<Payroll> {
    let mut tx = db.begin().await?;
    let result: AppResult<(Payroll, Option<Employee>)> = async {
        let current =
            sqlx::query_as::<_, Payroll>("SELECT * FROM payrolls WHERE id = $1 FOR UPDATE")
                .bind(payroll_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Payroll {} not found", payroll_id)))?;

        let next = current.status.transition(body.action)?;

        let (payroll, paid_to) = match body.action {
            PayrollAction::Approve => {
                let payroll = sqlx::query_as::<_, Payroll>(
                    r#"UPDATE payrolls
                       SET status = $1, approved_by = $2, approved_at = NOW(),
                           notes = COALESCE($3, notes), updated_at = NOW()
                       WHERE id = $4
                       RETURNING *"#,
                )
                .bind(next)
                .bind(actor)
                .bind(body.notes.as_deref())
                .bind(payroll_id)
                .fetch_one(&mut *tx)
                .await?;
                (payroll, None)
            }
            PayrollAction::Pay => {
                let payroll = sqlx::query_as::<_, Payroll>(
                    r#"UPDATE payrolls
                       SET status = $1, paid_by = $2, payment_date = $3,
                           payment_method = $4, payment_reference = $5,
                           notes = COALESCE($6, notes), updated_at = NOW()
                       WHERE id = $7
                       RETURNING *"#,
                )
                .bind(next)
                .bind(actor)
                .bind(body.payment_date.unwrap_or(today))
                .bind(body.payment_method.as_deref())
                .bind(body.payment_reference.as_deref())
                .bind(body.notes.as_deref())
                .bind(payroll_id)
                .fetch_one(&mut *tx)
                .await?;

                let (closed, total) =
                    advance::close_outstanding(&mut tx, payroll.employee_id, payroll.id).await?;
                // only advances this payroll actually deducted may be closed by it
                if total != payroll.advance_deduction {
                    warn!(
                        "Payroll {} deducts {} in advances but {} is outstanding",
                        payroll.id, payroll.advance_deduction, total
                    );
                    return Err(AppError::Conflict(format!(
                        "Outstanding advances ({}) differ from the {} deducted by payroll {}; recalculate it first",
                        total, payroll.advance_deduction, payroll.id
                    )));
                }
                info!("Payroll {} closed {} outstanding advance(s)", payroll.id, closed);

                let employee = employee::find(&mut *tx, payroll.employee_id).await?;
                (payroll, Some(employee))
            }
            PayrollAction::Cancel => {
                let payroll = sqlx::query_as::<_, Payroll>(
                    r#"UPDATE payrolls
                       SET status = $1, cancelled_by = $2, cancelled_at = NOW(),
                           notes = COALESCE($3, notes), updated_at = NOW()
                       WHERE id = $4
                       RETURNING *"#,
                )
                .bind(next)
                .bind(actor)
                .bind(body.notes.as_deref())
                .bind(payroll_id)
                .fetch_one(&mut *tx)
                .await?;
                (payroll, None)
            }
        };

        audit::record(
            &mut tx,
            actor,
            "payroll.decide",
            "payrolls",
            Some(payroll_id),
            Some(json!({ "from": current.status, "to": next })),
        )
        .await?;

        Ok((payroll, paid_to))
    }
    .await;

    let (payroll, paid_to) = finish(tx, result, "payroll.decide").await?;
    info!("Payroll {} is now {:?}", payroll_id, payroll.status);

    // Payslip delivery is best-effort once the payment is committed
    if let Some(employee) = paid_to {
        if let Err(e) = notifier.payslip(&employee, &payroll).await {
            warn!("Payslip for payroll {} was not delivered: {}", payroll.id, e);
        }
    }

    Ok(payroll)
}

pub async fn get(db: &PgPool, payroll_id: Uuid) -> AppResult<Payroll> {
    sqlx::query_as::<_, Payroll>("SELECT * FROM payrolls WHERE id = $1")
        .bind(payroll_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payroll {} not found", payroll_id)))
}

pub async fn list(db: &PgPool, filter: &PayrollFilter) -> AppResult<Vec<Payroll>> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM payrolls WHERE TRUE");
    if let Some(year) = filter.year {
        query.push(" AND period_year = ").push_bind(year);
    }
    if let Some(month) = filter.month {
        query.push(" AND period_month = ").push_bind(month);
    }
    if let Some(employee_id) = filter.employee_id {
        query.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    query.push(" ORDER BY period_year DESC, period_month DESC, created_at DESC LIMIT 500");

    let payrolls = query.build_query_as::<Payroll>().fetch_all(db).await?;
    Ok(payrolls)
}

// ─── Tax rate versions ────────────────────────────────────────────────────────

fn validate_tax_rates(body: &CreateTaxRateConfigRequest) -> AppResult<()> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Tax rate name is required".to_string()));
    }
    let rates = [
        body.social_insurance_rate,
        body.unemployment_rate,
        body.income_tax_rate,
        body.stamp_tax_rate,
        body.employer_social_insurance_rate,
    ];
    if rates.iter().any(|r| *r < Decimal::ZERO || *r > dec!(100)) {
        return Err(AppError::Validation(
            "Tax rates must be between 0 and 100".to_string(),
        ));
    }
    if matches!(body.effective_to, Some(to) if to < body.effective_from) {
        return Err(AppError::Validation(
            "effective_to cannot be before effective_from".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_tax_rates(
    db: &PgPool,
    actor: &str,
    body: CreateTaxRateConfigRequest,
) -> AppResult<TaxRateConfig> {
    validate_tax_rates(&body)?;

    let mut tx = db.begin().await?;
    let result: AppResult<TaxRateConfig> = async {
        let config = sqlx::query_as::<_, TaxRateConfig>(
            r#"INSERT INTO tax_rate_configs (
                id, name, social_insurance_rate, unemployment_rate, income_tax_rate,
                stamp_tax_rate, employer_social_insurance_rate,
                effective_from, effective_to, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(body.name.trim())
        .bind(body.social_insurance_rate)
        .bind(body.unemployment_rate)
        .bind(body.income_tax_rate)
        .bind(body.stamp_tax_rate)
        .bind(body.employer_social_insurance_rate)
        .bind(body.effective_from)
        .bind(body.effective_to)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor,
            "tax_rates.create",
            "tax_rate_configs",
            Some(config.id),
            Some(json!({ "effective_from": config.effective_from })),
        )
        .await?;

        Ok(config)
    }
    .await;

    let config = finish(tx, result, "tax_rates.create").await?;
    info!("Tax rate version '{}' effective from {}", config.name, config.effective_from);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn period_bounds_cover_the_whole_month() {
        let period = PayPeriod::new(2024, 2).unwrap();
        assert_eq!(period.days_in_month(), 29);
        assert_eq!(period.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let december = PayPeriod::new(2025, 12).unwrap();
        let (from, to) = december.bounds_utc(FixedOffset::east_opt(3600).unwrap());
        assert_eq!(from.to_rfc3339(), "2025-11-30T23:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2025-12-31T23:00:00+00:00");
    }

    #[test]
    fn month_out_of_range_is_a_validation_error() {
        assert!(matches!(PayPeriod::new(2025, 0), Err(AppError::Validation(_))));
        assert!(matches!(PayPeriod::new(2025, 13), Err(AppError::Validation(_))));
    }

    #[test]
    fn weekend_approximation_subtracts_fixed_days() {
        let policy = WeekendApproximation { weekend_days: 4 };
        assert_eq!(policy.total_work_days(&PayPeriod::new(2025, 1).unwrap()), 27);
        assert_eq!(policy.total_work_days(&PayPeriod::new(2025, 2).unwrap()), 24);
    }

    fn inputs() -> PayrollInputs {
        PayrollInputs {
            monthly_salary: dec!(30000),
            standard_hours: dec!(8),
            total_work_days: 26,
            work_days: 20,
            leave_days: 2,
            total_hours: dec!(171.5),
            overtime_minutes: 90,
            attendance_earnings: dec!(24000),
            advance_deduction: dec!(1000),
            penalty_deduction: dec!(50),
        }
    }

    #[test]
    fn breakdown_applies_rates_to_gross() {
        let rates = TaxRates {
            social_insurance: dec!(10),
            unemployment: dec!(1),
            income_tax: dec!(5),
            stamp_tax: dec!(0.5),
            employer_social_insurance: dec!(15),
        };
        let b = PayrollService::calculate(&inputs(), &rates, dec!(1.5));

        assert_eq!(b.overtime_hours, dec!(1.50));
        assert_eq!(b.overtime_pay, dec!(281.25));
        assert_eq!(b.gross_salary, dec!(30281.25));
        assert_eq!(b.social_insurance, dec!(3028.13));
        assert_eq!(b.unemployment_insurance, dec!(302.81));
        assert_eq!(b.income_tax, dec!(1514.06));
        assert_eq!(b.stamp_tax, dec!(151.41));
        // 16.5% of gross plus advance and penalty
        assert_eq!(b.total_deductions, dec!(6046.41));
        assert_eq!(b.net_salary, dec!(24234.84));
        assert_eq!(b.employer_social_insurance, dec!(4542.19));
        assert_eq!(b.employer_cost, dec!(34823.44));
        assert_eq!(b.absent_days, 4);
    }

    #[test]
    fn zero_rates_deduct_only_advances_and_penalties() {
        let b = PayrollService::calculate(&inputs(), &TaxRates::default(), dec!(1.5));
        assert_eq!(b.total_deductions, dec!(1050.00));
        assert_eq!(b.net_salary, dec!(29231.25));
        assert_eq!(b.employer_cost, b.gross_salary);
    }

    #[test]
    fn absent_days_never_go_negative() {
        let mut i = inputs();
        i.work_days = 25;
        i.leave_days = 5;
        let b = PayrollService::calculate(&i, &TaxRates::default(), dec!(1.5));
        assert_eq!(b.absent_days, 0);
    }

    #[test]
    fn same_inputs_give_the_same_breakdown() {
        let rates = TaxRates {
            income_tax: dec!(7),
            ..TaxRates::default()
        };
        assert_eq!(
            PayrollService::calculate(&inputs(), &rates, dec!(1.5)),
            PayrollService::calculate(&inputs(), &rates, dec!(1.5))
        );
    }

    #[test]
    fn status_machine_allows_only_forward_steps() {
        use PayrollAction::*;
        use PayrollStatus::*;

        assert_eq!(Calculated.transition(Approve).unwrap(), Approved);
        assert_eq!(Approved.transition(Pay).unwrap(), Paid);
        assert_eq!(Calculated.transition(Cancel).unwrap(), Cancelled);
        assert_eq!(Approved.transition(Cancel).unwrap(), Cancelled);

        for (status, action) in [
            (Calculated, Pay),
            (Approved, Approve),
            (Paid, Cancel),
            (Paid, Pay),
            (Cancelled, Approve),
            (Cancelled, Cancel),
        ] {
            assert!(
                matches!(status.transition(action), Err(AppError::InvalidState(_))),
                "{:?} -> {:?} should be rejected",
                status,
                action
            );
        }
    }

    #[test]
    fn tax_rates_outside_percentage_range_are_rejected() {
        let body = CreateTaxRateConfigRequest {
            name: "2025".to_string(),
            social_insurance_rate: dec!(101),
            unemployment_rate: Decimal::ZERO,
            income_tax_rate: Decimal::ZERO,
            stamp_tax_rate: Decimal::ZERO,
            employer_social_insurance_rate: Decimal::ZERO,
            effective_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            effective_to: None,
        };
        assert!(matches!(validate_tax_rates(&body), Err(AppError::Validation(_))));
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::{
        models::{Decision, PayAdvanceRequest, RequestAdvanceRequest},
        services::{notification::LogNotifier, test_fixtures::insert_employee},
    };
    use chrono::Offset;

    fn context(policy: &WeekendApproximation) -> PayrollContext<'_> {
        PayrollContext {
            offset: Utc.fix(),
            overtime_multiplier: dec!(1.5),
            work_days: policy,
        }
    }

    fn request(employee_id: Uuid) -> CalculatePayrollRequest {
        CalculatePayrollRequest {
            employee_id,
            year: 2025,
            month: 3,
            auto_approve: false,
        }
    }

    async fn paid_advance(pool: &PgPool, employee_id: Uuid, amount: Decimal, today: NaiveDate) -> Uuid {
        let requested = advance::request(
            pool,
            dec!(0.5),
            "staff",
            employee_id,
            RequestAdvanceRequest {
                employee_id: None,
                amount,
                reason: None,
            },
        )
        .await
        .unwrap();
        advance::decide(pool, "admin", requested.advance.id, Decision::Approve)
            .await
            .unwrap();
        advance::pay(
            pool,
            "admin",
            requested.advance.id,
            PayAdvanceRequest {
                payment_date: None,
                payment_method: "cash".to_string(),
            },
            today,
        )
        .await
        .unwrap();
        requested.advance.id
    }

    fn decision(action: PayrollAction) -> PayrollDecisionRequest {
        PayrollDecisionRequest {
            action,
            payment_date: None,
            payment_method: Some("bank_transfer".to_string()),
            payment_reference: None,
            notes: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn recalculating_updates_the_same_row(pool: PgPool) {
        let policy = WeekendApproximation { weekend_days: 4 };
        let employee = insert_employee(&pool, dec!(30000)).await;

        let first = calculate(&pool, &context(&policy), "admin", request(employee.id))
            .await
            .unwrap();
        let second = calculate(&pool, &context(&policy), "admin", request(employee.id))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.net_salary, second.net_salary);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payrolls WHERE employee_id = $1")
            .bind(employee.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn paying_closes_only_this_employees_advances(pool: PgPool) {
        let policy = WeekendApproximation { weekend_days: 4 };
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let employee = insert_employee(&pool, dec!(30000)).await;
        let other = insert_employee(&pool, dec!(30000)).await;

        for id in [employee.id, other.id] {
            paid_advance(&pool, id, dec!(1000), today).await;
        }

        let payroll = calculate(&pool, &context(&policy), "admin", request(employee.id))
            .await
            .unwrap();
        assert_eq!(payroll.advance_deduction, dec!(1000.00));

        let notifier = LogNotifier;
        decide(&pool, &notifier, "admin", payroll.id, decision(PayrollAction::Approve), today)
            .await
            .unwrap();
        let paid = decide(&pool, &notifier, "admin", payroll.id, decision(PayrollAction::Pay), today)
            .await
            .unwrap();
        assert_eq!(paid.status, PayrollStatus::Paid);

        let mine = advance::list(
            &pool,
            &crate::models::AdvanceFilter {
                employee_id: Some(employee.id),
                status: None,
            },
        )
        .await
        .unwrap();
        assert!(mine.advances.iter().all(|a| a.payroll_id == Some(payroll.id)));
        assert_eq!(mine.stats.outstanding_deduction, Decimal::ZERO);

        let theirs = advance::stats(&pool, Some(other.id)).await.unwrap();
        assert_eq!(theirs.outstanding_deduction, dec!(1000.00));

        let frozen = calculate(&pool, &context(&policy), "admin", request(employee.id)).await;
        assert!(matches!(frozen, Err(AppError::InvalidState(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn advance_paid_after_calculation_blocks_payment_until_recalculated(pool: PgPool) {
        let policy = WeekendApproximation { weekend_days: 4 };
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let employee = insert_employee(&pool, dec!(30000)).await;
        let notifier = LogNotifier;

        let approved = |employee_id| CalculatePayrollRequest {
            auto_approve: true,
            ..request(employee_id)
        };
        let payroll = calculate(&pool, &context(&policy), "admin", approved(employee.id))
            .await
            .unwrap();
        assert_eq!(payroll.advance_deduction, Decimal::ZERO);

        paid_advance(&pool, employee.id, dec!(5000), today).await;

        let blocked = decide(&pool, &notifier, "admin", payroll.id, decision(PayrollAction::Pay), today).await;
        assert!(matches!(blocked, Err(AppError::Conflict(_))));
        assert_eq!(get(&pool, payroll.id).await.unwrap().status, PayrollStatus::Approved);
        let stats = advance::stats(&pool, Some(employee.id)).await.unwrap();
        assert_eq!(stats.outstanding_deduction, dec!(5000.00));

        let recalculated = calculate(&pool, &context(&policy), "admin", approved(employee.id))
            .await
            .unwrap();
        assert_eq!(recalculated.advance_deduction, dec!(5000.00));
        let paid = decide(&pool, &notifier, "admin", payroll.id, decision(PayrollAction::Pay), today)
            .await
            .unwrap();
        assert_eq!(paid.status, PayrollStatus::Paid);
        let stats = advance::stats(&pool, Some(employee.id)).await.unwrap();
        assert_eq!(stats.outstanding_deduction, Decimal::ZERO);
    }
}
