// src/services/attendance.rs

use crate::{
    config::AttendancePolicy,
    errors::{AppError, AppResult},
    models::{
        AttendanceFilter, AttendanceMethod, AttendanceRecord, AttendanceStatus, ClockAction,
        ClockResponse, Employee, WageRates,
    },
    services::{adjustment, audit, employee, finish, notification, wage::round_money},
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde_json::json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

const SECONDS_PER_HOUR: i64 = 3600;

// ─── Business-time helpers ────────────────────────────────────────────────────

pub fn to_local(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    instant.with_timezone(&offset).naive_local()
}

pub fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

pub fn day_start_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    local_to_utc(date.and_time(NaiveTime::MIN), offset)
}

// ─── Pure calculations ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInAssessment {
    pub status: AttendanceStatus,
    pub late_minutes: i32,
}

/// Late when arriving more than the grace period after scheduled start.
/// Employees inside an active leave span are not assessed for lateness.
pub fn assess_check_in(
    local_now: NaiveDateTime,
    shift_start: NaiveTime,
    grace_minutes: i64,
    on_leave: bool,
) -> CheckInAssessment {
    let scheduled = local_now.date().and_time(shift_start);
    let minutes_after_start = (local_now - scheduled).num_minutes();

    if !on_leave && minutes_after_start > grace_minutes {
        CheckInAssessment {
            status: AttendanceStatus::Late,
            late_minutes: i32::try_from(minutes_after_start).unwrap_or(i32::MAX),
        }
    } else {
        CheckInAssessment {
            status: AttendanceStatus::Present,
            late_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckOutInput {
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
    pub check_in_status: AttendanceStatus,
    pub late_minutes: i32,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub standard_hours: Decimal,
    pub rates: WageRates,
}

/// Earnings for one closed attendance record, at full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyEarnings {
    pub status: AttendanceStatus,
    pub work_hours: Decimal,
    pub overtime_hours: Decimal,
    pub early_leave_minutes: i32,
    pub daily_earnings: Decimal,
    pub overtime_pay: Decimal,
    pub late_penalty: Decimal,
    pub early_leave_penalty: Decimal,
    pub net_earnings: Decimal,
}

impl DailyEarnings {
    pub fn overtime_minutes(&self) -> i32 {
        (self.overtime_hours * Decimal::from(60))
            .round()
            .to_i32()
            .unwrap_or(0)
    }
}

/// Closing status from hours on the clock alone. Lateness stays in
/// `late_minutes` and `late_penalty`.
pub fn status_for_hours(work_hours: Decimal, policy: &AttendancePolicy) -> AttendanceStatus {
    if work_hours >= policy.full_day_hours {
        AttendanceStatus::Present
    } else if work_hours >= policy.half_day_hours {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::EarlyLeave
    }
}

/// Scheduled shift end for a check-in; shifts ending at or before their start end next day.
fn scheduled_end(check_in: NaiveDateTime, shift_start: NaiveTime, shift_end: NaiveTime) -> NaiveDateTime {
    let end = check_in.date().and_time(shift_end);
    if shift_end <= shift_start {
        end + Duration::days(1)
    } else {
        end
    }
}

pub fn compute_check_out(input: &CheckOutInput, policy: &AttendancePolicy) -> DailyEarnings {
    let seconds = (input.check_out - input.check_in).num_seconds().max(0);
    let work_hours = Decimal::from(seconds) / Decimal::from(SECONDS_PER_HOUR);

    let regular_hours = work_hours.min(input.standard_hours);
    let overtime_hours = (work_hours - input.standard_hours).max(Decimal::ZERO);
    let overtime_pay = overtime_hours * input.rates.hourly_wage * policy.overtime_multiplier;

    let late_penalty = if input.check_in_status == AttendanceStatus::Late {
        Decimal::from(input.late_minutes) * input.rates.minute_wage
    } else {
        Decimal::ZERO
    };

    let shift_end = scheduled_end(input.check_in, input.shift_start, input.shift_end);
    let early_leave_minutes = if input.check_out < shift_end {
        i32::try_from((shift_end - input.check_out).num_minutes()).unwrap_or(i32::MAX)
    } else {
        0
    };
    let early_leave_penalty = Decimal::from(early_leave_minutes) * input.rates.minute_wage;

    let daily_earnings = regular_hours * input.rates.hourly_wage + overtime_pay;
    let net_earnings = daily_earnings - late_penalty - early_leave_penalty;

    DailyEarnings {
        status: status_for_hours(work_hours, policy),
        work_hours,
        overtime_hours,
        early_leave_minutes,
        daily_earnings,
        overtime_pay,
        late_penalty,
        early_leave_penalty,
        net_earnings,
    }
}

fn on_leave_on(employee: &Employee, day: NaiveDate) -> bool {
    employee.on_leave
        && matches!(
            (employee.leave_start, employee.leave_end),
            (Some(start), Some(end)) if start <= day && day <= end
        )
}

// ─── Ledger operations ────────────────────────────────────────────────────────

pub async fn find_open(conn: &mut PgConnection, employee_id: Uuid) -> AppResult<Option<AttendanceRecord>> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance_records WHERE employee_id = $1 AND check_out_time IS NULL FOR UPDATE",
    )
    .bind(employee_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(record)
}

pub async fn check_in(
    db: &PgPool,
    policy: &AttendancePolicy,
    actor: &str,
    employee_id: Uuid,
    location_id: Uuid,
    method: AttendanceMethod,
    now: DateTime<Utc>,
) -> AppResult<AttendanceRecord> {
    let mut tx = db.begin().await?;
    let result: AppResult<AttendanceRecord> = async {
        // Serialises concurrent clock events for this employee
        let employee = employee::lock(&mut tx, employee_id).await?;
        if !employee.is_active {
            return Err(AppError::Validation(format!(
                "Employee {} is not active",
                employee_id
            )));
        }
        employee::find_active_location(&mut tx, location_id).await?;

        if let Some(open) = find_open(&mut tx, employee_id).await? {
            return Err(AppError::Conflict(format!(
                "Employee {} is already checked in (attendance {})",
                employee_id, open.id
            )));
        }

        let local_now = to_local(now, policy.utc_offset);
        let assessment = assess_check_in(
            local_now,
            employee.shift_start,
            policy.late_grace_minutes,
            on_leave_on(&employee, local_now.date()),
        );

        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"INSERT INTO attendance_records (
                id, employee_id, location_id, check_in_time, check_in_method,
                status, late_minutes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(location_id)
        .bind(now)
        .bind(method)
        .bind(assessment.status)
        .bind(assessment.late_minutes)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::Conflict(format!("Employee {} is already checked in", employee_id))
            } else {
                e
            }
        })?;

        audit::record(
            &mut tx,
            actor,
            "attendance.check_in",
            "attendance_records",
            Some(record.id),
            Some(json!({
                "location_id": location_id,
                "status": record.status,
                "late_minutes": record.late_minutes,
            })),
        )
        .await?;

        Ok(record)
    }
    .await;

    let record = finish(tx, result, "attendance.check_in").await?;
    info!(
        "Employee {} checked in at {} ({:?})",
        employee_id, record.check_in_time, record.status
    );
    Ok(record)
}

pub async fn check_out(
    db: &PgPool,
    policy: &AttendancePolicy,
    actor: &str,
    employee_id: Uuid,
    method: AttendanceMethod,
    now: DateTime<Utc>,
) -> AppResult<AttendanceRecord> {
    let mut tx = db.begin().await?;
    let result: AppResult<AttendanceRecord> = async {
        let employee = employee::lock(&mut tx, employee_id).await?;
        let open = find_open(&mut tx, employee_id).await?.ok_or_else(|| {
            AppError::Conflict(format!("Employee {} has no open attendance record", employee_id))
        })?;

        let earnings = compute_check_out(
            &CheckOutInput {
                check_in: to_local(open.check_in_time, policy.utc_offset),
                check_out: to_local(now, policy.utc_offset),
                check_in_status: open.status,
                late_minutes: open.late_minutes,
                shift_start: employee.shift_start,
                shift_end: employee.shift_end,
                standard_hours: employee.standard_hours,
                rates: WageRates::for_employee(&employee),
            },
            policy,
        );
        // adjustments approved while the record was open
        let adjusted = adjustment::applied_total(&mut tx, open.id).await?;
        let net_earnings = round_money(earnings.net_earnings) + adjusted;

        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"UPDATE attendance_records
               SET check_out_time = $1,
                   check_out_method = $2,
                   status = $3,
                   work_hours = $4,
                   overtime_minutes = $5,
                   early_leave_minutes = $6,
                   daily_earnings = $7,
                   overtime_pay = $8,
                   late_penalty = $9,
                   early_leave_penalty = $10,
                   net_earnings = $11,
                   updated_at = NOW()
               WHERE id = $12
               RETURNING *"#,
        )
        .bind(now)
        .bind(method)
        .bind(earnings.status)
        .bind(round_money(earnings.work_hours))
        .bind(earnings.overtime_minutes())
        .bind(earnings.early_leave_minutes)
        .bind(round_money(earnings.daily_earnings))
        .bind(round_money(earnings.overtime_pay))
        .bind(round_money(earnings.late_penalty))
        .bind(round_money(earnings.early_leave_penalty))
        .bind(net_earnings)
        .bind(open.id)
        .fetch_one(&mut *tx)
        .await?;

        notification::push(
            &mut tx,
            employee_id,
            "Checked out",
            &format!(
                "You worked {} hours today. Net earnings: {}",
                round_money(earnings.work_hours),
                record.net_earnings
            ),
        )
        .await?;

        audit::record(
            &mut tx,
            actor,
            "attendance.check_out",
            "attendance_records",
            Some(record.id),
            Some(json!({
                "work_hours": record.work_hours,
                "status": record.status,
                "net_earnings": record.net_earnings,
            })),
        )
        .await?;

        Ok(record)
    }
    .await;

    let record = finish(tx, result, "attendance.check_out").await?;
    info!(
        "Employee {} checked out: {:?} hours, net {}",
        employee_id, record.work_hours, record.net_earnings
    );
    Ok(record)
}

/// Single entry point for the clock handler.
pub async fn clock(
    db: &PgPool,
    policy: &AttendancePolicy,
    actor: &str,
    employee_id: Uuid,
    location_id: Uuid,
    action: ClockAction,
    method: AttendanceMethod,
    now: DateTime<Utc>,
) -> AppResult<ClockResponse> {
    let attendance = match action {
        ClockAction::CheckIn => {
            check_in(db, policy, actor, employee_id, location_id, method, now).await?
        }
        ClockAction::CheckOut => check_out(db, policy, actor, employee_id, method, now).await?,
    };

    Ok(ClockResponse {
        work_hours: attendance.work_hours,
        attendance,
        action,
    })
}

/// Signed change to a record's net earnings. Used by approved adjustments;
/// check-out re-adds them when it recomputes an open record.
pub async fn add_to_net_earnings(
    conn: &mut PgConnection,
    attendance_id: Uuid,
    delta: Decimal,
) -> AppResult<AttendanceRecord> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        r#"UPDATE attendance_records
           SET net_earnings = net_earnings + $1, updated_at = NOW()
           WHERE id = $2
           RETURNING *"#,
    )
    .bind(round_money(delta))
    .bind(attendance_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Attendance record {} not found", attendance_id)))?;
    Ok(record)
}

// ─── Reads ────────────────────────────────────────────────────────────────────

pub async fn get(db: &PgPool, attendance_id: Uuid) -> AppResult<AttendanceRecord> {
    sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance_records WHERE id = $1")
        .bind(attendance_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attendance record {} not found", attendance_id)))
}

pub async fn current_open(db: &PgPool, employee_id: Uuid) -> AppResult<Option<AttendanceRecord>> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance_records WHERE employee_id = $1 AND check_out_time IS NULL",
    )
    .bind(employee_id)
    .fetch_optional(db)
    .await?;
    Ok(record)
}

pub async fn list(
    db: &PgPool,
    offset: FixedOffset,
    filter: &AttendanceFilter,
) -> AppResult<Vec<AttendanceRecord>> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM attendance_records WHERE TRUE");

    if let Some(employee_id) = filter.employee_id {
        query.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(location_id) = filter.location_id {
        query.push(" AND location_id = ").push_bind(location_id);
    }
    if let Some(from) = filter.from {
        query
            .push(" AND check_in_time >= ")
            .push_bind(day_start_utc(from, offset));
    }
    if let Some(to) = filter.to {
        let next_day = to.succ_opt().unwrap_or(to);
        query
            .push(" AND check_in_time < ")
            .push_bind(day_start_utc(next_day, offset));
    }
    query.push(" ORDER BY check_in_time DESC LIMIT 500");

    let records = query
        .build_query_as::<AttendanceRecord>()
        .fetch_all(db)
        .await?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn input(check_in: NaiveDateTime, check_out: NaiveDateTime) -> CheckOutInput {
        let assessment = assess_check_in(check_in, time(9, 0), 15, false);
        CheckOutInput {
            check_in,
            check_out,
            check_in_status: assessment.status,
            late_minutes: assessment.late_minutes,
            shift_start: time(9, 0),
            shift_end: time(18, 0),
            standard_hours: dec!(8),
            rates: WageRates::derive(dec!(30000), dec!(8)),
        }
    }

    #[test]
    fn arrival_within_grace_is_present() {
        let a = assess_check_in(at(9, 15), time(9, 0), 15, false);
        assert_eq!(a.status, AttendanceStatus::Present);
        assert_eq!(a.late_minutes, 0);
    }

    #[test]
    fn arrival_after_grace_is_late_by_full_delay() {
        let a = assess_check_in(at(9, 20), time(9, 0), 15, false);
        assert_eq!(a.status, AttendanceStatus::Late);
        assert_eq!(a.late_minutes, 20);
    }

    #[test]
    fn employees_on_leave_are_not_marked_late() {
        let a = assess_check_in(at(11, 0), time(9, 0), 15, true);
        assert_eq!(a.status, AttendanceStatus::Present);
    }

    #[test]
    fn late_arrival_with_overtime_matches_worked_example() {
        let earnings = compute_check_out(
            &input(at(9, 20), at(18, 50)),
            &AttendancePolicy::default(),
        );

        assert_eq!(earnings.work_hours, dec!(9.5));
        assert_eq!(earnings.overtime_hours, dec!(1.5));
        assert_eq!(earnings.overtime_minutes(), 90);
        assert_eq!(round_money(earnings.overtime_pay), dec!(281.25));
        assert_eq!(round_money(earnings.late_penalty), dec!(41.67));
        assert_eq!(earnings.early_leave_minutes, 0);
        assert_eq!(round_money(earnings.daily_earnings), dec!(1281.25));
        assert_eq!(round_money(earnings.net_earnings), dec!(1239.58));
        assert_eq!(earnings.status, AttendanceStatus::Present);
    }

    #[test]
    fn status_at_check_out_depends_only_on_hours() {
        let policy = AttendancePolicy::default();
        assert_eq!(status_for_hours(dec!(8), &policy), AttendanceStatus::Present);
        assert_eq!(status_for_hours(dec!(7.99), &policy), AttendanceStatus::HalfDay);
        assert_eq!(status_for_hours(dec!(4), &policy), AttendanceStatus::HalfDay);
        assert_eq!(status_for_hours(dec!(3.99), &policy), AttendanceStatus::EarlyLeave);

        // a late arrival that still works a full day closes as present and keeps its penalty
        let late_full_day = compute_check_out(&input(at(9, 30), at(18, 0)), &policy);
        assert_eq!(late_full_day.status, AttendanceStatus::Present);
        assert!(late_full_day.late_penalty > Decimal::ZERO);
    }

    #[test]
    fn net_earnings_follow_the_closed_form() {
        let policy = AttendancePolicy::default();
        let i = input(at(9, 40), at(16, 10));
        let e = compute_check_out(&i, &policy);

        let hours = e.work_hours;
        let expected = hours.min(dec!(8)) * i.rates.hourly_wage
            + (hours - dec!(8)).max(Decimal::ZERO) * i.rates.hourly_wage * dec!(1.5)
            - Decimal::from(40) * i.rates.minute_wage
            - Decimal::from(110) * i.rates.minute_wage;

        assert_eq!(e.early_leave_minutes, 110);
        assert!((round_money(e.net_earnings) - round_money(expected)).abs() <= dec!(0.01));
        assert_eq!(e.status, AttendanceStatus::HalfDay);
    }

    #[test]
    fn short_day_is_early_leave() {
        let e = compute_check_out(&input(at(9, 0), at(12, 0)), &AttendancePolicy::default());
        assert_eq!(e.work_hours, dec!(3));
        assert_eq!(e.status, AttendanceStatus::EarlyLeave);
        assert_eq!(e.early_leave_minutes, 360);
        assert_eq!(e.overtime_hours, Decimal::ZERO);
    }

    #[test]
    fn full_on_time_day_earns_daily_wage() {
        let e = compute_check_out(&input(at(9, 0), at(18, 0)), &AttendancePolicy::default());
        assert_eq!(e.status, AttendanceStatus::Present);
        // 9h on the clock with 8 standard hours
        assert_eq!(round_money(e.daily_earnings), dec!(1187.50));
        assert_eq!(e.late_penalty, Decimal::ZERO);
        assert_eq!(e.early_leave_penalty, Decimal::ZERO);
    }

    #[test]
    fn overnight_shift_end_rolls_to_next_day() {
        let check_in = at(22, 0);
        let end = scheduled_end(check_in, time(22, 0), time(6, 0));
        assert_eq!(end, at(6, 0) + Duration::days(1));
    }

    #[test]
    fn local_time_round_trips_through_offset() {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let local = at(9, 20);
        let utc = local_to_utc(local, offset);
        assert_eq!(utc.naive_utc(), at(6, 20));
        assert_eq!(to_local(utc, offset), local);
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::services::test_fixtures::{insert_employee, insert_location};
    use rust_decimal_macros::dec;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_check_ins_leave_one_open_record(pool: PgPool) {
        let location = insert_location(&pool).await;
        let employee = insert_employee(&pool, dec!(30000)).await;
        let policy = AttendancePolicy::default();
        let now = Utc::now();

        let (a, b) = tokio::join!(
            check_in(&pool, &policy, "test", employee.id, location.id, AttendanceMethod::Qr, now),
            check_in(&pool, &policy, "test", employee.id, location.id, AttendanceMethod::Qr, now),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(AppError::Conflict(_))))
        );

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_records WHERE employee_id = $1 AND check_out_time IS NULL",
        )
        .bind(employee.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(open, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn check_out_without_open_record_conflicts(pool: PgPool) {
        let employee = insert_employee(&pool, dec!(30000)).await;
        let result = check_out(
            &pool,
            &AttendancePolicy::default(),
            "test",
            employee.id,
            AttendanceMethod::Qr,
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
