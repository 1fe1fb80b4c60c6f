// src/services/leave.rs

use crate::{
    errors::{AppError, AppResult},
    models::{
        Employee, LeaveListResponse, LeaveRecord, LeaveResponse, LeaveStatus, StartLeaveRequest,
        UpdateLeaveAllowanceRequest,
    },
    services::{audit, employee, finish},
};
use chrono::{Duration, NaiveDate};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

/// Inclusive day count of a leave span.
pub fn span_days(start: NaiveDate, end: NaiveDate) -> AppResult<i32> {
    if end < start {
        return Err(AppError::Validation(
            "Leave end date cannot be before its start date".to_string(),
        ));
    }
    i32::try_from((end - start).num_days() + 1)
        .map_err(|_| AppError::Validation("Leave span is too long".to_string()))
}

/// Days of `start..=end` falling strictly after `ended_on`.
pub fn refundable_days(start: NaiveDate, end: NaiveDate, ended_on: NaiveDate) -> i32 {
    let last_consumed = ended_on.max(start - Duration::days(1));
    let total = (end - start).num_days() + 1;
    let refund = (end - last_consumed).num_days().clamp(0, total);
    i32::try_from(refund).unwrap_or(0)
}

/// On leave with a span that has not already run out.
pub fn is_on_leave(employee: &Employee, today: NaiveDate) -> bool {
    employee.on_leave && employee.leave_end.is_none_or(|end| end >= today)
}

fn response(employee: &Employee, leave: Option<LeaveRecord>) -> LeaveResponse {
    LeaveResponse {
        leave,
        remaining_leave_days: employee.remaining_leave_days,
        monthly_leave_days: employee.monthly_leave_days,
        on_leave: employee.on_leave,
    }
}

async fn overlaps_approved(
    conn: &mut PgConnection,
    employee_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<bool> {
    let overlaps: bool = sqlx::query_scalar(
        r#"SELECT EXISTS (
               SELECT 1 FROM leave_records
               WHERE employee_id = $1
                 AND status = 'approved'
                 AND start_date <= $3
                 AND end_date >= $2
           )"#,
    )
    .bind(employee_id)
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;
    Ok(overlaps)
}

pub async fn start_leave(
    db: &PgPool,
    actor: &str,
    employee_id: Uuid,
    body: StartLeaveRequest,
    today: NaiveDate,
) -> AppResult<LeaveResponse> {
    let days = span_days(body.start_date, body.end_date)?;

    let mut tx = db.begin().await?;
    let result: AppResult<LeaveResponse> = async {
        let employee = employee::lock(&mut tx, employee_id).await?;

        if is_on_leave(&employee, today) {
            return Err(AppError::Conflict(format!(
                "Employee {} is already on leave",
                employee_id
            )));
        }
        if overlaps_approved(&mut tx, employee_id, body.start_date, body.end_date).await? {
            return Err(AppError::Conflict(
                "Requested leave overlaps an approved leave span".to_string(),
            ));
        }
        if days > employee.remaining_leave_days {
            return Err(AppError::InsufficientBalance {
                requested: days,
                remaining: employee.remaining_leave_days,
            });
        }

        let employee = sqlx::query_as::<_, Employee>(
            r#"UPDATE employees
               SET remaining_leave_days = remaining_leave_days - $1,
                   on_leave = true,
                   leave_start = $2,
                   leave_end = $3,
                   updated_at = NOW()
               WHERE id = $4
               RETURNING *"#,
        )
        .bind(days)
        .bind(body.start_date)
        .bind(body.end_date)
        .bind(employee_id)
        .fetch_one(&mut *tx)
        .await?;

        // No separate approval gate: leave is approved when it starts
        let leave = sqlx::query_as::<_, LeaveRecord>(
            r#"INSERT INTO leave_records (
                id, employee_id, start_date, end_date, days, leave_type,
                status, reason, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 'approved', $7, $8, NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(body.start_date)
        .bind(body.end_date)
        .bind(days)
        .bind(body.leave_type)
        .bind(body.reason.as_deref())
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor,
            "leave.start",
            "leave_records",
            Some(leave.id),
            Some(json!({
                "days": days,
                "remaining_leave_days": employee.remaining_leave_days,
            })),
        )
        .await?;

        Ok(response(&employee, Some(leave)))
    }
    .await;

    let response = finish(tx, result, "leave.start").await?;
    info!(
        "Employee {} started {} day(s) of leave, {} remaining",
        employee_id, days, response.remaining_leave_days
    );
    Ok(response)
}

pub async fn end_leave(
    db: &PgPool,
    actor: &str,
    employee_id: Uuid,
    today: NaiveDate,
) -> AppResult<LeaveResponse> {
    let mut tx = db.begin().await?;
    let result: AppResult<LeaveResponse> = async {
        let employee = employee::lock(&mut tx, employee_id).await?;
        let (Some(start), Some(end)) = (employee.leave_start, employee.leave_end) else {
            return Err(AppError::NotOnLeave(employee_id));
        };
        if !employee.on_leave {
            return Err(AppError::NotOnLeave(employee_id));
        }

        let refund = refundable_days(start, end, today);

        let leave = sqlx::query_as::<_, LeaveRecord>(
            r#"SELECT * FROM leave_records
               WHERE employee_id = $1 AND status = 'approved'
                 AND start_date = $2 AND end_date = $3
               ORDER BY created_at DESC
               LIMIT 1
               FOR UPDATE"#,
        )
        .bind(employee_id)
        .bind(start)
        .bind(end)
        .fetch_optional(&mut *tx)
        .await?;

        let leave = match leave {
            Some(leave) if refund >= leave.days => Some(
                sqlx::query_as::<_, LeaveRecord>(
                    r#"UPDATE leave_records
                       SET status = $1, ended_at = NOW()
                       WHERE id = $2
                       RETURNING *"#,
                )
                .bind(LeaveStatus::Cancelled)
                .bind(leave.id)
                .fetch_one(&mut *tx)
                .await?,
            ),
            Some(leave) => {
                let shortened_end = if refund > 0 { today } else { leave.end_date };
                Some(
                    sqlx::query_as::<_, LeaveRecord>(
                        r#"UPDATE leave_records
                           SET end_date = $1, days = days - $2, ended_at = NOW()
                           WHERE id = $3
                           RETURNING *"#,
                    )
                    .bind(shortened_end)
                    .bind(refund)
                    .bind(leave.id)
                    .fetch_one(&mut *tx)
                    .await?,
                )
            }
            None => None,
        };

        let employee = sqlx::query_as::<_, Employee>(
            r#"UPDATE employees
               SET remaining_leave_days = remaining_leave_days + $1,
                   on_leave = false,
                   leave_start = NULL,
                   leave_end = NULL,
                   updated_at = NOW()
               WHERE id = $2
               RETURNING *"#,
        )
        .bind(refund)
        .bind(employee_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor,
            "leave.end",
            "employees",
            Some(employee_id),
            Some(json!({
                "refunded_days": refund,
                "leave_id": leave.as_ref().map(|l| l.id),
            })),
        )
        .await?;

        Ok(response(&employee, leave))
    }
    .await;

    let response = finish(tx, result, "leave.end").await?;
    info!(
        "Employee {} ended leave, balance now {}",
        employee_id, response.remaining_leave_days
    );
    Ok(response)
}

/// Administrative override of the allotment and, optionally, the balance.
pub async fn update_allowance(
    db: &PgPool,
    actor: &str,
    employee_id: Uuid,
    body: UpdateLeaveAllowanceRequest,
) -> AppResult<LeaveResponse> {
    if body.monthly_leave_days < 0 || body.remaining_leave_days.is_some_and(|d| d < 0) {
        return Err(AppError::Validation(
            "Leave days cannot be negative".to_string(),
        ));
    }

    let mut tx = db.begin().await?;
    let result: AppResult<LeaveResponse> = async {
        let employee = sqlx::query_as::<_, Employee>(
            r#"UPDATE employees
               SET monthly_leave_days = $1,
                   remaining_leave_days = COALESCE($2, remaining_leave_days),
                   updated_at = NOW()
               WHERE id = $3
               RETURNING *"#,
        )
        .bind(body.monthly_leave_days)
        .bind(body.remaining_leave_days)
        .bind(employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))?;

        audit::record(
            &mut tx,
            actor,
            "leave.update_allowance",
            "employees",
            Some(employee_id),
            Some(json!({
                "monthly_leave_days": employee.monthly_leave_days,
                "remaining_leave_days": employee.remaining_leave_days,
            })),
        )
        .await?;

        Ok(response(&employee, None))
    }
    .await;

    finish(tx, result, "leave.update_allowance").await
}

pub async fn list(db: &PgPool, employee_id: Uuid) -> AppResult<LeaveListResponse> {
    let employee = employee::find(db, employee_id).await?;
    let leaves = sqlx::query_as::<_, LeaveRecord>(
        "SELECT * FROM leave_records WHERE employee_id = $1 ORDER BY start_date DESC",
    )
    .bind(employee_id)
    .fetch_all(db)
    .await?;

    Ok(LeaveListResponse {
        leaves,
        remaining_leave_days: employee.remaining_leave_days,
        on_leave: employee.on_leave,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[test]
    fn span_is_inclusive() {
        assert_eq!(span_days(day(1), day(5)).unwrap(), 5);
        assert_eq!(span_days(day(3), day(3)).unwrap(), 1);
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(matches!(
            span_days(day(5), day(1)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn ending_before_the_span_refunds_everything() {
        assert_eq!(refundable_days(day(10), day(14), day(8)), 5);
        assert_eq!(refundable_days(day(10), day(14), day(9)), 5);
    }

    #[test]
    fn ending_mid_span_refunds_the_remaining_days() {
        assert_eq!(refundable_days(day(10), day(14), day(10)), 4);
        assert_eq!(refundable_days(day(10), day(14), day(12)), 2);
    }

    #[test]
    fn ending_on_or_after_the_last_day_refunds_nothing() {
        assert_eq!(refundable_days(day(10), day(14), day(14)), 0);
        assert_eq!(refundable_days(day(10), day(14), day(20)), 0);
    }
}
