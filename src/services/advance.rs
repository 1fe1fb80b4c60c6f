// src/services/advance.rs

use crate::{
    errors::{AppError, AppResult},
    models::{
        AdvanceFilter, AdvanceListResponse, AdvancePayment, AdvanceResponse, AdvanceStats,
        AdvanceStatus, Decision, PayAdvanceRequest, RequestAdvanceRequest,
    },
    services::{audit, employee, finish, wage::round_money},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{Executor, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

impl AdvanceStatus {
    pub fn decide(self, decision: Decision) -> AppResult<AdvanceStatus> {
        match (self, decision) {
            (AdvanceStatus::Pending, Decision::Approve) => Ok(AdvanceStatus::Approved),
            (AdvanceStatus::Pending, Decision::Reject) => Ok(AdvanceStatus::Rejected),
            (status, _) => Err(AppError::InvalidState(format!(
                "Advance is {:?}; only pending advances can be decided",
                status
            ))),
        }
    }

    pub fn pay(self) -> AppResult<AdvanceStatus> {
        match self {
            AdvanceStatus::Approved => Ok(AdvanceStatus::Paid),
            status => Err(AppError::InvalidState(format!(
                "Advance is {:?}; only approved advances can be paid",
                status
            ))),
        }
    }
}

/// Returns the amount rounded to cents once it is positive and at most
/// `cap_ratio` of the monthly salary.
pub fn validate_amount(
    amount: Decimal,
    monthly_salary: Decimal,
    cap_ratio: Decimal,
) -> AppResult<Decimal> {
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Advance amount must be greater than zero".to_string(),
        ));
    }
    let cap = monthly_salary * cap_ratio;
    if amount > cap {
        return Err(AppError::Validation(format!(
            "Advance amount {} exceeds the allowed maximum of {}",
            amount,
            round_money(cap)
        )));
    }
    Ok(amount)
}

pub fn fold_stats(rows: &[(AdvanceStatus, i64, Decimal)], outstanding: Decimal) -> AdvanceStats {
    let mut stats = AdvanceStats {
        outstanding_deduction: outstanding,
        ..AdvanceStats::default()
    };
    for &(status, count, amount) in rows {
        let (c, a) = match status {
            AdvanceStatus::Pending => (&mut stats.pending_count, &mut stats.pending_amount),
            AdvanceStatus::Approved => (&mut stats.approved_count, &mut stats.approved_amount),
            AdvanceStatus::Rejected => (&mut stats.rejected_count, &mut stats.rejected_amount),
            AdvanceStatus::Paid => (&mut stats.paid_count, &mut stats.paid_amount),
        };
        *c += count;
        *a += amount;
    }
    stats
}

pub async fn stats<'e, E>(executor: E, employee_id: Option<Uuid>) -> AppResult<AdvanceStats>
where
    E: Executor<'e, Database = Postgres> + Copy,
{
    let rows = sqlx::query_as::<_, (AdvanceStatus, i64, Decimal)>(
        r#"SELECT status, COUNT(*), COALESCE(SUM(amount), 0)
           FROM advance_payments
           WHERE ($1::uuid IS NULL OR employee_id = $1)
           GROUP BY status"#,
    )
    .bind(employee_id)
    .fetch_all(executor)
    .await?;

    let outstanding: Decimal = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(amount), 0)
           FROM advance_payments
           WHERE status = 'paid' AND deduction_status = 'pending'
             AND ($1::uuid IS NULL OR employee_id = $1)"#,
    )
    .bind(employee_id)
    .fetch_one(executor)
    .await?;

    Ok(fold_stats(&rows, outstanding))
}

/// Paid advances not yet offset against any payroll, regardless of period.
pub async fn outstanding_total(conn: &mut PgConnection, employee_id: Uuid) -> AppResult<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(amount), 0)
           FROM advance_payments
           WHERE employee_id = $1 AND status = 'paid' AND deduction_status = 'pending'"#,
    )
    .bind(employee_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(total)
}

/// Marks every outstanding advance of the employee as deducted by `payroll_id`.
/// Returns how many were closed and their total.
pub async fn close_outstanding(
    conn: &mut PgConnection,
    employee_id: Uuid,
    payroll_id: Uuid,
) -> AppResult<(usize, Decimal)> {
    let amounts: Vec<Decimal> = sqlx::query_scalar(
        r#"UPDATE advance_payments
           SET deduction_status = 'completed', payroll_id = $1, updated_at = NOW()
           WHERE employee_id = $2 AND status = 'paid' AND deduction_status = 'pending'
           RETURNING amount"#,
    )
    .bind(payroll_id)
    .bind(employee_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok((amounts.len(), amounts.iter().sum()))
}

async fn lock(conn: &mut PgConnection, advance_id: Uuid) -> AppResult<AdvancePayment> {
    sqlx::query_as::<_, AdvancePayment>("SELECT * FROM advance_payments WHERE id = $1 FOR UPDATE")
        .bind(advance_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Advance {} not found", advance_id)))
}

pub async fn request(
    db: &PgPool,
    cap_ratio: Decimal,
    actor: &str,
    employee_id: Uuid,
    body: RequestAdvanceRequest,
) -> AppResult<AdvanceResponse> {
    let mut tx = db.begin().await?;
    let result: AppResult<AdvancePayment> = async {
        let employee = employee::find(&mut *tx, employee_id).await?;
        let amount = match validate_amount(body.amount, employee.monthly_salary, cap_ratio) {
            Ok(amount) => amount,
            Err(e) => {
                warn!("Advance request for {} rejected: {}", employee_id, e);
                return Err(e);
            }
        };

        let advance = sqlx::query_as::<_, AdvancePayment>(
            r#"INSERT INTO advance_payments (
                id, employee_id, amount, reason, status, requested_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, 'pending', $5, NOW(), NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(amount)
        .bind(body.reason.as_deref())
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor,
            "advance.request",
            "advance_payments",
            Some(advance.id),
            Some(json!({ "amount": advance.amount })),
        )
        .await?;

        Ok(advance)
    }
    .await;

    let advance = finish(tx, result, "advance.request").await?;
    info!("Advance {} requested for employee {}", advance.id, employee_id);
    let stats = stats(db, Some(employee_id)).await?;
    Ok(AdvanceResponse { advance, stats })
}

pub async fn decide(
    db: &PgPool,
    actor: &str,
    advance_id: Uuid,
    decision: Decision,
) -> AppResult<AdvanceResponse> {
    let mut tx = db.begin().await?;
    let result: AppResult<AdvancePayment> = async {
        let current = lock(&mut tx, advance_id).await?;
        let next = current.status.decide(decision)?;

        let advance = sqlx::query_as::<_, AdvancePayment>(
            r#"UPDATE advance_payments
               SET status = $1, decided_by = $2, decided_at = NOW(), updated_at = NOW()
               WHERE id = $3
               RETURNING *"#,
        )
        .bind(next)
        .bind(actor)
        .bind(advance_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor,
            "advance.decide",
            "advance_payments",
            Some(advance_id),
            Some(json!({ "from": current.status, "to": next })),
        )
        .await?;

        Ok(advance)
    }
    .await;

    let advance = finish(tx, result, "advance.decide").await?;
    info!("Advance {} is now {:?}", advance_id, advance.status);
    let stats = stats(db, Some(advance.employee_id)).await?;
    Ok(AdvanceResponse { advance, stats })
}

pub async fn pay(
    db: &PgPool,
    actor: &str,
    advance_id: Uuid,
    body: PayAdvanceRequest,
    today: NaiveDate,
) -> AppResult<AdvanceResponse> {
    if body.payment_method.trim().is_empty() {
        return Err(AppError::Validation("Payment method is required".to_string()));
    }

    let mut tx = db.begin().await?;
    let result: AppResult<AdvancePayment> = async {
        let current = lock(&mut tx, advance_id).await?;
        let next = current.status.pay()?;

        let advance = sqlx::query_as::<_, AdvancePayment>(
            r#"UPDATE advance_payments
               SET status = $1,
                   deduction_status = 'pending',
                   paid_by = $2,
                   payment_date = $3,
                   payment_method = $4,
                   updated_at = NOW()
               WHERE id = $5
               RETURNING *"#,
        )
        .bind(next)
        .bind(actor)
        .bind(body.payment_date.unwrap_or(today))
        .bind(body.payment_method.trim())
        .bind(advance_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            actor,
            "advance.pay",
            "advance_payments",
            Some(advance_id),
            Some(json!({
                "amount": advance.amount,
                "payment_method": advance.payment_method,
            })),
        )
        .await?;

        Ok(advance)
    }
    .await;

    let advance = finish(tx, result, "advance.pay").await?;
    info!(
        "Advance {} paid; {} pending deduction for employee {}",
        advance_id, advance.amount, advance.employee_id
    );
    let stats = stats(db, Some(advance.employee_id)).await?;
    Ok(AdvanceResponse { advance, stats })
}

pub async fn list(db: &PgPool, filter: &AdvanceFilter) -> AppResult<AdvanceListResponse> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM advance_payments WHERE TRUE");
    if let Some(employee_id) = filter.employee_id {
        query.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    query.push(" ORDER BY created_at DESC LIMIT 500");

    let advances = query
        .build_query_as::<AdvancePayment>()
        .fetch_all(db)
        .await?;
    let stats = stats(db, filter.employee_id).await?;

    Ok(AdvanceListResponse { advances, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn exactly_half_the_salary_is_allowed() {
        assert!(validate_amount(dec!(15000), dec!(30000), dec!(0.5)).is_ok());
    }

    #[test]
    fn over_the_cap_is_a_validation_error() {
        assert!(matches!(
            validate_amount(dec!(15000.01), dec!(30000), dec!(0.5)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(validate_amount(Decimal::ZERO, dec!(30000), dec!(0.5)).is_err());
        assert!(validate_amount(dec!(-10), dec!(30000), dec!(0.5)).is_err());
    }

    #[test]
    fn sub_cent_amounts_round_to_zero_and_are_rejected() {
        assert!(matches!(
            validate_amount(dec!(0.004), dec!(30000), dec!(0.5)),
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            validate_amount(dec!(0.005), dec!(30000), dec!(0.5)).unwrap(),
            dec!(0.01)
        );
    }

    #[test]
    fn only_pending_advances_can_be_decided() {
        assert_eq!(
            AdvanceStatus::Pending.decide(Decision::Approve).unwrap(),
            AdvanceStatus::Approved
        );
        assert_eq!(
            AdvanceStatus::Pending.decide(Decision::Reject).unwrap(),
            AdvanceStatus::Rejected
        );
        for status in [
            AdvanceStatus::Approved,
            AdvanceStatus::Rejected,
            AdvanceStatus::Paid,
        ] {
            assert!(matches!(
                status.decide(Decision::Approve),
                Err(AppError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn only_approved_advances_can_be_paid() {
        assert_eq!(AdvanceStatus::Approved.pay().unwrap(), AdvanceStatus::Paid);
        assert!(AdvanceStatus::Pending.pay().is_err());
        assert!(AdvanceStatus::Rejected.pay().is_err());
        assert!(AdvanceStatus::Paid.pay().is_err());
    }

    #[test]
    fn stats_fold_counts_and_amounts_per_status() {
        let stats = fold_stats(
            &[
                (AdvanceStatus::Pending, 2, dec!(500)),
                (AdvanceStatus::Paid, 1, dec!(1200)),
            ],
            dec!(1200),
        );
        assert_eq!(
            stats,
            AdvanceStats {
                pending_count: 2,
                pending_amount: dec!(500),
                paid_count: 1,
                paid_amount: dec!(1200),
                outstanding_deduction: dec!(1200),
                ..AdvanceStats::default()
            }
        );
    }
}
