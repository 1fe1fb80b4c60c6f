// src/services/adjustment.rs

use crate::{
    errors::{AppError, AppResult},
    models::{
        AdjustmentFilter, AdjustmentListResponse, AdjustmentResponse, AdjustmentStatus,
        AdjustmentType, AttendanceRecord, CreateAdjustmentRequest, Decision, SalaryAdjustment,
    },
    services::{attendance, audit, employee, finish, wage::round_money},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

impl AdjustmentType {
    /// Penalties reduce earnings; every other type adds to them.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            AdjustmentType::Penalty => -amount,
            AdjustmentType::Bonus | AdjustmentType::Refund | AdjustmentType::Correction => amount,
        }
    }
}

impl AdjustmentStatus {
    pub fn decide(self, decision: Decision) -> AppResult<AdjustmentStatus> {
        match (self, decision) {
            (AdjustmentStatus::Pending, Decision::Approve) => Ok(AdjustmentStatus::Approved),
            (AdjustmentStatus::Pending, Decision::Reject) => Ok(AdjustmentStatus::Rejected),
            (status, _) => Err(AppError::InvalidState(format!(
                "Adjustment is already {:?}",
                status
            ))),
        }
    }
}

/// Returns the amount rounded to cents, as it will be stored.
fn validate(body: &CreateAdjustmentRequest) -> AppResult<Decimal> {
    let amount = round_money(body.amount);
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Adjustment amount must be at least 0.01".to_string(),
        ));
    }
    if body.reason.trim().is_empty() {
        return Err(AppError::Validation("Adjustment reason is required".to_string()));
    }
    Ok(amount)
}

async fn lock_attendance(
    conn: &mut PgConnection,
    attendance_id: Uuid,
    employee_id: Uuid,
) -> AppResult<AttendanceRecord> {
    let record =
        sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance_records WHERE id = $1 FOR UPDATE")
            .bind(attendance_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Attendance record {} not found", attendance_id))
            })?;

    if record.employee_id != employee_id {
        return Err(AppError::Validation(format!(
            "Attendance record {} does not belong to employee {}",
            attendance_id, employee_id
        )));
    }
    Ok(record)
}

/// Writes the signed amount to the linked record once and stamps `applied_at`.
async fn apply(
    conn: &mut PgConnection,
    adjustment: &SalaryAdjustment,
) -> AppResult<(SalaryAdjustment, Option<AttendanceRecord>)> {
    let Some(attendance_id) = adjustment.attendance_id else {
        return Ok((adjustment.clone(), None));
    };
    if adjustment.applied_at.is_some() {
        return Ok((adjustment.clone(), None));
    }

    let delta = adjustment.adjustment_type.signed(adjustment.amount);
    let record = attendance::add_to_net_earnings(conn, attendance_id, delta).await?;

    let adjustment = sqlx::query_as::<_, SalaryAdjustment>(
        "UPDATE salary_adjustments SET applied_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(adjustment.id)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        "Adjustment {} applied {} to attendance {}",
        adjustment.id, delta, attendance_id
    );
    Ok((adjustment, Some(record)))
}

pub async fn create(
    db: &PgPool,
    actor: &str,
    body: CreateAdjustmentRequest,
) -> AppResult<AdjustmentResponse> {
    let amount = validate(&body)?;

    let mut tx = db.begin().await?;
    let result: AppResult<AdjustmentResponse> = async {
        employee::find(&mut *tx, body.employee_id).await?;
        let linked = match body.attendance_id {
            Some(id) => Some(lock_attendance(&mut tx, id, body.employee_id).await?),
            None => None,
        };

        let (status, decided_by, decided_at): (AdjustmentStatus, Option<&str>, Option<DateTime<Utc>>) =
            if body.auto_approve {
                (AdjustmentStatus::Approved, Some(actor), Some(Utc::now()))
            } else {
                (AdjustmentStatus::Pending, None, None)
            };

        let adjustment = sqlx::query_as::<_, SalaryAdjustment>(
            r#"INSERT INTO salary_adjustments (
                id, employee_id, attendance_id, adjustment_type, amount, reason,
                status, created_by, decided_by, decided_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(body.employee_id)
        .bind(body.attendance_id)
        .bind(body.adjustment_type)
        .bind(amount)
        .bind(body.reason.trim())
        .bind(status)
        .bind(actor)
        .bind(decided_by)
        .bind(decided_at)
        .fetch_one(&mut *tx)
        .await?;

        let (adjustment, attendance) = if status == AdjustmentStatus::Approved {
            let (adjustment, applied) = apply(&mut tx, &adjustment).await?;
            (adjustment, applied.or(linked))
        } else {
            (adjustment, linked)
        };

        audit::record(
            &mut tx,
            actor,
            "adjustment.create",
            "salary_adjustments",
            Some(adjustment.id),
            Some(json!({
                "type": adjustment.adjustment_type,
                "amount": adjustment.amount,
                "status": adjustment.status,
                "attendance_id": adjustment.attendance_id,
            })),
        )
        .await?;

        Ok(AdjustmentResponse {
            adjustment,
            attendance,
        })
    }
    .await;

    let response = finish(tx, result, "adjustment.create").await?;
    info!(
        "Adjustment {} created as {:?}",
        response.adjustment.id, response.adjustment.status
    );
    Ok(response)
}

pub async fn decide(
    db: &PgPool,
    actor: &str,
    adjustment_id: Uuid,
    decision: Decision,
) -> AppResult<AdjustmentResponse> {
    let mut tx = db.begin().await?;
    let result: AppResult<AdjustmentResponse> = async {
        let current = sqlx::query_as::<_, SalaryAdjustment>(
            "SELECT * FROM salary_adjustments WHERE id = $1 FOR UPDATE",
        )
        .bind(adjustment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Adjustment {} not found", adjustment_id)))?;

        let next = current.status.decide(decision)?;

        let linked = match current.attendance_id {
            Some(id) => Some(lock_attendance(&mut tx, id, current.employee_id).await?),
            None => None,
        };

        let adjustment = sqlx::query_as::<_, SalaryAdjustment>(
            r#"UPDATE salary_adjustments
               SET status = $1, decided_by = $2, decided_at = NOW()
               WHERE id = $3
               RETURNING *"#,
        )
        .bind(next)
        .bind(actor)
        .bind(adjustment_id)
        .fetch_one(&mut *tx)
        .await?;

        let (adjustment, attendance) = if next == AdjustmentStatus::Approved {
            let (adjustment, applied) = apply(&mut tx, &adjustment).await?;
            (adjustment, applied.or(linked))
        } else {
            (adjustment, linked)
        };

        audit::record(
            &mut tx,
            actor,
            "adjustment.decide",
            "salary_adjustments",
            Some(adjustment_id),
            Some(json!({ "from": current.status, "to": next })),
        )
        .await?;

        Ok(AdjustmentResponse {
            adjustment,
            attendance,
        })
    }
    .await;

    let response = finish(tx, result, "adjustment.decide").await?;
    info!("Adjustment {} is now {:?}", adjustment_id, response.adjustment.status);
    Ok(response)
}

pub async fn list(db: &PgPool, filter: &AdjustmentFilter) -> AppResult<AdjustmentListResponse> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM salary_adjustments WHERE TRUE");
    if let Some(employee_id) = filter.employee_id {
        query.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(adjustment_type) = filter.adjustment_type {
        query.push(" AND adjustment_type = ").push_bind(adjustment_type);
    }
    query.push(" ORDER BY created_at DESC LIMIT 500");

    let adjustments = query
        .build_query_as::<SalaryAdjustment>()
        .fetch_all(db)
        .await?;
    Ok(AdjustmentListResponse { adjustments })
}

/// Signed sum of the adjustments already applied to one attendance record.
pub async fn applied_total(conn: &mut PgConnection, attendance_id: Uuid) -> AppResult<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(CASE WHEN adjustment_type = 'penalty' THEN -amount ELSE amount END), 0)
           FROM salary_adjustments
           WHERE attendance_id = $1 AND applied_at IS NOT NULL"#,
    )
    .bind(attendance_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(total)
}

/// Approved penalties created within `[from, to)`.
pub async fn approved_penalties(
    conn: &mut PgConnection,
    employee_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> AppResult<Decimal> {
    let total: Decimal = sqlx::query_scalar(
        r#"SELECT COALESCE(SUM(amount), 0)
           FROM salary_adjustments
           WHERE employee_id = $1
             AND adjustment_type = 'penalty'
             AND status = 'approved'
             AND created_at >= $2 AND created_at < $3"#,
    )
    .bind(employee_id)
    .bind(from)
    .bind(to)
    .fetch_one(&mut *conn)
    .await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn penalty_is_negative_and_others_positive() {
        assert_eq!(AdjustmentType::Penalty.signed(dec!(50)), dec!(-50));
        assert_eq!(AdjustmentType::Bonus.signed(dec!(50)), dec!(50));
        assert_eq!(AdjustmentType::Refund.signed(dec!(50)), dec!(50));
        assert_eq!(AdjustmentType::Correction.signed(dec!(50)), dec!(50));
    }

    #[test]
    fn deciding_twice_is_an_invalid_state() {
        let approved = AdjustmentStatus::Pending.decide(Decision::Approve).unwrap();
        assert_eq!(approved, AdjustmentStatus::Approved);
        assert!(matches!(
            approved.decide(Decision::Reject),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            AdjustmentStatus::Rejected.decide(Decision::Approve),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn amount_must_be_positive() {
        let body = CreateAdjustmentRequest {
            employee_id: Uuid::new_v4(),
            adjustment_type: AdjustmentType::Bonus,
            amount: Decimal::ZERO,
            reason: "good week".to_string(),
            attendance_id: None,
            auto_approve: false,
        };
        assert!(matches!(validate(&body), Err(AppError::Validation(_))));
    }

    #[test]
    fn sub_cent_amount_is_a_validation_error() {
        let mut body = CreateAdjustmentRequest {
            employee_id: Uuid::new_v4(),
            adjustment_type: AdjustmentType::Penalty,
            amount: dec!(0.001),
            reason: "rounding".to_string(),
            attendance_id: None,
            auto_approve: false,
        };
        assert!(matches!(validate(&body), Err(AppError::Validation(_))));

        body.amount = dec!(12.345);
        assert_eq!(validate(&body).unwrap(), dec!(12.35));
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::{
        config::AttendancePolicy,
        models::AttendanceMethod,
        services::test_fixtures::{insert_employee, insert_location},
    };
    use chrono::Duration;
    use rust_decimal_macros::dec;

    async fn closed_record(pool: &PgPool) -> AttendanceRecord {
        let location = insert_location(pool).await;
        let employee = insert_employee(pool, dec!(30000)).await;
        let policy = AttendancePolicy::default();
        let start = Utc::now() - Duration::hours(9);
        attendance::check_in(pool, &policy, "test", employee.id, location.id, AttendanceMethod::Manual, start)
            .await
            .unwrap();
        attendance::check_out(pool, &policy, "test", employee.id, AttendanceMethod::Manual, Utc::now())
            .await
            .unwrap()
    }

    fn request(record: &AttendanceRecord, kind: AdjustmentType, auto_approve: bool) -> CreateAdjustmentRequest {
        CreateAdjustmentRequest {
            employee_id: record.employee_id,
            adjustment_type: kind,
            amount: dec!(50),
            reason: "manual correction".to_string(),
            attendance_id: Some(record.id),
            auto_approve,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn approved_penalty_reduces_net_earnings_once(pool: PgPool) {
        let record = closed_record(&pool).await;

        let created = create(&pool, "admin", request(&record, AdjustmentType::Penalty, false))
            .await
            .unwrap();
        assert_eq!(
            attendance::get(&pool, record.id).await.unwrap().net_earnings,
            record.net_earnings
        );

        let decided = decide(&pool, "admin", created.adjustment.id, Decision::Approve)
            .await
            .unwrap();
        assert!(decided.adjustment.applied_at.is_some());
        assert_eq!(
            attendance::get(&pool, record.id).await.unwrap().net_earnings,
            record.net_earnings - dec!(50)
        );

        let again = decide(&pool, "admin", created.adjustment.id, Decision::Approve).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));
        assert_eq!(
            attendance::get(&pool, record.id).await.unwrap().net_earnings,
            record.net_earnings - dec!(50)
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn rejected_bonus_never_touches_earnings(pool: PgPool) {
        let record = closed_record(&pool).await;
        let created = create(&pool, "admin", request(&record, AdjustmentType::Bonus, false))
            .await
            .unwrap();
        decide(&pool, "admin", created.adjustment.id, Decision::Reject)
            .await
            .unwrap();
        assert_eq!(
            attendance::get(&pool, record.id).await.unwrap().net_earnings,
            record.net_earnings
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn bonus_on_open_record_survives_check_out(pool: PgPool) {
        let location = insert_location(&pool).await;
        let employee = insert_employee(&pool, dec!(30000)).await;
        let policy = AttendancePolicy::default();
        let start = Utc::now() - Duration::hours(9);
        let open = attendance::check_in(&pool, &policy, "test", employee.id, location.id, AttendanceMethod::Manual, start)
            .await
            .unwrap();

        let created = create(
            &pool,
            "admin",
            CreateAdjustmentRequest {
                employee_id: employee.id,
                adjustment_type: AdjustmentType::Bonus,
                amount: dec!(100),
                reason: "covered a shift".to_string(),
                attendance_id: Some(open.id),
                auto_approve: true,
            },
        )
        .await
        .unwrap();
        assert!(created.adjustment.applied_at.is_some());

        let closed = attendance::check_out(&pool, &policy, "test", employee.id, AttendanceMethod::Manual, Utc::now())
            .await
            .unwrap();
        let computed = closed.daily_earnings - closed.late_penalty - closed.early_leave_penalty;
        assert!((closed.net_earnings - (computed + dec!(100))).abs() <= dec!(0.01));

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(applied_total(&mut conn, open.id).await.unwrap(), dec!(100));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn auto_approved_bonus_applies_immediately(pool: PgPool) {
        let record = closed_record(&pool).await;
        let created = create(&pool, "admin", request(&record, AdjustmentType::Bonus, true))
            .await
            .unwrap();
        assert_eq!(created.adjustment.status, AdjustmentStatus::Approved);
        assert_eq!(
            created.attendance.unwrap().net_earnings,
            record.net_earnings + dec!(50)
        );
    }
}
