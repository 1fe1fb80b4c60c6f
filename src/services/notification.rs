use crate::{
    errors::AppResult,
    models::{Employee, Notification, Payroll},
};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

/// Out-of-band delivery of payroll events to employees.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payslip(&self, employee: &Employee, payroll: &Payroll) -> AppResult<()>;
}

/// Used when no SMTP server is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn payslip(&self, employee: &Employee, payroll: &Payroll) -> AppResult<()> {
        info!(
            employee_id = %employee.id,
            payroll_id = %payroll.id,
            net_salary = %payroll.net_salary,
            "Payslip ready for {}-{:02}",
            payroll.period_year,
            payroll.period_month
        );
        Ok(())
    }
}

/// In-app notification written inside the caller's transaction.
pub async fn push(
    conn: &mut PgConnection,
    employee_id: Uuid,
    title: &str,
    message: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"INSERT INTO notifications (id, employee_id, title, message, is_read, created_at)
           VALUES ($1, $2, $3, $4, false, NOW())"#,
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(title)
    .bind(message)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn list_for(db: &PgPool, employee_id: Uuid) -> AppResult<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE employee_id = $1 ORDER BY created_at DESC LIMIT 100",
    )
    .bind(employee_id)
    .fetch_all(db)
    .await?;

    Ok(notifications)
}
