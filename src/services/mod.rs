pub mod adjustment;
pub mod advance;
pub mod attendance;
pub mod audit;
pub mod email;
pub mod employee;
pub mod leave;
pub mod notification;
pub mod payroll;
pub mod wage;

use crate::errors::AppResult;
use sqlx::{Postgres, Transaction};
use tracing::{error, warn};

/// Commit on success, roll back explicitly on failure.
pub async fn finish<T>(
    tx: Transaction<'_, Postgres>,
    result: AppResult<T>,
    operation: &str,
) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            warn!("{} failed: {}, rolling back", operation, err);
            if let Err(rollback_err) = tx.rollback().await {
                error!(
                    "Rollback of {} failed (orig: {}, rollback: {})",
                    operation, err, rollback_err
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
pub mod test_fixtures {
    use crate::{
        models::{CreateEmployeeRequest, CreateLocationRequest, Employee, Location},
        services::employee,
    };
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use uuid::Uuid;

    pub async fn insert_location(pool: &PgPool) -> Location {
        employee::create_location(
            pool,
            "fixture",
            CreateLocationRequest {
                name: "Main branch".to_string(),
                address: None,
            },
        )
        .await
        .unwrap()
    }

    pub async fn insert_employee(pool: &PgPool, monthly_salary: Decimal) -> Employee {
        employee::create(
            pool,
            "fixture",
            CreateEmployeeRequest {
                full_name: "Test Employee".to_string(),
                email: format!("{}@example.com", Uuid::new_v4()),
                role: None,
                monthly_salary,
                standard_hours: None,
                shift_start: None,
                shift_end: None,
                location_id: None,
                monthly_leave_days: Some(3),
            },
        )
        .await
        .unwrap()
    }
}
