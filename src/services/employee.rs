use crate::{
    errors::{AppError, AppResult},
    models::{
        CreateEmployeeRequest, CreateLocationRequest, Employee, EmployeeView, Location, Role,
        UpdateEmployeeRequest, WageRates,
    },
    services::{audit, finish, wage::DEFAULT_STANDARD_HOURS},
};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{Executor, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

pub fn view(employee: Employee) -> EmployeeView {
    let rates = WageRates::for_employee(&employee).rounded();
    EmployeeView { employee, rates }
}

pub async fn find<'e, E>(executor: E, employee_id: Uuid) -> AppResult<Employee>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1")
        .bind(employee_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))
}

/// Row-locks the employee for the rest of the transaction.
pub async fn lock(conn: &mut PgConnection, employee_id: Uuid) -> AppResult<Employee> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1 FOR UPDATE")
        .bind(employee_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))
}

pub async fn list(db: &PgPool) -> AppResult<Vec<Employee>> {
    let employees =
        sqlx::query_as::<_, Employee>("SELECT * FROM employees ORDER BY full_name ASC")
            .fetch_all(db)
            .await?;
    Ok(employees)
}

fn validate_pay_inputs(monthly_salary: Option<Decimal>, standard_hours: Option<Decimal>) -> AppResult<()> {
    if matches!(monthly_salary, Some(s) if s < Decimal::ZERO) {
        return Err(AppError::Validation("Monthly salary cannot be negative".to_string()));
    }
    if matches!(standard_hours, Some(h) if h <= Decimal::ZERO || h > Decimal::from(24)) {
        return Err(AppError::Validation(
            "Standard hours must be greater than 0 and at most 24".to_string(),
        ));
    }
    Ok(())
}

pub async fn create(db: &PgPool, actor: &str, body: CreateEmployeeRequest) -> AppResult<Employee> {
    if body.full_name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(AppError::Validation("Name and email are required".to_string()));
    }
    validate_pay_inputs(Some(body.monthly_salary), body.standard_hours)?;
    let leave_days = body.monthly_leave_days.unwrap_or(0);
    if leave_days < 0 {
        return Err(AppError::Validation("Leave days cannot be negative".to_string()));
    }

    let mut tx = db.begin().await?;
    let result: AppResult<Employee> = async {
        let employee = sqlx::query_as::<_, Employee>(
            r#"INSERT INTO employees (
                id, full_name, email, role, monthly_salary, standard_hours,
                shift_start, shift_end, location_id, is_active,
                monthly_leave_days, remaining_leave_days, on_leave, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,true,$10,$10,false,NOW(),NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(body.full_name.trim())
        .bind(body.email.trim())
        .bind(body.role.unwrap_or(Role::Staff))
        .bind(body.monthly_salary)
        .bind(body.standard_hours.unwrap_or(DEFAULT_STANDARD_HOURS))
        .bind(body.shift_start.unwrap_or(default_shift_start()))
        .bind(body.shift_end.unwrap_or(default_shift_end()))
        .bind(body.location_id)
        .bind(leave_days)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::Conflict(format!("Employee with email '{}' already exists", body.email))
            } else {
                e
            }
        })?;

        audit::record(
            &mut tx,
            actor,
            "employee.create",
            "employees",
            Some(employee.id),
            Some(json!({ "monthly_salary": employee.monthly_salary })),
        )
        .await?;

        Ok(employee)
    }
    .await;

    let employee = finish(tx, result, "employee.create").await?;
    info!("Employee {} created", employee.id);
    Ok(employee)
}

pub async fn update(
    db: &PgPool,
    actor: &str,
    employee_id: Uuid,
    body: UpdateEmployeeRequest,
) -> AppResult<Employee> {
    validate_pay_inputs(body.monthly_salary, body.standard_hours)?;

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE employees SET updated_at = NOW()");
    if let Some(name) = &body.full_name {
        query.push(", full_name = ").push_bind(name.trim().to_string());
    }
    if let Some(email) = &body.email {
        query.push(", email = ").push_bind(email.trim().to_string());
    }
    if let Some(salary) = body.monthly_salary {
        query.push(", monthly_salary = ").push_bind(salary);
    }
    if let Some(hours) = body.standard_hours {
        query.push(", standard_hours = ").push_bind(hours);
    }
    if let Some(start) = body.shift_start {
        query.push(", shift_start = ").push_bind(start);
    }
    if let Some(end) = body.shift_end {
        query.push(", shift_end = ").push_bind(end);
    }
    if let Some(location_id) = body.location_id {
        query.push(", location_id = ").push_bind(location_id);
    }
    if let Some(active) = body.is_active {
        query.push(", is_active = ").push_bind(active);
    }
    query
        .push(" WHERE id = ")
        .push_bind(employee_id)
        .push(" RETURNING *");

    let mut tx = db.begin().await?;
    let result: AppResult<Employee> = async {
        let employee = query
            .build_query_as::<Employee>()
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)
            .map_err(|e| {
                if e.is_unique_violation() {
                    AppError::Conflict("Email already in use".to_string())
                } else {
                    e
                }
            })?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))?;

        audit::record(
            &mut tx,
            actor,
            "employee.update",
            "employees",
            Some(employee.id),
            Some(json!({
                "monthly_salary": employee.monthly_salary,
                "standard_hours": employee.standard_hours,
                "is_active": employee.is_active,
            })),
        )
        .await?;

        Ok(employee)
    }
    .await;

    finish(tx, result, "employee.update").await
}

fn default_shift_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_shift_end() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN)
}

// ─── Locations ────────────────────────────────────────────────────────────────

pub async fn create_location(
    db: &PgPool,
    actor: &str,
    body: CreateLocationRequest,
) -> AppResult<Location> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Location name is required".to_string()));
    }

    let mut tx = db.begin().await?;
    let result: AppResult<Location> = async {
        let location = sqlx::query_as::<_, Location>(
            r#"INSERT INTO locations (id, name, address, is_active, created_at)
               VALUES ($1, $2, $3, true, NOW())
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(body.name.trim())
        .bind(body.address.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(&mut tx, actor, "location.create", "locations", Some(location.id), None)
            .await?;
        Ok(location)
    }
    .await;

    finish(tx, result, "location.create").await
}

pub async fn list_locations(db: &PgPool) -> AppResult<Vec<Location>> {
    let locations = sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY name ASC")
        .fetch_all(db)
        .await?;
    Ok(locations)
}

pub async fn find_active_location(conn: &mut PgConnection, location_id: Uuid) -> AppResult<Location> {
    let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
        .bind(location_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Location {} not found", location_id)))?;

    if !location.is_active {
        return Err(AppError::Validation(format!(
            "Location {} is not active",
            location_id
        )));
    }
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_negative_salary_and_zero_hours() {
        assert!(validate_pay_inputs(Some(dec!(-1)), None).is_err());
        assert!(validate_pay_inputs(None, Some(Decimal::ZERO)).is_err());
        assert!(validate_pay_inputs(None, Some(dec!(25))).is_err());
        assert!(validate_pay_inputs(Some(dec!(30000)), Some(dec!(8))).is_ok());
        assert!(validate_pay_inputs(None, None).is_ok());
    }
}
