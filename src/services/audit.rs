use crate::{
    errors::AppResult,
    models::{AuditFilter, AuditLog},
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub const DEFAULT_LIST_LIMIT: i64 = 200;

/// One entry per mutating operation, written in the same transaction as the change.
pub async fn record(
    conn: &mut PgConnection,
    actor: &str,
    action: &str,
    table_name: &str,
    record_id: Option<Uuid>,
    details: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"INSERT INTO audit_logs (id, actor, action, table_name, record_id, details, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, NOW())"#,
    )
    .bind(Uuid::new_v4())
    .bind(actor)
    .bind(action)
    .bind(table_name)
    .bind(record_id)
    .bind(details)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn list(db: &PgPool, filter: &AuditFilter) -> AppResult<Vec<AuditLog>> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM audit_logs WHERE TRUE");

    if let Some(table_name) = &filter.table_name {
        query.push(" AND table_name = ").push_bind(table_name.clone());
    }
    if let Some(record_id) = filter.record_id {
        query.push(" AND record_id = ").push_bind(record_id);
    }
    if let Some(actor) = &filter.actor {
        query.push(" AND actor = ").push_bind(actor.clone());
    }

    let limit = filter
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, DEFAULT_LIST_LIMIT);
    query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit);

    let logs = query.build_query_as::<AuditLog>().fetch_all(db).await?;
    Ok(logs)
}
