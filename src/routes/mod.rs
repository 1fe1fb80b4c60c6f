// src/routes/mod.rs

use crate::{
    handlers::{
        adjustment::{create_adjustment, decide_adjustment, list_adjustments},
        advance::{decide_advance, list_advances, pay_advance, request_advance},
        attendance::{clock, get_attendance, list_attendance, open_attendance},
        audit::list_audit_logs,
        employee::{
            create_employee, create_location, get_employee, list_employees, list_locations,
            update_employee,
        },
        general::health_handler,
        leave::{end_leave, list_leave, start_leave, update_allowance},
        notification::list_notifications,
        payroll::{
            calculate_payroll, create_tax_rates, current_tax_rates, decide_payroll, get_payroll,
            list_payrolls,
        },
    },
    openapi::ApiDoc,
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // ─── Employees & Locations ────────────────────────────
        .route("/employees", post(create_employee).get(list_employees))
        .route(
            "/employees/{employee_id}",
            get(get_employee).patch(update_employee),
        )
        .route("/locations", post(create_location).get(list_locations))
        // ─── Attendance ───────────────────────────────────────
        .route("/attendance/clock", post(clock))
        .route("/attendance", get(list_attendance))
        .route("/attendance/open", get(open_attendance))
        .route("/attendance/{attendance_id}", get(get_attendance))
        // ─── Leave ────────────────────────────────────────────
        .route("/leave/start", post(start_leave))
        .route("/leave/end", post(end_leave))
        .route("/employees/{employee_id}/leave", get(list_leave))
        .route(
            "/employees/{employee_id}/leave-allowance",
            put(update_allowance),
        )
        // ─── Advances ─────────────────────────────────────────
        .route("/advances", post(request_advance).get(list_advances))
        .route("/advances/{advance_id}/decision", post(decide_advance))
        .route("/advances/{advance_id}/pay", post(pay_advance))
        // ─── Adjustments ──────────────────────────────────────
        .route("/adjustments", post(create_adjustment).get(list_adjustments))
        .route(
            "/adjustments/{adjustment_id}/decision",
            post(decide_adjustment),
        )
        // ─── Payroll & Tax Rates ──────────────────────────────
        .route("/payroll/calculate", post(calculate_payroll))
        .route("/payroll", get(list_payrolls))
        .route("/payroll/{payroll_id}", get(get_payroll))
        .route("/payroll/{payroll_id}/decision", post(decide_payroll))
        .route("/tax-rates", post(create_tax_rates))
        .route("/tax-rates/current", get(current_tax_rates))
        // ─── Notifications & Audit ────────────────────────────
        .route("/notifications", get(list_notifications))
        .route("/audit-logs", get(list_audit_logs))
}

/// Full application router, without transport layers.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api_routes())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::tests::token_for,
        config::Config,
        models::Role,
        services::{notification::LogNotifier, payroll::WeekendApproximation},
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    // The pool never connects; every request below is rejected before any query
    fn app() -> (Router, Config) {
        let config = Config::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let state = AppState::new(
            pool,
            config.clone(),
            Arc::new(LogNotifier),
            Arc::new(WeekendApproximation { weekend_days: 4 }),
        );
        (app_router(state), config)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized_with_error_envelope() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            post_json("/api/v1/attendance/clock", None, r#"{"location_id":"x"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "UNAUTHORIZED");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let (app, _) = app();
        let token = token_for(Uuid::new_v4(), Role::Admin, "some-other-secret");
        let (status, body) = send(
            app,
            Request::builder()
                .uri("/api/v1/employees")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn staff_cannot_run_payroll() {
        let (app, config) = app();
        let token = token_for(Uuid::new_v4(), Role::Staff, &config.jwt_secret);
        let body = format!(
            r#"{{"employee_id":"{}","year":2025,"month":3}}"#,
            Uuid::new_v4()
        );
        let (status, body) = send(
            app,
            post_json("/api/v1/payroll/calculate", Some(&token), &body),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn staff_cannot_clock_someone_else() {
        let (app, config) = app();
        let token = token_for(Uuid::new_v4(), Role::Staff, &config.jwt_secret);
        let body = format!(
            r#"{{"employee_id":"{}","location_id":"{}","action":"check-in"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let (status, _) = send(app, post_json("/api/v1/attendance/clock", Some(&token), &body)).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let (app, config) = app();
        let token = token_for(Uuid::new_v4(), Role::Staff, &config.jwt_secret);
        let (status, body) = send(
            app,
            post_json(
                "/api/v1/attendance/clock",
                Some(&token),
                r#"{"action":"teleport"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "VALIDATION");
    }

    #[tokio::test]
    async fn inverted_leave_span_is_rejected_before_touching_the_database() {
        let (app, config) = app();
        let token = token_for(Uuid::new_v4(), Role::Staff, &config.jwt_secret);
        let (status, body) = send(
            app,
            post_json(
                "/api/v1/leave/start",
                Some(&token),
                r#"{"start_date":"2025-04-10","end_date":"2025-04-01","leave_type":"annual"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "VALIDATION");
    }

    #[tokio::test]
    async fn out_of_range_month_is_rejected() {
        let (app, config) = app();
        let token = token_for(Uuid::new_v4(), Role::Admin, &config.jwt_secret);
        let body = format!(
            r#"{{"employee_id":"{}","year":2025,"month":13}}"#,
            Uuid::new_v4()
        );
        let (status, body) = send(
            app,
            post_json("/api/v1/payroll/calculate", Some(&token), &body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "VALIDATION");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/attendance/clock"].is_object());
    }
}
