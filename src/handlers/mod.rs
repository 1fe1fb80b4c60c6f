pub mod adjustment;
pub mod advance;
pub mod attendance;
pub mod audit;
pub mod employee;
pub mod general;
pub mod leave;
pub mod notification;
pub mod payroll;

use crate::{errors::AppError, services::attendance::to_local, state::AppState};
use axum::{Json, extract::FromRequest};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// `{ "success": true, ...payload }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// JSON body extractor whose rejections render as `VALIDATION` errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Today's date in business time.
pub fn business_today(state: &AppState) -> NaiveDate {
    to_local(Utc::now(), state.config.attendance.utc_offset).date()
}
