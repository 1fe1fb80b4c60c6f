use crate::{
    config::Config,
    services::{notification::Notifier, payroll::WorkDayPolicy},
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub notifier: Arc<dyn Notifier>,
    pub work_days: Arc<dyn WorkDayPolicy>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: Config,
        notifier: Arc<dyn Notifier>,
        work_days: Arc<dyn WorkDayPolicy>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            notifier,
            work_days,
        }
    }
}
