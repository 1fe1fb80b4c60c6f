use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::{env, str::FromStr};

/// Business rules that turn clock events into money.
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    /// Minutes after scheduled shift start before a check-in counts as late.
    pub late_grace_minutes: i64,
    /// Worked hours at or above which a day is `present`.
    pub full_day_hours: Decimal,
    /// Worked hours at or above which a day is `half_day`.
    pub half_day_hours: Decimal,
    pub overtime_multiplier: Decimal,
    /// Offset at which shift times and payroll months are read.
    pub utc_offset: FixedOffset,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            late_grace_minutes: 15,
            full_day_hours: dec!(8),
            half_day_hours: dec!(4),
            overtime_multiplier: dec!(1.5),
            utc_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub request_timeout_secs: u64,
    pub jwt_secret: String,
    pub attendance: AttendancePolicy,
    /// Largest advance as a fraction of monthly salary.
    pub advance_cap_ratio: Decimal,
    pub weekend_days_per_month: i32,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let offset_minutes: i32 = parse_or("BUSINESS_UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .context("BUSINESS_UTC_OFFSET_MINUTES is out of range")?;

        let attendance = AttendancePolicy {
            late_grace_minutes: parse_or("LATE_GRACE_MINUTES", 15)?,
            full_day_hours: parse_or("FULL_DAY_HOURS", dec!(8))?,
            half_day_hours: parse_or("HALF_DAY_HOURS", dec!(4))?,
            overtime_multiplier: parse_or("OVERTIME_MULTIPLIER", dec!(1.5))?,
            utc_offset,
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
                from_name: env::var("EMAIL_FROM_NAME")
                    .unwrap_or_else(|_| "Payroll Office".to_string()),
                from_address: required("EMAIL_FROM_ADDRESS")?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            jwt_secret: required("JWT_SECRET")?,
            attendance,
            advance_cap_ratio: parse_or("ADVANCE_CAP_RATIO", dec!(0.5))?,
            weekend_days_per_month: parse_or("WEEKEND_DAYS_PER_MONTH", 4)?,
            smtp,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for tests that never touch a real server.
    pub fn for_tests() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_url: "postgres://localhost/attendance_payroll_test".to_string(),
            database_max_connections: 1,
            request_timeout_secs: 5,
            jwt_secret: "test-secret-that-is-long-enough".to_string(),
            attendance: AttendancePolicy::default(),
            advance_cap_ratio: dec!(0.5),
            weekend_days_per_month: 4,
            smtp: None,
        }
    }
}
