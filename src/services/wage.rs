// src/services/wage.rs

use crate::models::{Employee, WageRates};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub const DEFAULT_STANDARD_HOURS: Decimal = dec!(8);
pub const DAYS_PER_MONTH: Decimal = dec!(30);
const MINUTES_PER_HOUR: Decimal = dec!(60);

impl WageRates {
    /// daily = monthly / 30, hourly = daily / standard hours, minute = hourly / 60.
    /// Computed on every use so salary changes apply immediately.
    pub fn derive(monthly_salary: Decimal, standard_hours: Decimal) -> Self {
        let standard_hours = if standard_hours > Decimal::ZERO {
            standard_hours
        } else {
            DEFAULT_STANDARD_HOURS
        };
        let daily_wage = monthly_salary / DAYS_PER_MONTH;
        let hourly_wage = daily_wage / standard_hours;
        let minute_wage = hourly_wage / MINUTES_PER_HOUR;

        Self {
            daily_wage,
            hourly_wage,
            minute_wage,
        }
    }

    pub fn for_employee(employee: &Employee) -> Self {
        Self::derive(employee.monthly_salary, employee.standard_hours)
    }

    /// Rounded copy for display; calculations keep full precision.
    pub fn rounded(&self) -> Self {
        Self {
            daily_wage: round_money(self.daily_wage),
            hourly_wage: round_money(self.hourly_wage),
            minute_wage: round_money(self.minute_wage),
        }
    }
}

/// Round half away from zero to exactly two fractional digits.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn derives_rates_from_monthly_salary() {
        let rates = WageRates::derive(dec!(30000), dec!(8));
        assert_eq!(rates.daily_wage, dec!(1000));
        assert_eq!(rates.hourly_wage, dec!(125));
        assert_eq!(round_money(rates.minute_wage), dec!(2.08));
    }

    #[test]
    fn non_positive_standard_hours_fall_back_to_default() {
        let rates = WageRates::derive(dec!(24000), Decimal::ZERO);
        assert_eq!(rates.hourly_wage, dec!(100));
    }

    #[test]
    fn money_rounds_half_away_from_zero_with_two_digits() {
        assert_eq!(round_money(dec!(41.665)).to_string(), "41.67");
        assert_eq!(round_money(dec!(1000)).to_string(), "1000.00");
        assert_eq!(round_money(dec!(-0.005)).to_string(), "-0.01");
    }

    #[test]
    fn minute_penalty_is_not_rounded_before_multiplying() {
        let rates = WageRates::derive(dec!(30000), dec!(8));
        // 20 minutes at 2.0833.. is 41.67, not 20 * 2.08 = 41.60
        assert_eq!(round_money(rates.minute_wage * dec!(20)), dec!(41.67));
    }
}
