//! Core pricing calculation functions.
//!
//! Pure functions for occurrence cost math - no database access.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use super::holidays::HolidayCalendar;
use super::units::{prorate, UnitOfTime};

/// Round to specified decimal places, midpoints away from zero.
///
/// This is the usual "round half up" for currency: 0.005 becomes 0.01.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use pawprice_engine::pricing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(3));
/// assert_eq!(round_money(dec!(1.005), 2), dec!(1.01));
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest amount a `numeric(10,2)` money column holds
pub const MAX_AMOUNT: Decimal = dec!(99999999.99);

/// Errors from the pure pricing math
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalculationError {
    #[error("Invalid unit of time: {0:?}")]
    InvalidUnitOfTime(String),

    #[error("Occurrence ends ({end}) before it starts ({start})")]
    InvalidTimeWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Per Night pricing requires a night count")]
    MissingNightCount,

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("{step} overflowed the decimal range")]
    Overflow { step: &'static str },
}

/// Everything needed to price one occurrence's base line
#[derive(Debug, Clone)]
pub struct OccurrenceCostInput {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub unit_of_time: UnitOfTime,
    pub nights: Option<u32>,
    pub base_rate: Decimal,
    pub holiday_rate: Decimal,
    pub additional_pet_rate: Decimal,
    pub applies_after: i32,
    pub num_pets: i32,
}

/// Result of pricing one occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceCost {
    /// Proration multiplier applied to the base rate (1 when flat)
    pub multiple: Decimal,
    pub effective_base_rate: Decimal,
    pub is_holiday: bool,
    pub additional_pets: i32,
    pub additional_pet_cost: Decimal,
    /// Rounded line total
    pub calculated_rate: Decimal,
}

/// Prices occurrences from their detail rates.
///
/// The holiday calendar is injected so callers decide which dates carry the
/// holiday rate.
#[derive(Clone)]
pub struct OccurrenceCostCalculator {
    holidays: Arc<dyn HolidayCalendar>,
}

impl OccurrenceCostCalculator {
    pub fn new(holidays: Arc<dyn HolidayCalendar>) -> Self {
        Self { holidays }
    }

    /// Compute the base-line cost of an occurrence.
    ///
    /// `effective_rate × multiple + extra_pets × additional_pet_rate`, rounded
    /// half-up to cents. The holiday rate replaces the base rate when the
    /// occurrence starts on a holiday and a holiday rate is set.
    pub fn cost(
        &self,
        input: &OccurrenceCostInput,
        is_prorated: bool,
    ) -> Result<OccurrenceCost, CalculationError> {
        for (field, value) in [
            ("base_rate", input.base_rate),
            ("holiday_rate", input.holiday_rate),
            ("additional_pet_rate", input.additional_pet_rate),
        ] {
            if value < Decimal::ZERO {
                return Err(CalculationError::Negative { field });
            }
        }
        for (field, value) in [("num_pets", input.num_pets), ("applies_after", input.applies_after)] {
            if value < 0 {
                return Err(CalculationError::Negative { field });
            }
        }

        let is_holiday = self.holidays.is_holiday(input.start.date_naive());
        let effective_base_rate = if is_holiday && input.holiday_rate > Decimal::ZERO {
            input.holiday_rate
        } else {
            input.base_rate
        };

        let multiple = if is_prorated {
            prorate(input.unit_of_time, input.start, input.end, input.nights)?
        } else {
            Decimal::ONE
        };

        // both counts are non-negative, so this cannot wrap
        let additional_pets = (input.num_pets - input.applies_after).max(0);
        let additional_pet_cost = Decimal::from(additional_pets)
            .checked_mul(input.additional_pet_rate)
            .ok_or(CalculationError::Overflow { step: "additional pet cost" })?;

        let calculated_rate = effective_base_rate
            .checked_mul(multiple)
            .and_then(|base| base.checked_add(additional_pet_cost))
            .map(|total| round_money(total, 2))
            .ok_or(CalculationError::Overflow { step: "occurrence cost" })?;

        Ok(OccurrenceCost {
            multiple,
            effective_base_rate,
            is_holiday,
            additional_pets,
            additional_pet_cost,
            calculated_rate,
        })
    }
}

impl std::fmt::Debug for OccurrenceCostCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccurrenceCostCalculator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::holidays::{FixedHolidays, NoHolidays};
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 3, 10, 0, 0).unwrap()
    }

    fn input(unit: UnitOfTime, hours: i64) -> OccurrenceCostInput {
        OccurrenceCostInput {
            start: start(),
            end: start() + Duration::hours(hours),
            unit_of_time: unit,
            nights: None,
            base_rate: dec!(100),
            holiday_rate: dec!(0),
            additional_pet_rate: dec!(0),
            applies_after: 1,
            num_pets: 1,
        }
    }

    fn calculator() -> OccurrenceCostCalculator {
        OccurrenceCostCalculator::new(Arc::new(NoHolidays))
    }

    // ==================== round_money tests ====================

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(3));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(2.25), 1), dec!(2.3));
        assert_eq!(round_money(dec!(2.45), 1), dec!(2.5));
    }

    #[test]
    fn test_round_money_normal_rounding() {
        assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
        assert_eq!(round_money(dec!(1.236), 2), dec!(1.24));
        assert_eq!(round_money(dec!(1.2349), 2), dec!(1.23));
    }

    #[test]
    fn test_round_money_negative_rounds_away_from_zero() {
        assert_eq!(round_money(dec!(-2.5), 0), dec!(-3));
        assert_eq!(round_money(dec!(-1.234), 2), dec!(-1.23));
    }

    #[test]
    fn test_round_money_large_values() {
        assert_eq!(round_money(dec!(123456.789), 2), dec!(123456.79));
        assert_eq!(round_money(dec!(999999.995), 2), dec!(1000000.00));
    }

    // ==================== occurrence cost tests ====================

    #[test]
    fn test_hourly_rate_for_two_hours() {
        let cost = calculator().cost(&input(UnitOfTime::Hours(1), 2), true).unwrap();
        assert_eq!(cost.calculated_rate, dec!(200.00));
        assert_eq!(cost.multiple, dec!(2.00000));
        assert!(!cost.is_holiday);
    }

    #[test]
    fn test_per_visit_with_additional_pets() {
        let mut i = input(UnitOfTime::PerVisit, 3);
        i.base_rate = dec!(50);
        i.additional_pet_rate = dec!(20);
        i.applies_after = 1;
        i.num_pets = 3;

        let cost = calculator().cost(&i, true).unwrap();
        assert_eq!(cost.additional_pets, 2);
        assert_eq!(cost.additional_pet_cost, dec!(40));
        assert_eq!(cost.calculated_rate, dec!(90.00));
    }

    #[test]
    fn test_pets_at_or_below_threshold_cost_nothing_extra() {
        let mut i = input(UnitOfTime::PerVisit, 1);
        i.additional_pet_rate = dec!(20);
        i.applies_after = 2;

        for pets in 0..=2 {
            i.num_pets = pets;
            let cost = calculator().cost(&i, true).unwrap();
            assert_eq!(cost.additional_pet_cost, Decimal::ZERO);
            assert_eq!(cost.calculated_rate, dec!(100));
        }
    }

    #[test]
    fn test_cost_non_decreasing_in_pet_count() {
        let mut i = input(UnitOfTime::Minutes(30), 1);
        i.additional_pet_rate = dec!(7.5);
        i.applies_after = 2;

        let mut previous = Decimal::ZERO;
        for pets in 0..12 {
            i.num_pets = pets;
            let cost = calculator().cost(&i, true).unwrap().calculated_rate;
            assert!(cost >= previous, "cost dropped at {pets} pets");
            previous = cost;
        }
    }

    #[test]
    fn test_flat_pricing_ignores_duration() {
        let cost = calculator().cost(&input(UnitOfTime::Hours(1), 5), false).unwrap();
        assert_eq!(cost.multiple, Decimal::ONE);
        assert_eq!(cost.calculated_rate, dec!(100));
    }

    #[test]
    fn test_holiday_rate_applies_on_holiday() {
        let holidays = FixedHolidays::new([NaiveDate::from_ymd_opt(2024, 7, 3).unwrap()]);
        let calc = OccurrenceCostCalculator::new(Arc::new(holidays));

        let mut i = input(UnitOfTime::Hours(1), 1);
        i.holiday_rate = dec!(130);
        let cost = calc.cost(&i, true).unwrap();
        assert!(cost.is_holiday);
        assert_eq!(cost.effective_base_rate, dec!(130));
        assert_eq!(cost.calculated_rate, dec!(130.00));
    }

    #[test]
    fn test_holiday_without_holiday_rate_keeps_base_rate() {
        let holidays = FixedHolidays::new([NaiveDate::from_ymd_opt(2024, 7, 3).unwrap()]);
        let calc = OccurrenceCostCalculator::new(Arc::new(holidays));

        let cost = calc.cost(&input(UnitOfTime::Hours(1), 1), true).unwrap();
        assert!(cost.is_holiday);
        assert_eq!(cost.calculated_rate, dec!(100.00));
    }

    #[test]
    fn test_fractional_units_round_to_cents() {
        // 50 minutes at $25 per 45 minutes = 1.11111 units = $27.77775
        let mut i = input(UnitOfTime::Minutes(45), 0);
        i.end = i.start + Duration::minutes(50);
        i.base_rate = dec!(25);
        let cost = calculator().cost(&i, true).unwrap();
        assert_eq!(cost.multiple, dec!(1.11111));
        assert_eq!(cost.calculated_rate, dec!(27.78));
    }

    #[test]
    fn test_per_night_needs_count() {
        let mut i = input(UnitOfTime::PerNight, 30);
        assert_eq!(calculator().cost(&i, true), Err(CalculationError::MissingNightCount));

        i.nights = Some(2);
        assert_eq!(calculator().cost(&i, true).unwrap().calculated_rate, dec!(200));
    }

    #[test]
    fn test_negative_rates_rejected() {
        let mut i = input(UnitOfTime::Hours(1), 1);
        i.additional_pet_rate = dec!(-1);
        assert_eq!(
            calculator().cost(&i, true),
            Err(CalculationError::Negative { field: "additional_pet_rate" })
        );
    }

    #[test]
    fn test_negative_pet_counts_rejected() {
        let mut i = input(UnitOfTime::PerVisit, 1);
        i.num_pets = i32::MAX;
        i.applies_after = -1;
        assert_eq!(
            calculator().cost(&i, true),
            Err(CalculationError::Negative { field: "applies_after" })
        );

        i.applies_after = 1;
        i.num_pets = -3;
        assert_eq!(
            calculator().cost(&i, true),
            Err(CalculationError::Negative { field: "num_pets" })
        );
    }

    #[test]
    fn test_huge_rates_report_overflow() {
        let mut i = input(UnitOfTime::Hours(1), 2);
        i.base_rate = Decimal::MAX;
        assert_eq!(
            calculator().cost(&i, true),
            Err(CalculationError::Overflow { step: "occurrence cost" })
        );

        let mut i = input(UnitOfTime::PerVisit, 1);
        i.additional_pet_rate = Decimal::MAX;
        i.num_pets = 3;
        assert_eq!(
            calculator().cost(&i, true),
            Err(CalculationError::Overflow { step: "additional pet cost" })
        );
    }

    #[test]
    fn test_max_pet_count_prices_without_wrapping() {
        let mut i = input(UnitOfTime::PerVisit, 1);
        i.additional_pet_rate = dec!(1);
        i.applies_after = 0;
        i.num_pets = i32::MAX;
        let cost = calculator().cost(&i, true).unwrap();
        assert_eq!(cost.additional_pets, i32::MAX);
        assert_eq!(cost.calculated_rate, dec!(100) + Decimal::from(i32::MAX));
    }
}
