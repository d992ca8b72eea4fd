//! Unit-of-time labels and proration.
//!
//! Services are priced per billing unit ("30 Min", "1 Hour", "Per Night", ...).
//! An occurrence's duration is converted into a count of those units, which
//! multiplies the base rate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::calculators::CalculationError;

/// Decimal places kept on a proration multiplier
pub const MULTIPLE_PLACES: u32 = 5;

/// Billing unit a service rate is quoted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfTime {
    /// 15, 30 or 45 minute blocks
    Minutes(u32),
    /// Whole-hour blocks ("1 Hour", "8 Hour", "24 Hour")
    Hours(u32),
    PerDay,
    Week,
    /// Flat fee, never prorated
    PerVisit,
    /// Priced by night count rather than duration
    PerNight,
}

impl UnitOfTime {
    /// Length of one unit in hours, or `None` for count-based units.
    pub fn unit_hours(&self) -> Option<Decimal> {
        match self {
            UnitOfTime::Minutes(m) => Some(Decimal::from(*m) / dec!(60)),
            UnitOfTime::Hours(h) => Some(Decimal::from(*h)),
            UnitOfTime::PerDay => Some(dec!(24)),
            UnitOfTime::Week => Some(dec!(168)),
            UnitOfTime::PerVisit | UnitOfTime::PerNight => None,
        }
    }
}

impl fmt::Display for UnitOfTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitOfTime::Minutes(m) => write!(f, "{} Min", m),
            UnitOfTime::Hours(h) => write!(f, "{} Hour", h),
            UnitOfTime::PerDay => f.write_str("Per Day"),
            UnitOfTime::Week => f.write_str("Week"),
            UnitOfTime::PerVisit => f.write_str("Per Visit"),
            UnitOfTime::PerNight => f.write_str("Per Night"),
        }
    }
}

impl FromStr for UnitOfTime {
    type Err = CalculationError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let normalized = label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

        let unit = match normalized.as_str() {
            "per visit" => UnitOfTime::PerVisit,
            "per night" => UnitOfTime::PerNight,
            "per day" => UnitOfTime::PerDay,
            "week" => UnitOfTime::Week,
            _ => {
                let (count, suffix) = normalized
                    .split_once(' ')
                    .ok_or_else(|| CalculationError::InvalidUnitOfTime(label.to_string()))?;
                let count: u32 = count
                    .parse()
                    .map_err(|_| CalculationError::InvalidUnitOfTime(label.to_string()))?;

                match suffix {
                    "min" if matches!(count, 15 | 30 | 45) => UnitOfTime::Minutes(count),
                    "hour" | "hours" if count > 0 => UnitOfTime::Hours(count),
                    _ => return Err(CalculationError::InvalidUnitOfTime(label.to_string())),
                }
            }
        };

        Ok(unit)
    }
}

impl Serialize for UnitOfTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnitOfTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Convert an occurrence window into a count of billing units.
///
/// * `Per Visit` is always 1.
/// * `Per Night` returns `nights` as given; the caller decides the count.
/// * Every other unit is `duration_hours / unit_hours`, rounded to five
///   places with midpoints away from zero.
pub fn prorate(
    unit: UnitOfTime,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    nights: Option<u32>,
) -> Result<Decimal, CalculationError> {
    let unit_hours = match unit {
        UnitOfTime::PerVisit => return Ok(Decimal::ONE),
        UnitOfTime::PerNight => {
            return nights
                .map(Decimal::from)
                .ok_or(CalculationError::MissingNightCount)
        }
        other => other
            .unit_hours()
            .ok_or_else(|| CalculationError::InvalidUnitOfTime(other.to_string()))?,
    };

    if end < start {
        return Err(CalculationError::InvalidTimeWindow { start, end });
    }

    let duration_hours = Decimal::from((end - start).num_seconds()) / dec!(3600);
    let multiple = (duration_hours / unit_hours)
        .round_dp_with_strategy(MULTIPLE_PLACES, RoundingStrategy::MidpointAwayFromZero);

    Ok(multiple)
}

/// Parse a stored label and prorate in one step.
pub fn prorate_label(
    label: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    nights: Option<u32>,
) -> Result<Decimal, CalculationError> {
    prorate(label.parse()?, start, end, nights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    const TIMED_LABELS: &[&str] = &[
        "15 Min", "30 Min", "45 Min", "1 Hour", "2 Hour", "3 Hour", "4 Hour", "5 Hour", "6 Hour",
        "7 Hour", "8 Hour", "24 Hour", "Per Day", "Week",
    ];

    #[test]
    fn test_parse_known_labels() {
        assert_eq!("15 Min".parse::<UnitOfTime>().unwrap(), UnitOfTime::Minutes(15));
        assert_eq!("1 Hour".parse::<UnitOfTime>().unwrap(), UnitOfTime::Hours(1));
        assert_eq!("24 Hour".parse::<UnitOfTime>().unwrap(), UnitOfTime::Hours(24));
        assert_eq!("Per Day".parse::<UnitOfTime>().unwrap(), UnitOfTime::PerDay);
        assert_eq!("Week".parse::<UnitOfTime>().unwrap(), UnitOfTime::Week);
        assert_eq!("Per Visit".parse::<UnitOfTime>().unwrap(), UnitOfTime::PerVisit);
        assert_eq!("Per Night".parse::<UnitOfTime>().unwrap(), UnitOfTime::PerNight);
    }

    #[test]
    fn test_parse_is_lenient_on_case_and_spacing() {
        assert_eq!(" per   visit ".parse::<UnitOfTime>().unwrap(), UnitOfTime::PerVisit);
        assert_eq!("2 hours".parse::<UnitOfTime>().unwrap(), UnitOfTime::Hours(2));
        assert_eq!("30 MIN".parse::<UnitOfTime>().unwrap(), UnitOfTime::Minutes(30));
    }

    #[test]
    fn test_parse_rejects_unknown_labels() {
        for label in ["", "Fortnight", "20 Min", "0 Hour", "Hour", "one Hour", "-1 Hour"] {
            assert!(
                matches!(label.parse::<UnitOfTime>(), Err(CalculationError::InvalidUnitOfTime(_))),
                "{label:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trips_label() {
        for label in TIMED_LABELS.iter().chain(["Per Visit", "Per Night"].iter()) {
            let unit: UnitOfTime = label.parse().unwrap();
            assert_eq!(unit.to_string(), *label);
        }
    }

    #[test]
    fn test_one_unit_of_duration_prorates_to_one() {
        for label in TIMED_LABELS {
            let unit: UnitOfTime = label.parse().unwrap();
            let hours = unit.unit_hours().unwrap();
            let seconds = (hours * dec!(3600)).to_i64().unwrap();
            let end = start() + Duration::seconds(seconds);

            assert_eq!(prorate(unit, start(), end, None).unwrap(), Decimal::ONE, "{label}");
        }
    }

    #[test]
    fn test_two_hours_at_hourly_rate() {
        let end = start() + Duration::hours(2);
        let multiple = prorate_label("1 Hour", start(), end, None).unwrap();
        assert_eq!(multiple, dec!(2.00000));
    }

    #[test]
    fn test_partial_units_round_to_five_places() {
        // 20 minutes of a 45 minute unit = 0.444444...
        let end = start() + Duration::minutes(20);
        assert_eq!(prorate_label("45 Min", start(), end, None).unwrap(), dec!(0.44444));

        // 1 minute of a week = 0.0000992063...
        let end = start() + Duration::minutes(1);
        assert_eq!(prorate_label("Week", start(), end, None).unwrap(), dec!(0.00010));
    }

    #[test]
    fn test_per_visit_ignores_duration() {
        let s = start();
        assert_eq!(prorate(UnitOfTime::PerVisit, s, s, None).unwrap(), Decimal::ONE);
        assert_eq!(
            prorate(UnitOfTime::PerVisit, s, s + Duration::days(5), None).unwrap(),
            Decimal::ONE
        );
        assert_eq!(
            prorate(UnitOfTime::PerVisit, s, s - Duration::hours(1), None).unwrap(),
            Decimal::ONE
        );
    }

    #[test]
    fn test_per_night_uses_supplied_count() {
        let s = start();
        let end = s + Duration::hours(1);
        assert_eq!(prorate(UnitOfTime::PerNight, s, end, Some(3)).unwrap(), dec!(3));
        assert_eq!(
            prorate(UnitOfTime::PerNight, s, end, None),
            Err(CalculationError::MissingNightCount)
        );
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let s = start();
        let result = prorate(UnitOfTime::Hours(1), s, s - Duration::minutes(1), None);
        assert!(matches!(result, Err(CalculationError::InvalidTimeWindow { .. })));
    }

    #[test]
    fn test_zero_length_window_prorates_to_zero() {
        assert_eq!(prorate(UnitOfTime::Hours(1), start(), start(), None).unwrap(), Decimal::ZERO);
    }
}
