//! State sales tax on bookings.
//!
//! Each state has a taxability rule: the whole booking (subtotal plus platform
//! fees) is taxed, only the platform fee is taxed, or nothing is. Rates are
//! percentage points (6.35 = 6.35%).

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use super::calculators::round_money;

/// What part of a booking a state taxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxability {
    /// Subtotal and platform fee (`true` in the rules file)
    Taxable,
    /// Platform fee only (`"service_fee_only"`)
    ServiceFeeOnly,
    /// No tax (`false`)
    Exempt,
}

impl Serialize for Taxability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Taxability::Taxable => serializer.serialize_bool(true),
            Taxability::ServiceFeeOnly => serializer.serialize_str("service_fee_only"),
            Taxability::Exempt => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for Taxability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Named(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Taxability::Taxable),
            Raw::Flag(false) => Ok(Taxability::Exempt),
            Raw::Named(name) if name == "service_fee_only" => Ok(Taxability::ServiceFeeOnly),
            Raw::Named(other) => Err(serde::de::Error::custom(format!(
                "unknown taxability {:?}, expected true, false or \"service_fee_only\"",
                other
            ))),
        }
    }
}

/// Tax rule for one state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTaxRule {
    pub taxable: Taxability,
    /// Percentage points
    pub rate: Decimal,
}

/// Outcome of a tax lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxAssessment {
    pub taxability: Taxability,
    /// Percentage points actually applied (0 when nothing is taxed)
    pub tax_percentage: Decimal,
    pub taxable_base: Decimal,
    pub tax_amount: Decimal,
}

/// Errors loading a rules file
#[derive(Debug, thiserror::Error)]
pub enum TaxRulesError {
    #[error("failed to read tax rules: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse tax rules: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("tax rate {rate} for {state} must be between 0 and 100")]
    InvalidRate { state: String, rate: Decimal },
}

const fn rule(taxable: Taxability, rate: Decimal) -> StateTaxRule {
    StateTaxRule { taxable, rate }
}

/// Built-in rules. States not listed as taxable are exempt.
const DEFAULT_RULES: &[(&str, StateTaxRule)] = &[
    ("CT", rule(Taxability::Taxable, dec!(6.35))),
    ("HI", rule(Taxability::Taxable, dec!(4.00))),
    ("IA", rule(Taxability::Taxable, dec!(6.00))),
    ("SD", rule(Taxability::Taxable, dec!(4.20))),
    ("WV", rule(Taxability::Taxable, dec!(6.00))),
    ("WA", rule(Taxability::ServiceFeeOnly, dec!(6.50))),
];

const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY",
];

/// Looks up state rules and computes booking tax
#[derive(Debug, Clone)]
pub struct TaxResolver {
    rules: HashMap<String, StateTaxRule>,
}

impl Default for TaxResolver {
    fn default() -> Self {
        let mut rules: HashMap<String, StateTaxRule> = US_STATES
            .iter()
            .map(|code| (code.to_string(), rule(Taxability::Exempt, Decimal::ZERO)))
            .collect();
        for (code, state_rule) in DEFAULT_RULES {
            rules.insert(code.to_string(), *state_rule);
        }
        Self { rules }
    }
}

impl TaxResolver {
    /// Built-in rules overlaid with the entries of a JSON rules file
    /// (`{"WA": {"taxable": "service_fee_only", "rate": "6.5"}}`).
    pub fn from_file(path: &Path) -> Result<Self, TaxRulesError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Rates are rounded to two places, the precision the summary stores,
    /// so the applied rate always matches the recorded one.
    pub fn from_json_str(content: &str) -> Result<Self, TaxRulesError> {
        let overrides: HashMap<String, StateTaxRule> = serde_json::from_str(content)?;
        let mut resolver = Self::default();
        for (code, rule) in overrides {
            let state = code.trim().to_uppercase();
            if rule.rate < Decimal::ZERO || rule.rate > dec!(100) {
                return Err(TaxRulesError::InvalidRate { state, rate: rule.rate });
            }
            let rate = round_money(rule.rate, 2);
            resolver.rules.insert(state, StateTaxRule { rate, ..rule });
        }
        Ok(resolver)
    }

    pub fn rule_for(&self, state_code: Option<&str>) -> Option<&StateTaxRule> {
        let code = state_code?.trim().to_uppercase();
        self.rules.get(&code)
    }

    /// Tax owed on a booking.
    pub fn tax(&self, subtotal: Decimal, platform_fee_total: Decimal, state_code: Option<&str>) -> Decimal {
        self.assess(subtotal, platform_fee_total, state_code).tax_amount
    }

    /// Tax owed on a booking, with the rule that produced it.
    ///
    /// Unknown or missing states are not taxed.
    pub fn assess(
        &self,
        subtotal: Decimal,
        platform_fee_total: Decimal,
        state_code: Option<&str>,
    ) -> TaxAssessment {
        let Some(rule) = self.rule_for(state_code) else {
            warn!("No tax rule for state {:?}; not charging tax", state_code);
            return TaxAssessment {
                taxability: Taxability::Exempt,
                tax_percentage: Decimal::ZERO,
                taxable_base: Decimal::ZERO,
                tax_amount: Decimal::ZERO,
            };
        };

        let taxable_base = match rule.taxable {
            Taxability::Taxable => subtotal + platform_fee_total,
            Taxability::ServiceFeeOnly => platform_fee_total,
            Taxability::Exempt => Decimal::ZERO,
        };
        let tax_percentage = match rule.taxable {
            Taxability::Exempt => Decimal::ZERO,
            _ => rule.rate,
        };

        TaxAssessment {
            taxability: rule.taxable,
            tax_percentage,
            taxable_base,
            tax_amount: round_money(taxable_base * tax_percentage / dec!(100), 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxable_state_taxes_subtotal_and_fee() {
        let tax = TaxResolver::default();
        // (100 + 15) * 6.35% = 7.3025
        assert_eq!(tax.tax(dec!(100), dec!(15), Some("CT")), dec!(7.30));

        let assessment = tax.assess(dec!(100), dec!(15), Some("ct"));
        assert_eq!(assessment.taxability, Taxability::Taxable);
        assert_eq!(assessment.tax_percentage, dec!(6.35));
        assert_eq!(assessment.taxable_base, dec!(115));
    }

    #[test]
    fn test_service_fee_only_state() {
        let tax = TaxResolver::default();
        // 30 * 6.5% = 1.95
        assert_eq!(tax.tax(dec!(200), dec!(30), Some("WA")), dec!(1.95));
    }

    #[test]
    fn test_exempt_state() {
        let assessment = TaxResolver::default().assess(dec!(200), dec!(30), Some("CO"));
        assert_eq!(assessment.taxability, Taxability::Exempt);
        assert_eq!(assessment.tax_amount, Decimal::ZERO);
        assert_eq!(assessment.tax_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_or_missing_state_is_not_taxed() {
        let tax = TaxResolver::default();
        assert_eq!(tax.tax(dec!(200), dec!(30), Some("ZZ")), Decimal::ZERO);
        assert_eq!(tax.tax(dec!(200), dec!(30), None), Decimal::ZERO);
        assert_eq!(tax.tax(dec!(200), dec!(30), Some("")), Decimal::ZERO);
    }

    #[test]
    fn test_rules_file_overrides_defaults() {
        let tax = TaxResolver::from_json_str(
            r#"{
                "co": {"taxable": true, "rate": "2.9"},
                "WA": {"taxable": false, "rate": 0},
                "NY": {"taxable": "service_fee_only", "rate": 4}
            }"#,
        )
        .unwrap();

        assert_eq!(tax.tax(dec!(100), dec!(0), Some("CO")), dec!(2.90));
        assert_eq!(tax.tax(dec!(100), dec!(10), Some("WA")), Decimal::ZERO);
        assert_eq!(tax.tax(dec!(100), dec!(10), Some("NY")), dec!(0.40));
        // untouched defaults survive
        assert_eq!(tax.tax(dec!(100), dec!(0), Some("HI")), dec!(4.00));
    }

    #[test]
    fn test_rules_file_rates_rounded_to_stored_precision() {
        let tax = TaxResolver::from_json_str(r#"{"CO": {"taxable": true, "rate": "6.255"}}"#).unwrap();

        let assessment = tax.assess(dec!(200), dec!(0), Some("CO"));
        assert_eq!(assessment.tax_percentage, dec!(6.26));
        // 200 * 6.26% = 12.52, not 12.51 from the unrounded rate
        assert_eq!(assessment.tax_amount, dec!(12.52));
    }

    #[test]
    fn test_rules_file_rejects_out_of_range_rates() {
        let result = TaxResolver::from_json_str(r#"{"CO": {"taxable": true, "rate": "-1"}}"#);
        assert!(matches!(result, Err(TaxRulesError::InvalidRate { ref state, .. }) if state == "CO"));

        let result = TaxResolver::from_json_str(r#"{"co": {"taxable": true, "rate": 250}}"#);
        assert!(matches!(result, Err(TaxRulesError::InvalidRate { .. })));
    }

    #[test]
    fn test_rules_file_rejects_unknown_taxability() {
        let result = TaxResolver::from_json_str(r#"{"CO": {"taxable": "sometimes", "rate": 1}}"#);
        assert!(matches!(result, Err(TaxRulesError::Parse(_))));
    }

    #[test]
    fn test_taxability_serializes_like_rules_file() {
        assert_eq!(serde_json::to_string(&Taxability::Taxable).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Taxability::Exempt).unwrap(), "false");
        assert_eq!(
            serde_json::to_string(&Taxability::ServiceFeeOnly).unwrap(),
            "\"service_fee_only\""
        );
    }
}
