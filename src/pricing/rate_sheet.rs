//! Occurrence rate sheets.
//!
//! A rate sheet is the ordered list of named add-on charges attached to one
//! occurrence. It is stored as a JSON array of
//! `{"title", "description", "amount": "$12.34"}` objects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::calculators::round_money;
use super::models::ServiceRate;
use super::money::Money;

/// One validated charge on a rate sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub amount: Money,
}

/// An unvalidated item as submitted by a caller.
///
/// `amount` may be a string (`"$12.34"`, `"12.34"`) or a JSON number.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRateItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: serde_json::Value,
}

/// Rejected rate sheet; one message per bad item
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid rate sheet: {}", errors.join("; "))]
pub struct RateSheetError {
    pub errors: Vec<String>,
}

/// Ordered add-on charges for an occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateSheet {
    items: Vec<RateItem>,
}

impl RateSheet {
    pub fn new(items: Vec<RateItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[RateItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all item amounts, quantized to cents.
    pub fn total(&self) -> Decimal {
        let sum: Decimal = self.items.iter().map(|item| item.amount.amount()).sum();
        round_money(sum, 2)
    }

    /// Validate submitted items. Any bad item rejects the whole sheet.
    pub fn validate(raw: &[RawRateItem]) -> Result<Vec<RateItem>, RateSheetError> {
        let mut items = Vec::with_capacity(raw.len());
        let mut errors = Vec::new();

        for (index, item) in raw.iter().enumerate() {
            let title = item.title.trim();
            if title.is_empty() {
                errors.push(format!("item {}: title is required", index));
            }

            let amount = match &item.amount {
                serde_json::Value::String(s) => Money::parse(s),
                serde_json::Value::Number(n) => Money::parse(&n.to_string()),
                serde_json::Value::Null => Money::parse(""),
                other => Money::parse(&other.to_string()),
            };

            match amount {
                Ok(amount) if !title.is_empty() => items.push(RateItem {
                    title: title.to_string(),
                    description: item.description.trim().to_string(),
                    amount,
                }),
                Ok(_) => {}
                Err(e) => errors.push(format!("item {} ({}): {}", index, title, e)),
            }
        }

        if errors.is_empty() {
            Ok(items)
        } else {
            Err(RateSheetError { errors })
        }
    }

    /// Validate and build a sheet in one step.
    pub fn from_raw(raw: &[RawRateItem]) -> Result<Self, RateSheetError> {
        Self::validate(raw).map(Self::new)
    }

    /// Decode the stored JSON column. `null` is an empty sheet.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, RateSheetError> {
        if value.is_null() {
            return Ok(Self::default());
        }

        let raw: Vec<RawRateItem> = serde_json::from_value(value.clone()).map_err(|e| RateSheetError {
            errors: vec![format!("stored rates are not a list of items: {}", e)],
        })?;

        Self::from_raw(&raw)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
    }

    /// Build the default sheet from a service's additional named rates.
    ///
    /// Rates that cannot be represented (negative, blank title) are skipped
    /// and reported, so the sheet may come back partial.
    pub fn seed_from_service(rates: &[ServiceRate]) -> (Self, Vec<String>) {
        let mut items = Vec::with_capacity(rates.len());
        let mut skipped = Vec::new();

        for rate in rates {
            let title = rate.title.trim();
            if title.is_empty() {
                skipped.push(format!("service rate with amount {} has no title", rate.rate));
                continue;
            }

            match Money::new(rate.rate) {
                Ok(amount) => items.push(RateItem {
                    title: title.to_string(),
                    description: rate.description.clone().unwrap_or_default(),
                    amount,
                }),
                Err(e) => {
                    warn!("Skipping service rate {:?} for service {}: {}", title, rate.service_id, e);
                    skipped.push(format!("{}: {}", title, e));
                }
            }
        }

        (Self::new(items), skipped)
    }
}
