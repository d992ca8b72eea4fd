//! Request DTOs for pricing API endpoints.
//!
//! Money inputs are decimal strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::models::PartyRole;
use super::rate_sheet::RawRateItem;
use super::services::OccurrenceEdit;

/// Optional body of a recompute request
#[derive(Debug, Default, Deserialize)]
pub struct RecomputeRequest {
    #[serde(default)]
    pub actor: Option<PartyRole>,
}

/// Request to replace an occurrence's rate sheet
#[derive(Debug, Deserialize)]
pub struct ReplaceRatesRequest {
    #[serde(default)]
    pub actor: Option<PartyRole>,
    pub rates: Vec<RawRateItem>,
}

/// Request to edit an occurrence's schedule or pricing inputs
#[derive(Debug, Deserialize)]
pub struct EditOccurrenceRequest {
    #[serde(default)]
    pub actor: Option<PartyRole>,
    #[serde(flatten)]
    pub edit: OccurrenceEdit,
}

/// Request to prorate a time window
#[derive(Debug, Deserialize)]
pub struct ProrateRequest {
    pub unit_of_time: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub nights: Option<u32>,
}

/// Request to price one occurrence's base line
#[derive(Debug, Deserialize)]
pub struct OccurrenceCostRequest {
    pub unit_of_time: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub nights: Option<u32>,
    #[serde(with = "rust_decimal::serde::str")]
    pub base_rate: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub holiday_rate: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub additional_pet_rate: Option<Decimal>,
    #[serde(default = "default_applies_after")]
    pub applies_after: i32,
    #[serde(default = "default_num_pets")]
    pub num_pets: i32,
    #[serde(default = "default_is_prorated")]
    pub is_prorated: bool,
}

fn default_applies_after() -> i32 {
    1
}

fn default_num_pets() -> i32 {
    1
}

fn default_is_prorated() -> bool {
    true
}

/// Request to validate a rate sheet without storing it
#[derive(Debug, Deserialize)]
pub struct ValidateRatesRequest {
    pub rates: Vec<RawRateItem>,
}

/// Request to resolve a platform fee
#[derive(Debug, Deserialize)]
pub struct PlatformFeeRequest {
    pub role: PartyRole,
    #[serde(default)]
    pub subscription_plan: Option<i32>,
    #[serde(default)]
    pub is_first_booking_this_month: bool,
    /// When given, the fee amount on this subtotal is returned too
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub subtotal: Option<Decimal>,
}

/// Request to compute booking tax
#[derive(Debug, Deserialize)]
pub struct TaxRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub platform_fee_total: Decimal,
    #[serde(default)]
    pub state: Option<String>,
}
