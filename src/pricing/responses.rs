//! Response DTOs for pricing API endpoints.

use rust_decimal::Decimal;
use serde::Serialize;

use super::calculators::OccurrenceCost;
use super::models::PartyRole;
use super::rate_sheet::RateSheet;
use super::services::SeedReport;
use super::summary::SummaryFigures;
use super::tax::{TaxAssessment, Taxability};

/// Marketplace currency
pub const CURRENCY: &str = "USD";

/// Money value for JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct MoneyResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
}

impl MoneyResponse {
    pub fn usd(amount: Decimal) -> Self {
        Self {
            amount,
            currency: CURRENCY.to_string(),
        }
    }
}

/// Booking summary. Percentages are percentage points.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub booking_id: i64,
    pub subtotal: MoneyResponse,
    #[serde(with = "rust_decimal::serde::str")]
    pub client_fee_percentage: Decimal,
    pub client_fee: MoneyResponse,
    #[serde(with = "rust_decimal::serde::str")]
    pub pro_fee_percentage: Decimal,
    pub pro_fee: MoneyResponse,
    #[serde(with = "rust_decimal::serde::str")]
    pub tax_percentage: Decimal,
    pub tax: MoneyResponse,
    pub total_client_cost: MoneyResponse,
    pub total_professional_payout: MoneyResponse,
}

impl SummaryResponse {
    pub fn new(booking_id: i64, figures: &SummaryFigures) -> Self {
        Self {
            booking_id,
            subtotal: MoneyResponse::usd(figures.subtotal),
            client_fee_percentage: figures.client_fee_percentage,
            client_fee: MoneyResponse::usd(figures.client_fee),
            pro_fee_percentage: figures.pro_fee_percentage,
            pro_fee: MoneyResponse::usd(figures.pro_fee),
            tax_percentage: figures.tax_percentage,
            tax: MoneyResponse::usd(figures.tax_amount),
            total_client_cost: MoneyResponse::usd(figures.total_client_cost),
            total_professional_payout: MoneyResponse::usd(figures.total_professional_payout),
        }
    }
}

/// Response for occurrence seeding
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub seeded_detail: bool,
    pub seeded_items: usize,
    pub skipped: Vec<String>,
    pub summary: SummaryResponse,
}

impl SeedResponse {
    pub fn new(booking_id: i64, report: &SeedReport) -> Self {
        Self {
            seeded_detail: report.seeded_detail,
            seeded_items: report.seeded_items,
            skipped: report.skipped.clone(),
            summary: SummaryResponse::new(booking_id, &report.summary),
        }
    }
}

/// Response for proration
#[derive(Debug, Serialize)]
pub struct ProrateResponse {
    pub unit_of_time: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub multiple: Decimal,
}

/// Response for occurrence base-line pricing
#[derive(Debug, Serialize)]
pub struct OccurrenceCostResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub multiple: Decimal,
    pub effective_base_rate: MoneyResponse,
    pub is_holiday: bool,
    pub additional_pets: i32,
    pub additional_pet_cost: MoneyResponse,
    pub calculated_rate: MoneyResponse,
}

impl From<OccurrenceCost> for OccurrenceCostResponse {
    fn from(cost: OccurrenceCost) -> Self {
        Self {
            multiple: cost.multiple,
            effective_base_rate: MoneyResponse::usd(cost.effective_base_rate),
            is_holiday: cost.is_holiday,
            additional_pets: cost.additional_pets,
            additional_pet_cost: MoneyResponse::usd(cost.additional_pet_cost),
            calculated_rate: MoneyResponse::usd(cost.calculated_rate),
        }
    }
}

/// Response for rate sheet validation
#[derive(Debug, Serialize)]
pub struct RateSheetResponse {
    pub rates: RateSheet,
    pub total: MoneyResponse,
}

impl From<RateSheet> for RateSheetResponse {
    fn from(rates: RateSheet) -> Self {
        let total = MoneyResponse::usd(rates.total());
        Self { rates, total }
    }
}

/// Response for platform fee resolution
#[derive(Debug, Serialize)]
pub struct PlatformFeeResponse {
    pub role: PartyRole,
    /// Fraction, 0.15 = 15%
    #[serde(with = "rust_decimal::serde::str")]
    pub fee_rate: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<MoneyResponse>,
}

/// Response for tax calculation
#[derive(Debug, Serialize)]
pub struct TaxResponse {
    pub state: Option<String>,
    pub taxable: Taxability,
    #[serde(with = "rust_decimal::serde::str")]
    pub tax_percentage: Decimal,
    pub taxable_base: MoneyResponse,
    pub tax: MoneyResponse,
}

impl TaxResponse {
    pub fn new(state: Option<String>, assessment: TaxAssessment) -> Self {
        Self {
            state,
            taxable: assessment.taxability,
            tax_percentage: assessment.tax_percentage,
            taxable_base: MoneyResponse::usd(assessment.taxable_base),
            tax: MoneyResponse::usd(assessment.tax_amount),
        }
    }
}

/// Generic pricing error response
#[derive(Debug, Serialize)]
pub struct PricingErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
