//! Pricing API route handlers.
//!
//! Mounted under `/api/v1/pricing`. Booking routes read and write through
//! the pricing service; the rest are pure calculators.

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, patch, post, put},
    Json, Router,
};
use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::AppState;

use super::calculators::{round_money, OccurrenceCostInput, MAX_AMOUNT};
use super::rate_sheet::RateSheet;
use super::requests::{
    EditOccurrenceRequest, OccurrenceCostRequest, PlatformFeeRequest, ProrateRequest,
    RecomputeRequest, ReplaceRatesRequest, TaxRequest, ValidateRatesRequest,
};
use super::responses::{
    MoneyResponse, OccurrenceCostResponse, PlatformFeeResponse, ProrateResponse, RateSheetResponse,
    SeedResponse, SummaryResponse, TaxResponse,
};
use super::services::PricingError;
use super::units::{prorate as prorate_window, UnitOfTime};

/// Pricing routes, relative to the mount point
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings/:booking_id/recompute", post(recompute))
        .route("/bookings/:booking_id/summary", get(summary))
        .route("/bookings/:booking_id/occurrences/:occurrence_id", patch(edit_occurrence))
        .route("/bookings/:booking_id/occurrences/:occurrence_id/rates", put(replace_rates))
        .route(
            "/bookings/:booking_id/occurrences/:occurrence_id/seed",
            post(seed_occurrence),
        )
        .route("/prorate", post(prorate))
        .route("/occurrence-cost", post(occurrence_cost))
        .route("/rate-sheet/validate", post(validate_rates))
        .route("/platform-fee", post(platform_fee))
        .route("/tax", post(tax))
}

/// The body is optional; an empty one means no acting party.
async fn recompute(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
    body: Bytes,
) -> Result<Json<SummaryResponse>> {
    let actor = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RecomputeRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid recompute body: {}", e)))?
            .actor
    };
    let figures = state.pricing.recompute(booking_id, actor).await?;
    Ok(Json(SummaryResponse::new(booking_id, &figures)))
}

async fn summary(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
) -> Result<Json<SummaryResponse>> {
    let figures = state.pricing.get_summary(booking_id).await?;
    Ok(Json(SummaryResponse::new(booking_id, &figures)))
}

async fn replace_rates(
    State(state): State<AppState>,
    Path((booking_id, occurrence_id)): Path<(i64, i64)>,
    Json(req): Json<ReplaceRatesRequest>,
) -> Result<Json<SummaryResponse>> {
    let figures = state
        .pricing
        .replace_rate_sheet(booking_id, occurrence_id, req.actor, &req.rates)
        .await?;
    Ok(Json(SummaryResponse::new(booking_id, &figures)))
}

async fn seed_occurrence(
    State(state): State<AppState>,
    Path((booking_id, occurrence_id)): Path<(i64, i64)>,
) -> Result<Json<SeedResponse>> {
    let report = state.pricing.seed_occurrence(booking_id, occurrence_id).await?;
    Ok(Json(SeedResponse::new(booking_id, &report)))
}

async fn edit_occurrence(
    State(state): State<AppState>,
    Path((booking_id, occurrence_id)): Path<(i64, i64)>,
    Json(req): Json<EditOccurrenceRequest>,
) -> Result<Json<SummaryResponse>> {
    let figures = state
        .pricing
        .edit_occurrence(booking_id, occurrence_id, req.actor, &req.edit)
        .await?;
    Ok(Json(SummaryResponse::new(booking_id, &figures)))
}

async fn prorate(Json(req): Json<ProrateRequest>) -> Result<Json<ProrateResponse>> {
    let unit: UnitOfTime = req.unit_of_time.parse().map_err(PricingError::from)?;
    let multiple = prorate_window(unit, req.start, req.end, req.nights).map_err(PricingError::from)?;

    Ok(Json(ProrateResponse {
        unit_of_time: unit.to_string(),
        multiple,
    }))
}

async fn occurrence_cost(
    State(state): State<AppState>,
    Json(req): Json<OccurrenceCostRequest>,
) -> Result<Json<OccurrenceCostResponse>> {
    let input = OccurrenceCostInput {
        start: req.start,
        end: req.end,
        unit_of_time: req.unit_of_time.parse().map_err(PricingError::from)?,
        nights: req.nights,
        base_rate: req.base_rate,
        holiday_rate: req.holiday_rate.unwrap_or_default(),
        additional_pet_rate: req.additional_pet_rate.unwrap_or_default(),
        applies_after: req.applies_after,
        num_pets: req.num_pets,
    };

    let cost = state
        .pricing
        .aggregator()
        .calculator()
        .cost(&input, req.is_prorated)
        .map_err(PricingError::from)?;

    Ok(Json(cost.into()))
}

async fn validate_rates(Json(req): Json<ValidateRatesRequest>) -> Result<Json<RateSheetResponse>> {
    let sheet = RateSheet::from_raw(&req.rates).map_err(PricingError::from)?;
    Ok(Json(sheet.into()))
}

async fn platform_fee(
    State(state): State<AppState>,
    Json(req): Json<PlatformFeeRequest>,
) -> Result<Json<PlatformFeeResponse>> {
    if let Some(subtotal) = req.subtotal {
        check_amount("subtotal", subtotal)?;
    }

    let fee_rate = state
        .pricing
        .aggregator()
        .fees()
        .resolve(req.subscription_plan, req.is_first_booking_this_month, req.role);

    Ok(Json(PlatformFeeResponse {
        role: req.role,
        fee_rate,
        fee: req
            .subtotal
            .map(|subtotal| MoneyResponse::usd(round_money(subtotal * fee_rate, 2))),
    }))
}

async fn tax(State(state): State<AppState>, Json(req): Json<TaxRequest>) -> Result<Json<TaxResponse>> {
    check_amount("subtotal", req.subtotal)?;
    check_amount("platform_fee_total", req.platform_fee_total)?;

    let assessment = state
        .pricing
        .aggregator()
        .taxes()
        .assess(req.subtotal, req.platform_fee_total, req.state.as_deref());

    Ok(Json(TaxResponse::new(req.state, assessment)))
}

fn check_amount(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(AppError::BadRequest(format!("{} must not be negative", field)));
    }
    if value > MAX_AMOUNT {
        return Err(AppError::BadRequest(format!("{} must not exceed {}", field, MAX_AMOUNT)));
    }
    Ok(())
}
