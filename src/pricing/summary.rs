//! Booking summary aggregation.
//!
//! Recomputes every derived money field of a booking from a loaded
//! [`BookingSnapshot`] and reports only the rows whose values changed.
//! Nothing here touches the database; the store applies the resulting
//! [`ChangeSet`] in one transaction.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, error};

use super::calculators::{
    round_money, CalculationError, OccurrenceCostCalculator, OccurrenceCostInput,
};
use super::models::{BookingSummaryRow, OccurrenceDetail, PartyProfile, PartyRole};
use super::platform_fee::{is_first_booking, PlatformFeeResolver};
use super::store::{BookingSnapshot, ChangeSet, OccurrenceRecord};
use super::tax::TaxResolver;
use super::units::UnitOfTime;

/// Every derived value stored on a booking summary.
///
/// Percentages are percentage points (15.00 = 15%).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryFigures {
    pub subtotal: Decimal,
    pub client_fee_percentage: Decimal,
    pub pro_fee_percentage: Decimal,
    pub tax_percentage: Decimal,
    pub client_fee: Decimal,
    pub pro_fee: Decimal,
    pub tax_amount: Decimal,
    pub total_client_cost: Decimal,
    pub total_professional_payout: Decimal,
}

impl From<&BookingSummaryRow> for SummaryFigures {
    fn from(row: &BookingSummaryRow) -> Self {
        Self {
            subtotal: row.subtotal,
            client_fee_percentage: row.client_platform_fee_percentage,
            pro_fee_percentage: row.pro_platform_fee_percentage,
            tax_percentage: row.tax_percentage,
            client_fee: row.client_platform_fee,
            pro_fee: row.pro_platform_fee,
            tax_amount: row.tax_amount,
            total_client_cost: row.total_client_cost,
            total_professional_payout: row.total_sitter_payout,
        }
    }
}

/// Result of a recompute: the writes needed and the final figures
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    pub changes: ChangeSet,
    pub figures: SummaryFigures,
}

/// Derives occurrence costs, fees, tax and totals for a booking
#[derive(Debug, Clone)]
pub struct BookingSummaryAggregator {
    calculator: OccurrenceCostCalculator,
    fees: PlatformFeeResolver,
    taxes: TaxResolver,
}

impl BookingSummaryAggregator {
    pub fn new(calculator: OccurrenceCostCalculator, fees: PlatformFeeResolver, taxes: TaxResolver) -> Self {
        Self {
            calculator,
            fees,
            taxes,
        }
    }

    pub fn calculator(&self) -> &OccurrenceCostCalculator {
        &self.calculator
    }

    pub fn fees(&self) -> &PlatformFeeResolver {
        &self.fees
    }

    pub fn taxes(&self) -> &TaxResolver {
        &self.taxes
    }

    /// Recompute a booking.
    ///
    /// 1. Reprice each occurrence's detail line and add its rate sheet total.
    /// 2. Sum occurrence costs into the subtotal.
    /// 3. Resolve fees and tax, then the client total and professional payout.
    ///
    /// Unchanged values produce no writes, so recomputing twice is a no-op.
    pub fn recompute(&self, snapshot: &BookingSnapshot) -> Result<RecomputeOutcome, CalculationError> {
        let booking_id = snapshot.booking.booking_id;
        let mut changes = ChangeSet::new(booking_id);
        let mut subtotal = Decimal::ZERO;

        for record in &snapshot.occurrences {
            let occurrence_id = record.occurrence.occurrence_id;

            let detail_cost = match &record.detail {
                Some(detail) => {
                    let repriced = self.price_detail(record, detail).map_err(|e| {
                        error!(
                            booking_id,
                            occurrence_id,
                            subtotal_so_far = %subtotal,
                            "Failed to price occurrence detail: {}",
                            e
                        );
                        e
                    })?;
                    let cost = repriced.calculated_rate;
                    if repriced != *detail {
                        changes.include_detail(repriced);
                    }
                    cost
                }
                None => Decimal::ZERO,
            };

            let sheet_total = record.rate_sheet.total();
            let occurrence_cost = round_money(detail_cost + sheet_total, 2);
            if occurrence_cost != record.occurrence.calculated_cost {
                changes.occurrence_costs.push((occurrence_id, occurrence_cost));
            }

            debug!(
                booking_id,
                occurrence_id,
                detail_cost = %detail_cost,
                sheet_total = %sheet_total,
                "Occurrence repriced"
            );
            subtotal += occurrence_cost;
        }

        let figures = self.summarize(subtotal, snapshot);
        let stored = snapshot.summary.as_ref().map(SummaryFigures::from);
        if stored.as_ref() != Some(&figures) {
            changes.summary = Some(figures.clone());
        }

        Ok(RecomputeOutcome { changes, figures })
    }

    /// Fee, tax and total resolution for a known subtotal.
    pub fn summarize(&self, subtotal: Decimal, snapshot: &BookingSnapshot) -> SummaryFigures {
        let stored = snapshot.summary.as_ref();

        let client_fee_percentage = self.fee_percentage(
            stored.map(|s| s.client_platform_fee_percentage),
            snapshot.client.as_ref(),
            snapshot.client_prior_bookings,
            PartyRole::Client,
        );
        let pro_fee_percentage = self.fee_percentage(
            stored.map(|s| s.pro_platform_fee_percentage),
            snapshot.professional.as_ref(),
            snapshot.professional_prior_bookings,
            PartyRole::Professional,
        );

        let client_fee = round_money(subtotal * client_fee_percentage / dec!(100), 2);
        let pro_fee = round_money(subtotal * pro_fee_percentage / dec!(100), 2);

        let professional_state = snapshot.professional.as_ref().and_then(|p| p.state.as_deref());
        let tax = self.taxes.assess(subtotal, client_fee + pro_fee, professional_state);

        SummaryFigures {
            subtotal,
            client_fee_percentage,
            pro_fee_percentage,
            tax_percentage: tax.tax_percentage,
            client_fee,
            pro_fee,
            tax_amount: tax.tax_amount,
            total_client_cost: subtotal + client_fee + tax.tax_amount,
            total_professional_payout: subtotal - pro_fee,
        }
    }

    /// Fee percentage in points. A non-zero stored percentage is kept as
    /// charged; zero is resolved again from the party's plan.
    fn fee_percentage(
        &self,
        stored: Option<Decimal>,
        party: Option<&PartyProfile>,
        prior_bookings: i64,
        role: PartyRole,
    ) -> Decimal {
        if let Some(points) = stored.filter(|p| *p > Decimal::ZERO) {
            return points;
        }

        let plan = party.and_then(|p| p.subscription_plan);
        let fraction = self.fees.resolve(plan, is_first_booking(prior_bookings), role);
        round_money(fraction * dec!(100), 2)
    }

    fn price_detail(
        &self,
        record: &OccurrenceRecord,
        detail: &OccurrenceDetail,
    ) -> Result<OccurrenceDetail, CalculationError> {
        let unit: UnitOfTime = detail.unit_of_time.parse()?;
        let nights = match detail.nights {
            Some(n) => u32::try_from(n).ok(),
            None => Some(record.occurrence.calendar_nights()),
        };

        let input = OccurrenceCostInput {
            start: record.occurrence.starts_at(),
            end: record.occurrence.ends_at(),
            unit_of_time: unit,
            nights,
            base_rate: detail.base_rate,
            holiday_rate: detail.holiday_rate,
            additional_pet_rate: detail.additional_pet_rate,
            applies_after: detail.applies_after,
            num_pets: detail.num_pets,
        };
        let cost = self.calculator.cost(&input, detail.is_prorated)?;

        Ok(OccurrenceDetail {
            multiple: cost.multiple,
            calculated_rate: cost.calculated_rate,
            ..detail.clone()
        })
    }
}
