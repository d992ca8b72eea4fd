//! Pricing service operations with database access.
//!
//! Every mutation follows the same path: validate input, load the booking,
//! apply the edit in memory, recompute, then write every changed row in one
//! store transaction and refresh the summary cache.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::AppCache;

use super::calculators::CalculationError;
use super::models::{BookingStatus, OccurrenceDetail, PartyRole};
use super::rate_sheet::{RateSheet, RateSheetError, RawRateItem};
use super::store::{BookingSnapshot, BookingStore, ChangeSet, ScheduleWrite, StoreError};
use super::summary::{BookingSummaryAggregator, SummaryFigures};
use super::units::UnitOfTime;

/// Pricing operation error types
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Booking {0} not found")]
    BookingNotFound(i64),

    #[error("Occurrence {occurrence_id} not found on booking {booking_id}")]
    OccurrenceNotFound { booking_id: i64, occurrence_id: i64 },

    #[error("No summary for booking {0}")]
    SummaryNotFound(i64),

    #[error("Booking {booking_id} is {status} and can no longer be repriced")]
    BookingLocked { booking_id: i64, status: BookingStatus },

    #[error("The {role} cannot change booking {booking_id} while it is {status}")]
    EditNotAllowed {
        booking_id: i64,
        status: BookingStatus,
        role: PartyRole,
    },

    #[error(transparent)]
    Calculation(#[from] CalculationError),

    #[error(transparent)]
    RateSheet(#[from] RateSheetError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PricingError {
    /// Stable machine-readable name for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            PricingError::BookingNotFound(_) => "booking_not_found",
            PricingError::OccurrenceNotFound { .. } => "occurrence_not_found",
            PricingError::SummaryNotFound(_) => "summary_not_found",
            PricingError::BookingLocked { .. } => "booking_locked",
            PricingError::EditNotAllowed { .. } => "edit_not_allowed",
            PricingError::Calculation(_) => "calculation_error",
            PricingError::RateSheet(_) => "invalid_rate_sheet",
            PricingError::Validation(_) => "validation_error",
            PricingError::Store(_) => "store_error",
        }
    }
}

/// Changes to an occurrence's schedule and pricing inputs.
///
/// Absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OccurrenceEdit {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub num_pets: Option<i32>,
    #[serde(default)]
    pub unit_of_time: Option<String>,
    #[serde(default)]
    pub nights: Option<i32>,
}

impl OccurrenceEdit {
    fn touches_detail(&self) -> bool {
        self.num_pets.is_some() || self.unit_of_time.is_some() || self.nights.is_some()
    }
}

/// What seeding an occurrence from its service did
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub seeded_detail: bool,
    pub seeded_items: usize,
    /// Reasons parts of the service price list were not copied
    pub skipped: Vec<String>,
    pub summary: SummaryFigures,
}

/// Seed rows prepared for one occurrence
#[derive(Debug, Default)]
struct SeedPlan {
    detail: Option<OccurrenceDetail>,
    sheet: Option<RateSheet>,
    skipped: Vec<String>,
}

/// Booking pricing operations over a [`BookingStore`]
#[derive(Clone)]
pub struct PricingService {
    store: Arc<dyn BookingStore>,
    cache: AppCache,
    aggregator: BookingSummaryAggregator,
}

impl PricingService {
    pub fn new(store: Arc<dyn BookingStore>, cache: AppCache, aggregator: BookingSummaryAggregator) -> Self {
        Self {
            store,
            cache,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &BookingSummaryAggregator {
        &self.aggregator
    }

    pub fn cache(&self) -> &AppCache {
        &self.cache
    }

    pub async fn ping(&self) -> Result<(), PricingError> {
        Ok(self.store.ping().await?)
    }

    /// Recompute every derived value of a booking and persist what changed.
    ///
    /// Terminal bookings are locked. When `actor` is given it must be allowed
    /// to change the booking in its current state.
    pub async fn recompute(&self, booking_id: i64, actor: Option<PartyRole>) -> Result<SummaryFigures, PricingError> {
        let snapshot = self.load(booking_id).await?;
        check_status(&snapshot, actor)?;

        let outcome = self.aggregator.recompute(&snapshot)?;
        self.commit(booking_id, &outcome.changes, outcome.figures).await
    }

    /// Latest summary figures, from cache when possible
    pub async fn get_summary(&self, booking_id: i64) -> Result<SummaryFigures, PricingError> {
        if let Some(cached) = self.cache.summary(booking_id).await {
            debug!("Cache HIT for booking summary: {}", booking_id);
            return Ok((*cached).clone());
        }

        debug!("Cache MISS for booking summary: {}", booking_id);
        let row = self
            .store
            .load_summary(booking_id)
            .await?
            .ok_or(PricingError::SummaryNotFound(booking_id))?;

        let figures = SummaryFigures::from(&row);
        self.cache.store_summary(booking_id, figures.clone()).await;
        Ok(figures)
    }

    /// Replace an occurrence's rate sheet and recompute.
    ///
    /// The submitted items are validated as a whole; one bad item rejects
    /// the request and leaves the stored sheet untouched.
    pub async fn replace_rate_sheet(
        &self,
        booking_id: i64,
        occurrence_id: i64,
        actor: Option<PartyRole>,
        items: &[RawRateItem],
    ) -> Result<SummaryFigures, PricingError> {
        let sheet = RateSheet::from_raw(items)?;

        let mut snapshot = self.load(booking_id).await?;
        check_status(&snapshot, actor)?;

        let record = snapshot
            .occurrence_mut(occurrence_id)
            .ok_or(PricingError::OccurrenceNotFound {
                booking_id,
                occurrence_id,
            })?;

        let mut changes = ChangeSet::new(booking_id);
        if record.rate_sheet != sheet {
            record.rate_sheet = sheet.clone();
            changes.include_rate_sheet(occurrence_id, sheet);
        }

        let outcome = self.aggregator.recompute(&snapshot)?;
        changes.merge(outcome.changes);
        self.commit(booking_id, &changes, outcome.figures).await
    }

    /// Seed a new occurrence from its booking's service, then recompute.
    ///
    /// The service's base line becomes the occurrence detail and each of its
    /// named rates becomes a rate-sheet item. Seeding is best-effort: any
    /// failure is logged and the recompute still runs.
    pub async fn seed_occurrence(&self, booking_id: i64, occurrence_id: i64) -> Result<SeedReport, PricingError> {
        let snapshot = self.load(booking_id).await?;
        check_status(&snapshot, None)?;
        if snapshot.occurrence(occurrence_id).is_none() {
            return Err(PricingError::OccurrenceNotFound {
                booking_id,
                occurrence_id,
            });
        }

        let plan = match self.plan_seed(&snapshot, occurrence_id).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(booking_id, occurrence_id, "Failed to load service for seeding: {}", e);
                SeedPlan {
                    skipped: vec![format!("service unavailable: {}", e)],
                    ..SeedPlan::default()
                }
            }
        };

        let mut changes = ChangeSet::new(booking_id);
        let seeded_detail = plan.detail.is_some();
        let seeded_items = plan.sheet.as_ref().map_or(0, |s| s.items().len());
        if let Some(detail) = plan.detail {
            changes.include_detail(detail);
        }
        if let Some(sheet) = plan.sheet {
            changes.include_rate_sheet(occurrence_id, sheet);
        }

        let (seeded_detail, seeded_items) = match self.store.apply(&changes).await {
            Ok(()) => (seeded_detail, seeded_items),
            Err(e) => {
                warn!(booking_id, occurrence_id, "Failed to store seeded rates: {}", e);
                (false, 0)
            }
        };

        let summary = self.recompute(booking_id, None).await?;

        Ok(SeedReport {
            seeded_detail,
            seeded_items,
            skipped: plan.skipped,
            summary,
        })
    }

    /// Edit an occurrence's schedule or pricing inputs and recompute.
    pub async fn edit_occurrence(
        &self,
        booking_id: i64,
        occurrence_id: i64,
        actor: Option<PartyRole>,
        edit: &OccurrenceEdit,
    ) -> Result<SummaryFigures, PricingError> {
        if let Some(pets) = edit.num_pets {
            if pets < 1 {
                return Err(PricingError::Validation("num_pets must be at least 1".to_string()));
            }
        }
        if let Some(nights) = edit.nights {
            if nights < 0 {
                return Err(PricingError::Validation("nights must not be negative".to_string()));
            }
        }
        let unit = edit
            .unit_of_time
            .as_deref()
            .map(str::parse::<UnitOfTime>)
            .transpose()?;

        let mut snapshot = self.load(booking_id).await?;
        check_status(&snapshot, actor)?;

        let record = snapshot
            .occurrence_mut(occurrence_id)
            .ok_or(PricingError::OccurrenceNotFound {
                booking_id,
                occurrence_id,
            })?;

        let mut changes = ChangeSet::new(booking_id);

        let before = ScheduleWrite::from(&record.occurrence);
        let occurrence = &mut record.occurrence;
        occurrence.start_date = edit.start_date.unwrap_or(occurrence.start_date);
        occurrence.end_date = edit.end_date.unwrap_or(occurrence.end_date);
        occurrence.start_time = edit.start_time.unwrap_or(occurrence.start_time);
        occurrence.end_time = edit.end_time.unwrap_or(occurrence.end_time);
        if occurrence.ends_at() < occurrence.starts_at() {
            return Err(CalculationError::InvalidTimeWindow {
                start: occurrence.starts_at(),
                end: occurrence.ends_at(),
            }
            .into());
        }
        let after = ScheduleWrite::from(&*occurrence);
        if after != before {
            changes.schedules.push(after);
        }

        if edit.touches_detail() {
            let detail = record.detail.as_mut().ok_or_else(|| {
                PricingError::Validation(format!("occurrence {} has no pricing detail to edit", occurrence_id))
            })?;
            let original = detail.clone();
            if let Some(pets) = edit.num_pets {
                detail.num_pets = pets;
            }
            if let Some(unit) = unit {
                detail.unit_of_time = unit.to_string();
            }
            if edit.nights.is_some() {
                detail.nights = edit.nights;
            }
            if *detail != original {
                changes.include_detail(detail.clone());
            }
        }

        let outcome = self.aggregator.recompute(&snapshot)?;
        changes.merge(outcome.changes);
        self.commit(booking_id, &changes, outcome.figures).await
    }

    async fn load(&self, booking_id: i64) -> Result<BookingSnapshot, PricingError> {
        self.store
            .load_snapshot(booking_id)
            .await?
            .ok_or(PricingError::BookingNotFound(booking_id))
    }

    async fn commit(
        &self,
        booking_id: i64,
        changes: &ChangeSet,
        figures: SummaryFigures,
    ) -> Result<SummaryFigures, PricingError> {
        if changes.is_empty() {
            debug!(booking_id, "Booking pricing unchanged");
        } else {
            self.store.apply(changes).await?;
            info!(
                booking_id,
                schedules = changes.schedules.len(),
                details = changes.details.len(),
                rate_sheets = changes.rate_sheets.len(),
                occurrences = changes.occurrence_costs.len(),
                summary = changes.summary.is_some(),
                subtotal = %figures.subtotal,
                "Booking pricing updated"
            );
        }

        self.cache.store_summary(booking_id, figures.clone()).await;
        Ok(figures)
    }

    async fn plan_seed(&self, snapshot: &BookingSnapshot, occurrence_id: i64) -> Result<SeedPlan, StoreError> {
        let mut plan = SeedPlan::default();
        let Some(record) = snapshot.occurrence(occurrence_id) else {
            return Ok(plan);
        };
        if record.detail.is_some() && !record.rate_sheet.is_empty() {
            debug!(occurrence_id, "Occurrence already seeded");
            return Ok(plan);
        }

        let Some(service_id) = snapshot.booking.service_id else {
            warn!(occurrence_id, "Booking {} has no service; nothing to seed", snapshot.booking.booking_id);
            plan.skipped.push("booking has no service".to_string());
            return Ok(plan);
        };
        let Some((service, rates)) = self.store.load_service(service_id).await? else {
            warn!(occurrence_id, "Service {} not found; nothing to seed", service_id);
            plan.skipped.push(format!("service {} not found", service_id));
            return Ok(plan);
        };
        if !service.is_active {
            warn!(occurrence_id, "Service {} is inactive; nothing to seed", service_id);
            plan.skipped.push(format!("service {} is inactive", service_id));
            return Ok(plan);
        }

        if record.detail.is_none() {
            match service.unit_of_time.parse::<UnitOfTime>() {
                Ok(unit) => {
                    plan.detail = Some(OccurrenceDetail {
                        booking_occurrence_id: occurrence_id,
                        num_pets: 1,
                        base_rate: service.base_rate,
                        additional_pet_rate: service.additional_animal_rate,
                        applies_after: service.applies_after,
                        holiday_rate: service.holiday_rate,
                        unit_of_time: unit.to_string(),
                        nights: None,
                        is_prorated: true,
                        multiple: Default::default(),
                        calculated_rate: Default::default(),
                    });
                }
                Err(e) => {
                    warn!(occurrence_id, "Service {} base line not seeded: {}", service_id, e);
                    plan.skipped.push(format!("base rate: {}", e));
                }
            }
        }

        if record.rate_sheet.is_empty() {
            let (sheet, skipped) = RateSheet::seed_from_service(&rates);
            plan.skipped.extend(skipped);
            if !sheet.is_empty() {
                plan.sheet = Some(sheet);
            }
        }

        Ok(plan)
    }
}

/// Terminal bookings are locked; an actor must be allowed to edit in the
/// booking's current state.
fn check_status(snapshot: &BookingSnapshot, actor: Option<PartyRole>) -> Result<(), PricingError> {
    let booking_id = snapshot.booking.booking_id;
    let status = snapshot
        .booking
        .parsed_status()
        .map_err(|e| StoreError::Corrupt(format!("booking {}: {}", booking_id, e)))?;

    if status.is_terminal() {
        return Err(PricingError::BookingLocked { booking_id, status });
    }
    if let Some(role) = actor {
        if !status.permits(role) {
            return Err(PricingError::EditNotAllowed {
                booking_id,
                status,
                role,
            });
        }
    }
    Ok(())
}
