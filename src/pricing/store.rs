//! Persistence port for the pricing engine.
//!
//! The engine reads a whole booking as a [`BookingSnapshot`], computes in
//! memory, and writes back a [`ChangeSet`] atomically.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::models::{
    Booking, BookingSummaryRow, Occurrence, OccurrenceDetail, PartyProfile, PartyRole, Service,
    ServiceRate,
};
use super::platform_fee::month_start;
use super::queries;
use super::rate_sheet::RateSheet;
use super::summary::SummaryFigures;

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored data is invalid: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// One occurrence with its pricing inputs
#[derive(Debug, Clone)]
pub struct OccurrenceRecord {
    pub occurrence: Occurrence,
    pub detail: Option<OccurrenceDetail>,
    pub rate_sheet: RateSheet,
}

/// Everything a recompute reads for one booking
#[derive(Debug, Clone)]
pub struct BookingSnapshot {
    pub booking: Booking,
    pub occurrences: Vec<OccurrenceRecord>,
    pub summary: Option<BookingSummaryRow>,
    pub client: Option<PartyProfile>,
    pub professional: Option<PartyProfile>,
    /// Client's other bookings created earlier in the booking's month
    pub client_prior_bookings: i64,
    /// Professional's other bookings created earlier in the booking's month
    pub professional_prior_bookings: i64,
}

impl BookingSnapshot {
    pub fn occurrence(&self, occurrence_id: i64) -> Option<&OccurrenceRecord> {
        self.occurrences
            .iter()
            .find(|r| r.occurrence.occurrence_id == occurrence_id)
    }

    pub fn occurrence_mut(&mut self, occurrence_id: i64) -> Option<&mut OccurrenceRecord> {
        self.occurrences
            .iter_mut()
            .find(|r| r.occurrence.occurrence_id == occurrence_id)
    }
}

/// New schedule for an occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWrite {
    pub occurrence_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<&Occurrence> for ScheduleWrite {
    fn from(occurrence: &Occurrence) -> Self {
        Self {
            occurrence_id: occurrence.occurrence_id,
            start_date: occurrence.start_date,
            end_date: occurrence.end_date,
            start_time: occurrence.start_time,
            end_time: occurrence.end_time,
        }
    }
}

/// Rows to write for one booking, applied in a single transaction
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub booking_id: i64,
    pub schedules: Vec<ScheduleWrite>,
    /// Full detail rows, upserted by occurrence
    pub details: Vec<OccurrenceDetail>,
    pub rate_sheets: Vec<(i64, RateSheet)>,
    pub occurrence_costs: Vec<(i64, Decimal)>,
    pub summary: Option<SummaryFigures>,
}

impl ChangeSet {
    pub fn new(booking_id: i64) -> Self {
        Self {
            booking_id,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
            && self.details.is_empty()
            && self.rate_sheets.is_empty()
            && self.occurrence_costs.is_empty()
            && self.summary.is_none()
    }

    /// Add a detail row, replacing any earlier row for the same occurrence.
    pub fn include_detail(&mut self, detail: OccurrenceDetail) {
        match self
            .details
            .iter_mut()
            .find(|d| d.booking_occurrence_id == detail.booking_occurrence_id)
        {
            Some(existing) => *existing = detail,
            None => self.details.push(detail),
        }
    }

    pub fn include_rate_sheet(&mut self, occurrence_id: i64, sheet: RateSheet) {
        self.rate_sheets.retain(|(id, _)| *id != occurrence_id);
        self.rate_sheets.push((occurrence_id, sheet));
    }

    /// Fold another change set for the same booking into this one.
    pub fn merge(&mut self, other: ChangeSet) {
        for schedule in other.schedules {
            self.schedules.retain(|s| s.occurrence_id != schedule.occurrence_id);
            self.schedules.push(schedule);
        }
        for detail in other.details {
            self.include_detail(detail);
        }
        for (id, sheet) in other.rate_sheets {
            self.include_rate_sheet(id, sheet);
        }
        for (id, cost) in other.occurrence_costs {
            self.occurrence_costs.retain(|(existing, _)| *existing != id);
            self.occurrence_costs.push((id, cost));
        }
        if other.summary.is_some() {
            self.summary = other.summary;
        }
    }
}

/// Booking persistence used by the pricing service
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn load_snapshot(&self, booking_id: i64) -> Result<Option<BookingSnapshot>, StoreError>;

    async fn load_summary(&self, booking_id: i64) -> Result<Option<BookingSummaryRow>, StoreError>;

    async fn load_service(&self, service_id: i64) -> Result<Option<(Service, Vec<ServiceRate>)>, StoreError>;

    /// Apply every write in `changes` atomically.
    async fn apply(&self, changes: &ChangeSet) -> Result<(), StoreError>;

    /// Cheap connectivity check for health reporting
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Postgres store over the marketplace's Django tables
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn prior_bookings(&self, booking: &Booking, role: PartyRole) -> Result<i64, StoreError> {
        let party_id = match role {
            PartyRole::Client => booking.client_id,
            PartyRole::Professional => booking.professional_id,
        };
        let Some(party_id) = party_id else {
            return Ok(0);
        };

        let count = queries::count_prior_bookings(
            &self.pool,
            role,
            party_id,
            booking.booking_id,
            month_start(booking.created_at),
            booking.created_at,
        )
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn load_snapshot(&self, booking_id: i64) -> Result<Option<BookingSnapshot>, StoreError> {
        let Some(booking) = queries::find_booking(&self.pool, booking_id).await? else {
            return Ok(None);
        };

        let occurrences = queries::list_occurrences(&self.pool, booking_id).await?;
        let mut details = queries::list_details(&self.pool, booking_id).await?;
        let mut rates = queries::list_rate_rows(&self.pool, booking_id).await?;

        let mut records = Vec::with_capacity(occurrences.len());
        for occurrence in occurrences {
            let id = occurrence.occurrence_id;
            let detail = details
                .iter()
                .position(|d| d.booking_occurrence_id == id)
                .map(|i| details.swap_remove(i));
            let rate_sheet = match rates.iter().position(|r| r.occurrence_id == id) {
                Some(i) => {
                    let row = rates.swap_remove(i);
                    RateSheet::from_json(&row.rates).map_err(|e| {
                        StoreError::Corrupt(format!("occurrence {} rates: {}", id, e))
                    })?
                }
                None => RateSheet::default(),
            };
            records.push(OccurrenceRecord {
                occurrence,
                detail,
                rate_sheet,
            });
        }

        let summary = queries::find_summary(&self.pool, booking_id).await?;
        let client = match booking.client_id {
            Some(id) => queries::find_party_profile(&self.pool, PartyRole::Client, id).await?,
            None => None,
        };
        let professional = match booking.professional_id {
            Some(id) => queries::find_party_profile(&self.pool, PartyRole::Professional, id).await?,
            None => None,
        };
        let client_prior_bookings = self.prior_bookings(&booking, PartyRole::Client).await?;
        let professional_prior_bookings = self.prior_bookings(&booking, PartyRole::Professional).await?;

        Ok(Some(BookingSnapshot {
            booking,
            occurrences: records,
            summary,
            client,
            professional,
            client_prior_bookings,
            professional_prior_bookings,
        }))
    }

    async fn load_summary(&self, booking_id: i64) -> Result<Option<BookingSummaryRow>, StoreError> {
        Ok(queries::find_summary(&self.pool, booking_id).await?)
    }

    async fn load_service(&self, service_id: i64) -> Result<Option<(Service, Vec<ServiceRate>)>, StoreError> {
        let Some(service) = queries::find_service(&self.pool, service_id).await? else {
            return Ok(None);
        };
        let rates = queries::list_service_rates(&self.pool, service_id).await?;
        Ok(Some((service, rates)))
    }

    async fn apply(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for schedule in &changes.schedules {
            queries::update_occurrence_schedule(&mut *tx, schedule).await?;
        }
        for detail in &changes.details {
            queries::upsert_detail(&mut *tx, detail).await?;
        }
        for (occurrence_id, sheet) in &changes.rate_sheets {
            queries::upsert_rate_sheet(&mut *tx, *occurrence_id, &sheet.to_json()).await?;
        }
        for (occurrence_id, cost) in &changes.occurrence_costs {
            queries::update_occurrence_cost(&mut *tx, *occurrence_id, *cost).await?;
        }
        if let Some(figures) = &changes.summary {
            queries::upsert_summary(&mut *tx, changes.booking_id, figures).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store for service and route tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};

    use super::*;

    #[derive(Default)]
    pub struct MemoryData {
        pub bookings: HashMap<i64, Booking>,
        pub occurrences: HashMap<i64, Occurrence>,
        pub details: HashMap<i64, OccurrenceDetail>,
        pub rate_sheets: HashMap<i64, RateSheet>,
        pub summaries: HashMap<i64, BookingSummaryRow>,
        pub clients: HashMap<i64, PartyProfile>,
        pub professionals: HashMap<i64, PartyProfile>,
        pub services: HashMap<i64, (Service, Vec<ServiceRate>)>,
        /// Number of successful `apply` calls that wrote something
        pub writes: usize,
        /// Make `apply` fail, to exercise error paths
        pub fail_writes: bool,
        /// Make only the next `apply` fail
        pub fail_next_write: bool,
    }

    #[derive(Default)]
    pub struct MemoryStore {
        pub data: Mutex<MemoryData>,
    }

    impl MemoryStore {
        pub fn with<R>(&self, f: impl FnOnce(&mut MemoryData) -> R) -> R {
            let mut data = self.data.lock().expect("memory store poisoned");
            f(&mut data)
        }

        fn prior(data: &MemoryData, booking: &Booking, role: PartyRole) -> i64 {
            let party = |b: &Booking| match role {
                PartyRole::Client => b.client_id,
                PartyRole::Professional => b.professional_id,
            };
            let Some(party_id) = party(booking) else {
                return 0;
            };
            let from: DateTime<Utc> = month_start(booking.created_at);

            data.bookings
                .values()
                .filter(|b| b.booking_id != booking.booking_id)
                .filter(|b| party(b) == Some(party_id))
                .filter(|b| b.created_at >= from && b.created_at < booking.created_at)
                .count() as i64
        }
    }

    #[async_trait]
    impl BookingStore for MemoryStore {
        async fn load_snapshot(&self, booking_id: i64) -> Result<Option<BookingSnapshot>, StoreError> {
            self.with(|data| {
                let Some(booking) = data.bookings.get(&booking_id).cloned() else {
                    return Ok(None);
                };

                let mut occurrences: Vec<_> = data
                    .occurrences
                    .values()
                    .filter(|o| o.booking_id == booking_id)
                    .cloned()
                    .collect();
                occurrences.sort_by_key(|o| (o.start_date, o.start_time, o.occurrence_id));

                let records = occurrences
                    .into_iter()
                    .map(|occurrence| OccurrenceRecord {
                        detail: data.details.get(&occurrence.occurrence_id).cloned(),
                        rate_sheet: data
                            .rate_sheets
                            .get(&occurrence.occurrence_id)
                            .cloned()
                            .unwrap_or_default(),
                        occurrence,
                    })
                    .collect();

                Ok(Some(BookingSnapshot {
                    occurrences: records,
                    summary: data.summaries.get(&booking_id).cloned(),
                    client: booking.client_id.and_then(|id| data.clients.get(&id).cloned()),
                    professional: booking
                        .professional_id
                        .and_then(|id| data.professionals.get(&id).cloned()),
                    client_prior_bookings: Self::prior(data, &booking, PartyRole::Client),
                    professional_prior_bookings: Self::prior(data, &booking, PartyRole::Professional),
                    booking,
                }))
            })
        }

        async fn load_summary(&self, booking_id: i64) -> Result<Option<BookingSummaryRow>, StoreError> {
            Ok(self.with(|data| data.summaries.get(&booking_id).cloned()))
        }

        async fn load_service(&self, service_id: i64) -> Result<Option<(Service, Vec<ServiceRate>)>, StoreError> {
            Ok(self.with(|data| data.services.get(&service_id).cloned()))
        }

        async fn apply(&self, changes: &ChangeSet) -> Result<(), StoreError> {
            self.with(|data| {
                if data.fail_writes {
                    return Err(StoreError::Unavailable("writes disabled".to_string()));
                }
                if std::mem::take(&mut data.fail_next_write) {
                    return Err(StoreError::Unavailable("write rejected".to_string()));
                }
                if changes.is_empty() {
                    return Ok(());
                }

                let now = Utc::now();
                for schedule in &changes.schedules {
                    if let Some(o) = data.occurrences.get_mut(&schedule.occurrence_id) {
                        o.start_date = schedule.start_date;
                        o.end_date = schedule.end_date;
                        o.start_time = schedule.start_time;
                        o.end_time = schedule.end_time;
                        o.updated_at = now;
                    }
                }
                for detail in &changes.details {
                    data.details.insert(detail.booking_occurrence_id, detail.clone());
                }
                for (id, sheet) in &changes.rate_sheets {
                    data.rate_sheets.insert(*id, sheet.clone());
                }
                for (id, cost) in &changes.occurrence_costs {
                    if let Some(o) = data.occurrences.get_mut(id) {
                        o.calculated_cost = *cost;
                        o.updated_at = now;
                    }
                }
                if let Some(f) = &changes.summary {
                    let created_at = data
                        .summaries
                        .get(&changes.booking_id)
                        .map(|s| s.created_at)
                        .unwrap_or(now);
                    data.summaries.insert(
                        changes.booking_id,
                        BookingSummaryRow {
                            booking_id: changes.booking_id,
                            subtotal: f.subtotal,
                            client_platform_fee_percentage: f.client_fee_percentage,
                            pro_platform_fee_percentage: f.pro_fee_percentage,
                            tax_percentage: f.tax_percentage,
                            client_platform_fee: f.client_fee,
                            pro_platform_fee: f.pro_fee,
                            tax_amount: f.tax_amount,
                            total_client_cost: f.total_client_cost,
                            total_sitter_payout: f.total_professional_payout,
                            created_at,
                            updated_at: now,
                        },
                    );
                }

                data.writes += 1;
                Ok(())
            })
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }
}
