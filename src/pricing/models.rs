//! Database models for pricing queries.
//!
//! These models use sqlx's FromRow derive for direct deserialization from the
//! marketplace's Django tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which side of a booking a party is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Client,
    Professional,
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyRole::Client => f.write_str("client"),
            PartyRole::Professional => f.write_str("professional"),
        }
    }
}

/// Booking lifecycle state, stored as its display label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "Draft")]
    Draft,
    #[serde(rename = "Pending Professional Review")]
    PendingProfessionalReview,
    #[serde(rename = "Pending Professional Changes")]
    PendingProfessionalChanges,
    #[serde(rename = "Pending Client Approval")]
    PendingClientApproval,
    #[serde(rename = "Confirmed")]
    Confirmed,
    #[serde(rename = "Confirmed Pending Professional Changes")]
    ConfirmedPendingProfessionalChanges,
    #[serde(rename = "Confirmed Pending Client Approval")]
    ConfirmedPendingClientApproval,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Denied")]
    Denied,
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 10] = [
        BookingStatus::Draft,
        BookingStatus::PendingProfessionalReview,
        BookingStatus::PendingProfessionalChanges,
        BookingStatus::PendingClientApproval,
        BookingStatus::Confirmed,
        BookingStatus::ConfirmedPendingProfessionalChanges,
        BookingStatus::ConfirmedPendingClientApproval,
        BookingStatus::Completed,
        BookingStatus::Denied,
        BookingStatus::Cancelled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Draft => "Draft",
            BookingStatus::PendingProfessionalReview => "Pending Professional Review",
            BookingStatus::PendingProfessionalChanges => "Pending Professional Changes",
            BookingStatus::PendingClientApproval => "Pending Client Approval",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::ConfirmedPendingProfessionalChanges => "Confirmed Pending Professional Changes",
            BookingStatus::ConfirmedPendingClientApproval => "Confirmed Pending Client Approval",
            BookingStatus::Completed => "Completed",
            BookingStatus::Denied => "Denied",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// Completed, denied and cancelled bookings are never recomputed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Denied | BookingStatus::Cancelled
        )
    }

    pub fn professional_can_edit(&self) -> bool {
        matches!(
            self,
            BookingStatus::Draft
                | BookingStatus::PendingProfessionalReview
                | BookingStatus::PendingProfessionalChanges
                | BookingStatus::Confirmed
                | BookingStatus::ConfirmedPendingProfessionalChanges
        )
    }

    pub fn client_can_act(&self) -> bool {
        matches!(
            self,
            BookingStatus::PendingClientApproval | BookingStatus::ConfirmedPendingClientApproval
        )
    }

    /// Whether `role` may make changes that feed a recompute in this state
    pub fn permits(&self, role: PartyRole) -> bool {
        match role {
            PartyRole::Professional => self.professional_can_edit(),
            PartyRole::Client => self.client_can_act(),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown booking status {:?}", s))
    }
}

/// Booking from bookings_booking
#[derive(Debug, Clone, FromRow)]
pub struct Booking {
    pub booking_id: i64,
    pub client_id: Option<i64>,
    pub professional_id: Option<i64>,
    pub service_id: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn parsed_status(&self) -> Result<BookingStatus, String> {
        self.status.parse()
    }
}

/// Occurrence from booking_occurrences_bookingoccurrence.
///
/// Dates and times are stored in UTC, 24-hour form.
#[derive(Debug, Clone, FromRow)]
pub struct Occurrence {
    pub occurrence_id: i64,
    pub booking_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: String,
    pub calculated_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Occurrence {
    pub fn starts_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.start_date, self.start_time).and_utc()
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.end_date, self.end_time).and_utc()
    }

    /// Calendar nights spanned by the occurrence, at least one
    pub fn calendar_nights(&self) -> u32 {
        let nights = (self.end_date - self.start_date).num_days().max(1);
        u32::try_from(nights).unwrap_or(u32::MAX)
    }
}

/// Base-rate context from booking_details_bookingdetails
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OccurrenceDetail {
    pub booking_occurrence_id: i64,
    pub num_pets: i32,
    pub base_rate: Decimal,
    pub additional_pet_rate: Decimal,
    pub applies_after: i32,
    pub holiday_rate: Decimal,
    pub unit_of_time: String,
    pub nights: Option<i32>,
    pub is_prorated: bool,
    pub multiple: Decimal,
    pub calculated_rate: Decimal,
}

/// Stored rate sheet from booking_occurrence_rates_bookingoccurrencerate
#[derive(Debug, Clone, FromRow)]
pub struct OccurrenceRateRow {
    pub occurrence_id: i64,
    pub rates: serde_json::Value,
}

/// Summary row from booking_summary_bookingsummary.
///
/// Percentages are stored in percentage points (15.00 = 15%).
#[derive(Debug, Clone, FromRow)]
pub struct BookingSummaryRow {
    pub booking_id: i64,
    pub subtotal: Decimal,
    pub client_platform_fee_percentage: Decimal,
    pub pro_platform_fee_percentage: Decimal,
    pub tax_percentage: Decimal,
    pub client_platform_fee: Decimal,
    pub pro_platform_fee: Decimal,
    pub tax_amount: Decimal,
    pub total_client_cost: Decimal,
    pub total_sitter_payout: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription and address facts for one side of a booking
#[derive(Debug, Clone, FromRow)]
pub struct PartyProfile {
    pub party_id: i64,
    pub user_id: i64,
    pub subscription_plan: Option<i32>,
    pub state: Option<String>,
}

/// Service from services_service
#[derive(Debug, Clone, FromRow)]
pub struct Service {
    pub service_id: i64,
    pub base_rate: Decimal,
    pub additional_animal_rate: Decimal,
    pub applies_after: i32,
    pub holiday_rate: Decimal,
    pub unit_of_time: String,
    pub is_active: bool,
}

/// Additional named rate from services_servicerate
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRate {
    pub service_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub rate: Decimal,
}
