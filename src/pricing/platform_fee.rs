//! Platform fee tiers by subscription plan.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use super::models::PartyRole;

/// Default commission when no subscription benefit applies
pub const STANDARD_FEE_RATE: Decimal = dec!(0.15);

/// Subscription tier stored on the user record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPlan {
    /// First booking each calendar month is free, then standard rate
    Free,
    Waitlist,
    Commission,
    ProSubscription,
    ClientSubscription,
    DualSubscription,
}

impl TryFrom<i32> for SubscriptionPlan {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SubscriptionPlan::Free),
            1 => Ok(SubscriptionPlan::Waitlist),
            2 => Ok(SubscriptionPlan::Commission),
            3 => Ok(SubscriptionPlan::ProSubscription),
            4 => Ok(SubscriptionPlan::ClientSubscription),
            5 => Ok(SubscriptionPlan::DualSubscription),
            other => Err(other),
        }
    }
}

/// Resolves the fee fraction (0.00-1.00) charged to one side of a booking
#[derive(Debug, Clone)]
pub struct PlatformFeeResolver {
    standard_rate: Decimal,
}

impl Default for PlatformFeeResolver {
    fn default() -> Self {
        Self::new(STANDARD_FEE_RATE)
    }
}

impl PlatformFeeResolver {
    pub fn new(standard_rate: Decimal) -> Self {
        Self { standard_rate }
    }

    /// Resolve from a raw stored plan value.
    ///
    /// A missing or unknown plan falls back to the standard rate.
    pub fn resolve(
        &self,
        subscription_plan: Option<i32>,
        is_first_booking_this_month: bool,
        role: PartyRole,
    ) -> Decimal {
        match subscription_plan.map(SubscriptionPlan::try_from) {
            Some(Ok(plan)) => self.resolve_plan(plan, is_first_booking_this_month, role),
            Some(Err(raw)) => {
                warn!("Unknown subscription plan {} for {}; charging standard fee", raw, role);
                self.standard_rate
            }
            None => {
                warn!("No subscription plan on file for {}; charging standard fee", role);
                self.standard_rate
            }
        }
    }

    pub fn resolve_plan(
        &self,
        plan: SubscriptionPlan,
        is_first_booking_this_month: bool,
        role: PartyRole,
    ) -> Decimal {
        use PartyRole::*;
        use SubscriptionPlan::*;

        let waived = match (plan, role) {
            (Free, _) => is_first_booking_this_month,
            (Waitlist, _) | (DualSubscription, _) => true,
            (Commission, _) => false,
            (ProSubscription, Professional) | (ClientSubscription, Client) => true,
            (ProSubscription, Client) | (ClientSubscription, Professional) => false,
        };

        if waived {
            Decimal::ZERO
        } else {
            self.standard_rate
        }
    }
}

/// Midnight UTC on the first day of `at`'s month
pub fn month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

/// A party with no earlier bookings this month is on their first booking
pub fn is_first_booking(prior_bookings_this_month: i64) -> bool {
    prior_bookings_this_month == 0
}
