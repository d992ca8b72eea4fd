//! Booking pricing engine.
//!
//! Derives occurrence costs, platform fees, tax and booking totals for the
//! pet-care marketplace. Django calls it via HTTP/JSON whenever a booking's
//! inputs change.

pub mod calculators;
pub mod holidays;
pub mod models;
pub mod money;
pub mod platform_fee;
pub mod queries;
pub mod rate_sheet;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;
pub mod store;
pub mod summary;
pub mod tax;
pub mod units;

// Re-export commonly used items
pub use calculators::{round_money, CalculationError, OccurrenceCostCalculator};
pub use routes::router;
pub use services::{PricingError, PricingService};
pub use store::{BookingStore, PgBookingStore};
pub use summary::{BookingSummaryAggregator, SummaryFigures};
