//! Booking cost, platform fee and tax engine for the pet-care marketplace.

pub mod cache;
pub mod config;
pub mod error;
pub mod pricing;
pub mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::cache::AppCache;
use crate::config::Config;
use crate::pricing::holidays::{FixedHolidays, HolidayCalendar, NoHolidays};
use crate::pricing::platform_fee::PlatformFeeResolver;
use crate::pricing::tax::TaxResolver;
use crate::pricing::{BookingSummaryAggregator, OccurrenceCostCalculator, PgBookingStore, PricingService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pricing: Arc<PricingService>,
    pub cache: AppCache,
}

impl AppState {
    /// Wire the pricing service over Postgres from configuration.
    pub fn from_config(config: &Config, pool: PgPool) -> anyhow::Result<Self> {
        let holidays: Arc<dyn HolidayCalendar> = if config.holiday_dates.is_empty() {
            Arc::new(NoHolidays)
        } else {
            Arc::new(FixedHolidays::new(config.holiday_dates.iter().copied()))
        };

        let taxes = match &config.tax_rules_file {
            Some(path) => {
                let taxes = TaxResolver::from_file(path)
                    .with_context(|| format!("loading tax rules from {}", path.display()))?;
                info!("Loaded tax rules from {}", path.display());
                taxes
            }
            None => TaxResolver::default(),
        };

        let aggregator = BookingSummaryAggregator::new(
            OccurrenceCostCalculator::new(holidays),
            PlatformFeeResolver::new(config.platform_fee_rate),
            taxes,
        );

        let cache = AppCache::new(config.summary_cache_ttl);
        let store = Arc::new(PgBookingStore::new(pool));

        Ok(Self {
            pricing: Arc::new(PricingService::new(store, cache.clone(), aggregator)),
            cache,
        })
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/v1/pricing", pricing::router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
