//! Service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::pricing::platform_fee::STANDARD_FEE_RATE;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub database_max_connections: u32,
    /// Standard platform fee as a fraction (0.15 = 15%)
    pub platform_fee_rate: Decimal,
    pub holiday_dates: Vec<NaiveDate>,
    /// JSON file overriding the built-in state tax rules
    pub tax_rules_file: Option<PathBuf>,
    pub summary_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so parsing can be tested without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("PORT must be a number, got {:?}", raw))?,
            None => 3100,
        };

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS must be a number, got {:?}", raw))?,
            None => 5,
        };

        let platform_fee_rate = match lookup("PLATFORM_FEE_RATE") {
            Some(raw) => raw
                .trim()
                .parse::<Decimal>()
                .with_context(|| format!("PLATFORM_FEE_RATE must be a decimal, got {:?}", raw))?,
            None => STANDARD_FEE_RATE,
        };
        if platform_fee_rate < Decimal::ZERO || platform_fee_rate > Decimal::ONE {
            bail!("PLATFORM_FEE_RATE must be between 0 and 1, got {}", platform_fee_rate);
        }

        let holiday_dates = match lookup("HOLIDAY_DATES") {
            Some(raw) => parse_holidays(&raw)?,
            None => Vec::new(),
        };

        let tax_rules_file = lookup("TAX_RULES_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let summary_cache_ttl = match lookup("SUMMARY_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("SUMMARY_CACHE_TTL_SECS must be a number, got {:?}", raw))?,
            ),
            None => Duration::from_secs(600),
        };

        Ok(Self {
            database_url,
            port,
            database_max_connections,
            platform_fee_rate,
            holiday_dates,
            tax_rules_file,
            summary_cache_ttl,
        })
    }
}

/// Parse a comma-separated list of `YYYY-MM-DD` dates
pub fn parse_holidays(raw: &str) -> anyhow::Result<Vec<NaiveDate>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid holiday date {:?}", s))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/pets")]).unwrap();
        assert_eq!(config.port, 3100);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.platform_fee_rate, dec!(0.15));
        assert!(config.holiday_dates.is_empty());
        assert!(config.tax_rules_file.is_none());
        assert_eq!(config.summary_cache_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_database_url_required() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/pets"),
            ("PORT", "8080"),
            ("PLATFORM_FEE_RATE", "0.12"),
            ("HOLIDAY_DATES", "2024-12-25, 2025-01-01,"),
            ("TAX_RULES_FILE", "/etc/pawprice/tax.json"),
            ("SUMMARY_CACHE_TTL_SECS", "30"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.platform_fee_rate, dec!(0.12));
        assert_eq!(
            config.holiday_dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 12, 25).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            ]
        );
        assert_eq!(config.tax_rules_file, Some(PathBuf::from("/etc/pawprice/tax.json")));
        assert_eq!(config.summary_cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = ("DATABASE_URL", "postgres://localhost/pets");
        assert!(config(&[base, ("PLATFORM_FEE_RATE", "1.5")]).is_err());
        assert!(config(&[base, ("PORT", "http")]).is_err());
        assert!(config(&[base, ("HOLIDAY_DATES", "12/25/2024")]).is_err());
    }
}
