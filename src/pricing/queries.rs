//! Database queries for the pricing engine.
//!
//! Reads go straight to the pool; writes take a connection so the store can
//! run them inside one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use super::models::{
    Booking, BookingSummaryRow, Occurrence, OccurrenceDetail, OccurrenceRateRow, PartyProfile,
    PartyRole, Service, ServiceRate,
};
use super::store::ScheduleWrite;
use super::summary::SummaryFigures;

/// Get a booking by id
pub async fn find_booking(pool: &PgPool, booking_id: i64) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        r#"
        SELECT booking_id, client_id, professional_id, service_id, status, created_at
        FROM bookings_booking
        WHERE booking_id = $1
        "#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await
}

/// All occurrences of a booking in schedule order
pub async fn list_occurrences(pool: &PgPool, booking_id: i64) -> Result<Vec<Occurrence>, sqlx::Error> {
    sqlx::query_as::<_, Occurrence>(
        r#"
        SELECT
            occurrence_id, booking_id,
            start_date, end_date, start_time, end_time,
            status, calculated_cost, created_at, updated_at
        FROM booking_occurrences_bookingoccurrence
        WHERE booking_id = $1
        ORDER BY start_date, start_time, occurrence_id
        "#,
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await
}

/// Base-rate details for every occurrence of a booking
pub async fn list_details(pool: &PgPool, booking_id: i64) -> Result<Vec<OccurrenceDetail>, sqlx::Error> {
    sqlx::query_as::<_, OccurrenceDetail>(
        r#"
        SELECT
            d.booking_occurrence_id, d.num_pets,
            d.base_rate, d.additional_pet_rate, d.applies_after, d.holiday_rate,
            d.unit_of_time, d.nights, d.is_prorated,
            d.multiple, d.calculated_rate
        FROM booking_details_bookingdetails d
        JOIN booking_occurrences_bookingoccurrence o
          ON o.occurrence_id = d.booking_occurrence_id
        WHERE o.booking_id = $1
        "#,
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await
}

/// Stored rate sheets for every occurrence of a booking
pub async fn list_rate_rows(pool: &PgPool, booking_id: i64) -> Result<Vec<OccurrenceRateRow>, sqlx::Error> {
    sqlx::query_as::<_, OccurrenceRateRow>(
        r#"
        SELECT r.occurrence_id, r.rates
        FROM booking_occurrence_rates_bookingoccurrencerate r
        JOIN booking_occurrences_bookingoccurrence o
          ON o.occurrence_id = r.occurrence_id
        WHERE o.booking_id = $1
        "#,
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await
}

/// Get the summary row of a booking
pub async fn find_summary(pool: &PgPool, booking_id: i64) -> Result<Option<BookingSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, BookingSummaryRow>(
        r#"
        SELECT
            booking_id, subtotal,
            client_platform_fee_percentage, pro_platform_fee_percentage, tax_percentage,
            client_platform_fee, pro_platform_fee, tax_amount,
            total_client_cost, total_sitter_payout,
            created_at, updated_at
        FROM booking_summary_bookingsummary
        WHERE booking_id = $1
        "#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await
}

/// Address types that mark the on-file address, best first
const ON_FILE_ADDRESS_TYPES: [&str; 2] = ["primary", "home"];

/// Load a party's plan and on-file state.
///
/// A user may have several addresses; primary beats home, then any other
/// type, with ties going to the oldest row.
pub async fn find_party_profile(
    pool: &PgPool,
    role: PartyRole,
    party_id: i64,
) -> Result<Option<PartyProfile>, sqlx::Error> {
    sqlx::query_as::<_, PartyProfile>(&party_profile_sql(role))
        .bind(party_id)
        .fetch_optional(pool)
        .await
}

fn party_profile_sql(role: PartyRole) -> String {
    let (table, key) = match role {
        PartyRole::Client => ("clients_client", "client_id"),
        PartyRole::Professional => ("professionals_professional", "professional_id"),
    };
    let [primary, home] = ON_FILE_ADDRESS_TYPES;

    format!(
        r#"
        SELECT p.{key} AS party_id, u.id AS user_id, u.subscription_plan, a.state
        FROM {table} p
        JOIN users_customuser u ON u.id = p.user_id
        LEFT JOIN user_addresses_address a ON a.user_id = u.id
        WHERE p.{key} = $1
        ORDER BY
            CASE lower(a.address_type) WHEN '{primary}' THEN 0 WHEN '{home}' THEN 1 ELSE 2 END,
            a.id NULLS LAST
        LIMIT 1
        "#
    )
}

/// Count a party's other bookings created in `[from, before)`
pub async fn count_prior_bookings(
    pool: &PgPool,
    role: PartyRole,
    party_id: i64,
    exclude_booking_id: i64,
    from: DateTime<Utc>,
    before: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let sql = match role {
        PartyRole::Client => {
            r#"
            SELECT COUNT(*)
            FROM bookings_booking
            WHERE client_id = $1
              AND booking_id <> $2
              AND created_at >= $3
              AND created_at < $4
            "#
        }
        PartyRole::Professional => {
            r#"
            SELECT COUNT(*)
            FROM bookings_booking
            WHERE professional_id = $1
              AND booking_id <> $2
              AND created_at >= $3
              AND created_at < $4
            "#
        }
    };

    sqlx::query_scalar(sql)
        .bind(party_id)
        .bind(exclude_booking_id)
        .bind(from)
        .bind(before)
        .fetch_one(pool)
        .await
}

/// Get a service's base-rate configuration
pub async fn find_service(pool: &PgPool, service_id: i64) -> Result<Option<Service>, sqlx::Error> {
    sqlx::query_as::<_, Service>(
        r#"
        SELECT
            service_id, base_rate, additional_animal_rate, applies_after,
            holiday_rate, unit_of_time, is_active
        FROM services_service
        WHERE service_id = $1
        "#,
    )
    .bind(service_id)
    .fetch_optional(pool)
    .await
}

/// A service's additional named rates in display order
pub async fn list_service_rates(pool: &PgPool, service_id: i64) -> Result<Vec<ServiceRate>, sqlx::Error> {
    sqlx::query_as::<_, ServiceRate>(
        r#"
        SELECT service_id, title, description, rate
        FROM services_servicerate
        WHERE service_id = $1
        ORDER BY id
        "#,
    )
    .bind(service_id)
    .fetch_all(pool)
    .await
}

pub async fn update_occurrence_schedule(
    conn: &mut PgConnection,
    schedule: &ScheduleWrite,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE booking_occurrences_bookingoccurrence
        SET start_date = $2, end_date = $3, start_time = $4, end_time = $5, updated_at = NOW()
        WHERE occurrence_id = $1
        "#,
    )
    .bind(schedule.occurrence_id)
    .bind(schedule.start_date)
    .bind(schedule.end_date)
    .bind(schedule.start_time)
    .bind(schedule.end_time)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn upsert_detail(conn: &mut PgConnection, detail: &OccurrenceDetail) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO booking_details_bookingdetails (
            booking_occurrence_id, num_pets,
            base_rate, additional_pet_rate, applies_after, holiday_rate,
            unit_of_time, nights, is_prorated, multiple, calculated_rate
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (booking_occurrence_id) DO UPDATE SET
            num_pets = EXCLUDED.num_pets,
            base_rate = EXCLUDED.base_rate,
            additional_pet_rate = EXCLUDED.additional_pet_rate,
            applies_after = EXCLUDED.applies_after,
            holiday_rate = EXCLUDED.holiday_rate,
            unit_of_time = EXCLUDED.unit_of_time,
            nights = EXCLUDED.nights,
            is_prorated = EXCLUDED.is_prorated,
            multiple = EXCLUDED.multiple,
            calculated_rate = EXCLUDED.calculated_rate
        "#,
    )
    .bind(detail.booking_occurrence_id)
    .bind(detail.num_pets)
    .bind(detail.base_rate)
    .bind(detail.additional_pet_rate)
    .bind(detail.applies_after)
    .bind(detail.holiday_rate)
    .bind(&detail.unit_of_time)
    .bind(detail.nights)
    .bind(detail.is_prorated)
    .bind(detail.multiple)
    .bind(detail.calculated_rate)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn upsert_rate_sheet(
    conn: &mut PgConnection,
    occurrence_id: i64,
    rates: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO booking_occurrence_rates_bookingoccurrencerate (occurrence_id, rates, created_at, updated_at)
        VALUES ($1, $2, NOW(), NOW())
        ON CONFLICT (occurrence_id) DO UPDATE SET
            rates = EXCLUDED.rates,
            updated_at = NOW()
        "#,
    )
    .bind(occurrence_id)
    .bind(rates)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn update_occurrence_cost(
    conn: &mut PgConnection,
    occurrence_id: i64,
    calculated_cost: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE booking_occurrences_bookingoccurrence
        SET calculated_cost = $2, updated_at = NOW()
        WHERE occurrence_id = $1
        "#,
    )
    .bind(occurrence_id)
    .bind(calculated_cost)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn upsert_summary(
    conn: &mut PgConnection,
    booking_id: i64,
    figures: &SummaryFigures,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO booking_summary_bookingsummary (
            booking_id, subtotal,
            client_platform_fee_percentage, pro_platform_fee_percentage, tax_percentage,
            client_platform_fee, pro_platform_fee, tax_amount,
            total_client_cost, total_sitter_payout,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
        ON CONFLICT (booking_id) DO UPDATE SET
            subtotal = EXCLUDED.subtotal,
            client_platform_fee_percentage = EXCLUDED.client_platform_fee_percentage,
            pro_platform_fee_percentage = EXCLUDED.pro_platform_fee_percentage,
            tax_percentage = EXCLUDED.tax_percentage,
            client_platform_fee = EXCLUDED.client_platform_fee,
            pro_platform_fee = EXCLUDED.pro_platform_fee,
            tax_amount = EXCLUDED.tax_amount,
            total_client_cost = EXCLUDED.total_client_cost,
            total_sitter_payout = EXCLUDED.total_sitter_payout,
            updated_at = NOW()
        "#,
    )
    .bind(booking_id)
    .bind(figures.subtotal)
    .bind(figures.client_fee_percentage)
    .bind(figures.pro_fee_percentage)
    .bind(figures.tax_percentage)
    .bind(figures.client_fee)
    .bind(figures.pro_fee)
    .bind(figures.tax_amount)
    .bind(figures.total_client_cost)
    .bind(figures.total_professional_payout)
    .execute(conn)
    .await?;

    Ok(())
}
