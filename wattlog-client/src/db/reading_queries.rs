use std::collections::BTreeSet;

use anyhow::Result;
use sqlx::{Executor, Sqlite, SqlitePool};
use time::{Date, PrimitiveDateTime};

use crate::domain::Reading;

/// Look up the reading stored for an exact `(start_time, end_time)` interval.
pub async fn find_reading<'e, E>(
    executor: E,
    start_time: PrimitiveDateTime,
    end_time: PrimitiveDateTime,
) -> Result<Option<Reading>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Reading>(
        r#"
        SELECT start_time, end_time, consumption_kwh
        FROM readings
        WHERE start_time = ?1
          AND end_time   = ?2
        "#,
    )
    .bind(start_time)
    .bind(end_time)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

pub async fn insert_reading<'e, E>(executor: E, reading: &Reading) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO readings (start_time, end_time, consumption_kwh) VALUES (?1, ?2, ?3)")
        .bind(reading.start_time)
        .bind(reading.end_time)
        .bind(reading.consumption_kwh)
        .execute(executor)
        .await?;
    Ok(())
}

/// Overwrite the consumption of an existing interval. Returns whether a row matched.
pub async fn update_reading_value<'e, E>(
    executor: E,
    start_time: PrimitiveDateTime,
    end_time: PrimitiveDateTime,
    consumption_kwh: f64,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE readings SET consumption_kwh = ?3 WHERE start_time = ?1 AND end_time = ?2",
    )
    .bind(start_time)
    .bind(end_time)
    .bind(consumption_kwh)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fetch a time-ordered series of readings starting in `[start, end)`.
pub async fn readings_in_range(
    pool: &SqlitePool,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> Result<Vec<Reading>> {
    let rows = sqlx::query_as::<_, Reading>(
        r#"
        SELECT start_time, end_time, consumption_kwh
        FROM readings
        WHERE start_time >= ?1
          AND start_time <  ?2
        ORDER BY start_time
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every stored reading, time-ordered.
pub async fn all_readings(pool: &SqlitePool) -> Result<Vec<Reading>> {
    let rows = sqlx::query_as::<_, Reading>(
        "SELECT start_time, end_time, consumption_kwh FROM readings ORDER BY start_time",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Distinct calendar days that have at least one reading.
pub async fn consumption_days(pool: &SqlitePool) -> Result<BTreeSet<Date>> {
    let starts: Vec<PrimitiveDateTime> = sqlx::query_scalar("SELECT DISTINCT start_time FROM readings")
        .fetch_all(pool)
        .await?;
    Ok(starts.into_iter().map(|ts| ts.date()).collect())
}
