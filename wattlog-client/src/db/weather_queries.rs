use std::collections::BTreeSet;

use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use time::{Date, PrimitiveDateTime};

use crate::domain::WeatherSample;

// 9 bound parameters per row keeps a chunk well below SQLite's variable limit.
const INSERT_CHUNK: usize = 100;

/// Persist weather samples in one transaction, skipping times that are already stored.
///
/// Returns the number of rows actually inserted.
pub async fn insert_weather_samples(pool: &SqlitePool, samples: &[WeatherSample]) -> Result<u64> {
    if samples.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for chunk in samples.chunks(INSERT_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO weather (time, temperature_2m, precipitation, cloud_cover, shortwave_radiation, \
             direct_radiation, direct_normal_irradiance, diffuse_radiation, wind_speed_10m) ",
        );
        builder.push_values(chunk, |mut b, w| {
            b.push_bind(w.time)
                .push_bind(w.temperature_2m)
                .push_bind(w.precipitation)
                .push_bind(w.cloud_cover)
                .push_bind(w.shortwave_radiation)
                .push_bind(w.direct_radiation)
                .push_bind(w.direct_normal_irradiance)
                .push_bind(w.diffuse_radiation)
                .push_bind(w.wind_speed_10m);
        });
        builder.push(" ON CONFLICT (time) DO NOTHING");

        inserted += builder.build().execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Fetch time-ordered weather samples in `[start, end)`.
pub async fn weather_in_range(
    pool: &SqlitePool,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> Result<Vec<WeatherSample>> {
    let rows = sqlx::query_as::<_, WeatherSample>(
        r#"
        SELECT
            time,
            temperature_2m,
            precipitation,
            cloud_cover,
            shortwave_radiation,
            direct_radiation,
            direct_normal_irradiance,
            diffuse_radiation,
            wind_speed_10m
        FROM weather
        WHERE time >= ?1
          AND time <  ?2
        ORDER BY time
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Distinct calendar days that have at least one weather sample.
pub async fn weather_days(pool: &SqlitePool) -> Result<BTreeSet<Date>> {
    let times: Vec<PrimitiveDateTime> = sqlx::query_scalar("SELECT time FROM weather")
        .fetch_all(pool)
        .await?;
    Ok(times.into_iter().map(|ts| ts.date()).collect())
}
