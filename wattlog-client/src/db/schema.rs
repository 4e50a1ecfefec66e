use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

const CREATE_READINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS readings (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time      TEXT NOT NULL,
        end_time        TEXT NOT NULL,
        consumption_kwh REAL NOT NULL,
        UNIQUE (start_time, end_time)
    )
"#;

const CREATE_WEATHER: &str = r#"
    CREATE TABLE IF NOT EXISTS weather (
        id                       INTEGER PRIMARY KEY AUTOINCREMENT,
        time                     TEXT NOT NULL UNIQUE,
        temperature_2m           REAL,
        precipitation            REAL,
        cloud_cover              REAL,
        shortwave_radiation      REAL,
        direct_radiation         REAL,
        direct_normal_irradiance REAL,
        diffuse_radiation        REAL,
        wind_speed_10m           REAL
    )
"#;

const CREATE_SETTINGS: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        id               INTEGER PRIMARY KEY CHECK (id = 1),
        hp_cost          REAL NOT NULL,
        hc_cost          REAL NOT NULL,
        hp_start         TEXT NOT NULL,
        hp_end           TEXT NOT NULL,
        latitude         REAL NOT NULL,
        longitude        REAL NOT NULL,
        solar_wc         REAL NOT NULL,
        solar_efficiency REAL NOT NULL,
        solar_loss       REAL NOT NULL,
        solar_cost       REAL NOT NULL
    )
"#;

/// Open the store and make sure every table exists.
///
/// In-memory databases live as long as their single connection, so the pool keeps it open.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url '{url}'"))?
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
    if url.contains(":memory:") {
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database '{url}'"))?;
    create_tables(&pool).await?;
    Ok(pool)
}

pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    for ddl in [CREATE_READINGS, CREATE_WEATHER, CREATE_SETTINGS] {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    connect("sqlite::memory:", 1).await.unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_tables_is_idempotent() {
        let pool = memory_pool().await;
        create_tables(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('readings', 'weather', 'settings') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["readings", "settings", "weather"]);
    }
}
