use sqlx::SqlitePool;

use crate::domain::{TariffSettings, ValidationError};

#[derive(thiserror::Error, Debug)]
pub enum UpdateSettingsError {
    #[error("invalid settings: {0}")]
    Validation(#[from] ValidationError),
    #[error("settings store error: {0}")]
    Store(#[from] sqlx::Error),
}

const SELECT_SETTINGS: &str = r#"
    SELECT hp_cost, hc_cost, hp_start, hp_end, latitude, longitude,
           solar_wc, solar_efficiency, solar_loss, solar_cost
    FROM settings
    WHERE id = 1
"#;

const UPSERT_SETTINGS: &str = r#"
    INSERT INTO settings (id, hp_cost, hc_cost, hp_start, hp_end, latitude, longitude,
                          solar_wc, solar_efficiency, solar_loss, solar_cost)
    VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT (id) DO UPDATE SET
        hp_cost          = excluded.hp_cost,
        hc_cost          = excluded.hc_cost,
        hp_start         = excluded.hp_start,
        hp_end           = excluded.hp_end,
        latitude         = excluded.latitude,
        longitude        = excluded.longitude,
        solar_wc         = excluded.solar_wc,
        solar_efficiency = excluded.solar_efficiency,
        solar_loss       = excluded.solar_loss,
        solar_cost       = excluded.solar_cost
"#;

async fn write_settings(pool: &SqlitePool, s: &TariffSettings) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_SETTINGS)
        .bind(s.hp_cost)
        .bind(s.hc_cost)
        .bind(s.hp_start)
        .bind(s.hp_end)
        .bind(s.latitude)
        .bind(s.longitude)
        .bind(s.solar_wc)
        .bind(s.solar_efficiency)
        .bind(s.solar_loss)
        .bind(s.solar_cost)
        .execute(pool)
        .await?;
    Ok(())
}

/// Return the settings row, creating it with defaults on first access.
pub async fn current_settings(pool: &SqlitePool) -> anyhow::Result<TariffSettings> {
    if let Some(settings) = sqlx::query_as::<_, TariffSettings>(SELECT_SETTINGS)
        .fetch_optional(pool)
        .await?
    {
        return Ok(settings);
    }

    let defaults = TariffSettings::default();
    write_settings(pool, &defaults).await?;
    tracing::info!("initialized settings with default values");
    Ok(defaults)
}

/// Validate then persist. Nothing is written when validation fails.
pub async fn update_settings(pool: &SqlitePool, settings: &TariffSettings) -> Result<(), UpdateSettingsError> {
    settings.validate()?;
    write_settings(pool, settings).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::memory_pool;
    use time::macros::time;

    #[tokio::test]
    async fn first_access_creates_defaults_once() {
        let pool = memory_pool().await;
        let first = current_settings(&pool).await.unwrap();
        let second = current_settings(&pool).await.unwrap();
        assert_eq!(first, TariffSettings::default());
        assert_eq!(first, second);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn update_round_trips_through_the_store() {
        let pool = memory_pool().await;
        let updated = TariffSettings {
            hp_cost: 0.27,
            hc_cost: 0.20,
            hp_start: time!(22:00),
            hp_end: time!(06:00),
            solar_wc: 3000.0,
            ..TariffSettings::default()
        };
        update_settings(&pool, &updated).await.unwrap();
        assert_eq!(current_settings(&pool).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn invalid_update_keeps_prior_settings() {
        let pool = memory_pool().await;
        let before = current_settings(&pool).await.unwrap();

        let invalid = TariffSettings {
            hp_cost: -1.0,
            ..before.clone()
        };
        let err = update_settings(&pool, &invalid).await.unwrap_err();
        assert!(matches!(err, UpdateSettingsError::Validation(_)));
        assert_eq!(current_settings(&pool).await.unwrap(), before);
    }
}
