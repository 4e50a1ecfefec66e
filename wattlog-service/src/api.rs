//! Read-mostly JSON API for the dashboards.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use time::Date;
use wattlog_client::db::{
    current_settings, readings_in_range, update_settings, weather_in_range, UpdateSettingsError,
};
use wattlog_client::domain::{Reading, TariffSettings, WeatherSample};

use crate::analytics::Granularity;
use crate::metrics_server;
use crate::report::{period_report, Period, PeriodError, PeriodReport};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unprocessable(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<PeriodError> for ApiError {
    fn from(e: PeriodError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<UpdateSettingsError> for ApiError {
    fn from(e: UpdateSettingsError) -> Self {
        match e {
            UpdateSettingsError::Validation(v) => ApiError::Unprocessable(v.to_string()),
            UpdateSettingsError::Store(s) => ApiError::Internal(s.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
            ApiError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
struct RangeQuery {
    from: Date,
    to: Date,
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    from: Date,
    to: Date,
    #[serde(default)]
    granularity: Granularity,
}

pub fn router(pool: SqlitePool) -> Router {
    Router::new()
        .route("/readings", get(get_readings))
        .route("/weather", get(get_weather))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/summary", get(get_summary))
        .route("/metrics", get(get_metrics))
        .with_state(pool)
}

/// Serve the API until the listener fails.
pub async fn serve(pool: SqlitePool, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "API listening");
    axum::serve(listener, router(pool).into_make_service()).await?;
    Ok(())
}

async fn get_readings(State(pool): State<SqlitePool>, Query(q): Query<RangeQuery>) -> ApiResult<Vec<Reading>> {
    let (start, end) = Period::new(q.from, q.to)?.bounds();
    Ok(Json(readings_in_range(&pool, start, end).await?))
}

async fn get_weather(State(pool): State<SqlitePool>, Query(q): Query<RangeQuery>) -> ApiResult<Vec<WeatherSample>> {
    let (start, end) = Period::new(q.from, q.to)?.bounds();
    Ok(Json(weather_in_range(&pool, start, end).await?))
}

async fn get_settings(State(pool): State<SqlitePool>) -> ApiResult<TariffSettings> {
    Ok(Json(current_settings(&pool).await?))
}

async fn put_settings(
    State(pool): State<SqlitePool>,
    Json(settings): Json<TariffSettings>,
) -> ApiResult<TariffSettings> {
    update_settings(&pool, &settings).await?;
    tracing::info!("settings updated");
    Ok(Json(settings))
}

async fn get_summary(State(pool): State<SqlitePool>, Query(q): Query<SummaryQuery>) -> ApiResult<PeriodReport> {
    let period = Period::new(q.from, q.to)?;
    Ok(Json(period_report(&pool, period, q.granularity).await?))
}

async fn get_metrics() -> String {
    metrics_server::render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use time::macros::datetime;
    use time::Duration;
    use tower::ServiceExt;
    use wattlog_client::db::{connect, insert_reading};

    async fn app() -> (Router, SqlitePool) {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        (router(pool.clone()), pool)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn readings_range_includes_both_days() {
        let (app, pool) = app().await;
        for start in [
            datetime!(2024-03-01 00:00:00),
            datetime!(2024-03-02 23:30:00),
            datetime!(2024-03-03 00:00:00),
        ] {
            insert_reading(&pool, &Reading::new(start, start + Duration::minutes(30), 1.0))
                .await
                .unwrap();
        }

        let (status, body) = call(&app, Method::GET, "/readings?from=2024-03-01&to=2024-03-02", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) = call(&app, Method::GET, "/readings?from=2024-03-02&to=2024-03-01", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_round_trip_and_validation() {
        let (app, _pool) = app().await;

        let (status, body) = call(&app, Method::GET, "/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hp_start"], "07:00");

        let mut updated = body.clone();
        updated["hp_cost"] = json!(0.27);
        let (status, _) = call(&app, Method::PUT, "/settings", Some(updated)).await;
        assert_eq!(status, StatusCode::OK);

        let mut invalid = body.clone();
        invalid["solar_efficiency"] = json!(150.0);
        let (status, err) = call(&app, Method::PUT, "/settings", Some(invalid)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err["error"].as_str().unwrap().contains("solar_efficiency"));

        let (_, body) = call(&app, Method::GET, "/settings", None).await;
        assert_eq!(body["hp_cost"], json!(0.27));
        assert_eq!(body["solar_efficiency"], json!(20.0));
    }

    #[tokio::test]
    async fn summary_defaults_to_raw_series() {
        let (app, pool) = app().await;
        let start = datetime!(2024-03-01 08:00:00);
        insert_reading(&pool, &Reading::new(start, start + Duration::minutes(30), 1.5))
            .await
            .unwrap();

        let (status, body) = call(&app, Method::GET, "/summary?from=2024-03-01&to=2024-03-01", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["granularity"], "raw");
        assert_eq!(body["summary"]["total_kwh"], json!(1.5));
        assert!(body["solar"].is_null());

        let (status, body) = call(
            &app,
            Method::GET,
            "/summary?from=2024-03-01&to=2024-03-01&granularity=day",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["series"].as_array().unwrap().len(), 1);
    }
}
