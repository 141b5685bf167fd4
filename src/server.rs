use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::aggregator::ReportAggregator;
use crate::error::ReportError;

const DEFAULT_DAYS: i64 = 7;
const DEFAULT_HISTORY_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReportError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ReportError::InsufficientData { .. } => StatusCode::NOT_FOUND,
            ReportError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ReportError::Store(err) => {
                error!("report store failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn app(aggregator: Arc<ReportAggregator>) -> Router {
    Router::new()
        .route("/weather-report/{zip}", get(weather_report))
        .route("/weather-report/{zip}/history", get(report_history))
        .with_state(aggregator)
}

pub async fn serve(listener: TcpListener, aggregator: Arc<ReportAggregator>) -> std::io::Result<()> {
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(aggregator))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        return;
    }
    info!("shutdown signal received, draining connections");
}

/// The build runs in its own task so that a client hanging up cancels the
/// upstream fetches but never interrupts a store write that has started.
async fn weather_report(
    State(aggregator): State<Arc<ReportAggregator>>,
    Path(zip): Path<String>,
    Query(params): Query<ReportParams>,
) -> Response {
    let days = params.days.unwrap_or(DEFAULT_DAYS);
    let cancel = CancellationToken::new();
    let _hang_up = cancel.clone().drop_guard();

    let build = tokio::spawn(async move {
        aggregator
            .build_report_cancellable(&zip, days, &cancel)
            .await
    });

    match build.await {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(err) => {
            error!("report build task failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn report_history(
    State(aggregator): State<Arc<ReportAggregator>>,
    Path(zip): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ReportError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let reports = aggregator.store().recent(&zip, limit).await?;
    Ok(Json(reports).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockReportStore;
    use crate::error::StoreError;
    use crate::models::WeatherKind;
    use crate::test_support::{precipitation, spawn_upstream, temperature, InMemoryStore, StaticSource};
    use rust_decimal::Decimal;
    use serde_json::Value;

    async fn spawn_app(source: StaticSource, store: Arc<dyn crate::db::ReportStore>) -> String {
        let aggregator = Arc::new(ReportAggregator::new(Arc::new(source), store));
        let addr = spawn_upstream(app(aggregator)).await;
        format!("http://{}", addr)
    }

    fn sample_source() -> StaticSource {
        StaticSource {
            temperatures: vec![temperature(1, 20, 40), temperature(2, 30, 50)],
            precipitation: vec![precipitation(1, Decimal::new(25, 1), WeatherKind::Rain)],
            delay: None,
        }
    }

    #[tokio::test]
    async fn returns_report_as_json() {
        let store = Arc::new(InMemoryStore::default());
        let base = spawn_app(sample_source(), store.clone()).await;

        let response = reqwest::get(format!("{}/weather-report/73026?days=14", base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["zipCode"], "73026");
        assert_eq!(body["averageHighF"], 45.0);
        assert_eq!(body["averageLowF"], 25.0);
        assert_eq!(body["rainfallTotalInches"], 2.5);
        assert_eq!(body["snowTotalInches"], 0.0);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn missing_temperatures_map_to_not_found() {
        let source = StaticSource {
            temperatures: Vec::new(),
            ..sample_source()
        };
        let store = Arc::new(InMemoryStore::default());
        let base = spawn_app(source, store.clone()).await;

        let response = reqwest::get(format!("{}/weather-report/73026", base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("73026"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn non_positive_days_is_bad_request() {
        let base = spawn_app(sample_source(), Arc::new(InMemoryStore::default())).await;

        let response = reqwest::get(format!("{}/weather-report/73026?days=0", base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() {
        let mut store = MockReportStore::new();
        store
            .expect_save()
            .returning(|_| Err(StoreError::Unavailable("connection reset".to_string())));
        let base = spawn_app(sample_source(), Arc::new(store)).await;

        let response = reqwest::get(format!("{}/weather-report/73026", base))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn history_lists_saved_reports() {
        let store = Arc::new(InMemoryStore::default());
        let base = spawn_app(sample_source(), store.clone()).await;

        for _ in 0..3 {
            reqwest::get(format!("{}/weather-report/73026", base))
                .await
                .unwrap();
        }

        let response = reqwest::get(format!("{}/weather-report/73026/history?limit=2", base))
            .await
            .unwrap();
        let body: Vec<Value> = response.json().await.unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(store.write_count(), 3);
    }
}
