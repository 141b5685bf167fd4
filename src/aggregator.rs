use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::db::ReportStore;
use crate::error::ReportError;
use crate::models::{DailyWeather, NewWeatherReport, WeatherReport};
use crate::stats;
use crate::upstream::ObservationSource;

/// Longest window accepted, roughly a century of days.
pub const MAX_DAYS: i64 = 36_600;

/// A persisted report together with the per-day view it was reduced from.
#[derive(Debug, Clone)]
pub struct DetailedReport {
    pub report: WeatherReport,
    pub daily: Vec<DailyWeather>,
}

/// Builds weather reports from the two observation services and persists
/// each one exactly once.
///
/// Holds no state between calls: repeated requests for the same zip and
/// window fetch again and write again.
pub struct ReportAggregator {
    source: Arc<dyn ObservationSource>,
    store: Arc<dyn ReportStore>,
}

impl ReportAggregator {
    pub fn new(source: Arc<dyn ObservationSource>, store: Arc<dyn ReportStore>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    pub async fn build_report(&self, zip: &str, days: i64) -> Result<WeatherReport, ReportError> {
        self.build_detailed_report(zip, days)
            .await
            .map(|detailed| detailed.report)
    }

    pub async fn build_report_cancellable(
        &self,
        zip: &str,
        days: i64,
        cancel: &CancellationToken,
    ) -> Result<WeatherReport, ReportError> {
        self.build(zip, days, cancel)
            .await
            .map(|detailed| detailed.report)
    }

    pub async fn build_detailed_report(
        &self,
        zip: &str,
        days: i64,
    ) -> Result<DetailedReport, ReportError> {
        self.build(zip, days, &CancellationToken::new()).await
    }

    async fn build(
        &self,
        zip: &str,
        days: i64,
        cancel: &CancellationToken,
    ) -> Result<DetailedReport, ReportError> {
        validate_request(zip, days)?;

        // Each reduction only waits on its own fetch.
        let precipitation = async {
            let observations = self.source.fetch_precipitation(zip, days).await;
            let totals = stats::precipitation_totals(&observations);
            (observations, totals)
        };
        let temperature = async {
            let observations = self.source.fetch_temperature(zip, days).await;
            let averages = stats::temperature_averages(&observations);
            (observations, averages)
        };

        let ((precipitation, totals), (temperatures, averages)) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("zip: {} over last {} days: build cancelled while fetching", zip, days);
                return Err(ReportError::Cancelled);
            }
            fetched = async { tokio::join!(precipitation, temperature) } => fetched,
        };

        info!(
            "zip: {} over last {} days: total snow: {} total rain: {}",
            zip, days, totals.snow_inches, totals.rain_inches
        );

        let averages = averages.ok_or_else(|| ReportError::InsufficientData {
            zip: zip.to_string(),
            days,
        })?;

        info!(
            "zip: {} over last {} days: average temp high: {} average temp low: {}",
            zip, days, averages.high_f, averages.low_f
        );

        let new_report = NewWeatherReport {
            zip_code: zip.to_string(),
            created_on: Utc::now(),
            average_high_f: averages.high_f,
            average_low_f: averages.low_f,
            rainfall_total_inches: totals.rain_inches,
            snow_total_inches: totals.snow_inches,
        };

        let id = self.store.save(&new_report).await?;
        info!("zip: {} saved weather report {}", zip, id);

        Ok(DetailedReport {
            report: new_report.into_persisted(id),
            daily: stats::daily_breakdown(&temperatures, &precipitation),
        })
    }
}

fn validate_request(zip: &str, days: i64) -> Result<(), ReportError> {
    if zip.trim().is_empty() {
        return Err(ReportError::InvalidRequest(
            "zip code must not be empty".to_string(),
        ));
    }
    if days < 1 {
        return Err(ReportError::InvalidRequest(format!(
            "days must be at least 1, got {}",
            days
        )));
    }
    if days > MAX_DAYS {
        return Err(ReportError::InvalidRequest(format!(
            "days must be at most {}, got {}",
            MAX_DAYS, days
        )));
    }
    Ok(())
}
