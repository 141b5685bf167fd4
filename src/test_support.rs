//! Fakes shared by the unit tests.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::ReportStore;
use crate::error::StoreError;
use crate::models::{
    NewWeatherReport, PrecipitationObservation, TemperatureObservation, WeatherKind, WeatherReport,
};
use crate::upstream::ObservationSource;

pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn temperature(day: u32, low: i32, high: i32) -> TemperatureObservation {
    TemperatureObservation {
        zip_code: "73026".to_string(),
        observed_on: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        low_f: low,
        high_f: high,
    }
}

pub fn precipitation(day: u32, amount: Decimal, kind: WeatherKind) -> PrecipitationObservation {
    PrecipitationObservation {
        zip_code: "73026".to_string(),
        observed_on: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        amount_inches: amount,
        kind,
    }
}

/// Returns canned observations, optionally after a delay.
#[derive(Default)]
pub struct StaticSource {
    pub temperatures: Vec<TemperatureObservation>,
    pub precipitation: Vec<PrecipitationObservation>,
    pub delay: Option<Duration>,
}

#[async_trait]
impl ObservationSource for StaticSource {
    async fn fetch_precipitation(&self, _zip: &str, _days: i64) -> Vec<PrecipitationObservation> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.precipitation.clone()
    }

    async fn fetch_temperature(&self, _zip: &str, _days: i64) -> Vec<TemperatureObservation> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.temperatures.clone()
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    pub saved: Mutex<Vec<WeatherReport>>,
}

impl InMemoryStore {
    pub fn write_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn save(&self, report: &NewWeatherReport) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.saved
            .lock()
            .unwrap()
            .push(report.clone().into_persisted(id));
        Ok(id)
    }

    async fn recent(&self, zip: &str, limit: i64) -> Result<Vec<WeatherReport>, StoreError> {
        let mut reports: Vec<WeatherReport> = self
            .saved
            .lock()
            .unwrap()
            .iter()
            .filter(|report| report.zip_code == zip)
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_on.cmp(&a.created_on));
        reports.truncate(limit.max(1) as usize);
        Ok(reports)
    }
}
