//! Clients for the temperature and precipitation observation services.
//!
//! Both services are treated as unreliable: a failed request, a bad status,
//! or a body that is not a JSON array all degrade to an empty observation list
//! and a `warn` log line. Callers never see an upstream error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::config::ServiceAddress;
use crate::models::{PrecipitationObservation, TemperatureObservation, WeatherKind};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn fetch_precipitation(&self, zip: &str, days: i64) -> Vec<PrecipitationObservation>;
    async fn fetch_temperature(&self, zip: &str, days: i64) -> Vec<TemperatureObservation>;
}

#[derive(thiserror::Error, Debug)]
pub enum UpstreamUnavailable {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("non-success status {0}")]
    Status(StatusCode),
    #[error("body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("body is JSON but not an array")]
    NotAnArray,
}

pub struct HttpObservationClient {
    client: Client,
    temperature: ServiceAddress,
    precipitation: ServiceAddress,
}

impl HttpObservationClient {
    pub fn new(
        temperature: ServiceAddress,
        precipitation: ServiceAddress,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            temperature,
            precipitation,
        })
    }

    async fn fetch_records(&self, service: &ServiceAddress, zip: &str, days: i64) -> Vec<Value> {
        let url = match service.observation_url(zip, days) {
            Ok(url) => url,
            Err(err) => {
                warn!("upstream unavailable, using no observations: {}", err);
                return Vec::new();
            }
        };

        match self.try_fetch_records(url.clone()).await {
            Ok(records) => {
                debug!("fetched {} records from {}", records.len(), url);
                records
            }
            Err(err) => {
                warn!("upstream unavailable, using no observations from {}: {}", url, err);
                Vec::new()
            }
        }
    }

    async fn try_fetch_records(&self, url: Url) -> Result<Vec<Value>, UpstreamUnavailable> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamUnavailable::Status(status));
        }

        let body = response.bytes().await?;
        parse_records(&body)
    }
}

#[async_trait]
impl ObservationSource for HttpObservationClient {
    async fn fetch_precipitation(&self, zip: &str, days: i64) -> Vec<PrecipitationObservation> {
        let records = self.fetch_records(&self.precipitation, zip, days).await;
        decode_precipitation(records, zip)
    }

    async fn fetch_temperature(&self, zip: &str, days: i64) -> Vec<TemperatureObservation> {
        let records = self.fetch_records(&self.temperature, zip, days).await;
        decode_temperatures(records, zip)
    }
}

/// An empty (or all-whitespace) body and a JSON `null` both mean "no records".
pub fn parse_records(body: &[u8]) -> Result<Vec<Value>, UpstreamUnavailable> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice::<Value>(body)? {
        Value::Array(records) => Ok(records),
        Value::Null => Ok(Vec::new()),
        _ => Err(UpstreamUnavailable::NotAnArray),
    }
}

#[derive(Debug, Deserialize)]
struct TemperatureRecord {
    #[serde(rename = "zipcode", default)]
    zip_code: Option<String>,
    #[serde(
        rename = "observedon",
        alias = "createdon",
        deserialize_with = "deserialize_observed_on"
    )]
    observed_on: NaiveDate,
    #[serde(rename = "templowf")]
    low_f: i32,
    #[serde(rename = "temphighf")]
    high_f: i32,
}

#[derive(Debug, Deserialize)]
struct PrecipitationRecord {
    #[serde(rename = "zipcode", default)]
    zip_code: Option<String>,
    #[serde(
        rename = "observedon",
        alias = "createdon",
        deserialize_with = "deserialize_observed_on"
    )]
    observed_on: NaiveDate,
    #[serde(rename = "amountinches")]
    amount_inches: Decimal,
    #[serde(rename = "weathertype", alias = "weathertipe", default)]
    weather_type: Option<String>,
}

pub fn decode_temperatures(records: Vec<Value>, zip: &str) -> Vec<TemperatureObservation> {
    decode_each::<TemperatureRecord>(records)
        .map(|record| TemperatureObservation {
            zip_code: record.zip_code.unwrap_or_else(|| zip.to_string()),
            observed_on: record.observed_on,
            low_f: record.low_f,
            high_f: record.high_f,
        })
        .collect()
}

pub fn decode_precipitation(records: Vec<Value>, zip: &str) -> Vec<PrecipitationObservation> {
    decode_each::<PrecipitationRecord>(records)
        .map(|record| PrecipitationObservation {
            zip_code: record.zip_code.unwrap_or_else(|| zip.to_string()),
            observed_on: record.observed_on,
            amount_inches: record.amount_inches,
            kind: record
                .weather_type
                .as_deref()
                .map_or(WeatherKind::None, WeatherKind::parse),
        })
        .collect()
}

fn decode_each<T: serde::de::DeserializeOwned>(records: Vec<Value>) -> impl Iterator<Item = T> {
    records.into_iter().filter_map(|record| {
        match serde_json::from_value::<T>(lowercase_keys(record)) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!("skipping malformed observation record: {}", err);
                None
            }
        }
    })
}

/// Field names are matched case-insensitively, so normalise them up front.
fn lowercase_keys(record: Value) -> Value {
    match record {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

fn deserialize_observed_on<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_observed_on(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised observation date {raw:?}")))
}

/// Accepts `2024-03-01`, `2024-03-01T06:00:00Z` and `2024-03-01T06:00:00`.
pub fn parse_observed_on(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|timestamp| timestamp.date())
}
