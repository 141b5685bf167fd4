use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureObservation {
    pub zip_code: String,
    pub observed_on: NaiveDate,
    pub low_f: i32,
    pub high_f: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherKind {
    Snow,
    Rain,
    None,
}

impl WeatherKind {
    /// Upstream sends free-form strings; anything that is not snow or rain
    /// counts toward neither total.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "snow" => WeatherKind::Snow,
            "rain" => WeatherKind::Rain,
            _ => WeatherKind::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecipitationObservation {
    pub zip_code: String,
    pub observed_on: NaiveDate,
    pub amount_inches: Decimal,
    pub kind: WeatherKind,
}

/// A report that has been built but not yet handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeatherReport {
    pub zip_code: String,
    pub created_on: DateTime<Utc>,
    pub average_high_f: Decimal,
    pub average_low_f: Decimal,
    pub rainfall_total_inches: Decimal,
    pub snow_total_inches: Decimal,
}

impl NewWeatherReport {
    pub fn into_persisted(self, id: Uuid) -> WeatherReport {
        WeatherReport {
            id,
            zip_code: self.zip_code,
            created_on: self.created_on,
            average_high_f: self.average_high_f,
            average_low_f: self.average_low_f,
            rainfall_total_inches: self.rainfall_total_inches,
            snow_total_inches: self.snow_total_inches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub id: Uuid,
    pub zip_code: String,
    pub created_on: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_high_f: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_low_f: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub rainfall_total_inches: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub snow_total_inches: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrecipitationTotals {
    pub snow_inches: Decimal,
    pub rain_inches: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureAverages {
    pub high_f: Decimal,
    pub low_f: Decimal,
}

/// Both observation kinds folded onto one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub low_f: Option<i32>,
    pub high_f: Option<i32>,
    pub rain_inches: Decimal,
    pub snow_inches: Decimal,
}
