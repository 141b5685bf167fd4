//! Weather report aggregation.
//!
//! Pulls temperature and precipitation observations for a zip code from two
//! upstream services, reduces them to a [`models::WeatherReport`] and stores
//! the result through a [`db::ReportStore`].

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod report;
pub mod server;
pub mod stats;
pub mod upstream;

#[cfg(test)]
mod test_support;

pub use aggregator::{DetailedReport, ReportAggregator};
pub use error::{ReportError, StoreError};
pub use models::{PrecipitationObservation, TemperatureObservation, WeatherKind, WeatherReport};
