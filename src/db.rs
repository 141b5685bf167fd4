use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewWeatherReport, WeatherReport};

/// Durable home for built reports.
///
/// `save` is all-or-nothing: it either returns the id of a fully written
/// report or an error, never a partially written row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &NewWeatherReport) -> Result<Uuid, StoreError>;
    async fn recent(&self, zip: &str, limit: i64) -> Result<Vec<WeatherReport>, StoreError>;
}

pub async fn init_db(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn save(&self, report: &NewWeatherReport) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO weather_report
            (id, zip_code, created_on, average_high_f, average_low_f,
             rainfall_total_inches, snow_total_inches)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&report.zip_code)
        .bind(report.created_on)
        .bind(report.average_high_f)
        .bind(report.average_low_f)
        .bind(report.rainfall_total_inches)
        .bind(report.snow_total_inches)
        .fetch_one(&self.pool)
        .await?
        .get("id");

        Ok(id)
    }

    async fn recent(&self, zip: &str, limit: i64) -> Result<Vec<WeatherReport>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, zip_code, created_on, average_high_f, average_low_f,
                   rainfall_total_inches, snow_total_inches
            FROM weather_report
            WHERE zip_code = $1
            ORDER BY created_on DESC
            LIMIT $2
            "#,
        )
        .bind(zip)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(report_from_row).collect())
    }
}

fn report_from_row(row: &PgRow) -> WeatherReport {
    WeatherReport {
        id: row.get("id"),
        zip_code: row.get("zip_code"),
        created_on: row.get("created_on"),
        average_high_f: row.get("average_high_f"),
        average_low_f: row.get("average_low_f"),
        rainfall_total_inches: row.get("rainfall_total_inches"),
        snow_total_inches: row.get("snow_total_inches"),
    }
}
