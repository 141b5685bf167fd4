#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Failed to query report store: {0}")]
    Query(#[from] sqlx::Error),
    #[error("Failed to apply migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Report store unavailable: {0}")]
    Unavailable(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("Invalid report request: {0}")]
    InvalidRequest(String),
    #[error("No temperature observations for zip {zip} over the last {days} days")]
    InsufficientData { zip: String, days: i64 },
    #[error("Report build cancelled before it was persisted")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
}
