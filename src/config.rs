//! Settings resolution.
//!
//! Values are layered, highest priority first:
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file (searched in standard locations)
//! 4. Built-in defaults

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use reqwest::Url;
use serde::Deserialize;

pub const APP_NAME: &str = "cloudweather";
pub const CONFIG_FILE: &str = "cloudweather.toml";
pub const CONFIG_ENV: &str = "CLOUDWEATHER_CONFIG";

const DEFAULT_PROTOCOL: &str = "http";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_TEMPERATURE_PORT: u16 = 5000;
const DEFAULT_PRECIPITATION_PORT: u16 = 5001;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Candidate config file locations, in search order.
fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = env::var_os(CONFIG_ENV) {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(PathBuf::from(CONFIG_FILE));
    let xdg_home = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
    if let Some(dir) = xdg_home {
        candidates.push(dir.join(APP_NAME).join(CONFIG_FILE));
    }
    candidates.push(PathBuf::from("/etc").join(APP_NAME).join(CONFIG_FILE));
    candidates
}

/// An explicit `--config` must exist; otherwise the first candidate found wins.
pub fn locate_config_file(
    explicit: Option<&str>,
    candidates: &[PathBuf],
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let path = PathBuf::from(path);
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        return Ok(Some(path));
    }
    Ok(candidates.iter().find(|path| path.exists()).cloned())
}

pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[derive(thiserror::Error, Debug)]
pub enum AddressError {
    #[error("invalid service address {0}")]
    Base(String),
    #[error("zip code {0:?} cannot be used as a path segment")]
    DotSegment(String),
}

/// Protocol, host and port of one upstream observation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl ServiceAddress {
    /// `{protocol}://{host}:{port}/observation/{zip}?days={days}`, with the
    /// zip escaped as a single path segment.
    pub fn observation_url(&self, zip: &str, days: i64) -> Result<Url, AddressError> {
        if matches!(zip, "." | "..") {
            return Err(AddressError::DotSegment(zip.to_string()));
        }

        let base = format!("{}://{}:{}/observation", self.protocol, self.host, self.port);
        let mut url =
            Url::parse(&base).map_err(|err| AddressError::Base(format!("{base}: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| AddressError::Base(base.clone()))?
            .push(zip);
        url.query_pairs_mut().append_pair("days", &days.to_string());
        Ok(url)
    }
}

#[derive(Args, Clone, Debug, Deserialize, Default)]
pub struct Settings {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $CLOUDWEATHER_CONFIG, ./cloudweather.toml,
    /// $XDG_CONFIG_HOME/cloudweather/cloudweather.toml, /etc/cloudweather/cloudweather.toml
    #[arg(short, long, global = true)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, env = "CLOUDWEATHER_LEVEL")]
    pub level: Option<String>,

    /// Postgres connection string for the report store
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, global = true, env = "CLOUDWEATHER_TEMP_DATA_PROTOCOL")]
    pub temp_data_protocol: Option<String>,

    #[arg(long, global = true, env = "CLOUDWEATHER_TEMP_DATA_HOST")]
    pub temp_data_host: Option<String>,

    #[arg(long, global = true, env = "CLOUDWEATHER_TEMP_DATA_PORT")]
    pub temp_data_port: Option<u16>,

    #[arg(long, global = true, env = "CLOUDWEATHER_PRECIP_DATA_PROTOCOL")]
    pub precip_data_protocol: Option<String>,

    #[arg(long, global = true, env = "CLOUDWEATHER_PRECIP_DATA_HOST")]
    pub precip_data_host: Option<String>,

    #[arg(long, global = true, env = "CLOUDWEATHER_PRECIP_DATA_PORT")]
    pub precip_data_port: Option<u16>,

    /// Per-request timeout for upstream observation services, in seconds
    #[arg(long, global = true, env = "CLOUDWEATHER_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Address the HTTP server binds to
    #[arg(long, global = true, env = "CLOUDWEATHER_LISTEN")]
    pub listen: Option<String>,
}

impl Settings {
    /// Fill every unset value from `fallback`.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            config: self.config,
            level: self.level.or(fallback.level),
            database_url: self.database_url.or(fallback.database_url),
            temp_data_protocol: self.temp_data_protocol.or(fallback.temp_data_protocol),
            temp_data_host: self.temp_data_host.or(fallback.temp_data_host),
            temp_data_port: self.temp_data_port.or(fallback.temp_data_port),
            precip_data_protocol: self.precip_data_protocol.or(fallback.precip_data_protocol),
            precip_data_host: self.precip_data_host.or(fallback.precip_data_host),
            precip_data_port: self.precip_data_port.or(fallback.precip_data_port),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
            listen: self.listen.or(fallback.listen),
        }
    }

    pub fn level(&self) -> String {
        self.level
            .clone()
            .or_else(|| env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }

    pub fn temperature_service(&self) -> ServiceAddress {
        ServiceAddress {
            protocol: self
                .temp_data_protocol
                .clone()
                .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            host: self
                .temp_data_host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.temp_data_port.unwrap_or(DEFAULT_TEMPERATURE_PORT),
        }
    }

    pub fn precipitation_service(&self) -> ServiceAddress {
        ServiceAddress {
            protocol: self
                .precip_data_protocol
                .clone()
                .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            host: self
                .precip_data_host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.precip_data_port.unwrap_or(DEFAULT_PRECIPITATION_PORT),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn listen(&self) -> String {
        self.listen
            .clone()
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string())
    }
}

/// Merge CLI/env settings over whatever the config file provides. Also
/// returns the file that was read, if any.
pub fn resolve(cli_settings: Settings) -> anyhow::Result<(Settings, Option<PathBuf>)> {
    let path = locate_config_file(cli_settings.config.as_deref(), &config_candidates())?;
    let file_settings = load_settings(path.as_deref())?;
    Ok((cli_settings.or(file_settings), path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ServiceAddress {
        ServiceAddress {
            protocol: "https".to_string(),
            host: "temps.internal".to_string(),
            port: 8443,
        }
    }

    fn temp_file(content: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("cloudweather-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn observation_url_includes_zip_and_window() {
        let url = address().observation_url("04401", 7).unwrap();
        assert_eq!(
            url.as_str(),
            "https://temps.internal:8443/observation/04401?days=7"
        );
    }

    #[test]
    fn zip_stays_inside_one_path_segment() {
        for zip in ["73026#x", "../admin", "7?days=999&", "a/b", "04 401"] {
            let url = address().observation_url(zip, 7).unwrap();
            let segments: Vec<&str> = url.path_segments().unwrap().collect();

            assert_eq!(segments.len(), 2, "zip {zip:?} produced {url}");
            assert_eq!(segments[0], "observation");
            assert_eq!(url.query(), Some("days=7"), "zip {zip:?} produced {url}");
            assert_eq!(url.fragment(), None);
        }

        let url = address().observation_url("../admin", 7).unwrap();
        assert_eq!(url.path(), "/observation/..%2Fadmin");
    }

    #[test]
    fn dot_segment_zips_are_rejected() {
        assert!(matches!(
            address().observation_url("..", 7),
            Err(AddressError::DotSegment(_))
        ));
        assert!(address().observation_url(".", 7).is_err());
    }

    #[test]
    fn cli_values_override_file_values() {
        let file: Settings = toml::from_str(
            r#"
            temp_data_host = "temps.internal"
            temp_data_port = 7000
            precip_data_host = "precip.internal"
            request_timeout_secs = 3
            "#,
        )
        .unwrap();
        let cli = Settings {
            temp_data_host: Some("override.internal".to_string()),
            ..Settings::default()
        };

        let merged = cli.or(file);
        assert_eq!(merged.temperature_service().host, "override.internal");
        assert_eq!(merged.temperature_service().port, 7000);
        assert_eq!(merged.precipitation_service().host, "precip.internal");
        assert_eq!(merged.precipitation_service().port, DEFAULT_PRECIPITATION_PORT);
        assert_eq!(merged.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let settings = Settings::default();
        assert_eq!(
            settings
                .temperature_service()
                .observation_url("73026", 30)
                .unwrap()
                .as_str(),
            "http://localhost:5000/observation/73026?days=30"
        );
        assert_eq!(settings.listen(), DEFAULT_LISTEN);
        assert!(settings.database_url().is_err());
        assert!(load_settings(None).unwrap().temp_data_host.is_none());
    }

    #[test]
    fn first_existing_candidate_is_used() {
        let present = temp_file("temp_data_port = 7100\n");
        let missing = env::temp_dir().join("cloudweather-missing.toml");

        let found = locate_config_file(None, &[missing, present.clone()]).unwrap();
        let settings = load_settings(found.as_deref()).unwrap();
        fs::remove_file(&present).unwrap();

        assert_eq!(found, Some(present));
        assert_eq!(settings.temp_data_port, Some(7100));
    }

    #[test]
    fn explicit_config_must_exist() {
        let candidate = temp_file("");
        let result = locate_config_file(Some("/nonexistent/cloudweather.toml"), &[candidate.clone()]);
        fs::remove_file(&candidate).unwrap();

        assert!(result.is_err());
        assert_eq!(locate_config_file(None, &[]).unwrap(), None);
    }
}
