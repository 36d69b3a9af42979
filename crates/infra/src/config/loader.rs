//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when the required ones are set
//! 2. Otherwise a JSON or TOML file, searched for in the working directory, its
//!    parents and next to the executable
//!
//! ## Environment Variables
//! Required:
//! - `FIELDVISIT_DB_PATH`: database file path
//! - `FIELDVISIT_REMOTE_URL`: root of the remote visit service
//!
//! Optional (defaults from [`Config::default`]):
//! - `FIELDVISIT_DB_POOL_SIZE`
//! - `FIELDVISIT_SALES_REP_ID`
//! - `FIELDVISIT_REMOTE_MAX_ATTEMPTS`
//! - `FIELDVISIT_SYNC_ENABLED` (true/false)
//! - `FIELDVISIT_SYNC_INTERVAL`: retry tick in seconds, `0` disables it
//! - `FIELDVISIT_SYNC_BULK_BATCH_SIZE`
//! - `FIELDVISIT_REQUEST_TIMEOUT`: seconds
//! - `FIELDVISIT_GEOFENCE_RADIUS`: meters
//! - `FIELDVISIT_GPS_TIMEOUT`: seconds per attempt
//! - `FIELDVISIT_GPS_MAX_ATTEMPTS`
//! - `FIELDVISIT_LOG_LEVEL`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use fieldvisit_domain::{Config, FieldVisitError, Result};

const FILE_STEMS: [&str; 2] = ["config", "fieldvisit"];
const FILE_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load and validate configuration, environment first.
///
/// # Errors
/// `FieldVisitError::Config` when neither source yields a valid configuration.
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = %e, "environment incomplete, trying config file");
            load_from_file(None)?
        }
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from `FIELDVISIT_*` environment variables.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("FIELDVISIT_DB_PATH")?;
    config.remote.base_url = env_var("FIELDVISIT_REMOTE_URL")?;

    if let Some(pool_size) = env_parse("FIELDVISIT_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Ok(sales_rep_id) = std::env::var("FIELDVISIT_SALES_REP_ID") {
        config.remote.sales_rep_id = Some(sales_rep_id);
    }
    if let Some(attempts) = env_parse("FIELDVISIT_REMOTE_MAX_ATTEMPTS")? {
        config.remote.max_attempts = attempts;
    }

    config.sync.enabled = env_bool("FIELDVISIT_SYNC_ENABLED", config.sync.enabled);
    if let Some(interval) = env_parse("FIELDVISIT_SYNC_INTERVAL")? {
        config.sync.interval_seconds = interval;
    }
    if let Some(batch) = env_parse("FIELDVISIT_SYNC_BULK_BATCH_SIZE")? {
        config.sync.bulk_visit_batch_size = Some(batch);
    }
    if let Some(timeout) = env_parse("FIELDVISIT_REQUEST_TIMEOUT")? {
        config.sync.request_timeout_secs = timeout;
    }

    if let Some(radius) = env_parse("FIELDVISIT_GEOFENCE_RADIUS")? {
        config.geofence.radius_meters = radius;
    }
    if let Some(timeout) = env_parse("FIELDVISIT_GPS_TIMEOUT")? {
        config.gps.attempt_timeout_secs = timeout;
    }
    if let Some(attempts) = env_parse("FIELDVISIT_GPS_MAX_ATTEMPTS")? {
        config.gps.max_attempts = attempts;
    }
    if let Ok(level) = std::env::var("FIELDVISIT_LOG_LEVEL") {
        config.log_level = level;
    }

    Ok(config)
}

/// Load configuration from a file, probing the standard locations when
/// `path` is `None`. The format follows the extension.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) if p.exists() => p,
        Some(p) => {
            return Err(FieldVisitError::Config(format!(
                "config file not found: {}",
                p.display()
            )));
        }
        None => find_config_path().ok_or_else(|| {
            FieldVisitError::Config("no config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FieldVisitError::Config(format!("failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FieldVisitError::Config(format!("invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FieldVisitError::Config(format!("invalid JSON format: {e}"))),
        _ => Err(FieldVisitError::Config(format!("unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn find_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe) = std::env::current_exe() {
        roots.extend(exe.parent().map(Path::to_path_buf));
    }
    search_roots(&roots)
}

fn search_roots(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .flat_map(|root| {
            FILE_STEMS.iter().flat_map(move |stem| {
                FILE_EXTENSIONS.iter().map(move |ext| root.join(format!("{stem}.{ext}")))
            })
        })
        .find(|candidate| candidate.is_file())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        FieldVisitError::Config(format!("missing required environment variable: {key}"))
    })
}

/// Parse an optional variable; set but unparsable is an error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| FieldVisitError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
