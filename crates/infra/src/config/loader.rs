//! Configuration loader
//!
//! Builds a [`RequestLayerConfig`] from a file and the environment.
//!
//! ## Loading Strategy
//! 1. Start from the file at an explicit path, or the first probed file, or
//!    the built-in defaults when no file exists
//! 2. Apply `FOOTSTEPS_*` environment variables on top; they win over file
//!    values
//! 3. Validate the result
//!
//! ## Environment Variables
//! - `FOOTSTEPS_ENABLE_CACHE`: Whether responses are cached (true/false)
//! - `FOOTSTEPS_DEFAULT_TTL_MS`: TTL when no endpoint class matches
//! - `FOOTSTEPS_MAX_CACHE_SIZE`: Maximum cached entries
//! - `FOOTSTEPS_EVICTION_POLICY`: `fifo` or `lru`
//! - `FOOTSTEPS_MAX_RETRY_ATTEMPTS`: Total attempts, first one included
//! - `FOOTSTEPS_BASE_RETRY_DELAY_MS`: Linear backoff base
//! - `FOOTSTEPS_RETRY_BUDGET_MS`: Budget shared by all attempts
//! - `FOOTSTEPS_SWEEP_INTERVAL_MS`: Background expiry sweep period
//! - `FOOTSTEPS_AUTH_EXPIRED_STATUS`: Status that triggers a token refresh
//! - `FOOTSTEPS_KEY_HEADERS`: Comma-separated header whitelist for keys
//! - `FOOTSTEPS_DEDUPE_IDEMPOTENT`: Honour the idempotent opt-in (true/false)
//! - `FOOTSTEPS_ZERO_WAITER_POLICY`: `keep_running` or `abort`
//! - `FOOTSTEPS_MAX_SNAPSHOT_BYTES`: Largest body that may be cached
//!
//! Per-endpoint TTLs can only be set in a file.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./footsteps.toml` or `./footsteps.json` (current working directory)
//! 2. `./config/footsteps.toml` or `./config/footsteps.json`
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use footsteps_domain::{EvictionPolicy, RequestLayerConfig, ZeroWaiterPolicy};
use thiserror::Error;

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} format: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load configuration from the probed file (if any) and the environment
///
/// # Errors
/// Returns [`ConfigError`] if a file cannot be read or parsed, an
/// environment variable holds an invalid value, or validation fails.
pub fn load() -> Result<RequestLayerConfig, ConfigError> {
    load_with(None, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit file and environment lookup
///
/// If `path` is `None`, probes the standard locations and falls back to the
/// defaults when none exists.
pub fn load_with<F>(path: Option<PathBuf>, lookup: F) -> Result<RequestLayerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match path {
        Some(path) => load_from_file(Some(path))?,
        None => match probe_config_paths() {
            Some(found) => load_from_file(Some(found))?,
            None => {
                tracing::debug!("No config file found, starting from defaults");
                RequestLayerConfig::default()
            }
        },
    };

    let config = apply_env_overrides(base, lookup)?;
    config.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
    Ok(config)
}

/// Load configuration from a file
///
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns [`ConfigError`] if the file is missing, unreadable or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<RequestLayerConfig, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p));
            }
            p
        }
        None => probe_config_paths()
            .ok_or_else(|| ConfigError::NotFound(PathBuf::from("footsteps.toml")))?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<RequestLayerConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "TOML", message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", message: e.to_string() }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] =
        ["footsteps.toml", "footsteps.json", "config/footsteps.toml", "config/footsteps.json"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Apply `FOOTSTEPS_*` overrides read through `lookup`
///
/// # Errors
/// Returns [`ConfigError::InvalidEnv`] for values that do not parse.
pub fn apply_env_overrides<F>(
    mut config: RequestLayerConfig,
    lookup: F,
) -> Result<RequestLayerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env_bool(&lookup, "FOOTSTEPS_ENABLE_CACHE")? {
        config.enable_cache = value;
    }
    if let Some(ms) = env_parse::<u64, _>(&lookup, "FOOTSTEPS_DEFAULT_TTL_MS")? {
        config.default_ttl = Duration::from_millis(ms);
    }
    if let Some(size) = env_parse(&lookup, "FOOTSTEPS_MAX_CACHE_SIZE")? {
        config.max_cache_size = size;
    }
    if let Some(raw) = lookup("FOOTSTEPS_EVICTION_POLICY") {
        config.eviction_policy = match raw.trim().to_ascii_lowercase().as_str() {
            "fifo" => EvictionPolicy::Fifo,
            "lru" => EvictionPolicy::Lru,
            _ => return Err(ConfigError::InvalidEnv { key: "FOOTSTEPS_EVICTION_POLICY", value: raw }),
        };
    }
    if let Some(attempts) = env_parse(&lookup, "FOOTSTEPS_MAX_RETRY_ATTEMPTS")? {
        config.max_retry_attempts = attempts;
    }
    if let Some(ms) = env_parse::<u64, _>(&lookup, "FOOTSTEPS_BASE_RETRY_DELAY_MS")? {
        config.base_retry_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = env_parse::<u64, _>(&lookup, "FOOTSTEPS_RETRY_BUDGET_MS")? {
        config.retry_budget = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = env_parse::<u64, _>(&lookup, "FOOTSTEPS_SWEEP_INTERVAL_MS")? {
        config.sweep_interval = Duration::from_millis(ms);
    }
    if let Some(status) = env_parse(&lookup, "FOOTSTEPS_AUTH_EXPIRED_STATUS")? {
        config.auth_expired_status = status;
    }
    if let Some(raw) = lookup("FOOTSTEPS_KEY_HEADERS") {
        config.key_headers = raw
            .split(',')
            .map(|header| header.trim().to_ascii_lowercase())
            .filter(|header| !header.is_empty())
            .collect();
    }
    if let Some(value) = env_bool(&lookup, "FOOTSTEPS_DEDUPE_IDEMPOTENT")? {
        config.dedupe_idempotent = value;
    }
    if let Some(raw) = lookup("FOOTSTEPS_ZERO_WAITER_POLICY") {
        config.zero_waiter_policy = match raw.trim().to_ascii_lowercase().as_str() {
            "keep_running" => ZeroWaiterPolicy::KeepRunning,
            "abort" => ZeroWaiterPolicy::Abort,
            _ => {
                return Err(ConfigError::InvalidEnv { key: "FOOTSTEPS_ZERO_WAITER_POLICY", value: raw })
            }
        };
    }
    if let Some(bytes) = env_parse(&lookup, "FOOTSTEPS_MAX_SNAPSHOT_BYTES")? {
        config.max_snapshot_bytes = bytes;
    }

    Ok(config)
}

fn env_parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnv { key, value: raw }))
        .transpose()
}

/// Parse a boolean variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidEnv { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_bool_parsing() {
        let vars = lookup(&[("A", "YES"), ("B", "off"), ("C", "maybe")]);

        assert_eq!(env_bool(&vars, "A").unwrap(), Some(true));
        assert_eq!(env_bool(&vars, "B").unwrap(), Some(false));
        assert!(env_bool(&vars, "C").is_err());
        assert_eq!(env_bool(&vars, "MISSING").unwrap(), None);
    }

    #[test]
    fn test_env_overrides_win() {
        let vars = lookup(&[
            ("FOOTSTEPS_ENABLE_CACHE", "false"),
            ("FOOTSTEPS_DEFAULT_TTL_MS", "600000"),
            ("FOOTSTEPS_MAX_RETRY_ATTEMPTS", "5"),
            ("FOOTSTEPS_EVICTION_POLICY", "LRU"),
            ("FOOTSTEPS_KEY_HEADERS", "Accept-Language, X-Client-Version"),
            ("FOOTSTEPS_ZERO_WAITER_POLICY", "abort"),
        ]);

        let config = apply_env_overrides(RequestLayerConfig::default(), vars).unwrap();

        assert!(!config.enable_cache);
        assert_eq!(config.default_ttl, Duration::from_millis(600_000));
        assert_eq!(config.max_retry_attempts, 5);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert_eq!(config.key_headers, vec!["accept-language", "x-client-version"]);
        assert_eq!(config.zero_waiter_policy, ZeroWaiterPolicy::Abort);
    }

    #[test]
    fn test_env_invalid_number() {
        let vars = lookup(&[("FOOTSTEPS_MAX_CACHE_SIZE", "lots")]);
        let err = apply_env_overrides(RequestLayerConfig::default(), vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "FOOTSTEPS_MAX_CACHE_SIZE", .. }));
    }

    #[test]
    fn test_load_with_rejects_invalid_result() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_retry_attempts = 3").unwrap();

        let vars = lookup(&[("FOOTSTEPS_MAX_RETRY_ATTEMPTS", "0")]);
        let err = load_with(Some(file.path().to_path_buf()), vars).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"maxCacheSize": 25, "perEndpointTTL": {{"/levels": 1000}}}}"#).unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.max_cache_size, 25);
        assert_eq!(config.ttl_for("/levels/1"), Duration::from_secs(1));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");
        std::fs::write(&path, "max_cache_size: 1").unwrap();

        let err = load_from_file(Some(path.clone())).unwrap_err();
        std::fs::remove_file(path).ok();

        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "yaml"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/footsteps.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_process_environment_is_read() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("FOOTSTEPS_SWEEP_INTERVAL_MS", "1500");

        let config =
            apply_env_overrides(RequestLayerConfig::default(), |key| std::env::var(key).ok());

        std::env::remove_var("FOOTSTEPS_SWEEP_INTERVAL_MS");
        assert_eq!(config.unwrap().sweep_interval, Duration::from_millis(1500));
    }
}
