use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub auth: Option<AuthSection>,
    #[serde(default)]
    pub engine: Option<EngineSection>,
    #[serde(default)]
    pub retry: Option<RetrySection>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub jwt_leeway_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EngineSection {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub worker_api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RetrySection {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub backoff: Option<String>,
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
    #[serde(default)]
    pub total_timeout_ms: Option<u64>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s; // suppress unused warning
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete gateway configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub engine: EngineConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_leeway_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub kind: String,
    pub worker_api_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: String,
    pub attempt_timeout_ms: u64,
    pub total_timeout_ms: u64,
}

/// Engine implementations the gateway can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Dispatch over the worker service's REST API.
    RemoteRest,
}

impl std::str::FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote-rest" | "RemoteRest" => Ok(Self::RemoteRest),
            other => Err(ConfigError::Validation(format!(
                "unsupported engine kind: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RemoteRest => "remote-rest",
        })
    }
}

impl EngineConfig {
    /// Resolve the configured kind string into a concrete [`EngineKind`].
    pub fn kind(&self) -> Result<EngineKind, ConfigError> {
        self.kind.parse()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 9000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            auth: AuthConfig {
                jwt_secret: "your-256-bit-secret".to_string(),
                jwt_leeway_seconds: 0,
            },
            engine: EngineConfig {
                kind: "remote-rest".to_string(),
                worker_api_url: "http://worker-service:8080/api/v1".to_string(),
            },
            retry: RetryConfig {
                max_attempts: 3,
                delay_ms: 1000,
                backoff: "fixed".to_string(),
                attempt_timeout_ms: 10_000,
                total_timeout_ms: 30_000,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(()),
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    // Start with file values if provided
    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(server) = raw.server {
            apply_opt!(cfg.server.host, server.host);
            apply_opt!(cfg.server.port, server.port);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        if let Some(auth) = raw.auth {
            apply_opt!(cfg.auth.jwt_secret, auth.jwt_secret);
            apply_opt!(cfg.auth.jwt_leeway_seconds, auth.jwt_leeway_seconds);
        }
        if let Some(engine) = raw.engine {
            apply_opt!(cfg.engine.kind, engine.kind);
            apply_opt!(cfg.engine.worker_api_url, engine.worker_api_url);
        }
        if let Some(retry) = raw.retry {
            apply_opt!(cfg.retry.max_attempts, retry.max_attempts);
            apply_opt!(cfg.retry.delay_ms, retry.delay_ms);
            apply_opt!(cfg.retry.backoff, retry.backoff);
            apply_opt!(cfg.retry.attempt_timeout_ms, retry.attempt_timeout_ms);
            apply_opt!(cfg.retry.total_timeout_ms, retry.total_timeout_ms);
        }
    }

    // Apply environment variable overrides (env takes precedence)
    apply_env_overrides(&mut cfg)?;

    // Path assembly inserts its own separator
    cfg.engine.worker_api_url = cfg.engine.worker_api_url.trim_end_matches('/').to_string();

    Ok(cfg)
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Helper to get env var as string
#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("IMGJOBS_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("IMGJOBS_SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("IMGJOBS_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("IMGJOBS_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Auth
    if let Some(v) = env_str("IMGJOBS_JWT_SECRET") {
        cfg.auth.jwt_secret = v;
    }
    if let Some(v) = env_parse::<u64>("IMGJOBS_JWT_LEEWAY_SECONDS")? {
        cfg.auth.jwt_leeway_seconds = v;
    }

    // Engine
    if let Some(v) = env_str("IMGJOBS_ENGINE_KIND") {
        cfg.engine.kind = v;
    }
    if let Some(v) = env_str("IMGJOBS_WORKER_SERVICE_API") {
        cfg.engine.worker_api_url = v;
    }
    // Backwards-compatible alias
    if let Some(v) = env_str("IMGJOBS_WORKER_SERVICE_URL") {
        cfg.engine.worker_api_url = v;
    }

    // Retry
    if let Some(v) = env_parse::<u32>("IMGJOBS_RETRY_MAX_ATTEMPTS")? {
        cfg.retry.max_attempts = v;
    }
    if let Some(v) = env_parse::<u64>("IMGJOBS_RETRY_DELAY_MS")? {
        cfg.retry.delay_ms = v;
    }
    if let Some(v) = env_str("IMGJOBS_RETRY_BACKOFF") {
        cfg.retry.backoff = v;
    }
    if let Some(v) = env_parse::<u64>("IMGJOBS_RETRY_ATTEMPT_TIMEOUT_MS")? {
        cfg.retry.attempt_timeout_ms = v;
    }
    if let Some(v) = env_parse::<u64>("IMGJOBS_RETRY_TOTAL_TIMEOUT_MS")? {
        cfg.retry.total_timeout_ms = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    // server port range
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    // validate server.host: allow IPs or simple hostname pattern
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    if cfg.auth.jwt_secret.is_empty() {
        return Err(ConfigError::Validation(
            "auth.jwt_secret must not be empty".into(),
        ));
    }

    // engine kind must resolve
    cfg.engine.kind()?;

    // worker url must be a well-formed http(s) URL
    match url::Url::parse(&cfg.engine.worker_api_url) {
        Ok(u) => {
            let scheme = u.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(ConfigError::Validation(format!(
                    "engine.worker_api_url must be http or https: {}",
                    cfg.engine.worker_api_url
                )));
            }
        }
        Err(_) => {
            return Err(ConfigError::Validation(format!(
                "invalid engine.worker_api_url: {}",
                cfg.engine.worker_api_url
            )))
        }
    }

    match cfg.retry.backoff.as_str() {
        "fixed" | "exponential" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "unsupported retry.backoff: {}",
                other
            )))
        }
    }
    if cfg.retry.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "retry.max_attempts must be > 0".into(),
        ));
    }
    if cfg.retry.attempt_timeout_ms == 0 || cfg.retry.total_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "retry timeouts must be > 0".into(),
        ));
    }

    Ok(())
}
