//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::*;

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bistro";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 500;
const DEFAULT_CACHE_CLEANUP_INTERVAL_SECS: u64 = 300;
const DEFAULT_CACHE_GENERATION_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CACHE_WARM_WINDOWS_DAYS: [u32; 2] = [7, 30];

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub errors: ErrorSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub environment: DeploymentEnvironment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEnvironment {
    Production,
    Development,
    Test,
}

impl FromStr for DeploymentEnvironment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(format!(
                "unknown environment `{other}` (expected production, development, or test)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
    pub cleanup_interval: Duration,
    pub generation_timeout: Duration,
    pub single_flight: bool,
    pub warm_on_startup: bool,
    pub warm_windows_days: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorSettings {
    /// Whether API error bodies may carry internal failure messages.
    pub detailed: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BISTRO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    errors: RawErrorSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.server.environment = Some(environment.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(max) = overrides.cache_max_entries {
            self.cache.max_entries = Some(max);
        }
        if let Some(timeout) = overrides.cache_generation_timeout_ms {
            self.cache.generation_timeout_ms = Some(timeout);
        }
        if let Some(warm) = overrides.cache_warm_on_startup {
            self.cache.warm_on_startup = Some(warm);
        }
        if let Some(detailed) = overrides.detailed_errors {
            self.errors.detailed = Some(detailed);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            errors,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let errors = build_error_settings(errors, server.environment);

        Ok(Self {
            server,
            logging,
            cache,
            errors,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = positive_secs(graceful_secs, "server.graceful_shutdown_seconds")?;

    let environment = match server.environment {
        Some(value) => DeploymentEnvironment::from_str(&value)
            .map_err(|reason| LoadError::invalid("server.environment", reason))?,
        None => DeploymentEnvironment::Production,
    };

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
        environment,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl = positive_secs(
        cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.ttl_seconds",
    )?;
    let cleanup_interval = positive_secs(
        cache
            .cleanup_interval_seconds
            .unwrap_or(DEFAULT_CACHE_CLEANUP_INTERVAL_SECS),
        "cache.cleanup_interval_seconds",
    )?;

    let timeout_ms = cache
        .generation_timeout_ms
        .unwrap_or(DEFAULT_CACHE_GENERATION_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.generation_timeout_ms",
            "must be greater than zero",
        ));
    }

    let warm_windows_days = cache
        .warm_windows_days
        .unwrap_or_else(|| DEFAULT_CACHE_WARM_WINDOWS_DAYS.to_vec());
    if warm_windows_days.contains(&0) {
        return Err(LoadError::invalid(
            "cache.warm_windows_days",
            "every window must span at least one day",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl,
        max_entries: cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES).max(1),
        cleanup_interval,
        generation_timeout: Duration::from_millis(timeout_ms),
        single_flight: cache.single_flight.unwrap_or(true),
        warm_on_startup: cache.warm_on_startup.unwrap_or(false),
        warm_windows_days,
    })
}

fn build_error_settings(
    errors: RawErrorSettings,
    environment: DeploymentEnvironment,
) -> ErrorSettings {
    ErrorSettings {
        detailed: errors
            .detailed
            .unwrap_or(environment != DeploymentEnvironment::Production),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_seconds: Option<u64>,
    max_entries: Option<usize>,
    cleanup_interval_seconds: Option<u64>,
    generation_timeout_ms: Option<u64>,
    single_flight: Option<bool>,
    warm_on_startup: Option<bool>,
    warm_windows_days: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawErrorSettings {
    detailed: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
