//! Room Controller configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults. The media settings (announced IP, RTC port range, codec
//! set) are process-wide: every router and transport the controller
//! requests from the engine uses them.

use signal_protocol::rtp::CodecCapability;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default number of media-engine workers in the pool.
pub const DEFAULT_NUM_WORKERS: usize = 1;

/// Default transport listen IP.
pub const DEFAULT_LISTEN_IP: &str = "0.0.0.0";

/// Default announced IP for ICE candidates.
pub const DEFAULT_ANNOUNCED_IP: &str = "127.0.0.1";

/// Default RTC port range.
pub const DEFAULT_RTC_MIN_PORT: u16 = 40_000;
pub const DEFAULT_RTC_MAX_PORT: u16 = 49_999;

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default per-request deadline in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// Default grace period before an empty room is evicted, in seconds.
pub const DEFAULT_ROOM_EVICTION_GRACE_SECONDS: u64 = 60;

/// Default controller instance ID prefix.
pub const DEFAULT_RC_ID_PREFIX: &str = "rc";

/// Room Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this controller instance.
    pub rc_id: String,

    /// Number of media-engine workers in the pool.
    pub num_workers: usize,

    /// Transport listen IP.
    pub listen_ip: String,

    /// Announced IP placed in ICE candidates.
    pub announced_ip: String,

    /// Lowest RTC port the engine may allocate.
    pub rtc_min_port: u16,

    /// Highest RTC port the engine may allocate.
    pub rtc_max_port: u16,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Per-request deadline applied by the dispatcher.
    pub request_timeout: Duration,

    /// How long an empty room survives before eviction.
    pub room_eviction_grace: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let num_workers = match vars.get("RC_NUM_WORKERS") {
            Some(raw) => raw.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                ConfigError::InvalidValue(format!("RC_NUM_WORKERS must be a positive integer, got {raw:?}"))
            })?,
            None => DEFAULT_NUM_WORKERS,
        };

        let listen_ip = vars
            .get("RC_LISTEN_IP")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LISTEN_IP.to_string());

        let announced_ip = vars
            .get("RC_ANNOUNCED_IP")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ANNOUNCED_IP.to_string());

        let rtc_min_port = parse_port(vars, "RC_RTC_MIN_PORT", DEFAULT_RTC_MIN_PORT)?;
        let rtc_max_port = parse_port(vars, "RC_RTC_MAX_PORT", DEFAULT_RTC_MAX_PORT)?;
        if rtc_min_port >= rtc_max_port {
            return Err(ConfigError::InvalidValue(format!(
                "RC_RTC_MIN_PORT ({rtc_min_port}) must be below RC_RTC_MAX_PORT ({rtc_max_port})"
            )));
        }

        let health_bind_address = vars
            .get("RC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let request_timeout_seconds = parse_seconds(
            vars,
            "RC_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        let room_eviction_grace_seconds = parse_seconds(
            vars,
            "RC_ROOM_EVICTION_GRACE_SECONDS",
            DEFAULT_ROOM_EVICTION_GRACE_SECONDS,
        )?;

        // Generate controller instance ID
        let rc_id = vars.get("RC_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000").to_string();
            format!("{DEFAULT_RC_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            rc_id,
            num_workers,
            listen_ip,
            announced_ip,
            rtc_min_port,
            rtc_max_port,
            health_bind_address,
            request_timeout: Duration::from_secs(request_timeout_seconds),
            room_eviction_grace: Duration::from_secs(room_eviction_grace_seconds),
        })
    }

    /// The process-wide codec set every router is created with.
    ///
    /// Audio-only deployment: a single Opus entry.
    #[must_use]
    pub fn media_codecs(&self) -> Vec<CodecCapability> {
        vec![CodecCapability::opus()]
    }
}

fn parse_port(
    vars: &HashMap<String, String>,
    name: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue(format!("{name} must be a port, got {raw:?}"))),
        None => Ok(default),
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw.parse::<u64>().ok().filter(|n| *n > 0).ok_or_else(|| {
            ConfigError::InvalidValue(format!("{name} must be a positive number of seconds, got {raw:?}"))
        }),
        None => Ok(default),
    }
}
