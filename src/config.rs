use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::ratelimit::RouteClass;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Service configuration, loaded once at startup and validated eagerly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Redis connection URL; when absent the in-memory store is used
    #[serde(default)]
    pub redis_url: Option<String>,

    /// CORS origins; empty means allow any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// How often stale rate-limit windows and past-retention tombstones
    /// are swept
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,

    #[serde(default)]
    pub pastes: PasteConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// Limits and policy for paste documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasteConfig {
    /// Length of generated paste identifiers
    #[serde(default = "default_id_length")]
    pub id_length: usize,

    /// Alphabet identifiers are drawn from
    #[serde(default = "default_id_alphabet")]
    pub id_alphabet: String,

    /// Maximum number of files in one paste
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum total content size across all files, in bytes
    #[serde(default = "default_max_paste_bytes")]
    pub max_paste_bytes: usize,

    /// TTL applied when the client does not request one
    #[serde(default, with = "humantime_serde")]
    pub default_ttl: Option<Duration>,

    /// Upper bound on client-requested TTLs
    #[serde(default, with = "humantime_serde")]
    pub max_ttl: Option<Duration>,

    /// How long an expired paste keeps its identifier reserved
    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,

    /// Whether pastes created without an owner token may be deleted by
    /// anyone holding the identifier
    #[serde(default = "default_true")]
    pub anonymous_delete: bool,
}

/// Fixed-window rate limit ceilings. A missing rule means no limit is
/// applied for that scope; failing open here is a deliberate choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Ceiling applied to every request regardless of route
    #[serde(default)]
    pub global: Option<RateLimitRule>,

    #[serde(default)]
    pub read: Option<RateLimitRule>,

    #[serde(default)]
    pub create: Option<RateLimitRule>,

    #[serde(default)]
    pub delete: Option<RateLimitRule>,

    #[serde(default)]
    pub admin: Option<RateLimitRule>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitRule {
    /// Requests allowed per window
    pub requests: u32,

    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for PasteConfig {
    fn default() -> Self {
        Self {
            id_length: default_id_length(),
            id_alphabet: default_id_alphabet(),
            max_files: default_max_files(),
            max_paste_bytes: default_max_paste_bytes(),
            default_ttl: None,
            max_ttl: None,
            retention: default_retention(),
            anonymous_delete: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            redis_url: None,
            allowed_origins: Vec::new(),
            cleanup_interval: default_cleanup_interval(),
            pastes: PasteConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl RateLimitConfig {
    /// Rule for a route class, not including the global rule.
    pub fn rule_for(&self, class: RouteClass) -> Option<RateLimitRule> {
        match class {
            RouteClass::Read => self.read,
            RouteClass::Create => self.create,
            RouteClass::Delete => self.delete,
            RouteClass::Admin => self.admin,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pastes = &self.pastes;

        if pastes.id_length == 0 {
            return Err(ConfigError::Invalid(
                "pastes.id_length must be greater than 0".to_string(),
            ));
        }

        let mut alphabet: Vec<char> = pastes.id_alphabet.chars().collect();
        alphabet.sort_unstable();
        alphabet.dedup();
        if alphabet.len() < 2 {
            return Err(ConfigError::Invalid(
                "pastes.id_alphabet must contain at least 2 distinct characters".to_string(),
            ));
        }

        if pastes.max_files == 0 {
            return Err(ConfigError::Invalid(
                "pastes.max_files must be greater than 0".to_string(),
            ));
        }

        if pastes.max_paste_bytes == 0 {
            return Err(ConfigError::Invalid(
                "pastes.max_paste_bytes must be greater than 0".to_string(),
            ));
        }

        if let (Some(default_ttl), Some(max_ttl)) = (pastes.default_ttl, pastes.max_ttl) {
            if default_ttl > max_ttl {
                return Err(ConfigError::Invalid(
                    "pastes.default_ttl must not exceed pastes.max_ttl".to_string(),
                ));
            }
        }

        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }

        let rules = [
            ("global", self.rate_limits.global),
            ("read", self.rate_limits.read),
            ("create", self.rate_limits.create),
            ("delete", self.rate_limits.delete),
            ("admin", self.rate_limits.admin),
        ];
        for (name, rule) in rules {
            if let Some(rule) = rule {
                if rule.requests == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "rate_limits.{name}.requests must be greater than 0"
                    )));
                }
                if rule.window.is_zero() {
                    return Err(ConfigError::Invalid(format!(
                        "rate_limits.{name}.window must be greater than 0"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_id_length() -> usize {
    8
}

fn default_id_alphabet() -> String {
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz".to_string()
}

fn default_max_files() -> usize {
    16
}

fn default_max_paste_bytes() -> usize {
    300_000
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_true() -> bool {
    true
}
