//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`defaults`]: default-value functions for `#[serde(default = "...")]` fields
//! - [`validation`]: startup validation, distinguishing fatal from advisory errors
//!
//! Configuration is loaded from a TOML file and then overridden by a small
//! set of recognized environment variables, matching the env-override
//! convention used for secrets and deployment-specific endpoints.

mod defaults;
mod validation;

pub use validation::{ValidationError, is_fatal, validate};

use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub media_server: MediaServerConfig,
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "defaults::default_host")]
    pub host: String,
    #[serde(default = "defaults::default_port")]
    pub port: u16,
    /// 0 disables the metrics HTTP server.
    #[serde(default = "defaults::default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: defaults::default_host(),
            port: defaults::default_port(),
            metrics_port: defaults::default_metrics_port(),
        }
    }
}

impl ListenConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// TURN/STUN credential issuance configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TurnConfig {
    /// Shared secret for HMAC-SHA1 time-limited credentials. Empty disables
    /// issuance (the REST endpoint returns 503).
    pub secret: Option<String>,
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    pub stun_host: Option<String>,
    #[serde(default)]
    pub enable_tcp: bool,
    #[serde(default = "defaults::default_turn_ttl_secs")]
    pub ttl_secs: u64,
}

/// Media-server (SFU) token-minting configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MediaServerConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

/// External collaborator endpoints.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CollaboratorsConfig {
    /// Required: base URL of the user/profile/friendship directory service.
    #[serde(default)]
    pub user_directory_url: String,
    /// Optional: base URL of the offline-message mailbox service.
    pub offline_mailbox_url: Option<String>,
    /// Optional: base URL of a clustered queue-store backend. Absent means
    /// the in-process fallback is used from the start.
    pub queue_store_url: Option<String>,
}

/// Matchmaking and direct-call tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "defaults::default_pair_ban_ms")]
    pub pair_ban_ms: u64,
    #[serde(default = "defaults::default_ring_timeout_ms")]
    pub ring_timeout_ms: u64,
    #[serde(default = "defaults::default_socket_lock_ttl_ms")]
    pub socket_lock_ttl_ms: u64,
    #[serde(default = "defaults::default_next_debounce_ms")]
    pub next_debounce_ms: u64,
    #[serde(default = "defaults::default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,
    #[serde(default = "defaults::default_max_queue_wait_ms")]
    pub max_queue_wait_ms: u64,
    #[serde(default = "defaults::default_small_cohort_threshold")]
    pub small_cohort_threshold: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            pair_ban_ms: defaults::default_pair_ban_ms(),
            ring_timeout_ms: defaults::default_ring_timeout_ms(),
            socket_lock_ttl_ms: defaults::default_socket_lock_ttl_ms(),
            next_debounce_ms: defaults::default_next_debounce_ms(),
            janitor_interval_secs: defaults::default_janitor_interval_secs(),
            max_queue_wait_ms: defaults::default_max_queue_wait_ms(),
            small_cohort_threshold: defaults::default_small_cohort_threshold(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from a TOML file, then apply recognized
    /// environment-variable overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.listen.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.listen.port = port;
            }
        }
        if let Ok(secret) = std::env::var("TURN_SECRET") {
            self.turn.secret = Some(secret);
        }
        if let Ok(host) = std::env::var("TURN_HOST") {
            self.turn.host = Some(host);
        }
        if let Ok(port) = std::env::var("TURN_PORT") {
            if let Ok(port) = port.parse() {
                self.turn.port = Some(port);
            }
        }
        if let Ok(host) = std::env::var("STUN_HOST") {
            self.turn.stun_host = Some(host);
        }
        if let Ok(enable) = std::env::var("TURN_ENABLE_TCP") {
            self.turn.enable_tcp = enable == "1" || enable.eq_ignore_ascii_case("true");
        }
        if let Ok(ttl) = std::env::var("TURN_TTL") {
            if let Ok(ttl) = ttl.parse() {
                self.turn.ttl_secs = ttl;
            }
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.log_format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.matcher.pair_ban_ms, 5_000);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn socket_addr_parses() {
        let config = ListenConfig::default();
        assert!(config.socket_addr().is_ok());
    }

    #[test]
    fn load_reads_file_and_applies_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        write!(
            file,
            r#"
            [listen]
            port = 4000

            [collaborators]
            user_directory_url = "http://localhost:4000"
            "#
        )
        .unwrap();

        unsafe {
            std::env::set_var("PORT", "4001");
        }
        let config = Config::load(file.path()).unwrap();
        unsafe {
            std::env::remove_var("PORT");
        }

        assert_eq!(config.listen.port, 4001);
        assert_eq!(config.collaborators.user_directory_url, "http://localhost:4000");
    }

    #[test]
    fn load_missing_file_errors() {
        let err = Config::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
