//! Configuration resolution for `Turnstile`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Config file (JSON, passed explicitly)
//! 3. Environment variables
//! 4. CLI arguments (applied by the binary, highest priority)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound for concurrent member syncs during a sweep.
pub const MAX_SWEEP_CONCURRENCY: usize = 8;

/// Complete `Turnstile` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Connection settings for the device relay (the HTTP "worker").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub base_url: String,
    pub shared_secret: String,
    /// Path of the "set full user state" endpoint.
    pub set_user_path: String,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            shared_secret: String::new(),
            set_user_path: "/set-user".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Scheduled expiry sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds between sweeps. `0` disables the in-process scheduler.
    pub interval_secs: u64,
    /// Members synced in parallel. `1` keeps the sweep strictly sequential.
    pub concurrency: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            concurrency: 1,
        }
    }
}

impl SweepConfig {
    /// Concurrency clamped to `1..=MAX_SWEEP_CONCURRENCY`.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_SWEEP_CONCURRENCY)
    }
}

/// HTTP function server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl Config {
    /// Check that everything needed to talk to the relay is present.
    pub fn validate(&self) -> Result<()> {
        if self.relay.base_url.trim().is_empty() {
            return Err(Error::Config("relay base_url is not set".into()));
        }
        if self.relay.shared_secret.is_empty() {
            return Err(Error::Config("relay shared_secret is not set".into()));
        }
        if self.relay.timeout_secs == 0 {
            return Err(Error::Config("relay timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    let mut config = match config_file {
        Some(path) => load_config_file(path)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the default database path.
pub fn default_database_path() -> Option<PathBuf> {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".local").join("share"))
        })
        .map(|p| p.join("turnstile").join("bridge.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("TURNSTILE_DB_PATH") {
        config.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("TURNSTILE_RELAY_URL") {
        config.relay.base_url = val;
    }
    if let Some(val) = var("TURNSTILE_RELAY_SECRET") {
        config.relay.shared_secret = val;
    }
    if let Some(n) = var("TURNSTILE_RELAY_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.relay.timeout_secs = n;
    }
    if let Some(n) = var("TURNSTILE_SWEEP_INTERVAL").and_then(|v| v.parse().ok()) {
        config.sweep.interval_secs = n;
    }
    if let Some(n) = var("TURNSTILE_SWEEP_CONCURRENCY").and_then(|v| v.parse().ok()) {
        config.sweep.concurrency = n;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.relay.set_user_path, "/set-user");
        assert_eq!(config.relay.timeout_secs, 20);
        assert_eq!(config.sweep.concurrency, 1);
        assert_eq!(config.server.addr.port(), 8080);
    }

    #[test]
    fn default_config_fails_validation() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turnstile.json");
        std::fs::write(
            &path,
            r#"{"relay": {"base_url": "https://relay.example", "shared_secret": "s3cret"}}"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.relay.base_url, "https://relay.example");
        assert_eq!(config.relay.timeout_secs, 20);
        assert_eq!(config.sweep.interval_secs, 3600);
        config.validate().unwrap();
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_config(Some(Path::new("/nonexistent/turnstile.json"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            ("TURNSTILE_RELAY_URL", "http://worker.local"),
            ("TURNSTILE_RELAY_SECRET", "from-env"),
            ("TURNSTILE_SWEEP_CONCURRENCY", "4"),
            ("TURNSTILE_RELAY_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.relay.base_url = "https://from-file".into();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.relay.base_url, "http://worker.local");
        assert_eq!(config.relay.shared_secret, "from-env");
        assert_eq!(config.sweep.concurrency, 4);
        assert_eq!(config.relay.timeout_secs, 20);
    }

    #[test]
    fn concurrency_is_clamped() {
        let mut sweep = SweepConfig::default();
        sweep.concurrency = 0;
        assert_eq!(sweep.effective_concurrency(), 1);
        sweep.concurrency = 64;
        assert_eq!(sweep.effective_concurrency(), MAX_SWEEP_CONCURRENCY);
    }
}
