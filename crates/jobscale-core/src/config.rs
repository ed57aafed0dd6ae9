//! Process configuration.
//!
//! Built once at startup (from flags/environment or a TOML file), validated,
//! and never mutated afterwards.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One breakpoint of the queue-depth → replica step function.
///
/// Depths up to and including `max_pending` map to `replicas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleStep {
    pub max_pending: u64,
    pub replicas: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identifier of the worker service on the fleet platform.
    pub service_ref: String,
    pub fleet_api_url: String,
    pub fleet_api_token: String,
    pub queue_store_url: String,
    #[serde(default = "default_queue_table")]
    pub queue_table: String,
    pub rate_limit_store_url: String,
    /// Units allowed per rate-limit window, shared by every process.
    pub global_rate_limit_cap: u64,
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
    #[serde(default = "default_rate_limit_key")]
    pub rate_limit_key: String,
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_scale_up_cooldown_ms")]
    pub scale_up_cooldown_ms: u64,
    #[serde(default = "default_scale_down_cooldown_ms")]
    pub scale_down_cooldown_ms: u64,
    /// Upper bound on every external call made during a tick.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default = "default_scale_steps")]
    pub scale_steps: Vec<ScaleStep>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_queue_table() -> String {
    "jobs".to_string()
}

fn default_rate_limit_window_ms() -> u64 {
    60_000
}

fn default_rate_limit_key() -> String {
    "jobscale:fleet-actions".to_string()
}

fn default_max_replicas() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_scale_up_cooldown_ms() -> u64 {
    30_000
}

fn default_scale_down_cooldown_ms() -> u64 {
    120_000
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

pub fn default_scale_steps() -> Vec<ScaleStep> {
    [(0, 0), (10, 1), (30, 2), (60, 3), (100, 4)]
        .into_iter()
        .map(|(max_pending, replicas)| ScaleStep {
            max_pending,
            replicas,
        })
        .collect()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for Config {
    /// Defaults for every tunable. Connection settings are left empty and
    /// must be filled in before [`Config::validate`] accepts the config.
    fn default() -> Self {
        Self {
            service_ref: String::new(),
            fleet_api_url: String::new(),
            fleet_api_token: String::new(),
            queue_store_url: String::new(),
            queue_table: default_queue_table(),
            rate_limit_store_url: String::new(),
            global_rate_limit_cap: 0,
            rate_limit_window_ms: default_rate_limit_window_ms(),
            rate_limit_key: default_rate_limit_key(),
            min_replicas: 0,
            max_replicas: default_max_replicas(),
            poll_interval_ms: default_poll_interval_ms(),
            scale_up_cooldown_ms: default_scale_up_cooldown_ms(),
            scale_down_cooldown_ms: default_scale_down_cooldown_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            scale_steps: default_scale_steps(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting. Called before any listener is bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.service_ref, "service_ref")?;
        require(&self.fleet_api_url, "fleet_api_url")?;
        require(&self.fleet_api_token, "fleet_api_token")?;
        require(&self.queue_store_url, "queue_store_url")?;
        require(&self.rate_limit_store_url, "rate_limit_store_url")?;
        require(&self.rate_limit_key, "rate_limit_key")?;

        if !is_path_segment(&self.service_ref) {
            return Err(ConfigError::invalid(
                "service_ref",
                format!(
                    "{:?} must be a single URL path segment of letters, digits, '-', '_' or '.'",
                    self.service_ref
                ),
            ));
        }
        if !self.fleet_api_url.starts_with("http://") {
            return Err(ConfigError::invalid(
                "fleet_api_url",
                "only http:// endpoints are supported",
            ));
        }
        if !is_identifier(&self.queue_table) {
            return Err(ConfigError::invalid(
                "queue_table",
                format!("{:?} is not a plain SQL identifier", self.queue_table),
            ));
        }
        if self.max_replicas == 0 {
            return Err(ConfigError::invalid("max_replicas", "must be at least 1"));
        }
        if self.min_replicas > self.max_replicas {
            return Err(ConfigError::invalid(
                "min_replicas",
                format!(
                    "{} exceeds max_replicas {}",
                    self.min_replicas, self.max_replicas
                ),
            ));
        }
        if self.global_rate_limit_cap == 0 {
            return Err(ConfigError::invalid(
                "global_rate_limit_cap",
                "must be at least 1",
            ));
        }
        for (key, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("rate_limit_window_ms", self.rate_limit_window_ms),
            ("call_timeout_ms", self.call_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
        }
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("listen_addr", e.to_string()))?;
        validate_steps(&self.scale_steps)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }
}

fn require(value: &str, key: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(key))
    } else {
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `s` can be placed in a URL path as-is, without escaping.
pub fn is_path_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Breakpoints must strictly increase in depth and never decrease in
/// replicas, which keeps the step function monotonic.
fn validate_steps(steps: &[ScaleStep]) -> Result<(), ConfigError> {
    for pair in steps.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.max_pending <= prev.max_pending {
            return Err(ConfigError::invalid(
                "scale_steps",
                format!(
                    "depth bounds must strictly increase ({} then {})",
                    prev.max_pending, next.max_pending
                ),
            ));
        }
        if next.replicas < prev.replicas {
            return Err(ConfigError::invalid(
                "scale_steps",
                format!(
                    "replica counts must not decrease ({} then {})",
                    prev.replicas, next.replicas
                ),
            ));
        }
    }
    Ok(())
}

/// Parse `"0:0,10:1,30:2"` into step breakpoints (`max_pending:replicas`).
pub fn parse_scale_steps(s: &str) -> Result<Vec<ScaleStep>, ConfigError> {
    let mut steps = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (depth, replicas) = part
            .split_once(':')
            .ok_or_else(|| ConfigError::invalid("scale_steps", format!("{part:?} is not depth:replicas")))?;
        let max_pending = depth
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::invalid("scale_steps", format!("{part:?}: {e}")))?;
        let replicas = replicas
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::invalid("scale_steps", format!("{part:?}: {e}")))?;
        steps.push(ScaleStep {
            max_pending,
            replicas,
        });
    }
    validate_steps(&steps)?;
    Ok(steps)
}
