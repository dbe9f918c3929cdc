// Configuration module for the control plane.
// Loaded from an optional TOML file, then overridden by environment
// variables, then validated before the server binds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub runtime_backend: RuntimeBackend,
    pub scheduler_policy: SchedulerPolicy,
    pub runtime_command: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeBackend {
    Fake,
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerPolicy {
    FirstFit,
    BestFit,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_interval_ms: 5_000,
            heartbeat_timeout_ms: 15_000,
            runtime_backend: RuntimeBackend::Fake,
            scheduler_policy: SchedulerPolicy::FirstFit,
            runtime_command: "docker".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads a TOML file if `path` is `Some`, falling back to defaults
    /// otherwise, then layers environment overrides on top.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => ServerConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("ORKA_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(ms) = std::env::var("ORKA_TICK_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                self.tick_interval_ms = ms;
            }
        }
        if let Ok(ms) = std::env::var("ORKA_HEARTBEAT_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.heartbeat_timeout_ms = ms;
            }
        }
        if let Ok(runtime) = std::env::var("ORKA_RUNTIME") {
            self.runtime_backend = match runtime.to_lowercase().as_str() {
                "process" => RuntimeBackend::Process,
                _ => RuntimeBackend::Fake,
            };
        }
        if let Ok(policy) = std::env::var("ORKA_SCHEDULER_POLICY") {
            self.scheduler_policy = match policy.to_lowercase().as_str() {
                "best-fit" => SchedulerPolicy::BestFit,
                _ => SchedulerPolicy::FirstFit,
            };
        }
        if let Ok(cmd) = std::env::var("ORKA_RUNTIME_CMD") {
            self.runtime_command = cmd;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be positive");
        }
        if self.heartbeat_timeout_ms == 0 {
            anyhow::bail!("heartbeat_timeout_ms must be positive");
        }
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("bind_addr '{}' is not a valid socket address", self.bind_addr);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let mut config = ServerConfig::default();
        config.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_bind_addr() {
        let mut config = ServerConfig::default();
        config.bind_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }
}
