pub mod env;
pub use env::{apply_env_overrides, apply_overrides_from, config_path_from_env};

use crate::auth::{Identity, IdentityRegistry, Role};
use crate::simulator::{RosterEntry, MAX_SPEED, MIN_SPEED};
use crate::vitals::EntityId;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Complete pulsesim configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub distributor: DistributorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_roster")]
    pub roster: Vec<RosterEntry>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            simulator: SimulatorConfig::default(),
            distributor: DistributorConfig::default(),
            storage: StorageConfig::default(),
            history: HistoryConfig::default(),
            auth: AuthConfig::default(),
            roster: default_roster(),
        }
    }
}

/// HTTP listener
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tick orchestrator
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    /// Wall-clock tick period, independent of speed
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    /// Start ticking as soon as the server is up
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

fn default_tick_interval_ms() -> u64 {
    5_000
}

fn default_speed() -> f64 {
    1.0
}

fn default_auto_start() -> bool {
    true
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            speed: default_speed(),
            seed: None,
            auto_start: default_auto_start(),
        }
    }
}

impl SimulatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Real-time fan-out
#[derive(Debug, Clone, Deserialize)]
pub struct DistributorConfig {
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_flush_interval_ms() -> u64 {
    1_000
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl DistributorConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Durable sink and retention
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_retention_interval_hours")]
    pub retention_interval_hours: u64,
}

fn default_db_path() -> String {
    "pulsesim.db".to_string()
}

fn default_retention_days() -> i64 {
    30
}

fn default_retention_interval_hours() -> u64 {
    6
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            retention_days: default_retention_days(),
            retention_interval_hours: default_retention_interval_hours(),
        }
    }
}

impl StorageConfig {
    pub fn retention_horizon(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_hours * 3600)
    }
}

/// History query defaults
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Window used when a query gives no start
    #[serde(default = "default_window_hours")]
    pub default_window_hours: i64,
}

fn default_window_hours() -> i64 {
    24
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_window_hours: default_window_hours(),
        }
    }
}

/// Static tokens registered at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// When false every caller is treated as privileged
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub role: Role,
    #[serde(default)]
    pub entity_id: Option<EntityId>,
}

impl AuthConfig {
    /// Build the identity registry from configured tokens
    pub fn registry(&self) -> Result<IdentityRegistry> {
        let registry = IdentityRegistry::new();
        for entry in &self.tokens {
            let identity = match (entry.role, entry.entity_id) {
                (Role::Privileged, _) => Identity::privileged(),
                (Role::Restricted, Some(entity_id)) => Identity::restricted(entity_id),
                (Role::Restricted, None) => {
                    bail!("restricted token '{}' has no entity_id", entry.token)
                }
            };
            registry.register(entry.token.clone(), identity);
        }
        Ok(registry)
    }
}

fn default_roster() -> Vec<RosterEntry> {
    [
        (1, "Margaret Thompson"),
        (2, "Robert Chen"),
        (3, "Dorothy Williams"),
        (4, "James O'Brien"),
        (5, "Evelyn Kowalski"),
        (6, "Arthur Patel"),
    ]
    .into_iter()
    .map(|(id, name)| RosterEntry {
        id,
        name: name.to_string(),
    })
    .collect()
}

impl PulseConfig {
    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.simulator.tick_interval_ms == 0 {
            bail!("simulator.tick_interval_ms must be positive");
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.simulator.speed) {
            bail!(
                "simulator.speed must be between {} and {}, got {}",
                MIN_SPEED,
                MAX_SPEED,
                self.simulator.speed
            );
        }
        if self.distributor.flush_interval_ms == 0 {
            bail!("distributor.flush_interval_ms must be positive");
        }
        if self.storage.retention_days <= 0 || self.storage.retention_interval_hours == 0 {
            bail!("storage retention settings must be positive");
        }
        if self.history.default_window_hours <= 0 {
            bail!("history.default_window_hours must be positive");
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PulseConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PulseConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
