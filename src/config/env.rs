use crate::config::PulseConfig;
use tracing::warn;

pub const ENV_CONFIG_PATH: &str = "PULSESIM_CONFIG";
pub const ENV_PORT: &str = "PULSESIM_PORT";
pub const ENV_DB_PATH: &str = "PULSESIM_DB_PATH";
pub const ENV_AUTH_ENABLED: &str = "PULSESIM_AUTH_ENABLED";

/// Apply `PULSESIM_*` environment variables on top of file config
pub fn apply_env_overrides(config: &mut PulseConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup. Unparseable values are logged
/// and ignored.
pub fn apply_overrides_from<F>(config: &mut PulseConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(ENV_PORT) {
        match v.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %v, "Ignoring invalid {}", ENV_PORT),
        }
    }
    if let Some(v) = lookup(ENV_DB_PATH) {
        if !v.is_empty() {
            config.storage.db_path = v;
        }
    }
    if let Some(v) = lookup(ENV_AUTH_ENABLED) {
        match v.parse::<bool>() {
            Ok(enabled) => config.auth.enabled = enabled,
            Err(_) => warn!(value = %v, "Ignoring invalid {}", ENV_AUTH_ENABLED),
        }
    }
}

/// Config file path from the environment, falling back to `default`
pub fn config_path_from_env(default: &str) -> String {
    std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = PulseConfig::default();
        apply_overrides_from(
            &mut config,
            lookup(&[
                (ENV_PORT, "4100"),
                (ENV_DB_PATH, "/var/lib/pulsesim/readings.db"),
                (ENV_AUTH_ENABLED, "true"),
            ]),
        );

        assert_eq!(config.server.port, 4100);
        assert_eq!(config.storage.db_path, "/var/lib/pulsesim/readings.db");
        assert!(config.auth.enabled);
    }

    #[test]
    fn test_invalid_values_keep_file_config() {
        let mut config = PulseConfig::default();
        apply_overrides_from(
            &mut config,
            lookup(&[(ENV_PORT, "http"), (ENV_AUTH_ENABLED, "yes"), (ENV_DB_PATH, "")]),
        );

        assert_eq!(config.server.port, 3000);
        assert!(!config.auth.enabled);
        assert_eq!(config.storage.db_path, "pulsesim.db");
    }
}
