//! Network health monitor configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Resolvers tried in order by the internet probe
    pub dns_servers: Vec<String>,
    pub dns_port: u16,
    pub connect_timeout_seconds: u64,
    pub ping_timeout_seconds: u64,
    /// Snapshots retained per service
    pub history_size: usize,
}

impl NetworkConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_seconds)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 5,
            dns_servers: vec![
                "8.8.8.8".to_string(),
                "1.1.1.1".to_string(),
                "8.8.4.4".to_string(),
            ],
            dns_port: 53,
            connect_timeout_seconds: 3,
            ping_timeout_seconds: 1,
            history_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_config_defaults() {
        let config = NetworkConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.dns_servers.len(), 3);
        assert_eq!(config.dns_servers[0], "8.8.8.8");
        assert_eq!(config.dns_port, 53);
        assert_eq!(config.history_size, 100);
    }
}
