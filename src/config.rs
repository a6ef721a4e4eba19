//! Configuration module
//!
//! TOML file at `~/.config/fuel-telemetry/config.toml`. Every section and
//! field is optional; missing values take the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::interfaces::pts::{PtsClientConfig, DEFAULT_CANDIDATE_PATHS};
use crate::application::{AtgSettings, DetectorSettings, PtsSettings};
use crate::infrastructure::DatabaseConfig;
use crate::shared::errors::InfraError;
use crate::shared::utills::retry::RetryConfig;

const APP_DIR: &str = "fuel-telemetry";

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSection,
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
    pub atg: AtgSection,
    pub pts: PtsSection,
    pub detector: DetectorSection,
    pub manager: ManagerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    /// Upper bound on stopping all adapters at shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            url: db.url,
            max_connections: db.max_connections,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtgSection {
    pub enabled: bool,
    pub interface_code: String,
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub poll_interval_secs: u64,
    pub persist_interval_secs: u64,
    pub tank_count: u32,
    pub station_poll_interval_secs: u64,
    pub force_simulation: bool,
    pub base_volume: f64,
}

impl Default for AtgSection {
    fn default() -> Self {
        let s = AtgSettings::default();
        Self {
            enabled: true,
            interface_code: s.interface_code,
            port: s.port,
            baud_rate: s.baud_rate,
            read_timeout_ms: s.read_timeout.as_millis() as u64,
            poll_interval_secs: s.poll_interval.as_secs(),
            persist_interval_secs: s.persist_interval.as_secs(),
            tank_count: s.tank_count,
            station_poll_interval_secs: s.station_poll_interval.as_secs(),
            force_simulation: s.force_simulation,
            base_volume: s.base_volume,
        }
    }
}

impl AtgSection {
    pub fn to_settings(&self) -> AtgSettings {
        AtgSettings {
            interface_code: self.interface_code.to_ascii_uppercase(),
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            persist_interval: Duration::from_secs(self.persist_interval_secs),
            tank_count: self.tank_count,
            station_poll_interval: Duration::from_secs(self.station_poll_interval_secs),
            force_simulation: self.force_simulation,
            base_volume: self.base_volume,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PtsSection {
    pub enabled: bool,
    pub interface_code: String,
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub candidate_paths: Vec<String>,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
    pub probe_poll_interval_secs: u64,
    pub transaction_poll_interval_secs: u64,
    pub time_check_interval_secs: u64,
    pub drift_threshold_secs: u64,
    /// Authoritative clock; the host clock is used when unset
    pub time_source_url: Option<String>,
    pub station_poll_interval_secs: u64,
    pub transaction_lookback_hours: u64,
    pub force_simulation: bool,
    pub simulated_probes: u32,
    pub base_volume: f64,
}

impl Default for PtsSection {
    fn default() -> Self {
        let s = PtsSettings::default();
        Self {
            enabled: true,
            interface_code: s.interface_code,
            base_url: s.client.base_url,
            username: s.client.username,
            password: s.client.password,
            candidate_paths: DEFAULT_CANDIDATE_PATHS.iter().map(|p| p.to_string()).collect(),
            request_timeout_secs: s.client.request_timeout.as_secs(),
            max_attempts: s.client.retry.max_attempts,
            retry_delay_secs: s.client.retry.initial_delay.as_secs(),
            max_retry_delay_secs: s.client.retry.max_delay.as_secs(),
            probe_poll_interval_secs: s.probe_poll_interval.as_secs(),
            transaction_poll_interval_secs: s.transaction_poll_interval.as_secs(),
            time_check_interval_secs: s.time_check_interval.as_secs(),
            drift_threshold_secs: s.drift_threshold.as_secs(),
            time_source_url: Some("https://worldtimeapi.org/api/timezone/Etc/UTC".to_string()),
            station_poll_interval_secs: s.station_poll_interval.as_secs(),
            transaction_lookback_hours: s.transaction_lookback.as_secs() / 3600,
            force_simulation: s.force_simulation,
            simulated_probes: s.simulated_probes,
            base_volume: s.base_volume,
        }
    }
}

impl PtsSection {
    pub fn to_settings(&self) -> PtsSettings {
        PtsSettings {
            interface_code: self.interface_code.to_ascii_uppercase(),
            client: PtsClientConfig {
                base_url: self.base_url.trim_end_matches('/').to_string(),
                username: self.username.clone(),
                password: self.password.clone(),
                candidate_paths: self.candidate_paths.clone(),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                retry: RetryConfig::linear(
                    self.max_attempts,
                    Duration::from_secs(self.retry_delay_secs),
                    Duration::from_secs(self.max_retry_delay_secs),
                ),
            },
            probe_poll_interval: Duration::from_secs(self.probe_poll_interval_secs),
            transaction_poll_interval: Duration::from_secs(self.transaction_poll_interval_secs),
            time_check_interval: Duration::from_secs(self.time_check_interval_secs),
            drift_threshold: Duration::from_secs(self.drift_threshold_secs),
            station_poll_interval: Duration::from_secs(self.station_poll_interval_secs),
            transaction_lookback: Duration::from_secs(self.transaction_lookback_hours * 3600),
            force_simulation: self.force_simulation,
            simulated_probes: self.simulated_probes,
            base_volume: self.base_volume,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSection {
    pub refill_threshold: f64,
    pub anomaly_threshold: f64,
    pub refill_window_hours: u64,
}

impl Default for DetectorSection {
    fn default() -> Self {
        let s = DetectorSettings::default();
        Self {
            refill_threshold: s.refill_threshold,
            anomaly_threshold: s.anomaly_threshold,
            refill_window_hours: s.refill_window.as_secs() / 3600,
        }
    }
}

impl DetectorSection {
    pub fn to_settings(&self) -> DetectorSettings {
        DetectorSettings {
            refill_threshold: self.refill_threshold,
            anomaly_threshold: self.anomaly_threshold,
            refill_window: Duration::from_secs(self.refill_window_hours * 3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSection {
    pub default_interface: String,
    /// Alternate code → registered interface code
    pub aliases: BTreeMap<String, String>,
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            default_interface: "ATG".to_string(),
            aliases: BTreeMap::from([("PTS".to_string(), "NFPP".to_string())]),
        }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| InfraError::Config(format!("read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, InfraError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| InfraError::Config(format!("parse: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), InfraError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| InfraError::Config(format!("create {}: {}", dir.display(), e)))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| InfraError::Config(format!("serialize: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| InfraError::Config(format!("write {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        let invalid = |msg: &str| Err(InfraError::Config(msg.to_string()));

        if !matches!(self.logging.format.to_lowercase().as_str(), "pretty" | "json") {
            return invalid("logging.format must be \"pretty\" or \"json\"");
        }
        if self.atg.poll_interval_secs == 0 || self.atg.persist_interval_secs == 0 {
            return invalid("atg intervals must be positive");
        }
        if self.atg.tank_count == 0 {
            return invalid("atg.tank_count must be positive");
        }
        if self.pts.probe_poll_interval_secs == 0
            || self.pts.transaction_poll_interval_secs == 0
            || self.pts.time_check_interval_secs == 0
        {
            return invalid("pts intervals must be positive");
        }
        if self.pts.candidate_paths.is_empty() {
            return invalid("pts.candidate_paths must not be empty");
        }
        if self.pts.max_attempts == 0 {
            return invalid("pts.max_attempts must be positive");
        }
        if self.detector.refill_threshold < 0.0 || self.detector.anomaly_threshold < 0.0 {
            return invalid("detector thresholds must not be negative");
        }
        if self.manager.default_interface.trim().is_empty() {
            return invalid("manager.default_interface must not be empty");
        }
        Ok(())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.manager.default_interface, "ATG");
        assert_eq!(config.manager.aliases.get("PTS").map(String::as_str), Some("NFPP"));
        assert_eq!(config.pts.to_settings().drift_threshold, Duration::from_secs(60));
        assert_eq!(config.atg.to_settings().poll_interval, Duration::from_secs(5));
        assert_eq!(config.detector.to_settings().refill_threshold, 500.0);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [pts]
            base_url = "http://10.0.0.5/"
            force_simulation = true

            [detector]
            anomaly_threshold = 50.0
            "#,
        )
        .unwrap();
        let pts = config.pts.to_settings();
        assert_eq!(pts.client.base_url, "http://10.0.0.5");
        assert!(pts.force_simulation);
        assert_eq!(pts.transaction_poll_interval, Duration::from_secs(300));
        assert_eq!(config.detector.anomaly_threshold, 50.0);
        assert_eq!(config.detector.refill_threshold, 500.0);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(AppConfig::from_toml("[logging]\nformat = \"xml\"").is_err());
        assert!(AppConfig::from_toml("[atg]\ntank_count = 0").is_err());
        assert!(AppConfig::from_toml("[pts]\ncandidate_paths = []").is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("fuel-telemetry-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut config = AppConfig::default();
        config.atg.port = "/dev/ttyS1".to_string();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.atg.port, "/dev/ttyS1");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_file_is_default() {
        let config = AppConfig::load(Path::new("/nonexistent/fuel-telemetry.toml")).unwrap();
        assert_eq!(config.metrics.port, 9100);
    }
}
