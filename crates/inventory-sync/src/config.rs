//! # Capture Configuration
//!
//! Configuration for the inventory service endpoints, sync pacing and
//! triggers, and local storage.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     INVENTORY_API_URL=https://inventory.example/api                    │
//! │     INVENTORY_PACING_MS=500                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/inventory-capture/capture.toml (Linux)                   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     generated device id, 5 s probe, 300 ms pacing, 15 min periodic    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Tablet 3"
//!
//! [remote]
//! base_url = "http://www.intranet.gamadero.cdmx.gob.mx/INVENTARIOGAM/public/api"
//! create_path = "inventariocomputo/Create"
//! probe_path = "inventariocomputo"
//! probe_timeout_secs = 5
//! request_timeout_secs = 30
//!
//! [sync]
//! pacing_ms = 300
//! periodic_interval_secs = 900   # 0 disables the periodic trigger
//! sync_on_reconnect = true
//! network_poll_secs = 30
//!
//! [storage]
//! database_path = "/var/lib/inventory-capture/capture.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// Inventory service used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str =
    "http://www.intranet.gamadero.cdmx.gob.mx/INVENTARIOGAM/public/api";

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4), generated on first run.
    pub id: String,

    /// Human-readable device name.
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Capture Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Where the inventory service lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the inventory API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path (relative to `base_url`) of the single-record create call.
    #[serde(default = "default_create_path")]
    pub create_path: String,

    /// Path (relative to `base_url`) probed for reachability.
    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// Reachability probe timeout (seconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Create call timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_create_path() -> String {
    "inventariocomputo/Create".to_string()
}
fn default_probe_path() -> String {
    "inventariocomputo".to_string()
}
fn default_probe_timeout() -> u64 {
    5
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: default_base_url(),
            create_path: default_create_path(),
            probe_path: default_probe_path(),
            probe_timeout_secs: default_probe_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RemoteSettings {
    /// Resolves a path against the base URL.
    ///
    /// The base is treated as a directory even without a trailing slash, so
    /// `.../public/api` + `inventariocomputo` keeps the `api` segment.
    pub fn endpoint(&self, path: &str) -> SyncResult<Url> {
        let mut base = self.base_url.trim_end_matches('/').to_string();
        base.push('/');
        Ok(Url::parse(&base)?.join(path.trim_start_matches('/'))?)
    }

    pub fn create_url(&self) -> SyncResult<Url> {
        self.endpoint(&self.create_path)
    }

    pub fn probe_url(&self) -> SyncResult<Url> {
        self.endpoint(&self.probe_path)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Pacing and trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Delay between consecutive create calls in a pass (milliseconds).
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,

    /// Periodic sync interval while online (seconds). 0 disables it.
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_secs: u64,

    /// Start a pass when the device goes from offline to online.
    #[serde(default = "default_true")]
    pub sync_on_reconnect: bool,

    /// How often the agent probes to refresh the network signal (seconds).
    #[serde(default = "default_network_poll")]
    pub network_poll_secs: u64,
}

fn default_pacing() -> u64 {
    300
}
fn default_periodic_interval() -> u64 {
    900
}
fn default_true() -> bool {
    true
}
fn default_network_poll() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            pacing_ms: default_pacing(),
            periodic_interval_secs: default_periodic_interval(),
            sync_on_reconnect: default_true(),
            network_poll_secs: default_network_poll(),
        }
    }
}

impl SyncSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Periodic interval, or `None` when the periodic trigger is disabled.
    pub fn periodic_interval(&self) -> Option<Duration> {
        (self.periodic_interval_secs > 0).then(|| Duration::from_secs(self.periodic_interval_secs))
    }

    pub fn network_poll(&self) -> Duration {
        Duration::from_secs(self.network_poll_secs)
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Local storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file holding the queue and the counters.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete capture configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (capture.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading capture config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load capture config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Capture config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        let base = Url::parse(&self.remote.base_url)?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Service URL must start with http:// or https://, got: {}",
                self.remote.base_url
            )));
        }
        self.remote.create_url()?;
        self.remote.probe_url()?;

        if self.remote.probe_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "probe_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.remote.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.sync.network_poll_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "network_poll_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("INVENTORY_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(url) = lookup("INVENTORY_API_URL") {
            debug!(url = %url, "Overriding service URL from environment");
            self.remote.base_url = url;
        }

        if let Some(raw) = lookup("INVENTORY_PROBE_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => self.remote.probe_timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid INVENTORY_PROBE_TIMEOUT_SECS"),
            }
        }

        if let Some(raw) = lookup("INVENTORY_PACING_MS") {
            match raw.parse() {
                Ok(ms) => self.sync.pacing_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid INVENTORY_PACING_MS"),
            }
        }

        if let Some(raw) = lookup("INVENTORY_SYNC_INTERVAL_SECS") {
            match raw.parse() {
                Ok(secs) => self.sync.periodic_interval_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid INVENTORY_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(path) = lookup("INVENTORY_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("mx", "gamadero", "inventory-capture")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("capture.toml"))
    }

    /// Database path, falling back to the platform data directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage.database_path.clone().or_else(|| {
            Self::project_dirs().map(|dirs| dirs.data_dir().join("capture.db"))
        })
    }

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty());
        assert_eq!(config.remote.probe_timeout_secs, 5);
        assert_eq!(config.sync.pacing_ms, 300);
        assert_eq!(config.sync.periodic_interval(), Some(Duration::from_secs(900)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let remote = RemoteSettings::default();
        assert_eq!(
            remote.create_url().unwrap().as_str(),
            "http://www.intranet.gamadero.cdmx.gob.mx/INVENTARIOGAM/public/api/inventariocomputo/Create"
        );

        let remote = RemoteSettings {
            base_url: "http://127.0.0.1:8080/api/".into(),
            probe_path: "/inventariocomputo".into(),
            ..RemoteSettings::default()
        };
        assert_eq!(
            remote.probe_url().unwrap().as_str(),
            "http://127.0.0.1:8080/api/inventariocomputo"
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.remote.base_url = "ftp://files.example".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.remote.base_url = "not a url".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.remote.base_url = "https://inventory.example/api".into();
        config.remote.probe_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        config.remote.probe_timeout_secs = 5;
        config.device.id = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("INVENTORY_API_URL", "https://inventory.example/api"),
            ("INVENTORY_PACING_MS", "50"),
            ("INVENTORY_SYNC_INTERVAL_SECS", "0"),
            ("INVENTORY_PROBE_TIMEOUT_SECS", "soon"),
            ("INVENTORY_DB_PATH", "/tmp/capture.db"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.remote.base_url, "https://inventory.example/api");
        assert_eq!(config.sync.pacing(), Duration::from_millis(50));
        assert_eq!(config.sync.periodic_interval(), None);
        assert_eq!(config.remote.probe_timeout_secs, 5);
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/capture.db")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("capture.toml");

        let mut config = SyncConfig::default();
        config.device.name = "Tablet 3".into();
        config.sync.pacing_ms = 750;
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.device.id, config.device.id);
        assert_eq!(loaded.device.name, "Tablet 3");
        assert_eq!(loaded.sync.pacing_ms, 750);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [device]
            id = "dev-1"

            [sync]
            pacing_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.device.name, "Capture Device");
        assert_eq!(config.sync.pacing_ms, 100);
        assert!(config.sync.sync_on_reconnect);
        assert_eq!(config.remote.create_path, "inventariocomputo/Create");
    }
}
