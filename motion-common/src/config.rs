//! Configuration loading and resolution
//!
//! Bootstrap configuration comes from a TOML file. Every field has a built-in
//! default, so a missing file only produces a warning. The file is located in
//! priority order:
//! 1. Explicit path (command-line argument)
//! 2. `MOTION_RELAY_CONFIG` environment variable
//! 3. User config directory (`<config_dir>/motion-relay/config.toml`)
//! 4. System-wide `/etc/motion-relay/config.toml` (Linux)
//!
//! Command-line overrides are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::framing::{DEFAULT_ANCHOR, DEFAULT_MAX_FRAME_LEN};
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MOTION_RELAY_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub serial: SerialConfig,
    pub framing: FramingConfig,
    pub debounce: DebounceConfig,
    pub dispatch: DispatchConfig,
    pub notify: NotifyConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Scanner serial link
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path or port name (e.g. `/dev/ttyUSB0`, `COM6`)
    pub port: String,
    pub baud_rate: u32,
    /// Per-byte read timeout
    pub read_timeout_ms: u64,
    /// Written once after connecting to start scanning
    pub activation_command: String,
    /// Pause between opening the port and sending the activation command
    pub activation_delay_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: 921_600,
            read_timeout_ms: 1000,
            activation_command: r#"{"message-type":1040,"data":{"scan-switch":1}}"#.to_string(),
            activation_delay_ms: 1000,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn activation_delay(&self) -> Duration {
        Duration::from_millis(self.activation_delay_ms)
    }
}

/// Frame extraction
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Literal prefix that starts a frame
    pub anchor: String,
    /// Frames longer than this are discarded
    pub max_frame_len: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            anchor: DEFAULT_ANCHOR.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Motion debounce
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Seconds a tag keeps reporting motion after it goes still
    pub still_threshold_secs: f64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            still_threshold_secs: 4.0,
        }
    }
}

impl DebounceConfig {
    /// Grace window as a `Duration`; fails for negative, non-finite or out-of-range seconds
    pub fn still_threshold(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.still_threshold_secs).map_err(|e| {
            Error::Config(format!(
                "debounce.still_threshold_secs must be a non-negative number of seconds, got {}: {}",
                self.still_threshold_secs, e
            ))
        })
    }
}

/// Change dispatch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub poll_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 500 }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Downstream notification sinks
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// `host:port` receiving one datagram per change
    pub udp_destination: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            udp_destination: "127.0.0.1:5005".to_string(),
        }
    }
}

/// HTTP / SSE server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5010,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_serial_port() -> String {
    if cfg!(target_os = "windows") {
        "COM6".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

impl RelayConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load and validate a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file and load it, falling back to defaults
    ///
    /// An explicitly named file that is missing is an error; a missing file
    /// at a default location is not.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            info!("Loading configuration from {}", path.display());
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            info!("Loading configuration from {} (${})", path.display(), CONFIG_ENV_VAR);
            return Self::from_file(&path);
        }

        match default_config_path() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check values the rest of the system relies on
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(Error::Config("serial.port must not be empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::Config("serial.baud_rate must be positive".to_string()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(Error::Config("serial.read_timeout_ms must be positive".to_string()));
        }

        self.debounce.still_threshold()?;

        if self.dispatch.poll_interval_ms == 0 {
            return Err(Error::Config("dispatch.poll_interval_ms must be positive".to_string()));
        }

        if self.notify.udp_destination.trim().is_empty() {
            return Err(Error::Config("notify.udp_destination must not be empty".to_string()));
        }

        // The framer owns the anchor rules
        crate::framing::FrameExtractor::new(&self.framing.anchor, self.framing.max_frame_len)?;

        Ok(())
    }
}

/// First existing config file at a default location
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("motion-relay").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/motion-relay/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.baud_rate, 921_600);
        assert_eq!(config.framing.anchor, "{\"message-type\":3070");
        assert_eq!(config.framing.max_frame_len, 5000);
        assert_eq!(config.debounce.still_threshold().unwrap(), Duration::from_secs(4));
        assert_eq!(config.dispatch.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.http.port, 5010);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RelayConfig::from_toml_str(
            r#"
            [serial]
            port = "/dev/ttyACM1"

            [debounce]
            still_threshold_secs = 2.5
            "#,
        )
        .unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 921_600);
        assert_eq!(config.debounce.still_threshold().unwrap(), Duration::from_millis(2500));
        assert_eq!(config.notify.udp_destination, "127.0.0.1:5005");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = RelayConfig::from_toml_str("[serial\nport=").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_huge_threshold_rejected_without_panic() {
        let mut config = RelayConfig::default();
        config.debounce.still_threshold_secs = 1e20;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(config.debounce.still_threshold().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RelayConfig::default();
        config.debounce.still_threshold_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.debounce.still_threshold_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.debounce.still_threshold_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.dispatch.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.framing.anchor = "message-type".to_string();
        assert!(config.validate().is_err());
    }
}
