//! Configuration system for Pelotari
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PELOTARI_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values
//!
//! The protocol core only ever sees a [`ProtocolConfig`], which is built and
//! validated once and never changes afterwards.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{
    BROADCAST_PORT, DEFAULT_BROADCAST_INTERVAL, DEFAULT_MAX_PEERS, DEFAULT_READ_TIMEOUT,
    UNICAST_PORT,
};

// ─────────────────────────────────────────────────────────────────
// Protocol Config
// ─────────────────────────────────────────────────────────────────

/// Immutable parameters of a running protocol instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    max_peers: usize,
    broadcast_interval: Duration,
    unicast_port: u16,
}

impl ProtocolConfig {
    /// Create a config, rejecting a zero peer bound or a zero interval
    pub fn new(max_peers: usize, broadcast_interval: Duration) -> Result<Self> {
        if max_peers == 0 {
            return Err(Error::config_field_invalid(
                "max_peers",
                "max_peers must be at least 1",
            ));
        }
        if broadcast_interval.is_zero() {
            return Err(Error::config_field_invalid(
                "broadcast_interval_ms",
                "broadcast interval must be positive",
            ));
        }
        Ok(Self {
            max_peers,
            broadcast_interval,
            unicast_port: UNICAST_PORT,
        })
    }

    /// Use a non-standard unicast port when replying to peers
    pub fn with_unicast_port(mut self, port: u16) -> Self {
        self.unicast_port = port;
        self
    }

    /// Maximum number of peers the registry accepts
    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Time between discovery broadcasts
    pub fn broadcast_interval(&self) -> Duration {
        self.broadcast_interval
    }

    /// Port peers listen on for unicast handshake messages
    pub fn unicast_port(&self) -> u16 {
        self.unicast_port
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_peers: DEFAULT_MAX_PEERS,
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            unicast_port: UNICAST_PORT,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Node Config (file + environment)
// ─────────────────────────────────────────────────────────────────

/// Main node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Discovery protocol parameters
    pub protocol: ProtocolSettings,

    /// Interface and socket settings
    pub network: NetworkSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Discovery protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Maximum number of peers to register
    pub max_peers: usize,

    /// Interval between discovery broadcasts in milliseconds
    pub broadcast_interval_ms: u64,
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Only use this interface (None = first interface with a private IPv4)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    /// UDP port for discovery broadcasts
    pub broadcast_port: u16,

    /// UDP port for unicast handshake messages
    pub unicast_port: u16,

    /// Upper bound on a single socket read in milliseconds
    pub read_timeout_ms: u64,
}

impl NetworkSettings {
    /// Socket read timeout as a Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            max_peers: DEFAULT_MAX_PEERS,
            broadcast_interval_ms: DEFAULT_BROADCAST_INTERVAL.as_millis() as u64,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            interface: None,
            broadcast_port: BROADCAST_PORT,
            unicast_port: UNICAST_PORT,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl NodeConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("pelotari.toml"),
            dirs::config_dir()
                .map(|p| p.join("pelotari").join("node.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".pelotari").join("node.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/pelotari/node.toml"),
        ];

        for path in &search_paths {
            if path.is_file() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(n) = env_parse("PELOTARI_MAX_PEERS") {
            self.protocol.max_peers = n;
        }
        if let Some(n) = env_parse("PELOTARI_BROADCAST_INTERVAL_MS") {
            self.protocol.broadcast_interval_ms = n;
        }

        if let Ok(val) = std::env::var("PELOTARI_INTERFACE") {
            self.network.interface = Some(val);
        }
        if let Some(n) = env_parse("PELOTARI_BROADCAST_PORT") {
            self.network.broadcast_port = n;
        }
        if let Some(n) = env_parse("PELOTARI_UNICAST_PORT") {
            self.network.unicast_port = n;
        }
        if let Some(n) = env_parse("PELOTARI_READ_TIMEOUT_MS") {
            self.network.read_timeout_ms = n;
        }

        if let Ok(val) = std::env::var("PELOTARI_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PELOTARI_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PELOTARI_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Reuse the core constructor so file and API share one rule set
        self.protocol_config()?;

        if self.network.read_timeout_ms == 0 {
            return Err(Error::config_field_invalid(
                "read_timeout_ms",
                "read_timeout_ms must be positive",
            ));
        }
        if self.network.broadcast_port == 0 || self.network.unicast_port == 0 {
            return Err(Error::config_validation("UDP ports must be non-zero"));
        }
        if self.network.broadcast_port == self.network.unicast_port {
            return Err(Error::config_validation(format!(
                "broadcast_port and unicast_port must differ (both are {})",
                self.network.broadcast_port
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Build the immutable protocol config from these settings
    pub fn protocol_config(&self) -> Result<ProtocolConfig> {
        Ok(ProtocolConfig::new(
            self.protocol.max_peers,
            Duration::from_millis(self.protocol.broadcast_interval_ms),
        )?
        .with_unicast_port(self.network.unicast_port))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pelotari")
                .join("node.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    format!(
        r#"# Pelotari node configuration

[protocol]
# Maximum number of peers this node registers. Once reached, the node
# stops broadcasting discovery messages.
max_peers = {max_peers}

# Time between discovery broadcasts in milliseconds
broadcast_interval_ms = {interval}

[network]
# Restrict discovery to one interface (default: first private IPv4)
# interface = "wlan0"

# UDP port for discovery broadcasts
broadcast_port = {bport}

# UDP port for unicast handshake messages
unicast_port = {uport}

# Upper bound on a single socket read in milliseconds
read_timeout_ms = {read_timeout}

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.pelotari/logs/node.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#,
        max_peers = DEFAULT_MAX_PEERS,
        interval = DEFAULT_BROADCAST_INTERVAL.as_millis(),
        bport = BROADCAST_PORT,
        uport = UNICAST_PORT,
        read_timeout = DEFAULT_READ_TIMEOUT.as_millis(),
    )
}
