//! Agent configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/zilink/device.toml`
//! - Windows: `%APPDATA%/zilink/device.toml`
//!
//! `ZILINK_CONFIG` overrides the path. Omitting `[mqtt]` or `[http]`
//! disables that transport.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use zilink_device_link::{Credentials, LinkConfig};
use zilink_protocol::constants::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WS_PATH};
use zilink_transports::http::DEFAULT_HTTP_TIMEOUT;
use zilink_transports::mqtt::DEFAULT_MQTT_PORT;
use zilink_transports::{HttpConfig, MqttConfig, WsConfig};

/// Environment variable that overrides the config file location.
const CONFIG_ENV: &str = "ZILINK_CONFIG";

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Device identifier issued at registration (hostname by default).
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Device token issued at registration.
    #[serde(default)]
    pub auth_token: String,

    /// Interval between simulated sensor readings.
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,

    /// Telemetry payloads held while the stream is not authenticated.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delay between broker connection attempts.
    #[serde(default = "default_retry_ms")]
    pub pubsub_retry_ms: u64,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSection {
    #[serde(default = "default_stream_host")]
    pub host: String,

    /// Port 443 switches to `wss://`.
    #[serde(default = "default_stream_port")]
    pub port: u16,

    #[serde(default = "default_stream_path")]
    pub path: String,

    #[serde(default = "default_retry_ms")]
    pub reconnect_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSection {
    pub broker: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    /// Server root; device paths are appended to it.
    pub base_url: String,

    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_device_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "zilink-device".into())
}

fn default_telemetry_interval_ms() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_retry_ms() -> u64 {
    5000
}

fn default_stream_host() -> String {
    "localhost".into()
}

fn default_stream_port() -> u16 {
    8080
}

fn default_stream_path() -> String {
    DEFAULT_WS_PATH.into()
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT.as_millis() as u64
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            host: default_stream_host(),
            port: default_stream_port(),
            path: default_stream_path(),
            reconnect_ms: default_retry_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            auth_token: String::new(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
            queue_capacity: default_queue_capacity(),
            pubsub_retry_ms: default_retry_ms(),
            stream: StreamSection::default(),
            mqtt: None,
            http: None,
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration; the file holds the device token, so it is
    /// readable by the owner only.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.device_id, &self.auth_token)
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            queue_capacity: self.queue_capacity,
            pubsub_retry_interval: Duration::from_millis(self.pubsub_retry_ms),
            stream_reconnect_interval: Duration::from_millis(self.stream.reconnect_ms),
        }
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}

impl StreamSection {
    /// Endpoint only; the reconnect interval comes from
    /// [`Config::link_config`] via [`WsConfig::with_link_config`].
    pub fn ws_config(&self) -> WsConfig {
        let mut config = WsConfig::new(self.host.clone(), self.port);
        config.path = self.path.clone();
        config
    }
}

impl MqttSection {
    pub fn mqtt_config(&self) -> MqttConfig {
        MqttConfig {
            broker: self.broker.clone(),
            port: self.port,
            keep_alive: Duration::from_secs(self.keep_alive_secs),
        }
    }
}

impl HttpSection {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Returns the configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("zilink").join("device.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("zilink")
            .join("device.toml"))
    }
}
