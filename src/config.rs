//! Session configuration loading and construction.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse the config file.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything needed to open one server connection.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Server hostname or address.
    pub server: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional local address to bind before connecting.
    #[serde(default)]
    pub local_bind: Option<IpAddr>,
    /// Desired nickname.
    pub nick: String,
    /// Connect over TLS.
    #[serde(default)]
    pub tls: bool,
    /// Username for registration; defaults to the nickname.
    #[serde(default)]
    pub username: Option<String>,
    /// Realname for registration; defaults to the nickname.
    #[serde(default)]
    pub realname: Option<String>,
    /// Server password (PASS), if the server requires one.
    #[serde(default)]
    pub server_password: Option<String>,
    /// NickServ password, used for ghosting nick collisions.
    #[serde(default)]
    pub nickserv_password: Option<String>,
    /// Channels to join once registered.
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
    /// Explicit dialect profile name; omit to auto-detect.
    #[serde(default)]
    pub dialect: Option<String>,
    /// Rejoin a channel after being kicked from it.
    #[serde(default)]
    pub rejoin_on_kick: bool,
    /// Keep channel-name case as the server sends it.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Never attempt a NickServ GHOST on nick collision.
    #[serde(default)]
    pub suppress_ghost: bool,
    /// Disable automatic `#` prefixing of bare channel names.
    #[serde(default)]
    pub raw_channel_names: bool,
    /// Outbound flood-control settings; omit to disable throttling.
    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,
}

fn default_port() -> u16 {
    6667
}

impl SessionConfig {
    /// A minimal configuration for the given server and nickname.
    pub fn new(server: impl Into<String>, nick: impl Into<String>) -> Self {
        SessionConfig {
            server: server.into(),
            port: default_port(),
            local_bind: None,
            nick: nick.into(),
            tls: false,
            username: None,
            realname: None,
            server_password: None,
            nickserv_password: None,
            channels: Vec::new(),
            dialect: None,
            rejoin_on_kick: false,
            case_sensitive: false,
            suppress_ghost: false,
            raw_channel_names: false,
            throttle: None,
        }
    }

    /// Load a configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Add a channel without a key.
    pub fn channel(mut self, name: impl Into<String>) -> Self {
        self.channels.push(ChannelEntry::Bare(name.into()));
        self
    }

    /// Add a channel with a join key.
    pub fn channel_with_key(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.channels.push(ChannelEntry::Keyed {
            name: name.into(),
            key: Some(key.into()),
        });
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// One configured channel: either a bare name or a name with a join key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChannelEntry {
    /// Channel with no key.
    Bare(String),
    /// Channel with an optional key.
    Keyed {
        /// Channel name.
        name: String,
        /// Join key.
        #[serde(default)]
        key: Option<String>,
    },
}

impl ChannelEntry {
    /// The channel name as configured (not yet normalized).
    pub fn name(&self) -> &str {
        match self {
            ChannelEntry::Bare(name) => name,
            ChannelEntry::Keyed { name, .. } => name,
        }
    }

    /// The join key, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ChannelEntry::Bare(_) => None,
            ChannelEntry::Keyed { key, .. } => key.as_deref(),
        }
    }
}

/// Pacing settings for the outbound flood-control queue.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Seconds to sleep between transmissions.
    #[serde(default = "default_rate")]
    pub rate_secs: f64,
    /// Queue capacity; enqueues beyond it are silently dropped.
    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

fn default_rate() -> f64 {
    1.0
}

fn default_threshold() -> usize {
    20
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            rate_secs: default_rate(),
            threshold: default_threshold(),
        }
    }
}

impl ThrottleConfig {
    /// The pacing interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.rate_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            server = "irc.example.com"
            port = 6697
            nick = "leafbot"
            tls = true
            nickserv_password = "hunter2"
            rejoin_on_kick = true
            channels = [
                "room",
                { name = "#secret", key = "sesame" },
            ]

            [throttle]
            rate_secs = 0.5
            threshold = 10
        "#;
        let config: SessionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server, "irc.example.com");
        assert_eq!(config.port, 6697);
        assert!(config.tls);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].name(), "room");
        assert_eq!(config.channels[0].key(), None);
        assert_eq!(config.channels[1].name(), "#secret");
        assert_eq!(config.channels[1].key(), Some("sesame"));
        let throttle = config.throttle.unwrap();
        assert_eq!(throttle.threshold, 10);
        assert_eq!(throttle.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            server = "irc.example.com"
            nick = "leafbot"
        "#,
        )
        .unwrap();
        assert_eq!(config.port, 6667);
        assert!(!config.tls);
        assert!(config.channels.is_empty());
        assert!(config.throttle.is_none());
        assert!(!config.rejoin_on_kick);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new("irc.example.com", "leafbot")
            .port(7000)
            .channel("room")
            .channel_with_key("#secret", "sesame");
        assert_eq!(config.port, 7000);
        assert_eq!(config.channels[1].key(), Some("sesame"));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server = \"irc.example.com\"\nnick = \"leafbot\"").unwrap();
        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.nick, "leafbot");

        assert!(matches!(
            SessionConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
