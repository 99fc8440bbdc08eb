use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "STABBY_CONFIG";
const CONFIG_FILE: &str = "stabby_config.yaml";

const DEFAULT_PORT: u16 = 22;
const DEFAULT_USER: &str = "root";
const DEFAULT_CONNECT_TIMEOUT: u64 = 30;

/// One configured remote target.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct HostRecord {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, rename = "desc", alias = "description")]
    pub description: String,
    #[serde(default, rename = "password", alias = "secret")]
    pub secret: String,
    #[serde(default = "default_user")]
    pub user: String,
}

impl HostRecord {
    pub fn new(host: impl Into<String>, port: u16, description: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            description: description.into(),
            secret: String::new(),
            user: default_user(),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// `host:port`, as used for logging and error reports.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// The secret never ends up in logs.
impl fmt::Debug for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRecord")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("description", &self.description)
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT
}

/// Pseudo-terminal parameters sent with the pty request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PtySettings {
    pub term: String,
    pub rows: u16,
    pub cols: u16,
    pub echo: bool,
    pub speed: u32,
}

impl Default for PtySettings {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            rows: 32,
            cols: 160,
            echo: false,
            speed: 14400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub servers: Vec<HostRecord>,
    #[serde(default)]
    pub pty: PtySettings,
    /// Seconds; zero disables the timeout.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Config {
    /// `$STABBY_CONFIG` if set, `~/.ssh/stabby_config.yaml` otherwise.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".ssh").join(CONFIG_FILE))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), servers = config.servers.len(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;

        if let Some((index, host)) = config
            .servers
            .iter()
            .enumerate()
            .find(|(_, host)| host.port == 0)
        {
            return Err(ConfigError::InvalidPort {
                index,
                host: host.host.clone(),
            });
        }
        if config.servers.is_empty() {
            warn!("config lists no servers");
        }

        Ok(config)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
