use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const USAGE: &str = "Usage:\n  hostpulse-agent [options] [server_url] [interval_seconds]\n\nArguments:\n  server_url            collection endpoint (default: http://localhost:8080/metrics)\n  interval_seconds      seconds between samples (default: 5)\n\nOptions:\n  --config <path>       TOML config file; positional arguments override it\n  -h, --help            show this help";

/// Fatal configuration problems. Any of these stops the agent before the
/// first sample is taken.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid interval '{value}': {reason}")]
    InvalidInterval { value: String, reason: String },

    #[error("invalid server url '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("send timeout must be greater than 0")]
    ZeroTimeout,

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("unexpected extra argument: {0}")]
    TooManyArguments(String),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
    /// Per-request timeout for the HTTP POST
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    /// Overrides the system hostname in every record
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
    /// Mount point whose usage is reported as `disk_usage`
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,
}

fn default_server_url() -> String {
    "http://localhost:8080/metrics".to_string()
}

fn default_collection_interval() -> u64 {
    5
}

fn default_send_timeout() -> u64 {
    5
}

fn default_proc_root() -> PathBuf {
    PathBuf::from(hostpulse_collector::reader::DEFAULT_PROC_ROOT)
}

fn default_disk_mount() -> PathBuf {
    PathBuf::from(hostpulse_collector::reader::DEFAULT_DISK_MOUNT)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            collection_interval_secs: default_collection_interval(),
            send_timeout_secs: default_send_timeout(),
            hostname: None,
            proc_root: default_proc_root(),
            disk_mount: default_disk_mount(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Checks the values a bad file or argument could have broken.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval {
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.send_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let url = reqwest::Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidUrl {
            value: self.server_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                value: self.server_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(())
    }

    /// The configured override, else the system hostname, else `"unknown"`.
    pub fn resolve_hostname(&self) -> String {
        self.hostname
            .clone()
            .filter(|h| !h.trim().is_empty())
            .or_else(sysinfo::System::host_name)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, PartialEq)]
pub enum CliAction {
    Run(AgentConfig),
    Help,
}

/// Parses `[--config <path>] [server_url] [interval_seconds]`.
///
/// The interval must be a positive integer; it is never silently defaulted
/// once given.
pub fn parse_args<I>(args: I) -> Result<CliAction, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_path: Option<String> = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "--config" => {
                config_path = Some(args.next().ok_or(ConfigError::MissingValue("--config"))?);
            }
            flag if flag.starts_with("--") => {
                return Err(ConfigError::UnknownArgument(flag.to_string()));
            }
            value => positional.push(value.to_string()),
        }
    }

    let mut config = match &config_path {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };

    let mut positional = positional.into_iter();
    if let Some(url) = positional.next() {
        config.server_url = url;
    }
    if let Some(interval) = positional.next() {
        config.collection_interval_secs = parse_interval(&interval)?;
    }
    if let Some(extra) = positional.next() {
        return Err(ConfigError::TooManyArguments(extra));
    }

    config.validate()?;
    Ok(CliAction::Run(config))
}

fn parse_interval(value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidInterval {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
