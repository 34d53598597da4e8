use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from hubwatch.toml.
///
/// Every key has a default, so a missing config file is valid (the daemon
/// runs with stock thresholds). Unknown keys are a startup error.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[derive(Default)]
pub struct WatchConfig {
    pub log: LogConfig,
    pub monitor: MonitorConfig,
    pub probe: ProbeConfig,
    pub process: ProcessConfig,
    pub hardware: HardwareConfig,
    pub hooks: HooksConfig,
    pub escalation: EscalationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default tracing filter when RUST_LOG is unset.
    pub level: String,
}

/// Escalation thresholds, all in minutes (one tick = one minute).
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Heartbeat age at which the hub process is killed.
    pub kill_after_mins: u32,
    /// Successful-probe ticks to skip after startup before enforcing staleness.
    pub init_grace_mins: u32,
    /// Consecutive unreadable-probe ticks before the host is rebooted.
    pub reboot_after_mins: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Executable that prints the heartbeat marker timestamp on stdout.
    pub command: String,
    pub args: Vec<String>,
    /// Upper bound on one probe invocation. Must stay below the tick period.
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessConfig {
    /// Exact process-table name of the monitored hub process.
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareConfig {
    /// Watchdog device node.
    pub device: PathBuf,
    /// Timeout programmed into the device at startup.
    pub timeout_secs: u32,
    /// Run without the hardware backstop entirely.
    pub disable: bool,
}

/// Advisory executables run before each escalation step. Exit status ignored.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HooksConfig {
    pub before_kill: PathBuf,
    pub before_reboot: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EscalationConfig {
    pub reboot_command: String,
    pub reboot_args: Vec<String>,
}

// --- Default implementations ---

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            kill_after_mins: 3,
            init_grace_mins: 20,
            reboot_after_mins: 60,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command: "/usr/libexec/hubwatch/query-heartbeat".to_string(),
            args: vec![],
            timeout_secs: 30,
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            name: "hubcore".to_string(),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/watchdog"),
            timeout_secs: 256,
            disable: false,
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            before_kill: PathBuf::from("/usr/libexec/hubwatch/before-kill"),
            before_reboot: PathBuf::from("/usr/libexec/hubwatch/before-reboot"),
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            reboot_command: "/sbin/reboot".to_string(),
            reboot_args: vec![],
        }
    }
}

/// Errors that can occur while loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file exists but is not valid TOML (or has unknown keys).
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load configuration from `path`. A missing file yields the defaults;
/// an unreadable or malformed file is an error.
pub fn load(path: &Path) -> Result<WatchConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(WatchConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
