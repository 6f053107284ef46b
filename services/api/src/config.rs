use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// Mount point of the command endpoints when `COMMANDS_PATH` is unset.
pub const DEFAULT_COMMANDS_PATH: &str = "/api/commands";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How accepted batches are executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run the batch inside the request and answer `200 OK` when done.
    Sync,
    /// Queue the batch for the worker pool and answer `202 Accepted` at once.
    Async,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sync" => Ok(ExecutionMode::Sync),
            "async" => Ok(ExecutionMode::Async),
            other => Err(format!("'{}' is not one of 'sync' or 'async'", other)),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sync => write!(f, "sync"),
            ExecutionMode::Async => write!(f, "async"),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub robot_host: String,
    pub robot_port: u16,
    pub offline_mode: bool,
    pub execution_mode: ExecutionMode,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub retained_jobs: usize,
    pub tts_service: String,
    pub commands_path: String,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            robot_host: "192.168.2.196".to_string(),
            robot_port: 9559,
            offline_mode: true,
            execution_mode: ExecutionMode::Async,
            worker_count: 1,
            queue_capacity: 64,
            retained_jobs: 256,
            tts_service: "ALTextToSpeech".to_string(),
            commands_path: DEFAULT_COMMANDS_PATH.to_string(),
            log_level: Level::INFO,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a boolean", raw),
            )),
        },
        Err(_) => Ok(default),
    }
}

fn at_least_one(name: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let defaults = Config::default();

        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let robot_host = std::env::var("ROBOT_HOST").unwrap_or(defaults.robot_host);
        if robot_host.trim().is_empty() {
            return Err(ConfigError::MissingVar(
                "ROBOT_HOST must not be empty".to_string(),
            ));
        }
        let robot_port = parse_var("ROBOT_PORT", defaults.robot_port)?;
        let offline_mode = parse_bool("OFFLINE_MODE", defaults.offline_mode)?;
        let execution_mode = parse_var("EXECUTION_MODE", defaults.execution_mode)?;
        let worker_count = at_least_one(
            "WORKER_COUNT",
            parse_var("WORKER_COUNT", defaults.worker_count)?,
        )?;
        let queue_capacity = at_least_one(
            "QUEUE_CAPACITY",
            parse_var("QUEUE_CAPACITY", defaults.queue_capacity)?,
        )?;
        let retained_jobs = parse_var("RETAINED_JOBS", defaults.retained_jobs)?;
        let tts_service = std::env::var("TTS_SERVICE").unwrap_or(defaults.tts_service);

        let commands_path = std::env::var("COMMANDS_PATH").unwrap_or(defaults.commands_path);
        let path_chars_ok = commands_path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'));
        if !commands_path.starts_with('/')
            || commands_path.len() < 2
            || commands_path.ends_with('/')
            || !path_chars_ok
        {
            return Err(ConfigError::InvalidValue(
                "COMMANDS_PATH".to_string(),
                format!(
                    "'{}' must start with '/', not end with '/', and use only [A-Za-z0-9/._-]",
                    commands_path
                ),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            robot_host,
            robot_port,
            offline_mode,
            execution_mode,
            worker_count,
            queue_capacity,
            retained_jobs,
            tts_service,
            commands_path,
            log_level,
        })
    }
}
