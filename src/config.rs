//! Runtime configuration.
//!
//! Built once at startup from the environment (`.env` is honoured) and then
//! overridden by command line flags. Everything downstream receives it by
//! reference, there is no global configuration.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIBREOFFICE_PATH: &str = "soffice";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_PARALLEL_LETTERS: usize = 2;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// What to do when a recipient lacks a field referenced by the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// The recipient is reported as failed and no file is written for it.
    #[default]
    Fail,
    /// The placeholder is replaced with an empty string.
    Blank,
    /// The placeholder is left in the document untouched.
    Literal,
}

impl FromStr for MissingFieldPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "blank" | "empty" => Ok(Self::Blank),
            "literal" | "keep" => Ok(Self::Literal),
            other => Err(format!(
                "unknown missing field policy '{other}' (expected fail, blank or literal)"
            )),
        }
    }
}

impl fmt::Display for MissingFieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fail => "fail",
            Self::Blank => "blank",
            Self::Literal => "literal",
        };
        f.write_str(name)
    }
}

/// Fate of the DOCX written before a PDF pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntermediatePolicy {
    /// Written to a scratch directory that is removed once the batch ends.
    #[default]
    Discard,
    /// Written next to the PDF and reported in the recipient outcome.
    Keep,
}

impl FromStr for IntermediatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" | "delete" => Ok(Self::Discard),
            "keep" | "retain" => Ok(Self::Keep),
            other => Err(format!(
                "unknown intermediate policy '{other}' (expected discard or keep)"
            )),
        }
    }
}

/// Settings for the external conversion tool.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Executable name or path, resolved through `PATH` when bare.
    pub libreoffice_path: PathBuf,
    pub timeout: Duration,
    /// Give each conversion its own LibreOffice user profile so concurrent
    /// invocations do not block on the shared one.
    pub isolate_profile: bool,
    /// Root for default output and upload directories.
    pub work_root: PathBuf,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            libreoffice_path: PathBuf::from(DEFAULT_LIBREOFFICE_PATH),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            isolate_profile: true,
            work_root: default_work_root(),
        }
    }
}

/// Settings for form-letter batches.
#[derive(Debug, Clone)]
pub struct LetterConfig {
    pub missing_field_policy: MissingFieldPolicy,
    pub intermediate_policy: IntermediatePolicy,
    pub max_parallel: usize,
}

impl Default for LetterConfig {
    fn default() -> Self {
        Self {
            missing_field_policy: MissingFieldPolicy::default(),
            intermediate_policy: IntermediatePolicy::default(),
            max_parallel: DEFAULT_MAX_PARALLEL_LETTERS,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                format!("http://localhost:{DEFAULT_PORT}"),
                format!("http://127.0.0.1:{DEFAULT_PORT}"),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub converter: ConverterConfig,
    pub letters: LetterConfig,
    pub server: ServerConfig,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {key}: {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl AppConfig {
    /// Read configuration from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_empty(lookup("LIBREOFFICE_PATH")) {
            config.converter.libreoffice_path = PathBuf::from(path);
        }
        if let Some(secs) = non_empty(lookup("CONVERSION_TIMEOUT_SECS")) {
            let secs: u64 = parse_value("CONVERSION_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError {
                    key: "CONVERSION_TIMEOUT_SECS",
                    message: "timeout must be at least one second".to_string(),
                });
            }
            config.converter.timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = non_empty(lookup("WORK_DIR")) {
            config.converter.work_root = PathBuf::from(dir);
        }
        if let Some(flag) = non_empty(lookup("ISOLATE_LO_PROFILE")) {
            config.converter.isolate_profile = parse_bool("ISOLATE_LO_PROFILE", &flag)?;
        }
        if let Some(policy) = non_empty(lookup("MISSING_FIELD_POLICY")) {
            config.letters.missing_field_policy = parse_value("MISSING_FIELD_POLICY", &policy)?;
        }
        if let Some(policy) = non_empty(lookup("INTERMEDIATE_POLICY")) {
            config.letters.intermediate_policy = parse_value("INTERMEDIATE_POLICY", &policy)?;
        }
        if let Some(parallel) = non_empty(lookup("MAX_PARALLEL_LETTERS")) {
            let parallel: usize = parse_value("MAX_PARALLEL_LETTERS", &parallel)?;
            config.letters.max_parallel = parallel.max(1);
        }
        if let Some(host) = non_empty(lookup("HOST")) {
            config.server.host = host;
        }
        if let Some(port) = non_empty(lookup("PORT")) {
            config.server.port = parse_value("PORT", &port)?;
        }
        if let Some(origins) = non_empty(lookup("CORS_ALLOWED_ORIGINS")) {
            config.server.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(config)
    }
}

/// `<system temp>/libreoffice_mcp`
pub fn default_work_root() -> PathBuf {
    env::temp_dir().join("libreoffice_mcp")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|err| ConfigError {
        key,
        message: err.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError {
            key,
            message: format!("'{other}' is not a boolean"),
        }),
    }
}
