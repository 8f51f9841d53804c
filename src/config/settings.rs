use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_SECURITY_MODE: &str = "AWS_GUARDRAIL_SECURITY_MODE";
pub const ENV_SECURITY_CONFIG: &str = "AWS_GUARDRAIL_SECURITY_CONFIG";
pub const ENV_TIMEOUT: &str = "AWS_GUARDRAIL_TIMEOUT";
pub const ENV_MAX_OUTPUT: &str = "AWS_GUARDRAIL_MAX_OUTPUT";
pub const ENV_MAX_PIPE_BUFFER: &str = "AWS_GUARDRAIL_MAX_PIPE_BUFFER";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_PIPE_BYTES: usize = 16 * 1024 * 1024;

/// Whether validation is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Every rule is enforced
    #[default]
    Strict,
    /// All checks are skipped; each bypass is logged
    Permissive,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Strict => write!(f, "strict"),
            ValidationMode::Permissive => write!(f, "permissive"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "permissive" => Ok(ValidationMode::Permissive),
            _ => Err(format!("unknown validation mode: {}", s)),
        }
    }
}

/// Runtime settings for the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSettings {
    pub mode: ValidationMode,

    /// Optional policy override document
    pub policy_path: Option<PathBuf>,

    /// Per-step timeout used when the caller does not pass one
    pub default_timeout: Duration,

    /// Cap on returned output
    pub max_output_bytes: usize,

    /// Ceiling on stdout buffered between two pipeline steps; exceeding it
    /// aborts the chain
    pub max_pipe_bytes: usize,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Strict,
            policy_path: None,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_pipe_bytes: DEFAULT_MAX_PIPE_BYTES,
        }
    }
}

impl GuardSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Invalid values fall back to
    /// the defaults (strict mode for the security switch) with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mode = match lookup(ENV_SECURITY_MODE) {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!(value = %raw, error = %e, "falling back to strict mode");
                ValidationMode::Strict
            }),
            None => defaults.mode,
        };

        let policy_path = lookup(ENV_SECURITY_CONFIG)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let default_timeout = parse_number::<u64>(lookup(ENV_TIMEOUT), ENV_TIMEOUT)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_timeout);

        let max_output_bytes = parse_number::<usize>(lookup(ENV_MAX_OUTPUT), ENV_MAX_OUTPUT)
            .filter(|bytes| *bytes > 0)
            .unwrap_or(defaults.max_output_bytes);

        let max_pipe_bytes =
            parse_number::<usize>(lookup(ENV_MAX_PIPE_BUFFER), ENV_MAX_PIPE_BUFFER)
                .filter(|bytes| *bytes > 0)
                .unwrap_or(defaults.max_pipe_bytes);

        Self {
            mode,
            policy_path,
            default_timeout,
            max_output_bytes,
            max_pipe_bytes,
        }
    }
}

fn parse_number<T: FromStr>(raw: Option<String>, key: &str) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid numeric setting");
            None
        }
    }
}
