use std::path::PathBuf;

/// Reasons a command is rejected before any process is spawned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("malformed command: {reason}")]
    MalformedCommand { reason: String },

    #[error("not a recognized command: expected '{expected}', found '{found}'")]
    NotRecognizedCommand { expected: String, found: String },

    #[error("command must specify a service (e.g. '{program} s3 ls')")]
    MissingService { program: String },

    #[error("{description}: {message}")]
    RegexViolation {
        description: String,
        message: String,
    },

    #[error("dangerous command blocked: matches '{prefix}'")]
    DangerousCommandBlocked { prefix: String },

    #[error("pipe segment {index} is not allowed: '{token}' is not an approved utility")]
    PipeSegmentDisallowed { index: usize, token: String },
}

/// Failures that happen after a process has been spawned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecError {
    #[error("step {step} ({program}) timed out after {seconds:.1} seconds")]
    Timeout {
        step: usize,
        program: String,
        seconds: f64,
    },

    #[error("step {step} ({program}) exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit {
        step: usize,
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to start step {step} ({program}): {cause}")]
    SpawnFailure {
        step: usize,
        program: String,
        cause: String,
    },

    #[error("step {step} ({program}) wrote more than {limit} bytes to the pipe")]
    OutputLimit {
        step: usize,
        program: String,
        limit: usize,
    },

    #[error("i/o error in step {step} ({program}): {cause}")]
    Io {
        step: usize,
        program: String,
        cause: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Errors raised while building a policy snapshot from an override document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read policy document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy document {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("duplicate key '{key}' in [{section}] (keys are case-insensitive)")]
    DuplicateKey { section: &'static str, key: String },

    #[error("invalid regex for '{key}' rule '{pattern}': {source}")]
    InvalidRegex {
        key: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
