use std::fmt;

use serde::Serialize;

use crate::error::ExecError;

/// Marker appended to output cut at the size cap
pub const TRUNCATION_NOTICE: &str = "\n... [output truncated]";

/// Outcome of an executed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Success,
    Error,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Success => write!(f, "success"),
            CommandStatus::Error => write!(f, "error"),
        }
    }
}

/// States a piped execution moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainState {
    Idle,
    ValidatingHead,
    ValidatingSegments,
    Running(usize),
    Rejected,
    Failed,
    TimedOut,
    Succeeded,
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChainState::Rejected | ChainState::Failed | ChainState::TimedOut | ChainState::Succeeded
        )
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::Idle => write!(f, "idle"),
            ChainState::ValidatingHead => write!(f, "validating_head"),
            ChainState::ValidatingSegments => write!(f, "validating_segments"),
            ChainState::Running(step) => write!(f, "running({})", step),
            ChainState::Rejected => write!(f, "rejected"),
            ChainState::Failed => write!(f, "failed"),
            ChainState::TimedOut => write!(f, "timed_out"),
            ChainState::Succeeded => write!(f, "succeeded"),
        }
    }
}

/// Result of running a validated command or pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub status: CommandStatus,

    /// Stdout on success; the most relevant diagnostic on error
    pub output: String,

    /// Set when `output` was cut at the size cap
    pub truncated: bool,

    /// What went wrong, for error results
    #[serde(skip)]
    pub failure: Option<ExecError>,
}

impl CommandResult {
    /// `overflowed` marks stdout that was already cut while it was captured.
    pub fn success(stdout: &[u8], overflowed: bool, max_bytes: usize) -> Self {
        let (mut output, mut truncated) =
            cap_output(&String::from_utf8_lossy(stdout), max_bytes);
        if overflowed && !truncated {
            output.push_str(TRUNCATION_NOTICE);
            truncated = true;
        }
        Self {
            status: CommandStatus::Success,
            output,
            truncated,
            failure: None,
        }
    }

    /// `overflowed` marks a diagnostic that was already cut while captured.
    pub fn failure(error: ExecError, output: String, overflowed: bool, max_bytes: usize) -> Self {
        let (mut output, mut truncated) = cap_output(&output, max_bytes);
        if overflowed && !truncated {
            output.push_str(TRUNCATION_NOTICE);
            truncated = true;
        }
        Self {
            status: CommandStatus::Error,
            output,
            truncated,
            failure: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.failure, Some(ExecError::Timeout { .. }))
    }

    /// Terminal state this result represents
    pub fn state(&self) -> ChainState {
        match (&self.status, &self.failure) {
            (CommandStatus::Success, _) => ChainState::Succeeded,
            (CommandStatus::Error, Some(ExecError::Timeout { .. })) => ChainState::TimedOut,
            (CommandStatus::Error, _) => ChainState::Failed,
        }
    }
}

/// Find the largest byte index <= `index` that is a valid char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Cut `text` to at most `max_bytes` (on a char boundary) and append the
/// truncation notice if anything was removed.
pub fn cap_output(text: &str, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text.to_string(), false);
    }
    let boundary = floor_char_boundary(text, max_bytes);
    let mut capped = text[..boundary].to_string();
    capped.push_str(TRUNCATION_NOTICE);
    (capped, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_untouched() {
        let result = CommandResult::success(b"hello\n", false, 1024);
        assert_eq!(result.output, "hello\n");
        assert!(!result.truncated);
        assert_eq!(result.state(), ChainState::Succeeded);
    }

    #[test]
    fn long_output_truncated_with_notice() {
        let stdout = vec![b'x'; 100];
        let result = CommandResult::success(&stdout, false, 10);
        assert!(result.is_success());
        assert!(result.truncated);
        assert_eq!(result.output, format!("{}{}", "x".repeat(10), TRUNCATION_NOTICE));
    }

    #[test]
    fn overflow_during_capture_adds_notice() {
        let result = CommandResult::success(b"0123", true, 4);
        assert!(result.truncated);
        assert_eq!(result.output, format!("0123{}", TRUNCATION_NOTICE));
    }

    #[test]
    fn overflowed_diagnostic_keeps_notice() {
        let result = CommandResult::failure(
            ExecError::NonZeroExit {
                step: 0,
                program: "aws".to_string(),
                code: Some(255),
                stderr: "boom".to_string(),
            },
            "boom".to_string(),
            true,
            4,
        );
        assert!(result.truncated);
        assert_eq!(result.output, format!("boom{}", TRUNCATION_NOTICE));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let (capped, truncated) = cap_output("héllo", 2);
        assert!(truncated);
        assert!(capped.starts_with('h'));
        assert!(!capped.contains('\u{FFFD}'));
    }

    #[test]
    fn failure_state_mapping() {
        let timeout = CommandResult::failure(
            ExecError::Timeout {
                step: 0,
                program: "aws".to_string(),
                seconds: 1.0,
            },
            "timed out".to_string(),
            false,
            1024,
        );
        assert!(timeout.timed_out());
        assert_eq!(timeout.state(), ChainState::TimedOut);

        let failed = CommandResult::failure(
            ExecError::NonZeroExit {
                step: 1,
                program: "grep".to_string(),
                code: Some(1),
                stderr: String::new(),
            },
            "failed".to_string(),
            false,
            1024,
        );
        assert!(!failed.is_success());
        assert_eq!(failed.state(), ChainState::Failed);
        assert!(failed.state().is_terminal());
        assert!(!ChainState::Running(0).is_terminal());
    }
}
