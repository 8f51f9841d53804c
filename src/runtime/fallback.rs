use std::fmt;

use tokio::time::Duration;
use tracing::{debug, warn};

use super::guard::Guard;

/// Regions returned when the live lookup is unavailable
pub const DEFAULT_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-central-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "sa-east-1",
];

/// One way of obtaining a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Run a command through the guard; its trimmed stdout is the value
    Command(String),
    /// A fixed value
    Static(String),
}

/// Why a strategy did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Rejected(String),
    Failed(String),
    TimedOut(String),
    Empty,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Rejected(reason) => write!(f, "rejected: {}", reason),
            AttemptFailure::Failed(output) => write!(f, "failed: {}", output),
            AttemptFailure::TimedOut(output) => write!(f, "timed out: {}", output),
            AttemptFailure::Empty => write!(f, "empty output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: Strategy,
    pub failure: AttemptFailure,
}

/// Result of walking an ordered strategy list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Resolved {
        /// Position of the strategy that produced the value
        index: usize,
        value: String,
        /// Earlier strategies that did not
        attempts: Vec<Attempt>,
    },
    Exhausted {
        attempts: Vec<Attempt>,
    },
}

impl StrategyOutcome {
    pub fn value(&self) -> Option<&str> {
        match self {
            StrategyOutcome::Resolved { value, .. } => Some(value.as_str()),
            StrategyOutcome::Exhausted { .. } => None,
        }
    }
}

/// Try each strategy in order and stop at the first that yields a value.
///
/// Commands go through the guard, so they are validated and time-bounded like
/// any other call. A failed strategy is never re-run.
pub async fn resolve(guard: &Guard, strategies: &[Strategy], timeout: Duration) -> StrategyOutcome {
    let mut attempts = Vec::new();

    for (index, strategy) in strategies.iter().enumerate() {
        let outcome = match strategy {
            Strategy::Static(value) => Ok(value.clone()),
            Strategy::Command(command) => run_command(guard, command, timeout).await,
        };

        match outcome {
            Ok(value) => {
                debug!(index, "strategy resolved");
                return StrategyOutcome::Resolved {
                    index,
                    value,
                    attempts,
                };
            }
            Err(failure) => {
                warn!(index, failure = %failure, "strategy failed, trying next");
                attempts.push(Attempt {
                    strategy: strategy.clone(),
                    failure,
                });
            }
        }
    }

    StrategyOutcome::Exhausted { attempts }
}

async fn run_command(guard: &Guard, command: &str, timeout: Duration) -> Result<String, AttemptFailure> {
    let result = guard
        .execute(command, Some(timeout))
        .await
        .map_err(|e| AttemptFailure::Rejected(e.to_string()))?;

    if result.timed_out() {
        return Err(AttemptFailure::TimedOut(result.output));
    }
    if !result.is_success() {
        return Err(AttemptFailure::Failed(result.output));
    }

    let value = result.output.trim();
    if value.is_empty() {
        return Err(AttemptFailure::Empty);
    }
    Ok(value.to_string())
}

/// Live region list first, then the well-known defaults.
pub fn region_strategies() -> Vec<Strategy> {
    vec![
        Strategy::Command(
            "aws ec2 describe-regions --query 'Regions[].RegionName' --output text".to_string(),
        ),
        Strategy::Static(DEFAULT_REGIONS.join("\t")),
    ]
}

/// Caller identity first, then the IAM user as a substitute.
pub fn identity_strategies() -> Vec<Strategy> {
    vec![
        Strategy::Command(
            "aws sts get-caller-identity --query Arn --output text".to_string(),
        ),
        Strategy::Command("aws iam get-user --query User.Arn --output text".to_string()),
    ]
}
