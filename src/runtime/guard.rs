use std::sync::Arc;

use tokio::time::Duration;
use tracing::{info, warn};

use crate::classifier::CommandClassifier;
use crate::config::{GuardSettings, PolicyConfig, PolicyStore, ValidationMode, global_store};
use crate::error::{ConfigError, ValidationError};
use crate::shell::{CommandResult, PipedExecutor, Step};

/// Entry point for upstream callers: validate a command string and run it.
///
/// # Example
///
/// ```no_run
/// # use aws_guardrail::Guard;
/// # async fn example() -> Result<(), aws_guardrail::ValidationError> {
/// let guard = Guard::from_env();
/// let result = guard.execute("aws s3api list-buckets | grep prod", None).await?;
/// println!("{}", result.output);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Guard {
    store: Arc<PolicyStore>,
    executor: PipedExecutor,
    default_timeout: Duration,
}

impl Guard {
    /// Build a guard from environment settings and the process-wide store.
    pub fn from_env() -> Self {
        Self::new(global_store(), GuardSettings::from_env())
    }

    pub fn new(store: Arc<PolicyStore>, settings: GuardSettings) -> Self {
        let classifier = CommandClassifier::new(Arc::clone(&store));
        Self::with_classifier(classifier, settings)
    }

    /// Build a guard around a preconfigured classifier.
    pub fn with_classifier(classifier: CommandClassifier, settings: GuardSettings) -> Self {
        if settings.mode == ValidationMode::Permissive {
            warn!("guard running in permissive mode: commands will not be validated");
        }
        let store = Arc::clone(classifier.store());
        let executor = PipedExecutor::new(classifier, settings.mode)
            .with_max_output(settings.max_output_bytes)
            .with_max_pipe(settings.max_pipe_bytes);
        Self {
            store,
            executor,
            default_timeout: settings.default_timeout,
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.executor.mode()
    }

    pub fn program(&self) -> &str {
        self.executor.classifier().program()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The snapshot new calls will be checked against
    pub fn policy(&self) -> Arc<PolicyConfig> {
        self.store.snapshot()
    }

    /// Reload the policy document; the previous policy stays active on error.
    pub fn reload_policy(&self) -> Result<Arc<PolicyConfig>, ConfigError> {
        self.store.reload()
    }

    /// Check a command or pipeline without running it.
    pub fn validate(&self, command: &str) -> Result<(), ValidationError> {
        self.executor.validate(command)
    }

    pub fn prepare(&self, command: &str) -> Result<Vec<Step>, ValidationError> {
        self.executor.prepare(command)
    }

    /// Validate and run a command, each step bounded by `timeout` (or the
    /// configured default).
    pub async fn execute(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, ValidationError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.executor.execute(command, timeout).await
    }

    /// Whether the CLI program can be started at all.
    pub async fn cli_available(&self) -> bool {
        let probe = format!("{} --version", self.program());
        match self.execute(&probe, Some(Duration::from_secs(10))).await {
            Ok(result) if result.is_success() => {
                info!(version = %result.output.trim(), "cli available");
                true
            }
            Ok(result) => {
                warn!(output = %result.output, "cli probe failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "cli probe rejected");
                false
            }
        }
    }
}
