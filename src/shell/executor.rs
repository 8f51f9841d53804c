use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::allowlist::is_auxiliary;
use super::output::{ChainState, CommandResult};
use super::parser;
use crate::classifier::CommandClassifier;
use crate::config::{
    DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_PIPE_BYTES, DEFAULT_TIMEOUT_SECS, ValidationMode,
};
use crate::error::{ExecError, ValidationError};

const READ_CHUNK: usize = 8192;

/// One validated pipeline segment.
///
/// Only [`PipedExecutor::prepare`] builds steps, so `argv` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    index: usize,
    argv: Vec<String>,
}

impl Step {
    fn new(index: usize, argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            return None;
        }
        Some(Self { index, argv })
    }

    /// Position in the pipeline, starting at 0
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

/// How much of a stream to keep while draining it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    /// Keep the first `n` bytes and discard the rest
    Truncate(usize),
    /// Fail as soon as more than `n` bytes arrive
    Abort(usize),
}

#[derive(Debug, thiserror::Error)]
#[error("pipe buffer limit exceeded")]
struct PipeOverflow;

fn is_pipe_overflow(error: &io::Error) -> bool {
    error
        .get_ref()
        .is_some_and(|inner| inner.is::<PipeOverflow>())
}

#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    overflowed: bool,
}

#[derive(Debug)]
struct StepOutput {
    status: ExitStatus,
    stdout: Capture,
    stderr: Capture,
}

/// Validates and runs a command pipeline as a sequence of processes.
///
/// The first segment must pass the [`CommandClassifier`]; later segments must
/// start with an approved auxiliary utility. No shell is involved: each
/// segment is tokenized and spawned directly, and the captured stdout of one
/// step is written to the stdin of the next.
#[derive(Debug, Clone)]
pub struct PipedExecutor {
    classifier: CommandClassifier,
    mode: ValidationMode,
    max_output_bytes: usize,
    max_pipe_bytes: usize,
}

impl PipedExecutor {
    pub fn new(classifier: CommandClassifier, mode: ValidationMode) -> Self {
        Self {
            classifier,
            mode,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_pipe_bytes: DEFAULT_MAX_PIPE_BYTES,
        }
    }

    pub fn with_max_output(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Ceiling on the stdout one step may hand to the next.
    pub fn with_max_pipe(mut self, max_pipe_bytes: usize) -> Self {
        self.max_pipe_bytes = max_pipe_bytes;
        self
    }

    pub fn default_timeout() -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }

    pub fn classifier(&self) -> &CommandClassifier {
        &self.classifier
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Run every pre-execution check without spawning anything.
    pub fn validate(&self, command: &str) -> Result<(), ValidationError> {
        self.prepare(command).map(|_| ())
    }

    /// Validate `command` and turn it into the steps that would run.
    pub fn prepare(&self, command: &str) -> Result<Vec<Step>, ValidationError> {
        debug!(state = %ChainState::ValidatingHead, command);
        let segments = parser::split(command);
        let Some(head) = segments.first() else {
            return Err(ValidationError::EmptyCommand);
        };

        self.classifier.validate(head, self.mode)?;
        let Some(head_step) = Step::new(0, tokenize(head)?) else {
            return Err(ValidationError::MalformedCommand {
                reason: "first segment is empty".to_string(),
            });
        };

        debug!(state = %ChainState::ValidatingSegments, segments = segments.len());
        let mut steps = vec![head_step];

        for (index, segment) in segments.iter().enumerate().skip(1) {
            let Some(step) = Step::new(index, tokenize(segment)?) else {
                return Err(ValidationError::PipeSegmentDisallowed {
                    index,
                    token: String::new(),
                });
            };

            let program = step.program();
            if !is_auxiliary(program) {
                if self.mode == ValidationMode::Permissive {
                    warn!(index, program = %program, "permissive mode: allowing unapproved pipe segment");
                } else {
                    warn!(index, program = %program, "pipe segment rejected");
                    return Err(ValidationError::PipeSegmentDisallowed {
                        index,
                        token: program.to_string(),
                    });
                }
            }

            steps.push(step);
        }

        Ok(steps)
    }

    /// Validate and run `command`, giving each step its own `step_timeout`.
    ///
    /// Validation failures are returned as `Err` and nothing is spawned.
    /// Anything that goes wrong after spawning is reported as an error
    /// [`CommandResult`]; a failed or timed-out step ends the chain.
    pub async fn execute(
        &self,
        command: &str,
        step_timeout: Duration,
    ) -> Result<CommandResult, ValidationError> {
        let execution_id = Uuid::new_v4();
        debug!(%execution_id, state = %ChainState::Idle, "execution requested");

        let steps = match self.prepare(command) {
            Ok(steps) => steps,
            Err(e) => {
                debug!(%execution_id, state = %ChainState::Rejected, error = %e);
                return Err(e);
            }
        };

        info!(%execution_id, command, steps = steps.len(), "executing command");

        let mut input = None;
        let mut last = None;

        for step in &steps {
            debug!(%execution_id, state = %ChainState::Running(step.index), program = step.program());

            let is_last = step.index + 1 == steps.len();
            let output = match self.run_step(step, input.take(), step_timeout, is_last).await {
                Ok(output) => output,
                Err(error) => {
                    let result = CommandResult::failure(
                        error.clone(),
                        error.to_string(),
                        false,
                        self.max_output_bytes,
                    );
                    warn!(%execution_id, state = %result.state(), error = %error, "command aborted");
                    return Ok(result);
                }
            };

            if !output.status.success() {
                let result = self.exit_failure(step, &output);
                warn!(
                    %execution_id,
                    state = %result.state(),
                    step = step.index,
                    code = ?output.status.code(),
                    "command step failed"
                );
                return Ok(result);
            }

            if is_last {
                last = Some(output);
            } else {
                input = Some(output.stdout.bytes);
            }
        }

        let Some(output) = last else {
            return Err(ValidationError::EmptyCommand);
        };

        let result = CommandResult::success(
            &output.stdout.bytes,
            output.stdout.overflowed,
            self.max_output_bytes,
        );
        info!(
            %execution_id,
            state = %result.state(),
            bytes = result.output.len(),
            truncated = result.truncated,
            "command completed"
        );
        Ok(result)
    }

    async fn run_step(
        &self,
        step: &Step,
        input: Option<Vec<u8>>,
        budget: Duration,
        is_last: bool,
    ) -> Result<StepOutput, ExecError> {
        let mut cmd = Command::new(step.program());
        cmd.args(step.args());
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ExecError::SpawnFailure {
            step: step.index,
            program: step.program().to_string(),
            cause: e.to_string(),
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // intermediate output must reach the next step whole, or not at all
        let stdout_limit = if is_last {
            Limit::Truncate(self.max_output_bytes)
        } else {
            Limit::Abort(self.max_pipe_bytes)
        };
        let stderr_limit = Limit::Truncate(self.max_output_bytes);

        let waited = timeout(budget, async {
            tokio::try_join!(
                child.wait(),
                feed(stdin, input),
                drain(stdout, stdout_limit),
                drain(stderr, stderr_limit),
            )
        })
        .await;

        match waited {
            Ok(Ok((status, (), stdout, stderr))) => Ok(StepOutput {
                status,
                stdout,
                stderr,
            }),
            Ok(Err(e)) if is_pipe_overflow(&e) => {
                kill(&mut child, step).await;
                Err(ExecError::OutputLimit {
                    step: step.index,
                    program: step.program().to_string(),
                    limit: self.max_pipe_bytes,
                })
            }
            Ok(Err(e)) => {
                kill(&mut child, step).await;
                Err(ExecError::Io {
                    step: step.index,
                    program: step.program().to_string(),
                    cause: e.to_string(),
                })
            }
            Err(_) => {
                kill(&mut child, step).await;
                Err(ExecError::Timeout {
                    step: step.index,
                    program: step.program().to_string(),
                    seconds: budget.as_secs_f64(),
                })
            }
        }
    }

    fn exit_failure(&self, step: &Step, output: &StepOutput) -> CommandResult {
        let code = output.status.code();
        let stderr = String::from_utf8_lossy(&output.stderr.bytes)
            .trim()
            .to_string();

        let message = if stderr.is_empty() {
            match code {
                Some(code) => format!(
                    "Command failed with exit code {} (step {}: {})",
                    code,
                    step.index,
                    step.program()
                ),
                None => format!(
                    "Command terminated by signal (step {}: {})",
                    step.index,
                    step.program()
                ),
            }
        } else {
            stderr.clone()
        };

        let overflowed = !stderr.is_empty() && output.stderr.overflowed;
        let error = ExecError::NonZeroExit {
            step: step.index,
            program: step.program().to_string(),
            code,
            stderr,
        };
        CommandResult::failure(error, message, overflowed, self.max_output_bytes)
    }
}

fn tokenize(segment: &str) -> Result<Vec<String>, ValidationError> {
    shell_words::split(segment).map_err(|e| ValidationError::MalformedCommand {
        reason: format!("{}: {}", e, segment),
    })
}

async fn kill(child: &mut tokio::process::Child, step: &Step) {
    if let Err(e) = child.kill().await {
        warn!(step = step.index, program = step.program(), error = %e, "failed to kill process");
    }
}

/// Write `input` to the child's stdin, then close it.
async fn feed(stdin: Option<ChildStdin>, input: Option<Vec<u8>>) -> io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };
    match stdin.write_all(&input).await {
        // the reader may exit before consuming everything (e.g. `head`)
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Read a pipe to EOF under `limit`.
async fn drain<R>(pipe: Option<R>, limit: Limit) -> io::Result<Capture>
where
    R: AsyncRead + Unpin,
{
    let mut capture = Capture::default();
    let Some(mut pipe) = pipe else {
        return Ok(capture);
    };

    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = pipe.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        match limit {
            Limit::Truncate(limit) => {
                let room = limit.saturating_sub(capture.bytes.len());
                if n > room {
                    capture.overflowed = true;
                }
                capture.bytes.extend_from_slice(&buf[..n.min(room)]);
            }
            Limit::Abort(limit) => {
                if capture.bytes.len() + n > limit {
                    return Err(io::Error::other(PipeOverflow));
                }
                capture.bytes.extend_from_slice(&buf[..n]);
            }
        }
    }
    Ok(capture)
}
