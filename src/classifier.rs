use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{PolicyStore, ValidationMode};
use crate::error::ValidationError;

/// Default recognized CLI program
pub const AWS_PROGRAM: &str = "aws";

/// Decides whether a single CLI command may run under the active policy.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    store: Arc<PolicyStore>,
    program: String,
}

impl CommandClassifier {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self {
            store,
            program: AWS_PROGRAM.to_string(),
        }
    }

    /// Recognize a different program name as the cloud CLI.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Validate `command` against the current snapshot.
    ///
    /// In permissive mode every command is accepted and the bypass is logged.
    pub fn validate(&self, command: &str, mode: ValidationMode) -> Result<(), ValidationError> {
        if mode == ValidationMode::Permissive {
            warn!(command, "permissive mode: skipping command validation");
            return Ok(());
        }

        let snapshot = self.store.snapshot();
        match snapshot.check(command, &self.program) {
            Ok(()) => {
                debug!(command, "command allowed");
                Ok(())
            }
            Err(e) => {
                warn!(command, reason = %e, "command rejected");
                Err(e)
            }
        }
    }
}
