//! Guardrail for cloud CLI commands.
//!
//! Commands are checked against a reloadable security policy (dangerous
//! prefixes, safe overrides, regex rules), split on unquoted pipes, and run as
//! a chain of directly spawned processes with a per-step timeout and an output
//! cap. Nothing is ever handed to a shell.

pub mod classifier;
pub mod config;
pub mod error;
pub mod runtime;
pub mod shell;

pub use classifier::{AWS_PROGRAM, CommandClassifier};
pub use config::{
    ConfigLoader, GuardSettings, PolicyConfig, PolicyOverrides, PolicyStore, RegexRule,
    ValidationMode, global_store,
};
pub use error::{ConfigError, ExecError, ValidationError};
pub use runtime::{Guard, Strategy, StrategyOutcome, resolve};
pub use shell::{
    ChainState, CommandResult, CommandStatus, PipedExecutor, Step, contains_pipe, is_auxiliary,
    split,
};
