pub mod allowlist;
mod executor;
mod output;
pub mod parser;

pub use allowlist::{AUXILIARY_COMMANDS, EXCLUDED_COMMANDS, is_auxiliary};
pub use executor::{PipedExecutor, Step};
pub use output::{ChainState, CommandResult, CommandStatus, TRUNCATION_NOTICE, cap_output};
pub use parser::{PipeScan, contains_pipe, split};
