mod defaults;
mod loader;
mod policy;
mod settings;
mod store;

pub use loader::ConfigLoader;
pub use policy::{
    GENERAL_KEY, PolicyConfig, PolicyOverrides, PolicySummary, RegexRule, RegexRuleSpec,
};
pub use settings::{
    DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_PIPE_BYTES, DEFAULT_TIMEOUT_SECS, ENV_MAX_OUTPUT,
    ENV_MAX_PIPE_BUFFER, ENV_SECURITY_CONFIG, ENV_SECURITY_MODE, ENV_TIMEOUT, GuardSettings,
    ValidationMode,
};
pub use store::{PolicyStore, global_store};
