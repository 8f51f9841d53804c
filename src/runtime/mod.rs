pub mod fallback;
mod guard;

pub use fallback::{
    Attempt, AttemptFailure, DEFAULT_REGIONS, Strategy, StrategyOutcome, identity_strategies,
    region_strategies, resolve,
};
pub use guard::Guard;
