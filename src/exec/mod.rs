//! Execution orchestration: strategy selection between single-key, small-N, and batched calls,
//! and the policy checks (TTL, deadline, generation) applied around them.

pub mod executor;
pub mod policy;

pub use executor::choose_strategy;
pub use executor::execute;
pub use executor::BatchCall;
pub use executor::ExecutionMode;
pub use executor::InclusionPolicy;
pub use executor::KeyCall;
pub use executor::Strategy;
pub use executor::Work;
pub use executor::DEFAULT_BATCH_THRESHOLD;
pub use policy::check_generation;
pub use policy::resolve_ttl;
pub use policy::validate_deadline;
pub use policy::TTL_DONT_CHANGE;
pub use policy::TTL_NEVER_EXPIRE;
pub use policy::TTL_SERVER_DEFAULT;
