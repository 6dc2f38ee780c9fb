//! The selector algebra, behavior inheritance matrix, settings/policy adapters, text
//! configuration loader, and hot-reload watcher.

pub mod adapter;
pub mod config;
pub mod matrix;
pub mod patch;
pub mod registry;
pub mod selector;
pub mod settings;
pub mod watch;

pub use adapter::as_batch_policy;
pub use adapter::as_query_policy;
pub use adapter::as_read_policy;
pub use adapter::as_write_policy;
pub use matrix::Behavior;
pub use patch::Patch;
pub use patch::PatchBuilder;
pub use registry::DEFAULT_BEHAVIOR;
pub use selector::Mode;
pub use selector::OpKind;
pub use selector::OpShape;
pub use selector::Selector;
pub use selector::Triple;
pub use settings::Settings;
pub use watch::ConfigWatcher;
