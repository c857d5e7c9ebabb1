//! Agent executors.

mod dry_run;

pub use dry_run::DryRunExecutor;
