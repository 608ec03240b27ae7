//! Process-wide observability setup shared by the deployer binaries.

pub mod panic_hook;
pub mod tracing;
