//! CLI command implementations.

mod config;
mod keygen;
mod sign;
mod snapshot;
mod start;

pub use config::{run_config, ConfigArgs};
pub use keygen::{run_keygen, KeygenArgs};
pub use sign::{run_sign, SignArgs};
pub use snapshot::{run_snapshot, SnapshotArgs};
pub use start::{load_config, run_start, StartArgs};
