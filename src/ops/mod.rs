//! Operations.
//!
//! - [`info`] - Server info reporting
//! - [`replication`] - CONFIG/PSYNC compatibility shim
//! - [`sweeper`] - Background expiry sweeper

pub mod info;
pub mod replication;
pub mod sweeper;
