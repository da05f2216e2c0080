//! Control-plane helpers.
//!
//! - [`placement`] - Deterministic tenant-to-host assignment used at signup

pub mod placement;
