//! Core runtime infrastructure.
//!
//! This module contains the essential components for running Coffer:
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Main runtime orchestration
//! - [`time`] - Timestamps and clocks
//! - [`error`] - Error types and the stable error taxonomy

pub mod config;
pub mod error;
pub mod runtime;
pub mod time;
