//! Kabu Common - Shared configuration, logging and error types.
//!
//! This crate provides:
//! - Configuration types and loading (`~/.kabu/config.json` + env overrides)
//! - Error types and handling utilities
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, ObservabilityConfig, ScreenerConfig, SnapshotConfig};
pub use error::{Error, Result};
