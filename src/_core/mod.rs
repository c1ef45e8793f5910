//! Core infrastructure: configuration, error handling and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;
