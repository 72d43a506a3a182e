//! Shared utilities and common types for the GPS tracker backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Coordinate and radius validation
//! - Parsing of device-reported timestamps

pub mod time;
pub mod validation;
