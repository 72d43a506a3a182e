//! Domain layer for the GPS tracker backend.
//!
//! This crate contains:
//! - Domain models (Device, Location, SafeZone)
//! - Store contracts and an in-memory store
//! - The zone synchronizer and the location normalizer
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::{DomainError, StoreError};
