//! Persistence layer for the safe zone backend.
//!
//! This crate contains:
//! - Database connection management and embedded migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store contracts

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
