//! HTTP surface of the safe zone sync backend.

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
