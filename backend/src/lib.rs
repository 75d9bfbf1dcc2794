//! Read-only serving layer for environmental sensor telemetry.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod sandbox;
pub mod schema;
pub mod status;
pub mod utils;

#[cfg(test)]
mod testing;
