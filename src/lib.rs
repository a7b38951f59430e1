//! netns-handoff - hand a secondary network interface off to an isolated namespace
//!
//! This library classifies the interfaces of a network namespace into a primary
//! (default-gateway-bearing) and a secondary interface, then moves the secondary
//! into a named namespace with its address and default route restored.

pub mod classify;
pub mod config;
pub mod error;
pub mod migrate;
pub mod netops;
pub mod network;
pub mod runner;

pub use error::AppError;
