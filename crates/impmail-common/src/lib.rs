//! impmail Common - Shared types and utilities
//!
//! This crate provides configuration, the error type, the preference blob
//! codec and the header/address helpers shared across all impmail crates.

pub mod address;
pub mod config;
pub mod error;
pub mod headers;
pub mod serial;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
