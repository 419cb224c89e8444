//! # AIRCHECK Common Library
//!
//! Shared code for the AIRCHECK services including:
//! - Database models, schema, and pool initialization
//! - Configuration loading (TOML file + station registry)
//! - Error types
//! - Broadcast timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
