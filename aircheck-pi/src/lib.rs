//! aircheck-pi library interface
//!
//! Exposes the ingest pipeline for integration testing: database stores,
//! raw-play models, and the fetch/map/parse/resolve/build services.

pub mod db;
pub mod models;
pub mod services;
