//! aircheck-ds library interface
//!
//! Exposes the syndication analysis pipeline for integration testing:
//! database stores, run models, and the hash/group/assign services.

pub mod db;
pub mod models;
pub mod services;
