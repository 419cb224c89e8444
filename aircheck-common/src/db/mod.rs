//! Database models and initialization shared across AIRCHECK services

pub mod init;
pub mod models;
pub mod schema;

pub use init::*;
pub use models::*;
pub use schema::*;
