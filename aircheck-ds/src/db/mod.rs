//! Database access for aircheck-ds
//!
//! Read-mostly stores over the shared catalog; the only writes are hash
//! rows and master links, both owned by this service.

pub mod hashes;
pub mod plays;
pub mod stations;
