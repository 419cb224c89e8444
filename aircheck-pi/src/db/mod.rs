//! Database access for aircheck-pi
//!
//! One store module per entity, all free functions over the shared pool.

pub mod ensembles;
pub mod performers;
pub mod persons;
pub mod playlists;
pub mod plays;
pub mod programs;
pub mod quarantine;
pub mod recordings;
pub mod stations;
pub mod works;
