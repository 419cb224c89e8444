//! Service components for aircheck-ds (syndication analysis)
//!
//! A resolution pass flows sequence_hasher -> SyndicationMatcher ->
//! MasterAssigner: hash the date's plays per attribute level, group equal
//! digests across stations from the top level down, then pick each run's
//! master by station authority.

pub mod master_assigner;
pub mod sequence_hasher;
pub mod syndication_matcher;

pub use master_assigner::MasterAssigner;
pub use syndication_matcher::{group_runs, SyndicationMatcher};
