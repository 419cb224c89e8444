//! Data models for aircheck-ds (syndication analysis)

pub mod attrs;
pub mod runs;

pub use attrs::{PlayAttrs, SequenceHash};
pub use runs::{MasterAssignment, RunMember, SyndicationOutcome, SyndicationRun};
