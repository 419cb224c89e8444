//! Data models for aircheck-pi (playlist ingest)

pub mod entity;
pub mod grammar;
pub mod name_key;
pub mod raw_play;
pub mod resolution;

pub use entity::{ClassifiedItem, EntityItem, FieldType, ItemPosition};
pub use grammar::{DelimKind, GrammarDescriptor, Separator};
pub use name_key::{NameKey, WILDCARD};
pub use raw_play::{IngestOutcome, RawPlay, RawProgram, RawProgramBlock};
pub use resolution::{Diagnostic, PerformerCredit, ResolvedRef};
