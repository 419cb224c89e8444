//! Service modules for the playlist ingest workflow
//!
//! The pipeline runs fetch -> map -> parse -> classify -> resolve -> build:
//! - PlaylistFetcher pulls one JSON document per station per broadcast day
//! - SourceMapper lifts station-specific JSON into raw program blocks
//! - EntityParser / FieldClassifier split field text into typed items
//! - EntityResolver binds items to canonical person/ensemble rows
//! - PlayBuilder assembles the play row and its references
//! - IngestOrchestrator drives the whole chain and records outcomes

pub mod entity_parser;
pub mod entity_resolver;
pub mod field_classifier;
pub mod fuzzy_matcher;
pub mod ingest_orchestrator;
pub mod lexicon;
pub mod name_normalizer;
pub mod play_builder;
pub mod playlist_fetcher;
pub mod source_mapper;

pub use entity_parser::EntityParser;
pub use entity_resolver::{EntityResolver, FieldResolution};
pub use field_classifier::FieldClassifier;
pub use fuzzy_matcher::{FuzzyMatcher, MatchBand, MatchOutcome};
pub use ingest_orchestrator::{IngestOrchestrator, StationRuntime};
pub use lexicon::{Lexicon, RoleMatch};
pub use name_normalizer::{NameNormalizer, NormalizerRules};
pub use play_builder::{BuiltPlay, PlayBuilder};
pub use playlist_fetcher::{FetchOutcome, FetchSummary, PlaylistFetcher};
pub use source_mapper::SourceMapper;
