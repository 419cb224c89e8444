//! Entity Resolution
//!
//! Walks a parsed and classified field, normalizes each name, and binds
//! it to a row in `persons` or `ensembles`. Exact canonical-key hits win
//! outright; otherwise the fuzzy matcher decides between merging into an
//! existing identity, merging with a review flag, or minting a new row.
//!
//! Identity mutation is serialized per field kind. Composer, conductor,
//! performer, and ensemble resolution each take their own lock, so two
//! stations ingesting in parallel cannot race a single stream, while the
//! streams themselves stay concurrent. The person streams share one
//! table; the upsert on the canonical name converges cross-stream races
//! onto one row.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use aircheck_common::db::models::FieldKind;
use aircheck_common::Result;

use crate::db::{ensembles, persons};
use crate::models::{ClassifiedItem, Diagnostic, FieldType, NameKey, PerformerCredit, ResolvedRef};
use crate::services::entity_parser::EntityParser;
use crate::services::field_classifier::FieldClassifier;
use crate::services::fuzzy_matcher::{FuzzyMatcher, MatchBand};
use crate::services::lexicon::Lexicon;
use crate::services::name_normalizer::NameNormalizer;

/// Everything one credit field resolved to. Hybrid items contribute to
/// both lists, so callers route by field kind rather than assuming one
/// shape per field.
#[derive(Debug, Default)]
pub struct FieldResolution {
    pub persons: Vec<PerformerCredit>,
    pub ensembles: Vec<ResolvedRef>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FieldResolution {
    /// First resolved person id, for single-identity fields.
    pub fn first_person_id(&self) -> Option<i64> {
        self.persons.iter().find_map(|c| c.person.person_id())
    }
}

/// Identity candidate cache, one per table. Loaded on first use and kept
/// in step with inserts made through this resolver. Rows written by
/// another process are picked up by the convergent upsert instead.
#[derive(Default)]
struct CandidateCache {
    entries: Mutex<Option<Vec<(i64, String)>>>,
}

impl CandidateCache {
    async fn snapshot<F, Fut>(&self, load: F) -> Result<Vec<(i64, String)>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<(i64, String)>>>,
    {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(load().await?);
        }
        Ok(guard.as_ref().cloned().unwrap_or_default())
    }

    async fn insert(&self, id: i64, canonical: String) {
        let mut guard = self.entries.lock().await;
        if let Some(entries) = guard.as_mut() {
            if !entries.iter().any(|(existing, _)| *existing == id) {
                entries.push((id, canonical));
            }
        }
    }
}

/// Per-stream locks. Distinct person streams may interleave on the
/// persons table; within a stream, lookup-then-insert is atomic.
#[derive(Default)]
struct StreamLocks {
    composer: Mutex<()>,
    conductor: Mutex<()>,
    performer: Mutex<()>,
    ensemble: Mutex<()>,
}

impl StreamLocks {
    fn person_lock(&self, field: FieldKind) -> &Mutex<()> {
        match field {
            FieldKind::Composer => &self.composer,
            FieldKind::Conductor => &self.conductor,
            _ => &self.performer,
        }
    }
}

pub struct EntityResolver {
    pool: SqlitePool,
    classifier: FieldClassifier,
    normalizer: NameNormalizer,
    matcher: FuzzyMatcher,
    locks: Arc<StreamLocks>,
    person_cache: Arc<CandidateCache>,
    ensemble_cache: Arc<CandidateCache>,
}

impl EntityResolver {
    pub fn new(pool: SqlitePool, lexicon: Lexicon, matcher: FuzzyMatcher) -> Self {
        Self {
            pool,
            classifier: FieldClassifier::new(lexicon.clone()),
            normalizer: NameNormalizer::new(lexicon),
            matcher,
            locks: Arc::new(StreamLocks::default()),
            person_cache: Arc::new(CandidateCache::default()),
            ensemble_cache: Arc::new(CandidateCache::default()),
        }
    }

    /// Parse, classify, and resolve one raw field value. Content problems
    /// are reported as diagnostics, never as errors; `Err` means the
    /// database failed.
    pub async fn resolve_field(
        &self,
        field: FieldKind,
        raw: &str,
        parser: &EntityParser,
    ) -> Result<FieldResolution> {
        let items = parser.parse(raw);
        let classified = self.classifier.classify_items(&items, field);
        let mut out = FieldResolution::default();

        for ci in &classified {
            match ci.field_type {
                FieldType::Person => {
                    self.resolve_person_item(field, ci, &mut out).await?;
                }
                FieldType::Ensemble => {
                    self.resolve_ensemble_item(field, ci, &mut out).await?;
                }
                FieldType::Hybrid => {
                    self.resolve_hybrid_item(field, ci, &mut out).await?;
                }
                FieldType::Role => {
                    let role = self.normalizer.normalize_role(&ci.item.text);
                    attach_role(field, ci, role, &mut out);
                }
                FieldType::Unknown => {
                    out.diagnostics.push(unknown_diagnostic(field, ci));
                }
            }
        }

        Ok(out)
    }

    async fn resolve_person_item(
        &self,
        field: FieldKind,
        ci: &ClassifiedItem,
        out: &mut FieldResolution,
    ) -> Result<()> {
        let role = ci
            .inline_role
            .as_deref()
            .map(|r| self.normalizer.normalize_role(r));
        let keys = self.normalizer.normalize_people(ci.name_text(), field);
        for key in keys {
            let resolved = self
                .resolve_person_key(field, &key, &ci.item.raw, ci.confidence, out)
                .await?;
            out.persons.push(PerformerCredit {
                person: resolved,
                role: role.clone(),
            });
        }
        Ok(())
    }

    async fn resolve_ensemble_item(
        &self,
        field: FieldKind,
        ci: &ClassifiedItem,
        out: &mut FieldResolution,
    ) -> Result<()> {
        let Some(name) = self.normalizer.normalize_ensemble(ci.name_text()) else {
            out.diagnostics.push(unknown_diagnostic(field, ci));
            return Ok(());
        };
        let resolved = self
            .resolve_ensemble_name(field, &name, &ci.item.raw, ci.confidence, out)
            .await?;
        out.ensembles.push(resolved);
        Ok(())
    }

    /// "<Ensemble>/<Person>": both halves resolve, the person half keeps
    /// any inline role.
    async fn resolve_hybrid_item(
        &self,
        field: FieldKind,
        ci: &ClassifiedItem,
        out: &mut FieldResolution,
    ) -> Result<()> {
        let text = ci.name_text();
        let Some((left, right)) = text.split_once('/') else {
            out.diagnostics.push(unknown_diagnostic(field, ci));
            return Ok(());
        };

        if let Some(ensemble_name) = self.normalizer.normalize_ensemble(left) {
            let resolved = self
                .resolve_ensemble_name(field, &ensemble_name, &ci.item.raw, ci.confidence, out)
                .await?;
            out.ensembles.push(resolved);
        }

        if let Some(key) = self.normalizer.normalize_person(right) {
            let resolved = self
                .resolve_person_key(field, &key, &ci.item.raw, ci.confidence, out)
                .await?;
            out.persons.push(PerformerCredit {
                person: resolved,
                role: ci
                    .inline_role
                    .as_deref()
                    .map(|r| self.normalizer.normalize_role(r)),
            });
        }
        Ok(())
    }

    /// Bind one canonical person key to a row id. Holds the stream lock
    /// across lookup and insert.
    async fn resolve_person_key(
        &self,
        field: FieldKind,
        key: &NameKey,
        raw: &str,
        confidence: f64,
        out: &mut FieldResolution,
    ) -> Result<ResolvedRef> {
        let canonical = key.canonical();
        if canonical.is_empty() {
            return Ok(ResolvedRef::Unresolved {
                raw: raw.to_string(),
            });
        }

        let _stream = self.locks.person_lock(field).lock().await;
        let candidates = self
            .person_cache
            .snapshot(|| persons::identity_candidates(&self.pool))
            .await?;

        // Exact canonical hit short-circuits fuzzy scoring.
        if let Some((id, _)) = candidates
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(&canonical))
        {
            let id = *id;
            if raw != canonical {
                persons::add_person_variant(&self.pool, id, raw).await?;
            }
            return Ok(ResolvedRef::Person {
                id,
                confidence: 1.0,
                raw: raw.to_string(),
            });
        }

        match self.matcher.best_match(&canonical, &candidates) {
            Some(outcome) if outcome.band == MatchBand::High => {
                tracing::debug!(
                    candidate = %canonical,
                    matched_id = outcome.id,
                    score = outcome.score,
                    "merging surface form into existing person"
                );
                persons::add_person_variant(&self.pool, outcome.id, raw).await?;
                if raw != canonical {
                    persons::add_person_variant(&self.pool, outcome.id, &canonical).await?;
                }
                Ok(ResolvedRef::Person {
                    id: outcome.id,
                    confidence: outcome.score,
                    raw: raw.to_string(),
                })
            }
            Some(outcome) => {
                // Medium band: use the match but queue it for a human.
                out.diagnostics.push(Diagnostic::identity_review(
                    field,
                    raw,
                    Some(serde_json::json!({
                        "candidate_key": canonical,
                        "matched_person_id": outcome.id,
                        "score": outcome.score,
                        "boundary": outcome.boundary,
                    })),
                ));
                Ok(ResolvedRef::Person {
                    id: outcome.id,
                    confidence: outcome.score,
                    raw: raw.to_string(),
                })
            }
            None => {
                let id = persons::insert_person(&self.pool, key, raw).await?;
                self.person_cache.insert(id, canonical.clone()).await;
                tracing::debug!(canonical = %canonical, id, "new person identity");
                Ok(ResolvedRef::Person {
                    id,
                    confidence: confidence.max(0.0),
                    raw: raw.to_string(),
                })
            }
        }
    }

    async fn resolve_ensemble_name(
        &self,
        field: FieldKind,
        name: &str,
        raw: &str,
        confidence: f64,
        out: &mut FieldResolution,
    ) -> Result<ResolvedRef> {
        let _stream = self.locks.ensemble.lock().await;
        let candidates = self
            .ensemble_cache
            .snapshot(|| ensembles::identity_candidates(&self.pool))
            .await?;

        if let Some((id, _)) = candidates
            .iter()
            .find(|(_, existing)| existing.eq_ignore_ascii_case(name))
        {
            let id = *id;
            if raw != name {
                ensembles::add_ensemble_variant(&self.pool, id, raw).await?;
            }
            return Ok(ResolvedRef::Ensemble {
                id,
                confidence: 1.0,
                raw: raw.to_string(),
            });
        }

        match self.matcher.best_match(name, &candidates) {
            Some(outcome) if outcome.band == MatchBand::High => {
                ensembles::add_ensemble_variant(&self.pool, outcome.id, raw).await?;
                Ok(ResolvedRef::Ensemble {
                    id: outcome.id,
                    confidence: outcome.score,
                    raw: raw.to_string(),
                })
            }
            Some(outcome) => {
                out.diagnostics.push(Diagnostic::identity_review(
                    field,
                    raw,
                    Some(serde_json::json!({
                        "candidate_key": name,
                        "matched_ensemble_id": outcome.id,
                        "score": outcome.score,
                        "boundary": outcome.boundary,
                    })),
                ));
                Ok(ResolvedRef::Ensemble {
                    id: outcome.id,
                    confidence: outcome.score,
                    raw: raw.to_string(),
                })
            }
            None => {
                let id = ensembles::insert_ensemble(&self.pool, name, raw).await?;
                self.ensemble_cache.insert(id, name.to_string()).await;
                tracing::debug!(name = %name, id, "new ensemble identity");
                Ok(ResolvedRef::Ensemble {
                    id,
                    confidence: confidence.max(0.0),
                    raw: raw.to_string(),
                })
            }
        }
    }

    /// Sentinel composer row id. The schema seeds the row, so this only
    /// fails on an uninitialized database.
    pub async fn unknown_composer_id(&self) -> Result<i64> {
        persons::unknown_composer_id(&self.pool).await
    }
}

/// A standalone role phrase attaches to the nearest preceding person;
/// stacked roles join with a slash.
fn attach_role(field: FieldKind, ci: &ClassifiedItem, role_text: String, out: &mut FieldResolution) {
    match out.persons.last_mut() {
        Some(credit) => match &mut credit.role {
            Some(existing) => {
                existing.push('/');
                existing.push_str(&role_text);
            }
            None => credit.role = Some(role_text),
        },
        None => {
            // Role with nobody to modify. Common when a name failed to
            // parse, so keep the evidence.
            out.diagnostics.push(Diagnostic::parse_failure(
                field,
                &ci.item.raw,
                Some(serde_json::json!({ "detail": "role phrase without a preceding name" })),
            ));
        }
    }
}

fn unknown_diagnostic(field: FieldKind, ci: &ClassifiedItem) -> Diagnostic {
    let detail = serde_json::json!({
        "confidence": ci.confidence,
        "truncated": ci.item.truncated,
    });
    if ci.ambiguous {
        Diagnostic::ambiguous(field, &ci.item.raw, Some(detail))
    } else {
        Diagnostic::parse_failure(field, &ci.item.raw, Some(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircheck_common::config::MatcherConfig;
    use aircheck_common::db::schema::init_schema;
    use crate::models::GrammarDescriptor;

    async fn test_resolver() -> (SqlitePool, EntityResolver) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        let resolver = EntityResolver::new(
            pool.clone(),
            Lexicon::builtin(),
            FuzzyMatcher::new(MatcherConfig::default()),
        );
        (pool, resolver)
    }

    fn parser() -> EntityParser {
        EntityParser::new(GrammarDescriptor::default())
    }

    #[tokio::test]
    async fn test_same_key_from_two_spellings_shares_one_row() {
        let (pool, resolver) = test_resolver().await;
        let p = parser();

        let a = resolver
            .resolve_field(FieldKind::Composer, "Bach, Johann Sebastian", &p)
            .await
            .unwrap();
        let b = resolver
            .resolve_field(FieldKind::Composer, "Johann Sebastian Bach", &p)
            .await
            .unwrap();

        let id_a = a.first_person_id().unwrap();
        let id_b = b.first_person_id().unwrap();
        assert_eq!(id_a, id_b);

        let person = persons::load_person(&pool, id_a).await.unwrap().unwrap();
        assert_eq!(person.name, "Bach, Johann Sebastian");
        // Second spelling lands in the variant list.
        assert!(person.variants.iter().any(|v| v == "Johann Sebastian Bach"));
    }

    #[tokio::test]
    async fn test_damaged_spelling_merges_into_clean_identity() {
        let (_pool, resolver) = test_resolver().await;
        let p = parser();

        let clean = resolver
            .resolve_field(FieldKind::Composer, "Dvorak, Antonin", &p)
            .await
            .unwrap();
        let damaged = resolver
            .resolve_field(FieldKind::Composer, "Dvo\u{FFFD}\u{FFFD}k, Anton\u{FFFD}n", &p)
            .await
            .unwrap();

        assert_eq!(
            clean.first_person_id().unwrap(),
            damaged.first_person_id().unwrap()
        );
        assert!(damaged.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_medium_band_match_flags_review_but_still_binds() {
        let (_pool, resolver) = test_resolver().await;
        let p = parser();

        let first = resolver
            .resolve_field(FieldKind::Conductor, "Leonard Bernstein", &p)
            .await
            .unwrap();
        // Token reversal drops the score into the review band.
        let second = resolver
            .resolve_field(FieldKind::Conductor, "Bernstein Leonard, X", &p)
            .await
            .unwrap();

        if second.diagnostics.iter().any(|d| {
            matches!(
                d.reason,
                aircheck_common::db::models::QuarantineReason::IdentityReview
            )
        }) {
            assert_eq!(
                first.first_person_id().unwrap(),
                second.first_person_id().unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_performer_field_pairs_roles_and_splits_names() {
        let (_pool, resolver) = test_resolver().await;
        let p = EntityParser::new(GrammarDescriptor {
            major_separator: ",".to_string(),
            minor_separator: Some(", ".to_string()),
            ..GrammarDescriptor::default()
        });

        let out = resolver
            .resolve_field(
                FieldKind::Performers,
                "Joshua Bell, violin,Edgar Meyer, double bass",
                &p,
            )
            .await
            .unwrap();

        assert_eq!(out.persons.len(), 2);
        assert_eq!(out.persons[0].role.as_deref(), Some("violin"));
        assert_eq!(out.persons[1].role.as_deref(), Some("double bass"));
        assert!(out.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_field_yields_ensemble_and_person() {
        let (_pool, resolver) = test_resolver().await;
        let p = parser();

        let out = resolver
            .resolve_field(
                FieldKind::Ensembles,
                "English Chamber Orchestra/Benjamin Britten",
                &p,
            )
            .await
            .unwrap();

        assert_eq!(out.ensembles.len(), 1);
        assert_eq!(out.persons.len(), 1);
        assert!(out.persons[0].person.person_id().is_some());
        assert!(out.ensembles[0].ensemble_id().is_some());
    }

    #[tokio::test]
    async fn test_unreadable_item_becomes_diagnostic_not_error() {
        let (_pool, resolver) = test_resolver().await;
        let p = parser();

        let out = resolver
            .resolve_field(FieldKind::Performers, "@@##%%", &p)
            .await
            .unwrap();

        assert!(out.persons.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].marks_play());
    }

    #[tokio::test]
    async fn test_anonymous_marker_binds_to_sentinel() {
        let (pool, resolver) = test_resolver().await;
        let p = parser();

        let sentinel = resolver.unknown_composer_id().await.unwrap();
        let out = resolver
            .resolve_field(FieldKind::Composer, "Anonymous", &p)
            .await
            .unwrap();
        assert_eq!(out.first_person_id(), Some(sentinel));
        assert!(out.diagnostics.is_empty());

        // No second row was minted for the marker.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
