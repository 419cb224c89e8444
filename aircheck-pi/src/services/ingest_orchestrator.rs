//! Station-Day Ingestion
//!
//! Drives one station's broadcast day from fetched document to catalog
//! rows: decode through the station's field map, number the plays in
//! broadcast order, build each one, persist its diagnostics under a run
//! id, and settle the playlist bookkeeping row. Stations ingest in
//! parallel; identity convergence is the resolver's problem, not ours.
//!
//! Re-ingesting a corrected document is routine. Plays upsert on their
//! natural key, and quarantine entries from earlier runs close when the
//! field that produced them stops producing one.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;

use aircheck_common::config::StationConfig;
use aircheck_common::db::models::{PlaylistStatus, Program, Station};
use aircheck_common::{time, Error, Result};

use crate::db::{playlists, programs, quarantine};
use crate::models::{GrammarDescriptor, IngestOutcome, RawProgramBlock};
use crate::services::entity_parser::EntityParser;
use crate::services::entity_resolver::EntityResolver;
use crate::services::play_builder::PlayBuilder;
use crate::services::playlist_fetcher::PlaylistFetcher;
use crate::services::source_mapper::SourceMapper;

/// A station's ingest machinery, assembled once from its config entry.
pub struct StationRuntime {
    pub station: Station,
    pub parser: EntityParser,
    pub mapper: SourceMapper,
}

impl StationRuntime {
    pub fn new(station: Station, cfg: &StationConfig) -> Self {
        Self {
            station,
            parser: EntityParser::new(GrammarDescriptor::from_config(&cfg.grammar)),
            mapper: SourceMapper::new(cfg.field_map.clone()),
        }
    }
}

pub struct IngestOrchestrator {
    pool: SqlitePool,
    builder: PlayBuilder,
}

impl IngestOrchestrator {
    pub fn new(pool: SqlitePool, resolver: Arc<EntityResolver>) -> Self {
        Self {
            builder: PlayBuilder::new(pool.clone(), resolver),
            pool,
        }
    }

    /// Ingest decoded program blocks for one station-day and settle the
    /// bookkeeping row. Play indexes run across the whole day, so block
    /// order is broadcast order.
    pub async fn ingest_blocks(
        &self,
        runtime: &StationRuntime,
        date: NaiveDate,
        blocks: &[RawProgramBlock],
    ) -> Result<IngestOutcome> {
        let station = &runtime.station;
        let date_str = time::broadcast_date_str(date);
        let run_id = uuid::Uuid::new_v4().to_string();
        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();

        let mut outcome = IngestOutcome::default();
        let mut play_index: i64 = 0;

        for block in blocks {
            let start_local = block.program.start_local.unwrap_or(midnight);
            let program = Program {
                id: 0,
                station_id: station.id,
                program_date: date_str.clone(),
                name: block.program.name.clone(),
                host_name: block.program.host.clone(),
                start_local: local_str(start_local),
                end_local: block.program.end_local.map(local_str),
                start_utc: time::utc_from_local(start_local, station.utc_offset_minutes)
                    .to_rfc3339(),
                end_utc: block
                    .program
                    .end_local
                    .map(|dt| time::utc_from_local(dt, station.utc_offset_minutes).to_rfc3339()),
                raw_info: block.program.raw.clone(),
            };
            let program_id = programs::upsert_program(&self.pool, &program).await?;
            outcome.programs_created += 1;

            for raw_play in &block.plays {
                let built = self
                    .builder
                    .build_play(
                        station,
                        &runtime.parser,
                        program_id,
                        date,
                        play_index,
                        start_local,
                        raw_play,
                    )
                    .await?;
                play_index += 1;
                outcome.plays_created += 1;

                quarantine::resolve_superseded(&self.pool, built.play_id, &built.open_fields())
                    .await?;
                for diagnostic in &built.diagnostics {
                    quarantine::insert_diagnostic(
                        &self.pool,
                        station.id,
                        &date_str,
                        Some(built.play_id),
                        diagnostic,
                        Some(&run_id),
                    )
                    .await?;
                    outcome.quarantine_count += 1;
                }
            }
        }

        let status = if outcome.plays_created > 0 {
            PlaylistStatus::Valid
        } else {
            PlaylistStatus::Invalid
        };
        playlists::record_ingest(
            &self.pool,
            station.id,
            &date_str,
            status,
            outcome.plays_created,
            outcome.quarantine_count,
        )
        .await?;

        tracing::info!(
            station = %station.name,
            date = %date_str,
            run_id = %run_id,
            programs = outcome.programs_created,
            plays = outcome.plays_created,
            quarantined = outcome.quarantine_count,
            "station day ingested"
        );
        Ok(outcome)
    }

    /// Ingest one station-day from its document on disk. A missing or
    /// undecodable document settles the bookkeeping row instead of
    /// erroring; only infrastructure failures propagate.
    pub async fn ingest_station_day(
        &self,
        runtime: &StationRuntime,
        fetcher: &PlaylistFetcher,
        date: NaiveDate,
    ) -> Result<IngestOutcome> {
        let station = &runtime.station;
        let date_str = time::broadcast_date_str(date);
        let path = fetcher.document_path(&station.name, date);

        if !path.exists() {
            tracing::info!(station = %station.name, date = %date_str, "no document on disk");
            playlists::record_fetch(
                &self.pool,
                station.id,
                &date_str,
                None,
                PlaylistStatus::Missing,
            )
            .await?;
            return Ok(IngestOutcome::default());
        }

        let blocks = match fetcher.read_document(&path).await {
            Ok(doc) => match runtime.mapper.map_document(&doc, date) {
                Ok(blocks) => blocks,
                Err(Error::InvalidInput(reason)) | Err(Error::Config(reason)) => {
                    tracing::warn!(station = %station.name, %reason, "document unusable");
                    playlists::record_ingest(
                        &self.pool,
                        station.id,
                        &date_str,
                        PlaylistStatus::Invalid,
                        0,
                        0,
                    )
                    .await?;
                    return Ok(IngestOutcome::default());
                }
                Err(e) => return Err(e),
            },
            Err(Error::Json(e)) => {
                tracing::warn!(station = %station.name, error = %e, "document is not valid JSON");
                playlists::record_ingest(
                    &self.pool,
                    station.id,
                    &date_str,
                    PlaylistStatus::Invalid,
                    0,
                    0,
                )
                .await?;
                return Ok(IngestOutcome::default());
            }
            Err(e) => return Err(e),
        };

        self.ingest_blocks(runtime, date, &blocks).await
    }

    /// Ingest every station for a date, one task per station. A station
    /// failing is logged and left out of the result; the day's other
    /// stations proceed.
    pub async fn ingest_all(
        self: Arc<Self>,
        runtimes: Vec<StationRuntime>,
        fetcher: Arc<PlaylistFetcher>,
        date: NaiveDate,
    ) -> Result<Vec<(String, IngestOutcome)>> {
        let mut set = tokio::task::JoinSet::new();
        for runtime in runtimes {
            if !runtime.station.enabled {
                let retired = playlists::retire_pending(&self.pool, runtime.station.id).await?;
                if retired > 0 {
                    tracing::info!(
                        station = %runtime.station.name,
                        retired,
                        "disabled station had pending playlist rows"
                    );
                }
                continue;
            }
            let orchestrator = Arc::clone(&self);
            let fetcher = Arc::clone(&fetcher);
            set.spawn(async move {
                let name = runtime.station.name.clone();
                let result = orchestrator
                    .ingest_station_day(&runtime, &fetcher, date)
                    .await;
                (name, result)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (name, result) =
                joined.map_err(|e| Error::Internal(format!("ingest task panicked: {}", e)))?;
            match result {
                Ok(outcome) => outcomes.push((name, outcome)),
                Err(e) => tracing::warn!(station = %name, error = %e, "station ingest failed"),
            }
        }
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(outcomes)
    }
}

fn local_str(dt: chrono::NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircheck_common::config::{FetchConfig, MatcherConfig};
    use aircheck_common::db::models::FieldKind;
    use aircheck_common::db::schema::init_schema;
    use crate::db::{plays, stations};
    use crate::models::{RawPlay, RawProgram};
    use crate::services::fuzzy_matcher::FuzzyMatcher;
    use crate::services::lexicon::Lexicon;
    use std::collections::BTreeMap;

    fn station_cfg(name: &str) -> StationConfig {
        StationConfig {
            name: name.to_string(),
            enabled: true,
            url_template: None,
            utc_offset_minutes: -300,
            authority: 50,
            grammar: Default::default(),
            field_map: Default::default(),
        }
    }

    async fn setup(name: &str) -> (SqlitePool, IngestOrchestrator, StationRuntime) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        let cfg = station_cfg(name);
        let station = stations::upsert_station(&pool, &cfg).await.unwrap();
        let resolver = Arc::new(EntityResolver::new(
            pool.clone(),
            Lexicon::builtin(),
            FuzzyMatcher::new(MatcherConfig::default()),
        ));
        let orchestrator = IngestOrchestrator::new(pool.clone(), resolver);
        let runtime = StationRuntime::new(station, &cfg);
        (pool, orchestrator, runtime)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 3, 15).unwrap()
    }

    fn block(program_name: &str, plays: Vec<RawPlay>) -> RawProgramBlock {
        RawProgramBlock {
            program: RawProgram {
                name: program_name.to_string(),
                host: None,
                start_local: date().and_hms_opt(6, 0, 0),
                end_local: None,
                raw: serde_json::json!({}),
            },
            plays,
        }
    }

    fn play(fields: &[(FieldKind, &str)]) -> RawPlay {
        RawPlay {
            fields: fields
                .iter()
                .map(|(k, v)| (*k, v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            raw: serde_json::json!({}),
            ..RawPlay::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_blocks_end_to_end() {
        let (pool, orchestrator, runtime) = setup("KING").await;

        let blocks = vec![block(
            "Morning Classics",
            vec![
                play(&[
                    (FieldKind::Composer, "Brahms, Johannes"),
                    (FieldKind::Work, "Symphony No. 4"),
                    (FieldKind::Conductor, "Carlos Kleiber"),
                ]),
                play(&[
                    (FieldKind::Composer, "Copland, Aaron"),
                    (FieldKind::Work, "Appalachian Spring"),
                ]),
            ],
        )];

        let outcome = orchestrator
            .ingest_blocks(&runtime, date(), &blocks)
            .await
            .unwrap();
        assert_eq!(outcome.programs_created, 1);
        assert_eq!(outcome.plays_created, 2);
        assert_eq!(outcome.quarantine_count, 0);

        let stored = plays::load_plays_for_station_date(&pool, runtime.station.id, "2019-03-15")
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].play_index, 0);
        assert_eq!(stored[1].play_index, 1);
        // Plays without a listed time inherit the program start.
        assert_eq!(stored[0].start_local, "2019-03-15 06:00:00");

        let entry = playlists::load_entry(&pool, runtime.station.id, "2019-03-15")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, PlaylistStatus::Valid);
        assert_eq!(entry.plays_created, 2);
    }

    #[tokio::test]
    async fn test_zero_plays_settles_invalid() {
        let (pool, orchestrator, runtime) = setup("KUSC").await;

        let outcome = orchestrator
            .ingest_blocks(&runtime, date(), &[])
            .await
            .unwrap();
        assert_eq!(outcome.plays_created, 0);

        let entry = playlists::load_entry(&pool, runtime.station.id, "2019-03-15")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, PlaylistStatus::Invalid);
    }

    #[tokio::test]
    async fn test_reingest_clears_superseded_quarantine() {
        let (pool, orchestrator, runtime) = setup("WCLV").await;

        let bad = vec![block(
            "Drive Time",
            vec![play(&[(FieldKind::Composer, "@@@@")])],
        )];
        let outcome = orchestrator
            .ingest_blocks(&runtime, date(), &bad)
            .await
            .unwrap();
        assert_eq!(outcome.quarantine_count, 1);
        assert_eq!(
            quarantine::open_count_for_date(&pool, runtime.station.id, "2019-03-15")
                .await
                .unwrap(),
            1
        );

        let corrected = vec![block(
            "Drive Time",
            vec![play(&[(FieldKind::Composer, "Copland, Aaron")])],
        )];
        orchestrator
            .ingest_blocks(&runtime, date(), &corrected)
            .await
            .unwrap();
        assert_eq!(
            quarantine::open_count_for_date(&pool, runtime.station.id, "2019-03-15")
                .await
                .unwrap(),
            0
        );

        let stored = plays::load_plays_for_station_date(&pool, runtime.station.id, "2019-03-15")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].quarantined);
    }

    #[tokio::test]
    async fn test_missing_document_settles_missing() {
        let (pool, orchestrator, runtime) = setup("WFMT").await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = PlaylistFetcher::new(
            pool.clone(),
            dir.path().to_path_buf(),
            &FetchConfig::default(),
        )
        .unwrap();

        let outcome = orchestrator
            .ingest_station_day(&runtime, &fetcher, date())
            .await
            .unwrap();
        assert_eq!(outcome.plays_created, 0);

        let entry = playlists::load_entry(&pool, runtime.station.id, "2019-03-15")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, PlaylistStatus::Missing);
    }

    #[tokio::test]
    async fn test_undecodable_document_settles_invalid() {
        let (pool, orchestrator, runtime) = setup("WRTI").await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = PlaylistFetcher::new(
            pool.clone(),
            dir.path().to_path_buf(),
            &FetchConfig::default(),
        )
        .unwrap();

        let path = fetcher.document_path(&runtime.station.name, date());
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, "this is not json").await.unwrap();

        let outcome = orchestrator
            .ingest_station_day(&runtime, &fetcher, date())
            .await
            .unwrap();
        assert_eq!(outcome.plays_created, 0);

        let entry = playlists::load_entry(&pool, runtime.station.id, "2019-03-15")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, PlaylistStatus::Invalid);
    }

    #[tokio::test]
    async fn test_ingest_all_runs_stations_in_parallel() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        let resolver = Arc::new(EntityResolver::new(
            pool.clone(),
            Lexicon::builtin(),
            FuzzyMatcher::new(MatcherConfig::default()),
        ));
        let orchestrator = Arc::new(IngestOrchestrator::new(pool.clone(), resolver));
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            PlaylistFetcher::new(
                pool.clone(),
                dir.path().to_path_buf(),
                &FetchConfig::default(),
            )
            .unwrap(),
        );

        let mut runtimes = Vec::new();
        for name in ["KDFC", "KBAQ"] {
            let cfg = station_cfg(name);
            let station = stations::upsert_station(&pool, &cfg).await.unwrap();
            runtimes.push(StationRuntime::new(station, &cfg));
        }

        // Neither station has a document; both settle as missing.
        let outcomes = orchestrator
            .ingest_all(runtimes, fetcher, date())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "KBAQ");
        assert!(outcomes.iter().all(|(_, o)| o.plays_created == 0));

        let statuses = playlists::statuses_for_date(&pool, "2019-03-15")
            .await
            .unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses
            .iter()
            .all(|(_, status)| *status == PlaylistStatus::Missing));
    }
}
