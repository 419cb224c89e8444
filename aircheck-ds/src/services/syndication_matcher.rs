//! Date-scoped syndication resolution
//!
//! A collect-then-batch pass: once every enabled station's playlist for a
//! date has settled, the matcher rehashes the date's plays, groups equal
//! digests level by level from the top, and has the MasterAssigner pick
//! one master per run. The pass is re-derivable from play attributes plus
//! the authority table; it clears the date's links before writing fresh
//! ones, so it can run any number of times.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use aircheck_common::time;
use aircheck_common::{Error, Result};

use crate::db::{hashes, plays, stations};
use crate::models::{RunMember, SequenceHash, SyndicationOutcome, SyndicationRun};
use crate::services::master_assigner::MasterAssigner;
use crate::services::sequence_hasher;

pub struct SyndicationMatcher {
    pool: SqlitePool,
}

impl SyndicationMatcher {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve syndication for one broadcast date.
    ///
    /// Rejects with [`Error::IncompleteIngest`] while any enabled station's
    /// playlist for the date is unfetched or not yet ingested; `force`
    /// narrows the pool to the settled stations instead. Returns the run
    /// and link counts of the pass.
    pub async fn resolve_date(&self, date: NaiveDate, force: bool) -> Result<SyndicationOutcome> {
        let date_str = time::broadcast_date_str(date);

        let readiness = stations::ingest_readiness(&self.pool, &date_str).await?;
        let pending: Vec<&str> = readiness
            .iter()
            .filter(|r| !r.is_settled())
            .map(|r| r.station_name.as_str())
            .collect();
        if !pending.is_empty() {
            if !force {
                return Err(Error::IncompleteIngest(format!(
                    "stations not ingested for {}: {}",
                    date_str,
                    pending.join(", ")
                )));
            }
            warn!(date = %date_str, stations = ?pending, "resolving without unsettled stations");
        }
        let pool_ids: HashSet<i64> = readiness
            .iter()
            .filter(|r| r.is_settled())
            .map(|r| r.station_id)
            .collect();

        let attrs = plays::load_play_attrs(&self.pool, &date_str).await?;
        let mut hash_rows = Vec::new();
        for play in attrs.iter().filter(|a| pool_ids.contains(&a.station_id)) {
            hash_rows.extend(sequence_hasher::hash_play(play));
        }
        hashes::replace_for_date(&self.pool, &date_str, &hash_rows).await?;

        let cleared = plays::clear_master_links(&self.pool, &date_str).await?;
        if cleared > 0 {
            debug!(date = %date_str, cleared, "dropped previous master links");
        }

        let runs = group_runs(&hash_rows);
        let assigner = MasterAssigner::new(stations::authority_table(&self.pool).await?);
        let mut outcome = SyndicationOutcome {
            runs_found: runs.len() as u32,
            masters_assigned: 0,
        };
        for run in &runs {
            let Some(assignment) = assigner.assign(run) else {
                continue;
            };
            debug!(
                level = run.hash_level,
                digest = run.digest,
                members = run.members.len(),
                master = assignment.master_play_id,
                "assigned run master"
            );
            for play_id in &assignment.subordinate_play_ids {
                plays::set_master_link(&self.pool, *play_id, assignment.master_play_id).await?;
                outcome.masters_assigned += 1;
            }
        }

        if plays::chained_link_count(&self.pool, &date_str).await? > 0 {
            return Err(Error::Internal(format!(
                "master link chain detected for {}",
                date_str
            )));
        }

        info!(
            date = %date_str,
            runs = outcome.runs_found,
            masters = outcome.masters_assigned,
            "syndication resolution complete"
        );
        Ok(outcome)
    }
}

/// Group equal digests into runs, claiming the top level first.
///
/// A digest group becomes a run when it holds more than one member drawn
/// from more than one station; members of a run are not re-grouped at
/// lower levels. The all-unresolved sentinel digest never groups.
pub fn group_runs(rows: &[SequenceHash]) -> Vec<SyndicationRun> {
    let mut claimed: HashSet<i64> = HashSet::new();
    let mut runs = Vec::new();

    for &level in sequence_hasher::LEVELS.iter().rev() {
        let sentinel = sequence_hasher::sentinel_digest(level);
        let mut groups: BTreeMap<i64, Vec<RunMember>> = BTreeMap::new();
        for row in rows {
            if row.hash_level != level
                || row.digest == sentinel
                || claimed.contains(&row.play_id)
            {
                continue;
            }
            groups.entry(row.digest).or_default().push(RunMember {
                play_id: row.play_id,
                station_id: row.station_id,
            });
        }

        for (digest, mut members) in groups {
            let station_count: usize = members
                .iter()
                .map(|m| m.station_id)
                .collect::<HashSet<_>>()
                .len();
            if members.len() < 2 || station_count < 2 {
                continue;
            }
            members.sort_by_key(|m| m.play_id);
            claimed.extend(members.iter().map(|m| m.play_id));
            runs.push(SyndicationRun {
                hash_level: level,
                digest,
                members,
            });
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayAttrs;

    fn attrs(play_id: i64, station_id: i64, work: i64, conductor: Option<i64>) -> PlayAttrs {
        PlayAttrs {
            play_id,
            station_id,
            composer_id: Some(100),
            work_id: Some(work),
            conductor_id: conductor,
            performer_ids: Vec::new(),
        }
    }

    fn rows_for(plays: &[PlayAttrs]) -> Vec<SequenceHash> {
        plays.iter().flat_map(sequence_hasher::hash_play).collect()
    }

    #[test]
    fn test_equal_plays_group_once_at_top_level() {
        let rows = rows_for(&[
            attrs(1, 1, 500, Some(7)),
            attrs(2, 2, 500, Some(7)),
            attrs(3, 3, 500, Some(7)),
        ]);

        let runs = group_runs(&rows);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].hash_level, 3);
        let ids: Vec<i64> = runs[0].members.iter().map(|m| m.play_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_conductor_difference_falls_back_to_level_one() {
        let rows = rows_for(&[attrs(1, 1, 500, Some(7)), attrs(2, 2, 500, Some(8))]);

        let runs = group_runs(&rows);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].hash_level, 1);
    }

    #[test]
    fn test_single_member_groups_are_not_runs() {
        let rows = rows_for(&[attrs(1, 1, 500, None), attrs(2, 2, 600, None)]);
        assert!(group_runs(&rows).is_empty());
    }

    #[test]
    fn test_same_station_repeat_is_not_a_run() {
        let rows = rows_for(&[attrs(1, 1, 500, None), attrs(2, 1, 500, None)]);
        assert!(group_runs(&rows).is_empty());
    }

    #[test]
    fn test_same_station_repeat_joins_a_cross_station_run() {
        let rows = rows_for(&[
            attrs(1, 1, 500, None),
            attrs(2, 1, 500, None),
            attrs(3, 2, 500, None),
        ]);

        let runs = group_runs(&rows);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].members.len(), 3);
    }

    #[test]
    fn test_all_unresolved_plays_never_group() {
        let blank = |play_id, station_id| PlayAttrs {
            play_id,
            station_id,
            composer_id: None,
            work_id: None,
            conductor_id: None,
            performer_ids: Vec::new(),
        };
        let rows = rows_for(&[blank(1, 1), blank(2, 2)]);
        assert!(group_runs(&rows).is_empty());
    }

    #[test]
    fn test_grouping_is_input_order_independent() {
        let mut rows = rows_for(&[
            attrs(1, 1, 500, Some(7)),
            attrs(2, 2, 500, Some(7)),
            attrs(3, 1, 600, None),
            attrs(4, 2, 600, None),
        ]);
        let forward = group_runs(&rows);
        rows.reverse();
        let backward = group_runs(&rows);
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
    }
}
