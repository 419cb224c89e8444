//! Sequence digests over canonical play attributes
//!
//! A digest is a pure function of the attribute tuple at one level:
//! level 1 covers composer and work, level 2 adds the conductor, level 3
//! adds the performer set. Station and timing never enter the digest, so
//! two stations that aired the same content hash equal once identity
//! resolution has converged upstream. An unresolved attribute hashes as an
//! explicit empty field, letting two both-unknown plays match each other
//! without colliding with any resolved value.

use sha2::{Digest, Sha256};

use crate::models::{PlayAttrs, SequenceHash};

/// Attribute tiers, lowest to highest
pub const LEVELS: [i64; 3] = [1, 2, 3];

/// Digest of one play at one level.
pub fn digest(attrs: &PlayAttrs, level: i64) -> i64 {
    digest_fields(
        level,
        attrs.composer_id,
        attrs.work_id,
        attrs.conductor_id,
        &attrs.performer_ids,
    )
}

/// Digest of the all-unresolved tuple at a level. Stored like any other
/// digest but excluded from grouping, so plays carrying no usable
/// attributes never form a run among themselves.
pub fn sentinel_digest(level: i64) -> i64 {
    digest_fields(level, None, None, None, &[])
}

/// All levels of one play, ready for storage.
pub fn hash_play(attrs: &PlayAttrs) -> Vec<SequenceHash> {
    LEVELS
        .iter()
        .map(|&level| SequenceHash {
            play_id: attrs.play_id,
            station_id: attrs.station_id,
            hash_level: level,
            digest: digest(attrs, level),
        })
        .collect()
}

/// SHA-256 over the level tag and a length-prefixed field sequence,
/// truncated to the first eight bytes as a signed big-endian value.
fn digest_fields(
    level: i64,
    composer: Option<i64>,
    work: Option<i64>,
    conductor: Option<i64>,
    performers: &[i64],
) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update([level as u8]);
    push_field(&mut hasher, composer);
    push_field(&mut hasher, work);
    if level >= 2 {
        push_field(&mut hasher, conductor);
    }
    if level >= 3 {
        // The performer set is one field; order and duplicates are erased
        let mut ids = performers.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
        hasher.update((bytes.len() as u32).to_be_bytes());
        hasher.update(&bytes);
    }

    let out = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&out[..8]);
    i64::from_be_bytes(head)
}

fn push_field(hasher: &mut Sha256, value: Option<i64>) {
    match value {
        Some(id) => {
            hasher.update(8u32.to_be_bytes());
            hasher.update(id.to_be_bytes());
        }
        None => hasher.update(0u32.to_be_bytes()),
    }
}
