//! Orphaned chunk sweep.
//!
//! Chunk sets and catalog rows are not updated transactionally, so a crash
//! between a chunk write and a catalog insert (or between a chunk delete and
//! a catalog remove) leaves chunks nothing references. The sweep finds them
//! and reports catalog entries whose stored chunks no longer match.

use crate::chunks::ChunkStore;
use crate::error::BucketResult;
use crate::upload::InFlight;
use chunkvault_catalog::{FileCatalog, RevisionRepo};
use chunkvault_core::FileId;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Statistics from an orphan sweep.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SweepStats {
    /// File IDs with at least one stored chunk.
    pub files_scanned: u64,
    /// File IDs whose chunks have no catalog entry.
    pub orphans_found: u64,
    /// Chunk objects deleted (zero on a dry run).
    pub chunks_deleted: u64,
    /// Committed revisions whose stored chunk count disagrees with their length.
    pub damaged: u64,
    /// In-flight uploads that were left alone.
    pub in_flight_skipped: u64,
    pub orphan_ids: Vec<FileId>,
    pub damaged_ids: Vec<FileId>,
}

pub(crate) async fn sweep_orphans(
    chunks: &ChunkStore,
    catalog: &dyn FileCatalog,
    in_flight: &InFlight,
    dry_run: bool,
) -> BucketResult<SweepStats> {
    // Snapshot the catalog before the chunks: anything committed in between
    // shows up as uncatalogued and is re-checked by id below.
    let catalogued: HashSet<FileId> = catalog.list_ids().await?.into_iter().collect();
    let census = chunks.chunk_census().await?;

    let mut stats = SweepStats {
        files_scanned: census.len() as u64,
        ..Default::default()
    };

    for (&file_id, &stored) in &census {
        if catalogued.contains(&file_id) {
            continue;
        }
        if in_flight.contains_key(&file_id) {
            stats.in_flight_skipped += 1;
            continue;
        }
        // Committed after the id snapshot was taken.
        if catalog.find_by_id(file_id).await?.is_some() {
            continue;
        }

        stats.orphans_found += 1;
        stats.orphan_ids.push(file_id);

        if dry_run {
            debug!(%file_id, chunks = stored, "would delete orphaned chunks");
            continue;
        }
        let deleted = chunks.delete_chunks(file_id).await?;
        stats.chunks_deleted += deleted;
        debug!(%file_id, deleted, "deleted orphaned chunks");
    }

    for filename in catalog.list_filenames(None).await? {
        for revision in catalog.list_revisions(&filename).await? {
            if !catalogued.contains(&revision.id) {
                continue;
            }
            let stored = census.get(&revision.id).copied().unwrap_or(0);
            let expected = revision.chunk_count();
            if stored != expected {
                warn!(
                    id = %revision.id,
                    filename = %revision.filename,
                    revision = revision.revision,
                    stored,
                    expected,
                    "revision has wrong number of chunks"
                );
                stats.damaged += 1;
                stats.damaged_ids.push(revision.id);
            }
        }
    }

    info!(
        bucket = catalog.bucket(),
        files_scanned = stats.files_scanned,
        orphans_found = stats.orphans_found,
        chunks_deleted = stats.chunks_deleted,
        damaged = stats.damaged,
        in_flight_skipped = stats.in_flight_skipped,
        dry_run,
        "orphan sweep completed"
    );

    Ok(stats)
}
