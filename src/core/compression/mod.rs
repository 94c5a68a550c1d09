//! # Compression Module
//!
//! The batched recompression pass: whole albums re-encoded as JPEG at a
//! caller-chosen quality into parallel "<name> (compressed)" albums.
//!
//! Originals are never touched. Removing them afterwards is a separate,
//! explicit orchestrator call the user makes once they have reviewed the
//! copies.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::imaging;
use crate::core::library::{
    list_all_assets, Album, AssetId, PhotoLibrary, DEFAULT_ASSET_PAGE_SIZE,
};
use crate::core::pool::{PoolConfig, PoolItem, WorkerPool};
use crate::error::{FailureKind, TaskFailure, TriageError};
use crate::events::{CompressionEvent, Event, EventSender};

/// Concurrent compression tasks per batch.
///
/// A compression task holds a full-resolution original plus its re-encoded
/// copy, a far heavier footprint than an analysis thumbnail, hence the
/// smaller batch.
pub const COMPRESSION_BATCH_SIZE: usize = 2;

/// Suffix appended to the source album's name for the destination album
pub const COMPRESSED_ALBUM_SUFFIX: &str = " (compressed)";

/// Extension given to re-encoded assets
const TARGET_EXTENSION: &str = "jpg";

/// Input message for one compression task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionRequest {
    pub asset_id: AssetId,
    pub destination_album: String,
    pub quality: u8,
}

impl PoolItem for CompressionRequest {
    fn asset_id(&self) -> &AssetId {
        &self.asset_id
    }
}

/// Output message for one compression task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionOutcome {
    pub asset_id: AssetId,
    pub original_size: u64,
    pub compressed_size: u64,
}

/// Aggregate of one compression pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Assets successfully re-encoded and stored
    pub total_files: usize,
    /// `sum(original) - sum(compressed)` over successful assets only;
    /// negative when re-encoding grew the data
    pub space_saved: i64,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    /// Contained per-asset failures
    pub skipped: Vec<TaskFailure>,
    pub duration_ms: u64,
}

/// Batched album recompression pass.
pub struct CompressionPool {
    library: Arc<dyn PhotoLibrary>,
    batch_size: usize,
}

impl CompressionPool {
    pub fn new(library: Arc<dyn PhotoLibrary>) -> Self {
        Self {
            library,
            batch_size: COMPRESSION_BATCH_SIZE,
        }
    }

    /// Re-encode every asset of the given albums at `quality`, two at a
    /// time.
    ///
    /// Individual failures are contained and reported in the result's
    /// `skipped` list; the library's decode cache is released after every
    /// settled batch.
    pub fn compress(
        &self,
        albums: &[Album],
        quality: u8,
        events: &EventSender,
    ) -> Result<CompressionResult, TriageError> {
        if quality > 100 {
            return Err(TriageError::Config(format!(
                "quality must be 0-100, got {quality}"
            )));
        }
        let start = Instant::now();

        let mut requests = Vec::new();
        for album in albums {
            let destination = format!("{}{}", album.name, COMPRESSED_ALBUM_SUFFIX);
            for asset_id in list_all_assets(&*self.library, album, DEFAULT_ASSET_PAGE_SIZE)? {
                requests.push(CompressionRequest {
                    asset_id,
                    destination_album: destination.clone(),
                    quality,
                });
            }
        }

        events.send(Event::Compression(CompressionEvent::Started {
            albums: albums.len(),
            total: requests.len(),
        }));

        let worker_library = Arc::clone(&self.library);
        let pool = WorkerPool::start(
            PoolConfig {
                batch_size: self.batch_size,
                worker_name: "compress",
                panic_kind: FailureKind::Decode,
            },
            move |request: CompressionRequest| compress_asset(&*worker_library, request),
        )?;

        let settled = pool.run_batches(requests, |stats| {
            self.library.clear_decode_cache();
            events.send(Event::Compression(CompressionEvent::BatchSettled {
                batch: stats.batch,
                completed: stats.completed,
                total: stats.total,
            }));
        })?;

        let mut total_files = 0usize;
        let mut total_original = 0u64;
        let mut total_compressed = 0u64;
        let mut skipped = Vec::new();
        for result in settled {
            match result {
                Ok(outcome) => {
                    events.send(Event::Compression(CompressionEvent::AssetCompressed {
                        asset_id: outcome.asset_id.clone(),
                        original_bytes: outcome.original_size,
                        compressed_bytes: outcome.compressed_size,
                    }));
                    total_files += 1;
                    total_original += outcome.original_size;
                    total_compressed += outcome.compressed_size;
                }
                Err(failure) => {
                    warn!(asset = %failure.asset_id, kind = %failure.kind, "skipping asset: {}", failure.detail);
                    events.send(Event::Compression(CompressionEvent::AssetSkipped {
                        asset_id: failure.asset_id.clone(),
                        reason: failure.detail.clone(),
                    }));
                    skipped.push(failure);
                }
            }
        }

        let result = CompressionResult {
            total_files,
            space_saved: total_original as i64 - total_compressed as i64,
            total_original_bytes: total_original,
            total_compressed_bytes: total_compressed,
            skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        events.send(Event::Compression(CompressionEvent::Completed {
            total_files: result.total_files,
            space_saved: result.space_saved,
            skipped: result.skipped.len(),
        }));
        Ok(result)
    }
}

/// One compression task: fetch, re-encode, store.
fn compress_asset(
    library: &dyn PhotoLibrary,
    request: CompressionRequest,
) -> Result<CompressionOutcome, TaskFailure> {
    let CompressionRequest {
        asset_id,
        destination_album,
        quality,
    } = request;

    let original = library
        .original_bytes(&asset_id)
        .map_err(|e| {
            TaskFailure::new(asset_id.clone(), FailureKind::AssetUnavailable, e.to_string())
        })?
        .ok_or_else(|| {
            TaskFailure::new(
                asset_id.clone(),
                FailureKind::AssetUnavailable,
                "original bytes unavailable",
            )
        })?;

    let decoded = imaging::decode_bytes(&original)
        .map_err(|e| TaskFailure::new(asset_id.clone(), FailureKind::Decode, e.to_string()))?;
    let compressed = imaging::encode_jpeg(&decoded, quality)
        .map_err(|e| TaskFailure::new(asset_id.clone(), FailureKind::Decode, e.to_string()))?;

    let title = output_title(library.asset_title(&asset_id).as_deref(), &asset_id);
    library
        .save_image(&compressed, &title, &destination_album)
        .map_err(|e| TaskFailure::new(asset_id.clone(), FailureKind::Write, e.to_string()))?;

    Ok(CompressionOutcome {
        asset_id,
        original_size: original.len() as u64,
        compressed_size: compressed.len() as u64,
    })
}

/// Output file name: the asset's title with its extension swapped for
/// ".jpg", or a name derived from the id when the asset has no title.
fn output_title(title: Option<&str>, asset_id: &AssetId) -> String {
    match title {
        Some(title) => format!("{}.{TARGET_EXTENSION}", strip_extension(title)),
        None => format!(
            "asset-{}.{TARGET_EXTENSION}",
            flatten_id(asset_id.as_str())
        ),
    }
}

fn strip_extension(title: &str) -> &str {
    match title.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => title,
    }
}

/// Ids may be relative paths; generated names must stay flat.
fn flatten_id(id: &str) -> String {
    id.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '-' } else { c })
        .collect()
}
