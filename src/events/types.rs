//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::library::AssetId;

/// All events emitted by the triage engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scan-level events
    Scan(ScanEvent),
    /// Sampling phase events
    Sample(SampleEvent),
    /// Analysis phase events
    Analysis(AnalysisEvent),
    /// Compression pass events
    Compression(CompressionEvent),
}

/// Events spanning a whole scan pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A scan pass has started
    Started { scan_id: Uuid },
    /// The scan pass finished and the scored list was replaced
    Completed { summary: ScanSummary },
}

/// Summary of a completed scan pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Identifier of the scan pass
    pub scan_id: Uuid,
    /// Candidates drawn by the sampler
    pub sampled: usize,
    /// Assets that received a score
    pub scored: usize,
    /// Assets skipped by contained failures
    pub skipped: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Events during candidate sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SampleEvent {
    /// Sampling has started
    Started { albums: usize },
    /// One album was enumerated
    AlbumSampled {
        album: String,
        /// Unique assets this album added to the pool
        added: usize,
        /// Whether this was a priority album
        priority: bool,
    },
    /// Sampling completed
    Completed { candidates: usize },
}

/// Events during the batched analysis pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisEvent {
    /// Analysis has started
    Started { total: usize, batches: usize },
    /// An asset received a score
    AssetScored { asset_id: AssetId, final_score: f64 },
    /// An asset was skipped but the pass continues
    AssetSkipped { asset_id: AssetId, reason: String },
    /// Every task of a batch settled; caches were released
    BatchSettled {
        batch: usize,
        completed: usize,
        total: usize,
    },
    /// Analysis completed
    Completed { scored: usize, skipped: usize },
}

/// Events during the batched compression pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompressionEvent {
    /// Compression has started
    Started { albums: usize, total: usize },
    /// An asset was re-encoded and stored
    AssetCompressed {
        asset_id: AssetId,
        original_bytes: u64,
        compressed_bytes: u64,
    },
    /// An asset was skipped but the pass continues
    AssetSkipped { asset_id: AssetId, reason: String },
    /// Every task of a batch settled; caches were released
    BatchSettled {
        batch: usize,
        completed: usize,
        total: usize,
    },
    /// Compression completed
    Completed {
        total_files: usize,
        /// Negative when re-encoding grew the data
        space_saved: i64,
        skipped: usize,
    },
}
