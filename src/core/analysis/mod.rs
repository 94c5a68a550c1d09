//! # Analysis Module
//!
//! The batched scoring pass: every sampled asset gets a thumbnail fetch
//! and an oracle verdict, three at a time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::library::{AssetId, PhotoLibrary};
use crate::core::oracle::ScoringOracle;
use crate::core::pool::{PoolConfig, PoolItem, WorkerPool};
use crate::core::sampler::SampledAsset;
use crate::error::{FailureKind, TaskFailure, TriageError};
use crate::events::{AnalysisEvent, Event, EventSender};

/// Concurrent analysis tasks per batch.
///
/// Each in-flight task holds one decoded thumbnail, so this also caps the
/// pass's peak decode memory.
pub const ANALYSIS_BATCH_SIZE: usize = 3;

/// Edge of the thumbnail requested for scoring. Small enough to keep
/// per-task memory flat; large enough for blur statistics to mean
/// something.
pub const ANALYSIS_THUMBNAIL_EDGE: u32 = 512;

/// Input message for one analysis task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub asset_id: AssetId,
    pub from_screenshot_album: bool,
}

impl PoolItem for AnalysisRequest {
    fn asset_id(&self) -> &AssetId {
        &self.asset_id
    }
}

/// Output message for one analysis task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub asset_id: AssetId,
    pub final_score: f64,
    /// Opaque oracle fields, carried through for display
    pub details: serde_json::Value,
}

/// Everything a finished analysis pass produced.
#[derive(Debug)]
pub struct AnalysisReport {
    /// Successful outcomes, in sampling order
    pub outcomes: Vec<AnalysisOutcome>,
    /// Contained per-asset failures
    pub skipped: Vec<TaskFailure>,
}

/// Batched analysis pass over sampled assets.
pub struct AnalysisPool {
    library: Arc<dyn PhotoLibrary>,
    oracle: Arc<dyn ScoringOracle>,
    batch_size: usize,
}

impl AnalysisPool {
    pub fn new(library: Arc<dyn PhotoLibrary>, oracle: Arc<dyn ScoringOracle>) -> Self {
        Self {
            library,
            oracle,
            batch_size: ANALYSIS_BATCH_SIZE,
        }
    }

    /// Score every sampled asset.
    ///
    /// Individual failures are contained: the asset is logged, reported as
    /// an event and left out of the outcomes. Only a worker environment
    /// that cannot start aborts the pass. The library's decode cache is
    /// released after every settled batch, the last one included.
    pub fn analyze(
        &self,
        sampled: Vec<SampledAsset>,
        events: &EventSender,
    ) -> Result<AnalysisReport, TriageError> {
        let total = sampled.len();
        events.send(Event::Analysis(AnalysisEvent::Started {
            total,
            batches: total.div_ceil(self.batch_size),
        }));

        let requests: Vec<AnalysisRequest> = sampled
            .into_iter()
            .map(|asset| AnalysisRequest {
                asset_id: asset.id,
                from_screenshot_album: asset.from_screenshot_album,
            })
            .collect();

        let worker_library = Arc::clone(&self.library);
        let worker_oracle = Arc::clone(&self.oracle);
        let pool = WorkerPool::start(
            PoolConfig {
                batch_size: self.batch_size,
                worker_name: "analysis",
                panic_kind: FailureKind::Oracle,
            },
            move |request: AnalysisRequest| {
                score_asset(&*worker_library, &*worker_oracle, request)
            },
        )?;

        let settled = pool.run_batches(requests, |stats| {
            // The batch has fully settled here; drop decoded thumbnails
            // before more work starts.
            self.library.clear_decode_cache();
            events.send(Event::Analysis(AnalysisEvent::BatchSettled {
                batch: stats.batch,
                completed: stats.completed,
                total: stats.total,
            }));
        })?;

        let mut outcomes = Vec::with_capacity(settled.len());
        let mut skipped = Vec::new();
        for result in settled {
            match result {
                Ok(outcome) => {
                    events.send(Event::Analysis(AnalysisEvent::AssetScored {
                        asset_id: outcome.asset_id.clone(),
                        final_score: outcome.final_score,
                    }));
                    outcomes.push(outcome);
                }
                Err(failure) => {
                    warn!(asset = %failure.asset_id, kind = %failure.kind, "skipping asset: {}", failure.detail);
                    events.send(Event::Analysis(AnalysisEvent::AssetSkipped {
                        asset_id: failure.asset_id.clone(),
                        reason: failure.detail.clone(),
                    }));
                    skipped.push(failure);
                }
            }
        }

        events.send(Event::Analysis(AnalysisEvent::Completed {
            scored: outcomes.len(),
            skipped: skipped.len(),
        }));
        Ok(AnalysisReport { outcomes, skipped })
    }
}

/// One analysis task: thumbnail fetch plus oracle verdict.
fn score_asset(
    library: &dyn PhotoLibrary,
    oracle: &dyn ScoringOracle,
    request: AnalysisRequest,
) -> Result<AnalysisOutcome, TaskFailure> {
    let AnalysisRequest {
        asset_id,
        from_screenshot_album,
    } = request;

    let thumbnail = library
        .small_thumbnail(&asset_id, ANALYSIS_THUMBNAIL_EDGE)
        .map_err(|e| {
            TaskFailure::new(asset_id.clone(), FailureKind::AssetUnavailable, e.to_string())
        })?
        .ok_or_else(|| {
            TaskFailure::new(
                asset_id.clone(),
                FailureKind::AssetUnavailable,
                "no thumbnail available",
            )
        })?;

    let score = oracle
        .analyze(&thumbnail, from_screenshot_album)
        .map_err(|e| TaskFailure::new(asset_id.clone(), FailureKind::Oracle, e.to_string()))?;

    Ok(AnalysisOutcome {
        asset_id,
        final_score: score.final_score,
        details: score.details,
    })
}
