//! # Orchestrator Module
//!
//! The composition root. Owns the scored list and the seen set, sequences
//! sampling, analysis, selection, deletion and compression, and is the only
//! place where engine state mutates.
//!
//! State discipline: every mutating operation takes `&mut self`, so a
//! second writer is a compile error rather than a data race. Worker pools
//! never see this state; they exchange plain messages and their results are
//! folded back in right here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::core::analysis::AnalysisPool;
use crate::core::compression::{CompressionPool, CompressionResult};
use crate::core::library::{
    list_all_assets, Album, AssetId, PhotoLibrary, DEFAULT_ASSET_PAGE_SIZE,
};
use crate::core::oracle::ScoringOracle;
use crate::core::sampler::{AssetSampler, SamplerConfig};
use crate::core::selection::{ScoreSelector, ScoredAsset};
use crate::error::{LibraryError, TaskFailure, TriageError};
use crate::events::{Event, EventSender, ScanEvent, ScanSummary};

/// Options for one scan pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Also forget every previously offered id. The seen set otherwise
    /// survives rescans.
    pub reset_seen: bool,
}

/// Result of one scan pass.
#[derive(Debug)]
pub struct ScanReport {
    pub scan_id: Uuid,
    /// Candidates drawn by the sampler
    pub sampled: usize,
    /// Assets that made it onto the scored list
    pub scored: usize,
    /// Contained per-asset failures
    pub skipped: Vec<TaskFailure>,
    pub duration_ms: u64,
}

impl ScanReport {
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            scan_id: self.scan_id,
            sampled: self.sampled,
            scored: self.scored,
            skipped: self.skipped.len(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    library: Option<Arc<dyn PhotoLibrary>>,
    oracle: Option<Arc<dyn ScoringOracle>>,
    events: Option<EventSender>,
    sampler_config: SamplerConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn library(mut self, library: Arc<dyn PhotoLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn ScoringOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Event sink for progress reporting; defaults to a disabled sender.
    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn sampler_config(mut self, config: SamplerConfig) -> Self {
        self.sampler_config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator, TriageError> {
        let library = self
            .library
            .ok_or_else(|| TriageError::Config("a photo library is required".to_string()))?;
        let oracle = self
            .oracle
            .ok_or_else(|| TriageError::Config("a scoring oracle is required".to_string()))?;

        Ok(Orchestrator {
            analysis: AnalysisPool::new(Arc::clone(&library), oracle),
            compression: CompressionPool::new(Arc::clone(&library)),
            sampler: AssetSampler::new(self.sampler_config),
            selector: ScoreSelector::new(),
            events: self.events.unwrap_or_else(EventSender::disabled),
            library,
            scored: Vec::new(),
            has_scanned: false,
        })
    }
}

/// The triage engine's single stateful entry point.
pub struct Orchestrator {
    library: Arc<dyn PhotoLibrary>,
    analysis: AnalysisPool,
    compression: CompressionPool,
    sampler: AssetSampler,
    selector: ScoreSelector,
    events: EventSender,
    /// Replaced wholesale by a successful scan, pruned by confirmed deletes
    scored: Vec<ScoredAsset>,
    has_scanned: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("scored", &self.scored)
            .field("has_scanned", &self.has_scanned)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Run one scan pass with default options.
    pub fn scan(&mut self) -> Result<ScanReport, TriageError> {
        self.scan_with_options(ScanOptions::default())
    }

    /// Run one scan pass: sample, analyze, replace the scored list.
    ///
    /// The replacement is all-or-nothing: a fatal error leaves the previous
    /// scored list and seen set untouched, and `reset_seen` only takes
    /// effect together with a successful pass.
    pub fn scan_with_options(&mut self, options: ScanOptions) -> Result<ScanReport, TriageError> {
        let start = Instant::now();
        let scan_id = Uuid::new_v4();
        self.events.send(Event::Scan(ScanEvent::Started { scan_id }));

        let sampled = self.sampler.sample(&*self.library, &self.events)?;
        let sampled_count = sampled.len();

        let analyzed = self.analysis.analyze(sampled, &self.events)?;

        self.scored = analyzed
            .outcomes
            .into_iter()
            .map(|outcome| ScoredAsset {
                asset_id: outcome.asset_id,
                final_score: outcome.final_score,
            })
            .collect();
        if options.reset_seen {
            self.selector.reset();
        }
        self.has_scanned = true;

        let report = ScanReport {
            scan_id,
            sampled: sampled_count,
            scored: self.scored.len(),
            skipped: analyzed.skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            scan = %scan_id,
            sampled = report.sampled,
            scored = report.scored,
            skipped = report.skipped.len(),
            "scan complete"
        );
        self.events.send(Event::Scan(ScanEvent::Completed {
            summary: report.summary(),
        }));
        Ok(report)
    }

    /// Next page of deletion candidates, worst first.
    ///
    /// `excluded` is the caller's keep-list for this call; it is consulted,
    /// not stored. Returned ids are recorded as seen and never offered
    /// again, even across rescans, until a scan with `reset_seen` runs.
    pub fn select_photos_to_delete(&mut self, excluded: &HashSet<AssetId>) -> Vec<ScoredAsset> {
        self.selector.select(&self.scored, excluded)
    }

    /// Delete the given assets from the library.
    ///
    /// Returns only the ids the library confirmed; space accounting must be
    /// based on these, never on the request. Confirmed ids are also pruned
    /// from the scored list.
    pub fn delete_photos(&mut self, ids: &[AssetId]) -> Result<Vec<AssetId>, TriageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let confirmed = self.library.delete_assets(ids)?;
        if confirmed.len() < ids.len() {
            warn!(
                requested = ids.len(),
                confirmed = confirmed.len(),
                "library confirmed only part of the deletion"
            );
        }

        let confirmed_set: HashSet<&AssetId> = confirmed.iter().collect();
        self.scored
            .retain(|asset| !confirmed_set.contains(&asset.asset_id));
        Ok(confirmed)
    }

    /// Recompress the named albums into "<name> (compressed)" albums.
    ///
    /// Originals stay in place; see [`Orchestrator::delete_album`] for the
    /// explicit follow-up.
    pub fn compress_albums(
        &mut self,
        album_names: &[String],
        quality: u8,
    ) -> Result<CompressionResult, TriageError> {
        let albums = self.resolve_albums(album_names)?;
        self.compression.compress(&albums, quality, &self.events)
    }

    /// Remove every asset of `album_name` from the library.
    ///
    /// The explicit follow-up to a reviewed compression pass; never
    /// triggered automatically. Returns the confirmed ids.
    pub fn delete_album(&mut self, album_name: &str) -> Result<Vec<AssetId>, TriageError> {
        let album = self.resolve_album(album_name)?;
        let ids = list_all_assets(&*self.library, &album, DEFAULT_ASSET_PAGE_SIZE)?;
        self.delete_photos(&ids)
    }

    /// The current scored list, in scan order.
    pub fn scored_assets(&self) -> &[ScoredAsset] {
        &self.scored
    }

    pub fn seen_count(&self) -> usize {
        self.selector.seen_count()
    }

    pub fn has_scanned(&self) -> bool {
        self.has_scanned
    }

    fn resolve_album(&self, name: &str) -> Result<Album, TriageError> {
        let listing = self.library.list_albums()?;
        listing
            .into_iter()
            .find(|album| album.name == name)
            .ok_or_else(|| {
                TriageError::from(LibraryError::AlbumNotFound {
                    name: name.to_string(),
                })
            })
    }

    fn resolve_albums(&self, names: &[String]) -> Result<Vec<Album>, TriageError> {
        names
            .iter()
            .map(|name| self.resolve_album(name))
            .collect()
    }
}
