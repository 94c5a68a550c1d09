//! # Core Module
//!
//! The UI-agnostic photo triage engine.
//!
//! ## Modules
//! - `library` - Abstracts the photo store behind a trait
//! - `sampler` - Draws a bounded, priority-aware candidate sample
//! - `oracle` - Scores a thumbnail's badness
//! - `analysis` - Runs the oracle over candidates in settled batches
//! - `selection` - Pages the worst scores for review, without repeats
//! - `compression` - Recompresses whole albums in settled batches
//! - `pool` - The batch-barrier worker pool under analysis and compression
//! - `imaging` - JPEG decode, encode and resize helpers
//! - `orchestrator` - Composition root owning all engine state

pub mod analysis;
pub mod compression;
pub mod imaging;
pub mod library;
pub mod oracle;
pub mod orchestrator;
pub mod pool;
pub mod sampler;
pub mod selection;

// Re-export commonly used types
pub use compression::CompressionResult;
pub use library::{Album, AssetId, PhotoLibrary, StorageStats};
pub use orchestrator::{Orchestrator, ScanOptions, ScanReport};
pub use selection::{ScoredAsset, REVIEW_PAGE_SIZE};
