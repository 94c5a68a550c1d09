//! # Photo Triage
//!
//! A photo-library triage engine that surfaces the worst photos for review
//! and shrinks bulky albums, without ever deleting anything on its own.
//!
//! ## Core Philosophy
//! - **Never auto-delete** - Every removal is an explicit, caller-confirmed step
//! - **Bounded everywhere** - Sampling is capped, work runs in small settled batches
//! - **Contain failures** - One bad asset skips; only environment faults abort a pass
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and presentation layers:
//! - `core` - Sampling, scoring, selection and compression
//! - `events` - Event-driven progress reporting (GUI-ready)
//! - `error` - User-friendly error types
//! - `cli` - Command-line interface

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{Result, TriageError};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
