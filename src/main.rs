//! # photo-triage CLI
//!
//! Command-line interface for the photo triage engine.
//!
//! ## Usage
//! ```bash
//! photo-triage scan ~/Photos --seed 42
//! photo-triage review ~/Photos --delete
//! photo-triage compress ~/Photos Camera --quality 70
//! ```

mod cli;

use photo_triage::Result;

fn main() -> Result<()> {
    photo_triage::init_tracing();
    cli::run()
}
