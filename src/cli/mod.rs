//! # CLI Module
//!
//! Command-line interface for the photo triage engine.
//!
//! ## Usage
//! ```bash
//! # Score a library and show the worst photos
//! photo-triage scan ~/Photos
//!
//! # Review worst-first pages and delete after confirmation
//! photo-triage review ~/Photos --delete
//!
//! # Recompress bulky albums into "<album> (compressed)"
//! photo-triage compress ~/Photos Camera WhatsApp --quality 70
//!
//! # Storage and checkpoint overview
//! photo-triage status ~/Photos
//! ```

mod state;

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_triage::core::library::{FsPhotoLibrary, FsStorageStats};
use photo_triage::core::oracle::SharpnessOracle;
use photo_triage::core::sampler::SamplerConfig;
use photo_triage::core::{
    AssetId, CompressionResult, Orchestrator, PhotoLibrary, ScanOptions, ScanReport, ScoredAsset,
    StorageStats,
};
use photo_triage::error::Result;
use photo_triage::events::{AnalysisEvent, CompressionEvent, Event, EventChannel, EventReceiver};
use photo_triage::TriageError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use state::ReviewState;

/// Photo Triage - surface the worst photos, shrink the biggest albums
#[derive(Parser, Debug)]
#[command(name = "photo-triage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample and score the library, worst photos first
    Scan {
        /// Library root directory
        root: PathBuf,

        /// Forget previously offered photos
        #[arg(long)]
        reset_seen: bool,

        /// Fixed sampling seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Review state path
        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Page through the worst photos and optionally delete them
    Review {
        /// Library root directory
        root: PathBuf,

        /// Maximum pages to review
        #[arg(short, long, default_value = "5")]
        pages: usize,

        /// Delete each page after confirmation
        #[arg(long)]
        delete: bool,

        /// Skip confirmations (use with care)
        #[arg(short, long)]
        yes: bool,

        /// Mark an id as kept; never offered again (repeatable)
        #[arg(long)]
        keep: Vec<String>,

        /// Fixed sampling seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Review state path
        #[arg(long)]
        state_file: Option<PathBuf>,
    },

    /// Recompress albums into "<album> (compressed)" copies
    Compress {
        /// Library root directory
        root: PathBuf,

        /// Albums to recompress
        #[arg(required = true)]
        albums: Vec<String>,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value = "70")]
        quality: u8,

        /// Delete each source album afterwards, on confirmation
        #[arg(long)]
        delete_originals: bool,

        /// Skip confirmations (use with care)
        #[arg(short, long)]
        yes: bool,
    },

    /// Show storage and review checkpoint details
    Status {
        /// Library root directory
        root: PathBuf,

        /// Review state path
        #[arg(long)]
        state_file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (ids only, worst first)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            root,
            reset_seen,
            seed,
            output,
            state_file,
        } => run_scan(root, reset_seen, seed, output, state_file),
        Commands::Review {
            root,
            pages,
            delete,
            yes,
            keep,
            seed,
            state_file,
        } => run_review(root, pages, delete, yes, keep, seed, state_file),
        Commands::Compress {
            root,
            albums,
            quality,
            delete_originals,
            yes,
        } => run_compress(root, albums, quality, delete_originals, yes),
        Commands::Status { root, state_file } => run_status(root, state_file),
    }
}

fn run_scan(
    root: PathBuf,
    reset_seen: bool,
    seed: Option<u64>,
    output: OutputFormat,
    state_file: Option<PathBuf>,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        print_header(&term);
    }

    let state_path = state_file.unwrap_or_else(state::default_state_path);
    let mut review_state = ReviewState::load(&state_path);

    let library: Arc<dyn PhotoLibrary> = Arc::new(FsPhotoLibrary::open(&root)?);
    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(output, OutputFormat::Pretty) {
        Some(new_progress_bar())
    } else {
        None
    };
    let event_thread = spawn_event_thread(receiver, progress);

    let mut orchestrator = Orchestrator::builder()
        .library(Arc::clone(&library))
        .oracle(Arc::new(SharpnessOracle::new()))
        .events(sender)
        .sampler_config(SamplerConfig {
            seed,
            ..SamplerConfig::default()
        })
        .build()?;

    let report = match orchestrator.scan_with_options(ScanOptions { reset_seen }) {
        Ok(report) => report,
        Err(error) => {
            print_fatal_hint(&term, &error);
            return Err(error);
        }
    };

    let mut ranked = orchestrator.scored_assets().to_vec();
    ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

    review_state.has_scanned = true;
    save_state(&term, &mut review_state, &state_path);

    drop(orchestrator);
    event_thread.join().ok();

    let stats = FsStorageStats::new(&root);
    match output {
        OutputFormat::Pretty => print_scan_pretty(&term, &report, &ranked, &stats),
        OutputFormat::Json => print_scan_json(&report, &ranked),
        OutputFormat::Minimal => {
            for asset in &ranked {
                println!("{}", asset.asset_id);
            }
        }
    }

    Ok(())
}

fn run_review(
    root: PathBuf,
    pages: usize,
    delete: bool,
    yes: bool,
    keep: Vec<String>,
    seed: Option<u64>,
    state_file: Option<PathBuf>,
) -> Result<()> {
    let term = Term::stderr();
    print_header(&term);

    let state_path = state_file.unwrap_or_else(state::default_state_path);
    let mut review_state = ReviewState::load(&state_path);
    for id in keep {
        review_state.keep(AssetId::new(id));
    }

    let library: Arc<dyn PhotoLibrary> = Arc::new(FsPhotoLibrary::open(&root)?);
    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_event_thread(receiver, Some(new_progress_bar()));

    let mut orchestrator = Orchestrator::builder()
        .library(Arc::clone(&library))
        .oracle(Arc::new(SharpnessOracle::new()))
        .events(sender)
        .sampler_config(SamplerConfig {
            seed,
            ..SamplerConfig::default()
        })
        .build()?;

    let report = match orchestrator.scan() {
        Ok(report) => report,
        Err(error) => {
            print_fatal_hint(&term, &error);
            return Err(error);
        }
    };
    review_state.has_scanned = true;

    term.write_line(&format!(
        "Scored {} of {} sampled photos.",
        style(report.scored).cyan(),
        report.sampled
    ))
    .ok();
    term.write_line("").ok();

    let excluded: HashSet<AssetId> = review_state.kept.clone();
    let mut requested_total = 0usize;
    let mut deleted_total = 0usize;
    let mut freed_total: u64 = 0;

    for page_number in 1..=pages {
        let page = orchestrator.select_photos_to_delete(&excluded);
        if page.is_empty() {
            term.write_line("Nothing left to review.").ok();
            break;
        }

        term.write_line(&format!(
            "{}",
            style(format!("Page {} (worst first):", page_number)).bold()
        ))
        .ok();
        for (index, asset) in page.iter().enumerate() {
            term.write_line(&format!(
                "  {:>2}. {}  {}",
                index + 1,
                style_score(asset.final_score),
                asset.asset_id
            ))
            .ok();
        }
        term.write_line("").ok();

        if !delete {
            continue;
        }

        // Sizes must be read before the delete; afterwards the assets are gone.
        let mut sizes: HashMap<AssetId, u64> = HashMap::new();
        for asset in &page {
            if let Ok(Some(size)) = library.asset_size(&asset.asset_id) {
                sizes.insert(asset.asset_id.clone(), size);
            }
        }

        if !yes && !confirm(&term, &format!("Delete these {} photos?", page.len())) {
            term.write_line("Skipped.").ok();
            term.write_line("").ok();
            continue;
        }

        let ids: Vec<AssetId> = page.iter().map(|a| a.asset_id.clone()).collect();
        let confirmed = orchestrator.delete_photos(&ids)?;
        let freed: u64 = confirmed
            .iter()
            .filter_map(|id| sizes.get(id).copied())
            .sum();

        requested_total += ids.len();
        deleted_total += confirmed.len();
        freed_total += freed;

        if confirmed.len() < ids.len() {
            term.write_line(&format!(
                "  {} the library refused {} of them",
                style("!").yellow(),
                ids.len() - confirmed.len()
            ))
            .ok();
        }
        term.write_line(&format!(
            "  {} deleted {} photos ({})",
            style("✓").green(),
            confirmed.len(),
            style(format_bytes(freed)).yellow()
        ))
        .ok();
        term.write_line("").ok();
    }

    if delete {
        term.write_line(&format!(
            "Deleted {} of {} requested photos, freeing {}.",
            style(deleted_total).cyan(),
            requested_total,
            style(format_bytes(freed_total)).yellow()
        ))
        .ok();
    } else {
        term.write_line(&format!(
            "{}",
            style("No files were deleted. Rerun with --delete to act on a page.").dim()
        ))
        .ok();
    }

    save_state(&term, &mut review_state, &state_path);

    drop(orchestrator);
    event_thread.join().ok();
    Ok(())
}

fn run_compress(
    root: PathBuf,
    albums: Vec<String>,
    quality: u8,
    delete_originals: bool,
    yes: bool,
) -> Result<()> {
    let term = Term::stderr();
    print_header(&term);

    let library: Arc<dyn PhotoLibrary> = Arc::new(FsPhotoLibrary::open(&root)?);
    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_event_thread(receiver, Some(new_progress_bar()));

    let mut orchestrator = Orchestrator::builder()
        .library(Arc::clone(&library))
        .oracle(Arc::new(SharpnessOracle::new()))
        .events(sender)
        .build()?;

    let result = match orchestrator.compress_albums(&albums, quality) {
        Ok(result) => result,
        Err(error) => {
            print_fatal_hint(&term, &error);
            return Err(error);
        }
    };

    print_compression_summary(&term, &result);

    if delete_originals {
        term.write_line("").ok();
        for album in &albums {
            let prompt = format!(
                "Delete the originals in \"{}\"? This cannot be undone.",
                album
            );
            if !yes && !confirm(&term, &prompt) {
                term.write_line(&format!("  kept \"{}\"", album)).ok();
                continue;
            }
            let confirmed = orchestrator.delete_album(album)?;
            term.write_line(&format!(
                "  {} removed {} originals from \"{}\"",
                style("✓").green(),
                confirmed.len(),
                album
            ))
            .ok();
        }
    }

    drop(orchestrator);
    event_thread.join().ok();
    Ok(())
}

fn run_status(root: PathBuf, state_file: Option<PathBuf>) -> Result<()> {
    let term = Term::stderr();
    print_header(&term);

    let library = FsPhotoLibrary::open(&root)?;
    let albums = library.list_albums()?;
    let photo_count: usize = albums.iter().map(|a| a.asset_count).sum();

    term.write_line(&format!("Library: {}", style(root.display()).cyan())).ok();
    term.write_line(&format!(
        "  {} albums, {} photos",
        style(albums.len()).cyan(),
        style(photo_count).cyan()
    ))
    .ok();

    let stats = FsStorageStats::new(&root);
    if let (Ok(free), Ok(total)) = (stats.free_bytes(), stats.total_bytes()) {
        term.write_line(&format!(
            "  {} free of {}",
            style(format_bytes(free)).yellow(),
            format_bytes(total)
        ))
        .ok();
    }

    let state_path = state_file.unwrap_or_else(state::default_state_path);
    let review_state = ReviewState::load(&state_path);
    term.write_line("").ok();
    term.write_line(&format!(
        "Checkpoint: {}",
        style(state_path.display()).dim()
    ))
    .ok();
    term.write_line(&format!(
        "  {} kept photos",
        style(review_state.kept.len()).cyan()
    ))
    .ok();
    let last = match review_state.updated_at {
        Some(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "never".to_string(),
    };
    term.write_line(&format!("  last updated: {}", last)).ok();
    if !review_state.has_scanned {
        term.write_line(&format!(
            "  {}",
            style("No scan recorded yet. Start with `photo-triage scan`.").dim()
        ))
        .ok();
    }

    Ok(())
}

fn new_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    pb
}

/// Feed batch-settlement progress into the bar until the channel closes.
fn spawn_event_thread(
    receiver: EventReceiver,
    progress: Option<ProgressBar>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress else { continue };
            match event {
                Event::Analysis(AnalysisEvent::Started { total, .. }) => {
                    pb.set_length(total as u64);
                    pb.set_message("scoring photos");
                }
                Event::Analysis(AnalysisEvent::BatchSettled { completed, .. }) => {
                    pb.set_position(completed as u64);
                }
                Event::Analysis(AnalysisEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                Event::Compression(CompressionEvent::Started { total, .. }) => {
                    pb.set_length(total as u64);
                    pb.set_message("recompressing");
                }
                Event::Compression(CompressionEvent::BatchSettled { completed, .. }) => {
                    pb.set_position(completed as u64);
                }
                Event::Compression(CompressionEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    })
}

fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("Photo Triage").bold().cyan(),
        style("v0.1.0").dim()
    ))
    .ok();
    term.write_line("").ok();
}

fn print_fatal_hint(term: &Term, error: &TriageError) {
    if error.is_permission_denied() {
        term.write_line(&format!(
            "{} Photo library access was denied. Check the root's permissions and retry.",
            style("✗").red().bold()
        ))
        .ok();
    }
}

fn print_scan_pretty(
    term: &Term,
    report: &ScanReport,
    ranked: &[ScoredAsset],
    stats: &FsStorageStats,
) {
    term.write_line("").ok();
    term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} photos sampled in {:.1}s",
        style(report.sampled).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!("  {} photos scored", style(report.scored).cyan()))
        .ok();
    if !report.skipped.is_empty() {
        term.write_line(&format!(
            "  {} skipped",
            style(report.skipped.len()).yellow()
        ))
        .ok();
        for failure in &report.skipped {
            term.write_line(&format!("    {}", style(failure).dim())).ok();
        }
    }

    if let (Ok(free), Ok(total)) = (stats.free_bytes(), stats.total_bytes()) {
        term.write_line(&format!(
            "  {} free of {}",
            style(format_bytes(free)).yellow(),
            format_bytes(total)
        ))
        .ok();
    }
    term.write_line("").ok();

    if ranked.is_empty() {
        term.write_line(&format!("  {} Nothing to triage!", style("🎉").green()))
            .ok();
    } else {
        term.write_line(&format!("{}", style("Worst photos:").bold().underlined()))
            .ok();
        term.write_line("").ok();
        for (index, asset) in ranked.iter().take(5).enumerate() {
            term.write_line(&format!(
                "  {:>2}. {}  {}",
                index + 1,
                style_score(asset.final_score),
                asset.asset_id
            ))
            .ok();
        }
        term.write_line("").ok();
    }

    term.write_line(&format!(
        "{}",
        style("Remember: No files were deleted. Run `photo-triage review --delete` to act.").dim()
    ))
    .ok();
}

fn print_scan_json(report: &ScanReport, ranked: &[ScoredAsset]) {
    let output = serde_json::json!({
        "scan_id": report.scan_id.to_string(),
        "sampled": report.sampled,
        "scored": report.scored,
        "skipped": report.skipped,
        "duration_ms": report.duration_ms,
        "assets": ranked,
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn print_compression_summary(term: &Term, result: &CompressionResult) {
    term.write_line("").ok();
    term.write_line(&format!(
        "{} Compression Complete",
        style("✓").green().bold()
    ))
    .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} photos re-encoded in {:.1}s",
        style(result.total_files).cyan(),
        result.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} original, {} compressed",
        format_bytes(result.total_original_bytes),
        format_bytes(result.total_compressed_bytes)
    ))
    .ok();

    let saved = format_signed_bytes(result.space_saved);
    if result.space_saved >= 0 {
        term.write_line(&format!("  {} saved", style(saved).yellow())).ok();
    } else {
        term.write_line(&format!(
            "  {} saved (re-encoding grew the album)",
            style(saved).red()
        ))
        .ok();
    }

    if !result.skipped.is_empty() {
        term.write_line(&format!(
            "  {} skipped",
            style(result.skipped.len()).yellow()
        ))
        .ok();
        for failure in &result.skipped {
            term.write_line(&format!("    {}", style(failure).dim())).ok();
        }
    }
}

fn style_score(score: f64) -> String {
    let text = format!("{:>5.1}", score);
    if score >= 75.0 {
        style(text).red().to_string()
    } else if score >= 50.0 {
        style(text).yellow().to_string()
    } else {
        style(text).dim().to_string()
    }
}

fn confirm(term: &Term, prompt: &str) -> bool {
    term.write_str(&format!("{} [y/N] ", prompt)).ok();
    let answer = term.read_line().unwrap_or_default();
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn save_state(term: &Term, review_state: &mut ReviewState, path: &std::path::Path) {
    if let Err(error) = review_state.save(path) {
        term.write_line(&format!(
            "{} could not save review state: {}",
            style("!").yellow(),
            error
        ))
        .ok();
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_signed_bytes(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_bytes(bytes.unsigned_abs()))
    } else {
        format_bytes(bytes as u64)
    }
}
