//! Integration tests for the triage engine.
//!
//! These tests drive the orchestrator end to end against the in-memory
//! library and verify:
//! - Worst-first review paging without repeats
//! - Deletion accounting over confirmed ids only
//! - Compression bookkeeping and copy placement
//! - Failure containment versus fatal aborts

use photo_triage::core::library::{InMemoryLibrary, PhotoLibrary};
use photo_triage::core::oracle::{OracleScore, ScoringOracle};
use photo_triage::core::sampler::SamplerConfig;
use photo_triage::core::{AssetId, Orchestrator, REVIEW_PAGE_SIZE};
use photo_triage::error::{FailureKind, OracleError};
use photo_triage::events::{AnalysisEvent, Event, EventChannel, ScanEvent};
use std::collections::HashSet;
use std::sync::Arc;

/// Scores each asset by the numeric suffix of its generated thumbnail, so
/// "Camera-0029" is always worse than "Camera-0028". Thumbnails containing
/// "bad" fail the oracle.
struct SuffixOracle;

impl ScoringOracle for SuffixOracle {
    fn analyze(
        &self,
        thumbnail: &[u8],
        _from_screenshot_album: bool,
    ) -> Result<OracleScore, OracleError> {
        let text = String::from_utf8_lossy(thumbnail);
        if text.contains("bad") {
            return Err(OracleError::new("scripted rejection"));
        }
        let score = text
            .rsplit('-')
            .next()
            .and_then(|digits| digits.parse::<f64>().ok())
            .unwrap_or(0.0);
        Ok(OracleScore {
            final_score: score,
            details: serde_json::Value::Null,
        })
    }
}

fn build_orchestrator(library: Arc<InMemoryLibrary>) -> Orchestrator {
    Orchestrator::builder()
        .library(library)
        .oracle(Arc::new(SuffixOracle))
        .sampler_config(SamplerConfig {
            seed: Some(1),
            ..SamplerConfig::default()
        })
        .build()
        .unwrap()
}

#[test]
fn review_pages_are_worst_first_and_never_repeat() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 30);
    let mut orchestrator = build_orchestrator(Arc::clone(&library));

    orchestrator.scan().unwrap();
    let none = HashSet::new();

    let first = orchestrator.select_photos_to_delete(&none);
    assert_eq!(first.len(), REVIEW_PAGE_SIZE);
    assert_eq!(first[0].asset_id.as_str(), "Camera-0029");
    assert!(
        first.windows(2).all(|w| w[0].final_score >= w[1].final_score),
        "page must be sorted worst first"
    );

    let second = orchestrator.select_photos_to_delete(&none);
    assert_eq!(second.len(), REVIEW_PAGE_SIZE);
    assert_eq!(second[0].asset_id.as_str(), "Camera-0017");

    let third = orchestrator.select_photos_to_delete(&none);
    assert_eq!(third.len(), 6);

    let fourth = orchestrator.select_photos_to_delete(&none);
    assert!(fourth.is_empty(), "the pool must exhaust to an empty page");

    // No id appeared twice across the three pages.
    let mut offered = HashSet::new();
    for asset in first.iter().chain(&second).chain(&third) {
        assert!(offered.insert(asset.asset_id.clone()));
    }
    assert_eq!(offered.len(), 30);
}

#[test]
fn kept_photos_are_skipped_but_not_burned() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 20);
    let mut orchestrator = build_orchestrator(Arc::clone(&library));
    orchestrator.scan().unwrap();

    let kept: HashSet<AssetId> = [AssetId::new("Camera-0019"), AssetId::new("Camera-0018")]
        .into_iter()
        .collect();

    let first = orchestrator.select_photos_to_delete(&kept);
    assert_eq!(first[0].asset_id.as_str(), "Camera-0017");
    assert!(first.iter().all(|a| !kept.contains(&a.asset_id)));

    // Kept ids were skipped, not consumed: lifting the exclusion offers
    // them on the next page.
    let second = orchestrator.select_photos_to_delete(&HashSet::new());
    let ids: Vec<&str> = second.iter().map(|a| a.asset_id.as_str()).collect();
    assert!(ids.contains(&"Camera-0019"));
    assert!(ids.contains(&"Camera-0018"));
}

#[test]
fn freed_space_counts_confirmed_deletions_only() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 15);
    library.set_size("Camera-0014", 1_000);
    library.set_size("Camera-0013", 500);
    library.set_size("Camera-0012", 9_999);
    library.refuse_delete("Camera-0012");
    let mut orchestrator = build_orchestrator(Arc::clone(&library));
    orchestrator.scan().unwrap();

    let page = orchestrator.select_photos_to_delete(&HashSet::new());
    let targets: Vec<AssetId> = page.iter().take(3).map(|a| a.asset_id.clone()).collect();
    assert_eq!(targets[0].as_str(), "Camera-0014");

    // Sizes must be captured before the delete, as a caller would.
    let mut sizes = std::collections::HashMap::new();
    for id in &targets {
        if let Ok(Some(size)) = library.asset_size(id) {
            sizes.insert(id.clone(), size);
        }
    }

    let confirmed = orchestrator.delete_photos(&targets).unwrap();
    assert_eq!(
        confirmed,
        vec![AssetId::new("Camera-0014"), AssetId::new("Camera-0013")]
    );

    let freed: u64 = confirmed.iter().filter_map(|id| sizes.get(id).copied()).sum();
    assert_eq!(freed, 1_500, "the refused asset must not count as freed");
    assert_eq!(library.deleted_ids().len(), 2);
}

#[test]
fn per_asset_failures_skip_without_aborting_the_scan() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 10);
    library.fail_thumbnail("Camera-0002");
    library.set_thumbnail("Camera-0004", Some(b"bad".to_vec()));
    let mut orchestrator = build_orchestrator(Arc::clone(&library));

    let report = orchestrator.scan().unwrap();
    assert_eq!(report.sampled, 10);
    assert_eq!(report.scored, 8);
    assert_eq!(report.skipped.len(), 2);

    let kinds: Vec<(&str, FailureKind)> = report
        .skipped
        .iter()
        .map(|f| (f.asset_id.as_str(), f.kind))
        .collect();
    assert!(kinds.contains(&("Camera-0002", FailureKind::AssetUnavailable)));
    assert!(kinds.contains(&("Camera-0004", FailureKind::Oracle)));

    // Skipped assets never reach review.
    let page = orchestrator.select_photos_to_delete(&HashSet::new());
    assert!(page.iter().all(|a| a.asset_id.as_str() != "Camera-0002"));
    assert!(page.iter().all(|a| a.asset_id.as_str() != "Camera-0004"));
}

#[test]
fn permission_denial_is_fatal_and_identifiable() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 5);
    library.deny_permission();
    let mut orchestrator = build_orchestrator(Arc::clone(&library));

    let error = orchestrator.scan().unwrap_err();
    assert!(error.is_permission_denied());
    assert!(!orchestrator.has_scanned());
    assert!(orchestrator.scored_assets().is_empty());
}

#[test]
fn the_decode_cache_is_released_once_per_batch() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 7);
    let mut orchestrator = build_orchestrator(Arc::clone(&library));

    orchestrator.scan().unwrap();

    // 7 assets at a batch size of 3 settle as 3 + 3 + 1.
    assert_eq!(library.cache_release_count(), 3);
}

#[test]
fn scan_events_narrate_the_batched_pass() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 7);
    let (sender, receiver) = EventChannel::new();

    let mut orchestrator = Orchestrator::builder()
        .library(Arc::clone(&library) as Arc<dyn PhotoLibrary>)
        .oracle(Arc::new(SuffixOracle))
        .events(sender)
        .sampler_config(SamplerConfig {
            seed: Some(1),
            ..SamplerConfig::default()
        })
        .build()
        .unwrap();

    orchestrator.scan().unwrap();
    drop(orchestrator);
    let events = receiver.drain();

    assert!(matches!(
        events.first(),
        Some(Event::Scan(ScanEvent::Started { .. }))
    ));

    let settled: Vec<(usize, usize)> = events
        .iter()
        .filter_map(|event| match event {
            Event::Analysis(AnalysisEvent::BatchSettled {
                batch, completed, ..
            }) => Some((*batch, *completed)),
            _ => None,
        })
        .collect();
    assert_eq!(settled, vec![(0, 3), (1, 6), (2, 7)]);

    match events.last() {
        Some(Event::Scan(ScanEvent::Completed { summary })) => {
            assert_eq!(summary.sampled, 7);
            assert_eq!(summary.scored, 7);
            assert_eq!(summary.skipped, 0);
        }
        other => panic!("expected a scan completion event, got {:?}", other),
    }
}

#[test]
fn compression_copies_into_the_companion_album() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_album("Camera", &["a", "b"]);
    library.set_title("a", Some("IMG_0001.HEIC"));
    library.set_title("b", Some("IMG_0002.jpg"));
    for id in ["a", "b"] {
        library.set_original(id, noise_jpeg(64, 64, 95));
    }
    let mut orchestrator = build_orchestrator(Arc::clone(&library));

    let result = orchestrator
        .compress_albums(&["Camera".to_string()], 20)
        .unwrap();

    assert_eq!(result.total_files, 2);
    assert_eq!(
        result.space_saved,
        result.total_original_bytes as i64 - result.total_compressed_bytes as i64
    );
    assert!(result.skipped.is_empty());

    let saved = library.saved_images();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|s| s.album == "Camera (compressed)"));
    let titles: Vec<&str> = saved.iter().map(|s| s.title.as_str()).collect();
    assert!(titles.contains(&"IMG_0001.jpg"));
    assert!(titles.contains(&"IMG_0002.jpg"));

    // Originals stay until the caller explicitly removes the album.
    assert!(library.deleted_ids().is_empty());
    let confirmed = orchestrator.delete_album("Camera").unwrap();
    assert_eq!(confirmed.len(), 2);
}

#[test]
fn unknown_compression_albums_fail_before_any_work() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_generated_album("Camera", 2);
    let mut orchestrator = build_orchestrator(Arc::clone(&library));

    let error = orchestrator
        .compress_albums(&["Camera".to_string(), "Missing".to_string()], 70)
        .unwrap_err();
    assert!(error.to_string().contains("Missing"));
    assert!(library.saved_images().is_empty());
}

/// Deterministic high-frequency JPEG so lower qualities reliably shrink it.
fn noise_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, Rgb, RgbImage};

    let image = RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(97) ^ y.wrapping_mul(57)) % 256;
        Rgb([v as u8, (255 - v) as u8, (v * 3 % 256) as u8])
    });
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .unwrap();
    bytes
}
