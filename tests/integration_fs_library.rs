//! Integration tests for the filesystem-backed library.
//!
//! These tests run the engine against real directories:
//! - End-to-end scan with the built-in oracle over actual image files
//! - Deletion of reviewed files on disk
//! - Compress-then-delete rounds with on-disk byte accounting

use assert_fs::prelude::*;
use assert_fs::TempDir;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, Rgb, RgbImage};
use photo_triage::core::library::FsPhotoLibrary;
use photo_triage::core::oracle::SharpnessOracle;
use photo_triage::core::sampler::SamplerConfig;
use photo_triage::core::{AssetId, Orchestrator};
use photo_triage::error::FailureKind;
use predicates::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;

fn jpeg_bytes(image: &RgbImage, quality: u8) -> Vec<u8> {
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

fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png).unwrap();
    cursor.into_inner()
}

fn flat(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

/// 8x8 blocks aligned to the JPEG grid, so the pattern survives re-encoding.
fn checkerboard(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if ((x / 8) + (y / 8)) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// High-frequency speckle compresses poorly at high quality, so recompressing
/// it at a low quality reliably shrinks the file.
fn speckle(width: u32, height: u32, salt: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = x
            .wrapping_mul(2_654_435_761)
            .wrapping_add(y.wrapping_mul(40_503))
            .wrapping_add(salt)
            % 256;
        Rgb([v as u8, (v * 7 % 256) as u8, (v * 13 % 256) as u8])
    })
}

fn open_orchestrator(root: &TempDir) -> Orchestrator {
    Orchestrator::builder()
        .library(Arc::new(FsPhotoLibrary::open(root.path()).unwrap()))
        .oracle(Arc::new(SharpnessOracle::new()))
        .sampler_config(SamplerConfig {
            seed: Some(11),
            ..SamplerConfig::default()
        })
        .build()
        .unwrap()
}

#[test]
fn a_scan_over_real_files_ranks_flat_shots_over_sharp_ones() {
    let root = TempDir::new().unwrap();
    root.child("Camera/sharp-1.jpg")
        .write_binary(&jpeg_bytes(&checkerboard(64, 64), 90))
        .unwrap();
    root.child("Camera/sharp-2.jpg")
        .write_binary(&jpeg_bytes(&checkerboard(64, 64), 90))
        .unwrap();
    root.child("Camera/dull.jpg")
        .write_binary(&jpeg_bytes(&flat(64, 64, 128), 90))
        .unwrap();
    root.child("Screenshots/shot.png")
        .write_binary(&png_bytes(&flat(64, 64, 128)))
        .unwrap();

    let mut orchestrator = open_orchestrator(&root);
    let report = orchestrator.scan().unwrap();
    assert_eq!(report.sampled, 4);
    assert_eq!(report.scored, 4);
    assert!(report.skipped.is_empty());

    let page = orchestrator.select_photos_to_delete(&HashSet::new());
    assert_eq!(page.len(), 4);

    // The flat screenshot carries the album boost and tops the page; the
    // flat camera shot follows; both sharp frames trail far behind.
    assert_eq!(page[0].asset_id.as_str(), "Screenshots/shot.png");
    assert_eq!(page[1].asset_id.as_str(), "Camera/dull.jpg");
    assert!(page[1].final_score > page[2].final_score + 50.0);
    assert!(page[2].final_score < 20.0 && page[3].final_score < 20.0);

    // Deleting the worst two removes exactly those files.
    let targets: Vec<AssetId> = page[..2].iter().map(|a| a.asset_id.clone()).collect();
    let confirmed = orchestrator.delete_photos(&targets).unwrap();
    assert_eq!(confirmed.len(), 2);

    root.child("Screenshots/shot.png")
        .assert(predicate::path::missing());
    root.child("Camera/dull.jpg")
        .assert(predicate::path::missing());
    root.child("Camera/sharp-1.jpg")
        .assert(predicate::path::exists());
}

#[test]
fn a_corrupt_file_is_skipped_and_reported() {
    let root = TempDir::new().unwrap();
    root.child("Camera/ok.jpg")
        .write_binary(&jpeg_bytes(&flat(48, 48, 128), 90))
        .unwrap();
    root.child("Camera/broken.jpg")
        .write_binary(b"not actually a jpeg")
        .unwrap();

    let mut orchestrator = open_orchestrator(&root);
    let report = orchestrator.scan().unwrap();

    assert_eq!(report.scored, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].asset_id.as_str(), "Camera/broken.jpg");
    assert_eq!(report.skipped[0].kind, FailureKind::AssetUnavailable);

    // The broken file stays on disk; skipping never deletes.
    root.child("Camera/broken.jpg")
        .assert(predicate::path::exists());
}

#[test]
fn compress_then_delete_album_accounts_for_on_disk_bytes() {
    let root = TempDir::new().unwrap();
    root.child("Camera/IMG_0001.jpg")
        .write_binary(&jpeg_bytes(&speckle(96, 96, 0), 95))
        .unwrap();
    root.child("Camera/IMG_0002.jpg")
        .write_binary(&jpeg_bytes(&speckle(96, 96, 7), 95))
        .unwrap();

    let original_disk: u64 = ["IMG_0001.jpg", "IMG_0002.jpg"]
        .iter()
        .map(|name| {
            root.child(format!("Camera/{name}"))
                .path()
                .metadata()
                .unwrap()
                .len()
        })
        .sum();

    let mut orchestrator = open_orchestrator(&root);
    let result = orchestrator
        .compress_albums(&["Camera".to_string()], 25)
        .unwrap();

    assert_eq!(result.total_files, 2);
    assert!(result.skipped.is_empty());
    assert_eq!(result.total_original_bytes, original_disk);
    assert_eq!(
        result.space_saved,
        result.total_original_bytes as i64 - result.total_compressed_bytes as i64
    );
    assert!(
        result.space_saved > 0,
        "speckle at q95 must shrink at q25, saved {}",
        result.space_saved
    );

    // The copies land in the companion album, byte for byte.
    let compressed_disk: u64 = ["IMG_0001.jpg", "IMG_0002.jpg"]
        .iter()
        .map(|name| {
            root.child(format!("Camera (compressed)/{name}"))
                .path()
                .metadata()
                .unwrap()
                .len()
        })
        .sum();
    assert_eq!(compressed_disk, result.total_compressed_bytes);

    // Originals survive compression and vanish only on the explicit call.
    root.child("Camera/IMG_0001.jpg")
        .assert(predicate::path::exists());
    let confirmed = orchestrator.delete_album("Camera").unwrap();
    assert_eq!(confirmed.len(), 2);
    root.child("Camera/IMG_0001.jpg")
        .assert(predicate::path::missing());
    root.child("Camera (compressed)/IMG_0001.jpg")
        .assert(predicate::path::exists());
}
