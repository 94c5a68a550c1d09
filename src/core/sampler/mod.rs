//! # Sampler Module
//!
//! Builds the bounded candidate pool for one scan pass.
//!
//! Priority albums (screenshots, WhatsApp) are enumerated in full before
//! anything else and always survive the cap; remaining albums are taken in
//! the library's listing order until the cap is covered. The final pool is
//! deduplicated, shuffled and never larger than the cap, so a scan costs
//! the same no matter how big the library is.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::library::{list_all_assets, Album, AssetId, PhotoLibrary, DEFAULT_ASSET_PAGE_SIZE};
use crate::error::LibraryError;
use crate::events::{Event, EventSender, SampleEvent};

/// Ceiling on candidates per scan pass
pub const SAMPLE_CAP: usize = 200;

/// Album names always enumerated in full, matched case-insensitively
pub const PRIORITY_ALBUM_NAMES: &[&str] = &["screenshots", "whatsapp"];

/// The one priority album whose assets carry the screenshot tag
const SCREENSHOT_ALBUM_NAME: &str = "screenshots";

/// One candidate drawn by the sampler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledAsset {
    pub id: AssetId,
    /// True when the asset came from the screenshots album. Passed through
    /// to the scoring oracle, which weighs screenshots differently.
    pub from_screenshot_album: bool,
}

/// Sampler tuning.
///
/// `Default` matches production behavior; `seed` pins the shuffle for tests
/// and scripting.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Candidate pool ceiling
    pub cap: usize,
    /// Assets fetched per listing call
    pub page_size: usize,
    /// Fixed shuffle seed; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cap: SAMPLE_CAP,
            page_size: DEFAULT_ASSET_PAGE_SIZE,
            seed: None,
        }
    }
}

/// Builds the candidate pool from the library's album listing.
pub struct AssetSampler {
    config: SamplerConfig,
}

impl AssetSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Draw up to `cap` unique candidates from the library.
    ///
    /// Non-priority albums are enumerated whole: the pool may briefly
    /// overshoot the cap by the tail of the album that crossed it, and is
    /// trimmed back after shuffling. Priority assets are exempt from that
    /// trim, so a full screenshots album is always represented.
    pub fn sample(
        &self,
        library: &dyn PhotoLibrary,
        events: &EventSender,
    ) -> Result<Vec<SampledAsset>, LibraryError> {
        let albums = library.list_albums()?;
        events.send(Event::Sample(SampleEvent::Started {
            albums: albums.len(),
        }));

        let (priority, others): (Vec<Album>, Vec<Album>) =
            albums.into_iter().partition(is_priority);

        let mut picked = Vec::new();
        let mut seen = HashSet::new();

        for album in &priority {
            let tagged = album.name.eq_ignore_ascii_case(SCREENSHOT_ALBUM_NAME);
            let ids = list_all_assets(library, album, self.config.page_size)?;
            let added = push_unique(&mut picked, &mut seen, ids, tagged);
            events.send(Event::Sample(SampleEvent::AlbumSampled {
                album: album.name.clone(),
                added,
                priority: true,
            }));
        }
        let priority_count = picked.len();

        let mut extras = Vec::new();
        for album in &others {
            if priority_count + extras.len() >= self.config.cap {
                break;
            }
            let ids = list_all_assets(library, album, self.config.page_size)?;
            let added = push_unique(&mut extras, &mut seen, ids, false);
            events.send(Event::Sample(SampleEvent::AlbumSampled {
                album: album.name.clone(),
                added,
                priority: false,
            }));
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Shuffle before trimming so the album that overshot the cap loses
        // a random subset, not just its tail.
        extras.shuffle(&mut rng);
        extras.truncate(self.config.cap.saturating_sub(priority_count));

        picked.append(&mut extras);
        picked.shuffle(&mut rng);
        // Only bites when the priority albums alone exceed the cap.
        picked.truncate(self.config.cap);

        debug!(
            candidates = picked.len(),
            priority = priority_count,
            "sampling complete"
        );
        events.send(Event::Sample(SampleEvent::Completed {
            candidates: picked.len(),
        }));
        Ok(picked)
    }
}

fn is_priority(album: &Album) -> bool {
    PRIORITY_ALBUM_NAMES
        .iter()
        .any(|name| album.name.eq_ignore_ascii_case(name))
}

/// Append ids not seen before, tagging them as requested. Returns how many
/// were added.
fn push_unique(
    picked: &mut Vec<SampledAsset>,
    seen: &mut HashSet<AssetId>,
    ids: Vec<AssetId>,
    from_screenshot_album: bool,
) -> usize {
    let before = picked.len();
    for id in ids {
        if seen.insert(id.clone()) {
            picked.push(SampledAsset {
                id,
                from_screenshot_album,
            });
        }
    }
    picked.len() - before
}
