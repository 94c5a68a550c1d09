//! # Library Module
//!
//! Contracts for the external photo library, plus the in-crate backends.
//!
//! The engine only ever talks to [`PhotoLibrary`]; everything
//! platform-specific (directory layout, thumbnail caching, deletion
//! mechanics) stays behind the trait. [`FsPhotoLibrary`] is the shipping
//! backend; [`InMemoryLibrary`] exists for tests and headless experiments.

mod fs;
mod memory;

pub use fs::{FsPhotoLibrary, FsStorageStats};
pub use memory::{InMemoryLibrary, SavedImage};

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

/// Assets fetched per `list_assets` call when enumerating a whole album
pub const DEFAULT_ASSET_PAGE_SIZE: usize = 128;

/// Opaque identifier of a single photo asset.
///
/// Backends choose the representation (relative paths for the filesystem
/// backend); the engine only compares, hashes and displays ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A named collection of assets, as returned by [`PhotoLibrary::list_albums`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Display name; also the key for album lookups
    pub name: String,
    /// Number of assets at listing time
    pub asset_count: usize,
}

/// Read/write access to the user's photo library.
///
/// Implementations must be callable from worker threads: every method takes
/// `&self` and synchronizes internally where needed.
pub trait PhotoLibrary: Send + Sync {
    /// All albums, in the library's listing order.
    fn list_albums(&self) -> Result<Vec<Album>, LibraryError>;

    /// Asset ids of `album` within `range`, clamped to the album's length.
    fn list_assets(&self, album: &Album, range: Range<usize>)
        -> Result<Vec<AssetId>, LibraryError>;

    /// A small preview of the asset fitted inside an `edge` pixel box, as
    /// encoded image bytes. `Ok(None)` when the asset cannot be resolved.
    fn small_thumbnail(&self, id: &AssetId, edge: u32) -> Result<Option<Vec<u8>>, LibraryError>;

    /// The asset's full-resolution encoded bytes. `Ok(None)` when the asset
    /// cannot be resolved.
    fn original_bytes(&self, id: &AssetId) -> Result<Option<Vec<u8>>, LibraryError>;

    /// The asset's display title (usually its file name), if it has one.
    fn asset_title(&self, id: &AssetId) -> Option<String>;

    /// The asset's size in bytes. `Ok(None)` when the asset cannot be
    /// resolved.
    fn asset_size(&self, id: &AssetId) -> Result<Option<u64>, LibraryError>;

    /// Delete the given assets.
    ///
    /// Returns the ids the library confirms deleted; a partial result is not
    /// an error. Callers must base any space accounting on the confirmed
    /// list, never on what they asked for.
    fn delete_assets(&self, ids: &[AssetId]) -> Result<Vec<AssetId>, LibraryError>;

    /// Store encoded image bytes as `title` inside `destination_album`,
    /// creating the album when missing.
    fn save_image(
        &self,
        bytes: &[u8],
        title: &str,
        destination_album: &str,
    ) -> Result<(), LibraryError>;

    /// Drop any decoded-image caches the library holds.
    ///
    /// Called between worker batches so peak memory tracks the batch size
    /// instead of the whole pass.
    fn clear_decode_cache(&self);
}

/// Storage totals for the volume backing the library.
///
/// Consumed by surrounding surfaces (the CLI status command); the engine
/// itself never reads these.
pub trait StorageStats {
    fn total_bytes(&self) -> Result<u64, LibraryError>;
    fn free_bytes(&self) -> Result<u64, LibraryError>;
}

/// Enumerate every asset id of `album`, fetching `page_size` ids per call.
///
/// Stops early if the library returns an empty page before the advertised
/// `asset_count` is reached (the listing shrank mid-enumeration).
pub fn list_all_assets(
    library: &dyn PhotoLibrary,
    album: &Album,
    page_size: usize,
) -> Result<Vec<AssetId>, LibraryError> {
    let page_size = page_size.max(1);
    let mut ids = Vec::with_capacity(album.asset_count);
    let mut offset = 0;

    while offset < album.asset_count {
        let end = (offset + page_size).min(album.asset_count);
        let page = library.list_assets(album, offset..end)?;
        if page.is_empty() {
            break;
        }
        offset += page.len();
        ids.extend(page);
    }

    Ok(ids)
}
