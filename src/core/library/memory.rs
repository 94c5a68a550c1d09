//! In-memory photo library for tests and headless experiments.
//!
//! Assets default to synthetic thumbnail/original bytes so tests that pair
//! the library with a fake oracle need no real images. Every default can be
//! overridden, and failures can be injected per asset.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{Album, AssetId, PhotoLibrary};
use crate::error::LibraryError;

/// A record of one [`PhotoLibrary::save_image`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub title: String,
    pub album: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredAsset {
    title: Option<String>,
    thumbnail: Option<Vec<u8>>,
    original: Option<Vec<u8>>,
    size: u64,
}

#[derive(Default)]
struct Inner {
    /// Albums in listing order
    albums: Vec<(String, Vec<AssetId>)>,
    assets: HashMap<AssetId, StoredAsset>,
    failing_thumbnails: HashSet<AssetId>,
    refused_deletes: HashSet<AssetId>,
    permission_denied: bool,
    saved: Vec<SavedImage>,
    deleted: Vec<AssetId>,
}

/// Scriptable in-memory [`PhotoLibrary`].
#[derive(Default)]
pub struct InMemoryLibrary {
    inner: Mutex<Inner>,
    cache_releases: AtomicUsize,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an album holding the given asset ids, creating default
    /// assets for ids not seen before.
    pub fn add_album(&self, name: &str, ids: &[&str]) {
        let mut inner = self.lock();
        let ids: Vec<AssetId> = ids.iter().map(|id| AssetId::new(*id)).collect();
        for id in &ids {
            inner
                .assets
                .entry(id.clone())
                .or_insert_with(|| default_asset(id));
        }
        inner.albums.push((name.to_string(), ids));
    }

    /// Register an album of `count` generated assets and return their ids.
    pub fn add_generated_album(&self, name: &str, count: usize) -> Vec<AssetId> {
        let ids: Vec<String> = (0..count).map(|i| format!("{name}-{i:04}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.add_album(name, &refs);
        ids.into_iter().map(AssetId::new).collect()
    }

    /// Replace an asset's original bytes (its size follows the bytes).
    pub fn set_original(&self, id: &str, bytes: Vec<u8>) {
        let mut inner = self.lock();
        let id = AssetId::new(id);
        let size = bytes.len() as u64;
        let asset = inner.assets.entry(id.clone()).or_insert_with(|| default_asset(&id));
        asset.original = Some(bytes);
        asset.size = size;
    }

    /// Make an asset's original bytes unresolvable without touching the
    /// listing, as happens when a file vanishes mid-pass.
    pub fn clear_original(&self, id: &str) {
        let mut inner = self.lock();
        let id = AssetId::new(id);
        let asset = inner.assets.entry(id.clone()).or_insert_with(|| default_asset(&id));
        asset.original = None;
    }

    /// Replace an asset's thumbnail bytes; `None` makes the thumbnail
    /// unresolvable without being an error.
    pub fn set_thumbnail(&self, id: &str, bytes: Option<Vec<u8>>) {
        let mut inner = self.lock();
        let id = AssetId::new(id);
        let asset = inner.assets.entry(id.clone()).or_insert_with(|| default_asset(&id));
        asset.thumbnail = bytes;
    }

    pub fn set_title(&self, id: &str, title: Option<&str>) {
        let mut inner = self.lock();
        let id = AssetId::new(id);
        let asset = inner.assets.entry(id.clone()).or_insert_with(|| default_asset(&id));
        asset.title = title.map(str::to_string);
    }

    pub fn set_size(&self, id: &str, size: u64) {
        let mut inner = self.lock();
        let id = AssetId::new(id);
        let asset = inner.assets.entry(id.clone()).or_insert_with(|| default_asset(&id));
        asset.size = size;
    }

    /// Make thumbnail fetches for this asset fail with an error.
    pub fn fail_thumbnail(&self, id: &str) {
        self.lock().failing_thumbnails.insert(AssetId::new(id));
    }

    /// Make deletions of this asset go unconfirmed.
    pub fn refuse_delete(&self, id: &str) {
        self.lock().refused_deletes.insert(AssetId::new(id));
    }

    /// Make `list_albums` fail as if library access was never granted.
    pub fn deny_permission(&self) {
        self.lock().permission_denied = true;
    }

    /// Images stored through `save_image`, in call order.
    pub fn saved_images(&self) -> Vec<SavedImage> {
        self.lock().saved.clone()
    }

    /// Ids confirmed deleted, in call order.
    pub fn deleted_ids(&self) -> Vec<AssetId> {
        self.lock().deleted.clone()
    }

    /// Number of `clear_decode_cache` calls observed.
    pub fn cache_release_count(&self) -> usize {
        self.cache_releases.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PhotoLibrary for InMemoryLibrary {
    fn list_albums(&self) -> Result<Vec<Album>, LibraryError> {
        let inner = self.lock();
        if inner.permission_denied {
            return Err(LibraryError::PermissionDenied {
                detail: "in-memory library".to_string(),
            });
        }
        Ok(inner
            .albums
            .iter()
            .map(|(name, ids)| Album {
                name: name.clone(),
                asset_count: ids.len(),
            })
            .collect())
    }

    fn list_assets(
        &self,
        album: &Album,
        range: Range<usize>,
    ) -> Result<Vec<AssetId>, LibraryError> {
        let inner = self.lock();
        let (_, ids) = inner
            .albums
            .iter()
            .find(|(name, _)| *name == album.name)
            .ok_or_else(|| LibraryError::AlbumNotFound {
                name: album.name.clone(),
            })?;

        let start = range.start.min(ids.len());
        let end = range.end.min(ids.len());
        Ok(ids[start..end].to_vec())
    }

    fn small_thumbnail(&self, id: &AssetId, _edge: u32) -> Result<Option<Vec<u8>>, LibraryError> {
        let inner = self.lock();
        if inner.failing_thumbnails.contains(id) {
            return Err(LibraryError::Thumbnail {
                id: id.clone(),
                reason: "injected thumbnail failure".to_string(),
            });
        }
        Ok(inner.assets.get(id).and_then(|a| a.thumbnail.clone()))
    }

    fn original_bytes(&self, id: &AssetId) -> Result<Option<Vec<u8>>, LibraryError> {
        Ok(self.lock().assets.get(id).and_then(|a| a.original.clone()))
    }

    fn asset_title(&self, id: &AssetId) -> Option<String> {
        self.lock().assets.get(id).and_then(|a| a.title.clone())
    }

    fn asset_size(&self, id: &AssetId) -> Result<Option<u64>, LibraryError> {
        Ok(self.lock().assets.get(id).map(|a| a.size))
    }

    fn delete_assets(&self, ids: &[AssetId]) -> Result<Vec<AssetId>, LibraryError> {
        let mut inner = self.lock();
        let mut confirmed = Vec::new();
        for id in ids {
            if inner.refused_deletes.contains(id) || !inner.assets.contains_key(id) {
                continue;
            }
            inner.assets.remove(id);
            for (_, album_ids) in inner.albums.iter_mut() {
                album_ids.retain(|existing| existing != id);
            }
            inner.deleted.push(id.clone());
            confirmed.push(id.clone());
        }
        Ok(confirmed)
    }

    fn save_image(
        &self,
        bytes: &[u8],
        title: &str,
        destination_album: &str,
    ) -> Result<(), LibraryError> {
        self.lock().saved.push(SavedImage {
            title: title.to_string(),
            album: destination_album.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn clear_decode_cache(&self) {
        self.cache_releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn default_asset(id: &AssetId) -> StoredAsset {
    let original = format!("original:{id}").into_bytes();
    StoredAsset {
        title: Some(format!("{id}.jpg")),
        thumbnail: Some(format!("thumb:{id}").into_bytes()),
        size: original.len() as u64,
        original: Some(original),
    }
}
