//! Filesystem-backed photo library.
//!
//! Layout: `<root>/<album>/<asset file>` - every immediate subdirectory of
//! the root is an album, every image file inside it an asset. Asset ids are
//! `"album/file"` relative paths, stable for as long as files do not move.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{Album, AssetId, PhotoLibrary, StorageStats};
use crate::core::imaging;
use crate::error::LibraryError;

/// File extensions treated as photo assets
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];

/// Photo library rooted at a directory.
#[derive(Debug)]
pub struct FsPhotoLibrary {
    root: PathBuf,
    /// Generated thumbnails, keyed by asset id and requested edge.
    /// Released between worker batches via [`PhotoLibrary::clear_decode_cache`].
    thumbnail_cache: Mutex<HashMap<(AssetId, u32), Vec<u8>>>,
}

impl FsPhotoLibrary {
    /// Open the library rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let root = root.into();
        match fs::metadata(&root) {
            Ok(metadata) if metadata.is_dir() => Ok(Self {
                root,
                thumbnail_cache: Mutex::new(HashMap::new()),
            }),
            Ok(_) => Err(LibraryError::RootNotFound { path: root }),
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                Err(LibraryError::RootNotFound { path: root })
            }
            Err(source) => Err(map_io(&root, source)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an asset, or `None` for ids that would escape the
    /// library root.
    fn asset_path(&self, id: &AssetId) -> Option<PathBuf> {
        let relative = Path::new(id.as_str());
        let escapes = relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_)));
        if escapes {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Image files directly inside `dir`, in file-name order.
    fn image_files(&self, dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| walkdir_error(dir, e))?;
            if entry.file_type().is_file() && is_image(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

impl PhotoLibrary for FsPhotoLibrary {
    fn list_albums(&self) -> Result<Vec<Album>, LibraryError> {
        let mut albums = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| walkdir_error(&self.root, e))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let asset_count = self.image_files(entry.path())?.len();
            albums.push(Album { name, asset_count });
        }
        debug!(albums = albums.len(), "listed albums");
        Ok(albums)
    }

    fn list_assets(
        &self,
        album: &Album,
        range: Range<usize>,
    ) -> Result<Vec<AssetId>, LibraryError> {
        let files = self.image_files(&self.root.join(&album.name))?;
        let start = range.start.min(files.len());
        let end = range.end.min(files.len());

        Ok(files[start..end]
            .iter()
            .map(|path| {
                let file = path.file_name().unwrap_or_default().to_string_lossy();
                AssetId::new(format!("{}/{}", album.name, file))
            })
            .collect())
    }

    fn small_thumbnail(&self, id: &AssetId, edge: u32) -> Result<Option<Vec<u8>>, LibraryError> {
        let key = (id.clone(), edge);
        if let Some(cached) = lock(&self.thumbnail_cache).get(&key) {
            return Ok(Some(cached.clone()));
        }

        let Some(path) = self.asset_path(id) else {
            return Ok(None);
        };
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(map_io(&path, source)),
        };

        let thumbnail =
            imaging::thumbnail_jpeg(&bytes, edge).map_err(|e| LibraryError::Thumbnail {
                id: id.clone(),
                reason: e.to_string(),
            })?;

        lock(&self.thumbnail_cache).insert(key, thumbnail.clone());
        Ok(Some(thumbnail))
    }

    fn original_bytes(&self, id: &AssetId) -> Result<Option<Vec<u8>>, LibraryError> {
        let Some(path) = self.asset_path(id) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(map_io(&path, source)),
        }
    }

    fn asset_title(&self, id: &AssetId) -> Option<String> {
        Path::new(id.as_str())
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    fn asset_size(&self, id: &AssetId) -> Result<Option<u64>, LibraryError> {
        let Some(path) = self.asset_path(id) else {
            return Ok(None);
        };
        match fs::metadata(&path) {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(map_io(&path, source)),
        }
    }

    fn delete_assets(&self, ids: &[AssetId]) -> Result<Vec<AssetId>, LibraryError> {
        let mut confirmed = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(path) = self.asset_path(id) else {
                continue;
            };
            match fs::remove_file(&path) {
                Ok(()) => confirmed.push(id.clone()),
                Err(source) => {
                    warn!(asset = %id, "delete not confirmed: {source}");
                }
            }
        }
        Ok(confirmed)
    }

    fn save_image(
        &self,
        bytes: &[u8],
        title: &str,
        destination_album: &str,
    ) -> Result<(), LibraryError> {
        let save_error = |reason: String| LibraryError::Save {
            title: title.to_string(),
            album: destination_album.to_string(),
            reason,
        };

        let dir = self.root.join(destination_album);
        fs::create_dir_all(&dir).map_err(|e| save_error(e.to_string()))?;
        fs::write(dir.join(title), bytes).map_err(|e| save_error(e.to_string()))?;
        Ok(())
    }

    fn clear_decode_cache(&self) {
        let mut cache = lock(&self.thumbnail_cache);
        let released = cache.len();
        cache.clear();
        debug!(released, "released thumbnail cache");
    }
}

/// Storage totals for the volume holding a [`FsPhotoLibrary`].
pub struct FsStorageStats {
    root: PathBuf,
}

impl FsStorageStats {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StorageStats for FsStorageStats {
    fn total_bytes(&self) -> Result<u64, LibraryError> {
        fs2::total_space(&self.root).map_err(|e| map_io(&self.root, e))
    }

    fn free_bytes(&self) -> Result<u64, LibraryError> {
        fs2::available_space(&self.root).map_err(|e| map_io(&self.root, e))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn map_io(path: &Path, source: io::Error) -> LibraryError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        LibraryError::PermissionDenied {
            detail: path.display().to_string(),
        }
    } else {
        LibraryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn walkdir_error(dir: &Path, error: walkdir::Error) -> LibraryError {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.to_path_buf());
    match error.into_io_error() {
        Some(source) => map_io(&path, source),
        None => LibraryError::Io {
            path,
            source: io::Error::new(io::ErrorKind::Other, "filesystem loop"),
        },
    }
}

/// Poisoning only happens if a panic escaped a cache operation; the cache
/// holds derived data, so recovering the inner value is always safe.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
