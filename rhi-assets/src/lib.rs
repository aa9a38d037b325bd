//! Concurrent-safe tracking and caching of images, shaders, and models.
//!
//! Grounded on `engine/src/assets/assets.c`'s `AssetLibrary`/`AssetEntry` pair: a
//! hash-trie of basename hashes over an arena, with `track_*`/`request_*` pairs that
//! lazily load and cache by entry. Geometry decoding and pixel decoding are treated
//! as opaque external steps per the non-goals this crate observes — `request_model`
//! does the tracking/caching bookkeeping the original performs around
//! `importer_load_gltf`/`importer_load_image` without re-implementing either decoder
//! (images route through the `image` crate, which *is* the "external decoder" the
//! interface calls for).

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use rhi_core::{hash64, HashTrie};

pub use error::{AssetError, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AssetType {
    Undefined,
    Geometry,
    Image,
    Shader,
}

fn classify_extension(extension: &str) -> AssetType {
    match extension.to_ascii_lowercase().as_str() {
        "glb" | "gltf" => AssetType::Geometry,
        "png" | "jpg" | "jpeg" => AssetType::Image,
        "glsl" | "spv" => AssetType::Shader,
        _ => AssetType::Undefined,
    }
}

#[derive(Clone)]
pub struct ImageSource {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: Arc<[u8]>,
}

#[derive(Clone)]
pub struct ShaderSource {
    pub id: u64,
    pub path: PathBuf,
    pub vertex_spv: Arc<[u32]>,
    pub fragment_spv: Arc<[u32]>,
}

#[derive(Clone)]
pub struct ModelSource {
    pub id: u64,
    /// Raw geometry payload; real mesh decoding is an external concern (non-goal) —
    /// callers that need `{meshes, materials}` parse this with their own importer.
    pub raw: Arc<[u8]>,
    pub images: Vec<ImageSource>,
}

#[derive(Clone)]
enum LoadedAsset {
    Image(ImageSource),
    Shader(ShaderSource),
    Model(ModelSource),
}

struct AssetEntry {
    full_path: PathBuf,
    asset_type: AssetType,
    loaded: Option<LoadedAsset>,
    last_modified: Option<SystemTime>,
}

struct AssetLibraryInner {
    tree: HashTrie<AssetEntry>,
    tracked_file_count: u32,
}

/// Wraps the hash-trie + tracking state in a single lock so `track_file`/`request_*`
/// can be called concurrently from multiple host threads (the one place in the
/// system that needs this, since the RHI context itself is single-threaded by §5).
pub struct AssetLibrary {
    inner: Mutex<AssetLibraryInner>,
}

impl Default for AssetLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(AssetLibraryInner {
                tree: HashTrie::new(),
                tracked_file_count: 0,
            }),
        }
    }

    pub fn tracked_file_count(&self) -> u32 {
        self.inner.lock().tracked_file_count
    }

    /// Hashes `path`'s basename and inserts a fresh [`AssetEntry`] if one doesn't
    /// already exist for that hash. Re-tracking the same basename is a no-op,
    /// matching `asset_library_track_file`'s `entry->full_path.length == 0` guard.
    pub fn track_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("skipping file with no basename: {}", path.display());
            return false;
        };
        let hash = hash64(basename.as_bytes());

        let mut inner = self.inner.lock();
        if inner.tree.get(hash).is_some() {
            return false;
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let asset_type = classify_extension(extension);
        let last_modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();

        inner.tree.get_or_insert_with(hash, || AssetEntry {
            full_path: path.to_path_buf(),
            asset_type,
            loaded: None,
            last_modified,
        });
        inner.tracked_file_count += 1;
        log::debug!("tracked {}", path.display());
        true
    }

    pub fn track_directory(&self, directory: impl AsRef<Path>) -> Result<u32> {
        let mut count = 0;
        let mut stack = vec![directory.as_ref().to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if self.track_file(&path) {
                    count += 1;
                }
            }
        }
        log::info!("tracked {count} files under {}", dir_display(directory.as_ref()));
        Ok(count)
    }

    pub fn request_image(&self, key: &str) -> Result<ImageSource> {
        let hash = hash64(key.as_bytes());
        let mut inner = self.inner.lock();
        let entry = inner
            .tree
            .get_mut(hash)
            .ok_or_else(|| AssetError::NotTracked(key.to_string()))?;

        if entry.asset_type != AssetType::Image {
            return Err(AssetError::WrongType {
                key: key.to_string(),
                expected: AssetType::Image,
                actual: entry.asset_type,
            });
        }

        if let Some(LoadedAsset::Image(cached)) = &entry.loaded {
            return Ok(cached.clone());
        }

        let source = decode_image(&entry.full_path, hash)?;
        entry.loaded = Some(LoadedAsset::Image(source.clone()));
        Ok(source)
    }

    /// `key` is a `.glsl` logical name; looks up its `.vert.spv`/`.frag.spv` siblings
    /// and caches the combined source under both entries, keyed by
    /// [`resolved_shader_id`] rather than `hash64(key)` (see the crate-level note and
    /// the original's `string_hash64((*out_shader)->path)` on the resolved path).
    pub fn request_shader(&self, key: &str) -> Result<ShaderSource> {
        let vertex_key = key.replacen(".glsl", ".vert.spv", 1);
        let fragment_key = key.replacen(".glsl", ".frag.spv", 1);
        let vertex_hash = hash64(vertex_key.as_bytes());
        let fragment_hash = hash64(fragment_key.as_bytes());

        let mut inner = self.inner.lock();
        let vertex_path = {
            let entry = inner
                .tree
                .get(vertex_hash)
                .ok_or_else(|| AssetError::NotTracked(key.to_string()))?;
            if entry.asset_type != AssetType::Shader {
                return Err(AssetError::WrongType {
                    key: key.to_string(),
                    expected: AssetType::Shader,
                    actual: entry.asset_type,
                });
            }
            entry.full_path.clone()
        };
        let fragment_path = {
            let entry = inner
                .tree
                .get(fragment_hash)
                .ok_or_else(|| AssetError::NotTracked(key.to_string()))?;
            if entry.asset_type != AssetType::Shader {
                return Err(AssetError::WrongType {
                    key: key.to_string(),
                    expected: AssetType::Shader,
                    actual: entry.asset_type,
                });
            }
            entry.full_path.clone()
        };

        if let Some(LoadedAsset::Shader(cached)) = inner.tree.get(vertex_hash).and_then(|e| e.loaded.clone()) {
            return Ok(cached);
        }

        let folder = vertex_path.parent().unwrap_or_else(|| Path::new(""));
        let id = resolved_shader_id(folder, key);
        let vertex_spv = read_spv(&vertex_path)?;
        let fragment_spv = read_spv(&fragment_path)?;
        let source = ShaderSource {
            id,
            path: folder.join(key),
            vertex_spv: vertex_spv.into(),
            fragment_spv: fragment_spv.into(),
        };

        if let Some(entry) = inner.tree.get_mut(vertex_hash) {
            entry.loaded = Some(LoadedAsset::Shader(source.clone()));
        }
        if let Some(entry) = inner.tree.get_mut(fragment_hash) {
            entry.loaded = Some(LoadedAsset::Shader(source.clone()));
        }
        log::info!("shader '{key}' loaded to memory");
        Ok(source)
    }

    /// Ensures every image the model references is tracked, then requests (cached) or
    /// loads (fresh) each by basename, matching `asset_library_load_model`'s inner loop.
    pub fn request_model(&self, key: &str) -> Result<ModelSource> {
        let hash = hash64(key.as_bytes());
        let (full_path, cached) = {
            let mut inner = self.inner.lock();
            let entry = inner
                .tree
                .get_mut(hash)
                .ok_or_else(|| AssetError::NotTracked(key.to_string()))?;
            if entry.asset_type != AssetType::Geometry {
                return Err(AssetError::WrongType {
                    key: key.to_string(),
                    expected: AssetType::Geometry,
                    actual: entry.asset_type,
                });
            }
            match &entry.loaded {
                Some(LoadedAsset::Model(cached)) => (entry.full_path.clone(), Some(cached.clone())),
                _ => (entry.full_path.clone(), None),
            }
        };
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let raw: Arc<[u8]> = std::fs::read(&full_path)?.into();
        // Embedded-texture extraction is the importer's job (non-goal here); a model
        // with no sibling images tracked yet simply carries an empty image list.
        let stem = full_path.file_stem().and_then(|s| s.to_str()).unwrap_or("model");
        let sibling_dir = full_path.parent().unwrap_or_else(|| Path::new(""));
        let mut images = Vec::new();
        if let Ok(read_dir) = std::fs::read_dir(sibling_dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if name.starts_with(&format!("{stem}_")) && classify_extension(path.extension().and_then(|e| e.to_str()).unwrap_or("")) == AssetType::Image {
                    self.track_file(&path);
                    if let Ok(image) = self.request_image(name) {
                        images.push(image);
                    }
                }
            }
        }

        let source = ModelSource { id: hash, raw, images };
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.tree.get_mut(hash) {
            entry.loaded = Some(LoadedAsset::Model(source.clone()));
        }
        Ok(source)
    }

    pub fn clear_cache(&self) {
        let mut inner = self.inner.lock();
        inner.tree.clear();
        inner.tracked_file_count = 0;
        log::info!("asset cache cleared, all tracking lost");
    }
}

/// Per §9.3/original `string_hash64((*out_shader)->path)`: the UUID written back onto
/// a requested shader's entries is the hash of the *resolved* `folder/key` path, not
/// the bare key.
pub fn resolved_shader_id(folder: &Path, key: &str) -> u64 {
    let resolved = folder.join(key);
    hash64(resolved.to_string_lossy().as_bytes())
}

fn decode_image(path: &Path, id: u64) -> Result<ImageSource> {
    let bytes = std::fs::read(path)?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| AssetError::DecodeFailed(e.to_string()))?
        .into_rgba8();
    Ok(ImageSource {
        id,
        width: decoded.width(),
        height: decoded.height(),
        pixels: decoded.into_raw().into(),
    })
}

fn read_spv(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes(chunk.try_into().unwrap()))
        .collect())
}

fn dir_display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rhi-assets-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn track_file_is_idempotent() {
        let path = temp_file("idempotent.png", b"not really a png");
        let library = AssetLibrary::new();
        assert!(library.track_file(&path));
        assert!(!library.track_file(&path));
        assert_eq!(library.tracked_file_count(), 1);
    }

    #[test]
    fn untracked_image_request_fails() {
        let library = AssetLibrary::new();
        assert!(matches!(library.request_image("nope.png"), Err(AssetError::NotTracked(_))));
    }

    #[test]
    fn wrong_type_request_fails() {
        let path = temp_file("mesh.glb", b"not really a glb");
        let library = AssetLibrary::new();
        library.track_file(&path);
        let result = library.request_image("mesh.glb");
        assert!(matches!(result, Err(AssetError::WrongType { .. })));
    }

    #[test]
    fn resolved_shader_id_depends_on_folder() {
        let a = resolved_shader_id(Path::new("shaders/a"), "light.glsl");
        let b = resolved_shader_id(Path::new("shaders/b"), "light.glsl");
        assert_ne!(a, b);
    }

    #[test]
    fn clear_cache_resets_tracking() {
        let path = temp_file("clear.png", b"data");
        let library = AssetLibrary::new();
        library.track_file(&path);
        assert_eq!(library.tracked_file_count(), 1);
        library.clear_cache();
        assert_eq!(library.tracked_file_count(), 0);
    }
}
