//! File resolution for audio assets.
//!
//! Sources only need a seekable byte stream; where the bytes come from is up
//! to the [`AssetSource`] the engine was built with.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};

/// Seekable byte stream handed to decoders.
pub trait MediaStream: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> MediaStream for T {}

/// Resolves asset names to byte streams.
pub trait AssetSource {
    fn open(&self, name: &str) -> Result<Box<dyn MediaStream>>;
}

/// Strip the leading slashes script code tends to put in front of asset
/// names ("/music/theme.ogg" and "music/theme.ogg" name the same file).
pub fn normalize_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

/// Assets read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory source rooted at the current working directory.
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path an asset name resolves to.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(normalize_name(name))
    }
}

impl AssetSource for DirectorySource {
    fn open(&self, name: &str) -> Result<Box<dyn MediaStream>> {
        let path = self.resolve(name);
        let file = File::open(&path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        Ok(Box::new(file))
    }
}

/// Assets held in memory, keyed by normalized name.
///
/// Contents are shared, so opening the same asset twice does not copy it.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data: Vec<u8> = data.into();
        self.files
            .insert(normalize_name(name).to_string(), Arc::from(data));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for MemoryAssets {
    fn open(&self, name: &str) -> Result<Box<dyn MediaStream>> {
        match self.files.get(normalize_name(name)) {
            Some(data) => Ok(Box::new(Cursor::new(SharedBytes(Arc::clone(data))))),
            None => bail!("Audio asset not found: {name}"),
        }
    }
}

/// `AsRef<[u8]>` view so a shared slice can back a `Cursor`.
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("/music/a.ogg"), "music/a.ogg");
        assert_eq!(normalize_name("//a.ogg"), "a.ogg");
        assert_eq!(normalize_name("a.ogg"), "a.ogg");
    }

    #[test]
    fn test_directory_source_opens_relative_to_root() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("music")).unwrap();
        fs::write(dir.path().join("music/theme.bin"), b"abc").unwrap();

        let source = DirectorySource::new(dir.path());
        let mut stream = source.open("/music/theme.bin").unwrap();
        let mut content = Vec::new();
        stream.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"abc");
    }

    #[test]
    fn test_directory_source_missing_file() {
        let dir = tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        let err = source.open("missing.ogg").err().unwrap();
        assert!(err.to_string().contains("missing.ogg"));
    }

    #[test]
    fn test_memory_assets() {
        let mut assets = MemoryAssets::new();
        assets.insert("/sfx/blip.wav", b"RIFF".to_vec());
        assert!(assets.contains("sfx/blip.wav"));
        assert_eq!(assets.len(), 1);

        let mut first = assets.open("sfx/blip.wav").unwrap();
        let mut second = assets.open("/sfx/blip.wav").unwrap();
        let mut a = Vec::new();
        let mut b = Vec::new();
        first.read_to_end(&mut a).unwrap();
        second.read_to_end(&mut b).unwrap();
        assert_eq!(a, b"RIFF");
        assert_eq!(a, b);
        assert!(assets.open("nope.wav").is_err());
    }
}
