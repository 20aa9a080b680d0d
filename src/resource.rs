//! Materialization of embedded resources.
//!
//! A [`ResourceStore`] turns resource bytes into a location a consumer can
//! dereference: a file under a directory ([`DirectoryStore`]) or an opaque
//! `blob:` token backed by memory ([`MemoryStore`]). [`ResourceCache`]
//! sits in front of a store and remembers the location of every key it has
//! materialized until [`ResourceCache::destroy`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::cache::LazyCache;
use crate::error::Result;
use crate::util::extension_for;

/// Raw bytes of an embedded resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl Resource {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }
}

/// Where materialized resources live.
pub trait ResourceStore {
    /// Persist `resource` under `key` and return its location.
    fn store(&mut self, key: &str, resource: &Resource) -> Result<String>;

    /// Release a location returned by [`ResourceStore::store`].
    fn release(&mut self, location: &str) -> Result<()>;

    /// Read back the bytes behind a location.
    fn load(&self, location: &str) -> Option<Vec<u8>>;
}

/// Key characters that are escaped in file names.
const FILE_NAME_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// File name for a resource key.
///
/// Unsafe characters are percent-escaped, as is a leading `.`, so distinct
/// keys never share a file. The extension follows the media type.
fn file_name(key: &str, media_type: &str) -> String {
    let stem = utf8_percent_encode(key, FILE_NAME_ESCAPE).to_string();
    let stem = match stem.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => stem,
    };
    format!("{stem}.{}", extension_for(media_type))
}

/// Writes resources as files under one directory and hands out absolute
/// paths.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResourceStore for DirectoryStore {
    fn store(&mut self, key: &str, resource: &Resource) -> Result<String> {
        fs::create_dir_all(&self.dir)?;
        let path = std::path::absolute(self.dir.join(file_name(key, &resource.media_type)))?;
        fs::write(&path, &resource.data)?;
        log::debug!("wrote resource {key} to {}", path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    fn release(&mut self, location: &str) -> Result<()> {
        match fs::remove_file(location) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn load(&self, location: &str) -> Option<Vec<u8>> {
        fs::read(location).ok()
    }
}

/// Keeps resources in memory behind `blob:folio/<n>` tokens.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, Resource>,
    next: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &str) -> Option<&Resource> {
        self.blobs.get(location)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl ResourceStore for MemoryStore {
    fn store(&mut self, _key: &str, resource: &Resource) -> Result<String> {
        self.next += 1;
        let token = format!("blob:folio/{}", self.next);
        self.blobs.insert(token.clone(), resource.clone());
        Ok(token)
    }

    fn release(&mut self, location: &str) -> Result<()> {
        self.blobs.remove(location);
        Ok(())
    }

    fn load(&self, location: &str) -> Option<Vec<u8>> {
        self.blobs.get(location).map(|r| r.data.clone())
    }
}

/// Resource key to location cache in front of a [`ResourceStore`].
pub struct ResourceCache {
    store: Box<dyn ResourceStore>,
    locations: LazyCache<String, String>,
}

impl ResourceCache {
    pub fn new(store: Box<dyn ResourceStore>) -> Self {
        Self {
            store,
            locations: LazyCache::new(),
        }
    }

    /// Location for `key`, calling `fetch` and storing the bytes on a miss.
    pub fn resolve(&mut self, key: &str, fetch: impl FnOnce() -> Result<Resource>) -> Result<String> {
        let store = &mut self.store;
        self.locations
            .get_or_try_insert_with(key.to_string(), || {
                let resource = fetch()?;
                store.store(key, &resource)
            })
            .cloned()
    }

    /// Location of an already materialized key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.locations.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Bytes behind a location handed out by this cache.
    pub fn load(&self, location: &str) -> Option<Vec<u8>> {
        self.store.load(location)
    }

    /// Release every materialized resource. Failures are logged, never
    /// returned, and calling this again is a no-op.
    pub fn destroy(&mut self) {
        for (key, location) in self.locations.drain() {
            if let Err(e) = self.store.release(&location) {
                log::warn!("failed to release resource {key} at {location}: {e}");
            }
        }
    }
}
