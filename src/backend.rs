//! The navigation contract shared by every format, and format dispatch.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::epub::EpubBook;
use crate::error::{Error, Result};
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::mobi::{MobiBook, PdbKind};
use crate::model::{ChapterId, Metadata, PageList, ProcessedChapter, ResolvedHref, TocItem};
use crate::resource::{DirectoryStore, MemoryStore, ResourceCache, ResourceStore};

/// Container formats folio can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    Epub,
    Mobi,
}

impl Format {
    /// Identify a container from its first bytes (at least 68 for MOBI).
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.starts_with(b"PK\x03\x04") {
            Some(Format::Epub)
        } else if PdbKind::sniff(head).is_some() {
            Some(Format::Mobi)
        } else {
            None
        }
    }
}

/// Bytes needed by [`Format::sniff`].
const SNIFF_LEN: usize = 68;

/// Where resources extracted from a book end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    /// Files under [`OpenOptions::resource_dir`], referenced by absolute path.
    #[default]
    Directory,
    /// In-memory blobs referenced by `blob:` tokens.
    Memory,
}

/// Settings for opening a book.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    resource_dir: PathBuf,
    storage: Storage,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("./images"),
            storage: Storage::Directory,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = dir.into();
        self
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn resource_dir(&self) -> &Path {
        &self.resource_dir
    }

    pub fn storage(&self) -> Storage {
        self.storage
    }

    pub(crate) fn resource_cache(&self) -> ResourceCache {
        let store: Box<dyn ResourceStore> = match self.storage {
            Storage::Directory => Box::new(DirectoryStore::new(&self.resource_dir)),
            Storage::Memory => Box::new(MemoryStore::new()),
        };
        ResourceCache::new(store)
    }
}

/// Navigation over one opened book.
///
/// EPUB addresses chapters by manifest id and MOBI by position in the text
/// stream; both resolve their own link forms back to a chapter and anchor
/// selector.
pub trait Backend {
    fn format(&self) -> Format;

    fn metadata(&self) -> &Metadata;

    /// Chapters in reading order.
    fn chapter_ids(&self) -> Vec<ChapterId>;

    fn toc(&self) -> &[TocItem];

    fn page_list(&self) -> Option<&PageList>;

    /// Rewritten chapter markup. The first call does the work; later calls
    /// return the cached result.
    fn load_chapter(&mut self, id: &ChapterId) -> Result<&ProcessedChapter>;

    /// Location of the cover image, materializing it on first use.
    fn cover_image(&mut self) -> Option<String>;

    /// Map a link produced by [`Backend::load_chapter`] to its chapter and
    /// anchor.
    fn resolve_href(&self, href: &str) -> Option<ResolvedHref>;

    /// Location of a resource by key (manifest id for EPUB, record index
    /// for MOBI).
    fn resource(&mut self, key: &str) -> Result<String>;

    /// Bytes behind a location returned by this book.
    fn load_resource(&self, location: &str) -> Option<Vec<u8>>;

    /// Release every materialized resource and drop cached chapters.
    /// Calling it again is harmless.
    fn destroy(&mut self);
}

/// A book of either format.
pub enum Book {
    Epub(EpubBook),
    Mobi(MobiBook),
}

impl Book {
    /// Open a file, choosing the backend from its leading bytes.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut head = Vec::with_capacity(SNIFF_LEN);
        File::open(path)?.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
        let format = Format::sniff(&head)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        log::debug!("opening {} as {format:?}", path.display());
        Self::from_source(format, Arc::new(FileSource::open(path)?), options)
    }

    pub fn from_bytes(data: Vec<u8>, options: &OpenOptions) -> Result<Self> {
        let format = Format::sniff(&data)
            .ok_or_else(|| Error::UnsupportedFormat("unrecognized container".into()))?;
        Self::from_source(format, Arc::new(MemorySource::new(data)), options)
    }

    pub fn from_source(format: Format, source: Arc<dyn ByteSource>, options: &OpenOptions) -> Result<Self> {
        Ok(match format {
            Format::Epub => Book::Epub(EpubBook::from_source(source, options)?),
            Format::Mobi => Book::Mobi(MobiBook::from_source(source, options)?),
        })
    }

    pub fn as_epub(&self) -> Option<&EpubBook> {
        match self {
            Book::Epub(book) => Some(book),
            Book::Mobi(_) => None,
        }
    }

    pub fn as_mobi(&self) -> Option<&MobiBook> {
        match self {
            Book::Mobi(book) => Some(book),
            Book::Epub(_) => None,
        }
    }

    fn backend(&self) -> &dyn Backend {
        match self {
            Book::Epub(book) => book,
            Book::Mobi(book) => book,
        }
    }

    fn backend_mut(&mut self) -> &mut dyn Backend {
        match self {
            Book::Epub(book) => book,
            Book::Mobi(book) => book,
        }
    }
}

impl Backend for Book {
    fn format(&self) -> Format {
        self.backend().format()
    }

    fn metadata(&self) -> &Metadata {
        self.backend().metadata()
    }

    fn chapter_ids(&self) -> Vec<ChapterId> {
        self.backend().chapter_ids()
    }

    fn toc(&self) -> &[TocItem] {
        self.backend().toc()
    }

    fn page_list(&self) -> Option<&PageList> {
        self.backend().page_list()
    }

    fn load_chapter(&mut self, id: &ChapterId) -> Result<&ProcessedChapter> {
        self.backend_mut().load_chapter(id)
    }

    fn cover_image(&mut self) -> Option<String> {
        self.backend_mut().cover_image()
    }

    fn resolve_href(&self, href: &str) -> Option<ResolvedHref> {
        self.backend().resolve_href(href)
    }

    fn resource(&mut self, key: &str) -> Result<String> {
        self.backend_mut().resource(key)
    }

    fn load_resource(&self, location: &str) -> Option<Vec<u8>> {
        self.backend().load_resource(location)
    }

    fn destroy(&mut self) {
        self.backend_mut().destroy()
    }
}
