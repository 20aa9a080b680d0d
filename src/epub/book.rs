use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::archive::Archive;
use crate::backend::{Backend, Format, OpenOptions};
use crate::cache::LazyCache;
use crate::error::{Error, Result};
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::model::{
    ChapterId, Collection, GuideReference, ManifestItem, Metadata, NavList, PageList,
    ProcessedChapter, ResolvedHref, SpineItem, TocItem,
};
use crate::resource::{Resource, ResourceCache};
use crate::util::{join_path, parent_dir, split_fragment};

use super::parser::{self, Ncx};
use super::rewrite::{LINK_SCHEME, rewrite_chapter};

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// An opened EPUB.
pub struct EpubBook {
    archive: Archive,
    mime_type: String,
    root_file_path: String,
    content_base_dir: String,

    metadata: Metadata,
    manifest: Vec<ManifestItem>,
    /// Manifest id -> position in `manifest`.
    manifest_index: HashMap<String, usize>,
    /// Archive path -> manifest id.
    href_index: HashMap<String, String>,
    spine: Vec<SpineItem>,
    guide: Vec<GuideReference>,
    collections: Vec<Collection>,
    toc: Vec<TocItem>,
    page_list: Option<PageList>,
    nav_list: Option<NavList>,
    cover_id: Option<String>,

    chapters: LazyCache<String, ProcessedChapter>,
    resources: ResourceCache,
}

impl EpubBook {
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        Self::from_source(Arc::new(FileSource::open(path)?), options)
    }

    pub fn from_bytes(data: Vec<u8>, options: &OpenOptions) -> Result<Self> {
        Self::from_source(Arc::new(MemorySource::new(data)), options)
    }

    pub fn from_source(source: Arc<dyn ByteSource>, options: &OpenOptions) -> Result<Self> {
        let archive = Archive::new(source)?;

        let mime_type = parser::parse_mimetype(&archive.read_text("mimetype")?)?;
        let root_file_path = parser::parse_container(&archive.read_text(CONTAINER_PATH)?)?;
        let content_base_dir = parent_dir(&root_file_path).replace('\\', "/");
        log::debug!("package document at {root_file_path}");

        let package = parser::parse_package(&archive.read_text(&root_file_path)?, &content_base_dir)?;
        log::debug!(
            "manifest has {} items, spine {}",
            package.manifest.len(),
            package.spine.len()
        );

        let manifest_index: HashMap<String, usize> = package
            .manifest
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        let href_index: HashMap<String, String> = package
            .manifest
            .iter()
            .map(|item| (item.href.clone(), item.id.clone()))
            .collect();

        let Ncx {
            mut toc,
            page_list,
            nav_list,
        } = match &package.ncx_path {
            Some(ncx_path) => read_ncx(&archive, ncx_path),
            None => Ncx::default(),
        };
        link_toc_chapters(&mut toc, &href_index);

        let cover_id = find_cover(&package, &manifest_index, &href_index);

        Ok(Self {
            archive,
            mime_type,
            root_file_path,
            content_base_dir,
            metadata: package.metadata,
            manifest: package.manifest,
            manifest_index,
            href_index,
            spine: package.spine,
            guide: package.guide,
            collections: package.collections,
            toc,
            page_list,
            nav_list,
            cover_id,
            chapters: LazyCache::new(),
            resources: options.resource_cache(),
        })
    }

    /// Contents of the `mimetype` entry.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Archive path of the package document.
    pub fn root_file_path(&self) -> &str {
        &self.root_file_path
    }

    /// Directory all package hrefs are relative to.
    pub fn content_base_dir(&self) -> &str {
        &self.content_base_dir
    }

    pub fn manifest(&self) -> &[ManifestItem] {
        &self.manifest
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest_index.get(id).map(|&i| &self.manifest[i])
    }

    pub fn spine(&self) -> &[SpineItem] {
        &self.spine
    }

    pub fn guide(&self) -> &[GuideReference] {
        &self.guide
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn nav_list(&self) -> Option<&NavList> {
        self.nav_list.as_ref()
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Manifest id for an archive path, also accepting paths relative to
    /// the content directory.
    fn id_for_path(&self, path: &str) -> Option<&str> {
        self.href_index
            .get(path)
            .or_else(|| self.href_index.get(&join_path(&self.content_base_dir, path)))
            .map(String::as_str)
    }
}

impl Backend for EpubBook {
    fn format(&self) -> Format {
        Format::Epub
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn chapter_ids(&self) -> Vec<ChapterId> {
        self.spine
            .iter()
            .map(|item| ChapterId::Manifest(item.id.clone()))
            .collect()
    }

    fn toc(&self) -> &[TocItem] {
        &self.toc
    }

    fn page_list(&self) -> Option<&PageList> {
        self.page_list.as_ref()
    }

    fn load_chapter(&mut self, id: &ChapterId) -> Result<&ProcessedChapter> {
        let Self {
            archive,
            manifest,
            manifest_index,
            href_index,
            chapters,
            resources,
            ..
        } = self;

        let item = id
            .as_manifest()
            .and_then(|key| manifest_index.get(key))
            .map(|&i| &manifest[i])
            .ok_or_else(|| Error::UnknownChapter(id.to_string()))?;

        chapters.get_or_try_insert_with(item.id.clone(), || {
            let markup = archive.read_text(&item.href)?;
            log::debug!("rewriting chapter {}", item.id);
            Ok(rewrite_chapter(&markup, &item.href, |path| {
                let target = href_index.get(path).and_then(|id| manifest_index.get(id))?;
                materialize(archive, &manifest[*target], resources)
                    .inspect_err(|e| log::warn!("resource {path} unavailable: {e}"))
                    .ok()
            }))
        })
    }

    fn cover_image(&mut self) -> Option<String> {
        let id = self.cover_id.clone()?;
        self.resource(&id)
            .inspect_err(|e| log::warn!("cover image unavailable: {e}"))
            .ok()
    }

    fn resolve_href(&self, href: &str) -> Option<ResolvedHref> {
        let href = href.strip_prefix(LINK_SCHEME).unwrap_or(href);
        let (path, fragment) = split_fragment(href);
        let fragment = percent_decode_str(fragment.filter(|f| !f.is_empty())?).decode_utf8_lossy();
        let id = self.id_for_path(path)?;
        Some(ResolvedHref::new(ChapterId::Manifest(id.to_string()), &fragment))
    }

    fn resource(&mut self, key: &str) -> Result<String> {
        let index = *self
            .manifest_index
            .get(key)
            .ok_or_else(|| Error::MissingEntry(format!("manifest item {key}")))?;
        materialize(&self.archive, &self.manifest[index], &mut self.resources)
    }

    fn load_resource(&self, location: &str) -> Option<Vec<u8>> {
        self.resources.load(location)
    }

    fn destroy(&mut self) {
        self.resources.destroy();
        self.chapters.clear();
    }
}

/// Location of a manifest item's bytes, extracting them on first use.
fn materialize(archive: &Archive, item: &ManifestItem, resources: &mut ResourceCache) -> Result<String> {
    resources.resolve(&item.id, || {
        Ok(Resource::new(item.media_type.clone(), archive.read(&item.href)?))
    })
}

/// Read and parse the NCX; a missing or broken NCX leaves the book
/// without navigation rather than failing to open it.
fn read_ncx(archive: &Archive, ncx_path: &str) -> Ncx {
    let parsed = archive
        .read_text(ncx_path)
        .and_then(|content| parser::parse_ncx(&content, parent_dir(ncx_path)));
    match parsed {
        Ok(ncx) => {
            log::debug!("NCX {ncx_path}: {} top-level entries", ncx.toc.len());
            ncx
        }
        Err(e) => {
            log::warn!("ignoring table of contents {ncx_path}: {e}");
            Ncx::default()
        }
    }
}

fn link_toc_chapters(items: &mut [TocItem], href_index: &HashMap<String, String>) {
    for item in items {
        if let Some(href) = &item.href
            && let Some(id) = href_index.get(split_fragment(href).0)
        {
            item.chapter = Some(ChapterId::Manifest(id.clone()));
        }
        link_toc_chapters(&mut item.children, href_index);
    }
}

/// Cover image manifest id: EPUB 3 `cover-image` property, then the
/// EPUB 2 cover meta, then a guide `cover` reference to an image.
fn find_cover(
    package: &parser::Package,
    manifest_index: &HashMap<String, usize>,
    href_index: &HashMap<String, String>,
) -> Option<String> {
    let is_image = |id: &str| {
        manifest_index
            .get(id)
            .is_some_and(|&i| package.manifest[i].media_type.starts_with("image"))
    };

    package
        .manifest
        .iter()
        .find(|item| item.properties.split_ascii_whitespace().any(|p| p == "cover-image"))
        .map(|item| item.id.clone())
        .or_else(|| package.cover_meta.clone().filter(|id| is_image(id.as_str())))
        .or_else(|| {
            package
                .guide
                .iter()
                .filter(|r| r.kind.eq_ignore_ascii_case("cover"))
                .filter_map(|r| href_index.get(split_fragment(&r.href).0))
                .find(|id| is_image(id.as_str()))
                .cloned()
        })
}
