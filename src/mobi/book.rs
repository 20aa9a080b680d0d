use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::backend::{Backend, Format, OpenOptions};
use crate::cache::LazyCache;
use crate::error::{Error, Result};
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::model::{Chapter, ChapterId, Metadata, PageList, ProcessedChapter, ResolvedHref, TocItem};
use crate::resource::ResourceCache;
use crate::util::decode_text;

use super::chapters::{Segmentation, segment};
use super::headers::{ExthHeader, MobiHeader};
use super::records::MobiRecords;
use super::rewrite::{LINK_SCHEME, collect_link_targets, insert_anchors, rewrite_markup};
use super::toc::{find_toc_offset, parse_toc};

/// Resource key of the EXTH cover image.
pub const COVER_KEY: &str = "cover";

/// An opened Mobipocket (or PalmDOC) book.
pub struct MobiBook {
    records: MobiRecords,
    stream: Vec<u8>,
    segmentation: Segmentation,
    /// Stream offsets that some link points at.
    link_targets: BTreeSet<usize>,
    metadata: Metadata,
    toc: Vec<TocItem>,

    chapters: LazyCache<usize, ProcessedChapter>,
    resources: ResourceCache,
}

impl MobiBook {
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        Self::from_source(Arc::new(FileSource::open(path)?), options)
    }

    pub fn from_bytes(data: Vec<u8>, options: &OpenOptions) -> Result<Self> {
        Self::from_source(Arc::new(MemorySource::new(data)), options)
    }

    pub fn from_source(source: Arc<dyn ByteSource>, options: &OpenOptions) -> Result<Self> {
        let records = MobiRecords::new(source)?;
        let stream = records.text_stream()?;
        let encoding = records.header().encoding.label();

        let segmentation = segment(&stream, encoding);
        log::debug!(
            "text stream of {} bytes in {} chapters",
            stream.len(),
            segmentation.chapters.len()
        );

        let toc = match find_toc_offset(&stream[segmentation.reference.clone()])
            .and_then(|offset| segmentation.chapter_at(offset))
        {
            Some(index) => {
                log::debug!("table of contents in chapter {index}");
                parse_toc(&segmentation.chapters[index].text, &segmentation.chapters)
            }
            None => Vec::new(),
        };

        Ok(Self {
            link_targets: collect_link_targets(&stream),
            metadata: records.metadata(),
            records,
            stream,
            segmentation,
            toc,
            chapters: LazyCache::new(),
            resources: options.resource_cache(),
        })
    }

    /// Chapters in stream order; this is the MOBI reading order.
    pub fn chapters(&self) -> &[Chapter] {
        &self.segmentation.chapters
    }

    pub fn header(&self) -> &MobiHeader {
        self.records.header()
    }

    pub fn exth(&self) -> Option<&ExthHeader> {
        self.records.exth()
    }

    pub fn records(&self) -> &MobiRecords {
        &self.records
    }

    /// The decompressed text all `filepos` offsets refer to.
    pub fn text_stream(&self) -> &[u8] {
        &self.stream
    }
}

impl Backend for MobiBook {
    fn format(&self) -> Format {
        Format::Mobi
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn chapter_ids(&self) -> Vec<ChapterId> {
        (0..self.segmentation.chapters.len()).map(ChapterId::Index).collect()
    }

    fn toc(&self) -> &[TocItem] {
        &self.toc
    }

    fn page_list(&self) -> Option<&PageList> {
        None
    }

    fn load_chapter(&mut self, id: &ChapterId) -> Result<&ProcessedChapter> {
        let Self {
            records,
            stream,
            segmentation,
            link_targets,
            chapters,
            resources,
            ..
        } = self;

        let index = id
            .as_index()
            .filter(|&i| i < segmentation.chapters.len())
            .ok_or_else(|| Error::UnknownChapter(id.to_string()))?;

        chapters.get_or_try_insert_with(index, || {
            let chapter = &segmentation.chapters[index];
            let content = segmentation.content[index].clone();
            let targets = link_targets.range(chapter.start..chapter.end).copied();
            let bytes = insert_anchors(&stream[content.clone()], content.start, targets);
            let markup = decode_text(&bytes, Some(records.header().encoding.label()));

            log::debug!("rewriting chapter {index}");
            let html = rewrite_markup(&markup, |recindex| {
                resources
                    .resolve(&recindex.to_string(), || records.resource(recindex))
                    .inspect_err(|e| log::warn!("resource {recindex} unavailable: {e}"))
                    .ok()
            });
            Ok(ProcessedChapter {
                html,
                css: Vec::new(),
            })
        })
    }

    fn cover_image(&mut self) -> Option<String> {
        self.resource(COVER_KEY)
            .inspect_err(|e| log::debug!("no cover image: {e}"))
            .ok()
    }

    fn resolve_href(&self, href: &str) -> Option<ResolvedHref> {
        let offset = &href[href.find(LINK_SCHEME)? + LINK_SCHEME.len()..];
        let digits = offset.bytes().take_while(u8::is_ascii_digit).count();
        let pos: usize = offset[..digits].parse().ok()?;
        let index = self.segmentation.chapter_at(pos)?;
        Some(ResolvedHref::new(
            ChapterId::Index(index),
            &format!("{LINK_SCHEME}{pos}"),
        ))
    }

    fn resource(&mut self, key: &str) -> Result<String> {
        let records = &self.records;
        if key == COVER_KEY {
            let recindex = records
                .cover_recindex()
                .ok_or_else(|| Error::MissingEntry("cover record".into()))?;
            return self.resources.resolve(COVER_KEY, || records.resource(recindex));
        }

        let recindex: usize = key
            .trim()
            .parse()
            .map_err(|_| Error::UnresolvableReference(format!("resource key {key}")))?;
        self.resources
            .resolve(&recindex.to_string(), || records.resource(recindex))
    }

    fn load_resource(&self, location: &str) -> Option<Vec<u8>> {
        self.resources.load(location)
    }

    fn destroy(&mut self) {
        self.resources.destroy();
        self.chapters.clear();
    }
}
