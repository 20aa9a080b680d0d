//! Format-agnostic data model shared by the EPUB and MOBI backends.

use std::collections::BTreeMap;
use std::fmt;

/// Identifies a chapter within one book.
///
/// EPUB chapters are addressed by manifest id, MOBI chapters by their
/// position in the reconstructed text stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChapterId {
    Manifest(String),
    Index(usize),
}

impl ChapterId {
    pub fn as_manifest(&self) -> Option<&str> {
        match self {
            ChapterId::Manifest(id) => Some(id),
            ChapterId::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            ChapterId::Index(i) => Some(*i),
            ChapterId::Manifest(_) => None,
        }
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterId::Manifest(id) => f.write_str(id),
            ChapterId::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for ChapterId {
    fn from(id: &str) -> Self {
        ChapterId::Manifest(id.to_string())
    }
}

impl From<String> for ChapterId {
    fn from(id: String) -> Self {
        ChapterId::Manifest(id)
    }
}

impl From<usize> for ChapterId {
    fn from(index: usize) -> Self {
        ChapterId::Index(index)
    }
}

/// A person credited in the metadata (`dc:creator` / `dc:contributor`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contributor {
    pub name: String,
    pub file_as: String,
    pub role: String,
}

/// A `dc:subject` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subject {
    pub value: String,
    pub authority: String,
    pub term: String,
}

/// The package identifier and its scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identifier {
    pub id: String,
    pub scheme: String,
}

/// Document metadata (Dublin Core plus free-form meta pairs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    pub title: String,
    pub language: String,
    pub creators: Vec<Contributor>,
    pub contributors: Vec<Contributor>,
    pub subjects: Vec<Subject>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub rights: Option<String>,
    pub source: Option<String>,
    pub identifier: Option<Identifier>,
    /// Dates keyed by role, e.g. `publication`, `conversion`, `modification`.
    pub dates: BTreeMap<String, String>,
    pub metas: BTreeMap<String, String>,
}

/// An EPUB manifest entry. `href` is container-relative with forward slashes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: String,
    pub media_overlay: String,
}

/// An entry in the EPUB reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpineItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub media_overlay: String,
    pub properties: String,
    /// `false` for auxiliary content (`linear="no"`).
    pub linear: bool,
}

/// A legacy EPUB 2 guide reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GuideReference {
    pub title: String,
    pub kind: String,
    pub href: String,
}

/// A node in the hierarchical table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TocItem {
    pub label: String,
    pub href: Option<String>,
    /// Chapter that contains the target, when it could be determined.
    pub chapter: Option<ChapterId>,
    pub play_order: Option<u32>,
    pub children: Vec<TocItem>,
}

impl TocItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_chapter(mut self, chapter: ChapterId) -> Self {
        self.chapter = Some(chapter);
        self
    }

    pub fn with_child(mut self, child: TocItem) -> Self {
        self.children.push(child);
        self
    }
}

/// A single print-page location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageTarget {
    pub label: String,
    pub value: String,
    pub href: String,
    pub play_order: Option<u32>,
    /// `front`, `normal` or `special`.
    pub kind: String,
    pub correspond_id: String,
}

/// Flat, ordered print-page index (NCX `pageList`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageList {
    pub label: String,
    pub page_targets: Vec<PageTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavTarget {
    pub id: String,
    pub label: String,
    pub href: String,
    pub play_order: Option<u32>,
}

/// NCX `navList`: a flat list of secondary navigation points (figures, tables...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavList {
    pub label: String,
    pub targets: Vec<NavTarget>,
}

/// EPUB 3 `collection` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Collection {
    pub role: String,
    pub links: Vec<String>,
    pub children: Vec<Collection>,
}

/// A MOBI chapter: a byte range of the reconstructed text stream.
///
/// `start` is the offset of the page-break marker that opens the chapter
/// (0 for the first chapter) and `end` the offset of the next marker, so
/// consecutive chapters satisfy `end == next.start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chapter {
    pub id: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
    /// Length in bytes of the chapter content, marker excluded.
    pub size: usize,
}

impl Chapter {
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyleSheet {
    pub href: String,
}

/// A rewritten chapter ready for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessedChapter {
    pub html: String,
    pub css: Vec<StyleSheet>,
}

/// Result of mapping an in-document link back to a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvedHref {
    pub id: ChapterId,
    /// Attribute-equality selector for the anchor, e.g. `[id="note-1"]`.
    pub selector: String,
}

impl ResolvedHref {
    pub(crate) fn new(id: ChapterId, anchor: &str) -> Self {
        let mut selector = String::with_capacity(anchor.len() + 7);
        selector.push_str("[id=\"");
        for c in anchor.chars() {
            if matches!(c, '"' | '\\') {
                selector.push('\\');
            }
            selector.push(c);
        }
        selector.push_str("\"]");
        Self { id, selector }
    }
}
