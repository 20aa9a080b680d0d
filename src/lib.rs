//! # folio
//!
//! Navigation engine for EPUB and MOBI ebooks: document structure, chapter
//! loading, resource extraction and in-book link resolution.
//!
//! ## Features
//!
//! - EPUB 2/3: container, package metadata, manifest, spine, guide,
//!   collections, NCX table of contents, page list and nav list
//! - MOBI/PalmDOC: PDB/MOBI/EXTH headers, PalmDOC and HUFF/CDIC
//!   decompression, chapter segmentation and inline TOC reconstruction
//! - Lazy, cached chapter rewriting and resource extraction, to files or
//!   to in-memory blobs
//! - Link resolution back to a chapter and an anchor selector
//!
//! ## Quick Start
//!
//! ```no_run
//! use folio::{Backend, Book, OpenOptions};
//!
//! let options = OpenOptions::new().with_resource_dir("/tmp/folio-images");
//! let mut book = Book::open("alice.epub", &options).unwrap();
//!
//! println!("{}", book.metadata().title);
//! for id in book.chapter_ids() {
//!     let chapter = book.load_chapter(&id).unwrap();
//!     println!("{id}: {} bytes", chapter.html.len());
//! }
//!
//! if let Some(href) = book.toc().first().and_then(|item| item.href.clone()) {
//!     println!("{:?}", book.resolve_href(&href));
//! }
//! book.destroy();
//! ```

pub mod archive;
pub mod backend;
pub mod cache;
pub mod epub;
pub mod error;
pub mod io;
pub mod markup;
pub mod mobi;
pub mod model;
pub mod resource;
pub(crate) mod util;

pub use backend::{Backend, Book, Format, OpenOptions, Storage};
pub use epub::EpubBook;
pub use error::{Error, Result};
pub use mobi::MobiBook;
pub use model::{
    Chapter, ChapterId, Collection, Contributor, GuideReference, Identifier, ManifestItem,
    Metadata, NavList, NavTarget, PageList, PageTarget, ProcessedChapter, ResolvedHref, SpineItem,
    StyleSheet, Subject, TocItem,
};
pub use resource::{DirectoryStore, MemoryStore, Resource, ResourceCache, ResourceStore};
