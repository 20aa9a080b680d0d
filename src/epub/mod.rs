//! EPUB backend.
//!
//! Structure (package document, NCX) is parsed when the book is opened;
//! chapters and resources are materialized on first use.

mod book;
pub mod parser;
pub mod rewrite;

pub use book::EpubBook;
pub use parser::{EPUB_MIME_TYPE, Ncx, Package, parse_container, parse_ncx, parse_package};
