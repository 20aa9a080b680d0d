//! Mobipocket backend.
//!
//! The text records are decompressed into one stream when the book is
//! opened; chapters are byte ranges of that stream and links address it by
//! offset (`filepos`).

mod book;
pub mod chapters;
pub mod headers;
pub mod huffcdic;
pub mod palmdoc;
pub mod records;
pub mod rewrite;
pub mod toc;

pub use book::{COVER_KEY, MobiBook};
pub use chapters::{Segmentation, segment};
pub use headers::{Compression, Encoding, ExthHeader, MobiHeader, PdbHeader, PdbKind};
pub use records::MobiRecords;
