//! Error types for folio operations.

use thiserror::Error;

/// Errors that can occur while opening or reading an ebook.
///
/// Structural errors (`MissingEntry`, `MalformedStructure`, `Encrypted`,
/// `UnsupportedFormat`) abort opening. `UnresolvableReference` and
/// `UnknownChapter` are local to a single chapter or resource request and
/// never affect cached state for other keys.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Missing entry: {0}")]
    MissingEntry(String),

    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    #[error("Unresolvable reference: {0}")]
    UnresolvableReference(String),

    #[error("Unknown chapter: {0}")]
    UnknownChapter(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Encrypted books are not supported")]
    Encrypted,
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(quick_xml::Error::InvalidAttr(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
