//! Zip container access with case-insensitive entry names.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::io::{ByteSource, ByteSourceCursor};
use crate::util::{decode_text, strip_bom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Stored,
    Deflated,
    Unsupported,
}

/// Location of one entry's payload inside the container.
#[derive(Debug, Clone)]
struct EntryLoc {
    name: String,
    data_offset: u64,
    compressed_size: u64,
    compression: Compression,
}

/// A zip archive whose central directory has been indexed once.
///
/// Entry data is read straight from the [`ByteSource`] on demand; lookups
/// ignore ASCII case, and [`Archive::names`] keeps the stored spelling.
pub struct Archive {
    source: Arc<dyn ByteSource>,
    entries: HashMap<String, EntryLoc>,
    order: Vec<String>,
}

impl Archive {
    pub fn new(source: Arc<dyn ByteSource>) -> Result<Self> {
        let mut zip = ZipArchive::new(ByteSourceCursor::new(source.clone()))?;

        let mut entries = HashMap::with_capacity(zip.len());
        let mut order = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let compression = match file.compression() {
                zip::CompressionMethod::Stored => Compression::Stored,
                zip::CompressionMethod::Deflated => Compression::Deflated,
                _ => Compression::Unsupported,
            };
            let key = name.to_ascii_lowercase();
            if entries.contains_key(&key) {
                log::warn!("duplicate archive entry {name:?} ignored");
                continue;
            }
            entries.insert(
                key,
                EntryLoc {
                    name: name.clone(),
                    data_offset: file.data_start(),
                    compressed_size: file.compressed_size(),
                    compression,
                },
            );
            order.push(name);
        }

        Ok(Self {
            source,
            entries,
            order,
        })
    }

    /// Entry names in directory order, original spelling.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Read and inflate an entry.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let loc = self
            .entries
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| Error::MissingEntry(name.to_string()))?;

        let raw = self
            .source
            .read_at(loc.data_offset, loc.compressed_size as usize)?;
        match loc.compression {
            Compression::Stored => Ok(raw),
            Compression::Deflated => {
                let mut out = Vec::new();
                flate2::read::DeflateDecoder::new(&raw[..]).read_to_end(&mut out)?;
                Ok(out)
            }
            Compression::Unsupported => Err(Error::UnsupportedFormat(format!(
                "compression method of archive entry {}",
                loc.name
            ))),
        }
    }

    /// Read an entry as text, dropping a UTF-8 byte order mark.
    pub fn read_text(&self, name: &str) -> Result<String> {
        let bytes = self.read(name)?;
        Ok(decode_text(strip_bom(&bytes), None).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, deflate) in entries {
            let method = if *deflate {
                zip::CompressionMethod::Deflated
            } else {
                zip::CompressionMethod::Stored
            };
            zip.start_file(*name, SimpleFileOptions::default().compression_method(method))
                .unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn open(entries: &[(&str, &[u8], bool)]) -> Archive {
        Archive::new(Arc::new(MemorySource::new(build_zip(entries)))).unwrap()
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let archive = open(&[("OEBPS/Content.opf", b"<package/>", false)]);
        assert!(archive.contains("oebps/content.opf"));
        assert_eq!(archive.read("OEBPS/CONTENT.OPF").unwrap(), b"<package/>");
        assert_eq!(archive.names().collect::<Vec<_>>(), ["OEBPS/Content.opf"]);
    }

    #[test]
    fn test_deflated_entry() {
        let text = "chapter text ".repeat(200);
        let archive = open(&[("ch1.xhtml", text.as_bytes(), true)]);
        assert_eq!(archive.read_text("ch1.xhtml").unwrap(), text);
    }

    #[test]
    fn test_read_text_strips_bom() {
        let archive = open(&[("a.xml", b"\xEF\xBB\xBF<a/>", false)]);
        assert_eq!(archive.read_text("a.xml").unwrap(), "<a/>");
    }

    #[test]
    fn test_missing_entry() {
        let archive = open(&[("mimetype", b"application/epub+zip", false)]);
        assert!(matches!(
            archive.read("META-INF/container.xml"),
            Err(Error::MissingEntry(name)) if name == "META-INF/container.xml"
        ));
    }
}
