//! Record-level access to a Mobipocket/PalmDOC file.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ByteSource;
use crate::model::{Contributor, Identifier, Metadata, Subject};
use crate::resource::Resource;
use crate::util::detect_record_type;

use super::headers::{Compression, ExthHeader, MobiHeader, NULL_INDEX, PDB_HEADER_LEN, PdbHeader};
use super::huffcdic::HuffCdic;
use super::palmdoc;

/// Parsed headers plus on-demand access to every record.
pub struct MobiRecords {
    source: Arc<dyn ByteSource>,
    pdb: PdbHeader,
    header: MobiHeader,
    exth: Option<ExthHeader>,
}

impl MobiRecords {
    pub fn new(source: Arc<dyn ByteSource>) -> Result<Self> {
        let file_len = source.len();
        if file_len < PDB_HEADER_LEN as u64 {
            return Err(Error::MalformedStructure("file too short for a PDB header".into()));
        }

        let fixed = source.read_at(0, PDB_HEADER_LEN)?;
        let count = PdbHeader::record_count(&fixed)?;
        let table_len = PDB_HEADER_LEN + count * 8;
        if table_len as u64 > file_len {
            return Err(Error::MalformedStructure(format!(
                "record table of {count} entries exceeds file"
            )));
        }
        let pdb = PdbHeader::parse(&source.read_at(0, table_len)?)?;
        if pdb.record_offsets.is_empty() {
            return Err(Error::MissingEntry("record 0".into()));
        }

        let (start, end) = pdb.record_range(0, file_len)?;
        let record0 = source.read_range(start, end)?;
        let header = MobiHeader::parse(&record0)?;
        if header.is_encrypted() {
            return Err(Error::Encrypted);
        }

        let exth = header.exth_offset().and_then(|offset| {
            let data = record0.get(offset..)?;
            ExthHeader::parse(data, header.encoding)
                .inspect_err(|e| log::warn!("ignoring EXTH block: {e}"))
                .ok()
        });

        log::debug!(
            "{:?} with {} records, {} text records, {:?} compression",
            pdb.kind,
            pdb.record_offsets.len(),
            header.text_record_count,
            header.compression
        );

        Ok(Self {
            source,
            pdb,
            header,
            exth,
        })
    }

    pub fn pdb(&self) -> &PdbHeader {
        &self.pdb
    }

    pub fn header(&self) -> &MobiHeader {
        &self.header
    }

    pub fn exth(&self) -> Option<&ExthHeader> {
        self.exth.as_ref()
    }

    pub fn record_count(&self) -> usize {
        self.pdb.record_offsets.len()
    }

    /// Raw bytes of record `index`.
    pub fn record(&self, index: usize) -> Result<Vec<u8>> {
        let (start, end) = self.pdb.record_range(index, self.source.len())?;
        Ok(self.source.read_range(start, end)?)
    }

    /// Decompress and concatenate the text records.
    ///
    /// Offsets into the returned stream are the `filepos` values used by
    /// links and the reference section.
    pub fn text_stream(&self) -> Result<Vec<u8>> {
        let mut huffman = match self.header.compression {
            Compression::Huffman => Some(self.load_huffcdic()?),
            Compression::Unknown(n) => {
                return Err(Error::UnsupportedFormat(format!("compression type {n}")));
            }
            _ => None,
        };

        let last = usize::from(self.header.text_record_count).min(self.record_count().saturating_sub(1));
        let mut stream = Vec::with_capacity(self.header.text_length as usize);
        for index in 1..=last {
            let record = self.record(index)?;
            let record = strip_trailing_entries(&record, self.header.extra_data_flags);
            match (&self.header.compression, huffman.as_mut()) {
                (Compression::PalmDoc, _) => stream.extend(palmdoc::decompress(record)),
                (Compression::Huffman, Some(decoder)) => stream.extend(decoder.decompress(record)?),
                _ => stream.extend_from_slice(record),
            }
        }

        if self.header.text_length > 0 && stream.len() > self.header.text_length as usize {
            stream.truncate(self.header.text_length as usize);
        }
        Ok(stream)
    }

    fn load_huffcdic(&self) -> Result<HuffCdic> {
        let first = self.header.huff_record_index;
        let count = self.header.huff_record_count as usize;
        if first == NULL_INDEX || count == 0 {
            return Err(Error::MalformedStructure(
                "Huffman compression without HUFF/CDIC records".into(),
            ));
        }
        let first = first as usize;
        let huff = self.record(first)?;
        let cdics = (first + 1..first + count)
            .map(|index| self.record(index))
            .collect::<Result<Vec<_>>>()?;
        HuffCdic::new(&huff, &cdics)
    }

    /// Resource record by its 1-based `recindex`, relative to the first
    /// resource record.
    pub fn resource(&self, recindex: usize) -> Result<Resource> {
        let first = self.header.first_resource_index;
        if first == NULL_INDEX || recindex == 0 {
            return Err(Error::UnresolvableReference(format!("recindex {recindex}")));
        }
        let index = (first as usize)
            .checked_add(recindex - 1)
            .filter(|&index| index < self.record_count())
            .ok_or_else(|| Error::MissingEntry(format!("resource record {recindex}")))?;
        let data = self.record(index)?;
        let media_type = detect_record_type(&data);
        Ok(Resource::new(media_type, strip_media_header(data)))
    }

    /// `recindex` of the cover image named by EXTH, if any.
    pub fn cover_recindex(&self) -> Option<usize> {
        let offset = self.exth.as_ref()?.cover_offset?;
        (self.header.first_resource_index != NULL_INDEX).then_some(offset as usize + 1)
    }

    /// Metadata from the MOBI header and EXTH records.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata {
            title: self.header.title.clone(),
            language: self.header.language().unwrap_or_default().to_string(),
            ..Default::default()
        };
        if metadata.title.is_empty() {
            metadata.title = self.pdb.name.replace('_', " ");
        }

        let Some(exth) = &self.exth else {
            return metadata;
        };
        if let Some(title) = exth.title.clone() {
            metadata.title = title;
        }
        if let Some(language) = exth.language.clone() {
            metadata.language = language;
        }
        metadata.creators = exth
            .authors
            .iter()
            .map(|name| Contributor {
                name: name.clone(),
                role: "aut".into(),
                ..Default::default()
            })
            .collect();
        metadata.subjects = exth
            .subjects
            .iter()
            .map(|value| Subject {
                value: value.clone(),
                ..Default::default()
            })
            .collect();
        metadata.publisher = exth.publisher.clone();
        metadata.description = exth.description.clone();
        metadata.rights = exth.rights.clone();
        metadata.source = exth.source.clone();
        metadata.identifier = exth
            .isbn
            .as_ref()
            .map(|isbn| Identifier {
                id: isbn.clone(),
                scheme: "ISBN".into(),
            })
            .or_else(|| {
                exth.asin.as_ref().map(|asin| Identifier {
                    id: asin.clone(),
                    scheme: "ASIN".into(),
                })
            });
        if let Some(date) = exth.published.clone() {
            metadata.dates.insert("publication".into(), date);
        }
        metadata
    }
}

/// Size of one trailing entry: a backward-encoded variable-width integer
/// in the last four bytes, where a set high bit starts the number.
fn trailing_entry_size(data: &[u8]) -> usize {
    let tail = &data[data.len().saturating_sub(4)..];
    tail.iter().fold(0usize, |size, &b| {
        let size = if b & 0x80 != 0 { 0 } else { size };
        (size << 7) | usize::from(b & 0x7F)
    })
}

/// Remove the extra entries appended to a text record.
///
/// Bits 1..15 of `flags` each announce one sized entry; bit 0 announces
/// the multibyte overlap, stored innermost.
pub fn strip_trailing_entries(record: &[u8], flags: u16) -> &[u8] {
    let mut end = record.len();
    let mut extra = flags >> 1;
    while extra != 0 {
        if extra & 1 != 0 {
            end = end.saturating_sub(trailing_entry_size(&record[..end]));
        }
        extra >>= 1;
    }
    if flags & 1 != 0 && end > 0 {
        end = end.saturating_sub(usize::from(record[end - 1] & 0x3) + 1);
    }
    &record[..end]
}

/// `AUDI`/`VIDE` records carry their payload at the offset stored at byte 4.
fn strip_media_header(data: Vec<u8>) -> Vec<u8> {
    if !(data.starts_with(b"AUDI") || data.starts_with(b"VIDE")) {
        return data;
    }
    let offset = data
        .get(4..8)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
        .unwrap_or(data.len());
    data.get(offset..).map(<[u8]>::to_vec).unwrap_or_default()
}
