//! PDB, PalmDOC/MOBI and EXTH header decoding.

use crate::error::{Error, Result};
use crate::util::decode_text;

pub const NULL_INDEX: u32 = 0xFFFF_FFFF;

/// Fixed part of a Palm database header, before the record list.
pub const PDB_HEADER_LEN: usize = 78;

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Container flavour from the PDB type/creator field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdbKind {
    /// `BOOKMOBI`: Mobipocket with a MOBI header.
    Mobi,
    /// `TEXtREAd`: plain PalmDOC.
    PalmDoc,
}

impl PdbKind {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data.get(60..68)? {
            b"BOOKMOBI" => Some(PdbKind::Mobi),
            ident if ident.eq_ignore_ascii_case(b"TEXtREAd") => Some(PdbKind::PalmDoc),
            _ => None,
        }
    }
}

/// Palm database header: name and record table.
#[derive(Debug, Clone)]
pub struct PdbHeader {
    pub name: String,
    pub kind: PdbKind,
    pub record_offsets: Vec<u32>,
}

impl PdbHeader {
    /// Number of records declared by the fixed header.
    pub fn record_count(fixed: &[u8]) -> Result<usize> {
        be_u16(fixed, 76)
            .map(usize::from)
            .ok_or_else(|| Error::MalformedStructure("PDB header too short".into()))
    }

    /// Parse the fixed header plus the record table that follows it.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let kind = PdbKind::sniff(data).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "PDB type {:?}",
                String::from_utf8_lossy(data.get(60..68).unwrap_or_default())
            ))
        })?;
        let count = Self::record_count(data)?;

        let name_end = data[..32].iter().position(|&b| b == 0).unwrap_or(32);
        let name = String::from_utf8_lossy(&data[..name_end]).into_owned();

        let record_offsets = (0..count)
            .map(|i| be_u32(data, PDB_HEADER_LEN + i * 8))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::MalformedStructure("PDB record table truncated".into()))?;

        Ok(Self {
            name,
            kind,
            record_offsets,
        })
    }

    /// Byte range of record `index` in a file of `file_len` bytes.
    pub fn record_range(&self, index: usize, file_len: u64) -> Result<(u64, u64)> {
        let start = *self
            .record_offsets
            .get(index)
            .ok_or_else(|| Error::MissingEntry(format!("record {index}")))? as u64;
        let end = self
            .record_offsets
            .get(index + 1)
            .map_or(file_len, |&next| next as u64);
        if end < start || end > file_len {
            return Err(Error::MalformedStructure(format!(
                "record {index} spans {start}..{end}, file is {file_len} bytes"
            )));
        }
        Ok((start, end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    PalmDoc,
    Huffman,
    Unknown(u16),
}

impl From<u16> for Compression {
    fn from(value: u16) -> Self {
        match value {
            1 => Compression::None,
            2 => Compression::PalmDoc,
            0x4448 => Compression::Huffman, // "DH"
            n => Compression::Unknown(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cp1252,
    Utf8,
}

impl Encoding {
    /// encoding_rs label.
    pub fn label(self) -> &'static str {
        match self {
            Encoding::Cp1252 => "windows-1252",
            Encoding::Utf8 => "utf-8",
        }
    }
}

/// Record 0: the PalmDOC header and, for `BOOKMOBI`, the MOBI header.
#[derive(Debug, Clone)]
pub struct MobiHeader {
    pub compression: Compression,
    pub text_length: u32,
    pub text_record_count: u16,
    pub text_record_size: u16,
    pub encryption: u16,
    /// Length of the MOBI header (0 for PalmDOC-only records).
    pub header_length: u32,
    pub mobi_type: u32,
    pub encoding: Encoding,
    pub version: u32,
    pub title: String,
    /// Windows locale id.
    pub locale: u32,
    /// Record index of the first image/resource record.
    pub first_resource_index: u32,
    pub huff_record_index: u32,
    pub huff_record_count: u32,
    pub exth_flags: u32,
    pub extra_data_flags: u16,
}

impl MobiHeader {
    pub fn parse(record0: &[u8]) -> Result<Self> {
        if record0.len() < 16 {
            return Err(Error::MalformedStructure("record 0 too short".into()));
        }
        let word = |at| be_u16(record0, at).unwrap_or(0);
        let dword = |at| be_u32(record0, at);

        let mut header = Self {
            compression: Compression::from(word(0)),
            text_length: dword(4).unwrap_or(0),
            text_record_count: word(8),
            text_record_size: word(10),
            encryption: word(12),
            header_length: 0,
            mobi_type: 0,
            encoding: Encoding::Cp1252,
            version: 1,
            title: String::new(),
            locale: 0,
            first_resource_index: NULL_INDEX,
            huff_record_index: NULL_INDEX,
            huff_record_count: 0,
            exth_flags: 0,
            extra_data_flags: 0,
        };

        if record0.get(16..20) != Some(&b"MOBI"[..]) {
            return Ok(header);
        }

        header.header_length = dword(20).unwrap_or(0);
        header.mobi_type = dword(24).unwrap_or(0);
        header.encoding = match dword(28) {
            Some(65001) => Encoding::Utf8,
            _ => Encoding::Cp1252,
        };
        header.locale = dword(0x5C).unwrap_or(0);
        header.version = dword(0x68).unwrap_or(1);
        header.first_resource_index = dword(0x6C).unwrap_or(NULL_INDEX);
        header.huff_record_index = dword(0x70).unwrap_or(NULL_INDEX);
        header.huff_record_count = dword(0x74).unwrap_or(0);
        header.exth_flags = dword(0x80).unwrap_or(0);
        if header.header_length >= 0xE4 {
            header.extra_data_flags = word(0xF2);
        }

        if let (Some(offset), Some(len)) = (dword(0x54), dword(0x58))
            && let Some(raw) = record0.get(offset as usize..(offset as usize).saturating_add(len as usize))
        {
            header.title = decode_text(raw, Some(header.encoding.label())).trim().to_string();
        }

        Ok(header)
    }

    pub fn has_exth(&self) -> bool {
        self.exth_flags & 0x40 != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption != 0
    }

    /// Offset of the EXTH block in record 0.
    pub fn exth_offset(&self) -> Option<usize> {
        (self.has_exth() && self.header_length > 0).then(|| 16 + self.header_length as usize)
    }

    /// ISO 639-1 code for the header locale, when it is a common one.
    pub fn language(&self) -> Option<&'static str> {
        Some(match self.locale & 0xFF {
            0x04 => "zh",
            0x07 => "de",
            0x09 => "en",
            0x0A => "es",
            0x0C => "fr",
            0x10 => "it",
            0x11 => "ja",
            0x12 => "ko",
            0x13 => "nl",
            0x15 => "pl",
            0x16 => "pt",
            0x19 => "ru",
            0x1D => "sv",
            _ => return None,
        })
    }
}

/// Extended metadata records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExthHeader {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
    pub subjects: Vec<String>,
    pub published: Option<String>,
    pub rights: Option<String>,
    pub source: Option<String>,
    pub language: Option<String>,
    /// Cover image, relative to the first resource record.
    pub cover_offset: Option<u32>,
    pub thumbnail_offset: Option<u32>,
}

impl ExthHeader {
    pub fn parse(data: &[u8], encoding: Encoding) -> Result<Self> {
        if data.get(..4) != Some(&b"EXTH"[..]) {
            return Err(Error::MalformedStructure("missing EXTH signature".into()));
        }
        let count = be_u32(data, 8)
            .ok_or_else(|| Error::MalformedStructure("EXTH header too short".into()))?;

        let text = |raw: &[u8]| decode_text(raw, Some(encoding.label())).trim().to_string();
        let index = |raw: &[u8]| be_u32(raw, 0).filter(|&v| v != NULL_INDEX);

        let mut exth = ExthHeader::default();
        let mut pos = 12;
        for _ in 0..count {
            let (Some(kind), Some(len)) = (be_u32(data, pos), be_u32(data, pos + 4)) else {
                break;
            };
            let len = len as usize;
            let Some(content) = data.get(pos + 8..pos + len).filter(|_| len >= 8) else {
                log::warn!("EXTH record {kind} truncated");
                break;
            };

            match kind {
                100 => exth.authors.push(text(content)),
                101 => exth.publisher = Some(text(content)),
                103 => exth.description = Some(text(content)),
                104 => exth.isbn = Some(text(content)),
                105 => exth.subjects.extend(
                    text(content)
                        .split(';')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from),
                ),
                106 => exth.published = Some(text(content)),
                109 => exth.rights = Some(text(content)),
                112 => exth.source = Some(text(content)),
                113 => exth.asin = Some(text(content)),
                201 => exth.cover_offset = index(content),
                202 => exth.thumbnail_offset = index(content),
                503 => exth.title = Some(text(content)),
                524 => exth.language = Some(text(content)),
                _ => {}
            }
            pos += len;
        }

        Ok(exth)
    }
}
