//! HUFF/CDIC decompression.
//!
//! The HUFF record holds a canonical Huffman code table; the CDIC records
//! hold the phrase dictionary the codes index into. Phrases may themselves
//! be compressed and are expanded on first use.

use crate::error::{Error, Result};

const HUFF_MAGIC: &[u8] = b"HUFF\x00\x00\x00\x18";
const CDIC_MAGIC: &[u8] = b"CDIC\x00\x00\x00\x10";
const MAX_NESTING: usize = 32;

fn be_u32(data: &[u8], at: usize) -> Result<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::MalformedStructure(format!("HUFF/CDIC data truncated at {at}")))
}

#[derive(Debug, Clone, Copy, Default)]
struct CodeEntry {
    len: u8,
    terminal: bool,
    max: u32,
}

#[derive(Debug, Clone)]
enum Phrase {
    Literal(Vec<u8>),
    Packed(Vec<u8>),
}

/// Decoder built from one HUFF record and its CDIC records.
#[derive(Debug, Clone)]
pub struct HuffCdic {
    /// Indexed by the top byte of the code window.
    lookup: Vec<CodeEntry>,
    /// Lower and upper code bounds per code length, shifted to 32 bits.
    min_codes: [u32; 33],
    max_codes: [u32; 33],
    phrases: Vec<Phrase>,
}

impl HuffCdic {
    pub fn new(huff: &[u8], cdics: &[Vec<u8>]) -> Result<Self> {
        if !huff.starts_with(HUFF_MAGIC) {
            return Err(Error::MalformedStructure("bad HUFF header".into()));
        }
        let lookup_at = be_u32(huff, 8)? as usize;
        let bounds_at = be_u32(huff, 12)? as usize;

        let lookup = (0..256)
            .map(|i| {
                let v = be_u32(huff, lookup_at + i * 4)?;
                let len = (v & 0x1F) as u8;
                let max = if len == 0 {
                    0
                } else {
                    ((v >> 8) + 1).wrapping_shl(32 - u32::from(len)).wrapping_sub(1)
                };
                Ok(CodeEntry {
                    len,
                    terminal: v & 0x80 != 0,
                    max,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut min_codes = [0u32; 33];
        let mut max_codes = [0u32; 33];
        for len in 1..=32u32 {
            let at = bounds_at + (len as usize - 1) * 8;
            let shift = 32 - len;
            min_codes[len as usize] = be_u32(huff, at)?.wrapping_shl(shift);
            max_codes[len as usize] = be_u32(huff, at + 4)?
                .wrapping_add(1)
                .wrapping_shl(shift)
                .wrapping_sub(1);
        }

        let mut decoder = Self {
            lookup,
            min_codes,
            max_codes,
            phrases: Vec::new(),
        };
        for cdic in cdics {
            decoder.add_dictionary(cdic)?;
        }
        Ok(decoder)
    }

    fn add_dictionary(&mut self, cdic: &[u8]) -> Result<()> {
        if !cdic.starts_with(CDIC_MAGIC) {
            return Err(Error::MalformedStructure("bad CDIC header".into()));
        }
        let total = be_u32(cdic, 8)? as usize;
        let bits = be_u32(cdic, 12)?.min(16);
        let count = (1usize << bits).min(total.saturating_sub(self.phrases.len()));

        let table = &cdic[16..];
        for i in 0..count {
            let offset = table
                .get(i * 2..i * 2 + 2)
                .map(|b| usize::from(u16::from_be_bytes([b[0], b[1]])))
                .ok_or_else(|| Error::MalformedStructure("CDIC offset table truncated".into()))?;
            let header = table
                .get(offset..offset + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .ok_or_else(|| Error::MalformedStructure("CDIC phrase truncated".into()))?;
            let len = usize::from(header & 0x7FFF);
            let start = offset + 2;
            let bytes = table[start..(start + len).min(table.len())].to_vec();
            self.phrases.push(if header & 0x8000 != 0 {
                Phrase::Literal(bytes)
            } else {
                Phrase::Packed(bytes)
            });
        }
        Ok(())
    }

    /// Decompress one text record.
    pub fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 3);
        self.unpack(data, &mut out, 0)?;
        Ok(out)
    }

    fn unpack(&mut self, data: &[u8], out: &mut Vec<u8>, depth: usize) -> Result<()> {
        if depth > MAX_NESTING {
            return Err(Error::MalformedStructure("HUFF/CDIC phrases nest too deeply".into()));
        }

        let mut padded = Vec::with_capacity(data.len() + 8);
        padded.extend_from_slice(data);
        padded.extend_from_slice(&[0; 8]);
        let window_at = |pos: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&padded[pos..pos + 8]);
            u64::from_be_bytes(word)
        };

        let mut bits_left = data.len() as i64 * 8;
        let mut pos = 0;
        let mut window = window_at(pos);
        let mut shift: i32 = 32;

        while bits_left > 0 {
            if shift <= 0 {
                pos += 4;
                window = window_at(pos);
                shift += 32;
            }
            let code = (window >> shift) as u32;

            let CodeEntry {
                mut len,
                terminal,
                mut max,
            } = self.lookup[(code >> 24) as usize];
            if !terminal {
                while len < 32 && code < self.min_codes[len as usize] {
                    len += 1;
                }
                max = self.max_codes[len as usize];
            }
            if len == 0 {
                return Err(Error::MalformedStructure("zero-length Huffman code".into()));
            }

            shift -= i32::from(len);
            bits_left -= i64::from(len);
            if bits_left < 0 {
                break;
            }

            let index = (max.wrapping_sub(code) >> (32 - u32::from(len))) as usize;
            let phrase = self.phrases.get(index).cloned().ok_or_else(|| {
                Error::MalformedStructure(format!(
                    "phrase {index} out of range ({} phrases)",
                    self.phrases.len()
                ))
            })?;
            match phrase {
                Phrase::Literal(bytes) => out.extend_from_slice(&bytes),
                Phrase::Packed(packed) => {
                    let mut expanded = Vec::new();
                    self.unpack(&packed, &mut expanded, depth + 1)?;
                    out.extend_from_slice(&expanded);
                    self.phrases[index] = Phrase::Literal(expanded);
                }
            }
        }

        Ok(())
    }
}
