//! PalmDOC LZ77 decompression.
//!
//! Each input byte is one of:
//! - `0x01..=0x08`: that many literal bytes follow
//! - `0x00`, `0x09..=0x7F`: itself
//! - `0x80..=0xBF`: with the next byte, a back-reference of 11 bits of
//!   distance and 3 bits of length (+3)
//! - `0xC0..=0xFF`: a space followed by `byte ^ 0x80`

pub fn decompress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut bytes = input.iter().copied();

    while let Some(b) = bytes.next() {
        match b {
            0x01..=0x08 => out.extend(bytes.by_ref().take(b as usize)),
            0x00 | 0x09..=0x7F => out.push(b),
            0xC0..=0xFF => {
                out.push(b' ');
                out.push(b ^ 0x80);
            }
            0x80..=0xBF => {
                let Some(next) = bytes.next() else { break };
                let pair = u16::from_be_bytes([b, next]);
                let distance = usize::from((pair & 0x3FFF) >> 3);
                let length = usize::from(pair & 0x07) + 3;
                if distance == 0 || distance > out.len() {
                    log::debug!("PalmDOC back-reference beyond output ignored");
                    continue;
                }
                // copies may overlap their own output
                for _ in 0..length {
                    out.push(out[out.len() - distance]);
                }
            }
        }
    }

    out
}
