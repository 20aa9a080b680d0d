use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use super::byte_source::ByteSource;

/// Stateful `Read + Seek` view over a shared [`ByteSource`], for handing
/// the source to `zip::ZipArchive`.
pub struct ByteSourceCursor {
    inner: Arc<dyn ByteSource>,
    position: u64,
}

impl ByteSourceCursor {
    pub fn new(inner: Arc<dyn ByteSource>) -> Self {
        Self { inner, position: 0 }
    }
}

impl Read for ByteSourceCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.inner.len().saturating_sub(self.position);
        let n = remaining.min(buf.len() as u64) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.inner.read_exact_at(self.position, &mut buf[..n])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ByteSourceCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.inner.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        self.position = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of source")
        })?;
        Ok(self.position)
    }
}
