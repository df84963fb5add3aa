//! Framed key/payload transport for backup archives.
//!
//! Frame layout:
//! ```text
//! [key_len: 4 bytes LE] [key: N bytes] [data_len: 4 bytes LE] [data: M bytes] [crc32: 4 bytes LE]
//! ```
//! The checksum covers everything before it. A truncated or corrupt frame
//! ends the stream.

use std::io::{self, Read, Write};

use tracing::warn;

/// Sink for one backup pass.
pub trait BackupDataOutput: Send {
    fn write_entity(&mut self, key: &str, data: &[u8]) -> io::Result<()>;
}

/// Source for one restore pass.
pub trait BackupDataInput: Send {
    /// Next `(key, data)` frame, or `None` once the input is exhausted.
    fn next_entity(&mut self) -> io::Result<Option<(String, Vec<u8>)>>;
}

fn encode_frame(key: &str, data: &[u8]) -> io::Result<Vec<u8>> {
    let len = |n: usize| {
        u32::try_from(n)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame field too large"))
    };
    let mut frame = Vec::with_capacity(12 + key.len() + data.len());
    frame.extend_from_slice(&len(key.len())?.to_le_bytes());
    frame.extend_from_slice(key.as_bytes());
    frame.extend_from_slice(&len(data.len())?.to_le_bytes());
    frame.extend_from_slice(data);
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Writes frames to any [`Write`].
pub struct StreamBackupOutput<W: Write> {
    inner: W,
    frames: usize,
}

impl<W: Write> StreamBackupOutput<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, frames: 0 }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Send> BackupDataOutput for StreamBackupOutput<W> {
    fn write_entity(&mut self, key: &str, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(&encode_frame(key, data)?)?;
        self.frames += 1;
        Ok(())
    }
}

/// Reads frames from any [`Read`].
pub struct StreamBackupInput<R: Read> {
    inner: R,
    exhausted: bool,
}

impl<R: Read> StreamBackupInput<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            exhausted: false,
        }
    }

    /// Fill `buf`, or return `false` if the stream ends first.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        match self.inner.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn read_u32(&mut self) -> io::Result<Option<u32>> {
        let mut buf = [0u8; 4];
        Ok(self.fill(&mut buf)?.then(|| u32::from_le_bytes(buf)))
    }

    fn read_field(&mut self, record: &mut Vec<u8>) -> io::Result<Option<Vec<u8>>> {
        let Some(len) = self.read_u32()? else {
            return Ok(None);
        };
        record.extend_from_slice(&len.to_le_bytes());
        // Read through `take` so a corrupt length cannot force a huge allocation.
        let mut field = Vec::new();
        (&mut self.inner).take(u64::from(len)).read_to_end(&mut field)?;
        if field.len() != len as usize {
            return Ok(None);
        }
        record.extend_from_slice(&field);
        Ok(Some(field))
    }

    fn read_frame(&mut self) -> io::Result<Option<(String, Vec<u8>)>> {
        let mut record = Vec::new();
        let Some(key) = self.read_field(&mut record)? else {
            return Ok(None);
        };
        let Some(data) = self.read_field(&mut record)? else {
            warn!("backup input: truncated frame");
            return Ok(None);
        };
        let Some(stored_crc) = self.read_u32()? else {
            warn!("backup input: frame missing checksum");
            return Ok(None);
        };
        if crc32fast::hash(&record) != stored_crc {
            warn!("backup input: checksum mismatch, stopping");
            return Ok(None);
        }
        match String::from_utf8(key) {
            Ok(key) => Ok(Some((key, data))),
            Err(_) => {
                warn!("backup input: non-utf8 key, stopping");
                Ok(None)
            }
        }
    }
}

impl<R: Read + Send> BackupDataInput for StreamBackupInput<R> {
    fn next_entity(&mut self) -> io::Result<Option<(String, Vec<u8>)>> {
        if self.exhausted {
            return Ok(None);
        }
        let frame = self.read_frame()?;
        if frame.is_none() {
            self.exhausted = true;
        }
        Ok(frame)
    }
}
