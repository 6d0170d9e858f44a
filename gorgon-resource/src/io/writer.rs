//! Write side of the chunk codec.
//!
//! Chunks whose size is hard to compute up front are opened with [`Writer::chunk_start`], which
//! writes a placeholder size and returns a [`Marker`]. [`Writer::end`] seeks back and patches
//! the real size in, so the stream must support seek-and-rewrite.

use crate::{error::FormatError, error::WriteError, gid::Gid, guid::SGuid};
use az::CheckedAs;
use std::io::{Result as IOResult, Seek, SeekFrom, Write};

/// Position of a chunk's size field, awaiting [`Writer::end`].
#[must_use = "chunks must be closed with Writer::end"]
#[derive(Debug)]
pub struct Marker {
    size_pos: u64,
    armed: bool,
}
impl Drop for Marker {
    fn drop(&mut self) {
        if self.armed {
            log::warn!(
                "chunk marker at {} dropped without Writer::end, size left unpatched",
                self.size_pos
            );
        }
    }
}

pub struct Writer<W: Write + Seek> {
    stream: W,
    position: u64,
    open_chunks: usize,
    failed: bool,
}
impl Writer<std::io::BufWriter<std::fs::File>> {
    /// Create or truncate a file for writing.
    /// # Errors
    /// [`WriteError::CannotOpenFile`] if the file cannot be created.
    pub fn create(path: impl AsRef<std::path::Path>) -> Result<Self, WriteError> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|source| WriteError::CannotOpenFile {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::new(std::io::BufWriter::new(file))?)
    }
}
impl<W: Write + Seek> Writer<W> {
    /// # Errors
    /// Forwards failure to query the stream position.
    pub fn new(mut stream: W) -> IOResult<Self> {
        let position = stream.stream_position()?;
        Ok(Self {
            stream,
            position,
            open_chunks: 0,
            failed: false,
        })
    }
    /// False once any write has failed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.failed
    }
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.position
    }
    /// Number of chunks opened with a marker and not yet ended.
    #[must_use]
    pub fn open_chunks(&self) -> usize {
        self.open_chunks
    }
    /// Flush and return the inner stream.
    /// # Errors
    /// Forwards flush errors.
    pub fn finish(mut self) -> IOResult<W> {
        if self.open_chunks != 0 {
            log::warn!("finishing writer with {} unended chunks", self.open_chunks);
        }
        self.stream.flush()?;
        Ok(self.stream)
    }

    /// # Errors
    /// Forwards stream errors.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> IOResult<()> {
        self.stream
            .write_all(bytes)
            .inspect_err(|_| self.failed = true)?;
        self.position += bytes.len() as u64;
        Ok(())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_u8(&mut self, value: u8) -> IOResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_i8(&mut self, value: i8) -> IOResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_u16(&mut self, value: u16) -> IOResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_i16(&mut self, value: i16) -> IOResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_u32(&mut self, value: u32) -> IOResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_i32(&mut self, value: i32) -> IOResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_f32(&mut self, value: f32) -> IOResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_bool(&mut self, value: bool) -> IOResult<()> {
        self.write_u32(u32::from(value))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_gid(&mut self, gid: Gid) -> IOResult<()> {
        self.write_u32(gid.0)
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn write_guid(&mut self, guid: SGuid) -> IOResult<()> {
        self.write_bytes(&guid.0)
    }
    /// A string prefixed with its `u32` byte length.
    /// # Errors
    /// Stream errors, or a string longer than 4GiB.
    pub fn write_string(&mut self, value: &str) -> Result<(), WriteError> {
        let len: u32 = value.len().checked_as().ok_or(FormatError::Overflow)?;
        self.write_u32(len)?;
        self.write_bytes(value.as_bytes())?;
        Ok(())
    }

    /// Header of a chunk whose payload size is known.
    /// # Errors
    /// Stream errors, or a payload longer than 4GiB.
    pub fn chunk_header(&mut self, gid: Gid, size: usize) -> Result<(), WriteError> {
        let size: u32 = size.checked_as().ok_or(FormatError::Overflow)?;
        self.write_gid(gid)?;
        self.write_u32(size)?;
        Ok(())
    }
    /// Header of a chunk whose size is patched in by [`Self::end`].
    /// # Errors
    /// Forwards stream errors.
    pub fn chunk_start(&mut self, gid: Gid) -> Result<Marker, WriteError> {
        self.write_gid(gid)?;
        let size_pos = self.position;
        self.write_u32(u32::MAX)?;
        self.open_chunks += 1;
        Ok(Marker {
            size_pos,
            armed: true,
        })
    }
    /// Start of an object chunk, followed by the common identity sub-chunks.
    /// The name chunk is omitted when the name is empty.
    /// # Errors
    /// Forwards stream errors.
    pub fn object_start(
        &mut self,
        gid: Gid,
        guid: SGuid,
        name: &str,
    ) -> Result<Marker, WriteError> {
        let marker = self.chunk_start(gid)?;
        self.chunk_header(Gid::SGUID, SGuid::LEN)?;
        self.write_guid(guid)?;
        if !name.is_empty() {
            self.chunk_header(Gid::NAME, name.len())?;
            self.write_bytes(name.as_bytes())?;
        }
        Ok(marker)
    }
    /// Close the chunk described by `marker`, back-patching its size.
    /// # Errors
    /// Stream errors, or a chunk longer than 4GiB.
    pub fn end(&mut self, mut marker: Marker) -> Result<(), WriteError> {
        // Disarm first, a failed patch is reported through the return value.
        marker.armed = false;
        self.open_chunks = self.open_chunks.saturating_sub(1);

        let size: u32 = self
            .position
            .checked_sub(marker.size_pos + 4)
            .and_then(|size| size.checked_as())
            .ok_or(FormatError::Overflow)?;

        let end = self.position;
        let patch = |stream: &mut W| -> IOResult<()> {
            stream.seek(SeekFrom::Start(marker.size_pos))?;
            stream.write_all(&size.to_le_bytes())?;
            stream.seek(SeekFrom::Start(end))?;
            Ok(())
        };
        patch(&mut self.stream).inspect_err(|_| self.failed = true)?;
        Ok(())
    }
}

/// Raw access for codecs that stream their output, eg. PNG inside a data chunk.
impl<W: Write + Seek> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> IOResult<usize> {
        let written = self
            .stream
            .write(buf)
            .inspect_err(|_| self.failed = true)?;
        self.position += written as u64;
        Ok(written)
    }
    fn flush(&mut self) -> IOResult<()> {
        self.stream.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn back_patched_size() {
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        let outer = writer.chunk_start(Gid::FOLDER).unwrap();
        writer.chunk_header(Gid::FOLDER_PROPS, 4).unwrap();
        writer.write_bool(true).unwrap();
        let inner = writer.chunk_start(Gid::NULL).unwrap();
        assert_eq!(writer.open_chunks(), 2);
        writer.end(inner).unwrap();
        writer.end(outer).unwrap();
        assert_eq!(writer.open_chunks(), 0);
        let bytes = writer.finish().unwrap().into_inner();

        #[rustfmt::skip]
        let expected: &[u8] = &[
            0x00, 0x00, 0x01, 0x01, 20, 0, 0, 0,
                0x03, 0x01, 0x01, 0x01, 4, 0, 0, 0,
                    1, 0, 0, 0,
                0x00, 0x00, 0x0F, 0x02, 0, 0, 0, 0,
        ];
        assert_eq!(bytes, expected);
    }
    #[test]
    fn object_identity_chunks() {
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        let guid = SGuid::from_u64(42);
        let marker = writer.object_start(Gid::NULL, guid, "abc").unwrap();
        writer.end(marker).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        // header + (header + guid) + (header + name)
        assert_eq!(bytes.len(), 8 + 16 + 11);
        assert_eq!(&bytes[4..8], &27u32.to_le_bytes());
        assert_eq!(&bytes[bytes.len() - 3..], b"abc");

        // Unnamed objects skip the name chunk.
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        let marker = writer.object_start(Gid::NULL, guid, "").unwrap();
        writer.end(marker).unwrap();
        assert_eq!(writer.tell(), 24);
    }
    #[test]
    fn nonzero_stream_start() {
        // Writers may begin mid-stream, sizes are still relative to the chunk.
        let mut cursor = Cursor::new(vec![0xAA; 3]);
        cursor.set_position(3);
        let mut writer = Writer::new(cursor).unwrap();
        let marker = writer.chunk_start(Gid::BLOB_DATA).unwrap();
        writer.write_bytes(&[1, 2]).unwrap();
        writer.end(marker).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert_eq!(&bytes[..3], &[0xAA; 3]);
        assert_eq!(&bytes[7..11], &2u32.to_le_bytes());
    }
}
