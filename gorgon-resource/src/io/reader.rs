//! Read side of the chunk codec.
//!
//! A [`SharedReader`] names a place bytes can be read from. Loading checks out a [`Reader`]
//! over a live stream. When the load finishes, the stream is parked back inside the
//! `SharedReader` if any [`ReaderLease`] is outstanding, so resources with deferred payloads can
//! reopen it without touching the filesystem again. Once the last lease is released, the parked
//! stream is closed.

use crate::{error::FormatError, error::LoadError, gid::Gid, guid::SGuid};
use az::CheckedAs;
use std::io::{Read, Result as IOResult, Seek, SeekFrom};

/// Any seekable byte stream.
pub trait Stream: Read + Seek + Send {}
impl<T: Read + Seek + Send> Stream for T {}

/// Opens fresh streams on demand.
pub trait Source: Send + Sync {
    /// # Errors
    /// Reports why the stream could not be opened.
    fn open(&self) -> Result<Box<dyn Stream>, LoadError>;
}

/// A file on disk, opened read-only.
pub struct FileSource {
    path: std::path::PathBuf,
}
impl FileSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
impl Source for FileSource {
    fn open(&self) -> Result<Box<dyn Stream>, LoadError> {
        match std::fs::File::open(&self.path) {
            Ok(file) => Ok(Box::new(std::io::BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LoadError::FileNotFound(self.path.clone()))
            }
            Err(source) => Err(LoadError::FileCannotBeOpened {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// An in-memory buffer. Cheap to reopen.
pub struct MemorySource {
    data: std::sync::Arc<[u8]>,
}
impl MemorySource {
    pub fn new(data: impl Into<std::sync::Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}
impl Source for MemorySource {
    fn open(&self) -> Result<Box<dyn Stream>, LoadError> {
        Ok(Box::new(std::io::Cursor::new(self.data.clone())))
    }
}

struct Shared {
    source: Box<dyn Source>,
    /// Stream kept alive between checkouts, only while leases are outstanding.
    parked: parking_lot::Mutex<Option<Box<dyn Stream>>>,
    leases: std::sync::atomic::AtomicUsize,
}

/// Cloneable handle to a byte source with reference-counted keep-open semantics.
#[derive(Clone)]
pub struct SharedReader(std::sync::Arc<Shared>);

impl SharedReader {
    pub fn new(source: impl Source + 'static) -> Self {
        Self(std::sync::Arc::new(Shared {
            source: Box::new(source),
            parked: parking_lot::Mutex::new(None),
            leases: 0.into(),
        }))
    }
    pub fn from_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(FileSource::new(path))
    }
    pub fn from_bytes(bytes: impl Into<std::sync::Arc<[u8]>>) -> Self {
        Self::new(MemorySource::new(bytes))
    }
    /// Check out a reader, reusing the parked stream if there is one.
    /// The reader is positioned wherever the stream was left; seek before use.
    /// # Errors
    /// Forwards the source's failure to open.
    pub fn open(&self) -> Result<Reader, LoadError> {
        let parked = self.0.parked.lock().take();
        let mut stream = match parked {
            Some(stream) => stream,
            None => self.0.source.open()?,
        };
        let position = stream.stream_position()?;
        Ok(Reader {
            stream: Some(stream),
            shared: self.clone(),
            position,
        })
    }
    /// Like [`Self::open`], but failure is reported as `None`.
    #[must_use]
    pub fn try_open(&self) -> Option<Reader> {
        match self.open() {
            Ok(reader) => Some(reader),
            Err(e) => {
                log::debug!("failed to reopen resource stream: {e}");
                None
            }
        }
    }
    /// Request that the stream outlives the current reader.
    #[must_use = "the stream is only kept open while the lease is alive"]
    pub fn keep_open(&self) -> ReaderLease {
        self.0
            .leases
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        ReaderLease {
            reader: self.clone(),
            active: true,
        }
    }
    /// Number of outstanding leases.
    #[must_use]
    pub fn lease_count(&self) -> usize {
        self.0.leases.load(std::sync::atomic::Ordering::Relaxed)
    }
    /// Whether a stream is currently held open between checkouts.
    #[must_use]
    pub fn is_parked(&self) -> bool {
        self.0.parked.lock().is_some()
    }
    /// Whether two handles name the same source.
    #[must_use]
    pub fn same_source(&self, other: &Self) -> bool {
        std::sync::Arc::ptr_eq(&self.0, &other.0)
    }
    fn park(&self, stream: Box<dyn Stream>) {
        let mut parked = self.0.parked.lock();
        if self.lease_count() > 0 {
            *parked = Some(stream);
        }
        // Otherwise nobody needs it, dropping closes.
    }
}

/// Keeps the underlying stream of a [`SharedReader`] alive. Released on drop.
pub struct ReaderLease {
    reader: SharedReader,
    active: bool,
}
impl ReaderLease {
    #[must_use]
    pub fn reader(&self) -> &SharedReader {
        &self.reader
    }
    /// Release early. Equivalent to dropping.
    pub fn release(mut self) {
        self.release_inner();
    }
    fn release_inner(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let mut parked = self.reader.0.parked.lock();
        let previous = self
            .reader
            .0
            .leases
            .fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
        if previous == 1 && parked.take().is_some() {
            log::trace!("last lease released, closing resource stream");
        }
    }
}
impl Drop for ReaderLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}
impl std::fmt::Debug for ReaderLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderLease")
            .field("leases", &self.reader.lease_count())
            .finish()
    }
}

/// End position of a chunk being consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mark {
    end: u64,
}
impl Mark {
    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }
}

/// A checked-out stream with position tracking and primitive decoding.
pub struct Reader {
    // Only `None` during drop.
    stream: Option<Box<dyn Stream>>,
    shared: SharedReader,
    position: u64,
}
impl Reader {
    #[must_use]
    pub fn shared(&self) -> &SharedReader {
        &self.shared
    }
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.position
    }
    fn stream(&mut self) -> IOResult<&mut Box<dyn Stream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| std::io::Error::other("reader stream missing"))
    }
    /// Seek to an absolute position.
    /// # Errors
    /// Forwards stream errors.
    pub fn seek(&mut self, position: u64) -> IOResult<()> {
        self.position = self.stream()?.seek(SeekFrom::Start(position))?;
        Ok(())
    }
    /// Skip `size` bytes forward.
    /// # Errors
    /// Forwards stream errors.
    pub fn skip(&mut self, size: u32) -> IOResult<()> {
        let delta = i64::from(size);
        self.position = self.stream()?.seek(SeekFrom::Current(delta))?;
        Ok(())
    }
    /// Mark the end of a chunk of `size` bytes starting at the current position.
    #[must_use]
    pub fn target(&self, size: u32) -> Mark {
        Mark {
            end: self.position + u64::from(size),
        }
    }
    /// Mark a chunk ending at the absolute position `end`, for resuming a partial read.
    #[must_use]
    pub fn mark_at(&self, end: u64) -> Mark {
        Mark { end }
    }
    /// Whether the chunk described by `mark` has been fully consumed.
    /// # Errors
    /// Reading past the end of the chunk means the layout is corrupt.
    pub fn reached(&self, mark: &Mark) -> Result<bool, FormatError> {
        match self.position.cmp(&mark.end) {
            std::cmp::Ordering::Less => Ok(false),
            std::cmp::Ordering::Equal => Ok(true),
            std::cmp::Ordering::Greater => Err(FormatError::TargetPassed {
                over: self.position - mark.end,
            }),
        }
    }
    /// Bytes left before `mark`.
    #[must_use]
    pub fn remaining(&self, mark: &Mark) -> u64 {
        mark.end.saturating_sub(self.position)
    }
    /// Skip whatever is left of the chunk described by `mark`.
    /// # Errors
    /// Fails if already past the mark, or forwards stream errors.
    pub fn skip_to(&mut self, mark: &Mark) -> Result<(), LoadError> {
        if !self.reached(mark)? {
            self.seek(mark.end)?;
        }
        Ok(())
    }

    // Primitive decoding. All values are little-endian.

    /// # Errors
    /// Forwards stream errors.
    pub fn read_array<const N: usize>(&mut self) -> IOResult<[u8; N]> {
        let mut bytes = [0; N];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_u8(&mut self) -> IOResult<u8> {
        Ok(u8::from_le_bytes(self.read_array()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_i8(&mut self) -> IOResult<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_u16(&mut self) -> IOResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_i16(&mut self) -> IOResult<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_u32(&mut self) -> IOResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_i32(&mut self) -> IOResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_f32(&mut self) -> IOResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }
    /// Bools are stored as full `u32`s, any non-zero value is true.
    /// # Errors
    /// Forwards stream errors.
    pub fn read_bool(&mut self) -> IOResult<bool> {
        Ok(self.read_u32()? != 0)
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_gid(&mut self) -> IOResult<Gid> {
        Ok(Gid(self.read_u32()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_chunk_size(&mut self) -> IOResult<u32> {
        self.read_u32()
    }
    /// Reads a `(gid, size)` chunk header.
    /// # Errors
    /// Forwards stream errors.
    pub fn read_chunk_header(&mut self) -> IOResult<(Gid, u32)> {
        Ok((self.read_gid()?, self.read_chunk_size()?))
    }
    /// # Errors
    /// Forwards stream errors.
    pub fn read_guid(&mut self) -> IOResult<SGuid> {
        Ok(SGuid(self.read_array()?))
    }
    /// Read exactly `len` bytes into a new buffer.
    /// # Errors
    /// Forwards stream errors.
    pub fn read_vec(&mut self, len: u32) -> Result<Vec<u8>, LoadError> {
        let len: usize = len.checked_as().ok_or(FormatError::Overflow)?;
        let mut bytes = vec![0; len];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }
    /// A string of `len` bytes without a length prefix.
    /// # Errors
    /// Stream errors or invalid UTF-8.
    pub fn read_string_exact(&mut self, len: u32) -> Result<String, LoadError> {
        let bytes = self.read_vec(len)?;
        Ok(String::from_utf8(bytes).map_err(FormatError::from)?)
    }
    /// A string prefixed with its `u32` byte length.
    /// # Errors
    /// Stream errors or invalid UTF-8.
    pub fn read_string(&mut self) -> Result<String, LoadError> {
        let len = self.read_u32()?;
        self.read_string_exact(len)
    }
}
impl Read for Reader {
    fn read(&mut self, buf: &mut [u8]) -> IOResult<usize> {
        let num_read = self.stream()?.read(buf)?;
        self.position += num_read as u64;
        Ok(num_read)
    }
}
impl Drop for Reader {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.shared.park(stream);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bytes() -> SharedReader {
        let mut data = Vec::new();
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&(-2i32).to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(b"hello");
        SharedReader::from_bytes(data)
    }
    #[test]
    fn primitives() {
        let mut reader = bytes().open().unwrap();
        assert_eq!(reader.read_u32().unwrap(), 7);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert!(!reader.read_bool().unwrap());
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert_eq!(reader.tell(), 25);
        assert!(reader.read_u8().is_err());
    }
    #[test]
    fn target_detects_overrun() {
        let mut reader = bytes().open().unwrap();
        let mark = reader.target(6);
        assert!(!reader.reached(&mark).unwrap());
        reader.read_u32().unwrap();
        assert!(!reader.reached(&mark).unwrap());
        assert_eq!(reader.remaining(&mark), 2);
        reader.read_u32().unwrap();
        assert!(matches!(
            reader.reached(&mark),
            Err(FormatError::TargetPassed { over: 2 })
        ));
    }
    #[test]
    fn skip_to_mark() {
        let mut reader = bytes().open().unwrap();
        let mark = reader.target(12);
        reader.read_u32().unwrap();
        reader.skip_to(&mark).unwrap();
        assert!(reader.reached(&mark).unwrap());
        assert!(!reader.read_bool().unwrap());
    }
    #[test]
    fn stream_parked_only_while_leased() {
        let shared = bytes();
        // No lease, stream is closed when the reader drops.
        drop(shared.open().unwrap());
        assert!(!shared.is_parked());

        let lease = shared.keep_open();
        let mut reader = shared.open().unwrap();
        reader.seek(4).unwrap();
        drop(reader);
        assert!(shared.is_parked());

        // Reopening reuses the parked stream, position included.
        let mut reader = shared.open().unwrap();
        assert_eq!(reader.tell(), 4);
        assert_eq!(reader.read_i32().unwrap(), -2);
        drop(reader);

        let second = shared.keep_open();
        assert_eq!(shared.lease_count(), 2);
        lease.release();
        assert!(shared.is_parked());
        drop(second);
        assert_eq!(shared.lease_count(), 0);
        assert!(!shared.is_parked());
    }
    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedReader::from_path(dir.path().join("nope.gor"));
        assert!(shared.try_open().is_none());
        let Err(err) = shared.open() else {
            panic!("opened a missing file")
        };
        assert_eq!(err.kind(), crate::error::LoadErrorKind::FileNotFound);
    }
}
