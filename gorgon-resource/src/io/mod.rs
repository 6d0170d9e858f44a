//! # Chunked streams
//!
//! Every persisted object is a chunk: a little-endian `u32` [`Gid`](crate::gid::Gid), a `u32`
//! payload size, and then exactly that many payload bytes. Composite objects are chunks whose
//! payload is itself a sequence of chunks, which is what lets readers skip anything they don't
//! recognize.
//!
//! A file starts with the 6 byte signature, a version, and a content-type tag, followed by
//! the root folder chunk.

pub mod reader;
pub mod writer;

pub use reader::{Mark, Reader, ReaderLease, SharedReader, Source};
pub use writer::{Marker, Writer};

pub const SIGNATURE: &[u8; 6] = b"GORGON";

/// On-disk layout revision. Files newer than [`FormatVersion::CURRENT`] are rejected.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug)]
pub struct FormatVersion(pub u32);
impl FormatVersion {
    pub const CURRENT: Self = FormatVersion(0x0001_0000);

    #[must_use]
    pub fn is_supported(self) -> bool {
        self <= Self::CURRENT
    }
}
impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Width of a persisted bool. Every supported revision stores bools as full `u32`s.
pub const BOOL_LEN: u32 = 4;
