//! Opaque byte payloads, optionally LZMA compressed.

use super::{for_each_chunk, unknown_chunk, Deferred};
use crate::{
    codec,
    error::{FormatError, LoadError, WriteError},
    file::LoadContext,
    gid::Gid,
    io::{Reader, Writer, BOOL_LEN},
    tree::{Handle, Identity, Node, Resource},
};

const PROPS_LEN: u32 = 4 + BOOL_LEN;

#[derive(Debug)]
pub struct Blob {
    data: Option<Vec<u8>>,
    compression: Gid,
    lateloading: bool,
    deferred: Option<Deferred>,
}
impl Blob {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            compression: Gid::NONE,
            lateloading: false,
            deferred: None,
        }
    }
    /// Payload, `None` until a deferred blob is loaded.
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
    pub fn data_mut(&mut self) -> Option<&mut Vec<u8>> {
        self.data.as_mut()
    }
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = Some(data);
        self.deferred = None;
    }
    pub fn take_data(&mut self) -> Option<Vec<u8>> {
        self.data.take()
    }
    #[must_use]
    pub fn compression(&self) -> Gid {
        self.compression
    }
    /// # Errors
    /// [`FormatError::UnknownCompression`] for anything but [`Gid::NONE`] and [`Gid::LZMA`].
    pub fn set_compression(&mut self, compression: Gid) -> Result<(), FormatError> {
        match compression {
            Gid::NONE | Gid::LZMA => {
                self.compression = compression;
                Ok(())
            }
            other => Err(FormatError::UnknownCompression(other)),
        }
    }
    #[must_use]
    pub fn lateloading(&self) -> bool {
        self.lateloading
    }
    pub fn set_lateloading(&mut self, lateloading: bool) {
        self.lateloading = lateloading;
    }
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }
    /// Read deferred data. Returns whether the blob is loaded afterwards.
    pub fn load(&mut self) -> bool {
        if self.data.is_some() {
            return true;
        }
        let Some(deferred) = &self.deferred else {
            return false;
        };
        let result = deferred
            .reopen()
            .and_then(|(mut reader, size)| read_body(&mut reader, size, true, false));
        match result {
            Ok(Body { data: Some(data), .. }) => {
                log::debug!("loaded deferred blob of {} bytes", data.len());
                self.data = Some(data);
                self.deferred = None;
                true
            }
            Ok(_) => {
                log::warn!("deferred blob has no data chunk");
                false
            }
            Err(e) => {
                log::warn!("deferred blob load failed: {e}");
                false
            }
        }
    }
}

struct Body {
    identity: Identity,
    compression: Gid,
    lateloading: bool,
    data: Option<Vec<u8>>,
}

fn read_body(reader: &mut Reader, size: u32, force: bool, strict: bool) -> Result<Body, LoadError> {
    let mut body = Body {
        identity: Identity::default(),
        compression: Gid::NONE,
        lateloading: false,
        data: None,
    };
    for_each_chunk(reader, size, |reader, gid, size| {
        let decode = !body.lateloading || force;
        match gid {
            Gid::BLOB_PROPS => {
                if size < PROPS_LEN {
                    return Err(FormatError::SizeMismatch {
                        what: "blob properties",
                        expected: PROPS_LEN.into(),
                        found: size.into(),
                    }
                    .into());
                }
                body.compression = reader.read_gid()?;
                body.lateloading = reader.read_bool()?;
            }
            Gid::BLOB_DATA if decode => body.data = Some(reader.read_vec(size)?),
            Gid::BLOB_CMP_DATA if decode => {
                if body.compression != Gid::LZMA {
                    return Err(FormatError::UnknownCompression(body.compression).into());
                }
                let data =
                    codec::decompress_lzma(std::io::Read::take(&mut *reader, u64::from(size)))?;
                body.data = Some(data);
            }
            Gid::BLOB_DATA | Gid::BLOB_CMP_DATA => (),
            _ => {
                if !body.identity.read_chunk(reader, gid, size)? {
                    unknown_chunk(strict, Gid::BLOB, gid)?;
                }
            }
        }
        Ok(())
    })?;
    Ok(body)
}

/// # Errors
/// Malformed layout or compressed data.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let entry = reader.tell();
    let options = ctx.options();
    let body = read_body(reader, size, options.force_immediate, options.strict)?;
    let deferred = match body.data {
        None if body.lateloading && !options.force_immediate => Some(Deferred::new(
            reader.shared(),
            entry,
            ctx.codecs().clone(),
        )),
        _ => None,
    };
    let blob = Blob {
        data: body.data,
        compression: body.compression,
        lateloading: body.lateloading,
        deferred,
    };
    Ok(ctx
        .tree
        .insert(Node::with_identity(body.identity, Resource::Blob(blob))))
}

/// # Errors
/// [`WriteError::NoData`] for an unloaded blob, or stream and codec errors.
pub fn save<W: std::io::Write + std::io::Seek>(
    node: &Node,
    blob: &Blob,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    let data = blob.data.as_deref().ok_or(WriteError::NoData(Gid::BLOB))?;
    if !matches!(blob.compression, Gid::NONE | Gid::LZMA) {
        return Err(FormatError::UnknownCompression(blob.compression).into());
    }

    let marker = writer.object_start(Gid::BLOB, node.guid(), node.name())?;
    writer.chunk_header(Gid::BLOB_PROPS, PROPS_LEN as usize)?;
    writer.write_gid(blob.compression)?;
    writer.write_bool(blob.lateloading)?;
    if blob.compression == Gid::LZMA {
        let data_marker = writer.chunk_start(Gid::BLOB_CMP_DATA)?;
        codec::compress_lzma(data, writer)?;
        writer.end(data_marker)?;
    } else {
        writer.chunk_header(Gid::BLOB_DATA, data.len())?;
        writer.write_bytes(data)?;
    }
    writer.end(marker)
}
