//! Bitmap resources, optionally PNG compressed and optionally loaded on demand.

use super::{for_each_chunk, unknown_chunk, Deferred};
use crate::{
    codec,
    error::{FormatError, LoadError, WriteError},
    file::LoadContext,
    gid::Gid,
    graphics::{Bitmap, ColorMode},
    io::{Reader, Writer},
    tree::{Handle, Identity, Node, Resource},
};
use az::CheckedAs;

/// Size of the properties chunk. Longer chunks come from newer writers, the rest is skipped.
const PROPS_LEN: u32 = 20;

pub struct Image {
    width: u32,
    height: u32,
    mode: ColorMode,
    compression: Gid,
    lateloading: bool,
    bitmap: Option<Bitmap>,
    deferred: Option<Deferred>,
}
impl Image {
    #[must_use]
    pub fn new(bitmap: Bitmap) -> Self {
        Self {
            width: bitmap.width(),
            height: bitmap.height(),
            mode: bitmap.mode(),
            compression: Gid::NONE,
            lateloading: false,
            bitmap: Some(bitmap),
            deferred: None,
        }
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
    #[must_use]
    pub fn mode(&self) -> ColorMode {
        self.mode
    }
    #[must_use]
    pub fn compression(&self) -> Gid {
        self.compression
    }
    /// Compression used when saving, [`Gid::NONE`] or [`Gid::PNG`].
    /// # Errors
    /// [`FormatError::UnknownCompression`] for anything else.
    pub fn set_compression(&mut self, compression: Gid) -> Result<(), FormatError> {
        match compression {
            Gid::NONE | Gid::PNG => {
                self.compression = compression;
                Ok(())
            }
            other => Err(FormatError::UnknownCompression(other)),
        }
    }
    /// Whether the pixel data is left in the file until [`Self::load`] is called.
    #[must_use]
    pub fn lateloading(&self) -> bool {
        self.lateloading
    }
    pub fn set_lateloading(&mut self, lateloading: bool) {
        self.lateloading = lateloading;
    }
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.bitmap.is_some()
    }
    /// Pixel data, `None` until a deferred image is loaded.
    #[must_use]
    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }
    pub fn bitmap_mut(&mut self) -> Option<&mut Bitmap> {
        self.bitmap.as_mut()
    }
    /// Replace the pixel data. Pending deferred data is forgotten.
    pub fn set_bitmap(&mut self, bitmap: Bitmap) {
        self.width = bitmap.width();
        self.height = bitmap.height();
        self.mode = bitmap.mode();
        self.bitmap = Some(bitmap);
        self.deferred = None;
    }
    /// Take the pixel data out, leaving the image unloaded.
    pub fn take_bitmap(&mut self) -> Option<Bitmap> {
        self.bitmap.take()
    }

    /// Read deferred pixel data. Returns whether the image is loaded afterwards, calling again
    /// once loaded does nothing.
    pub fn load(&mut self) -> bool {
        match self.try_load() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("deferred image load failed: {e}");
                false
            }
        }
    }
    /// Like [`Self::load`], reporting why loading failed.
    /// # Errors
    /// [`LoadError::NoFileObject`] if there is nothing left to load from, otherwise stream or
    /// decoding errors.
    pub fn try_load(&mut self) -> Result<(), LoadError> {
        if self.bitmap.is_some() {
            return Ok(());
        }
        let deferred = self.deferred.as_ref().ok_or(LoadError::NoFileObject)?;
        let (mut reader, size) = deferred.reopen()?;
        let body = read_body(&mut reader, size, true, false)?;
        let bitmap = body.bitmap.ok_or(FormatError::SizeMismatch {
            what: "image data",
            expected: u64::from(body.width) * u64::from(body.height),
            found: 0,
        })?;
        log::debug!("loaded deferred {}x{} image", bitmap.width(), bitmap.height());
        self.bitmap = Some(bitmap);
        // Releases the lease.
        self.deferred = None;
        Ok(())
    }
    pub(crate) fn prepare(&mut self) {
        if let Some(bitmap) = &mut self.bitmap {
            bitmap.prepare();
        }
    }
    pub(crate) fn discard(&mut self) {
        if let Some(bitmap) = &mut self.bitmap {
            bitmap.discard();
        }
    }

    /// Replace the pixel data with a PNG file, keeping the current color mode when set.
    /// # Errors
    /// Missing file, or PNG data that can't be stored in `mode`.
    pub fn import_png(
        &mut self,
        path: impl AsRef<std::path::Path>,
        mode: ColorMode,
    ) -> Result<(), LoadError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::FileNotFound(path.to_owned()),
            _ => LoadError::FileCannotBeOpened {
                path: path.to_owned(),
                source,
            },
        })?;
        let bitmap = codec::decode_png(std::io::BufReader::new(file), mode)?;
        self.set_bitmap(bitmap);
        Ok(())
    }
    /// # Errors
    /// [`WriteError::NoData`] if the image isn't loaded, or file and codec errors.
    pub fn export_png(&self, path: impl AsRef<std::path::Path>) -> Result<(), WriteError> {
        let bitmap = self.bitmap.as_ref().ok_or(WriteError::NoData(Gid::IMAGE))?;
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|source| WriteError::CannotOpenFile {
            path: path.to_owned(),
            source,
        })?;
        let mut out = std::io::BufWriter::new(file);
        codec::encode_png(bitmap, &mut out)?;
        std::io::Write::flush(&mut out)?;
        Ok(())
    }
}

struct Body {
    identity: Identity,
    width: u32,
    height: u32,
    mode: ColorMode,
    compression: Gid,
    lateloading: bool,
    bitmap: Option<Bitmap>,
}

/// Parse an image object body. Pixel data is decoded only if the image isn't late loading, or
/// `force` is set.
fn read_body(reader: &mut Reader, size: u32, force: bool, strict: bool) -> Result<Body, LoadError> {
    let mut body = Body {
        identity: Identity::default(),
        width: 0,
        height: 0,
        mode: ColorMode::Rgba,
        compression: Gid::NONE,
        lateloading: false,
        bitmap: None,
    };
    for_each_chunk(reader, size, |reader, gid, size| {
        let decode = !body.lateloading || force;
        match gid {
            Gid::IMAGE_PROPS => {
                if size < PROPS_LEN {
                    return Err(FormatError::SizeMismatch {
                        what: "image properties",
                        expected: PROPS_LEN.into(),
                        found: size.into(),
                    }
                    .into());
                }
                body.width = reader.read_i32()?.checked_as().ok_or(FormatError::Overflow)?;
                body.height = reader.read_i32()?.checked_as().ok_or(FormatError::Overflow)?;
                body.mode = ColorMode::from_u32(reader.read_u32()?)?;
                body.compression = reader.read_gid()?;
                body.lateloading = reader.read_bool()?;
            }
            Gid::IMAGE_DATA if decode => {
                let data = reader.read_vec(size)?;
                body.bitmap = Some(Bitmap::from_data(body.width, body.height, body.mode, data)?);
            }
            Gid::IMAGE_CMP_DATA if decode => {
                if body.compression != Gid::PNG {
                    return Err(FormatError::UnknownCompression(body.compression).into());
                }
                let bitmap = codec::decode_png(
                    std::io::Read::take(&mut *reader, u64::from(size)),
                    body.mode,
                )?;
                if bitmap.width() != body.width || bitmap.height() != body.height {
                    return Err(FormatError::SizeMismatch {
                        what: "compressed image",
                        expected: u64::from(body.width) * u64::from(body.height),
                        found: u64::from(bitmap.width()) * u64::from(bitmap.height()),
                    }
                    .into());
                }
                body.bitmap = Some(bitmap);
            }
            // Skipped until loaded.
            Gid::IMAGE_DATA | Gid::IMAGE_CMP_DATA => (),
            // Legacy, only the empty form is understood.
            Gid::IMAGE_CMP_PROPS if size <= 4 => (),
            Gid::IMAGE_CMP_PROPS => {
                return Err(FormatError::SizeMismatch {
                    what: "legacy compression properties",
                    expected: 4,
                    found: size.into(),
                }
                .into())
            }
            _ => {
                if !body.identity.read_chunk(reader, gid, size)? {
                    unknown_chunk(strict, Gid::IMAGE, gid)?;
                }
            }
        }
        Ok(())
    })?;
    Ok(body)
}

/// Loader for [`Gid::IMAGE`] and the image chunks nested in animations and fonts.
/// # Errors
/// Malformed layout or pixel data.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let entry = reader.tell();
    let options = ctx.options();
    let body = read_body(reader, size, options.force_immediate, options.strict)?;
    let deferred = match body.bitmap {
        None if body.lateloading && !options.force_immediate => Some(Deferred::new(
            reader.shared(),
            entry,
            ctx.codecs().clone(),
        )),
        _ => None,
    };
    let image = Image {
        width: body.width,
        height: body.height,
        mode: body.mode,
        compression: body.compression,
        lateloading: body.lateloading,
        bitmap: body.bitmap,
        deferred,
    };
    Ok(ctx
        .tree
        .insert(Node::with_identity(body.identity, Resource::Image(image))))
}

/// Write an image object tagged `gid`.
/// # Errors
/// [`WriteError::NoData`] if the pixels aren't in memory, or stream and codec errors.
pub fn save<W: std::io::Write + std::io::Seek>(
    node: &Node,
    image: &Image,
    gid: Gid,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    let bitmap = image.bitmap.as_ref().ok_or(WriteError::NoData(gid))?;
    let data = bitmap.data().ok_or(WriteError::NoData(gid))?;
    let width: i32 = bitmap.width().checked_as().ok_or(FormatError::Overflow)?;
    let height: i32 = bitmap.height().checked_as().ok_or(FormatError::Overflow)?;
    if !matches!(image.compression, Gid::NONE | Gid::PNG) {
        return Err(FormatError::UnknownCompression(image.compression).into());
    }

    let marker = writer.object_start(gid, node.guid(), node.name())?;
    writer.chunk_header(Gid::IMAGE_PROPS, PROPS_LEN as usize)?;
    writer.write_i32(width)?;
    writer.write_i32(height)?;
    writer.write_u32(bitmap.mode() as u32)?;
    writer.write_gid(image.compression)?;
    writer.write_bool(image.lateloading)?;

    if image.compression == Gid::PNG {
        let data_marker = writer.chunk_start(Gid::IMAGE_CMP_DATA)?;
        codec::encode_png(bitmap, &mut *writer)?;
        writer.end(data_marker)?;
    } else {
        writer.chunk_header(Gid::IMAGE_DATA, data.len())?;
        writer.write_bytes(data)?;
    }
    writer.end(marker)
}
