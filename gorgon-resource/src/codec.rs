//! # Payload codecs
//! PNG and LZMA are built in. Audio compression is left to an [`AudioCodec`] installed by the
//! application, loading or saving compressed sound without one is an error.

use crate::{
    error::FormatError,
    gid::Gid,
    graphics::{Bitmap, ColorMode},
    resources::sound::Wave,
};

pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// External audio compressor, eg. FLAC.
pub trait AudioCodec: Send + Sync {
    /// Compression tag persisted for data produced by this codec.
    fn gid(&self) -> Gid;
    /// # Errors
    /// Codec specific.
    fn encode(&self, wave: &Wave, out: &mut dyn std::io::Write) -> Result<(), CodecError>;
    /// # Errors
    /// Codec specific.
    fn decode(&self, data: &[u8]) -> Result<Wave, CodecError>;
}

/// Collaborators used while loading and saving.
#[derive(Clone, Default)]
pub struct Codecs {
    audio: Option<std::sync::Arc<dyn AudioCodec>>,
}
impl Codecs {
    #[must_use]
    pub fn with_audio(mut self, codec: std::sync::Arc<dyn AudioCodec>) -> Self {
        self.audio = Some(codec);
        self
    }
    /// The audio codec for `compression`, if installed.
    /// # Errors
    /// [`FormatError::MissingCodec`] if none handles the tag.
    pub fn audio(&self, compression: Gid) -> Result<&dyn AudioCodec, FormatError> {
        match &self.audio {
            Some(codec) if codec.gid() == compression => Ok(codec.as_ref()),
            _ => Err(FormatError::MissingCodec(compression)),
        }
    }
}
impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codecs")
            .field("audio", &self.audio.as_ref().map(|codec| codec.gid()))
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
enum PixelError {
    #[error("{0:?} png data cannot be stored as {1:?}")]
    Layout(png::ColorType, ColorMode),
}

fn codec_err(gid: Gid, source: impl Into<CodecError>) -> FormatError {
    FormatError::Codec {
        gid,
        source: source.into(),
    }
}

/// Swap the first and third channel of every pixel, in place.
fn swizzle_rb(data: &mut [u8], bpp: usize) {
    for px in data.chunks_exact_mut(bpp) {
        px.swap(0, 2);
    }
}

/// Compress a bitmap as PNG.
/// # Errors
/// Codec failure, or a bitmap whose buffer was discarded.
pub fn encode_png(bitmap: &Bitmap, out: impl std::io::Write) -> Result<(), FormatError> {
    let data = bitmap.data().ok_or(FormatError::SizeMismatch {
        what: "png source",
        expected: bitmap.width() as u64 * bitmap.height() as u64,
        found: 0,
    })?;
    let (color, data) = match bitmap.mode() {
        ColorMode::Rgb => (png::ColorType::Rgb, std::borrow::Cow::Borrowed(data)),
        ColorMode::Rgba => (png::ColorType::Rgba, data.into()),
        ColorMode::Grayscale | ColorMode::Alpha => (png::ColorType::Grayscale, data.into()),
        ColorMode::GrayscaleAlpha => (png::ColorType::GrayscaleAlpha, data.into()),
        ColorMode::Bgr | ColorMode::Bgra => {
            let bpp = bitmap.mode().bytes_per_pixel();
            let mut owned = data.to_vec();
            swizzle_rb(&mut owned, bpp);
            let color = if bpp == 3 {
                png::ColorType::Rgb
            } else {
                png::ColorType::Rgba
            };
            (color, owned.into())
        }
    };

    let mut encoder = png::Encoder::new(out, bitmap.width(), bitmap.height());
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| codec_err(Gid::PNG, e))?;
    writer
        .write_image_data(&data)
        .map_err(|e| codec_err(Gid::PNG, e))?;
    writer.finish().map_err(|e| codec_err(Gid::PNG, e))
}

/// Decode PNG data into a bitmap of the given mode.
/// # Errors
/// Malformed PNG, or a PNG layout that can't be represented in `mode`.
pub fn decode_png(data: impl std::io::Read, mode: ColorMode) -> Result<Bitmap, FormatError> {
    let mut decoder = png::Decoder::new(data);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(|e| codec_err(Gid::PNG, e))?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buffer)
        .map_err(|e| codec_err(Gid::PNG, e))?;
    buffer.truncate(info.buffer_size());

    match (info.color_type, mode) {
        (png::ColorType::Rgb, ColorMode::Rgb)
        | (png::ColorType::Rgba, ColorMode::Rgba)
        | (png::ColorType::Grayscale, ColorMode::Grayscale | ColorMode::Alpha)
        | (png::ColorType::GrayscaleAlpha, ColorMode::GrayscaleAlpha) => (),
        (png::ColorType::Rgb, ColorMode::Bgr) => swizzle_rb(&mut buffer, 3),
        (png::ColorType::Rgba, ColorMode::Bgra) => swizzle_rb(&mut buffer, 4),
        (color, mode) => return Err(codec_err(Gid::PNG, PixelError::Layout(color, mode))),
    }
    Bitmap::from_data(info.width, info.height, mode, buffer)
}

/// # Errors
/// Forwards stream errors.
pub fn compress_lzma(data: &[u8], out: &mut impl std::io::Write) -> Result<(), FormatError> {
    let mut input = std::io::Cursor::new(data);
    lzma_rs::lzma_compress(&mut input, out).map_err(|e| codec_err(Gid::LZMA, e))
}

/// # Errors
/// Malformed stream.
pub fn decompress_lzma(data: impl std::io::Read) -> Result<Vec<u8>, FormatError> {
    let mut input = std::io::BufReader::new(data);
    let mut out = Vec::new();
    lzma_rs::lzma_decompress(&mut input, &mut out).map_err(|e| codec_err(Gid::LZMA, e))?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn png_keeps_channel_order() {
        let bmp = Bitmap::from_data(2, 1, ColorMode::Bgra, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let mut encoded = Vec::new();
        encode_png(&bmp, &mut encoded).unwrap();
        assert_eq!(&encoded[1..4], b"PNG");

        let decoded = decode_png(&encoded[..], ColorMode::Bgra).unwrap();
        assert_eq!(decoded, bmp);
        // Same file viewed as RGBA has red and blue swapped.
        let rgba = decode_png(&encoded[..], ColorMode::Rgba).unwrap();
        assert_eq!(rgba.data().unwrap(), &[3, 2, 1, 4, 7, 6, 5, 8]);
    }
    #[test]
    fn png_layout_mismatch() {
        let bmp = Bitmap::new(1, 1, ColorMode::Rgb).unwrap();
        let mut encoded = Vec::new();
        encode_png(&bmp, &mut encoded).unwrap();
        assert!(matches!(
            decode_png(&encoded[..], ColorMode::Alpha),
            Err(FormatError::Codec { gid: Gid::PNG, .. })
        ));
    }
    #[test]
    fn lzma() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();
        let mut compressed = Vec::new();
        compress_lzma(&data, &mut compressed).unwrap();
        assert_eq!(decompress_lzma(&compressed[..]).unwrap(), data);
        assert!(decompress_lzma(&[1, 2, 3][..]).is_err());
    }
    #[test]
    fn missing_audio_codec() {
        assert!(matches!(
            Codecs::default().audio(Gid::FLAC),
            Err(FormatError::MissingCodec(Gid::FLAC))
        ));
    }
}
