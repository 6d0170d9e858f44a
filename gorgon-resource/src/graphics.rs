//! # Runtime drawables
//! The in-memory objects resources hand over to a renderer. Rendering itself lives elsewhere,
//! these only model the pixel buffers, frame timing, and the prepare/discard lifecycle.

use crate::error::FormatError;
use az::CheckedAs;

/// Pixel layout of a [`Bitmap`]. Values match their persisted encoding.
#[derive(strum::FromRepr, strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug)]
#[repr(u32)]
pub enum ColorMode {
    Rgb = 1,
    Grayscale = 4,
    Alpha = 8,
    Rgba = 9,
    GrayscaleAlpha = 12,
    Bgr = 16,
    Bgra = 24,
}
impl ColorMode {
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Grayscale | Self::Alpha => 1,
            Self::GrayscaleAlpha => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }
    /// # Errors
    /// If the value names no mode.
    pub fn from_u32(value: u32) -> Result<Self, FormatError> {
        Self::from_repr(value).ok_or(FormatError::InvalidEnum {
            what: "color mode",
            value,
        })
    }
}

/// Direction a line is drawn along.
#[derive(strum::FromRepr, strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug, Default)]
#[repr(u32)]
pub enum Orientation {
    #[default]
    Horizontal = 0,
    Vertical = 1,
}
impl Orientation {
    /// # Errors
    /// If the value names no orientation.
    pub fn from_u32(value: u32) -> Result<Self, FormatError> {
        Self::from_repr(value).ok_or(FormatError::InvalidEnum {
            what: "orientation",
            value,
        })
    }
}

/// How an object fills a size different from its natural one, along one axis.
#[derive(strum::FromRepr, strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug, Default)]
#[repr(u32)]
pub enum Tiling {
    /// Drawn once at natural size.
    #[default]
    Single = 0,
    Stretch = 1,
    Tile = 2,
    /// Tiled, with the size snapped to whole repeats.
    Integral = 3,
}
impl Tiling {
    /// # Errors
    /// If the value names no tiling mode.
    pub fn from_u32(value: u32) -> Result<Self, FormatError> {
        Self::from_repr(value).ok_or(FormatError::InvalidEnum {
            what: "tiling",
            value,
        })
    }
}

/// Anchor of an object drawn smaller than its area.
#[derive(strum::FromRepr, strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug, Default)]
#[repr(u32)]
pub enum Placement {
    #[default]
    TopLeft = 0,
    TopCenter = 1,
    TopRight = 2,
    MiddleLeft = 3,
    MiddleCenter = 4,
    MiddleRight = 5,
    BottomLeft = 6,
    BottomCenter = 7,
    BottomRight = 8,
}
impl Placement {
    /// # Errors
    /// If the value names no placement.
    pub fn from_u32(value: u32) -> Result<Self, FormatError> {
        Self::from_repr(value).ok_or(FormatError::InvalidEnum {
            what: "placement",
            value,
        })
    }
}

/// Sizing behavior of a scalable object.
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug, Default)]
pub struct SizeController {
    pub horizontal: Tiling,
    pub vertical: Tiling,
    pub placement: Placement,
}

/// A CPU-side pixel buffer. After [`Bitmap::prepare`] the buffer may be dropped with
/// [`Bitmap::discard`], leaving only the prepared (drawable) state.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bitmap {
    width: u32,
    height: u32,
    mode: ColorMode,
    data: Option<Vec<u8>>,
    prepared: bool,
}
impl Bitmap {
    /// Zero-filled bitmap.
    /// # Errors
    /// If the buffer size overflows.
    pub fn new(width: u32, height: u32, mode: ColorMode) -> Result<Self, FormatError> {
        let len = Self::byte_len(width, height, mode)?;
        Ok(Self {
            width,
            height,
            mode,
            data: Some(vec![0; len]),
            prepared: false,
        })
    }
    /// # Errors
    /// If `data` isn't exactly `width * height * bpp` bytes.
    pub fn from_data(
        width: u32,
        height: u32,
        mode: ColorMode,
        data: Vec<u8>,
    ) -> Result<Self, FormatError> {
        let expected = Self::byte_len(width, height, mode)?;
        if data.len() != expected {
            return Err(FormatError::SizeMismatch {
                what: "bitmap",
                expected: expected as u64,
                found: data.len() as u64,
            });
        }
        Ok(Self {
            width,
            height,
            mode,
            data: Some(data),
            prepared: false,
        })
    }
    /// Buffer length a bitmap of these dimensions requires.
    /// # Errors
    /// On overflow.
    pub fn byte_len(width: u32, height: u32, mode: ColorMode) -> Result<usize, FormatError> {
        let width: usize = width.checked_as().ok_or(FormatError::Overflow)?;
        let height: usize = height.checked_as().ok_or(FormatError::Overflow)?;
        width
            .checked_mul(height)
            .and_then(|px| px.checked_mul(mode.bytes_per_pixel()))
            .ok_or(FormatError::Overflow)
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
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
    /// Pixel buffer, `None` once discarded.
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        self.data.as_deref_mut()
    }
    /// Bytes of a single pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.mode.bytes_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        self.data.as_deref()?.get(start..start + bpp)
    }
    /// Make ready for drawing.
    pub fn prepare(&mut self) {
        self.prepared = true;
    }
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }
    /// Drop the CPU-side buffer. Only done once prepared, as the buffer is the only copy before.
    pub fn discard(&mut self) {
        if self.prepared {
            self.data = None;
        }
    }
}

/// A frame of a bitmap animation.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    pub bitmap: Bitmap,
    /// In milliseconds.
    pub duration: u32,
}

/// Sequence of timed bitmaps.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct BitmapAnimationProvider {
    frames: Vec<Frame>,
}
impl BitmapAnimationProvider {
    #[must_use]
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
    pub fn push(&mut self, bitmap: Bitmap, duration: u32) {
        self.frames.push(Frame { bitmap, duration });
    }
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }
    /// Total length in milliseconds.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.duration)).sum()
    }
    #[must_use]
    pub fn durations(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.duration).collect()
    }
    /// Index of the frame shown at `time`, wrapping past the end.
    #[must_use]
    pub fn frame_at(&self, time: u64) -> Option<usize> {
        crate::animation::frame_at(self.frames.iter().map(|f| f.duration), time)
    }
    pub fn prepare(&mut self) {
        self.frames.iter_mut().for_each(|f| f.bitmap.prepare());
    }
    pub fn discard(&mut self) {
        self.frames.iter_mut().for_each(|f| f.bitmap.discard());
    }
}
