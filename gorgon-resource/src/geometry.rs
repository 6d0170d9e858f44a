//! Plain geometry values stored in resources.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}
impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Pointf {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Rectangle stored as position and size.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Rectangle stored as its four edges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}
impl Bounds {
    #[must_use]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }
    #[must_use]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Spacing around the four edges of a box.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Margins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Floating point color, each channel nominally in `0.0..=1.0`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct RgbaF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}
impl RgbaF {
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
}
impl Default for RgbaF {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Packed 8 bit per channel color, red in the lowest byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(transparent)]
pub struct Rgba(pub u32);
impl Rgba {
    #[must_use]
    pub fn from_channels([r, g, b, a]: [u8; 4]) -> Self {
        Self(u32::from_le_bytes([r, g, b, a]))
    }
    #[must_use]
    pub fn channels(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}
