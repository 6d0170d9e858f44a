//! # Gorgon identifiers
//! Every chunk in a resource file is tagged with a 32 bit [`Gid`]. The high byte groups the
//! tag into a family (containers, graphics, fonts, sounds...), lower bytes name the concept
//! and its sub-chunks.

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Gid(pub u32);
impl Gid {
    pub const NONE: Self = Gid(0x0000_0000);

    // Common sub-chunks, valid inside any object.
    pub const GUID: Self = Gid(0x0000_0010);
    pub const SGUID: Self = Gid(0x0000_0011);
    pub const NAME: Self = Gid(0x0000_0012);

    // Containers
    pub const FOLDER: Self = Gid(0x0101_0000);
    pub const FOLDER_PROPS: Self = Gid(0x0101_0103);
    pub const LINK_NODE: Self = Gid(0x0102_0000);
    pub const LINK_NODE_TARGET: Self = Gid(0x0102_0010);

    // Compression tags, stored inside property chunks.
    pub const LZMA: Self = Gid(0xF003_0100);
    pub const FLAC: Self = Gid(0xF003_0300);
    pub const PNG: Self = Gid(0xF003_0400);

    // Images
    pub const IMAGE: Self = Gid(0x0202_0000);
    pub const IMAGE_PROPS: Self = Gid(0x0202_0101);
    pub const IMAGE_CMP_PROPS: Self = Gid(0x0202_0102);
    pub const IMAGE_DATA: Self = Gid(0x0202_0501);
    pub const IMAGE_CMP_DATA: Self = Gid(0x0202_0601);

    // Data arrays
    pub const DATA: Self = Gid(0x0203_0000);
    pub const DATA_TEXT: Self = Gid(0x0203_0C01);
    pub const DATA_INT: Self = Gid(0x0203_0C02);
    pub const DATA_FLOAT: Self = Gid(0x0203_0C03);
    pub const DATA_POINT: Self = Gid(0x0203_0C04);
    pub const DATA_RECTANGLE: Self = Gid(0x0203_0C05);
    pub const DATA_LINK: Self = Gid(0x0203_0C07);
    pub const DATA_POINTF: Self = Gid(0x0203_0C09);
    pub const DATA_COLOR: Self = Gid(0x0203_0D02);
    pub const DATA_SIZE: Self = Gid(0x0203_0D03);
    pub const DATA_BOUNDS: Self = Gid(0x0203_0D04);
    pub const DATA_MARGINS: Self = Gid(0x0203_0D05);

    // Composite drawables
    pub const LINE: Self = Gid(0x0204_0000);
    pub const LINE_PROPS: Self = Gid(0x0204_0101);
    pub const RECTANGLE: Self = Gid(0x0205_0000);
    pub const RECTANGLE_PROPS: Self = Gid(0x0205_0101);
    pub const RECTANGLE_PROPS_II: Self = Gid(0x0205_0102);
    pub const MASKED_OBJECT: Self = Gid(0x0206_0000);
    pub const TINTED_OBJECT: Self = Gid(0x0207_0000);
    pub const TINTED_OBJECT_PROPS: Self = Gid(0x0207_0101);
    pub const SCALABLE_OBJECT: Self = Gid(0x0208_0000);
    pub const SCALABLE_OBJECT_PROPS: Self = Gid(0x0208_0101);
    pub const STACKED_OBJECT: Self = Gid(0x0209_0000);
    pub const STACKED_OBJECT_PROPS: Self = Gid(0x0209_0101);
    pub const NULL: Self = Gid(0x020F_0000);

    // Animations and fonts
    pub const ANIMATION: Self = Gid(0x0310_0000);
    pub const ANIMATION_DURATIONS: Self = Gid(0x0310_0101);
    pub const ANIMATION_IMAGE: Self = Gid(0x0311_0000);
    pub const FONT: Self = Gid(0x0320_0000);
    pub const FONT_CHARMAP_II: Self = Gid(0x0320_0102);
    pub const FONT_BITMAP_PROPS: Self = Gid(0x0320_0805);
    pub const FONT_IMAGE: Self = Gid(0x0321_0000);

    // Sounds and opaque blobs
    pub const SOUND: Self = Gid(0x0401_0000);
    pub const SOUND_PROPS: Self = Gid(0x0401_0101);
    pub const SOUND_WAVE: Self = Gid(0x0401_0801);
    pub const SOUND_CMP_WAVE: Self = Gid(0x0401_0802);
    pub const BLOB: Self = Gid(0x0402_0000);
    pub const BLOB_PROPS: Self = Gid(0x0402_0101);
    pub const BLOB_DATA: Self = Gid(0x0402_0801);
    pub const BLOB_CMP_DATA: Self = Gid(0x0402_0802);

    /// Human readable name of a known tag.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::NONE => "None",
            Self::GUID => "Guid",
            Self::SGUID => "SGuid",
            Self::NAME => "Name",
            Self::FOLDER => "Folder",
            Self::LINK_NODE => "LinkNode",
            Self::LZMA => "LZMA",
            Self::FLAC => "FLAC",
            Self::PNG => "PNG",
            Self::IMAGE => "Image",
            Self::DATA => "Data",
            Self::LINE => "Line",
            Self::RECTANGLE => "Rectangle",
            Self::MASKED_OBJECT => "MaskedObject",
            Self::TINTED_OBJECT => "TintedObject",
            Self::SCALABLE_OBJECT => "ScalableObject",
            Self::STACKED_OBJECT => "StackedObject",
            Self::NULL => "Null",
            Self::ANIMATION => "Animation",
            Self::ANIMATION_IMAGE => "Animation_Image",
            Self::FONT => "Font",
            Self::FONT_IMAGE => "Font_Image",
            Self::SOUND => "Sound",
            Self::BLOB => "Blob",
            _ => return None,
        })
    }
    /// Whether resources of this type can act as an animation part of a composite.
    #[must_use]
    pub fn is_animation(self) -> bool {
        matches!(
            self,
            Self::IMAGE
                | Self::ANIMATION_IMAGE
                | Self::ANIMATION
                | Self::LINE
                | Self::RECTANGLE
                | Self::MASKED_OBJECT
                | Self::TINTED_OBJECT
                | Self::SCALABLE_OBJECT
                | Self::STACKED_OBJECT
        )
    }
}
impl std::fmt::Display for Gid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Write the name if known, always followed by the raw hex value.
        if let Some(name) = self.name() {
            write!(f, "{name} (0x{:08X})", self.0)
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}
impl From<u32> for Gid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
