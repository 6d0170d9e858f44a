use super::parts::{Composite, PartRules, PartsKind};
use crate::{
    error::{LoadError, WriteError},
    gid::Gid,
    io::{Reader, Writer, BOOL_LEN},
    tree::Resource,
};

/// Nine-patch style rectangle. Slots are numbered row by row from the top left corner.
///
/// One part fills the middle, four are the edges, five add the middle, eight are the border
/// without the middle and nine are every slot.
#[derive(Clone, Debug, Default)]
pub struct Rectangle {
    tiling: bool,
    kind: PartsKind,
}
impl Rectangle {
    pub const TOP_LEFT: usize = 0;
    pub const TOP: usize = 1;
    pub const TOP_RIGHT: usize = 2;
    pub const LEFT: usize = 3;
    pub const MIDDLE: usize = 4;
    pub const RIGHT: usize = 5;
    pub const BOTTOM_LEFT: usize = 6;
    pub const BOTTOM: usize = 7;
    pub const BOTTOM_RIGHT: usize = 8;

    #[must_use]
    pub fn new(tiling: bool) -> Self {
        Self {
            tiling,
            kind: PartsKind::default(),
        }
    }
    /// Whether edges and middle are tiled rather than stretched.
    #[must_use]
    pub fn tiling(&self) -> bool {
        self.tiling
    }
    pub fn set_tiling(&mut self, tiling: bool) {
        self.tiling = tiling;
    }
}
impl Composite for Rectangle {
    const RULES: PartRules = PartRules::strict(&[1, 4, 5, 8, 9]);
    fn layout(count: usize) -> &'static [usize] {
        match count {
            1 => &[4],
            4 => &[1, 3, 5, 7],
            5 => &[1, 3, 4, 5, 7],
            8 => &[0, 1, 2, 3, 5, 6, 7, 8],
            _ => &[0, 1, 2, 3, 4, 5, 6, 7, 8],
        }
    }
    fn read_props(&mut self, reader: &mut Reader, gid: Gid, _: u32) -> Result<bool, LoadError> {
        match gid {
            // Legacy layout, five more flags nothing reads anymore.
            Gid::RECTANGLE_PROPS => {
                self.tiling = reader.read_bool()?;
                reader.skip(5 * BOOL_LEN)?;
                Ok(true)
            }
            Gid::RECTANGLE_PROPS_II => {
                self.tiling = reader.read_bool()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
    fn write_props<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        writer.chunk_header(Gid::RECTANGLE_PROPS_II, BOOL_LEN as usize)?;
        writer.write_bool(self.tiling)?;
        Ok(())
    }
    fn parts_kind(&self) -> PartsKind {
        self.kind
    }
    fn set_parts_kind(&mut self, kind: PartsKind) {
        self.kind = kind;
    }
    fn into_resource(self) -> Resource {
        Resource::Rectangle(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::FormatError,
        file::{File, LoadMode},
        graphics::{Bitmap, ColorMode},
        guid::SGuid,
        io::{FormatVersion, SharedReader, SIGNATURE},
        resources::image::{self, Image},
        tree::Node,
    };
    use std::io::Cursor;

    /// Hand-written file with a rectangle using the legacy properties chunk.
    fn legacy_file(parts: usize) -> Vec<u8> {
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        writer.write_bytes(SIGNATURE).unwrap();
        writer.write_u32(FormatVersion::CURRENT.0).unwrap();
        writer.write_gid(Gid::NONE).unwrap();
        let folder = writer
            .object_start(Gid::FOLDER, SGuid::from_u64(1), "")
            .unwrap();
        let rect = writer
            .object_start(Gid::RECTANGLE, SGuid::from_u64(2), "frame")
            .unwrap();
        writer
            .chunk_header(Gid::RECTANGLE_PROPS, 6 * BOOL_LEN as usize)
            .unwrap();
        writer.write_bool(true).unwrap();
        for _ in 0..5 {
            writer.write_bool(false).unwrap();
        }
        let node = Node::new(Resource::Null);
        let part = Image::new(Bitmap::new(1, 1, ColorMode::Alpha).unwrap());
        for _ in 0..parts {
            image::save(&node, &part, Gid::IMAGE, &mut writer).unwrap();
        }
        writer.end(rect).unwrap();
        writer.end(folder).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn legacy_props() {
        let mut file = File::new();
        file.load_from(&SharedReader::from_bytes(legacy_file(9)), LoadMode::Full)
            .unwrap();
        let handle = file.tree().child(file.root(), 0).unwrap();
        assert_eq!(file.tree().node(handle).unwrap().name(), "frame");
        let rect = file.tree().get_as::<Rectangle>(handle).unwrap();
        assert!(rect.tiling());
        assert_eq!(rect.parts_kind(), PartsKind::Bitmap);
    }
    #[test]
    fn part_counts() {
        for count in [1, 4, 5, 8, 9] {
            assert!(File::new()
                .load_from(&SharedReader::from_bytes(legacy_file(count)), LoadMode::Full)
                .is_ok());
        }
        for count in [2, 3, 6, 7] {
            assert!(matches!(
                File::new().load_from(&SharedReader::from_bytes(legacy_file(count)), LoadMode::Full),
                Err(LoadError::Format(FormatError::Arity {
                    kind: Gid::RECTANGLE,
                    ..
                }))
            ));
        }
    }
    #[test]
    fn layouts_cover_slots() {
        for count in [1, 4, 5, 8, 9] {
            let layout = Rectangle::layout(count);
            assert_eq!(layout.len(), count);
            assert!(layout.windows(2).all(|w| w[0] < w[1]));
        }
        assert!(!Rectangle::layout(8).contains(&Rectangle::MIDDLE));
        assert_eq!(Rectangle::layout(1), &[Rectangle::MIDDLE]);
    }
}
