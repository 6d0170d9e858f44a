use super::parts::{Composite, PartRules, PartsKind};
use crate::{
    error::{LoadError, WriteError},
    gid::Gid,
    graphics::Orientation,
    io::{Reader, Writer, BOOL_LEN},
    tree::Resource,
};

/// A line drawn from a start, a repeated or stretched middle, and an end.
///
/// One part is the middle alone, two are the start and end, three are all of them.
#[derive(Clone, Debug, Default)]
pub struct Line {
    orientation: Orientation,
    tiling: bool,
    kind: PartsKind,
}
impl Line {
    #[must_use]
    pub fn new(orientation: Orientation, tiling: bool) -> Self {
        Self {
            orientation,
            tiling,
            kind: PartsKind::default(),
        }
    }
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }
    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }
    /// Whether the middle is tiled rather than stretched.
    #[must_use]
    pub fn tiling(&self) -> bool {
        self.tiling
    }
    pub fn set_tiling(&mut self, tiling: bool) {
        self.tiling = tiling;
    }
}
impl Composite for Line {
    const RULES: PartRules = PartRules::strict(&[1, 2, 3]);
    fn layout(count: usize) -> &'static [usize] {
        match count {
            1 => &[1],
            2 => &[0, 2],
            _ => &[0, 1, 2],
        }
    }
    fn read_props(&mut self, reader: &mut Reader, gid: Gid, _: u32) -> Result<bool, LoadError> {
        if gid != Gid::LINE_PROPS {
            return Ok(false);
        }
        self.tiling = reader.read_bool()?;
        self.orientation = Orientation::from_u32(reader.read_u32()?)?;
        Ok(true)
    }
    fn write_props<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        writer.chunk_header(Gid::LINE_PROPS, (BOOL_LEN + 4) as usize)?;
        writer.write_bool(self.tiling)?;
        writer.write_u32(self.orientation as u32)?;
        Ok(())
    }
    fn parts_kind(&self) -> PartsKind {
        self.kind
    }
    fn set_parts_kind(&mut self, kind: PartsKind) {
        self.kind = kind;
    }
    fn into_resource(self) -> Resource {
        Resource::Line(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::FormatError,
        file::{File, LoadMode, SaveOptions},
        graphics::{Bitmap, ColorMode},
        io::SharedReader,
        resources::{animation::Animation, image::Image},
        tree::Node,
    };
    use std::io::Cursor;

    /// A saved file holding a line with the given parts.
    fn line_file(parts: impl IntoIterator<Item = Resource>) -> Vec<u8> {
        let mut file = File::new();
        let root = file.root();
        let tree = file.tree_mut();
        let line = tree.insert(Node::new(Resource::Line(Line::new(
            Orientation::Horizontal,
            false,
        ))));
        tree.add_child(root, line).unwrap();
        for part in parts {
            let part = tree.insert(Node::new(part));
            tree.add_child(line, part).unwrap();
        }
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        file.save_to(&mut writer, &SaveOptions::default()).unwrap();
        writer.finish().unwrap().into_inner()
    }
    fn image() -> Resource {
        Resource::Image(Image::new(Bitmap::new(2, 2, ColorMode::Rgba).unwrap()))
    }

    #[test]
    fn arity_checked_on_load() {
        for count in 1..=3 {
            let mut file = File::new();
            file.load_from(
                &SharedReader::from_bytes(line_file((0..count).map(|_| image()))),
                LoadMode::Full,
            )
            .unwrap();
            let line = file.tree().child(file.root(), 0).unwrap();
            assert_eq!(file.tree().node(line).unwrap().children().len(), count);
            assert_eq!(
                file.tree().get_as::<Line>(line).unwrap().parts_kind(),
                PartsKind::Bitmap
            );
        }
        let mut file = File::new();
        let err = file
            .load_from(
                &SharedReader::from_bytes(line_file((0..4).map(|_| image()))),
                LoadMode::Full,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Format(FormatError::Arity {
                kind: Gid::LINE,
                count: 4
            })
        ));
        // Failed load leaves an empty tree.
        assert_eq!(file.tree().len(), 1);
    }
    #[test]
    fn animated_parts() {
        let bytes = line_file([
            Resource::Animation(Animation::default()),
            Resource::Animation(Animation::default()),
        ]);
        let mut file = File::new();
        file.load_from(&SharedReader::from_bytes(bytes), LoadMode::Full)
            .unwrap();
        let line = file.tree().child(file.root(), 0).unwrap();
        assert_eq!(
            file.tree().get_as::<Line>(line).unwrap().parts_kind(),
            PartsKind::Animated
        );

        let mixed = line_file([image(), Resource::Animation(Animation::default())]);
        assert!(matches!(
            File::new().load_from(&SharedReader::from_bytes(mixed), LoadMode::Full),
            Err(LoadError::Format(FormatError::MixedParts { .. }))
        ));
    }
    #[test]
    fn slots() {
        assert_eq!(Line::layout(1), &[1]);
        assert_eq!(Line::layout(2), &[0, 2]);
        assert_eq!(Line::layout(3), &[0, 1, 2]);
    }
}
