use super::parts::{Composite, PartRules, PartsKind, SEQUENTIAL};
use crate::{
    error::{LoadError, WriteError},
    geometry::Point,
    gid::Gid,
    io::{Reader, Writer},
    tree::Resource,
};

/// Two parts drawn over each other, the top one shifted by an offset.
#[derive(Clone, Debug, Default)]
pub struct StackedObject {
    offset: Point,
    kind: PartsKind,
}
impl StackedObject {
    pub const BOTTOM: usize = 0;
    pub const TOP: usize = 1;

    #[must_use]
    pub fn new(offset: Point) -> Self {
        Self {
            offset,
            kind: PartsKind::default(),
        }
    }
    #[must_use]
    pub fn offset(&self) -> Point {
        self.offset
    }
    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }
}
impl Composite for StackedObject {
    const RULES: PartRules = PartRules::open(&[0, 1, 2]);
    fn layout(count: usize) -> &'static [usize] {
        SEQUENTIAL.get(count).copied().unwrap_or(&[])
    }
    fn read_props(&mut self, reader: &mut Reader, gid: Gid, _: u32) -> Result<bool, LoadError> {
        if gid != Gid::STACKED_OBJECT_PROPS {
            return Ok(false);
        }
        self.offset = Point::new(reader.read_i32()?, reader.read_i32()?);
        Ok(true)
    }
    fn write_props<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        writer.chunk_header(Gid::STACKED_OBJECT_PROPS, 8)?;
        writer.write_i32(self.offset.x)?;
        writer.write_i32(self.offset.y)?;
        Ok(())
    }
    fn parts_kind(&self) -> PartsKind {
        self.kind
    }
    fn set_parts_kind(&mut self, kind: PartsKind) {
        self.kind = kind;
    }
    fn into_resource(self) -> Resource {
        Resource::Stacked(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::FormatError,
        resources::{
            blob::Blob,
            parts::fixtures::{image, reload},
        },
    };

    #[test]
    fn bottom_and_top() {
        let stacked = || Resource::Stacked(StackedObject::new(Point::new(-2, 7)));
        let (file, handle) = reload(stacked(), [image(), image()]).unwrap();
        assert_eq!(
            file.tree().get_as::<StackedObject>(handle).unwrap().offset(),
            Point::new(-2, 7)
        );
        assert_eq!(file.tree().node(handle).unwrap().children().len(), 2);

        assert!(matches!(
            reload(stacked(), (0..3).map(|_| image())),
            Err(LoadError::Format(FormatError::Arity {
                kind: Gid::STACKED_OBJECT,
                count: 3
            }))
        ));
        assert!(matches!(
            reload(stacked(), [Resource::Blob(Blob::new(vec![9])), image()]),
            Err(LoadError::Format(FormatError::ChildType {
                kind: Gid::STACKED_OBJECT,
                child: Gid::BLOB
            }))
        ));
    }
}
