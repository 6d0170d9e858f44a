use super::parts::{Composite, PartRules, PartsKind, SEQUENTIAL};
use crate::{
    error::{LoadError, WriteError},
    geometry::RgbaF,
    gid::Gid,
    io::{Reader, Writer},
    tree::Resource,
};

/// A single part multiplied by a color.
#[derive(Clone, Debug, Default)]
pub struct TintedObject {
    color: RgbaF,
    kind: PartsKind,
}
impl TintedObject {
    #[must_use]
    pub fn new(color: RgbaF) -> Self {
        Self {
            color,
            kind: PartsKind::default(),
        }
    }
    #[must_use]
    pub fn color(&self) -> RgbaF {
        self.color
    }
    pub fn set_color(&mut self, color: RgbaF) {
        self.color = color;
    }
}
impl Composite for TintedObject {
    const RULES: PartRules = PartRules::open(&[0, 1]);
    fn layout(count: usize) -> &'static [usize] {
        SEQUENTIAL.get(count).copied().unwrap_or(&[])
    }
    fn read_props(&mut self, reader: &mut Reader, gid: Gid, _: u32) -> Result<bool, LoadError> {
        if gid != Gid::TINTED_OBJECT_PROPS {
            return Ok(false);
        }
        self.color = RgbaF {
            r: reader.read_f32()?,
            g: reader.read_f32()?,
            b: reader.read_f32()?,
            a: reader.read_f32()?,
        };
        Ok(true)
    }
    fn write_props<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        writer.chunk_header(Gid::TINTED_OBJECT_PROPS, 16)?;
        let RgbaF { r, g, b, a } = self.color;
        for channel in [r, g, b, a] {
            writer.write_f32(channel)?;
        }
        Ok(())
    }
    fn parts_kind(&self) -> PartsKind {
        self.kind
    }
    fn set_parts_kind(&mut self, kind: PartsKind) {
        self.kind = kind;
    }
    fn into_resource(self) -> Resource {
        Resource::Tinted(self)
    }
}
