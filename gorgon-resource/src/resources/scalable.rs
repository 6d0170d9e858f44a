use super::parts::{Composite, PartRules, PartsKind, SEQUENTIAL};
use crate::{
    error::{LoadError, WriteError},
    gid::Gid,
    graphics::{Placement, SizeController, Tiling},
    io::{Reader, Writer},
    tree::Resource,
};

/// A single part resized to fit its area according to a [`SizeController`].
#[derive(Clone, Debug, Default)]
pub struct ScalableObject {
    controller: SizeController,
    kind: PartsKind,
}
impl ScalableObject {
    #[must_use]
    pub fn new(controller: SizeController) -> Self {
        Self {
            controller,
            kind: PartsKind::default(),
        }
    }
    #[must_use]
    pub fn controller(&self) -> SizeController {
        self.controller
    }
    pub fn set_controller(&mut self, controller: SizeController) {
        self.controller = controller;
    }
}
impl Composite for ScalableObject {
    const RULES: PartRules = PartRules::open(&[0, 1]);
    fn layout(count: usize) -> &'static [usize] {
        SEQUENTIAL.get(count).copied().unwrap_or(&[])
    }
    fn read_props(&mut self, reader: &mut Reader, gid: Gid, _: u32) -> Result<bool, LoadError> {
        if gid != Gid::SCALABLE_OBJECT_PROPS {
            return Ok(false);
        }
        self.controller = SizeController {
            horizontal: Tiling::from_u32(reader.read_u32()?)?,
            vertical: Tiling::from_u32(reader.read_u32()?)?,
            placement: Placement::from_u32(reader.read_u32()?)?,
        };
        Ok(true)
    }
    fn write_props<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        writer.chunk_header(Gid::SCALABLE_OBJECT_PROPS, 12)?;
        writer.write_u32(self.controller.horizontal as u32)?;
        writer.write_u32(self.controller.vertical as u32)?;
        writer.write_u32(self.controller.placement as u32)?;
        Ok(())
    }
    fn parts_kind(&self) -> PartsKind {
        self.kind
    }
    fn set_parts_kind(&mut self, kind: PartsKind) {
        self.kind = kind;
    }
    fn into_resource(self) -> Resource {
        Resource::Scalable(self)
    }
}
