use super::parts::{Composite, PartRules, PartsKind, SEQUENTIAL};
use crate::{
    error::{LoadError, WriteError},
    gid::Gid,
    io::{Reader, Writer},
    tree::Resource,
};

/// A base part drawn through the alpha of a mask part. Either may be absent or Null.
#[derive(Clone, Debug, Default)]
pub struct MaskedObject {
    kind: PartsKind,
}
impl MaskedObject {
    pub const BASE: usize = 0;
    pub const MASK: usize = 1;
}
impl Composite for MaskedObject {
    const RULES: PartRules = PartRules::open(&[0, 1, 2]);
    fn layout(count: usize) -> &'static [usize] {
        SEQUENTIAL.get(count).copied().unwrap_or(&[])
    }
    fn read_props(&mut self, _: &mut Reader, _: Gid, _: u32) -> Result<bool, LoadError> {
        Ok(false)
    }
    fn write_props<W: std::io::Write + std::io::Seek>(
        &self,
        _: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        Ok(())
    }
    fn parts_kind(&self) -> PartsKind {
        self.kind
    }
    fn set_parts_kind(&mut self, kind: PartsKind) {
        self.kind = kind;
    }
    fn into_resource(self) -> Resource {
        Resource::Masked(self)
    }
}
