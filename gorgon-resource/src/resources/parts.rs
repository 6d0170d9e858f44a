//! # Composite drawables
//!
//! Line, Rectangle, and the masked, tinted, scalable and stacked objects are all built from
//! parts stored as children. They share a loader and saver, differing only in their property
//! chunks and in which children they accept.
//!
//! The part set is classified once when loaded: all static images, all animations, or anything
//! else. Consumers match on the [`PartsKind`] instead of probing each part.

use crate::{
    error::{FormatError, LoadError, WriteError},
    file::LoadContext,
    gid::Gid,
    io::{Reader, Writer},
    tree::{Handle, Node, Resource, ResourceKind, SaveContext, Tree},
};

/// Which children a composite accepts.
#[derive(Debug)]
pub struct PartRules {
    /// Allowed child counts.
    pub counts: &'static [usize],
    /// Null parts stand in for absent ones.
    pub allow_null: bool,
    /// Images and animations may be combined.
    pub allow_mixed: bool,
    /// Other composites may be parts.
    pub allow_composite: bool,
}
impl PartRules {
    /// Parts of any kind, in one of the given counts.
    #[must_use]
    pub const fn open(counts: &'static [usize]) -> Self {
        Self {
            counts,
            allow_null: true,
            allow_mixed: true,
            allow_composite: true,
        }
    }
    /// Only images or only animations, in one of the given counts.
    #[must_use]
    pub const fn strict(counts: &'static [usize]) -> Self {
        Self {
            counts,
            allow_null: false,
            allow_mixed: false,
            allow_composite: false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum PartsKind {
    /// Every part is an image, or absent.
    #[default]
    Bitmap,
    /// Every part is an animation, or absent.
    Animated,
    /// Anything else, including nested composites.
    Generic,
}

/// A resource whose children are drawable parts.
pub trait Composite: ResourceKind + Default {
    const RULES: PartRules;
    /// Slot of each child, for a given child count.
    fn layout(count: usize) -> &'static [usize];
    /// Consume a property chunk. Returns whether `gid` was one.
    /// # Errors
    /// Stream errors or malformed properties.
    fn read_props(&mut self, reader: &mut Reader, gid: Gid, size: u32) -> Result<bool, LoadError>;
    /// # Errors
    /// Stream errors.
    fn write_props<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError>;
    fn parts_kind(&self) -> PartsKind;
    fn set_parts_kind(&mut self, kind: PartsKind);
    fn into_resource(self) -> Resource;
}

/// Children placed in slot order, for layouts that follow the child order.
pub(crate) const SEQUENTIAL: [&[usize]; 3] = [&[], &[0], &[0, 1]];

fn is_composite(gid: Gid) -> bool {
    matches!(
        gid,
        Gid::LINE
            | Gid::RECTANGLE
            | Gid::MASKED_OBJECT
            | Gid::TINTED_OBJECT
            | Gid::SCALABLE_OBJECT
            | Gid::STACKED_OBJECT
    )
}

/// Check `children` against `rules` and find what kind of parts they are.
/// # Errors
/// Wrong child count, a child type `owner` can't hold, or forbidden mixing.
pub fn classify(
    tree: &Tree,
    owner: Gid,
    rules: &PartRules,
    children: &[Handle],
) -> Result<PartsKind, FormatError> {
    if !rules.counts.contains(&children.len()) {
        return Err(FormatError::Arity {
            kind: owner,
            count: children.len(),
        });
    }
    let (mut bitmaps, mut animations, mut nested) = (false, false, false);
    for &child in children {
        match tree.get(child).map_or(Gid::NONE, Node::gid) {
            Gid::IMAGE => bitmaps = true,
            Gid::ANIMATION => animations = true,
            Gid::NULL if rules.allow_null => (),
            gid if rules.allow_composite && is_composite(gid) => nested = true,
            gid => {
                return Err(FormatError::ChildType {
                    kind: owner,
                    child: gid,
                })
            }
        }
    }
    if bitmaps && animations && !rules.allow_mixed {
        return Err(FormatError::MixedParts { kind: owner });
    }
    Ok(match (bitmaps, animations, nested) {
        (_, _, true) | (true, true, _) => PartsKind::Generic,
        (false, true, false) => PartsKind::Animated,
        _ => PartsKind::Bitmap,
    })
}

/// Loader shared by every [`Composite`].
/// # Errors
/// Malformed properties, or parts the composite doesn't accept.
pub fn load<C: Composite>(
    ctx: &mut LoadContext<'_>,
    reader: &mut Reader,
    size: u32,
) -> Result<Handle, LoadError> {
    let mut composite = C::default();
    let (identity, children) = ctx.read_object(reader, size, |_, reader, gid, size| {
        composite.read_props(reader, gid, size)
    })?;
    let kind = match classify(&*ctx.tree, C::GID, &C::RULES, &children) {
        Ok(kind) => kind,
        Err(e) => {
            ctx.release(children);
            return Err(e.into());
        }
    };
    composite.set_parts_kind(kind);
    Ok(ctx.tree.insert_with_children(
        Node::with_identity(identity, composite.into_resource()),
        &children,
    ))
}

/// Saver shared by every [`Composite`]: identity, properties, then each part.
/// # Errors
/// Stream errors, or parts that can't be written.
pub fn save<C: Composite, W: std::io::Write + std::io::Seek>(
    ctx: &SaveContext<'_>,
    node: &Node,
    composite: &C,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    let marker = writer.object_start(C::GID, node.guid(), node.name())?;
    composite.write_props(writer)?;
    for &child in node.children() {
        ctx.save(child, writer)?;
    }
    writer.end(marker)
}

impl Tree {
    fn reclassify<C: Composite>(&mut self, handle: Handle) -> Result<PartsKind, LoadError> {
        let kind = classify(self, C::GID, &C::RULES, self.node(handle)?.children())?;
        self.get_as_mut::<C>(handle)?.set_parts_kind(kind);
        Ok(kind)
    }
    /// Validate the parts of a composite after its children were edited, updating its
    /// [`PartsKind`].
    /// # Errors
    /// Stale handle, a node that isn't a composite, or parts it doesn't accept.
    pub fn classify_parts(&mut self, handle: Handle) -> Result<PartsKind, LoadError> {
        use super::{
            line::Line, masked::MaskedObject, rectangle::Rectangle, scalable::ScalableObject,
            stacked::StackedObject, tinted::TintedObject,
        };
        match self.node(handle)?.gid() {
            Gid::LINE => self.reclassify::<Line>(handle),
            Gid::RECTANGLE => self.reclassify::<Rectangle>(handle),
            Gid::MASKED_OBJECT => self.reclassify::<MaskedObject>(handle),
            Gid::TINTED_OBJECT => self.reclassify::<TintedObject>(handle),
            Gid::SCALABLE_OBJECT => self.reclassify::<ScalableObject>(handle),
            Gid::STACKED_OBJECT => self.reclassify::<StackedObject>(handle),
            found => Err(crate::tree::TreeError::WrongType {
                handle,
                expected: Gid::LINE,
                found,
            }
            .into()),
        }
    }
}

/// Files holding one composite, for exercising the shared loader.
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::{
        error::LoadError,
        file::{File, LoadMode, SaveOptions},
        graphics::{Bitmap, ColorMode},
        io::{SharedReader, Writer},
        resources::image::Image,
        tree::{Handle, Node, Resource},
    };
    use std::io::Cursor;

    pub fn image() -> Resource {
        Resource::Image(Image::new(Bitmap::new(1, 1, ColorMode::Rgba).unwrap()))
    }
    /// Save `composite` under a fresh root with `parts` as its children, then load it back.
    pub fn reload(
        composite: Resource,
        parts: impl IntoIterator<Item = Resource>,
    ) -> Result<(File, Handle), LoadError> {
        let mut file = File::new();
        let root = file.root();
        let tree = file.tree_mut();
        let composite = tree.insert(Node::new(composite));
        tree.add_child(root, composite).unwrap();
        for part in parts {
            let part = tree.insert(Node::new(part));
            tree.add_child(composite, part).unwrap();
        }
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        file.save_to(&mut writer, &SaveOptions::default()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut loaded = File::new();
        loaded.load_from(&SharedReader::from_bytes(bytes), LoadMode::Full)?;
        let handle = loaded.tree().child(loaded.root(), 0).unwrap();
        Ok((loaded, handle))
    }
}
