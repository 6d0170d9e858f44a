//! # Typed resources
//!
//! Every resource type has a loader registered with [`Loaders`], and a `save` counterpart called
//! from [`SaveContext`](crate::tree::SaveContext). Loaders follow the same shape: walk the
//! sub-chunks of the object, pick out the properties they know, and hand anything else to the
//! registry so nested resources become children.

pub mod animation;
pub mod blob;
pub mod data;
pub mod font;
pub mod image;
pub mod line;
pub mod link;
pub mod masked;
pub mod parts;
pub mod provider;
pub mod rectangle;
pub mod scalable;
pub mod sound;
pub mod stacked;
pub mod tinted;

use crate::{
    codec::Codecs,
    error::LoadError,
    file::{LoadContext, Loaders},
    gid::Gid,
    io::{Reader, ReaderLease, SharedReader},
    tree::{Handle, Node, Resource},
};

pub(crate) fn register_builtin(loaders: &mut Loaders) {
    loaders.register(Gid::IMAGE, image::load);
    loaders.register(Gid::ANIMATION_IMAGE, image::load);
    loaders.register(Gid::FONT_IMAGE, image::load);
    loaders.register(Gid::BLOB, blob::load);
    loaders.register(Gid::SOUND, sound::load);
    loaders.register(Gid::ANIMATION, animation::load);
    loaders.register(Gid::FONT, font::load);
    loaders.register(Gid::LINE, parts::load::<line::Line>);
    loaders.register(Gid::RECTANGLE, parts::load::<rectangle::Rectangle>);
    loaders.register(Gid::MASKED_OBJECT, parts::load::<masked::MaskedObject>);
    loaders.register(Gid::TINTED_OBJECT, parts::load::<tinted::TintedObject>);
    loaders.register(Gid::SCALABLE_OBJECT, parts::load::<scalable::ScalableObject>);
    loaders.register(Gid::STACKED_OBJECT, parts::load::<stacked::StackedObject>);
    loaders.register(Gid::NULL, load_null);
    loaders.register(Gid::LINK_NODE, link::load);
    loaders.register(Gid::DATA, data::load);
}

/// Walk the sub-chunks of an object body of `size` bytes. Whatever `f` leaves unread of each
/// sub-chunk is skipped.
/// # Errors
/// Errors from `f`, or sub-chunks overrunning their declared size.
pub fn for_each_chunk(
    reader: &mut Reader,
    size: u32,
    mut f: impl FnMut(&mut Reader, Gid, u32) -> Result<(), LoadError>,
) -> Result<(), LoadError> {
    let mark = reader.target(size);
    while !reader.reached(&mark)? {
        let (gid, size) = reader.read_chunk_header()?;
        let chunk = reader.target(size);
        f(reader, gid, size)?;
        reader.skip_to(&chunk)?;
    }
    Ok(())
}

/// Handle a sub-chunk a leaf resource doesn't know.
fn unknown_chunk(strict: bool, owner: Gid, gid: Gid) -> Result<(), LoadError> {
    if strict {
        Err(LoadError::UnknownNode(gid))
    } else {
        log::warn!("skipping unknown chunk {gid} in {owner}");
        Ok(())
    }
}

fn load_null(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let (identity, children) = ctx.read_object(reader, size, |_, _, _, _| Ok(false))?;
    Ok(ctx
        .tree
        .insert_with_children(Node::with_identity(identity, Resource::Null), &children))
}

/// A payload left in the stream, to be read on demand.
pub struct Deferred {
    lease: ReaderLease,
    /// Start of the object's body, right after its size field.
    entry: u64,
    codecs: Codecs,
}
impl Deferred {
    pub(crate) fn new(shared: &SharedReader, entry: u64, codecs: Codecs) -> Self {
        Self {
            lease: shared.keep_open(),
            entry,
            codecs,
        }
    }
    /// Reopen the stream at the object's body. Returns the body's size.
    pub(crate) fn reopen(&self) -> Result<(Reader, u32), LoadError> {
        let mut reader = self.lease.reader().open()?;
        reader.seek(self.entry.saturating_sub(4))?;
        let size = reader.read_chunk_size()?;
        Ok((reader, size))
    }
    pub(crate) fn codecs(&self) -> &Codecs {
        &self.codecs
    }
}
impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}
