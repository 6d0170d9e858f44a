//! Frame animations. Frames are image children, each shown for its own duration.

use super::image::{self, Image};
use crate::{
    error::{FormatError, LoadError, WriteError},
    file::LoadContext,
    gid::Gid,
    io::{Reader, Writer},
    tree::{Handle, Node, Resource, SaveContext, Tree, TreeError},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Animation {
    /// Milliseconds per frame, parallel to the node's children.
    durations: Vec<u32>,
}
impl Animation {
    pub(crate) fn from_durations(durations: Vec<u32>) -> Self {
        Self { durations }
    }
    pub(crate) fn take_durations(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.durations)
    }
    #[must_use]
    pub fn durations(&self) -> &[u32] {
        &self.durations
    }
    /// Total length in milliseconds.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.durations.iter().copied().map(u64::from).sum()
    }
    /// Frame shown at `time`, wrapping past the end.
    #[must_use]
    pub fn frame_at(&self, time: u64) -> Option<usize> {
        crate::animation::frame_at(self.durations.iter().copied(), time)
    }
}

impl Tree {
    /// Append a frame to an animation. The reference held on `image` passes to the animation.
    /// # Errors
    /// Stale handles, `animation` isn't one, or `image` isn't an image.
    pub fn push_frame(
        &mut self,
        animation: Handle,
        image: Handle,
        duration: u32,
    ) -> Result<(), TreeError> {
        self.get_as::<Image>(image)?;
        self.get_as::<Animation>(animation)?;
        self.add_child(animation, image)?;
        self.get_as_mut::<Animation>(animation)?
            .durations
            .push(duration);
        Ok(())
    }
    /// Remove the frame at `index`, releasing the animation's reference to its image.
    /// # Errors
    /// Stale handle, `animation` isn't one, or no such frame.
    pub fn remove_frame(&mut self, animation: Handle, index: usize) -> Result<(), TreeError> {
        self.get_as::<Animation>(animation)?;
        let image = self.child(animation, index)?;
        self.remove_child(animation, image)?;
        let durations = &mut self.get_as_mut::<Animation>(animation)?.durations;
        if index < durations.len() {
            durations.remove(index);
        }
        Ok(())
    }
}

/// # Errors
/// Malformed durations, non-image frames, or a frame count not matching the durations.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let mut durations: Vec<u32> = Vec::new();
    let (identity, frames) = ctx.read_object(reader, size, |_, reader, gid, size| {
        if gid != Gid::ANIMATION_DURATIONS {
            return Ok(false);
        }
        if size % 4 != 0 {
            return Err(FormatError::SizeMismatch {
                what: "animation durations",
                expected: u64::from(size - size % 4),
                found: size.into(),
            }
            .into());
        }
        durations = (0..size / 4)
            .map(|_| reader.read_u32())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(true)
    })?;

    let check = || {
        if let Some(child) = frames
            .iter()
            .map(|&frame| ctx.tree.get(frame).map_or(Gid::NONE, Node::gid))
            .find(|&gid| gid != Gid::IMAGE)
        {
            return Err(FormatError::ChildType {
                kind: Gid::ANIMATION,
                child,
            });
        }
        if frames.len() != durations.len() {
            return Err(FormatError::SizeMismatch {
                what: "animation frames",
                expected: durations.len() as u64,
                found: frames.len() as u64,
            });
        }
        Ok(())
    };
    if let Err(e) = check() {
        ctx.release(frames);
        return Err(e.into());
    }

    let animation = Animation { durations };
    Ok(ctx.tree.insert_with_children(
        Node::with_identity(identity, Resource::Animation(animation)),
        &frames,
    ))
}

/// # Errors
/// Stream errors, frames that aren't images, or images without data.
pub fn save<W: std::io::Write + std::io::Seek>(
    ctx: &SaveContext<'_>,
    node: &Node,
    animation: &Animation,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    if node.children().len() != animation.durations.len() {
        return Err(FormatError::SizeMismatch {
            what: "animation frames",
            expected: animation.durations.len() as u64,
            found: node.children().len() as u64,
        }
        .into());
    }
    let marker = writer.object_start(Gid::ANIMATION, node.guid(), node.name())?;
    writer.chunk_header(Gid::ANIMATION_DURATIONS, animation.durations.len() * 4)?;
    for &duration in &animation.durations {
        writer.write_u32(duration)?;
    }
    for &frame in node.children() {
        let frame_node = ctx.tree.get(frame).ok_or(WriteError::Missing(frame))?;
        let Resource::Image(frame_image) = frame_node.resource() else {
            return Err(FormatError::ChildType {
                kind: Gid::ANIMATION,
                child: frame_node.gid(),
            }
            .into());
        };
        image::save(frame_node, frame_image, Gid::ANIMATION_IMAGE, writer)?;
    }
    writer.end(marker)
}
