//! Links to another resource of the same file, stored by guid and resolved after loading.

use super::{for_each_chunk, unknown_chunk};
use crate::{
    error::{LoadError, WriteError},
    file::LoadContext,
    gid::Gid,
    guid::SGuid,
    io::{Reader, Writer},
    tree::{Handle, Identity, Node, Resource, Tree, TreeError},
};
use hashbrown::HashMap;

/// A guid reference, plus the node it resolved to.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Link {
    target: SGuid,
    resolved: Option<Handle>,
}
impl Link {
    #[must_use]
    pub fn new(target: SGuid) -> Self {
        Self {
            target,
            resolved: None,
        }
    }
    #[must_use]
    pub fn target(&self) -> SGuid {
        self.target
    }
    /// Point at another guid. Any earlier resolution is forgotten.
    pub fn set_target(&mut self, target: SGuid) {
        self.target = target;
        self.resolved = None;
    }
    /// Node found by the last [`resolve`](Self::resolve), if any.
    #[must_use]
    pub fn resolved(&self) -> Option<Handle> {
        self.resolved
    }
    pub fn resolve(&mut self, mapping: &HashMap<SGuid, Handle>) {
        self.resolved = mapping.get(&self.target).copied();
        if self.resolved.is_none() && !self.target.is_empty() {
            log::debug!("link target {} not found", self.target);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct LinkNode {
    link: Link,
}
impl LinkNode {
    #[must_use]
    pub fn new(target: SGuid) -> Self {
        Self {
            link: Link::new(target),
        }
    }
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }
    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
    pub(crate) fn resolve(&mut self, mapping: &HashMap<SGuid, Handle>) {
        self.link.resolve(mapping);
    }
}

impl Tree {
    /// Follow a link node to its target, if it was resolved and the target still exists.
    /// # Errors
    /// Stale handle, or `link` isn't a link node.
    pub fn link_target(&self, link: Handle) -> Result<Option<Handle>, TreeError> {
        let resolved = self.get_as::<LinkNode>(link)?.link.resolved;
        Ok(resolved.filter(|&target| self.contains(target)))
    }
}

/// # Errors
/// Stream errors, or unknown chunks in strict mode.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let strict = ctx.options().strict;
    let mut identity = Identity::default();
    let mut target = SGuid::EMPTY;
    for_each_chunk(reader, size, |reader, gid, size| {
        if identity.read_chunk(reader, gid, size)? {
            return Ok(());
        }
        if gid == Gid::LINK_NODE_TARGET {
            target = reader.read_guid()?;
            Ok(())
        } else {
            unknown_chunk(strict, Gid::LINK_NODE, gid)
        }
    })?;
    Ok(ctx.tree.insert(Node::with_identity(
        identity,
        Resource::Link(LinkNode::new(target)),
    )))
}

/// # Errors
/// Stream errors.
pub fn save<W: std::io::Write + std::io::Seek>(
    node: &Node,
    link: &LinkNode,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    let marker = writer.object_start(Gid::LINK_NODE, node.guid(), node.name())?;
    writer.chunk_header(Gid::LINK_NODE_TARGET, SGuid::LEN)?;
    writer.write_guid(link.link.target)?;
    writer.end(marker)
}
