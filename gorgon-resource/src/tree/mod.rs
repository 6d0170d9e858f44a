//! # Resource tree
//!
//! Resources live in an arena owned by a [`Tree`] and refer to each other by [`Handle`]. A node
//! may be shared by several parents, every parent owning one reference. [`Tree::delete_resource`]
//! drops one reference and only frees the node (and, recursively, its own references to its
//! children) once none remain.
//!
//! Each node also remembers one parent. That back-reference is bookkeeping only: it is never
//! used to decide ownership, and is cleared when that parent lets go of the node.

pub mod folder;

use crate::{
    arena::{Arena, Key},
    codec::Codecs,
    error::{LoadError, WriteError},
    gid::Gid,
    guid::SGuid,
    io::{Reader, Writer},
    resources::{
        animation::Animation, blob::Blob, data::DataArray, font::Font, image::Image,
        line::Line, link::LinkNode, masked::MaskedObject, rectangle::Rectangle,
        scalable::ScalableObject, sound::Sound, stacked::StackedObject, tinted::TintedObject,
    },
};
pub use folder::Folder;
use smallvec::SmallVec;

pub type Handle = Key<Node>;

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone)]
pub enum TreeError {
    #[error("resource {0} does not exist")]
    Missing(Handle),
    #[error("resource {handle} is {found}, not {expected}")]
    WrongType {
        handle: Handle,
        expected: Gid,
        found: Gid,
    },
    #[error("no child {index} in {parent}")]
    NoChild { parent: Handle, index: usize },
    #[error("no child named {name:?} in {parent}")]
    NoName { parent: Handle, name: String },
    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: Handle, child: Handle },
    #[error("adding {child} under {parent} would form a cycle")]
    Cycle { parent: Handle, child: Handle },
}

/// Identity chunks common to every object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub guid: SGuid,
    pub name: String,
}
impl Identity {
    /// Fresh identity with a generated guid.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            guid: SGuid::generate(),
            name: String::new(),
        }
    }
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            guid: SGuid::generate(),
            name: name.into(),
        }
    }
    /// Consume the chunk if it's one of the identity chunks. Returns whether it was.
    /// # Errors
    /// Stream errors or a malformed chunk.
    pub fn read_chunk(&mut self, reader: &mut Reader, gid: Gid, size: u32) -> Result<bool, LoadError> {
        match gid {
            Gid::SGUID | Gid::GUID => {
                // The long form carries the same identity followed by legacy bytes.
                let mark = reader.target(size);
                self.guid = reader.read_guid()?;
                reader.skip_to(&mark)?;
                Ok(true)
            }
            Gid::NAME => {
                self.name = reader.read_string_exact(size)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Payload of a node, one variant per resource type.
pub enum Resource {
    Folder(Folder),
    Image(Image),
    Blob(Blob),
    Sound(Sound),
    Animation(Animation),
    Font(Font),
    Line(Line),
    Rectangle(Rectangle),
    Masked(MaskedObject),
    Tinted(TintedObject),
    Scalable(ScalableObject),
    Stacked(StackedObject),
    Link(LinkNode),
    Data(DataArray),
    /// Explicitly empty part of a composite.
    Null,
}
impl Resource {
    #[must_use]
    pub fn gid(&self) -> Gid {
        match self {
            Self::Folder(_) => Gid::FOLDER,
            Self::Image(_) => Gid::IMAGE,
            Self::Blob(_) => Gid::BLOB,
            Self::Sound(_) => Gid::SOUND,
            Self::Animation(_) => Gid::ANIMATION,
            Self::Font(_) => Gid::FONT,
            Self::Line(_) => Gid::LINE,
            Self::Rectangle(_) => Gid::RECTANGLE,
            Self::Masked(_) => Gid::MASKED_OBJECT,
            Self::Tinted(_) => Gid::TINTED_OBJECT,
            Self::Scalable(_) => Gid::SCALABLE_OBJECT,
            Self::Stacked(_) => Gid::STACKED_OBJECT,
            Self::Link(_) => Gid::LINK_NODE,
            Self::Data(_) => Gid::DATA,
            Self::Null => Gid::NULL,
        }
    }
    fn prepare(&mut self) {
        if let Self::Image(image) = self {
            image.prepare();
        }
    }
    fn discard(&mut self) {
        match self {
            Self::Image(image) => image.discard(),
            Self::Folder(folder) => folder.clear_index(),
            _ => (),
        }
    }
}

/// Typed view into a [`Resource`].
pub trait ResourceKind: Sized + 'static {
    const GID: Gid;
    fn from_resource(resource: &Resource) -> Option<&Self>;
    fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self>;
}
macro_rules! resource_kind {
    ($($ty:ty => $variant:ident, $gid:expr;)*) => {
        $(
            impl ResourceKind for $ty {
                const GID: Gid = $gid;
                fn from_resource(resource: &Resource) -> Option<&Self> {
                    match resource {
                        Resource::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
                fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self> {
                    match resource {
                        Resource::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}
resource_kind! {
    Folder => Folder, Gid::FOLDER;
    Image => Image, Gid::IMAGE;
    Blob => Blob, Gid::BLOB;
    Sound => Sound, Gid::SOUND;
    Animation => Animation, Gid::ANIMATION;
    Font => Font, Gid::FONT;
    Line => Line, Gid::LINE;
    Rectangle => Rectangle, Gid::RECTANGLE;
    MaskedObject => Masked, Gid::MASKED_OBJECT;
    TintedObject => Tinted, Gid::TINTED_OBJECT;
    ScalableObject => Scalable, Gid::SCALABLE_OBJECT;
    StackedObject => Stacked, Gid::STACKED_OBJECT;
    LinkNode => Link, Gid::LINK_NODE;
    DataArray => Data, Gid::DATA;
}

pub struct Node {
    identity: Identity,
    refcount: u32,
    parent: Option<Handle>,
    children: SmallVec<[Handle; 4]>,
    resource: Resource,
}
impl Node {
    /// A node with a fresh identity.
    #[must_use]
    pub fn new(resource: Resource) -> Self {
        Self::with_identity(Identity::generate(), resource)
    }
    #[must_use]
    pub fn with_identity(identity: Identity, resource: Resource) -> Self {
        Self {
            identity,
            refcount: 1,
            parent: None,
            children: SmallVec::new(),
            resource,
        }
    }
    #[must_use]
    pub fn gid(&self) -> Gid {
        self.resource.gid()
    }
    #[must_use]
    pub fn guid(&self) -> SGuid {
        self.identity.guid
    }
    pub fn set_guid(&mut self, guid: SGuid) {
        self.identity.guid = guid;
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.identity.name = name.into();
    }
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
    /// Number of owners.
    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }
    #[must_use]
    pub fn parent(&self) -> Option<Handle> {
        self.parent
    }
    #[must_use]
    pub fn children(&self) -> &[Handle] {
        &self.children
    }
    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }
    pub fn resource_mut(&mut self) -> &mut Resource {
        &mut self.resource
    }
}

/// Arena of resource nodes.
#[derive(Default)]
pub struct Tree {
    nodes: Arena<Node>,
}
impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    /// Add a parentless node. The caller holds its only reference.
    pub fn insert(&mut self, node: Node) -> Handle {
        self.nodes.insert(node)
    }
    /// Add a node that takes ownership of `children`, in order.
    pub fn insert_with_children(&mut self, mut node: Node, children: &[Handle]) -> Handle {
        node.children.extend_from_slice(children);
        let handle = self.nodes.insert(node);
        for &child in children {
            if let Some(child) = self.nodes.get_mut(child) {
                child.parent.get_or_insert(handle);
            }
        }
        handle
    }
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.nodes.contains(handle)
    }
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&Node> {
        self.nodes.get(handle)
    }
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }
    /// # Errors
    /// If the handle is stale.
    pub fn node(&self, handle: Handle) -> Result<&Node, TreeError> {
        self.nodes.get(handle).ok_or(TreeError::Missing(handle))
    }
    /// # Errors
    /// If the handle is stale.
    pub fn node_mut(&mut self, handle: Handle) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(handle).ok_or(TreeError::Missing(handle))
    }
    /// Typed access to a node's payload.
    /// # Errors
    /// If the handle is stale or the node is of another type.
    pub fn get_as<T: ResourceKind>(&self, handle: Handle) -> Result<&T, TreeError> {
        let node = self.node(handle)?;
        T::from_resource(&node.resource).ok_or(TreeError::WrongType {
            handle,
            expected: T::GID,
            found: node.gid(),
        })
    }
    /// # Errors
    /// If the handle is stale or the node is of another type.
    pub fn get_as_mut<T: ResourceKind>(&mut self, handle: Handle) -> Result<&mut T, TreeError> {
        let node = self.node_mut(handle)?;
        let found = node.gid();
        T::from_resource_mut(&mut node.resource).ok_or(TreeError::WrongType {
            handle,
            expected: T::GID,
            found,
        })
    }

    /// Whether `needle` is `root` or reachable from it.
    fn reaches(&self, root: Handle, needle: Handle) -> bool {
        self.subtree(root).contains(&needle)
    }
    /// Append `child` to `parent`'s children. The reference the caller held on `child` now
    /// belongs to `parent`.
    /// # Errors
    /// Stale handles, or if `child` already contains `parent`.
    pub fn add_child(&mut self, parent: Handle, child: Handle) -> Result<(), TreeError> {
        let len = self.node(parent)?.children.len();
        self.insert_child(parent, len, child)
    }
    /// Insert `child` at `index` among `parent`'s children, taking over the caller's reference.
    /// # Errors
    /// Stale handles, an index past the end, or if `child` already contains `parent`.
    pub fn insert_child(
        &mut self,
        parent: Handle,
        index: usize,
        child: Handle,
    ) -> Result<(), TreeError> {
        self.node(child)?;
        if self.node(parent)?.children.len() < index {
            return Err(TreeError::NoChild { parent, index });
        }
        if self.reaches(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent.get_or_insert(parent);
        Ok(())
    }
    /// Append freshly loaded nodes to `parent`, taking over their references.
    pub(crate) fn adopt(&mut self, parent: Handle, children: &[Handle]) {
        let Some(node) = self.nodes.get_mut(parent) else {
            return;
        };
        node.children.extend_from_slice(children);
        for &child in children {
            if let Some(child) = self.nodes.get_mut(child) {
                child.parent.get_or_insert(parent);
            }
        }
    }
    /// Take another reference to `handle`, for sharing it under a second parent.
    /// Returns the new count.
    /// # Errors
    /// If the handle is stale.
    pub fn retain(&mut self, handle: Handle) -> Result<u32, TreeError> {
        let node = self.node_mut(handle)?;
        node.refcount += 1;
        Ok(node.refcount)
    }
    /// Remove `child` from `parent`'s children without releasing it. The parent's reference
    /// passes to the caller.
    /// # Errors
    /// Stale handles, or `child` isn't held by `parent`.
    pub fn detach_child(&mut self, parent: Handle, child: Handle) -> Result<(), TreeError> {
        let node = self.node_mut(parent)?;
        let position = node
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(TreeError::NotAChild { parent, child })?;
        node.children.remove(position);
        if let Some(child) = self.nodes.get_mut(child) {
            if child.parent == Some(parent) {
                child.parent = None;
            }
        }
        Ok(())
    }
    /// Detach `child` from `parent` and release the parent's reference to it.
    /// Returns whether the child was destroyed.
    /// # Errors
    /// Stale handles, or `child` isn't held by `parent`.
    pub fn remove_child(&mut self, parent: Handle, child: Handle) -> Result<bool, TreeError> {
        self.detach_child(parent, child)?;
        Ok(self.delete_resource(child))
    }
    /// Detach and release every child of `parent`.
    /// # Errors
    /// If the handle is stale.
    pub fn clear_children(&mut self, parent: Handle) -> Result<(), TreeError> {
        let children = std::mem::take(&mut self.node_mut(parent)?.children);
        for child in children {
            if let Some(node) = self.nodes.get_mut(child) {
                if node.parent == Some(parent) {
                    node.parent = None;
                }
            }
            self.delete_resource(child);
        }
        Ok(())
    }
    /// Drop one reference to `handle`. The node is destroyed once no references remain, in which
    /// case its own references to its children are dropped in turn.
    ///
    /// Returns `true` iff `handle` itself was destroyed. Stale handles are ignored.
    pub fn delete_resource(&mut self, handle: Handle) -> bool {
        let mut pending = vec![handle];
        let mut destroyed_root = false;

        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                if current == handle {
                    log::warn!("delete_resource on dead handle {handle}");
                }
                continue;
            };
            node.refcount = node.refcount.saturating_sub(1);
            if node.refcount > 0 {
                continue;
            }
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            destroyed_root |= current == handle;
            for &child in &node.children {
                if let Some(child) = self.nodes.get_mut(child) {
                    if child.parent == Some(current) {
                        child.parent = None;
                    }
                }
            }
            pending.extend(node.children.iter().rev().copied());
        }
        destroyed_root
    }

    /// Every node reachable from `root`, depth first, each listed once even if shared.
    /// Uses an explicit stack, deep trees don't recurse.
    #[must_use]
    pub fn subtree(&self, root: Handle) -> Vec<Handle> {
        let mut seen = hashbrown::HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }
    /// Ready every resource under `root` for use. Idempotent.
    pub fn prepare(&mut self, root: Handle) {
        for handle in self.subtree(root) {
            let index = self.folder_name_index(handle);
            let Some(node) = self.nodes.get_mut(handle) else {
                continue;
            };
            node.resource.prepare();
            if let (Some(index), Resource::Folder(folder)) = (index, &mut node.resource) {
                folder.set_index(index);
            }
        }
    }
    /// Release CPU-side buffers of prepared resources under `root`. Idempotent.
    pub fn discard(&mut self, root: Handle) {
        for handle in self.subtree(root) {
            if let Some(node) = self.nodes.get_mut(handle) {
                node.resource.discard();
            }
        }
    }
    /// Fix up cross references under `root` with the guid map. The child list of each node
    /// is re-read at every step, so resolving may add or remove siblings.
    pub fn resolve(&mut self, root: Handle, mapping: &hashbrown::HashMap<SGuid, Handle>) {
        let mut seen = hashbrown::HashSet::new();
        // (node, next child index)
        let mut cursors = vec![(root, 0usize)];
        self.resolve_one(root, mapping);
        seen.insert(root);

        while let Some((current, index)) = cursors.last_mut() {
            let next = self
                .nodes
                .get(*current)
                .and_then(|node| node.children.get(*index).copied());
            *index += 1;
            match next {
                Some(child) => {
                    if seen.insert(child) {
                        self.resolve_one(child, mapping);
                        cursors.push((child, 0));
                    }
                }
                None => {
                    cursors.pop();
                }
            }
        }
    }
    fn resolve_one(&mut self, handle: Handle, mapping: &hashbrown::HashMap<SGuid, Handle>) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };
        match &mut node.resource {
            Resource::Link(link) => link.resolve(mapping),
            Resource::Data(data) => data.resolve(mapping),
            _ => (),
        }
    }
    /// Write `handle` and everything it owns.
    /// # Errors
    /// [`WriteError`] from the stream or from resources that can't be written.
    pub fn save<W: std::io::Write + std::io::Seek>(
        &self,
        handle: Handle,
        writer: &mut Writer<W>,
        codecs: &Codecs,
    ) -> Result<(), WriteError> {
        if !writer.is_ready() {
            return Err(WriteError::Poisoned);
        }
        SaveContext { tree: self, codecs }.save(handle, writer)
    }
}

/// State threaded through a save.
pub struct SaveContext<'a> {
    pub tree: &'a Tree,
    pub codecs: &'a Codecs,
}
impl SaveContext<'_> {
    /// Dispatch on the node's type.
    /// # Errors
    /// [`WriteError`] from the stream or from resources that can't be written.
    pub fn save<W: std::io::Write + std::io::Seek>(
        &self,
        handle: Handle,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        use crate::resources;
        let node = self
            .tree
            .get(handle)
            .ok_or(WriteError::Missing(handle))?;
        match &node.resource {
            Resource::Folder(folder) => folder::save(self, node, folder, writer),
            Resource::Image(image) => resources::image::save(node, image, Gid::IMAGE, writer),
            Resource::Blob(blob) => resources::blob::save(node, blob, writer),
            Resource::Sound(sound) => resources::sound::save(self, node, sound, writer),
            Resource::Animation(animation) => {
                resources::animation::save(self, node, animation, writer)
            }
            Resource::Font(font) => resources::font::save(self, node, font, writer),
            Resource::Line(line) => resources::parts::save(self, node, line, writer),
            Resource::Rectangle(rect) => resources::parts::save(self, node, rect, writer),
            Resource::Masked(masked) => resources::parts::save(self, node, masked, writer),
            Resource::Tinted(tinted) => resources::parts::save(self, node, tinted, writer),
            Resource::Scalable(scalable) => resources::parts::save(self, node, scalable, writer),
            Resource::Stacked(stacked) => resources::parts::save(self, node, stacked, writer),
            Resource::Link(link) => resources::link::save(node, link, writer),
            Resource::Data(data) => resources::data::save(node, data, writer),
            Resource::Null => {
                let marker = writer.object_start(Gid::NULL, node.guid(), node.name())?;
                writer.end(marker)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn null(tree: &mut Tree) -> Handle {
        tree.insert(Node::new(Resource::Null))
    }
    fn folder(tree: &mut Tree) -> Handle {
        tree.insert(Node::new(Resource::Folder(Folder::default())))
    }

    #[test]
    fn shared_child_survives_first_owner() {
        let mut tree = Tree::new();
        let a = folder(&mut tree);
        let b = folder(&mut tree);
        let shared = null(&mut tree);

        tree.add_child(a, shared).unwrap();
        assert_eq!(tree.retain(shared).unwrap(), 2);
        tree.add_child(b, shared).unwrap();
        assert_eq!(tree.node(shared).unwrap().parent(), Some(a));

        // First owner goes away, shared node stays reachable from the second.
        assert!(tree.delete_resource(a));
        assert!(!tree.contains(a));
        let node = tree.node(shared).unwrap();
        assert_eq!(node.refcount(), 1);
        assert_eq!(node.parent(), None);
        assert_eq!(tree.node(b).unwrap().children(), &[shared]);

        assert!(tree.delete_resource(b));
        assert!(!tree.contains(shared));
        assert!(tree.is_empty());
    }
    #[test]
    fn delete_resource_reports_survival() {
        let mut tree = Tree::new();
        let handle = null(&mut tree);
        tree.retain(handle).unwrap();
        assert!(!tree.delete_resource(handle));
        assert!(tree.contains(handle));
        assert!(tree.delete_resource(handle));
        // Dead handles are ignored.
        assert!(!tree.delete_resource(handle));
    }
    #[test]
    fn remove_child_keeps_parent_in_sync() {
        let mut tree = Tree::new();
        let parent = folder(&mut tree);
        let other = folder(&mut tree);
        let child = null(&mut tree);
        tree.add_child(parent, child).unwrap();
        tree.retain(child).unwrap();
        tree.add_child(other, child).unwrap();

        assert!(!tree.remove_child(parent, child).unwrap());
        assert_eq!(tree.node(child).unwrap().parent(), None);
        assert!(tree.node(parent).unwrap().children().is_empty());
        assert_eq!(
            tree.remove_child(parent, child),
            Err(TreeError::NotAChild { parent, child })
        );
        assert!(tree.remove_child(other, child).unwrap());
    }
    #[test]
    fn cycles_rejected() {
        let mut tree = Tree::new();
        let a = folder(&mut tree);
        let b = folder(&mut tree);
        tree.add_child(a, b).unwrap();
        tree.retain(a).unwrap();
        assert_eq!(
            tree.add_child(b, a),
            Err(TreeError::Cycle {
                parent: b,
                child: a
            })
        );
        assert_eq!(
            tree.add_child(a, a),
            Err(TreeError::Cycle {
                parent: a,
                child: a
            })
        );
    }
    #[test]
    fn deep_trees_dont_recurse() {
        let mut tree = Tree::new();
        let root = folder(&mut tree);
        let mut tip = root;
        for _ in 0..100_000 {
            let next = folder(&mut tree);
            tree.add_child(tip, next).unwrap();
            tip = next;
        }
        assert_eq!(tree.subtree(root).len(), 100_001);
        assert!(tree.delete_resource(root));
        assert!(tree.is_empty());
    }
    #[test]
    fn typed_access() {
        let mut tree = Tree::new();
        let handle = folder(&mut tree);
        assert!(tree.get_as::<Folder>(handle).is_ok());
        assert_eq!(
            tree.get_as::<Image>(handle).err(),
            Some(TreeError::WrongType {
                handle,
                expected: Gid::IMAGE,
                found: Gid::FOLDER
            })
        );
    }
}
