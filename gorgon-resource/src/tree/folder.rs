//! # Folders
//!
//! A folder is the container node of a resource tree. Its children are read in tiers: a folder
//! may stop after its own header, or after its first child, remembering where the rest of its
//! chunk starts. [`Tree::load_folder`] picks up from there, reopening the stream through the
//! lease the folder holds.

use super::{Handle, Identity, Node, Resource, ResourceKind, SaveContext, Tree, TreeError};
use crate::{
    error::{LoadError, WriteError},
    file::{FileContext, LoadContext},
    gid::Gid,
    io::{Reader, ReaderLease, Writer, BOOL_LEN},
};
use hashbrown::HashMap;
use std::sync::{Arc, Weak};

/// How far to read into a folder's children.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum FolderLimit {
    /// Every child, recursively.
    Full,
    /// Every child, but folders among them stop after their header.
    Shallow,
    /// Only the first child, which is then read in full.
    First,
    /// Identity and properties only.
    Header,
}
impl FolderLimit {
    /// The limit applied to folders found among the children.
    pub(crate) fn nested(self) -> Self {
        match self {
            Self::Full | Self::First => Self::Full,
            Self::Shallow | Self::Header => Self::Header,
        }
    }
}

/// Where to continue a partially read folder.
struct Pending {
    file: Weak<FileContext>,
    lease: ReaderLease,
    /// Start of the first unread child chunk.
    resume: u64,
    /// End of the folder's chunk.
    end: u64,
}

#[derive(Default)]
enum State {
    #[default]
    Loaded,
    Partial(Pending),
}

#[derive(Default)]
pub struct Folder {
    load_names: bool,
    state: State,
    /// Child name to position, built on prepare when `load_names` is set.
    names: Option<HashMap<String, usize>>,
}
impl Folder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Whether children should be indexed by name once prepared.
    #[must_use]
    pub fn load_names(&self) -> bool {
        self.load_names
    }
    pub fn set_load_names(&mut self, load_names: bool) {
        self.load_names = load_names;
        if !load_names {
            self.names = None;
        }
    }
    /// Whether every child of this folder has been read.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded)
    }
    pub(crate) fn set_index(&mut self, names: HashMap<String, usize>) {
        self.names = Some(names);
    }
    pub(crate) fn clear_index(&mut self) {
        self.names = None;
    }
    fn indexed(&self, name: &str) -> Option<usize> {
        self.names.as_ref()?.get(name).copied()
    }
}

/// Chunks collected while scanning a folder.
#[derive(Default)]
struct Scan {
    identity: Identity,
    load_names: bool,
    children: Vec<Handle>,
    resume: Option<u64>,
}

fn scan(
    ctx: &mut LoadContext<'_>,
    reader: &mut Reader,
    end: u64,
    limit: FolderLimit,
    scan: &mut Scan,
) -> Result<(), LoadError> {
    let mark = reader.mark_at(end);
    while !reader.reached(&mark)? {
        let start = reader.tell();
        let (gid, size) = reader.read_chunk_header()?;
        let chunk = reader.target(size);

        if gid == Gid::FOLDER_PROPS {
            scan.load_names = reader.read_bool()?;
        } else if !scan.identity.read_chunk(reader, gid, size)? {
            let stop = match limit {
                FolderLimit::Header => true,
                FolderLimit::First => !scan.children.is_empty(),
                FolderLimit::Full | FolderLimit::Shallow => false,
            };
            if stop {
                scan.resume = Some(start);
                reader.seek(end)?;
                return Ok(());
            }
            if let Some(child) = ctx.load_chunk(reader, gid, size)? {
                scan.children.push(child);
            }
        }
        reader.skip_to(&chunk)?;
    }
    Ok(())
}

/// Loader for folder chunks.
/// # Errors
/// Malformed layout, or any error from loading the children.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let limit = ctx.enter_folder();
    let result = load_limited(ctx, reader, size, limit);
    ctx.leave_folder(limit);
    result
}

fn load_limited(
    ctx: &mut LoadContext<'_>,
    reader: &mut Reader,
    size: u32,
    limit: FolderLimit,
) -> Result<Handle, LoadError> {
    let end = reader.target(size).end();
    let mut found = Scan::default();
    if let Err(e) = scan(ctx, reader, end, limit, &mut found) {
        ctx.release(found.children);
        return Err(e);
    }

    let state = match found.resume {
        Some(resume) => {
            log::trace!("folder stops at {resume}, {limit:?}");
            State::Partial(Pending {
                file: Arc::downgrade(ctx.file()),
                lease: reader.shared().keep_open(),
                resume,
                end,
            })
        }
        None => State::Loaded,
    };
    let folder = Folder {
        load_names: found.load_names,
        state,
        names: None,
    };
    Ok(ctx.tree.insert_with_children(
        Node::with_identity(found.identity, Resource::Folder(folder)),
        &found.children,
    ))
}

/// # Errors
/// Stream errors, children that can't be written, or [`WriteError::NoData`] if the folder was
/// never fully read.
pub fn save<W: std::io::Write + std::io::Seek>(
    ctx: &SaveContext<'_>,
    node: &Node,
    folder: &Folder,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    if !folder.is_loaded() {
        return Err(WriteError::NoData(Gid::FOLDER));
    }
    let marker = writer.object_start(Gid::FOLDER, node.guid(), node.name())?;
    writer.chunk_header(Gid::FOLDER_PROPS, BOOL_LEN as usize)?;
    writer.write_bool(folder.load_names)?;
    for &child in node.children() {
        ctx.save(child, writer)?;
    }
    writer.end(marker)
}

impl Tree {
    /// Read the rest of a partially loaded folder. With `shallow`, folders among the new
    /// children stop after their header. Otherwise partially loaded folders anywhere below are
    /// completed too. Does nothing for loaded folders.
    /// # Errors
    /// [`LoadError::NoFileObject`] if the owning file has been released, otherwise anything
    /// loading the children can report.
    pub fn load_folder(&mut self, handle: Handle, shallow: bool) -> Result<(), LoadError> {
        let mut pending = vec![handle];
        while let Some(current) = pending.pop() {
            self.load_folder_tier(current, shallow)?;
            if shallow {
                continue;
            }
            let node = self.node(current)?;
            for &child in node.children().iter().rev() {
                if let Some(Resource::Folder(folder)) = self.get(child).map(Node::resource) {
                    if !folder.is_loaded() {
                        pending.push(child);
                    }
                }
            }
        }
        Ok(())
    }
    fn load_folder_tier(&mut self, handle: Handle, shallow: bool) -> Result<(), LoadError> {
        let folder = self.get_as::<Folder>(handle)?;
        let State::Partial(pending) = &folder.state else {
            return Ok(());
        };
        let file = pending.file.upgrade().ok_or(LoadError::NoFileObject)?;
        let mut reader = pending.lease.reader().open()?;
        reader.seek(pending.resume)?;
        let end = pending.end;
        log::debug!("resuming folder {handle} at {}", pending.resume);

        let limit = if shallow {
            FolderLimit::Shallow
        } else {
            FolderLimit::Full
        };
        let mut found = Scan::default();
        let mut ctx = LoadContext::new(self, &file, limit.nested());
        if let Err(e) = scan(&mut ctx, &mut reader, end, FolderLimit::Full, &mut found) {
            ctx.release(found.children);
            return Err(e);
        }
        drop(ctx);

        self.adopt(handle, &found.children);
        let folder = self.get_as_mut::<Folder>(handle)?;
        // Drops the lease.
        folder.state = State::Loaded;
        folder.load_names |= found.load_names;
        folder.names = None;
        Ok(())
    }

    /// Name index for a folder that asks for one.
    pub(crate) fn folder_name_index(&self, handle: Handle) -> Option<HashMap<String, usize>> {
        let node = self.get(handle)?;
        let Resource::Folder(folder) = &node.resource else {
            return None;
        };
        if !folder.load_names {
            return None;
        }
        let mut names = HashMap::new();
        for (index, &child) in node.children.iter().enumerate() {
            let Some(child) = self.get(child) else {
                continue;
            };
            if !child.name().is_empty() {
                names.entry(child.name().to_owned()).or_insert(index);
            }
        }
        Some(names)
    }

    /// Child of `parent` at `index`.
    /// # Errors
    /// Stale handle or index out of range.
    pub fn child(&self, parent: Handle, index: usize) -> Result<Handle, TreeError> {
        self.node(parent)?
            .children
            .get(index)
            .copied()
            .ok_or(TreeError::NoChild { parent, index })
    }
    /// First child of `parent` called `name`.
    /// # Errors
    /// Stale handle or no such child.
    pub fn find_child(&self, parent: Handle, name: &str) -> Result<Handle, TreeError> {
        let node = self.node(parent)?;
        // The index is only a hint, children may have changed since it was built.
        if let Resource::Folder(folder) = &node.resource {
            if let Some(&child) = folder.indexed(name).and_then(|i| node.children.get(i)) {
                if self.get(child).is_some_and(|c| c.name() == name) {
                    return Ok(child);
                }
            }
        }
        node.children
            .iter()
            .copied()
            .find(|&child| self.get(child).is_some_and(|c| c.name() == name))
            .ok_or_else(|| TreeError::NoName {
                parent,
                name: name.to_owned(),
            })
    }
    /// Typed child of `parent` at `index`.
    /// # Errors
    /// Stale handle, index out of range, or a child of another type.
    pub fn get_child<T: ResourceKind>(&self, parent: Handle, index: usize) -> Result<&T, TreeError> {
        self.get_as(self.child(parent, index)?)
    }
    /// Typed child of `parent` called `name`.
    /// # Errors
    /// Stale handle, no such child, or a child of another type.
    pub fn get_named<T: ResourceKind>(&self, parent: Handle, name: &str) -> Result<&T, TreeError> {
        self.get_as(self.find_child(parent, name)?)
    }
    /// Whether the child at `index` exists and is a `T`.
    #[must_use]
    pub fn exists<T: ResourceKind>(&self, parent: Handle, index: usize) -> bool {
        self.get_child::<T>(parent, index).is_ok()
    }
    /// Whether a child called `name` exists and is a `T`.
    #[must_use]
    pub fn exists_named<T: ResourceKind>(&self, parent: Handle, name: &str) -> bool {
        self.get_named::<T>(parent, name).is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resources::blob::Blob;

    fn named(tree: &mut Tree, parent: Handle, name: &str, resource: Resource) -> Handle {
        let child = tree.insert(Node::with_identity(Identity::named(name), resource));
        tree.add_child(parent, child).unwrap();
        child
    }

    #[test]
    fn query_children() {
        let mut tree = Tree::new();
        let root = tree.insert(Node::new(Resource::Folder(Folder::new())));
        let blob = named(&mut tree, root, "data", Resource::Blob(Blob::new(vec![1, 2])));
        named(&mut tree, root, "empty", Resource::Null);

        assert_eq!(tree.child(root, 0), Ok(blob));
        assert_eq!(tree.find_child(root, "data"), Ok(blob));
        assert_eq!(tree.get_named::<Blob>(root, "data").unwrap().data(), Some(&[1, 2][..]));
        assert!(tree.exists::<Blob>(root, 0));
        assert!(!tree.exists::<Blob>(root, 1));
        assert!(!tree.exists::<Blob>(root, 2));
        assert!(tree.exists_named::<Blob>(root, "data"));
        assert!(!tree.exists_named::<Folder>(root, "data"));
        assert_eq!(
            tree.find_child(root, "nope"),
            Err(TreeError::NoName {
                parent: root,
                name: "nope".into()
            })
        );
    }
    #[test]
    fn name_index_tolerates_edits() {
        let mut tree = Tree::new();
        let mut folder = Folder::new();
        folder.set_load_names(true);
        let root = tree.insert(Node::new(Resource::Folder(folder)));
        let a = named(&mut tree, root, "a", Resource::Null);
        let b = named(&mut tree, root, "b", Resource::Null);
        tree.prepare(root);
        assert_eq!(tree.find_child(root, "b"), Ok(b));

        // Index now points one past where "b" lives.
        tree.remove_child(root, a).unwrap();
        assert_eq!(tree.find_child(root, "b"), Ok(b));

        tree.discard(root);
        assert!(tree.get_as::<Folder>(root).unwrap().names.is_none());
    }
    #[test]
    fn partial_folders_refuse_to_save() {
        let tree = Tree::new();
        let folder = Folder {
            load_names: false,
            state: State::Partial(Pending {
                file: Weak::new(),
                lease: crate::io::SharedReader::from_bytes(Vec::new()).keep_open(),
                resume: 0,
                end: 0,
            }),
            names: None,
        };
        let node = Node::new(Resource::Folder(folder));
        let codecs = crate::codec::Codecs::default();
        let ctx = SaveContext {
            tree: &tree,
            codecs: &codecs,
        };
        let mut writer = Writer::new(std::io::Cursor::new(Vec::new())).unwrap();
        let Resource::Folder(folder) = node.resource() else {
            unreachable!()
        };
        assert!(matches!(
            save(&ctx, &node, folder, &mut writer),
            Err(WriteError::NoData(Gid::FOLDER))
        ));
        assert_eq!(writer.tell(), 0);
    }
    #[test]
    fn nested_limits() {
        assert_eq!(FolderLimit::Full.nested(), FolderLimit::Full);
        assert_eq!(FolderLimit::First.nested(), FolderLimit::Full);
        assert_eq!(FolderLimit::Shallow.nested(), FolderLimit::Header);
        assert_eq!(FolderLimit::Header.nested(), FolderLimit::Header);
    }
}
