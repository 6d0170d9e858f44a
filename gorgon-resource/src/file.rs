//! # Resource files
//!
//! A [`File`] owns a loaded resource tree along with everything needed to keep reading from the
//! underlying stream: the loader registry, options and codecs, shared with deferred folders
//! through a [`FileContext`]. Folders only hold a weak reference to the context, so releasing the
//! file (or its tree) never keeps the context alive.

use crate::{
    codec::{self, Codecs},
    error::{FormatError, LoadError, WriteError},
    gid::Gid,
    guid::SGuid,
    io::{FormatVersion, Reader, ReaderLease, SharedReader, Writer, SIGNATURE},
    resources,
    tree::{
        folder::{self, FolderLimit},
        Folder, Handle, Identity, Node, Resource, Tree,
    },
};
use hashbrown::HashMap;
use std::sync::Arc;

/// Builds a node from a chunk whose header has just been read, consuming exactly `size` bytes.
pub type LoaderFn = fn(&mut LoadContext<'_>, &mut Reader, u32) -> Result<Handle, LoadError>;

/// Chunk type to loader.
#[derive(Clone)]
pub struct Loaders(HashMap<Gid, LoaderFn>);
impl Loaders {
    /// No loaders at all. Every chunk is unknown.
    #[must_use]
    pub fn empty() -> Self {
        Self(HashMap::new())
    }
    /// Every resource type this crate knows.
    #[must_use]
    pub fn builtin() -> Self {
        let mut loaders = Self::empty();
        loaders.register(Gid::FOLDER, folder::load);
        resources::register_builtin(&mut loaders);
        loaders
    }
    /// Add or replace the loader for `gid`. Returns the one replaced.
    pub fn register(&mut self, gid: Gid, loader: LoaderFn) -> Option<LoaderFn> {
        self.0.insert(gid, loader)
    }
    #[must_use]
    pub fn get(&self, gid: Gid) -> Option<LoaderFn> {
        self.0.get(&gid).copied()
    }
    #[must_use]
    pub fn contains(&self, gid: Gid) -> bool {
        self.0.contains_key(&gid)
    }
}
impl Default for Loaders {
    fn default() -> Self {
        Self::builtin()
    }
}
impl std::fmt::Debug for Loaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut gids: Vec<_> = self.0.keys().collect();
        gids.sort();
        f.debug_set().entries(gids).finish()
    }
}

/// How much of the tree to read up front.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LoadMode {
    /// Everything.
    #[default]
    Full,
    /// The root's children, with folders among them left partially loaded.
    Shallow,
    /// Only the root's first child, eg. a header describing the rest of the file.
    FirstOnly,
}
impl From<LoadMode> for FolderLimit {
    fn from(mode: LoadMode) -> Self {
        match mode {
            LoadMode::Full => Self::Full,
            LoadMode::Shallow => Self::Shallow,
            LoadMode::FirstOnly => Self::First,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Treat unknown chunks as errors instead of skipping them.
    pub strict: bool,
    /// Decode every payload now, ignoring late loading flags.
    pub force_immediate: bool,
    /// Keep the stream open for the file's lifetime, even if nothing is deferred.
    pub keep_open: bool,
}
impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strict: cfg!(debug_assertions),
            force_immediate: false,
            keep_open: false,
        }
    }
}
impl LoadOptions {
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
    #[must_use]
    pub fn with_force_immediate(mut self, force: bool) -> Self {
        self.force_immediate = force;
        self
    }
    #[must_use]
    pub fn with_keep_open(mut self, keep_open: bool) -> Self {
        self.keep_open = keep_open;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    /// Content type written to the header. Echoes the loaded one if `None`.
    pub content_type: Option<Gid>,
}

/// Everything a deferred load needs from the file it came from.
#[derive(Debug)]
pub struct FileContext {
    loaders: Loaders,
    options: LoadOptions,
    codecs: Codecs,
}
impl FileContext {
    #[must_use]
    pub fn new(loaders: Loaders, options: LoadOptions, codecs: Codecs) -> Self {
        Self {
            loaders,
            options,
            codecs,
        }
    }
    #[must_use]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }
    #[must_use]
    pub fn codecs(&self) -> &Codecs {
        &self.codecs
    }
}

/// State threaded through loaders.
pub struct LoadContext<'a> {
    pub tree: &'a mut Tree,
    file: &'a Arc<FileContext>,
    /// Applied to the next folder chunk.
    folder_limit: FolderLimit,
}
impl<'a> LoadContext<'a> {
    pub(crate) fn new(tree: &'a mut Tree, file: &'a Arc<FileContext>, limit: FolderLimit) -> Self {
        Self {
            tree,
            file,
            folder_limit: limit,
        }
    }
    #[must_use]
    pub fn file(&self) -> &Arc<FileContext> {
        self.file
    }
    #[must_use]
    pub fn options(&self) -> &LoadOptions {
        &self.file.options
    }
    #[must_use]
    pub fn codecs(&self) -> &Codecs {
        &self.file.codecs
    }
    pub(crate) fn enter_folder(&mut self) -> FolderLimit {
        let limit = self.folder_limit;
        self.folder_limit = limit.nested();
        limit
    }
    pub(crate) fn leave_folder(&mut self, limit: FolderLimit) {
        self.folder_limit = limit;
    }
    /// Drop nodes loaded for an object that failed to load.
    pub fn release(&mut self, handles: Vec<Handle>) {
        for handle in handles {
            self.tree.delete_resource(handle);
        }
    }

    /// Load a non-common chunk through the registry. Unknown chunks are skipped, or rejected in
    /// strict mode.
    /// # Errors
    /// Anything the loader reports, or [`LoadError::UnknownNode`] in strict mode.
    pub fn load_chunk(
        &mut self,
        reader: &mut Reader,
        gid: Gid,
        size: u32,
    ) -> Result<Option<Handle>, LoadError> {
        match self.file.loaders.get(gid) {
            Some(loader) => {
                log::trace!("loading {gid} at {}", reader.tell());
                let mark = reader.target(size);
                let handle = loader(self, reader, size)?;
                if !reader.reached(&mark)? {
                    self.tree.delete_resource(handle);
                    return Err(FormatError::SizeMismatch {
                        what: "chunk",
                        expected: u64::from(size),
                        found: u64::from(size) - reader.remaining(&mark),
                    }
                    .into());
                }
                Ok(Some(handle))
            }
            None if self.options().strict => Err(LoadError::UnknownNode(gid)),
            None => {
                log::warn!("skipping unknown chunk {gid}");
                reader.skip(size)?;
                Ok(None)
            }
        }
    }

    /// Walk the sub-chunks of an object. Identity chunks are consumed, then `on_chunk` is offered
    /// the rest, and chunks it declines are loaded as children.
    /// # Errors
    /// Malformed layout, or errors from `on_chunk` or the child loaders. Children loaded before
    /// the failure are released.
    pub fn read_object(
        &mut self,
        reader: &mut Reader,
        size: u32,
        mut on_chunk: impl FnMut(&mut Self, &mut Reader, Gid, u32) -> Result<bool, LoadError>,
    ) -> Result<(Identity, Vec<Handle>), LoadError> {
        let mut identity = Identity::default();
        let mut children = Vec::new();
        let result = resources::for_each_chunk(reader, size, |reader, gid, size| {
            if identity.read_chunk(reader, gid, size)? || on_chunk(self, reader, gid, size)? {
                return Ok(());
            }
            if let Some(child) = self.load_chunk(reader, gid, size)? {
                children.push(child);
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok((identity, children)),
            Err(e) => {
                self.release(children);
                Err(e)
            }
        }
    }
}

/// A resource file and the tree loaded from it.
pub struct File {
    tree: Tree,
    root: Handle,
    loaders: Loaders,
    options: LoadOptions,
    codecs: Codecs,
    context: Option<Arc<FileContext>>,
    mapping: HashMap<SGuid, Handle>,
    version: FormatVersion,
    content_type: Gid,
    /// Held when [`LoadOptions::keep_open`] is set.
    lease: Option<ReaderLease>,
}
impl Default for File {
    fn default() -> Self {
        Self::new()
    }
}
impl File {
    /// An empty file with the built-in loaders.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Tree::new();
        let root = tree.insert(Node::new(Resource::Folder(Folder::new())));
        Self {
            tree,
            root,
            loaders: Loaders::builtin(),
            options: LoadOptions::default(),
            codecs: Codecs::default(),
            context: None,
            mapping: HashMap::new(),
            version: FormatVersion::CURRENT,
            content_type: Gid::NONE,
            lease: None,
        }
    }
    #[must_use]
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }
    #[must_use]
    pub fn with_codecs(mut self, codecs: Codecs) -> Self {
        self.codecs = codecs;
        self
    }
    /// Add a loader for chunks of type `gid`, used by loads started afterwards.
    pub fn register_loader(&mut self, gid: Gid, loader: LoaderFn) -> Option<LoaderFn> {
        self.loaders.register(gid, loader)
    }
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }
    /// The root folder.
    #[must_use]
    pub fn root(&self) -> Handle {
        self.root
    }
    #[must_use]
    pub fn version(&self) -> FormatVersion {
        self.version
    }
    #[must_use]
    pub fn content_type(&self) -> Gid {
        self.content_type
    }
    pub fn set_content_type(&mut self, content_type: Gid) {
        self.content_type = content_type;
    }
    /// Guid to node, valid from the end of a load until [`Self::discard`].
    #[must_use]
    pub fn mapping(&self) -> &HashMap<SGuid, Handle> {
        &self.mapping
    }
    #[must_use]
    pub fn find_guid(&self, guid: SGuid) -> Option<Handle> {
        self.mapping.get(&guid).copied()
    }

    /// Drop everything, leaving an empty root folder.
    fn reset(&mut self) {
        self.tree = Tree::new();
        self.root = self
            .tree
            .insert(Node::new(Resource::Folder(Folder::new())));
        self.mapping.clear();
        self.context = None;
        self.lease = None;
        self.version = FormatVersion::CURRENT;
        self.content_type = Gid::NONE;
    }

    /// Open `path`, falling back to an LZMA compressed `path.lzma`.
    fn open_path(path: &std::path::Path) -> Result<SharedReader, LoadError> {
        if path.exists() {
            return Ok(SharedReader::from_path(path));
        }
        let mut compressed = path.as_os_str().to_owned();
        compressed.push(".lzma");
        let compressed = std::path::PathBuf::from(compressed);
        if !compressed.exists() {
            return Err(LoadError::FileNotFound(path.to_owned()));
        }
        log::debug!("decompressing {}", compressed.display());
        let file = std::fs::File::open(&compressed).map_err(|source| {
            LoadError::FileCannotBeOpened {
                path: compressed.clone(),
                source,
            }
        })?;
        let data = codec::decompress_lzma(file)?;
        Ok(SharedReader::from_bytes(data))
    }

    /// Load everything in the file at `path`.
    /// # Errors
    /// See [`Self::load_from`].
    pub fn load_file(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), LoadError> {
        self.load_path(path.as_ref(), LoadMode::Full)
    }
    /// Load one tier of the file at `path`, see [`LoadMode::Shallow`].
    /// # Errors
    /// See [`Self::load_from`].
    pub fn load_shallow(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), LoadError> {
        self.load_path(path.as_ref(), LoadMode::Shallow)
    }
    /// Load only the first resource of the file at `path`, see [`LoadMode::FirstOnly`].
    /// # Errors
    /// See [`Self::load_from`].
    pub fn load_first(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), LoadError> {
        self.load_path(path.as_ref(), LoadMode::FirstOnly)
    }
    fn load_path(&mut self, path: &std::path::Path, mode: LoadMode) -> Result<(), LoadError> {
        match Self::open_path(path) {
            Ok(source) => self.load_from(&source, mode),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Replace the tree with the one stored in `source`. On failure the tree is left as a
    /// single empty folder.
    /// # Errors
    /// Bad signature or version, a file without a root folder, or anything the loaders report.
    pub fn load_from(&mut self, source: &SharedReader, mode: LoadMode) -> Result<(), LoadError> {
        self.reset();
        let result = self.load_inner(source, mode);
        if let Err(e) = &result {
            log::debug!("load failed: {e}");
            self.reset();
        }
        result
    }
    fn load_inner(&mut self, source: &SharedReader, mode: LoadMode) -> Result<(), LoadError> {
        let mut reader = source.open()?;
        reader.seek(0)?;

        let Ok(signature) = reader.read_array::<6>() else {
            return Err(LoadError::Signature);
        };
        if &signature != SIGNATURE {
            return Err(LoadError::Signature);
        }
        let version = FormatVersion(reader.read_u32()?);
        if !version.is_supported() {
            return Err(LoadError::VersionMismatch {
                found: version.0,
                supported: FormatVersion::CURRENT.0,
            });
        }
        let content_type = reader.read_gid()?;
        let Ok((gid, size)) = reader.read_chunk_header() else {
            return Err(LoadError::Containment);
        };
        if gid != Gid::FOLDER {
            return Err(LoadError::Containment);
        }

        let context = Arc::new(FileContext::new(
            self.loaders.clone(),
            self.options.clone(),
            self.codecs.clone(),
        ));
        let mut tree = Tree::new();
        let mut ctx = LoadContext::new(&mut tree, &context, mode.into());
        let root = folder::load(&mut ctx, &mut reader, size)?;
        if self.options.keep_open {
            self.lease = Some(source.keep_open());
        }
        // Parks the stream if anything asked to keep it.
        drop(reader);

        self.tree = tree;
        self.root = root;
        self.context = Some(context);
        self.version = version;
        self.content_type = content_type;
        self.map();
        self.tree.resolve(self.root, &self.mapping);
        log::debug!(
            "loaded {} resources, {} mapped",
            self.tree.len(),
            self.mapping.len()
        );
        Ok(())
    }

    /// Map guids of the nodes under `root`. Earlier entries win.
    fn map_from(&mut self, root: Handle) {
        for handle in self.tree.subtree(root) {
            let Some(node) = self.tree.get(handle) else {
                continue;
            };
            let guid = node.guid();
            if guid.is_empty() {
                continue;
            }
            if let Some(&existing) = self.mapping.get(&guid) {
                if existing != handle {
                    log::debug!("guid {guid} shared by {existing} and {handle}");
                }
                continue;
            }
            self.mapping.insert(guid, handle);
        }
    }
    fn map(&mut self) {
        self.mapping.clear();
        self.map_from(self.root);
    }

    /// Read the rest of a partially loaded folder, then map and resolve what was read.
    /// # Errors
    /// See [`Tree::load_folder`].
    pub fn load_folder(&mut self, handle: Handle, shallow: bool) -> Result<(), LoadError> {
        self.tree.load_folder(handle, shallow)?;
        self.map_from(handle);
        self.tree.resolve(handle, &self.mapping);
        Ok(())
    }

    /// Ready every resource for use.
    pub fn prepare(&mut self) {
        self.tree.prepare(self.root);
    }
    /// Release CPU-side buffers of prepared resources. Invalidates the guid mapping.
    pub fn discard(&mut self) {
        self.tree.discard(self.root);
        self.mapping.clear();
    }

    /// # Errors
    /// [`WriteError::CannotOpenFile`], or anything [`Self::save_to`] reports.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), WriteError> {
        let mut writer = Writer::create(path)?;
        self.save_to(&mut writer, &SaveOptions::default())?;
        writer.finish()?;
        Ok(())
    }
    /// Write the header and the whole tree.
    /// # Errors
    /// Stream errors or resources that can't be written.
    pub fn save_to<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
        options: &SaveOptions,
    ) -> Result<(), WriteError> {
        writer.write_bytes(SIGNATURE)?;
        writer.write_u32(FormatVersion::CURRENT.0)?;
        writer.write_gid(options.content_type.unwrap_or(self.content_type))?;
        self.tree.save(self.root, writer, &self.codecs)
    }

    /// Take the tree out of the file. Partially loaded folders in it can no longer be completed.
    #[must_use]
    pub fn release_tree(self) -> (Tree, Handle) {
        (self.tree, self.root)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::Point,
        graphics::{Bitmap, ColorMode, Orientation},
        io::BOOL_LEN,
        resources::{
            blob::Blob, image::Image, line::Line, provider::Provider, stacked::StackedObject,
        },
        tree::TreeError,
    };
    use std::io::Cursor;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
    fn node(tree: &mut Tree, parent: Handle, name: &str, resource: Resource) -> Handle {
        let handle = tree.insert(Node::with_identity(Identity::named(name), resource));
        tree.add_child(parent, handle).unwrap();
        handle
    }
    fn checker() -> Bitmap {
        Bitmap::from_data(2, 1, ColorMode::Rgba, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap()
    }
    fn sample() -> File {
        let mut file = File::new();
        file.set_content_type(Gid(0x1234));
        let root = file.root();
        let tree = file.tree_mut();
        node(tree, root, "icon", Resource::Image(Image::new(checker())));
        let sub = node(tree, root, "sub", Resource::Folder(Folder::new()));
        node(tree, sub, "payload", Resource::Blob(Blob::new(b"hello".to_vec())));
        let line = node(
            tree,
            root,
            "line",
            Resource::Line(Line::new(Orientation::Vertical, true)),
        );
        node(tree, line, "", Resource::Image(Image::new(checker())));
        file
    }
    fn to_bytes(file: &File) -> Vec<u8> {
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        file.save_to(&mut writer, &SaveOptions::default()).unwrap();
        writer.finish().unwrap().into_inner()
    }
    fn load(bytes: &[u8], mode: LoadMode) -> Result<File, LoadError> {
        let mut file = File::new().with_options(LoadOptions::default().with_strict(true));
        file.load_from(&SharedReader::from_bytes(bytes.to_vec()), mode)?;
        Ok(file)
    }

    #[test]
    fn round_trip_is_byte_identical() {
        init();
        let bytes = to_bytes(&sample());
        assert_eq!(&bytes[..6], SIGNATURE);

        let file = load(&bytes, LoadMode::Full).unwrap();
        assert_eq!(file.content_type(), Gid(0x1234));
        let tree = file.tree();
        let icon = tree.get_named::<Image>(file.root(), "icon").unwrap();
        assert_eq!(icon.bitmap(), Some(&checker()));
        let sub = tree.find_child(file.root(), "sub").unwrap();
        assert_eq!(
            tree.get_named::<Blob>(sub, "payload").unwrap().data(),
            Some(&b"hello"[..])
        );
        assert_eq!(to_bytes(&file), bytes);
    }
    #[test]
    fn header_errors() {
        init();
        let bytes = to_bytes(&sample());

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert_eq!(
            load(&bad, LoadMode::Full).err().map(|e| e.kind()),
            Some(crate::error::LoadErrorKind::Signature)
        );
        assert!(matches!(load(b"GOR", LoadMode::Full), Err(LoadError::Signature)));

        let mut newer = bytes.clone();
        newer[6..10].copy_from_slice(&(FormatVersion::CURRENT.0 + 1).to_le_bytes());
        assert!(matches!(
            load(&newer, LoadMode::Full),
            Err(LoadError::VersionMismatch { .. })
        ));

        let mut no_root = bytes[..14].to_vec();
        no_root.extend_from_slice(&Gid::BLOB.0.to_le_bytes());
        no_root.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(load(&no_root, LoadMode::Full), Err(LoadError::Containment)));
        assert!(matches!(load(&bytes[..14], LoadMode::Full), Err(LoadError::Containment)));
    }
    #[test]
    fn failed_load_leaves_empty_root() {
        init();
        let mut file = sample();
        let bytes = to_bytes(&file);
        // Cut in the middle of the root folder.
        let truncated = SharedReader::from_bytes(bytes[..bytes.len() - 3].to_vec());
        assert!(file.load_from(&truncated, LoadMode::Full).is_err());
        assert_eq!(file.tree().len(), 1);
        assert!(file.tree().node(file.root()).unwrap().children().is_empty());
        assert!(file.mapping().is_empty());
    }

    /// Saved file with an unknown chunk spliced in before the root's children.
    fn with_unknown_chunk(bytes: &[u8]) -> Vec<u8> {
        // Header (14) + folder header (8) + sguid (16) + props (8 + bool)
        let insert_at = 14 + 8 + 16 + 8 + BOOL_LEN as usize;
        let unknown = [0xEF, 0xBE, 0xAD, 0x0E, 3, 0, 0, 0, 1, 2, 3];
        let mut out = bytes[..insert_at].to_vec();
        out.extend_from_slice(&unknown);
        out.extend_from_slice(&bytes[insert_at..]);
        let size = u32::from_le_bytes(out[18..22].try_into().unwrap()) + unknown.len() as u32;
        out[18..22].copy_from_slice(&size.to_le_bytes());
        out
    }
    #[test]
    fn unknown_chunks_skipped_when_lenient() {
        init();
        let original = to_bytes(&sample());
        let bytes = with_unknown_chunk(&original);
        assert!(matches!(
            load(&bytes, LoadMode::Full),
            Err(LoadError::UnknownNode(Gid(0x0EAD_BEEF)))
        ));

        let mut file = File::new().with_options(LoadOptions::default().with_strict(false));
        file.load_from(&SharedReader::from_bytes(bytes), LoadMode::Full)
            .unwrap();
        let tree = file.tree();
        assert_eq!(tree.node(file.root()).unwrap().children().len(), 3);
        assert!(tree.exists_named::<Image>(file.root(), "icon"));
        assert!(tree.exists_named::<Line>(file.root(), "line"));
        // The skipped chunk isn't carried over.
        assert_eq!(to_bytes(&file), original);
    }
    #[test]
    fn guid_mapping() {
        init();
        let file = load(&to_bytes(&sample()), LoadMode::Full).unwrap();
        let sub = file.tree().find_child(file.root(), "sub").unwrap();
        let guid = file.tree().node(sub).unwrap().guid();
        assert_eq!(file.find_guid(guid), Some(sub));
        // Every node has a generated guid.
        assert_eq!(file.mapping().len(), file.tree().len());

        let mut file = file;
        file.discard();
        assert!(file.mapping().is_empty());
    }
    #[test]
    fn shallow_then_complete() {
        init();
        let bytes = to_bytes(&sample());
        let mut file = load(&bytes, LoadMode::Shallow).unwrap();
        let sub = file.tree().find_child(file.root(), "sub").unwrap();
        assert!(!file.tree().get_as::<Folder>(sub).unwrap().is_loaded());
        assert!(file.tree().node(sub).unwrap().children().is_empty());
        // Partial folders keep the stream around.
        assert!(file.tree().exists_named::<Image>(file.root(), "icon"));

        file.load_folder(sub, false).unwrap();
        assert!(file.tree().get_as::<Folder>(sub).unwrap().is_loaded());
        let payload = file.tree().find_child(sub, "payload").unwrap();
        assert_eq!(
            file.find_guid(file.tree().node(payload).unwrap().guid()),
            Some(payload)
        );
        assert_eq!(to_bytes(&file), bytes);
        // Loaded folders ignore further requests.
        file.load_folder(sub, false).unwrap();
    }
    #[test]
    fn first_only() {
        init();
        let bytes = to_bytes(&sample());
        let mut file = load(&bytes, LoadMode::FirstOnly).unwrap();
        let root = file.root();
        assert_eq!(file.tree().node(root).unwrap().children().len(), 1);
        let icon = file.tree().child(root, 0).unwrap();
        assert!(file.tree().exists_named::<Image>(root, "icon"));

        file.load_folder(root, false).unwrap();
        // Handles from the first pass stay valid.
        assert_eq!(file.tree().child(root, 0), Ok(icon));
        assert_eq!(file.tree().node(root).unwrap().children().len(), 3);
        assert_eq!(to_bytes(&file), bytes);
    }
    #[test]
    fn released_tree_cannot_resume() {
        init();
        let bytes = to_bytes(&sample());
        let file = load(&bytes, LoadMode::Shallow).unwrap();
        let sub = file.tree().find_child(file.root(), "sub").unwrap();
        let (mut tree, _) = file.release_tree();
        assert!(matches!(
            tree.load_folder(sub, false),
            Err(LoadError::NoFileObject)
        ));
        assert!(matches!(
            tree.load_folder(sub, true),
            Err(LoadError::NoFileObject)
        ));
    }
    #[test]
    fn files_on_disk() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.gor");
        let file = sample();
        file.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();

        let mut loaded = File::new();
        loaded.load_file(&path).unwrap();
        assert_eq!(to_bytes(&loaded), bytes);

        // Only the compressed copy exists.
        let packed = dir.path().join("packed.gor");
        let mut compressed = Vec::new();
        codec::compress_lzma(&bytes, &mut compressed).unwrap();
        std::fs::write(dir.path().join("packed.gor.lzma"), compressed).unwrap();
        loaded.load_file(&packed).unwrap();
        assert_eq!(to_bytes(&loaded), bytes);

        let missing = loaded.load_file(dir.path().join("missing.gor")).unwrap_err();
        assert_eq!(missing.kind(), crate::error::LoadErrorKind::FileNotFound);
        assert!(loaded.tree().node(loaded.root()).unwrap().children().is_empty());
    }
    #[test]
    fn moved_out_line_outlives_file() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.gor");
        sample().save(&path).unwrap();

        let mut file = File::new();
        file.load_file(&path).unwrap();
        let root = file.root();
        let line = file.tree().find_child(root, "line").unwrap();
        let provider = file.tree_mut().move_out_provider(line).unwrap();
        assert!(provider.is_owned());
        assert!(file.tree().node(line).unwrap().children().is_empty());
        drop(file);
        std::fs::remove_file(&path).unwrap();

        let Provider::Line(line) = provider.into_inner() else {
            panic!("expected a line")
        };
        assert_eq!(line.orientation, Orientation::Vertical);
        assert!(line.tiling);
        let [start, middle, end] = line.parts.bitmaps().unwrap();
        assert!(start.is_none() && end.is_none());
        assert_eq!(middle.as_ref(), Some(&checker()));
    }
    #[test]
    fn custom_loader() {
        init();
        fn stacked_as_null(
            ctx: &mut LoadContext<'_>,
            reader: &mut Reader,
            size: u32,
        ) -> Result<Handle, LoadError> {
            reader.skip(size)?;
            Ok(ctx.tree.insert(Node::new(Resource::Null)))
        }
        let mut source = File::new();
        let root = source.root();
        node(
            source.tree_mut(),
            root,
            "stack",
            Resource::Stacked(StackedObject::new(Point::new(1, 2))),
        );
        let bytes = to_bytes(&source);

        let mut file = File::new();
        assert!(file
            .register_loader(Gid::STACKED_OBJECT, stacked_as_null)
            .is_some());
        file.load_from(&SharedReader::from_bytes(bytes), LoadMode::Full)
            .unwrap();
        let child = file.tree().child(file.root(), 0).unwrap();
        assert_eq!(file.tree().node(child).unwrap().gid(), Gid::NULL);
        assert_eq!(
            file.tree().get_as::<StackedObject>(child).err(),
            Some(TreeError::WrongType {
                handle: child,
                expected: Gid::STACKED_OBJECT,
                found: Gid::NULL
            })
        );
    }
}
