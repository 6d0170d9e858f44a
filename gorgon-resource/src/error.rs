use crate::gid::Gid;

/// Violations of the binary layout. Fatal to the load or save in progress.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("read {over} bytes past the end of a chunk")]
    TargetPassed { over: u64 },
    #[error("{what} size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch {
        what: &'static str,
        expected: u64,
        found: u64,
    },
    #[error("{kind} cannot have {count} parts")]
    Arity { kind: Gid, count: usize },
    #[error("{kind} cannot contain {child}")]
    ChildType { kind: Gid, child: Gid },
    #[error("{kind} cannot mix images and animations")]
    MixedParts { kind: Gid },
    #[error("unknown compression {0}")]
    UnknownCompression(Gid),
    #[error("no codec installed for {0}")]
    MissingCodec(Gid),
    #[error("invalid {what} value {value}")]
    InvalidEnum { what: &'static str, value: u32 },
    #[error("glyph refers to image {index}, but only {count} exist")]
    GlyphIndex { index: u32, count: usize },
    #[error("string is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("value does not fit the file format")]
    Overflow,
    #[error("{gid} codec failed")]
    Codec {
        gid: Gid,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Discriminant of [`LoadError`], for callers that branch on the kind of failure.
#[derive(strum::AsRefStr, PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum LoadErrorKind {
    FileNotFound,
    Signature,
    VersionMismatch,
    Containment,
    UnknownNode,
    FileCannotBeOpened,
    NoFileObject,
    Tree,
    Format,
    Io,
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("cannot find the file {}", .0.display())]
    FileNotFound(std::path::PathBuf),
    #[error("signature mismatch")]
    Signature,
    #[error("file version {found:#010x} is newer than the supported {supported:#010x}")]
    VersionMismatch { found: u32, supported: u32 },
    #[error("the file does not contain a root folder")]
    Containment,
    #[error("unknown node {0}")]
    UnknownNode(Gid),
    #[error("cannot open the file {}", .path.display())]
    FileCannotBeOpened {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("the owning file was released before a deferred load")]
    NoFileObject,
    #[error(transparent)]
    Tree(#[from] crate::tree::TreeError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
impl LoadError {
    #[must_use]
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            Self::FileNotFound(_) => LoadErrorKind::FileNotFound,
            Self::Signature => LoadErrorKind::Signature,
            Self::VersionMismatch { .. } => LoadErrorKind::VersionMismatch,
            Self::Containment => LoadErrorKind::Containment,
            Self::UnknownNode(_) => LoadErrorKind::UnknownNode,
            Self::FileCannotBeOpened { .. } => LoadErrorKind::FileCannotBeOpened,
            Self::NoFileObject => LoadErrorKind::NoFileObject,
            Self::Tree(_) => LoadErrorKind::Tree,
            Self::Format(_) => LoadErrorKind::Format,
            Self::Io(_) => LoadErrorKind::Io,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("cannot open the file {} for writing", .path.display())]
    CannotOpenFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The resource has no payload to write, eg. a deferred image that was never loaded
    /// or a bitmap whose buffer was discarded.
    #[error("{0} has no data to write")]
    NoData(Gid),
    #[error("resource {0} does not exist")]
    Missing(crate::tree::Handle),
    /// An earlier write failed, the stream is in an unknown state.
    #[error("writer failed earlier")]
    Poisoned,
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures to detach a drawable from the tree.
#[derive(thiserror::Error, Debug)]
pub enum MoveOutError {
    #[error("{gid} at {handle} is not drawable")]
    NotDrawable {
        handle: crate::tree::Handle,
        gid: Gid,
    },
    #[error("image {0} has no pixel data")]
    NoData(crate::tree::Handle),
    #[error(transparent)]
    Tree(#[from] crate::tree::TreeError),
    /// Loading a deferred payload, or parts the composite doesn't accept.
    #[error(transparent)]
    Load(#[from] LoadError),
}
