//! Reading, editing and writing Gorgon resource files.
//!
//! A file is a tree of chunked resources under one root folder. [`file::File`] loads and saves
//! whole files, [`tree::Tree`] holds the resources, and [`resources`] holds the per-type codecs
//! along with the ways to move a resource out into a self-contained [`resources::provider`].

pub mod animation;
pub mod arena;
pub mod codec;
pub mod error;
pub mod file;
pub mod geometry;
pub mod gid;
pub mod graphics;
pub mod guid;
pub mod io;
pub mod resources;
pub mod tree;

pub use file::File;
pub use gid::Gid;
pub use guid::SGuid;
pub use tree::{Handle, Node, Resource, Tree};
