//! Loader for legacy binary world-save files.
//!
//! A save file is a single serialized object graph: a root map record,
//! sprite galleries, rooms, agent objects and saved running scripts, all
//! cross-referenced by 16-bit persistent ids. Loading happens in two
//! phases. [`SaveFile::read`] decodes the whole byte stream into an
//! immutable graph, resolving every reference; [`materialize`] then walks
//! that graph and rebuilds the live world through a [`WorldBuilder`]
//! implementation supplied by the host engine.
//!
//! Two format revisions are supported, selected by [`Version`]. The
//! version is declared by the stream itself and cross-checked against the
//! one the caller expects.

pub mod codec;
pub mod error;
pub mod materialize;
pub mod world;

#[cfg(test)]
pub(crate) mod testsupport;

pub use codec::{SaveFile, Version};
pub use error::{Error, Result};
pub use materialize::{
    materialize, materialize_with_patches, VariablePatch, DEFAULT_VARIABLE_PATCHES,
};
pub use world::WorldBuilder;
