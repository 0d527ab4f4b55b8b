//! Error types for device tree construction and (de)serialization.

use std::io;

use thiserror::Error;

use crate::tree::{NodeId, Phandle};

/// Errors produced while building a device tree or converting it to and
/// from the flattened binary form.
#[derive(Debug, Error)]
pub enum FdtError {
    /// A node id did not refer to a node in this tree.
    #[error("node {0} is not part of this tree")]
    NodeNotFound(NodeId),

    /// A child with the same name already exists under the parent.
    #[error("duplicate node '{name}' under '{parent}'")]
    DuplicateNode { parent: String, name: String },

    /// A node or property name was empty or contained a reserved character.
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// `allocate_handle` was called on a node that already owns a handle.
    #[error("node '{path}' already owns handle {handle}")]
    HandleAlreadyAssigned { path: String, handle: Phandle },

    /// `resolve_handle` was called on a node that never received a handle.
    #[error("node '{path}' has no handle")]
    HandleMissing { path: String },

    /// The blob does not start with the device tree magic number.
    #[error("invalid magic number 0x{found:08x}")]
    InvalidMagic { found: u32 },

    /// The blob declares a structure version this crate cannot read.
    #[error("unsupported device tree version {found}")]
    UnsupportedVersion { found: u32 },

    /// The blob is shorter than its header or declared block extents.
    #[error("truncated device tree blob")]
    Truncated,

    /// An unknown token appeared in the structure block.
    #[error("unexpected token 0x{token:08x} at offset {offset}")]
    BadToken { offset: usize, token: u32 },

    /// A node or property name was unterminated or not valid UTF-8.
    #[error("malformed string at offset {0}")]
    BadString(usize),

    /// BEGIN/END node tokens did not nest properly.
    #[error("unbalanced node nesting in structure block")]
    UnbalancedTree,

    /// I/O error while writing a blob.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, FdtError>;
