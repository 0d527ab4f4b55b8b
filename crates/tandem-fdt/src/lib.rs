//! Hardware descriptor trees (flattened device trees) for the tandem
//! platform.
//!
//! Builds named-node trees with typed properties and handle (phandle)
//! management, serializes them into the standard flattened binary form, and
//! parses externally supplied blobs back into trees.
//!
//! ## Blob Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Header                       │  40 bytes, big-endian u32 fields
//! │   magic: 0xd00dfeed          │
//! │   totalsize, block offsets   │
//! │   version 17 / compat 16     │
//! ├──────────────────────────────┤
//! │ Memory reservation block     │  single (0, 0) terminator
//! ├──────────────────────────────┤
//! │ Structure block              │  BEGIN_NODE / PROP / END_NODE tokens
//! ├──────────────────────────────┤
//! │ Strings block                │  deduplicated property names
//! └──────────────────────────────┘
//! ```

mod blob;
mod error;
mod tree;

pub use blob::{FDT_MAGIC, FDT_VERSION};
pub use error::{FdtError, Result};
pub use tree::{Fdt, Node, NodeId, Phandle, PropValue};
