//! Device tree data structures: nodes, typed properties, and handles.
//!
//! A descriptor is a tree of named nodes. Every node carries an ordered list
//! of typed properties and may own a handle (phandle) that other nodes use
//! to reference it. Nodes are stored in an arena and addressed by [`NodeId`]
//! values returned at creation time, so later operations never re-resolve
//! string paths.

use std::fmt;

use crate::error::{FdtError, Result};

/// Handle referencing a descriptor node from another node's properties.
///
/// Handles are assigned in creation order starting at 1 and are never
/// reused or reassigned.
pub type Phandle = u32;

/// Identifier of a node within one [`Fdt`] instance.
///
/// Ids are dense arena indices; they are only meaningful for the tree that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed property value.
///
/// The flattened wire format erases types: every value is a byte string.
/// Equality is therefore defined over the encoded bytes, so a `Cell(1)`
/// built by the synthesizer compares equal to the `Bytes([0, 0, 0, 1])`
/// recovered by the parser.
#[derive(Debug, Clone)]
pub enum PropValue {
    /// Presence-only flag (zero-length value).
    Empty,
    /// A single 32-bit cell.
    Cell(u32),
    /// An ordered sequence of 32-bit cells.
    Cells(Vec<u32>),
    /// A NUL-terminated string.
    Str(String),
    /// An ordered sequence of NUL-terminated strings.
    StrList(Vec<String>),
    /// An opaque byte blob.
    Bytes(Vec<u8>),
}

impl PropValue {
    /// Encode the value as it appears in the structure block (big-endian
    /// cells, NUL-terminated strings).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            PropValue::Empty => Vec::new(),
            PropValue::Cell(v) => v.to_be_bytes().to_vec(),
            PropValue::Cells(vs) => {
                let mut out = Vec::with_capacity(vs.len() * 4);
                for v in vs {
                    out.extend_from_slice(&v.to_be_bytes());
                }
                out
            }
            PropValue::Str(s) => {
                let mut out = Vec::with_capacity(s.len() + 1);
                out.extend_from_slice(s.as_bytes());
                out.push(0);
                out
            }
            PropValue::StrList(ss) => {
                let mut out = Vec::new();
                for s in ss {
                    out.extend_from_slice(s.as_bytes());
                    out.push(0);
                }
                out
            }
            PropValue::Bytes(b) => b.clone(),
        }
    }

    /// Interpret the value as a single cell, regardless of how it was built.
    pub fn as_cell(&self) -> Option<u32> {
        match self {
            PropValue::Cell(v) => Some(*v),
            PropValue::Cells(vs) if vs.len() == 1 => Some(vs[0]),
            PropValue::Bytes(b) if b.len() == 4 => {
                Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            _ => None,
        }
    }

    /// Interpret the value as a cell sequence.
    pub fn as_cells(&self) -> Option<Vec<u32>> {
        match self {
            PropValue::Cell(v) => Some(vec![*v]),
            PropValue::Cells(vs) => Some(vs.clone()),
            PropValue::Bytes(b) if b.len() % 4 == 0 => Some(
                b.chunks_exact(4)
                    .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Interpret the value as a single string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            PropValue::Bytes(b) => match b.split_last() {
                Some((0, body)) => std::str::from_utf8(body).ok(),
                _ => None,
            },
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        self.encode() == other.encode()
    }
}

impl Eq for PropValue {}

/// A named node in the descriptor tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name including any unit address, e.g. `serial@91400000`.
    /// The root node's name is empty.
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: Vec<(String, PropValue)>,
    phandle: Option<Phandle>,
}

impl Node {
    fn new(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            properties: Vec::new(),
            phandle: None,
        }
    }

    /// Node name (empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handle owned by this node, if one was allocated.
    pub fn phandle(&self) -> Option<Phandle> {
        self.phandle
    }

    /// Properties in insertion order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.properties.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Look up one property by name.
    pub fn property(&self, name: &str) -> Option<&PropValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// A mutable descriptor tree.
///
/// All mutation goes through ids returned by [`Fdt::add_node`]; paths are
/// reconstructed only for error messages and serialization.
#[derive(Debug, Clone)]
pub struct Fdt {
    nodes: Vec<Node>,
    next_phandle: Phandle,
    boot_cpuid: u32,
}

impl Fdt {
    /// Create a tree containing only the root node, with the platform's
    /// fixed cell widths (64-bit addresses, 64-bit sizes).
    pub fn create_root() -> Self {
        let mut fdt = Self {
            nodes: vec![Node::new(String::new(), None)],
            next_phandle: 1,
            boot_cpuid: 0,
        };
        let root = fdt.root();
        // Infallible: root exists and the names are well-formed.
        let _ = fdt.set_cell(root, "#address-cells", 2);
        let _ = fdt.set_cell(root, "#size-cells", 2);
        fdt
    }

    /// Construct an empty tree without the root cell-width properties.
    /// Used by the blob parser, which recovers them from the input.
    pub(crate) fn bare() -> Self {
        Self {
            nodes: vec![Node::new(String::new(), None)],
            next_phandle: 1,
            boot_cpuid: 0,
        }
    }

    /// Id of the root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the tree, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// CPU id recorded in the blob header.
    pub fn boot_cpuid(&self) -> u32 {
        self.boot_cpuid
    }

    pub(crate) fn set_boot_cpuid(&mut self, id: u32) {
        self.boot_cpuid = id;
    }

    fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(FdtError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(FdtError::NodeNotFound(id))
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id)
    }

    /// Create a child node under `parent`. Fails if the parent id is not
    /// part of this tree or a child of the same name already exists.
    pub fn add_node(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        if name.is_empty() || name.contains(['/', '\0']) {
            return Err(FdtError::InvalidName(name.to_string()));
        }
        let parent_node = self.get(parent)?;
        if parent_node
            .children
            .iter()
            .any(|&c| self.nodes[c.0 as usize].name == name)
        {
            return Err(FdtError::DuplicateNode {
                parent: self.path(parent)?,
                name: name.to_string(),
            });
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(name.to_string(), Some(parent)));
        self.nodes[parent.0 as usize].children.push(id);
        Ok(id)
    }

    /// Attach a typed value to a node, overwriting any existing property of
    /// the same name while keeping its original position.
    pub fn set_property(&mut self, id: NodeId, name: &str, value: PropValue) -> Result<()> {
        if name.is_empty() || name.contains('\0') {
            return Err(FdtError::InvalidName(name.to_string()));
        }
        let node = self.get_mut(id)?;
        match node.properties.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => node.properties.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// Set a single-cell property.
    pub fn set_cell(&mut self, id: NodeId, name: &str, value: u32) -> Result<()> {
        self.set_property(id, name, PropValue::Cell(value))
    }

    /// Set a cell-sequence property.
    pub fn set_cells(&mut self, id: NodeId, name: &str, values: Vec<u32>) -> Result<()> {
        self.set_property(id, name, PropValue::Cells(values))
    }

    /// Set a string property.
    pub fn set_str(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        self.set_property(id, name, PropValue::Str(value.to_string()))
    }

    /// Set a string-list property.
    pub fn set_str_list(&mut self, id: NodeId, name: &str, values: &[&str]) -> Result<()> {
        self.set_property(
            id,
            name,
            PropValue::StrList(values.iter().map(|s| s.to_string()).collect()),
        )
    }

    /// Set a presence-only flag property.
    pub fn set_flag(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.set_property(id, name, PropValue::Empty)
    }

    /// Set a `reg`-style property from 64-bit (address, size) pairs, split
    /// into big-endian high/low cells.
    pub fn set_reg(&mut self, id: NodeId, ranges: &[(u64, u64)]) -> Result<()> {
        let mut cells = Vec::with_capacity(ranges.len() * 4);
        for &(addr, size) in ranges {
            cells.push((addr >> 32) as u32);
            cells.push(addr as u32);
            cells.push((size >> 32) as u32);
            cells.push(size as u32);
        }
        self.set_cells(id, "reg", cells)
    }

    /// Assign the next unused handle to a node and record it as the node's
    /// `phandle` property. Fails if the node already owns a handle.
    pub fn allocate_handle(&mut self, id: NodeId) -> Result<Phandle> {
        let path = self.path(id)?;
        let node = self.get_mut(id)?;
        if let Some(existing) = node.phandle {
            return Err(FdtError::HandleAlreadyAssigned {
                path,
                handle: existing,
            });
        }
        let handle = self.next_phandle;
        self.next_phandle += 1;
        let node = self.get_mut(id)?;
        node.phandle = Some(handle);
        node.properties
            .push(("phandle".to_string(), PropValue::Cell(handle)));
        Ok(handle)
    }

    /// Look up the handle previously assigned to a node.
    pub fn resolve_handle(&self, id: NodeId) -> Result<Phandle> {
        let node = self.get(id)?;
        node.phandle.ok_or_else(|| FdtError::HandleMissing {
            path: self.path(id).unwrap_or_default(),
        })
    }

    /// Find the node owning a handle, if any.
    pub fn phandle_node(&self, handle: Phandle) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.phandle == Some(handle))
            .map(|i| NodeId(i as u32))
    }

    /// Child ids of a node, in creation order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.get(id)?.children)
    }

    /// Reconstruct the absolute path of a node ("/" for the root).
    pub fn path(&self, id: NodeId) -> Result<String> {
        let mut segments = Vec::new();
        let mut cursor = self.get(id)?;
        while let Some(parent) = cursor.parent {
            segments.push(cursor.name.clone());
            cursor = self.get(parent)?;
        }
        if segments.is_empty() {
            return Ok("/".to_string());
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    /// Resolve an absolute path to a node id. Intended for inspection and
    /// validation of parsed trees, not for the synthesis path.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let mut cursor = self.root();
        if path == "/" {
            return Some(cursor);
        }
        for segment in path.strip_prefix('/')?.split('/') {
            let node = self.get(cursor).ok()?;
            cursor = *node
                .children
                .iter()
                .find(|&&c| self.nodes[c.0 as usize].name == segment)?;
        }
        Some(cursor)
    }

    /// All absolute node paths, in depth-first creation order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk(self.root(), &mut |fdt, id| {
            if let Ok(p) = fdt.path(id) {
                out.push(p);
            }
        });
        out
    }

    fn walk(&self, id: NodeId, visit: &mut impl FnMut(&Fdt, NodeId)) {
        visit(self, id);
        if let Ok(node) = self.get(id) {
            for &child in &node.children {
                self.walk(child, visit);
            }
        }
    }

    /// Record a handle recovered by the blob parser. No allocation happens
    /// on the parse path; this only keeps later allocations clear of
    /// handles already present in the input.
    pub(crate) fn note_phandle(&mut self, id: NodeId, handle: Phandle) {
        if let Some(node) = self.nodes.get_mut(id.0 as usize) {
            node.phandle = Some(handle);
        }
        if handle >= self.next_phandle {
            self.next_phandle = handle + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_root_sets_cell_widths() {
        let fdt = Fdt::create_root();
        let root = fdt.node(fdt.root()).unwrap();
        assert_eq!(root.property("#address-cells"), Some(&PropValue::Cell(2)));
        assert_eq!(root.property("#size-cells"), Some(&PropValue::Cell(2)));
        assert_eq!(fdt.node_count(), 1);
    }

    #[test]
    fn add_node_returns_usable_id() {
        let mut fdt = Fdt::create_root();
        let soc = fdt.add_node(fdt.root(), "soc").unwrap();
        let uart = fdt.add_node(soc, "serial@91400000").unwrap();
        assert_eq!(fdt.path(uart).unwrap(), "/soc/serial@91400000");
        assert_eq!(fdt.node_count(), 3);
    }

    #[test]
    fn add_node_rejects_duplicate_sibling() {
        let mut fdt = Fdt::create_root();
        fdt.add_node(fdt.root(), "soc").unwrap();
        let err = fdt.add_node(fdt.root(), "soc").unwrap_err();
        assert!(matches!(err, FdtError::DuplicateNode { .. }));
    }

    #[test]
    fn add_node_allows_same_name_under_different_parents() {
        let mut fdt = Fdt::create_root();
        let a = fdt.add_node(fdt.root(), "a").unwrap();
        let b = fdt.add_node(fdt.root(), "b").unwrap();
        fdt.add_node(a, "child").unwrap();
        fdt.add_node(b, "child").unwrap();
        assert_eq!(fdt.node_count(), 5);
    }

    #[test]
    fn add_node_rejects_bad_names() {
        let mut fdt = Fdt::create_root();
        assert!(matches!(
            fdt.add_node(fdt.root(), ""),
            Err(FdtError::InvalidName(_))
        ));
        assert!(matches!(
            fdt.add_node(fdt.root(), "a/b"),
            Err(FdtError::InvalidName(_))
        ));
    }

    #[test]
    fn stale_id_rejected() {
        let mut other = Fdt::create_root();
        let foreign = other.add_node(other.root(), "x").unwrap();

        let mut fdt = Fdt::create_root();
        assert!(matches!(
            fdt.add_node(foreign, "y"),
            Err(FdtError::NodeNotFound(_))
        ));
    }

    #[test]
    fn set_property_overwrites_in_place() {
        let mut fdt = Fdt::create_root();
        let n = fdt.add_node(fdt.root(), "clk").unwrap();
        fdt.set_cell(n, "clock-frequency", 1).unwrap();
        fdt.set_str(n, "compatible", "fixed-clock").unwrap();
        fdt.set_cell(n, "clock-frequency", 50_000_000).unwrap();

        let node = fdt.node(n).unwrap();
        let names: Vec<&str> = node.properties().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["clock-frequency", "compatible"]);
        assert_eq!(
            node.property("clock-frequency").unwrap().as_cell(),
            Some(50_000_000)
        );
    }

    #[test]
    fn handles_are_monotonic_from_one() {
        let mut fdt = Fdt::create_root();
        let a = fdt.add_node(fdt.root(), "a").unwrap();
        let b = fdt.add_node(fdt.root(), "b").unwrap();
        assert_eq!(fdt.allocate_handle(a).unwrap(), 1);
        assert_eq!(fdt.allocate_handle(b).unwrap(), 2);
        assert_eq!(fdt.resolve_handle(a).unwrap(), 1);
        assert_eq!(fdt.resolve_handle(b).unwrap(), 2);
    }

    #[test]
    fn allocate_handle_twice_rejected() {
        let mut fdt = Fdt::create_root();
        let a = fdt.add_node(fdt.root(), "a").unwrap();
        fdt.allocate_handle(a).unwrap();
        let err = fdt.allocate_handle(a).unwrap_err();
        assert!(matches!(
            err,
            FdtError::HandleAlreadyAssigned { handle: 1, .. }
        ));
    }

    #[test]
    fn resolve_handle_missing_rejected() {
        let mut fdt = Fdt::create_root();
        let a = fdt.add_node(fdt.root(), "a").unwrap();
        assert!(matches!(
            fdt.resolve_handle(a),
            Err(FdtError::HandleMissing { .. })
        ));
    }

    #[test]
    fn allocate_handle_records_phandle_property() {
        let mut fdt = Fdt::create_root();
        let a = fdt.add_node(fdt.root(), "a").unwrap();
        let h = fdt.allocate_handle(a).unwrap();
        assert_eq!(
            fdt.node(a).unwrap().property("phandle"),
            Some(&PropValue::Cell(h))
        );
        assert_eq!(fdt.phandle_node(h), Some(a));
        assert_eq!(fdt.phandle_node(99), None);
    }

    #[test]
    fn find_resolves_paths() {
        let mut fdt = Fdt::create_root();
        let soc = fdt.add_node(fdt.root(), "soc").unwrap();
        let uart = fdt.add_node(soc, "serial@91400000").unwrap();
        assert_eq!(fdt.find("/"), Some(fdt.root()));
        assert_eq!(fdt.find("/soc/serial@91400000"), Some(uart));
        assert_eq!(fdt.find("/soc/missing"), None);
    }

    #[test]
    fn paths_follow_creation_order() {
        let mut fdt = Fdt::create_root();
        let soc = fdt.add_node(fdt.root(), "soc").unwrap();
        fdt.add_node(fdt.root(), "memory@0").unwrap();
        fdt.add_node(soc, "clint@f0400000").unwrap();
        assert_eq!(
            fdt.paths(),
            vec!["/", "/soc", "/soc/clint@f0400000", "/memory@0"]
        );
    }

    #[test]
    fn reg_property_splits_cells() {
        let mut fdt = Fdt::create_root();
        let mem = fdt.add_node(fdt.root(), "memory@0").unwrap();
        fdt.set_reg(mem, &[(0x9140_0000, 0x1000)]).unwrap();
        assert_eq!(
            fdt.node(mem).unwrap().property("reg").unwrap().as_cells(),
            Some(vec![0, 0x9140_0000, 0, 0x1000])
        );
    }

    #[test]
    fn prop_value_equality_is_wire_level() {
        assert_eq!(
            PropValue::Cell(1),
            PropValue::Bytes(vec![0, 0, 0, 1])
        );
        assert_eq!(
            PropValue::Str("ok".into()),
            PropValue::Bytes(vec![b'o', b'k', 0])
        );
        assert_ne!(PropValue::Cell(1), PropValue::Cell(2));
    }

    #[test]
    fn prop_value_accessors() {
        assert_eq!(PropValue::Bytes(vec![0, 0, 0, 7]).as_cell(), Some(7));
        assert_eq!(PropValue::Cell(7).as_cells(), Some(vec![7]));
        assert_eq!(
            PropValue::Bytes(vec![b'h', b'i', 0]).as_str(),
            Some("hi")
        );
        assert_eq!(PropValue::Empty.as_cell(), None);
    }
}
