//! # Generic Project Tree
//!
//! The decoded project document is held as a generic tree before any
//! semantic interpretation: nodes with a tag, ordered typed attributes,
//! ordered children and optional character data.
//!
//! ## Representation
//!
//! Nodes live in a single append-only arena ([`ProjectTree`]) and refer to
//! each other by [`NodeId`]. Tag and attribute names are interned once into
//! the [`NameCache`] and referenced by [`NameId`]; the cache is append-only
//! and its entries never move, and the encoder later emits one `Name` record
//! per cache entry in cache order, so `NameId` doubles as the on-wire name
//! id. Attribute string values are owned by their node.
//!
//! [`TreeBuilder`] is the event sink that grows a tree from decoder events.

use crate::xml::{Attribute, AttributeValue, XmlHandler};

// =============================================================================
// Name Cache
// =============================================================================

/// Index of an interned name. Matches the u16 name id of the wire format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameId(pub u16);

/// Append-only interning table for tag and attribute names.
///
/// Entries are deduplicated by equality and never reordered, so an id stays
/// valid for the life of the cache. Serialization emits the table in index
/// order, which is why repair code registers any name it introduces here
/// before the tree is written back.
#[derive(Debug, Default)]
pub struct NameCache {
    names: Vec<String>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, id: NameId) -> &str {
        &self.names[id.0 as usize]
    }

    /// Finds an already-interned name.
    pub fn lookup(&self, name: &str) -> Option<NameId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| NameId(index as u16))
    }

    /// Interns a name, returning the existing id when present.
    ///
    /// The wire format addresses names with a u16, so a cache can never
    /// legitimately outgrow `u16::MAX` entries.
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(id) = self.lookup(name) {
            return id;
        }

        let index = u16::try_from(self.names.len()).expect("name cache exceeds u16 id space");
        self.names.push(name.to_string());
        NameId(index)
    }

    /// All names in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

// =============================================================================
// Tree Nodes
// =============================================================================

/// Index of a node within a [`ProjectTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// One element of the generic project tree.
#[derive(Debug, Default)]
pub struct TreeNode {
    pub tag: NameId,
    /// Attributes in wire order.
    pub attributes: Vec<(NameId, AttributeValue)>,
    /// Children in document order.
    pub children: Vec<NodeId>,
    /// Character data, empty for most nodes.
    pub data: String,
    /// Index of this node within its parent's child list; 0 for the root.
    pub parent_index: usize,
}

impl TreeNode {
    /// Replaces an existing attribute or appends a new one.
    pub fn set_attribute(&mut self, name: NameId, value: AttributeValue) {
        for (existing, slot) in self.attributes.iter_mut() {
            if *existing == name {
                *slot = value;
                return;
            }
        }

        self.attributes.push((name, value));
    }

    /// Looks up an attribute value by interned name.
    pub fn attribute(&self, name: NameId) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(id, _)| *id == name)
            .map(|(_, value)| value)
    }
}

/// Arena of tree nodes plus the root reference.
#[derive(Debug, Default)]
pub struct ProjectTree {
    nodes: Vec<TreeNode>,
    root: Option<NodeId>,
}

impl ProjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }
}

// =============================================================================
// Tree Builder
// =============================================================================

/// Event sink that builds a [`ProjectTree`] from document events.
///
/// Maintains the parse stack; tag and attribute names are routed through the
/// reusable [`NameCache`]. The semantic parser wraps this builder and runs
/// its overlay stack on the same events.
#[derive(Default)]
pub struct TreeBuilder {
    tree: ProjectTree,
    names: NameCache,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &NameCache {
        &self.names
    }

    /// Starts a child element under the current stack top and returns it.
    pub fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> NodeId {
        let tag = self.names.intern(name);

        let mut node = TreeNode {
            tag,
            ..TreeNode::default()
        };

        for attr in attributes {
            let attr_name = self.names.intern(&attr.name);
            node.attributes.push((attr_name, attr.value.clone()));
        }

        let id = match self.stack.last().copied() {
            Some(parent) => {
                node.parent_index = self.tree.node(parent).children.len();
                let id = self.tree.push(node);
                self.tree.node_mut(parent).children.push(id);
                id
            }
            None => {
                let id = self.tree.push(node);
                self.tree.root = Some(id);
                id
            }
        };

        self.stack.push(id);
        id
    }

    pub fn end_element(&mut self) {
        self.stack.pop();
    }

    pub fn char_data(&mut self, data: &str) {
        if let Some(&current) = self.stack.last() {
            self.tree.node_mut(current).data = data.to_string();
        }
    }

    /// Consumes the builder, yielding the finished tree and its name cache.
    pub fn finish(self) -> (ProjectTree, NameCache) {
        (self.tree, self.names)
    }
}

impl XmlHandler for TreeBuilder {
    fn handle_tag_start(&mut self, name: &str, attributes: &[Attribute]) {
        self.start_element(name, attributes);
    }

    fn handle_tag_end(&mut self, _name: &str) {
        self.end_element();
    }

    fn handle_char_data(&mut self, data: &str) {
        self.char_data(data);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates_and_is_stable() {
        let mut names = NameCache::new();

        let a = names.intern("project");
        let b = names.intern("wavetrack");
        let a_again = names.intern("project");

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(names.len(), 2);
        assert_eq!(names.get(a), "project");
        assert_eq!(names.iter().collect::<Vec<_>>(), vec!["project", "wavetrack"]);
    }

    #[test]
    fn test_builder_creates_parent_child_links() {
        let mut builder = TreeBuilder::new();

        builder.handle_tag_start("project", &[]);
        builder.handle_tag_start("wavetrack", &[]);
        builder.handle_tag_end("wavetrack");
        builder.handle_tag_start("tags", &[]);
        builder.handle_tag_end("tags");
        builder.handle_tag_end("project");

        let (tree, names) = builder.finish();
        let root = tree.root().expect("root");
        let root_node = tree.node(root);

        assert_eq!(names.get(root_node.tag), "project");
        assert_eq!(root_node.children.len(), 2);

        // parent.children[child.parent_index] == child
        for (index, &child) in root_node.children.iter().enumerate() {
            assert_eq!(tree.node(child).parent_index, index);
        }
    }

    #[test]
    fn test_builder_copies_attributes_in_order() {
        let mut builder = TreeBuilder::new();
        let attrs = vec![
            Attribute::new("rate", AttributeValue::Int(44100)),
            Attribute::new("name", AttributeValue::Str("lead".to_string())),
        ];

        builder.handle_tag_start("wavetrack", &attrs);
        builder.handle_tag_end("wavetrack");

        let (tree, names) = builder.finish();
        let node = tree.node(tree.root().unwrap());

        let wire_names: Vec<&str> = node
            .attributes
            .iter()
            .map(|(id, _)| names.get(*id))
            .collect();
        assert_eq!(wire_names, vec!["rate", "name"]);
        assert_eq!(node.attributes[0].1, AttributeValue::Int(44100));
    }

    #[test]
    fn test_char_data_lands_on_current_node() {
        let mut builder = TreeBuilder::new();
        builder.handle_tag_start("project", &[]);
        builder.handle_tag_start("tag", &[]);
        builder.handle_char_data("hello");
        builder.handle_tag_end("tag");
        builder.handle_tag_end("project");

        let (tree, _) = builder.finish();
        let root = tree.node(tree.root().unwrap());
        let child = tree.node(root.children[0]);

        assert_eq!(child.data, "hello");
        assert_eq!(root.data, "");
    }

    #[test]
    fn test_set_attribute_replaces_then_appends() {
        let mut builder = TreeBuilder::new();
        builder.handle_tag_start(
            "waveblock",
            &[Attribute::new("blockid", AttributeValue::LongLong(42))],
        );
        builder.handle_tag_end("waveblock");

        let (mut tree, mut names) = builder.finish();
        let root = tree.root().unwrap();

        let blockid = names.intern("blockid");
        let badblock = names.intern("badblock");

        let node = tree.node_mut(root);
        node.set_attribute(blockid, AttributeValue::LongLong(-1000));
        node.set_attribute(badblock, AttributeValue::Bool(true));

        assert_eq!(node.attributes.len(), 2);
        assert_eq!(
            node.attribute(blockid),
            Some(&AttributeValue::LongLong(-1000))
        );
        assert_eq!(node.attribute(badblock), Some(&AttributeValue::Bool(true)));
    }
}
