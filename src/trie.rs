//! Build-time prefix tree over UTF-16 code units.
//!
//! Nodes live in one arena and refer to each other by [`NodeId`]. Every key is
//! stored with a trailing [`SENTINEL`], and only the sentinel leaf at the end
//! of a key carries a terminal index. The trie is dropped once the double
//! array has been laid out.
use crate::codes::SENTINEL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    unit: u16,
    terminal: Option<u32>,
    /// Children in first-insertion order.
    children: Vec<(u16, NodeId)>,
}

impl Node {
    fn new(unit: u16) -> Self {
        Node {
            unit,
            terminal: None,
            children: Vec::new(),
        }
    }

    /// Code unit on the edge leading into this node.
    pub fn unit(&self) -> u16 {
        self.unit
    }

    pub fn terminal(&self) -> Option<u32> {
        self.terminal
    }

    pub fn children(&self) -> &[(u16, NodeId)] {
        &self.children
    }

    fn child(&self, unit: u16) -> Option<NodeId> {
        self.children
            .iter()
            .find(|&&(u, _)| u == unit)
            .map(|&(_, id)| id)
    }
}

#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<Node>,
    count: u32,
}

impl Default for Trie {
    fn default() -> Self {
        Trie {
            nodes: vec![Node::new(SENTINEL)],
            count: 0,
        }
    }
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` and returns its terminal index. Re-inserting a key
    /// returns the index it was first given.
    pub fn add(&mut self, key: &str) -> u32 {
        let mut cur = NodeId::ROOT;
        for unit in key.encode_utf16().chain(std::iter::once(SENTINEL)) {
            cur = match self.nodes[cur.index()].child(unit) {
                Some(next) => next,
                None => {
                    let next = NodeId(self.nodes.len() as u32);
                    self.nodes.push(Node::new(unit));
                    self.nodes[cur.index()].children.push((unit, next));
                    next
                }
            };
        }
        let node = &mut self.nodes[cur.index()];
        match node.terminal {
            Some(index) => index,
            None => {
                let index = self.count;
                node.terminal = Some(index);
                self.count += 1;
                index
            }
        }
    }

    pub fn find(&self, key: &str) -> Option<u32> {
        let mut cur = NodeId::ROOT;
        for unit in key.encode_utf16().chain(std::iter::once(SENTINEL)) {
            cur = self.nodes[cur.index()].child(unit)?;
        }
        self.nodes[cur.index()].terminal
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Depth-first pre-order walk from the root.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            trie: self,
            stack: vec![NodeId::ROOT],
        }
    }
}

/// Explicit-stack pre-order iterator, so deep keys cannot overflow the call
/// stack.
pub struct Preorder<'a> {
    trie: &'a Trie,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.trie.node(id);
        // reversed so the first-inserted child is visited first
        self.stack
            .extend(node.children.iter().rev().map(|&(_, child)| child));
        Some((id, node))
    }
}
