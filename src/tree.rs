//! Hierarchical view of a listing
//!
//! Entries are stored once in listing order; the tree is an arena of nodes
//! keyed by FileName segments, with intermediate directories synthesized
//! for archives that only list files.

use std::collections::HashMap;

use crate::entry::ArchiveEntry;
use crate::safety::sanitize_entry_path;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    /// FileName of the node, `/` separated
    pub path: String,
    pub is_dir: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Index into the entry list; `None` for synthesized directories
    entry: Option<usize>,
}

impl TreeNode {
    pub fn is_synthesized(&self) -> bool {
        self.entry.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveTree {
    entries: Vec<ArchiveEntry>,
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
    by_path: HashMap<String, NodeId>,
    by_id: HashMap<String, usize>,
}

impl ArchiveTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ArchiveEntry>) -> Self {
        let mut tree = Self::new();
        for entry in entries {
            tree.insert(entry);
        }
        tree
    }

    fn insert(&mut self, entry: ArchiveEntry) {
        let index = match self.by_id.get(&entry.internal_id) {
            Some(&i) => {
                if self.entries[i].full_path != entry.full_path {
                    self.release(i);
                }
                self.entries[i] = entry;
                i
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        self.by_id
            .insert(self.entries[index].internal_id.clone(), index);

        let segments: Vec<String> = self.entries[index]
            .segments()
            .map(str::to_string)
            .collect();
        let is_dir = self.entries[index].is_dir;

        let mut parent: Option<NodeId> = None;
        let mut path = String::new();
        for (depth, segment) in segments.iter().enumerate() {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
            let last = depth + 1 == segments.len();

            let node = match self.by_path.get(&path) {
                Some(&node) => node,
                None => self.add_node(segment, &path, parent),
            };
            if last {
                // A later entry with the same FileName takes the node over
                self.nodes[node].entry = Some(index);
                self.nodes[node].is_dir |= is_dir;
            } else {
                self.nodes[node].is_dir = true;
            }
            parent = Some(node);
        }
    }

    /// Unbind entry `index` from the node showing it. A leaf left without
    /// an entry is unlinked from the tree; its arena slot stays unused.
    fn release(&mut self, index: usize) {
        let Some(node) = self.nodes.iter().position(|n| n.entry == Some(index)) else {
            return;
        };
        self.nodes[node].entry = None;
        if !self.nodes[node].children.is_empty() {
            return;
        }
        match self.nodes[node].parent {
            Some(p) => self.nodes[p].children.retain(|&c| c != node),
            None => self.roots.retain(|&r| r != node),
        }
        let path = self.nodes[node].path.clone();
        self.by_path.remove(&path);
    }

    fn add_node(&mut self, name: &str, path: &str, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            name: name.to_string(),
            path: path.to_string(),
            is_dir: false,
            parent,
            children: Vec::new(),
            entry: None,
        });
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        self.by_path.insert(path.to_string(), id);
        id
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in listing order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Entry addressed by the exact name the tool printed.
    pub fn lookup(&self, internal_id: &str) -> Option<&ArchiveEntry> {
        self.by_id.get(internal_id).map(|&i| &self.entries[i])
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn node_at(&self, path: &str) -> Option<&TreeNode> {
        let clean = sanitize_entry_path(path)?;
        self.by_path.get(&clean).map(|&id| &self.nodes[id])
    }

    /// Entry shown at `path`; `None` for synthesized directories.
    pub fn entry_at(&self, path: &str) -> Option<&ArchiveEntry> {
        self.node_at(path)
            .and_then(|node| node.entry)
            .map(|i| &self.entries[i])
    }

    pub fn entry_of(&self, node: &TreeNode) -> Option<&ArchiveEntry> {
        node.entry.map(|i| &self.entries[i])
    }

    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> {
        self.roots.iter().map(|&id| &self.nodes[id])
    }

    /// Children of the directory at `path`; the empty path is the root.
    pub fn children(&self, path: &str) -> Vec<&TreeNode> {
        if sanitize_entry_path(path).is_none() {
            return self.roots().collect();
        }
        self.node_at(path)
            .map(|node| node.children.iter().map(|&id| &self.nodes[id]).collect())
            .unwrap_or_default()
    }

    /// Internal ids of every real entry at or below `path`.
    pub fn ids_under(&self, path: &str) -> Vec<String> {
        let Some(start) = self.node_at(path) else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if let Some(entry) = self.entry_of(node) {
                ids.push(entry.internal_id.clone());
            }
            stack.extend(node.children.iter().rev().map(|&id| &self.nodes[id]));
        }
        ids
    }

    /// True when everything sits below one top-level directory.
    pub fn is_single_folder(&self) -> bool {
        self.single_folder().is_some()
    }

    pub fn single_folder(&self) -> Option<&str> {
        match self.roots.as_slice() {
            [only] if self.nodes[*only].is_dir => Some(&self.nodes[*only].name),
            _ => None,
        }
    }
}
