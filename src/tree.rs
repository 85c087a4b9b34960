//! Collapsing a dependency graph into a single-rooted tree.
//!
//! Build pipelines are DAGs: a build may depend on several others and many
//! builds may depend on the same one. A hierarchical layout needs a tree, so
//! every snapshot is folded into one with a breadth-first walk over the
//! *dependent* edges, starting at the configured root.
//!
//! ## Ownership
//!
//! The [`Tree`] owns every [`TreeNode`] in a flat arena. Children are stored
//! as ordered [`TreeIx`] lists and the parent link is a plain index into the
//! same arena, so there is no reverse ownership edge and no reference cycle.
//! A fresh tree is built for each snapshot; state that must outlive a rebuild
//! is keyed by [`NodeId`] elsewhere.
//!
//! ## Re-parenting
//!
//! When the walk reaches a node that was already claimed, the node moves
//! under the current parent unless its existing parent is deeper than the
//! current one, so the last discoverer in breadth-first order wins. Since the
//! queue is drained in breadth-first order this never moves a node closer to
//! the root. Moves that would put a node under itself or one of its
//! descendants are ignored, and a moved node drags its subtree along so
//! depths stay consistent.

use std::collections::{HashMap, VecDeque};
use std::ops::Index;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex as GraphIx};

use crate::error::SnapshotError;
use crate::index::NodeIndex;
use crate::record::{NodeId, NodeRecord};
use crate::status::{Status, classify};

/// Position of a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeIx(usize);

impl TreeIx {
    pub const ROOT: TreeIx = TreeIx(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub record: NodeRecord,
    /// Distance from the root, the root itself is at depth 0.
    pub depth: usize,
    /// Non-owning link to the parent, `None` only for the root.
    pub parent: Option<TreeIx>,
    pub children: Vec<TreeIx>,
    pub status: Status,
    pub status_text: String,
}

impl TreeNode {
    fn new(record: NodeRecord, depth: usize, parent: Option<TreeIx>) -> Self {
        Self {
            status_text: record.status_text.clone(),
            record,
            depth,
            parent,
            children: Vec::new(),
            status: Status::Succeeded,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Single-rooted tree derived from one snapshot.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    slots: HashMap<NodeId, TreeIx>,
}

impl Tree {
    /// Fold `records` into a tree rooted at `root_id`.
    ///
    /// Records that are not reachable from the root through dependent edges
    /// are left out. Dependencies on ids that are missing from the snapshot
    /// are ignored.
    pub fn build(records: &[NodeRecord], root_id: &NodeId) -> Result<Tree, SnapshotError> {
        let index = NodeIndex::build(records)?;
        let root = index
            .position(root_id)
            .ok_or_else(|| SnapshotError::RootNotFound(root_id.clone()))?;

        let graph = dependency_graph(&index);

        let mut tree = Tree::with_root(records[root].clone());
        let mut claimed: Vec<Option<TreeIx>> = vec![None; records.len()];
        claimed[root] = Some(TreeIx::ROOT);

        let mut queue = VecDeque::from([(TreeIx::ROOT, root)]);

        while let Some((current, position)) = queue.pop_front() {
            tree.classify(current);

            for dependent in dependents(&graph, position) {
                match claimed[dependent] {
                    None => {
                        let child = tree.attach(current, records[dependent].clone());
                        claimed[dependent] = Some(child);
                        queue.push_back((child, dependent));
                    }
                    Some(child) => tree.claim(child, current),
                }
            }
        }

        let omitted = records.len() - tree.len();
        if omitted > 0 {
            tracing::debug!(root = %root_id, omitted, "records unreachable from root");
        }

        Ok(tree)
    }

    fn with_root(record: NodeRecord) -> Self {
        let mut slots = HashMap::new();
        slots.insert(record.id.clone(), TreeIx::ROOT);

        Self {
            nodes: vec![TreeNode::new(record, 0, None)],
            slots,
        }
    }

    fn classify(&mut self, ix: TreeIx) {
        let node = &mut self.nodes[ix.0];
        let classification = classify(&node.record);
        node.status = classification.status;
        node.status_text = classification.status_text;
    }

    fn attach(&mut self, parent: TreeIx, record: NodeRecord) -> TreeIx {
        let ix = TreeIx(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;

        self.slots.insert(record.id.clone(), ix);
        self.nodes.push(TreeNode::new(record, depth, Some(parent)));
        self.nodes[parent.0].children.push(ix);

        ix
    }

    /// `current` has discovered an already claimed `child`.
    fn claim(&mut self, child: TreeIx, current: TreeIx) {
        // The root never gets a parent.
        let Some(parent) = self.nodes[child.0].parent else {
            return;
        };

        if self.nodes[parent.0].depth > self.nodes[current.0].depth {
            return;
        }

        if self.is_ancestor_or_self(child, current) {
            tracing::trace!(
                node = %self.nodes[child.0].id(),
                parent = %self.nodes[current.0].id(),
                "ignoring cyclic dependency"
            );
            return;
        }

        self.nodes[parent.0].children.retain(|&ix| ix != child);
        self.nodes[current.0].children.push(child);
        self.nodes[child.0].parent = Some(current);

        let depth = self.nodes[current.0].depth + 1;
        self.shift_depths(child, depth);
    }

    fn is_ancestor_or_self(&self, ancestor: TreeIx, node: TreeIx) -> bool {
        let mut cursor = Some(node);
        while let Some(ix) = cursor {
            if ix == ancestor {
                return true;
            }
            cursor = self.nodes[ix.0].parent;
        }
        false
    }

    fn shift_depths(&mut self, ix: TreeIx, depth: usize) {
        let mut stack = vec![(ix, depth)];
        while let Some((ix, depth)) = stack.pop() {
            let node = &mut self.nodes[ix.0];
            node.depth = depth;
            stack.extend(node.children.iter().map(|&child| (child, depth + 1)));
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[TreeIx::ROOT.0]
    }

    pub fn get(&self, ix: TreeIx) -> Option<&TreeNode> {
        self.nodes.get(ix.0)
    }

    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        self.slots.get(id).map(|ix| &self.nodes[ix.0])
    }

    pub fn position(&self, id: &NodeId) -> Option<TreeIx> {
        self.slots.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn parent(&self, ix: TreeIx) -> Option<&TreeNode> {
        self.nodes[ix.0].parent.map(|parent| &self.nodes[parent.0])
    }

    pub fn children(&self, ix: TreeIx) -> impl Iterator<Item = &TreeNode> {
        self.nodes[ix.0]
            .children
            .iter()
            .map(|child| &self.nodes[child.0])
    }

    /// Nodes in the order they were discovered.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(TreeNode::id)
    }

    /// Depth-first pre-order walk from the root, children in order.
    pub fn preorder(&self) -> Vec<TreeIx> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![TreeIx::ROOT];

        while let Some(ix) = stack.pop() {
            order.push(ix);
            stack.extend(self.nodes[ix.0].children.iter().rev().copied());
        }

        order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Index<TreeIx> for Tree {
    type Output = TreeNode;

    fn index(&self, ix: TreeIx) -> &Self::Output {
        &self.nodes[ix.0]
    }
}

/// Graph of the snapshot with edges pointing from a dependency to its
/// dependents. Node `i` is the record at position `i`.
fn dependency_graph(index: &NodeIndex<'_>) -> DiGraph<(), ()> {
    let records = index.records();
    let mut graph = DiGraph::with_capacity(records.len(), records.len());

    for _ in records {
        graph.add_node(());
    }

    for (position, record) in records.iter().enumerate() {
        for dependency in &record.dependency_ids {
            match index.position(dependency) {
                Some(source) => {
                    graph.update_edge(GraphIx::new(source), GraphIx::new(position), ());
                }
                None => tracing::trace!(
                    node = %record.id,
                    %dependency,
                    "ignoring dependency missing from snapshot"
                ),
            }
        }
    }

    graph
}

/// Dependents of the record at `position`, in snapshot order.
fn dependents(graph: &DiGraph<(), ()>, position: usize) -> Vec<usize> {
    let mut dependents: Vec<_> = graph
        .neighbors_directed(GraphIx::new(position), Direction::Outgoing)
        .map(|ix| ix.index())
        .collect();

    dependents.sort_unstable();
    dependents
}
