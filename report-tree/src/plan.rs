// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The execution tree issued by the runner, and the parent-lookup capability derived from it.

use crate::node::{TestNode, TestNodeId};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::{collections::HashMap, fmt};
use tracing::debug;

/// Resolves the parent of a node.
///
/// This is the only view of the tree that the [`ResultStore`](crate::store::ResultStore) needs.
/// Returning `None` means the node is a root, or that the node is unknown; either way, an
/// ancestor walk stops there.
pub trait ParentLookup: Send + Sync {
    /// Returns the parent of `node`, if any.
    fn parent_of(&self, node: &TestNodeId) -> Option<TestNodeId>;
}

impl<F> ParentLookup for F
where
    F: Fn(&TestNodeId) -> Option<TestNodeId> + Send + Sync,
{
    fn parent_of(&self, node: &TestNodeId) -> Option<TestNodeId> {
        (self)(node)
    }
}

/// The tree of nodes making up one execution.
///
/// Nodes may be registered while execution is in progress (for example, dynamically generated
/// tests), so all operations take `&self` and are safe to call from multiple threads.
#[derive(Default)]
pub struct TestPlan {
    inner: RwLock<PlanInner>,
}

#[derive(Default)]
struct PlanInner {
    nodes: IndexMap<TestNodeId, TestNode>,
    children: HashMap<TestNodeId, Vec<TestNodeId>>,
    roots: Vec<TestNodeId>,
}

impl TestPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a plan from nodes, in registration order.
    pub fn from_nodes(nodes: impl IntoIterator<Item = TestNode>) -> Self {
        let plan = Self::new();
        for node in nodes {
            plan.add(node);
        }
        plan
    }

    /// Registers a node.
    ///
    /// Registering an id that already exists replaces the node's data but keeps its position.
    pub fn add(&self, node: TestNode) {
        let mut inner = self.inner.write();
        let id = node.id().clone();
        let parent = node.parent_id().cloned();

        if let Some(old) = inner.nodes.insert(id.clone(), node) {
            debug!("test node `{id}` registered twice, replacing it");
            // Unlink from wherever the old registration put it.
            match old.parent_id() {
                Some(old_parent) => {
                    if let Some(siblings) = inner.children.get_mut(old_parent) {
                        siblings.retain(|sibling| sibling != &id);
                    }
                }
                None => inner.roots.retain(|root| root != &id),
            }
        }

        match parent {
            Some(parent) => inner.children.entry(parent).or_default().push(id),
            None => inner.roots.push(id),
        }
    }

    /// Returns the node with the given id.
    pub fn get(&self, id: &TestNodeId) -> Option<TestNode> {
        self.inner.read().nodes.get(id).cloned()
    }

    /// Returns true if a node with the given id is registered.
    pub fn contains(&self, id: &TestNodeId) -> bool {
        self.inner.read().nodes.contains_key(id)
    }

    /// Returns the number of registered nodes.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Returns true if no nodes are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the root nodes, in registration order.
    pub fn roots(&self) -> Vec<TestNode> {
        let inner = self.inner.read();
        inner
            .roots
            .iter()
            .filter_map(|id| inner.nodes.get(id).cloned())
            .collect()
    }

    /// Returns the direct children of a node, in registration order.
    pub fn children(&self, id: &TestNodeId) -> Vec<TestNode> {
        let inner = self.inner.read();
        inner
            .children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| inner.nodes.get(child).cloned())
            .collect()
    }

    /// Returns all descendants of a node (not including the node itself), depth-first.
    pub fn descendants(&self, id: &TestNodeId) -> Vec<TestNode> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        let mut stack: Vec<&TestNodeId> = inner
            .children
            .get(id)
            .into_iter()
            .flatten()
            .rev()
            .collect();

        while let Some(next) = stack.pop() {
            if let Some(node) = inner.nodes.get(next) {
                out.push(node.clone());
            }
            if let Some(children) = inner.children.get(next) {
                stack.extend(children.iter().rev());
            }
        }

        out
    }
}

impl ParentLookup for TestPlan {
    fn parent_of(&self, node: &TestNodeId) -> Option<TestNodeId> {
        self.inner
            .read()
            .nodes
            .get(node)
            .and_then(|node| node.parent_id().cloned())
    }
}

impl fmt::Debug for TestPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TestPlan")
            .field("nodes", &inner.nodes.len())
            .field("roots", &inner.roots)
            .finish()
    }
}
