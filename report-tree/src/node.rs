// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identities of nodes in the execution tree.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// The unique identity of a node in the execution tree.
///
/// Ids are issued by the test runner and have the structured form
/// `[kind:value]/[kind:value]/...`, for example
/// `[engine:junit-jupiter]/[class:com.example.FooTest]/[method:bar()]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestNodeId(SmolStr);

impl TestNodeId {
    /// Creates a new id from its string form.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    /// Returns the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the segments that make up this id, outermost first.
    ///
    /// An id that isn't in bracketed form is returned as a single segment with an empty kind.
    pub fn segments(&self) -> impl Iterator<Item = IdSegment<'_>> + '_ {
        let bracketed = self
            .0
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'));
        let (parts, bracketed) = match bracketed {
            Some(inner) => (inner, true),
            None => (self.0.as_str(), false),
        };

        parts.split("]/[").map(move |part| {
            if bracketed {
                if let Some((kind, value)) = part.split_once(':') {
                    return IdSegment { kind, value };
                }
            }
            IdSegment {
                kind: "",
                value: part,
            }
        })
    }

    /// Returns the value of the first segment of this id.
    ///
    /// For a root node this is the name of the engine that produced it, and is what report files
    /// are named after.
    pub fn root_segment_value(&self) -> &str {
        self.segments()
            .next()
            .map(|segment| segment.value)
            .unwrap_or_default()
    }
}

impl fmt::Display for TestNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestNodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TestNodeId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// One `[kind:value]` segment of a [`TestNodeId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdSegment<'a> {
    /// The segment kind, e.g. `engine` or `class`.
    pub kind: &'a str,

    /// The segment value.
    pub value: &'a str,
}

/// What a node in the execution tree represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// A node that only groups other nodes.
    Container,

    /// A node that is executed as a test.
    Test,

    /// A node that is executed as a test and also has children, e.g. a parameterized test.
    ContainerAndTest,
}

impl NodeKind {
    /// Returns true if nodes of this kind are reported as test cases.
    pub fn is_test(self) -> bool {
        matches!(self, NodeKind::Test | NodeKind::ContainerAndTest)
    }
}

/// A node in the execution tree: a test, a container, or a root.
///
/// Nodes are immutable once issued by the runner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestNode {
    id: TestNodeId,
    #[serde(default)]
    parent: Option<TestNodeId>,
    display_name: String,
    #[serde(default)]
    legacy_reporting_name: Option<String>,
    kind: NodeKind,
}

impl TestNode {
    /// Creates a new root node.
    pub fn root(id: impl Into<TestNodeId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            display_name: display_name.into(),
            legacy_reporting_name: None,
            kind: NodeKind::Container,
        }
    }

    /// Creates a new node with the given parent.
    pub fn child(
        id: impl Into<TestNodeId>,
        parent: impl Into<TestNodeId>,
        display_name: impl Into<String>,
        kind: NodeKind,
    ) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
            display_name: display_name.into(),
            legacy_reporting_name: None,
            kind,
        }
    }

    /// Sets the name used for this node in legacy reports.
    pub fn with_legacy_reporting_name(mut self, name: impl Into<String>) -> Self {
        self.legacy_reporting_name = Some(name.into());
        self
    }

    /// Returns the id of this node.
    pub fn id(&self) -> &TestNodeId {
        &self.id
    }

    /// Returns the id of this node's parent, or `None` for a root.
    pub fn parent_id(&self) -> Option<&TestNodeId> {
        self.parent.as_ref()
    }

    /// Returns true if this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns the human-readable name of this node.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the name used for this node in legacy reports, falling back to the display name.
    pub fn legacy_reporting_name(&self) -> &str {
        self.legacy_reporting_name
            .as_deref()
            .unwrap_or(&self.display_name)
    }

    /// Returns what this node represents.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}
