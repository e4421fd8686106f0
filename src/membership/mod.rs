//! Membership data model
//!
//! This module defines the identifiers and sets the reconciler works with:
//!
//! - [`NodeId`] - opaque identifier of a peer process (`name@address`)
//! - [`MembershipSet`] - the set of peers this process believes it is connected to
//! - [`Delta`] - peers to add and remove to converge toward the discovered set
//! - [`ApplyOutcome`] - per-node result of asking the driver to apply one side of a delta
//!
//! The driver interface that actually connects and disconnects peers lives in
//! [`driver`].

pub mod driver;

use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

pub use driver::{InMemoryDriver, MembershipDriver};

// ============================================================================
// Node Identifier
// ============================================================================

/// Unique identifier of a peer process
///
/// Identifiers are derived from registry discovery responses as
/// `basename@address`. Equality is the only operation the reconciler relies on;
/// ordering exists so sets iterate deterministically in logs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an already formatted identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an identifier from a node basename and a registry address
    pub fn from_parts(basename: &str, address: &str) -> Self {
        Self(format!("{basename}@{address}"))
    }

    /// Borrow the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address part of the identifier, if it has one
    pub fn address(&self) -> Option<&str> {
        self.0.split_once('@').map(|(_, addr)| addr)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Membership Set
// ============================================================================

/// Set of peers, without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSet(BTreeSet<NodeId>);

impl MembershipSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning `true` if it was not already present
    pub fn insert(&mut self, node: NodeId) -> bool {
        self.0.insert(node)
    }

    /// Remove a node, returning `true` if it was present
    pub fn remove(&mut self, node: &NodeId) -> bool {
        self.0.remove(node)
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.0.contains(node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, NodeId> {
        self.0.iter()
    }

    /// Nodes in `self` that are not in `other`
    pub fn difference(&self, other: &MembershipSet) -> MembershipSet {
        self.0.difference(&other.0).cloned().collect()
    }

    /// Delta that takes `self` (tracked) to `discovered`
    pub fn delta(&self, discovered: &MembershipSet) -> Delta {
        Delta::between(self, discovered)
    }
}

impl FromIterator<NodeId> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MembershipSet {
    type Item = NodeId;
    type IntoIter = btree_set::IntoIter<NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MembershipSet {
    type Item = &'a NodeId;
    type IntoIter = btree_set::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<NodeId> for MembershipSet {
    fn extend<I: IntoIterator<Item = NodeId>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl fmt::Display for MembershipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{node}")?;
        }
        f.write_str("}")
    }
}

// ============================================================================
// Delta
// ============================================================================

/// Changes needed to converge the tracked set toward a discovered set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Discovered but not tracked
    pub to_add: MembershipSet,

    /// Tracked but no longer discovered
    pub to_remove: MembershipSet,
}

impl Delta {
    /// Plain set difference in both directions
    pub fn between(tracked: &MembershipSet, discovered: &MembershipSet) -> Self {
        Self {
            to_add: discovered.difference(tracked),
            to_remove: tracked.difference(discovered),
        }
    }

    /// True when tracked and discovered already agree
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

// ============================================================================
// Apply Outcome
// ============================================================================

/// A node the driver could not connect or disconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub node: NodeId,
    pub reason: String,
}

impl ApplyFailure {
    pub fn new(node: NodeId, reason: impl Into<String>) -> Self {
        Self {
            node,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.reason)
    }
}

/// Result of applying one side of a [`Delta`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every requested node was applied
    Complete,

    /// Some nodes could not be applied
    Partial(Vec<ApplyFailure>),
}

impl ApplyOutcome {
    pub fn complete() -> Self {
        Self::Complete
    }

    /// Collapse an empty failure list into [`ApplyOutcome::Complete`]
    pub fn from_failures(failures: Vec<ApplyFailure>) -> Self {
        if failures.is_empty() {
            Self::complete()
        } else {
            Self::Partial(failures)
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn failures(&self) -> &[ApplyFailure] {
        match self {
            Self::Complete => &[],
            Self::Partial(failures) => failures,
        }
    }

    pub fn into_failures(self) -> Vec<ApplyFailure> {
        match self {
            Self::Complete => Vec::new(),
            Self::Partial(failures) => failures,
        }
    }
}
