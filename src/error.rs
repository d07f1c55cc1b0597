//! Filepath: src/error.rs
//!
//! Typed operation outcomes.
//!
//! The collections never panic and never throw: every failure is a value.
//! Expected absence (a missing key, an out-of-range index on a read) is
//! `Ok(None)`, not an error. The error types here cover the cases a caller
//! must react to:
//!
//! - [`OpError`]: failures of operations that do not consume a node.
//! - [`Rejected`]: a node-consuming operation that could not complete;
//!   the node comes back so nothing is lost.
//! - [`AuditError`]: a structural invariant violation found by `validate`.
//!
//! Lock poisoning deserves a note: each collection is guarded by one
//! `std::sync::Mutex`, and a panic while the lock is held poisons it
//! permanently. That sticky bit is surfaced as `LockPoisoned` from every
//! subsequent operation (and via `is_poisoned()`), and means the structure's
//! consistency is no longer guaranteed; stop using the collection.

use std::fmt;

use crate::key::NodeKey;
use crate::node::Node;

// ============================================================================
//  OpError
// ============================================================================

/// Failure of an operation that does not take ownership of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpError {
    /// The collection's mutex is poisoned; its state is uncertain.
    LockPoisoned,

    /// A tree descent ran past the height budget before completing.
    /// The tree was not modified. Recoverable: rebuild the contents into a
    /// tree instantiated with a larger `MAX_HEIGHT`.
    HeightExceeded,
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockPoisoned => write!(f, "collection lock poisoned; state uncertain"),
            Self::HeightExceeded => write!(f, "tree descent exceeded the height budget"),
        }
    }
}

impl std::error::Error for OpError {}

// ============================================================================
//  Rejected
// ============================================================================

/// Why a node-consuming operation handed its node back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The collection's mutex is poisoned; nothing was touched.
    LockPoisoned,

    /// A node with this key already occupies the key-ordered list.
    DuplicateKey,

    /// The index does not resolve to a member (including an empty list;
    /// first elements go in through `append`).
    OutOfBounds,

    /// No member with this key exists, so there is nothing to replace.
    KeyNotFound,

    /// The tree descent ran past the height budget before completing.
    HeightExceeded,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockPoisoned => write!(f, "collection lock poisoned"),
            Self::DuplicateKey => write!(f, "key already present"),
            Self::OutOfBounds => write!(f, "index out of bounds"),
            Self::KeyNotFound => write!(f, "no member with this key"),
            Self::HeightExceeded => write!(f, "tree height budget exceeded"),
        }
    }
}

/// A node handed back by an operation that could not complete.
///
/// Follows the recoverable-rejection pattern: the caller keeps ownership of
/// the data it tried to insert and can retry, repair, or unwrap it.
///
/// ```rust
/// use keynode::{Node, NodeList, RejectReason};
///
/// let list: NodeList<&str> = NodeList::new();
/// list.insert(Node::new(5, "first")).unwrap();
///
/// let rejected = list.insert(Node::new(5, "second")).unwrap_err();
/// assert_eq!(rejected.reason, RejectReason::DuplicateKey);
/// assert_eq!(*rejected.node.value(), "second");
/// ```
#[derive(Debug)]
pub struct Rejected<V> {
    /// The node that was not consumed.
    pub node: Node<V>,
    /// Why the operation could not complete.
    pub reason: RejectReason,
}

impl<V> Rejected<V> {
    pub(crate) const fn new(node: Node<V>, reason: RejectReason) -> Self {
        Self { node, reason }
    }

    /// Discard the node and keep only the reason.
    pub fn into_reason(self) -> RejectReason {
        self.reason
    }
}

impl<V> fmt::Display for Rejected<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node rejected: {}", self.reason)
    }
}

impl<V: fmt::Debug> std::error::Error for Rejected<V> {}

// ============================================================================
//  AuditError
// ============================================================================

/// The first invariant violation found by a structural audit.
///
/// Returned by `NodeList::validate` and `NodeTree::validate`. A healthy
/// collection never produces one of these; they exist so tests (and callers
/// that suspect corruption after a poisoning event) can check the structure
/// by explicit traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditError {
    /// The collection's mutex is poisoned; the audit cannot run.
    LockPoisoned,

    /// Forward and backward links disagree at this list position.
    BrokenLink(usize),

    /// The number of reachable entries differs from the stored count.
    CountMismatch {
        /// The stored count.
        expected: usize,
        /// The number of entries actually reachable.
        actual: usize,
    },

    /// The middle pointer is not at position `(len - 1) / 2`.
    MiddleMisplaced {
        /// Where the middle should be.
        expected: usize,
        /// Where it was found.
        actual: usize,
    },

    /// A tree entry's key violates the search order.
    OrderViolation(NodeKey),

    /// The tree root is red.
    RootNotBlack,

    /// A red tree entry has a red child; the entry's key is reported.
    RedViolation(NodeKey),

    /// Two root-to-nil paths carry different numbers of black entries.
    BlackHeightMismatch,
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockPoisoned => write!(f, "collection lock poisoned"),
            Self::BrokenLink(pos) => write!(f, "broken link at position {pos}"),
            Self::CountMismatch { expected, actual } => {
                write!(f, "count mismatch: stored {expected}, reachable {actual}")
            }
            Self::MiddleMisplaced { expected, actual } => {
                write!(f, "middle at position {actual}, expected {expected}")
            }
            Self::OrderViolation(key) => write!(f, "search order violated at key {key}"),
            Self::RootNotBlack => write!(f, "tree root is red"),
            Self::RedViolation(key) => write!(f, "red entry with red child at key {key}"),
            Self::BlackHeightMismatch => write!(f, "unequal black-heights"),
        }
    }
}

impl std::error::Error for AuditError {}
