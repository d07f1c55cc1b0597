//! Filepath: src/tree.rs
//!
//! `NodeTree<V>`: a coarse-locked red-black binary search tree of
//! [`Node`]s keyed by [`NodeKey`].
//!
//! The tree is stored in an internal arena (index links, free-list slot
//! reuse) and guarded as a whole by a single mutex. Search, insert, and
//! delete are iterative: descents record the traversed path in fixed
//! arrays of `MAX_HEIGHT` entries, and the rebalancing passes walk that
//! recorded path back up. Exhausting the path budget is a defined,
//! recoverable error ([`OpError::HeightExceeded`]) raised before the tree
//! is touched, never undefined behavior.
//!
//! # Height budget
//!
//! `MAX_HEIGHT` defaults to [`DEFAULT_MAX_HEIGHT`] (48). A red-black tree
//! of height `h` holds at least `2^(h/2) - 1` members, so the default
//! budget cannot be exhausted below several million entries; tighter
//! budgets can be chosen per instance (`NodeTree<V, 12>`) where memory for
//! the path arrays matters, and the budget must be at least 8.
//!
//! # Duplicate keys
//!
//! Inserting a key that is already present does **not** replace and is not
//! an error: the occupant stays, and the caller's node comes back as
//! [`Insert::Occupied`]. This deliberately differs from the key-ordered
//! list, where a duplicate insert is a rejection; use
//! [`replace`](NodeTree::replace) to swap a node in.

use std::cmp::Ordering;
use std::mem;
use std::sync::Mutex;

use crate::error::{AuditError, OpError, RejectReason, Rejected};
use crate::key::NodeKey;
use crate::node::Node;
use crate::tracing_helpers::{debug_log, trace_log};

/// Sentinel index: "no entry". Nil children are black.
const NIL: usize = usize::MAX;

/// Default path budget: covers any red-black tree below ~2^23 members.
pub const DEFAULT_MAX_HEIGHT: usize = 48;

// ============================================================================
//  Arena
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

/// A tree entry: the node, two child links, and its color.
#[derive(Debug)]
struct TreeEntry<V> {
    node: Node<V>,
    /// `child[0]` = left, `child[1]` = right.
    child: [usize; 2],
    color: Color,
}

#[derive(Debug)]
enum TreeSlot<V> {
    Vacant { next_free: usize },
    Occupied(TreeEntry<V>),
}

#[derive(Debug)]
struct TreeCore<V> {
    slots: Vec<TreeSlot<V>>,
    free: usize,
    root: usize,
    len: usize,
}

impl<V> TreeCore<V> {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: NIL,
            root: NIL,
            len: 0,
        }
    }

    fn entry(&self, idx: usize) -> &TreeEntry<V> {
        match &self.slots[idx] {
            TreeSlot::Occupied(entry) => entry,
            TreeSlot::Vacant { .. } => {
                unreachable!("vacant slot {idx} reached through a live link")
            }
        }
    }

    fn entry_mut(&mut self, idx: usize) -> &mut TreeEntry<V> {
        match &mut self.slots[idx] {
            TreeSlot::Occupied(entry) => entry,
            TreeSlot::Vacant { .. } => {
                unreachable!("vacant slot {idx} reached through a live link")
            }
        }
    }

    fn key_of(&self, idx: usize) -> NodeKey {
        self.entry(idx).node.key()
    }

    /// New entries enter red; the insert fixup restores the invariants.
    fn alloc(&mut self, node: Node<V>) -> usize {
        let entry = TreeEntry {
            node,
            child: [NIL, NIL],
            color: Color::Red,
        };
        if self.free == NIL {
            self.slots.push(TreeSlot::Occupied(entry));
            self.slots.len() - 1
        } else {
            let idx = self.free;
            match mem::replace(&mut self.slots[idx], TreeSlot::Occupied(entry)) {
                TreeSlot::Vacant { next_free } => self.free = next_free,
                TreeSlot::Occupied(_) => unreachable!("free list pointed at an occupied slot"),
            }
            idx
        }
    }

    fn release(&mut self, idx: usize) -> Node<V> {
        let slot = mem::replace(
            &mut self.slots[idx],
            TreeSlot::Vacant {
                next_free: self.free,
            },
        );
        self.free = idx;
        match slot {
            TreeSlot::Occupied(entry) => entry.node,
            TreeSlot::Vacant { .. } => unreachable!("released slot {idx} was already vacant"),
        }
    }

    /// Child `dir` of `parent`, where `parent == NIL` addresses the root.
    fn link(&self, parent: usize, dir: usize) -> usize {
        if parent == NIL {
            self.root
        } else {
            self.entry(parent).child[dir]
        }
    }

    fn set_link(&mut self, parent: usize, dir: usize, child: usize) {
        if parent == NIL {
            self.root = child;
        } else {
            self.entry_mut(parent).child[dir] = child;
        }
    }

    /// Nil links count as black.
    fn color(&self, idx: usize) -> Color {
        if idx == NIL {
            Color::Black
        } else {
            self.entry(idx).color
        }
    }

    fn set_color(&mut self, idx: usize, color: Color) {
        self.entry_mut(idx).color = color;
    }

    fn swap_colors(&mut self, a: usize, b: usize) {
        let color_a = self.entry(a).color;
        let color_b = self.entry(b).color;
        self.entry_mut(a).color = color_b;
        self.entry_mut(b).color = color_a;
    }

    // ------------------------------------------------------------------
    //  Audit
    // ------------------------------------------------------------------

    /// Recursive invariant walk. Returns `(member count, black height)` of
    /// the subtree at `idx`, where nil subtrees have black height 1.
    fn audit_walk(
        &self,
        idx: usize,
        lo: Option<NodeKey>,
        hi: Option<NodeKey>,
    ) -> Result<(usize, usize), AuditError> {
        if idx == NIL {
            return Ok((0, 1));
        }
        let entry = self.entry(idx);
        let key = entry.node.key();
        if lo.is_some_and(|bound| key <= bound) || hi.is_some_and(|bound| key >= bound) {
            return Err(AuditError::OrderViolation(key));
        }
        if entry.color == Color::Red
            && (self.color(entry.child[0]) == Color::Red
                || self.color(entry.child[1]) == Color::Red)
        {
            return Err(AuditError::RedViolation(key));
        }
        let (left_count, left_black) = self.audit_walk(entry.child[0], lo, Some(key))?;
        let (right_count, right_black) = self.audit_walk(entry.child[1], Some(key), hi)?;
        if left_black != right_black {
            return Err(AuditError::BlackHeightMismatch);
        }
        let black = left_black + usize::from(entry.color == Color::Black);
        Ok((left_count + right_count + 1, black))
    }
}

// ============================================================================
//  Insert outcome
// ============================================================================

/// Outcome of [`NodeTree::insert`].
#[derive(Debug, PartialEq, Eq)]
pub enum Insert<V> {
    /// The node was linked into the tree.
    Inserted,

    /// A node with the same key already occupies the tree. The occupant is
    /// untouched; the caller's node comes back here. Not an error.
    Occupied(Node<V>),
}

impl<V> Insert<V> {
    /// `true` when the node went in.
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }

    /// The handed-back node, if the key was occupied.
    pub fn into_occupied(self) -> Option<Node<V>> {
        match self {
            Self::Inserted => None,
            Self::Occupied(node) => Some(node),
        }
    }
}

// ============================================================================
//  Statistics
// ============================================================================

/// Shape summary reported by [`NodeTree::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of members.
    pub len: usize,
    /// Black entries on every root-to-nil path (nil paths count 1).
    pub black_height: usize,
}

// ============================================================================
//  NodeTree
// ============================================================================

/// A coarse-locked red-black binary search tree of [`Node`]s.
///
/// See the [module documentation](self) for the height budget and the
/// duplicate-key contract.
///
/// # Example
///
/// ```rust
/// use keynode::{Insert, Node, NodeTree};
///
/// let tree: NodeTree<&str> = NodeTree::new();
/// assert!(tree.insert(Node::new(44, "a")).unwrap().is_inserted());
/// assert!(tree.insert(Node::new(99, "b")).unwrap().is_inserted());
///
/// // duplicate insert: the occupant stays, the new node comes back
/// let outcome = tree.insert(Node::new(44, "c")).unwrap();
/// assert_eq!(outcome, Insert::Occupied(Node::new(44, "c")));
///
/// assert_eq!(tree.find(44).unwrap().map(|n| *n.value()), Some("a"));
/// let removed = tree.remove(44).unwrap().expect("key 44 is present");
/// assert_eq!(removed.into_value(), "a");
/// assert_eq!(tree.find(44).unwrap(), None);
/// ```
#[derive(Debug)]
pub struct NodeTree<V, const MAX_HEIGHT: usize = DEFAULT_MAX_HEIGHT> {
    core: Mutex<TreeCore<V>>,
}

impl<V, const MAX_HEIGHT: usize> Default for NodeTree<V, MAX_HEIGHT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, const MAX_HEIGHT: usize> NodeTree<V, MAX_HEIGHT> {
    /// Evaluated at monomorphization: rejects unusably small path budgets.
    const BUDGET_OK: () = assert!(MAX_HEIGHT >= 8, "MAX_HEIGHT must be at least 8");

    /// Create an empty tree. No failure mode.
    #[must_use]
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::BUDGET_OK;
        Self {
            core: Mutex::new(TreeCore::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TreeCore<V>>, OpError> {
        self.core.lock().map_err(|_| OpError::LockPoisoned)
    }

    /// Number of members.
    pub fn len(&self) -> Result<usize, OpError> {
        Ok(self.lock()?.len)
    }

    /// `true` when the tree has no members.
    pub fn is_empty(&self) -> Result<bool, OpError> {
        Ok(self.lock()?.len == 0)
    }

    /// Whether a panic has poisoned this tree's lock. Sticky; a poisoned
    /// tree should be abandoned.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.core.is_poisoned()
    }

    /// Audit the red-black invariants by explicit traversal: search order,
    /// no red entry with a red child, black root, equal black-height on
    /// every root-to-nil path, member count.
    pub fn validate(&self) -> Result<TreeStats, AuditError> {
        let core = self.core.lock().map_err(|_| AuditError::LockPoisoned)?;
        if core.root != NIL && core.color(core.root) == Color::Red {
            return Err(AuditError::RootNotBlack);
        }
        let (count, black_height) = core.audit_walk(core.root, None, None)?;
        if count != core.len {
            return Err(AuditError::CountMismatch {
                expected: core.len,
                actual: count,
            });
        }
        Ok(TreeStats {
            len: count,
            black_height,
        })
    }

    /// A snapshot of the member with `key`; `Ok(None)` on an empty tree or
    /// a missing key.
    ///
    /// # Errors
    ///
    /// [`OpError::LockPoisoned`].
    pub fn find(&self, key: NodeKey) -> Result<Option<Node<V>>, OpError>
    where
        V: Clone,
    {
        let core = self.lock()?;
        let mut idx = core.root;
        while idx != NIL {
            let entry = core.entry(idx);
            match key.cmp(&entry.node.key()) {
                Ordering::Less => idx = entry.child[0],
                Ordering::Greater => idx = entry.child[1],
                Ordering::Equal => return Ok(Some(entry.node.clone())),
            }
        }
        Ok(None)
    }

    /// Insert a node, keeping the tree balanced.
    ///
    /// The descent records its path; the new entry is linked red and the
    /// standard recolor/rotation fixup runs back up the recorded path, with
    /// the root forced black at the end. If the key is already present the
    /// tree is left untouched and the caller's node comes back as
    /// [`Insert::Occupied`].
    ///
    /// # Errors
    ///
    /// Rejects with [`RejectReason::HeightExceeded`] if the descent would
    /// overflow the path budget (the tree is not modified), or
    /// [`RejectReason::LockPoisoned`] on a poisoned lock.
    pub fn insert(&self, node: Node<V>) -> Result<Insert<V>, Rejected<V>> {
        let Ok(mut core) = self.core.lock() else {
            return Err(Rejected::new(node, RejectReason::LockPoisoned));
        };
        let key = node.key();
        debug_log!(key, len = core.len, "tree insert");

        // Path arrays; index 0 is the pseudo-root addressing `core.root`.
        let mut pa = [NIL; MAX_HEIGHT];
        let mut da = [0_usize; MAX_HEIGHT];
        let mut k = 1;

        let mut p = core.root;
        while p != NIL {
            match key.cmp(&core.key_of(p)) {
                Ordering::Equal => return Ok(Insert::Occupied(node)),
                ordering => {
                    // One budget slot stays reserved for the delete
                    // rebalance; enforcing the same bound here keeps every
                    // path this tree can produce within the arrays.
                    if k + 1 >= MAX_HEIGHT {
                        return Err(Rejected::new(node, RejectReason::HeightExceeded));
                    }
                    let dir = usize::from(ordering == Ordering::Greater);
                    pa[k] = p;
                    da[k] = dir;
                    k += 1;
                    p = core.entry(p).child[dir];
                }
            }
        }

        let fresh = core.alloc(node);
        core.set_link(pa[k - 1], da[k - 1], fresh);
        core.len += 1;

        // Bottom-up fixup along the recorded path.
        while k >= 3 && core.color(pa[k - 1]) == Color::Red {
            if da[k - 2] == 0 {
                let uncle = core.entry(pa[k - 2]).child[1];
                if uncle != NIL && core.color(uncle) == Color::Red {
                    core.set_color(pa[k - 1], Color::Black);
                    core.set_color(uncle, Color::Black);
                    core.set_color(pa[k - 2], Color::Red);
                    k -= 2;
                } else {
                    let y;
                    if da[k - 1] == 0 {
                        y = pa[k - 1];
                    } else {
                        let x = pa[k - 1];
                        y = core.entry(x).child[1];
                        let t = core.entry(y).child[0];
                        core.entry_mut(x).child[1] = t;
                        core.entry_mut(y).child[0] = x;
                        core.entry_mut(pa[k - 2]).child[0] = y;
                    }
                    let x = pa[k - 2];
                    core.set_color(x, Color::Red);
                    core.set_color(y, Color::Black);
                    let t = core.entry(y).child[1];
                    core.entry_mut(x).child[0] = t;
                    core.entry_mut(y).child[1] = x;
                    core.set_link(pa[k - 3], da[k - 3], y);
                    break;
                }
            } else {
                let uncle = core.entry(pa[k - 2]).child[0];
                if uncle != NIL && core.color(uncle) == Color::Red {
                    core.set_color(pa[k - 1], Color::Black);
                    core.set_color(uncle, Color::Black);
                    core.set_color(pa[k - 2], Color::Red);
                    k -= 2;
                } else {
                    let y;
                    if da[k - 1] == 1 {
                        y = pa[k - 1];
                    } else {
                        let x = pa[k - 1];
                        y = core.entry(x).child[0];
                        let t = core.entry(y).child[1];
                        core.entry_mut(x).child[0] = t;
                        core.entry_mut(y).child[1] = x;
                        core.entry_mut(pa[k - 2]).child[1] = y;
                    }
                    let x = pa[k - 2];
                    core.set_color(x, Color::Red);
                    core.set_color(y, Color::Black);
                    let t = core.entry(y).child[0];
                    core.entry_mut(x).child[1] = t;
                    core.entry_mut(y).child[0] = x;
                    core.set_link(pa[k - 3], da[k - 3], y);
                    break;
                }
            }
        }
        let root = core.root;
        core.set_color(root, Color::Black);
        Ok(Insert::Inserted)
    }

    /// Remove and return the member with `key`; `Ok(None)` when absent.
    ///
    /// Handles the three unlink shapes (no right child; right child without
    /// a left child; in-order successor splice), swapping colors between
    /// the unlinked entry and its structural successor, then rebalances
    /// bottom-up along the recorded path to restore equal black-heights.
    ///
    /// # Errors
    ///
    /// [`OpError::LockPoisoned`], or [`OpError::HeightExceeded`] if the
    /// descent would overflow the path budget (the tree is not modified).
    #[allow(clippy::too_many_lines)]
    pub fn remove(&self, key: NodeKey) -> Result<Option<Node<V>>, OpError> {
        let mut core = self.lock()?;
        debug_log!(key, len = core.len, "tree remove");

        let mut pa = [NIL; MAX_HEIGHT];
        let mut da = [0_usize; MAX_HEIGHT];
        let mut k = 1;

        // Descent, recording the path down to the doomed entry.
        let mut p = core.root;
        loop {
            if p == NIL {
                return Ok(None);
            }
            match key.cmp(&core.key_of(p)) {
                Ordering::Equal => break,
                ordering => {
                    if k + 1 >= MAX_HEIGHT {
                        return Err(OpError::HeightExceeded);
                    }
                    let dir = usize::from(ordering == Ordering::Greater);
                    pa[k] = p;
                    da[k] = dir;
                    k += 1;
                    p = core.entry(p).child[dir];
                }
            }
        }

        // Unlink `p`, possibly relocating its in-order successor into its
        // structural position (with a color swap so the rebalance below
        // sees the color that actually left the tree).
        let right = core.entry(p).child[1];
        if right == NIL {
            let left = core.entry(p).child[0];
            core.set_link(pa[k - 1], da[k - 1], left);
        } else if core.entry(right).child[0] == NIL {
            if k + 1 >= MAX_HEIGHT {
                return Err(OpError::HeightExceeded);
            }
            let left = core.entry(p).child[0];
            core.entry_mut(right).child[0] = left;
            core.swap_colors(right, p);
            core.set_link(pa[k - 1], da[k - 1], right);
            da[k] = 1;
            pa[k] = right;
            k += 1;
        } else {
            let j = k;
            k += 1;
            let mut r = right;
            let successor;
            loop {
                if k + 1 >= MAX_HEIGHT {
                    return Err(OpError::HeightExceeded);
                }
                da[k] = 0;
                pa[k] = r;
                k += 1;
                let s = core.entry(r).child[0];
                if core.entry(s).child[0] == NIL {
                    successor = s;
                    break;
                }
                r = s;
            }
            da[j] = 1;
            pa[j] = successor;
            core.set_link(pa[j - 1], da[j - 1], successor);

            let left = core.entry(p).child[0];
            core.entry_mut(successor).child[0] = left;
            let successor_right = core.entry(successor).child[1];
            core.entry_mut(r).child[0] = successor_right;
            core.entry_mut(successor).child[1] = right;
            core.swap_colors(successor, p);
        }

        // Removing a black entry shortens one path; restore equal
        // black-heights bottom-up along the recorded path.
        if core.color(p) == Color::Black {
            loop {
                let x = core.link(pa[k - 1], da[k - 1]);
                if x != NIL && core.color(x) == Color::Red {
                    core.set_color(x, Color::Black);
                    break;
                }
                if k < 2 {
                    break;
                }
                if da[k - 1] == 0 {
                    let mut w = core.entry(pa[k - 1]).child[1];
                    if core.color(w) == Color::Red {
                        core.set_color(w, Color::Black);
                        core.set_color(pa[k - 1], Color::Red);
                        let t = core.entry(w).child[0];
                        core.entry_mut(pa[k - 1]).child[1] = t;
                        core.entry_mut(w).child[0] = pa[k - 1];
                        core.set_link(pa[k - 2], da[k - 2], w);
                        pa[k] = pa[k - 1];
                        da[k] = 0;
                        pa[k - 1] = w;
                        k += 1;
                        w = core.entry(pa[k - 1]).child[1];
                    }
                    let w_left = core.entry(w).child[0];
                    let w_right = core.entry(w).child[1];
                    if core.color(w_left) == Color::Black && core.color(w_right) == Color::Black {
                        core.set_color(w, Color::Red);
                    } else {
                        if core.color(w_right) == Color::Black {
                            let y = w_left;
                            core.set_color(y, Color::Black);
                            core.set_color(w, Color::Red);
                            let t = core.entry(y).child[1];
                            core.entry_mut(w).child[0] = t;
                            core.entry_mut(y).child[1] = w;
                            core.entry_mut(pa[k - 1]).child[1] = y;
                            w = y;
                        }
                        let parent_color = core.entry(pa[k - 1]).color;
                        core.set_color(w, parent_color);
                        core.set_color(pa[k - 1], Color::Black);
                        let w_right = core.entry(w).child[1];
                        core.set_color(w_right, Color::Black);
                        let t = core.entry(w).child[0];
                        core.entry_mut(pa[k - 1]).child[1] = t;
                        core.entry_mut(w).child[0] = pa[k - 1];
                        core.set_link(pa[k - 2], da[k - 2], w);
                        break;
                    }
                } else {
                    let mut w = core.entry(pa[k - 1]).child[0];
                    if core.color(w) == Color::Red {
                        core.set_color(w, Color::Black);
                        core.set_color(pa[k - 1], Color::Red);
                        let t = core.entry(w).child[1];
                        core.entry_mut(pa[k - 1]).child[0] = t;
                        core.entry_mut(w).child[1] = pa[k - 1];
                        core.set_link(pa[k - 2], da[k - 2], w);
                        pa[k] = pa[k - 1];
                        da[k] = 1;
                        pa[k - 1] = w;
                        k += 1;
                        w = core.entry(pa[k - 1]).child[0];
                    }
                    let w_left = core.entry(w).child[0];
                    let w_right = core.entry(w).child[1];
                    if core.color(w_left) == Color::Black && core.color(w_right) == Color::Black {
                        core.set_color(w, Color::Red);
                    } else {
                        if core.color(w_left) == Color::Black {
                            let y = w_right;
                            core.set_color(y, Color::Black);
                            core.set_color(w, Color::Red);
                            let t = core.entry(y).child[0];
                            core.entry_mut(w).child[1] = t;
                            core.entry_mut(y).child[0] = w;
                            core.entry_mut(pa[k - 1]).child[0] = y;
                            w = y;
                        }
                        let parent_color = core.entry(pa[k - 1]).color;
                        core.set_color(w, parent_color);
                        core.set_color(pa[k - 1], Color::Black);
                        let w_left = core.entry(w).child[0];
                        core.set_color(w_left, Color::Black);
                        let t = core.entry(w).child[1];
                        core.entry_mut(pa[k - 1]).child[0] = t;
                        core.entry_mut(w).child[1] = pa[k - 1];
                        core.set_link(pa[k - 2], da[k - 2], w);
                        break;
                    }
                }
                k -= 1;
            }
        }

        core.len -= 1;
        trace_log!(key, len = core.len, "tree removed");
        Ok(Some(core.release(p)))
    }

    /// Swap `node` in for the member with the same key, returning the node
    /// it displaces. The entry keeps its exact tree position and color, so
    /// no rebalancing is needed.
    ///
    /// # Errors
    ///
    /// Rejects with [`RejectReason::KeyNotFound`] when no member has
    /// `node.key()`, [`RejectReason::LockPoisoned`] on a poisoned lock.
    pub fn replace(&self, node: Node<V>) -> Result<Node<V>, Rejected<V>> {
        let Ok(mut core) = self.core.lock() else {
            return Err(Rejected::new(node, RejectReason::LockPoisoned));
        };
        let key = node.key();
        let mut idx = core.root;
        while idx != NIL {
            match key.cmp(&core.key_of(idx)) {
                Ordering::Less => idx = core.entry(idx).child[0],
                Ordering::Greater => idx = core.entry(idx).child[1],
                Ordering::Equal => {
                    return Ok(mem::replace(&mut core.entry_mut(idx).node, node));
                }
            }
        }
        Err(Rejected::new(node, RejectReason::KeyNotFound))
    }
}

// ============================================================================
//  Tests
// ============================================================================
