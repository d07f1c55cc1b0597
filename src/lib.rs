//! # `keynode`
//!
//! Coarse-locked keyed node collections: positional, ordered, stack, queue,
//! and red-black tree access over one node type.
//!
//! Callers construct [`Node`]s (a `u64` key plus an arbitrary payload)
//! and move them into exactly one collection at a time. Each collection is
//! an owned aggregate guarded by a single mutex: every operation is one
//! whole-operation critical section, so operations on the same collection
//! are linearized and distinct collections never contend.
//!
//! | Collection | Disciplines | Lookup |
//! |------------|-------------|--------|
//! | [`NodeList<V>`] | array (by index), key-ordered, queue, stack | linear, halved by a tracked middle pointer |
//! | [`NodeTree<V>`] | ordered search | logarithmic, red-black balanced |
//!
//! ## Ownership model
//!
//! Insertion moves the node in; removal moves it back out. A node therefore
//! belongs to at most one collection, enforced by the type system rather
//! than by convention. Read operations (`get`, `find`, `peek_*`) return
//! *clones* of the node; use `V = Arc<T>` when payload identity or cheap
//! clones matter.
//!
//! ```rust
//! use keynode::{Node, NodeList, NodeTree};
//!
//! // A queue of jobs, keys derived from the job name.
//! let jobs: NodeList<&str> = NodeList::new();
//! jobs.push(Node::hashed(b"render", "render the frame")).unwrap();
//! jobs.push(Node::hashed(b"upload", "upload the frame")).unwrap();
//! let oldest = jobs.pop_back().unwrap().expect("two jobs queued");
//! assert_eq!(*oldest.value(), "render the frame");
//!
//! // An index of entities by key.
//! let index: NodeTree<&str> = NodeTree::new();
//! index.insert(Node::new(678, "entity #678")).unwrap();
//! assert_eq!(index.find(678).unwrap().map(|n| *n.value()), Some("entity #678"));
//! ```
//!
//! ## Failure model
//!
//! No operation panics and nothing is thrown. Expected absence is
//! `Ok(None)`; operations that consume a node hand it back inside
//! [`Rejected`] when they cannot complete; a panic inside a critical
//! section poisons the collection permanently and every later operation
//! reports [`OpError::LockPoisoned`]. See the [`error`] module.
//!
//! ## Feature flags
//!
//! - `tracing`: instrument collection operations with the [`tracing`]
//!   crate. Off by default; when disabled the instrumentation compiles to
//!   nothing.
//!
//! [`tracing`]: https://docs.rs/tracing

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod tracing_helpers;

pub mod error;
pub mod key;
pub mod list;
pub mod node;
pub mod tree;

// Re-export main types for convenience
pub use error::{AuditError, OpError, RejectReason, Rejected};
pub use key::{hash, NodeKey};
pub use list::NodeList;
pub use node::Node;
pub use tree::{Insert, NodeTree, TreeStats, DEFAULT_MAX_HEIGHT};
