//! An immutable adaptive radix tree with copy-on-write transactions and per-node change
//! notification.
//!
//! Readers work against a [`Tree`] snapshot without locking. Writers open a [`Txn`], mutate it,
//! and commit to produce a new snapshot; nodes shared with older snapshots are copied, never
//! modified. Every node carries a [`WatchHandle`] that a transaction with `track_mutate` enabled
//! closes when the node is replaced, so a reader can block until the part of the tree it read
//! has changed.
//!
//! ```
//! use iart::Tree;
//!
//! let mut tree = Tree::new();
//! tree.insert("foo", 1);
//! tree.insert("foo/bar", 2);
//!
//! let (watch, value) = tree.get_watch("foo/bar");
//! assert_eq!(value, Some(&2));
//!
//! let mut txn = tree.txn();
//! txn.track_mutate(true);
//! txn.insert("foo/bar", 3);
//! let tree = txn.commit();
//!
//! assert!(watch.is_closed());
//! assert_eq!(tree.longest_prefix("foo/bar/baz"), Some((b"foo/bar".to_vec(), &3)));
//! ```

pub mod config;
pub mod error;
pub mod iter;
pub mod keys;
pub mod mapping;
pub mod node;
pub mod partials;
pub mod stats;
pub mod tree;
pub mod txn;
pub mod utils;
pub mod watch;

pub use config::TxnConfig;
pub use error::ConfigError;
pub use iter::{Iter, PathIter, RawIter};
pub use node::{Leaf, Node, NodeKind};
pub use tree::Tree;
pub use txn::Txn;
pub use watch::WatchHandle;
