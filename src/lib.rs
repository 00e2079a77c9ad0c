//! A thread-safe hashmap guarded by a single reader/writer lock.
//!
//! # Overview
//! `safemap` wraps a plain `HashMap` in a futex-based reader/writer lock and exposes a
//! small set of operations that are each atomic with respect to concurrent callers.
//!
//! # Features
//! - Shared holds for lookups and iteration, exclusive holds for writes
//! - Atomic `swap`: the previous value is read and replaced under one exclusive hold
//! - Bounded iteration with early exit over entries, keys or values
//! - No poisoning, the lock is released normally on panic
//!
//! # Examples
//! ```
//! use safemap::SafeMap;
//!
//! let map = SafeMap::<String, String>::new();
//!
//! // Basic operations
//! map.store("foo".into(), "bar".into());
//! map.store("rab".into(), "baz".into());
//! assert_eq!(map.len(), 2);
//! assert_eq!(map.load("foo"), "bar");
//!
//! // Absent keys load as the default value, `load_checked` tells them apart
//! assert_eq!(map.load_checked("xyz"), (String::new(), false));
//!
//! // Remove a value
//! map.delete("foo");
//! assert_eq!(map.len(), 1);
//!
//! // Replace a value and get the old one back
//! assert_eq!(map.swap("rab".into(), "qux".into()), ("baz".to_string(), true));
//! assert_eq!(map.load("rab"), "qux");
//! ```
mod rwlock;
mod safemap;

use rwlock::*;
pub use safemap::*;
