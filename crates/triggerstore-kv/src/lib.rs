//! # triggerstore-kv
//!
//! Key-value store protocol consumed by the triggerstore job store.
//!
//! ## Features
//!
//! - Hashes, string sets and score-ordered sets
//! - String values with optional TTL
//! - Named locks with TTL (take / release)
//! - [`MemoryKvStore`], an in-process implementation with Redis-like semantics
//! - [`Clock`] abstraction so expiry can be driven by a manual clock in tests

pub mod clock;
pub mod error;
pub mod memory;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::KvError;
pub use memory::MemoryKvStore;
pub use store::{KvStore, ScoredMember};
