//! dynabatch-memory — in-memory store backend for dynabatch.
//!
//! Useful for development and tests: it enforces the store protocol's
//! per-call limits, supports fault injection per chunk, and accounts for
//! concurrent in-flight calls so fan-out behavior can be observed.

pub mod memory;

pub use memory::{Fault, InMemoryStore};
