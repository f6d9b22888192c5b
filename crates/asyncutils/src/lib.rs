//! Async helpers that don't belong to any one crate.
//!
//! The main export is [`KeyedMutex`]: mutual exclusion scoped to a key, so
//! that writers targeting the same entity are serialized while writers
//! targeting different entities proceed in parallel.

mod keyed;

pub use crate::keyed::{KeyedGuard, KeyedMutex};
