//! In-memory inventory state and the baseline it is diffed against.

/// Lazily built, explicitly refreshed baseline maps.
pub mod baseline;
/// Copy-on-write record collection with an id index.
pub mod collection;
/// Live working set and its mutation operations.
pub mod state;
