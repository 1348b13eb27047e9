//! Tokio task owning the inventory, with a cloneable handle in front of it.

/// Broadcast notifications about loads, edits, persists and syncs.
pub mod events;
/// Command channel, debounced persistence and periodic sync.
pub mod handle;
