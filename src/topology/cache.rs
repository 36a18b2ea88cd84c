//! Dropping derived state (bucket indices, face adjacency, loaded domains)
//! after the underlying mesh changes.

/// Implemented by types that hold data derived from a mesh. After
/// `invalidate_cache` the next query rebuilds from scratch.
pub trait InvalidateCache {
    fn invalidate_cache(&mut self);
}
