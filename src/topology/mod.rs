//! Topology metadata shared by every mesh representation.
//!
//! - [`cell_type::CellType`]: the supported cell topologies and their vertex
//!   orderings.
//! - [`ghost::GhostFlags`]: ghost classification bits for zones and nodes.
//! - [`cache::InvalidateCache`]: the hook lazily built indices implement.

pub mod cache;
pub mod cell_type;
pub mod ghost;

pub use cache::InvalidateCache;
pub use cell_type::CellType;
pub use ghost::GhostFlags;
