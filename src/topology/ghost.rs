//! Ghost classification bitfield for zones and nodes.
//!
//! A zero value means "real" data. Any set bit marks the entity as a ghost
//! that boundary-aware filters (statistics, locators, extraction) can skip.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    /// Bitfield of ghost classifications.
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Pod, Zeroable)]
    pub struct GhostFlags: u8 {
        /// Copy of an entity owned by another domain.
        const DUPLICATED = 1 << 0;
        /// Added to improve connectivity across a boundary.
        const ENHANCED_CONNECTIVITY = 1 << 1;
        /// Removed connectivity (e.g. a hanging neighbour).
        const REDUCED_CONNECTIVITY = 1 << 2;
        /// Covered by a finer AMR patch.
        const REFINED_AMR = 1 << 3;
        /// Outside the problem domain.
        const EXTERIOR = 1 << 4;
        /// Placeholder that carries no valid data.
        const NOT_APPLICABLE = 1 << 5;
    }
}

impl GhostFlags {
    /// Not a ghost.
    pub const NONE: GhostFlags = GhostFlags::empty();

    /// `true` for any non-zero classification.
    #[inline]
    pub const fn is_ghost(self) -> bool {
        !self.is_empty()
    }
}

impl Default for GhostFlags {
    fn default() -> Self {
        Self::NONE
    }
}
