//! Point-in-cell location over a single mesh chunk.
//!
//! Three implementations share the [`CellLocator`] interface:
//!
//! - [`bucket::BucketLocator`] indexes any [`MeshChunk`](crate::data::mesh_chunk::MeshChunk)
//!   with a fixed-depth octree of candidate lists.
//! - [`rectilinear::RectilinearLocator`] binary-searches the monotone
//!   coordinate arrays of a [`RectilinearGrid`](crate::data::rectilinear::RectilinearGrid).
//! - [`edge::EdgeLocator`] is the 2-D slice variant of the rectilinear search.
//!
//! A query that hits nothing returns `None` and leaves the weights empty.

pub mod bucket;
pub mod edge;
pub mod rectilinear;

pub use bucket::{BucketIndex, BucketLocator};
pub use edge::{EdgeDirection, EdgeLocator};
pub use rectilinear::RectilinearLocator;

use crate::data::mesh_chunk::CellId;
use crate::geometry::weights::InterpolationWeights;
use serde::{Deserialize, Serialize};

/// Tuning for locator construction and containment tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Target number of cells per octree leaf.
    pub bucket_size: usize,
    /// Upper bound on octree depth; never above [`bucket::DEPTH_LIMIT`].
    pub max_depth: u32,
    /// Relative containment tolerance.
    pub tolerance: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            bucket_size: 32,
            max_depth: 6,
            tolerance: 1e-9,
        }
    }
}

/// Outcome of [`CellLocator::build`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LocatorStatus {
    Built,
    /// The chunk has no cells; every query returns `None`.
    NoData,
}

/// Point-in-cell queries with interpolation weights.
pub trait CellLocator {
    /// Builds the index now instead of on the first query.
    fn build(&mut self) -> LocatorStatus;

    fn is_built(&self) -> bool;

    /// Returns the containing cell and fills `weights` with global point ids.
    ///
    /// With `ignore_ghost_cells`, ghost-flagged cells are never returned.
    fn find_cell(
        &self,
        position: [f64; 3],
        weights: &mut InterpolationWeights,
        ignore_ghost_cells: bool,
    ) -> Option<CellId>;
}

/// Enum dispatch over the locator variants.
pub enum AnyLocator<'a> {
    Bucket(BucketLocator<'a>),
    Rectilinear(RectilinearLocator<'a>),
    Edge(EdgeLocator<'a>),
}

impl CellLocator for AnyLocator<'_> {
    fn build(&mut self) -> LocatorStatus {
        match self {
            AnyLocator::Bucket(l) => l.build(),
            AnyLocator::Rectilinear(l) => l.build(),
            AnyLocator::Edge(l) => l.build(),
        }
    }

    fn is_built(&self) -> bool {
        match self {
            AnyLocator::Bucket(l) => l.is_built(),
            AnyLocator::Rectilinear(l) => l.is_built(),
            AnyLocator::Edge(l) => l.is_built(),
        }
    }

    fn find_cell(
        &self,
        position: [f64; 3],
        weights: &mut InterpolationWeights,
        ignore_ghost_cells: bool,
    ) -> Option<CellId> {
        match self {
            AnyLocator::Bucket(l) => l.find_cell(position, weights, ignore_ghost_cells),
            AnyLocator::Rectilinear(l) => l.find_cell(position, weights, ignore_ghost_cells),
            AnyLocator::Edge(l) => l.find_cell(position, weights, ignore_ghost_cells),
        }
    }
}

impl<'a> From<BucketLocator<'a>> for AnyLocator<'a> {
    fn from(l: BucketLocator<'a>) -> Self {
        AnyLocator::Bucket(l)
    }
}

impl<'a> From<RectilinearLocator<'a>> for AnyLocator<'a> {
    fn from(l: RectilinearLocator<'a>) -> Self {
        AnyLocator::Rectilinear(l)
    }
}

impl<'a> From<EdgeLocator<'a>> for AnyLocator<'a> {
    fn from(l: EdgeLocator<'a>) -> Self {
        AnyLocator::Edge(l)
    }
}
