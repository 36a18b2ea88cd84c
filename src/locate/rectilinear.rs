//! Sorted-coordinate locator for rectilinear grids.
//!
//! Each axis is searched independently with a binary search over its
//! monotone coordinates. A coordinate exactly on an interior grid plane
//! belongs to the lower-index cell. Flat axes (a single coordinate)
//! contribute one node with factor 1 and ignore the query coordinate.

use crate::data::mesh_chunk::CellId;
use crate::data::rectilinear::{AxisOrder, RectilinearGrid};
use crate::geometry::weights::InterpolationWeights;
use crate::locate::{CellLocator, LocatorConfig, LocatorStatus};

/// Bracket of a query along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum AxisHit {
    /// Between node `lo` and `lo + 1`, at fraction `t`.
    Interval { lo: usize, t: f64 },
    /// Flat axis: node 0 only.
    Flat,
}

impl AxisHit {
    #[inline]
    pub(crate) fn zone(self) -> usize {
        match self {
            AxisHit::Interval { lo, .. } => lo,
            AxisHit::Flat => 0,
        }
    }

    /// `(node offset, factor)` pairs along this axis.
    pub(crate) fn factors(self) -> impl Iterator<Item = (usize, f64)> {
        let pairs: [(usize, f64); 2] = match self {
            AxisHit::Interval { lo, t } => [(lo, 1.0 - t), (lo + 1, t)],
            AxisHit::Flat => [(0, 1.0), (0, 0.0)],
        };
        let n = if matches!(self, AxisHit::Flat) { 1 } else { 2 };
        pairs.into_iter().take(n)
    }
}

/// Locates `v` on a monotone axis. `tol` is relative to the axis extent.
pub(crate) fn locate_on_axis(coords: &[f64], order: AxisOrder, v: f64, tol: f64) -> Option<AxisHit> {
    let n = coords.len();
    if order == AxisOrder::Flat || n < 2 {
        return Some(AxisHit::Flat);
    }
    let (first, last) = (coords[0], coords[n - 1]);
    let slack = tol * (last - first).abs();
    let (lo_v, hi_v) = if first < last { (first, last) } else { (last, first) };
    if v < lo_v - slack || v > hi_v + slack {
        return None;
    }
    // number of nodes strictly before `v` in storage order
    let before = match order {
        AxisOrder::Ascending => coords.partition_point(|c| *c < v),
        AxisOrder::Descending => coords.partition_point(|c| *c > v),
        AxisOrder::Flat => 0,
    };
    let lo = before.saturating_sub(1).min(n - 2);
    let t = ((v - coords[lo]) / (coords[lo + 1] - coords[lo])).clamp(0.0, 1.0);
    Some(AxisHit::Interval { lo, t })
}

/// Locator over a [`RectilinearGrid`].
pub struct RectilinearLocator<'a> {
    grid: &'a RectilinearGrid,
    tolerance: f64,
    built: bool,
}

impl<'a> RectilinearLocator<'a> {
    pub fn new(grid: &'a RectilinearGrid, config: &LocatorConfig) -> Self {
        Self {
            grid,
            tolerance: config.tolerance,
            built: false,
        }
    }

    pub fn grid(&self) -> &'a RectilinearGrid {
        self.grid
    }

    fn hits(&self, p: [f64; 3]) -> Option<[AxisHit; 3]> {
        let mut hits = [AxisHit::Flat; 3];
        for (axis, hit) in hits.iter_mut().enumerate() {
            *hit = locate_on_axis(
                self.grid.coords(axis),
                self.grid.axis_order(axis),
                p[axis],
                self.tolerance,
            )?;
        }
        Some(hits)
    }
}

impl CellLocator for RectilinearLocator<'_> {
    fn build(&mut self) -> LocatorStatus {
        // the coordinate arrays are the index; they were validated on construction
        self.built = true;
        LocatorStatus::Built
    }

    fn is_built(&self) -> bool {
        self.built
    }

    fn find_cell(
        &self,
        position: [f64; 3],
        weights: &mut InterpolationWeights,
        ignore_ghost_cells: bool,
    ) -> Option<CellId> {
        weights.clear();
        let [hx, hy, hz] = self.hits(position)?;
        let zone = self.grid.zone_index(hx.zone(), hy.zone(), hz.zone());
        if ignore_ghost_cells && self.grid.is_ghost_zone(zone) {
            return None;
        }
        for (k, wz) in hz.factors() {
            for (j, wy) in hy.factors() {
                for (i, wx) in hx.factors() {
                    weights.push(self.grid.node_index(i, j, k), wx * wy * wz);
                }
            }
        }
        Some(zone)
    }
}
