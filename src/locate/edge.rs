//! Two-axis locator over one logical slice of a rectilinear grid.

use crate::data::mesh_chunk::CellId;
use crate::data::rectilinear::RectilinearGrid;
use crate::geometry::weights::InterpolationWeights;
use crate::locate::rectilinear::{AxisHit, locate_on_axis};
use crate::locate::{CellLocator, LocatorConfig, LocatorStatus};
use crate::mesh_error::MeshCompositeError;
use serde::{Deserialize, Serialize};

/// Which two logical axes are active.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EdgeDirection {
    XY,
    XZ,
    YZ,
}

impl EdgeDirection {
    /// `(first active, second active, pinned)` axes.
    pub fn axes(self) -> (usize, usize, usize) {
        match self {
            EdgeDirection::XY => (0, 1, 2),
            EdgeDirection::XZ => (0, 2, 1),
            EdgeDirection::YZ => (1, 2, 0),
        }
    }
}

/// Locator restricted to a node slice of a rectilinear grid.
///
/// The pinned axis is fixed at node index `slice`; the query's coordinate on
/// that axis is ignored. Weights cover the (up to) 4 slice nodes around the
/// query and the returned cell is the zone just above the slice (or the last
/// zone when the slice is the top node layer).
pub struct EdgeLocator<'a> {
    grid: &'a RectilinearGrid,
    direction: EdgeDirection,
    slice: usize,
    tolerance: f64,
    built: bool,
}

impl<'a> EdgeLocator<'a> {
    pub fn try_new(
        grid: &'a RectilinearGrid,
        direction: EdgeDirection,
        slice: usize,
        config: &LocatorConfig,
    ) -> Result<Self, MeshCompositeError> {
        let (_, _, pinned) = direction.axes();
        let n = grid.node_dims()[pinned];
        if slice >= n {
            return Err(MeshCompositeError::ImproperUse(format!(
                "slice {slice} is outside axis {pinned} with {n} nodes"
            )));
        }
        Ok(Self {
            grid,
            direction,
            slice,
            tolerance: config.tolerance,
            built: false,
        })
    }

    #[inline]
    pub fn direction(&self) -> EdgeDirection {
        self.direction
    }

    #[inline]
    pub fn slice(&self) -> usize {
        self.slice
    }
}

impl CellLocator for EdgeLocator<'_> {
    fn build(&mut self) -> LocatorStatus {
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
        let (a, b, pinned) = self.direction.axes();
        let hit = |axis: usize| {
            locate_on_axis(
                self.grid.coords(axis),
                self.grid.axis_order(axis),
                position[axis],
                self.tolerance,
            )
        };
        let ha = hit(a)?;
        let hb = hit(b)?;
        let zone_dims = self.grid.zone_dims();

        let mut zone_ijk = [0usize; 3];
        zone_ijk[a] = ha.zone();
        zone_ijk[b] = hb.zone();
        zone_ijk[pinned] = self.slice.min(zone_dims[pinned] - 1);
        let zone = self.grid.zone_index(zone_ijk[0], zone_ijk[1], zone_ijk[2]);
        if ignore_ghost_cells && self.grid.is_ghost_zone(zone) {
            return None;
        }

        for (nb, wb) in AxisHit::factors(hb) {
            for (na, wa) in AxisHit::factors(ha) {
                let mut ijk = [0usize; 3];
                ijk[a] = na;
                ijk[b] = nb;
                ijk[pinned] = self.slice;
                weights.push(self.grid.node_index(ijk[0], ijk[1], ijk[2]), wa * wb);
            }
        }
        Some(zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> RectilinearGrid {
        RectilinearGrid::try_new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0], vec![0.0, 2.0, 4.0])
            .unwrap()
    }

    #[test]
    fn xz_slice_weights() {
        let g = cube();
        let loc = EdgeLocator::try_new(&g, EdgeDirection::XZ, 1, &LocatorConfig::default())
            .unwrap();
        let mut w = InterpolationWeights::new();
        // y is pinned to node 1; the query's y is ignored
        let cell = loc.find_cell([1.25, -7.0, 3.0], &mut w, false).unwrap();
        assert_eq!(cell, g.zone_index(1, 0, 1));
        assert_eq!(w.len(), 4);
        let ids: Vec<usize> = w.point_ids().collect();
        assert_eq!(
            ids,
            vec![
                g.node_index(1, 1, 1),
                g.node_index(2, 1, 1),
                g.node_index(1, 1, 2),
                g.node_index(2, 1, 2)
            ]
        );
        assert!((w.sum() - 1.0).abs() < 1e-12);
        assert!((w.as_slice()[0].1 - 0.375).abs() < 1e-12);
    }

    #[test]
    fn slice_out_of_range() {
        let g = cube();
        assert!(EdgeLocator::try_new(&g, EdgeDirection::XY, 3, &LocatorConfig::default()).is_err());
    }
}
