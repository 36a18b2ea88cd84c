//! Kernel (splat) extraction for cells that have no volume to rasterize.
//!
//! Each cell vertex spreads its values over the samples within a radius
//! derived from the cell's size, weighted by inverse squared distance.

use crate::data::sample_buffer::SampleBuffer;
use crate::extract::frame::ViewParameters;
use crate::extract::raster::CellSamples;
use crate::geometry::bounds::Aabb;
use crate::geometry::shape::{norm, sub};
use crate::mesh_error::MeshCompositeError;
use std::ops::Range;

/// Distances below this fraction of the finest spacing are clamped.
const MIN_DISTANCE_FRACTION: f64 = 1e-3;

/// Result of splatting one cell.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SplatOutcome {
    /// Number of sample contributions accumulated.
    Splatted(usize),
    /// Too many candidate samples; nothing was written.
    Deferred,
}

/// Kernel parameters, taken from [`ExtractorConfig`](super::ExtractorConfig).
#[derive(Clone, Copy, Debug)]
pub struct KernelParams {
    pub radius_scale: f64,
    pub radius_floor: f64,
    pub defer_threshold: usize,
}

/// Splat radius for a cell with view-space bounds `bb`.
pub fn splat_radius(bb: &Aabb, view: &ViewParameters, params: &KernelParams) -> f64 {
    let r = params.radius_scale * norm(sub(bb.center(), bb.max));
    r.max(params.radius_floor * view.grid.min_spacing())
}

type Candidates = (Range<usize>, Range<usize>, Range<usize>);

fn candidates(v: &[f64; 3], r: f64, view: &ViewParameters) -> Candidates {
    let g = &view.grid;
    let (cols, rows) = view.clip(
        g.index_range(0, v[0] - r, v[0] + r),
        g.index_range(1, v[1] - r, v[1] + r),
    );
    (cols, rows, g.index_range(2, v[2] - r, v[2] + r))
}

/// Splats `cell` into `buffer`.
///
/// With `may_defer`, a cell whose vertices would touch more than
/// `defer_threshold` candidate samples is left untouched and reported as
/// [`SplatOutcome::Deferred`].
pub fn splat_cell(
    cell: &CellSamples<'_>,
    view: &ViewParameters,
    params: &KernelParams,
    may_defer: bool,
    buffer: &mut SampleBuffer,
) -> Result<SplatOutcome, MeshCompositeError> {
    let bb = Aabb::from_points(cell.verts);
    let r = splat_radius(&bb, view, params);
    let boxes: Vec<Candidates> = cell.verts.iter().map(|v| candidates(v, r, view)).collect();
    if may_defer {
        let total: usize = boxes.iter().map(|(c, w, k)| c.len() * w.len() * k.len()).sum();
        if total > params.defer_threshold {
            return Ok(SplatOutcome::Deferred);
        }
    }
    let d_min = MIN_DISTANCE_FRACTION * view.grid.min_spacing();
    let mut written = 0;
    for (vi, (v, (cols, rows, slabs))) in cell.verts.iter().zip(boxes).enumerate() {
        let values = &cell.values[vi * cell.n_vars..(vi + 1) * cell.n_vars];
        for k in slabs {
            for row in rows.clone() {
                for col in cols.clone() {
                    let s = view.grid.sample_position(col, row, k);
                    let d = norm(sub(s, *v));
                    if d > r {
                        continue;
                    }
                    let w = 1.0 / (d.max(d_min) * d.max(d_min));
                    buffer.accumulate_sample(col, row, k, values, w)?;
                    written += 1;
                }
            }
        }
    }
    Ok(SplatOutcome::Splatted(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::frame::{RestrictionWindow, SampleGrid, ViewTransform};
    use crate::topology::cell_type::CellType;

    fn view() -> ViewParameters {
        let grid = SampleGrid::try_new(8, 8, 8, Aabb::new([0.0; 3], [8.0; 3])).unwrap();
        ViewParameters::new(ViewTransform::identity(), grid)
    }

    const PARAMS: KernelParams = KernelParams {
        radius_scale: 1.5,
        radius_floor: 1.0,
        defer_threshold: 64,
    };

    #[test]
    fn vertex_uses_floor_radius() {
        let verts = [[3.5, 3.5, 3.5]];
        let cell = CellSamples {
            cell: 0,
            cell_type: CellType::Vertex,
            verts: &verts,
            values: &[2.0],
            n_vars: 1,
        };
        let mut buf = SampleBuffer::new(8, 8, 8, 1);
        let out = splat_cell(&cell, &view(), &PARAMS, false, &mut buf).unwrap();
        // the centre sample plus its six face neighbours at distance 1
        assert_eq!(out, SplatOutcome::Splatted(7));
        let s = buf.sample(3, 3, 3).unwrap();
        assert!((s.value(0) - 2.0).abs() < 1e-12);
        assert!(buf.sample(4, 4, 3).is_none());
    }

    #[test]
    fn large_line_defers() {
        let verts = [[0.5, 0.5, 0.5], [7.5, 7.5, 7.5]];
        let cell = CellSamples {
            cell: 4,
            cell_type: CellType::Line,
            verts: &verts,
            values: &[0.0, 1.0],
            n_vars: 1,
        };
        let mut buf = SampleBuffer::new(8, 8, 8, 1);
        assert_eq!(
            splat_cell(&cell, &view(), &PARAMS, true, &mut buf).unwrap(),
            SplatOutcome::Deferred
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn window_limits_writes() {
        let verts = [[3.5, 3.5, 3.5]];
        let cell = CellSamples {
            cell: 0,
            cell_type: CellType::Vertex,
            verts: &verts,
            values: &[1.0],
            n_vars: 1,
        };
        let v = view().with_window(RestrictionWindow {
            col_min: 4,
            col_max: 8,
            row_min: 0,
            row_max: 8,
        });
        let mut buf = SampleBuffer::new(8, 8, 8, 1);
        splat_cell(&cell, &v, &PARAMS, false, &mut buf).unwrap();
        assert_eq!(buf.n_samples(), 1);
        assert!(buf.sample(4, 3, 3).is_some());
    }
}
