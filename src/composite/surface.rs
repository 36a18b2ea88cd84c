//! Reconstructs a surface mesh from one selected sample per ray.
//!
//! Each rank collapses the rays of its own image region to a single
//! `(depth, value)` pair, then a sum all-reduce assembles the full image-sized
//! arrays everywhere. Because every ray is owned by exactly one rank and
//! non-owners contribute zeros, the assembled arrays are bit-identical for any
//! partition. The mesh connects valid rays in 2×2 neighbourhoods.

use crate::algs::communicator::Communicator;
use crate::algs::context::{ParallelContext, ReduceOp};
use crate::composite::partition::ImagePartition;
use crate::data::field::{Centering, FieldArray};
use crate::data::mesh_chunk::MeshChunk;
use crate::data::sample_buffer::{Ray, Sample, SampleBuffer};
use crate::extract::frame::SampleGrid;
use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;
use serde::{Deserialize, Serialize};

/// Depth marker for rays with no selected sample.
pub const INVALID_DEPTH: f64 = f64::NEG_INFINITY;

/// Which sample of a ray represents it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SampleSelection {
    /// Front-most sample.
    #[default]
    First,
    /// Back-most sample.
    Last,
    /// Sample at index `len / 2` in front-to-back order.
    Middle,
}

impl SampleSelection {
    pub fn select(self, ray: &Ray) -> Option<(u32, &Sample)> {
        let picked = match self {
            SampleSelection::First => ray.iter().next(),
            SampleSelection::Last => ray.iter().next_back(),
            SampleSelection::Middle => ray.iter().nth(ray.len() / 2),
        };
        picked.map(|(k, s)| (*k, s))
    }
}

/// Output of [`SamplePointToSurfaceFilter::execute`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconstructedSurface {
    /// View-space positions of the valid rays.
    pub points: Vec<[f64; 3]>,
    /// Selected value per point.
    pub values: Vec<f64>,
    /// Quads and triangles over `points`.
    pub cells: Vec<(CellType, Vec<usize>)>,
}

impl ReconstructedSurface {
    pub fn n_quads(&self) -> usize {
        self.cells.iter().filter(|(t, _)| *t == CellType::Quad).count()
    }

    pub fn n_triangles(&self) -> usize {
        self.cells.iter().filter(|(t, _)| *t == CellType::Triangle).count()
    }

    /// The surface as a chunk with `values` as a node field named `field`.
    pub fn to_mesh_chunk(&self, field: &str) -> Result<MeshChunk, MeshCompositeError> {
        let mut chunk = MeshChunk::new(self.points.clone());
        for (ct, ids) in &self.cells {
            chunk.try_add_cell(*ct, ids)?;
        }
        chunk.add_field(FieldArray::scalar(field, Centering::Node, self.values.clone())?)?;
        Ok(chunk)
    }
}

/// Sample-buffer → surface filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplePointToSurfaceFilter {
    pub selection: SampleSelection,
    pub variable: usize,
}

impl SamplePointToSurfaceFilter {
    pub fn new(selection: SampleSelection, variable: usize) -> Self {
        Self {
            selection,
            variable,
        }
    }

    /// Collective. `buffer` holds this rank's region of `partition`, as
    /// produced by [`redistribute_samples`](super::redistribute_samples).
    pub fn execute<C: Communicator>(
        &self,
        ctx: &ParallelContext<'_, C>,
        buffer: &SampleBuffer,
        grid: &SampleGrid,
        partition: &ImagePartition,
    ) -> Result<ReconstructedSurface, MeshCompositeError> {
        if grid.dims() != [buffer.width(), buffer.height(), buffer.depth()] {
            return Err(MeshCompositeError::ImproperUse(format!(
                "sample grid {:?} does not match a {}x{}x{} buffer",
                grid.dims(),
                buffer.width(),
                buffer.height(),
                buffer.depth()
            )));
        }
        if self.variable >= buffer.n_vars() {
            return Err(MeshCompositeError::ImproperUse(format!(
                "variable {} out of range for {} variables",
                self.variable,
                buffer.n_vars()
            )));
        }
        let region = partition.region(ctx.rank()).ok_or_else(|| {
            MeshCompositeError::InvalidPartition(format!("no region for rank {}", ctx.rank()))
        })?;

        let n = buffer.width() * buffer.height();
        let mut depth = vec![0.0; n];
        let mut value = vec![0.0; n];
        let mut count = vec![0u64; n];
        for (col, row, ray) in buffer.rays() {
            if !region.contains(col, row) {
                continue;
            }
            if let Some((k, s)) = self.selection.select(ray) {
                let i = buffer.ray_index(col, row);
                depth[i] = grid.sample_position(col, row, k as usize)[2];
                value[i] = s.value(self.variable);
                count[i] = 1;
            }
        }
        let depth = ctx.all_reduce_f64(&depth, ReduceOp::Sum)?;
        let value = ctx.all_reduce_f64(&value, ReduceOp::Sum)?;
        let count = ctx.all_reduce_u64(&count, ReduceOp::Sum)?;
        let depth: Vec<f64> = depth
            .into_iter()
            .zip(&count)
            .map(|(d, c)| if *c == 0 { INVALID_DEPTH } else { d })
            .collect();

        let surface = build_surface(grid, buffer.width(), buffer.height(), &depth, &value);
        log::debug!(
            "surface: {} points, {} quads, {} triangles",
            surface.points.len(),
            surface.n_quads(),
            surface.n_triangles()
        );
        Ok(surface)
    }
}

fn build_surface(
    grid: &SampleGrid,
    width: usize,
    height: usize,
    depth: &[f64],
    value: &[f64],
) -> ReconstructedSurface {
    let mut out = ReconstructedSurface::default();
    let mut point_of = vec![usize::MAX; depth.len()];
    for row in 0..height {
        for col in 0..width {
            let i = row * width + col;
            if depth[i] == INVALID_DEPTH {
                continue;
            }
            let p = grid.sample_position(col, row, 0);
            point_of[i] = out.points.len();
            out.points.push([p[0], p[1], depth[i]]);
            out.values.push(value[i]);
        }
    }
    for row in 0..height.saturating_sub(1) {
        for col in 0..width.saturating_sub(1) {
            let ring = [
                row * width + col,
                row * width + col + 1,
                (row + 1) * width + col + 1,
                (row + 1) * width + col,
            ];
            let ids: Vec<usize> = ring
                .iter()
                .map(|i| point_of[*i])
                .filter(|p| *p != usize::MAX)
                .collect();
            match ids.len() {
                4 => out.cells.push((CellType::Quad, ids)),
                3 => out.cells.push((CellType::Triangle, ids)),
                _ => {}
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::geometry::bounds::Aabb;

    #[test]
    fn selection_picks_by_order() {
        let mut ray = Ray::new();
        for k in [4u32, 1, 7] {
            ray.insert(k, Sample::exact(&[k as f64]));
        }
        assert_eq!(SampleSelection::First.select(&ray).unwrap().0, 1);
        assert_eq!(SampleSelection::Last.select(&ray).unwrap().0, 7);
        assert_eq!(SampleSelection::Middle.select(&ray).unwrap().0, 4);
        assert!(SampleSelection::First.select(&Ray::new()).is_none());
    }

    #[test]
    fn quads_and_triangles() {
        let grid = SampleGrid::try_new(3, 2, 2, Aabb::new([0.0; 3], [3.0, 2.0, 2.0])).unwrap();
        let mut buf = SampleBuffer::new(3, 2, 2, 1);
        for (c, r) in [(0, 0), (1, 0), (0, 1), (1, 1), (2, 0)] {
            buf.set_sample(c, r, 1, &[c as f64]).unwrap();
        }
        let comm = NoComm;
        let ctx = ParallelContext::new(&comm);
        let part = ImagePartition::even_rows(2, 3, 1).unwrap();
        let s = SamplePointToSurfaceFilter::default()
            .execute(&ctx, &buf, &grid, &part)
            .unwrap();
        assert_eq!(s.points.len(), 5);
        assert_eq!((s.n_quads(), s.n_triangles()), (1, 1));
        assert_eq!(s.points[0], [0.5, 0.5, 1.5]);
        let chunk = s.to_mesh_chunk("v").unwrap();
        assert_eq!(chunk.n_cells(), 2);
    }
}
