//! Exact per-topology rasterization into a sample buffer.
//!
//! Volume cells write every sample whose centre falls inside them; surface
//! cells are projected onto the image plane and write one sample per pixel
//! at the depth slab nearest the interpolated depth. Writes are write-once,
//! so a sample on a shared face keeps the value of the first cell that
//! reached it.

use crate::data::mesh_chunk::CellId;
use crate::data::sample_buffer::SampleBuffer;
use crate::extract::frame::ViewParameters;
use crate::geometry::bounds::Aabb;
use crate::geometry::containment::{evaluate_parametric, evaluate_position};
use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;

/// One cell already mapped to view space, with per-vertex sample values.
pub struct CellSamples<'c> {
    pub cell: CellId,
    pub cell_type: CellType,
    /// View-space vertices in the topology's vertex order.
    pub verts: &'c [[f64; 3]],
    /// `verts.len() * n_vars` values, vertex-major.
    pub values: &'c [f64],
    pub n_vars: usize,
}

impl CellSamples<'_> {
    fn blend(&self, weights: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.resize(self.n_vars, 0.0);
        for (v, w) in weights.iter().enumerate() {
            let tuple = &self.values[v * self.n_vars..(v + 1) * self.n_vars];
            for (o, x) in out.iter_mut().zip(tuple) {
                *o += w * x;
            }
        }
    }
}

/// Exact rasterizer for a family of cell topologies.
pub trait TopologyExtractor {
    fn handles(&self, cell_type: CellType) -> bool;

    /// Writes the cell's samples; returns how many new samples were set.
    fn rasterize(
        &self,
        cell: &CellSamples<'_>,
        view: &ViewParameters,
        tol: f64,
        buffer: &mut SampleBuffer,
    ) -> Result<usize, MeshCompositeError>;
}

/// Axis-aligned voxels: closed-form trilinear weights.
///
/// A voxel the view transform rotates off the axes falls back to Newton
/// inversion of the same shape functions.
pub struct VoxelExtractor;

/// Tetrahedra: closed-form barycentric weights.
pub struct TetrahedronExtractor;

/// Hexahedra, wedges, pyramids and quadratic hexahedra: Newton inversion.
pub struct ParametricExtractor;

/// Triangles, quads, pixels and polygons projected onto the image plane.
pub struct SurfaceExtractor;

/// The extractor responsible for `cell_type`, if it can be rasterized.
pub fn extractor_for(cell_type: CellType) -> Option<&'static dyn TopologyExtractor> {
    const ALL: [&dyn TopologyExtractor; 4] = [
        &VoxelExtractor,
        &TetrahedronExtractor,
        &ParametricExtractor,
        &SurfaceExtractor,
    ];
    ALL.into_iter().find(|e| e.handles(cell_type))
}

/// Rasterizes one cell; point and line cells are improper use here.
pub fn rasterize_cell(
    cell: &CellSamples<'_>,
    view: &ViewParameters,
    tol: f64,
    buffer: &mut SampleBuffer,
) -> Result<usize, MeshCompositeError> {
    match extractor_for(cell.cell_type) {
        Some(ex) => ex.rasterize(cell, view, tol, buffer),
        None => Err(MeshCompositeError::ImproperUse(format!(
            "cell {} of type {:?} cannot be rasterized; use kernel extraction",
            cell.cell, cell.cell_type
        ))),
    }
}

/// Walks every sample inside the cell's view-space box.
fn rasterize_volume(
    cell: &CellSamples<'_>,
    view: &ViewParameters,
    buffer: &mut SampleBuffer,
    mut weights_at: impl FnMut([f64; 3], &mut Vec<f64>) -> Result<bool, MeshCompositeError>,
) -> Result<usize, MeshCompositeError> {
    let grid = &view.grid;
    let bb = Aabb::from_points(cell.verts);
    let (cols, rows) = view.clip(
        grid.index_range(0, bb.min[0], bb.max[0]),
        grid.index_range(1, bb.min[1], bb.max[1]),
    );
    let slabs = grid.index_range(2, bb.min[2], bb.max[2]);
    let mut w = Vec::with_capacity(cell.verts.len());
    let mut vals = Vec::with_capacity(cell.n_vars);
    let mut written = 0;
    for k in slabs {
        for row in rows.clone() {
            for col in cols.clone() {
                let p = grid.sample_position(col, row, k);
                if weights_at(p, &mut w)? {
                    cell.blend(&w, &mut vals);
                    if buffer.set_sample(col, row, k, &vals)? {
                        written += 1;
                    }
                }
            }
        }
    }
    Ok(written)
}

impl TopologyExtractor for VoxelExtractor {
    fn handles(&self, cell_type: CellType) -> bool {
        cell_type == CellType::Voxel
    }

    fn rasterize(
        &self,
        cell: &CellSamples<'_>,
        view: &ViewParameters,
        tol: f64,
        buffer: &mut SampleBuffer,
    ) -> Result<usize, MeshCompositeError> {
        let aligned = is_view_aligned_voxel(cell.verts);
        rasterize_volume(cell, view, buffer, |p, w| {
            if aligned {
                evaluate_position(CellType::Voxel, cell.verts, p, tol, w)
            } else {
                evaluate_parametric(CellType::Voxel, cell.verts, p, tol, w)
            }
        })
    }
}

/// `true` when the voxel's i/j/k edges run along view x/y/z.
fn is_view_aligned_voxel(v: &[[f64; 3]]) -> bool {
    if v.len() != 8 {
        return false;
    }
    let along = |a: usize, b: usize, axis: usize| {
        (0..3).all(|d| d == axis || v[a][d] == v[b][d])
    };
    along(0, 1, 0) && along(0, 2, 1) && along(0, 4, 2)
}

impl TopologyExtractor for TetrahedronExtractor {
    fn handles(&self, cell_type: CellType) -> bool {
        cell_type == CellType::Tetrahedron
    }

    fn rasterize(
        &self,
        cell: &CellSamples<'_>,
        view: &ViewParameters,
        tol: f64,
        buffer: &mut SampleBuffer,
    ) -> Result<usize, MeshCompositeError> {
        rasterize_volume(cell, view, buffer, |p, w| {
            evaluate_position(CellType::Tetrahedron, cell.verts, p, tol, w)
        })
    }
}

impl TopologyExtractor for ParametricExtractor {
    fn handles(&self, cell_type: CellType) -> bool {
        matches!(
            cell_type,
            CellType::Hexahedron
                | CellType::Wedge
                | CellType::Pyramid
                | CellType::QuadraticHexahedron
        )
    }

    fn rasterize(
        &self,
        cell: &CellSamples<'_>,
        view: &ViewParameters,
        tol: f64,
        buffer: &mut SampleBuffer,
    ) -> Result<usize, MeshCompositeError> {
        rasterize_volume(cell, view, buffer, |p, w| {
            evaluate_parametric(cell.cell_type, cell.verts, p, tol, w)
        })
    }
}

impl TopologyExtractor for SurfaceExtractor {
    fn handles(&self, cell_type: CellType) -> bool {
        matches!(
            cell_type,
            CellType::Triangle | CellType::Quad | CellType::Pixel | CellType::Polygon
        )
    }

    fn rasterize(
        &self,
        cell: &CellSamples<'_>,
        view: &ViewParameters,
        tol: f64,
        buffer: &mut SampleBuffer,
    ) -> Result<usize, MeshCompositeError> {
        let grid = &view.grid;
        let flat: Vec<[f64; 3]> = cell.verts.iter().map(|v| [v[0], v[1], 0.0]).collect();
        let bb = Aabb::from_points(&flat);
        let (cols, rows) = view.clip(
            grid.index_range(0, bb.min[0], bb.max[0]),
            grid.index_range(1, bb.min[1], bb.max[1]),
        );
        let mut w = Vec::with_capacity(flat.len());
        let mut vals = Vec::with_capacity(cell.n_vars);
        let mut written = 0;
        for row in rows {
            for col in cols.clone() {
                let s = grid.sample_position(col, row, 0);
                let p = [s[0], s[1], 0.0];
                let inside = match cell.cell_type {
                    // polygons: winding-number containment, mean value weights
                    ct @ (CellType::Triangle | CellType::Polygon) => {
                        evaluate_position(ct, &flat, p, tol, &mut w)?
                    }
                    // projected quads/pixels are general bilinear quads
                    ct => evaluate_parametric(ct, &flat, p, tol, &mut w)?,
                };
                if !inside {
                    continue;
                }
                let z: f64 = w.iter().zip(cell.verts).map(|(wi, v)| wi * v[2]).sum();
                let Some(k) = grid.nearest_slab(z) else {
                    continue;
                };
                cell.blend(&w, &mut vals);
                if buffer.set_sample(col, row, k, &vals)? {
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}
