//! Sample extraction: turn the cells of a mesh chunk into samples on a
//! view-aligned lattice.
//!
//! Cells are first mapped to view space with the [`ViewTransform`]. Each is
//! then either rasterized exactly by the matching [`TopologyExtractor`] or
//! splatted by the kernel extractor, depending on [`ExtractionMode`].
//!
//! ```ignore
//! let ex = SampleExtractor::new(&chunk, &["pressure"], ExtractorConfig::default())?;
//! let mut buf = SampleBuffer::new(w, h, d, ex.n_vars());
//! let report = ex.extract(&view, &mut buf)?;
//! ```

pub mod frame;
pub mod kernel;
pub mod raster;

pub use frame::{RestrictionWindow, SampleGrid, ViewParameters, ViewTransform};
pub use kernel::{KernelParams, SplatOutcome};
pub use raster::{
    CellSamples, ParametricExtractor, SurfaceExtractor, TetrahedronExtractor, TopologyExtractor,
    VoxelExtractor,
};

use crate::data::field::{Centering, FieldArray};
use crate::data::mesh_chunk::{CellId, MeshChunk};
use crate::data::sample_buffer::SampleBuffer;
use crate::geometry::bounds::Aabb;
use crate::geometry::shape::cell_measure;
use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;
use serde::{Deserialize, Serialize};

/// How cells are turned into samples.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ExtractionMode {
    /// Exact rasterization only; point and line cells are rejected.
    Raster,
    /// Splat every cell.
    Kernel,
    /// Splat point-like, line and degenerate cells, rasterize the rest.
    #[default]
    Auto,
}

/// Extraction settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub mode: ExtractionMode,
    /// Splat radius as a multiple of the cell's centre-to-corner distance.
    pub radius_scale: f64,
    /// Lower bound on the splat radius, in units of the finest sample spacing.
    pub radius_floor: f64,
    /// Candidate-sample count above which a splatted cell is deferred.
    pub defer_threshold: usize,
    pub skip_ghost_zones: bool,
    /// Relative containment tolerance.
    pub tolerance: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Auto,
            radius_scale: 1.5,
            radius_floor: 1.0,
            defer_threshold: 64,
            skip_ghost_zones: true,
            tolerance: 1e-9,
        }
    }
}

impl ExtractorConfig {
    pub fn kernel_params(&self) -> KernelParams {
        KernelParams {
            radius_scale: self.radius_scale,
            radius_floor: self.radius_floor,
            defer_threshold: self.defer_threshold,
        }
    }
}

/// What one [`SampleExtractor::extract`] pass did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionReport {
    pub cells_rasterized: usize,
    pub cells_splatted: usize,
    /// Cells the kernel pass declined. In `Auto` mode these were rasterized
    /// afterwards; in `Kernel` mode they contributed nothing. Degenerate
    /// cells are never deferred in `Auto` mode.
    pub deferred: Vec<CellId>,
    pub ghost_skipped: usize,
    /// New exact samples plus kernel contributions.
    pub samples_written: usize,
}

/// Samples the bound fields of one chunk.
pub struct SampleExtractor<'a> {
    chunk: &'a MeshChunk,
    fields: Vec<&'a FieldArray>,
    n_vars: usize,
    config: ExtractorConfig,
}

impl<'a> SampleExtractor<'a> {
    /// Binds `variables` by name; sample values are their components in order.
    pub fn new(
        chunk: &'a MeshChunk,
        variables: &[&str],
        config: ExtractorConfig,
    ) -> Result<Self, MeshCompositeError> {
        let fields = variables
            .iter()
            .map(|name| chunk.try_field(name))
            .collect::<Result<Vec<_>, _>>()?;
        let n_vars = fields.iter().map(|f| f.components()).sum();
        Ok(Self {
            chunk,
            fields,
            n_vars,
            config,
        })
    }

    #[inline]
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    #[inline]
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Writes this chunk's samples into `buffer`.
    pub fn extract(
        &self,
        view: &ViewParameters,
        buffer: &mut SampleBuffer,
    ) -> Result<ExtractionReport, MeshCompositeError> {
        let [w, h, d] = view.grid.dims();
        if [buffer.width(), buffer.height(), buffer.depth()] != [w, h, d] {
            return Err(MeshCompositeError::ImproperUse(format!(
                "buffer is {}x{}x{}, sample grid is {w}x{h}x{d}",
                buffer.width(),
                buffer.height(),
                buffer.depth()
            )));
        }
        if buffer.n_vars() != self.n_vars {
            return Err(MeshCompositeError::ImproperUse(format!(
                "buffer holds {} variables, extractor produces {}",
                buffer.n_vars(),
                self.n_vars
            )));
        }

        let params = self.config.kernel_params();
        let tol = self.config.tolerance;
        let mut report = ExtractionReport::default();
        let mut verts = Vec::new();
        let mut values = Vec::new();

        for cell in self.chunk.cells() {
            if self.config.skip_ghost_zones && self.chunk.is_ghost_zone(cell) {
                report.ghost_skipped += 1;
                continue;
            }
            let ct = self.chunk.cell_type(cell);
            self.gather(cell, view, &mut verts, &mut values);
            let samples = CellSamples {
                cell,
                cell_type: ct,
                verts: &verts,
                values: &values,
                n_vars: self.n_vars,
            };
            let (splat, may_defer) = match self.config.mode {
                ExtractionMode::Raster => (false, false),
                ExtractionMode::Kernel => (true, !ct.is_point_like()),
                ExtractionMode::Auto => {
                    // degenerate cells have no interior to rasterize into
                    let degenerate = is_degenerate(ct, &verts, tol)?;
                    let splat = ct.is_point_like() || ct == CellType::Line || degenerate;
                    (splat, !degenerate && raster::extractor_for(ct).is_some())
                }
            };
            if !splat {
                report.samples_written += raster::rasterize_cell(&samples, view, tol, buffer)?;
                report.cells_rasterized += 1;
                continue;
            }
            match kernel::splat_cell(&samples, view, &params, may_defer, buffer)? {
                SplatOutcome::Splatted(n) => {
                    report.samples_written += n;
                    report.cells_splatted += 1;
                }
                SplatOutcome::Deferred => {
                    report.deferred.push(cell);
                    if self.config.mode == ExtractionMode::Auto {
                        report.samples_written +=
                            raster::rasterize_cell(&samples, view, tol, buffer)?;
                        report.cells_rasterized += 1;
                    }
                }
            }
        }
        log::debug!(
            "extracted {} cells: {} rasterized, {} splatted, {} deferred, {} ghosts skipped, {} samples",
            self.chunk.n_cells(),
            report.cells_rasterized,
            report.cells_splatted,
            report.deferred.len(),
            report.ghost_skipped,
            report.samples_written
        );
        Ok(report)
    }

    /// View-space vertices and per-vertex values of `cell`.
    fn gather(
        &self,
        cell: CellId,
        view: &ViewParameters,
        verts: &mut Vec<[f64; 3]>,
        values: &mut Vec<f64>,
    ) {
        let pts = self.chunk.cell_points(cell);
        let coords = self.chunk.points();
        verts.clear();
        verts.extend(pts.iter().map(|p| view.transform.apply(coords[*p])));
        values.clear();
        for p in pts {
            for f in &self.fields {
                let idx = match f.centering() {
                    Centering::Node => *p,
                    Centering::Zone => cell,
                };
                values.extend_from_slice(f.tuple(idx));
            }
        }
    }
}

/// Zero-measure cells (relative to their own size) have nothing to rasterize.
fn is_degenerate(ct: CellType, verts: &[[f64; 3]], tol: f64) -> Result<bool, MeshCompositeError> {
    let diag = Aabb::from_points(verts).diagonal();
    if diag == 0.0 {
        return Ok(true);
    }
    let measure = cell_measure(ct, verts)?;
    Ok(measure <= tol * diag.powi(i32::from(ct.dimension())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field::FieldArray;
    use crate::topology::ghost::GhostFlags;

    fn chunk() -> MeshChunk {
        let mut c = MeshChunk::new(vec![
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 2.0],
            [3.5, 3.5, 3.5],
        ]);
        c.try_add_cell(CellType::Tetrahedron, &[0, 1, 2, 3]).unwrap();
        c.try_add_cell(CellType::Vertex, &[4]).unwrap();
        c.add_field(FieldArray::scalar("t", Centering::Node, vec![1.0; 5]).unwrap())
            .unwrap();
        c.add_field(FieldArray::scalar("id", Centering::Zone, vec![10.0, 20.0]).unwrap())
            .unwrap();
        c
    }

    fn view() -> ViewParameters {
        let grid = SampleGrid::try_new(4, 4, 4, Aabb::new([0.0; 3], [4.0; 3])).unwrap();
        ViewParameters::new(ViewTransform::identity(), grid)
    }

    #[test]
    fn auto_mode_routes_cells() {
        let c = chunk();
        let ex = SampleExtractor::new(&c, &["t", "id"], ExtractorConfig::default()).unwrap();
        assert_eq!(ex.n_vars(), 2);
        let mut buf = SampleBuffer::new(4, 4, 4, 2);
        let rep = ex.extract(&view(), &mut buf).unwrap();
        assert_eq!((rep.cells_rasterized, rep.cells_splatted), (1, 1));
        assert!(rep.deferred.is_empty());
        assert_eq!(buf.sample(0, 0, 0).unwrap().values(), vec![1.0, 10.0]);
        assert_eq!(buf.sample(3, 3, 3).unwrap().values(), vec![1.0, 20.0]);
    }

    #[test]
    fn raster_mode_rejects_vertices() {
        let c = chunk();
        let cfg = ExtractorConfig {
            mode: ExtractionMode::Raster,
            ..Default::default()
        };
        let ex = SampleExtractor::new(&c, &["t"], cfg).unwrap();
        let mut buf = SampleBuffer::new(4, 4, 4, 1);
        assert!(matches!(
            ex.extract(&view(), &mut buf),
            Err(MeshCompositeError::ImproperUse(_))
        ));
    }

    #[test]
    fn ghost_zones_skipped() {
        let mut c = chunk();
        c.set_ghost_zones(vec![GhostFlags::DUPLICATED, GhostFlags::NONE])
            .unwrap();
        let ex = SampleExtractor::new(&c, &["t"], ExtractorConfig::default()).unwrap();
        let mut buf = SampleBuffer::new(4, 4, 4, 1);
        let rep = ex.extract(&view(), &mut buf).unwrap();
        assert_eq!(rep.ghost_skipped, 1);
        assert!(buf.sample(0, 0, 0).is_none());
    }

    #[test]
    fn mismatched_buffer_and_missing_field() {
        let c = chunk();
        assert!(matches!(
            SampleExtractor::new(&c, &["nope"], ExtractorConfig::default()),
            Err(MeshCompositeError::MissingField(_))
        ));
        let ex = SampleExtractor::new(&c, &["t"], ExtractorConfig::default()).unwrap();
        assert!(ex.extract(&view(), &mut SampleBuffer::new(4, 4, 3, 1)).is_err());
        assert!(ex.extract(&view(), &mut SampleBuffer::new(4, 4, 4, 2)).is_err());
    }
}
