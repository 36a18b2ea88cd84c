//! Uniform octree-leaf index over a chunk's cell bounding boxes.
//!
//! The leaves form a `2^depth` grid per axis over the (padded) chunk bounds.
//! Candidate lists are stored CSR-style: leaf `l` owns
//! `cells[offsets[l]..offsets[l + 1]]`, sorted by cell id. A cell appears in
//! every leaf its bounding box overlaps.

use crate::data::mesh_chunk::{CellId, MeshChunk};
use crate::geometry::bounds::Aabb;
use crate::geometry::containment::evaluate_position;
use crate::geometry::weights::InterpolationWeights;
use crate::locate::{CellLocator, LocatorConfig, LocatorStatus};
use crate::topology::cache::InvalidateCache;
use once_cell::sync::OnceCell;

/// Fraction of the longest extent used to thicken flat axes.
const FLAT_PAD: f64 = 1e-3;

/// Immutable CSR bucket grid.
#[derive(Clone, Debug)]
pub struct BucketIndex {
    bounds: Aabb,
    depth: u32,
    divisions: usize,
    tolerance: f64,
    offsets: Vec<u32>,
    cells: Vec<u32>,
}

/// Hard ceiling on octree depth; `8^10` leaves.
pub const DEPTH_LIMIT: u32 = 10;

/// Octree depth for `n_cells` cells: `ceil(log8(n / bucket))`, capped by
/// `max_depth` and [`DEPTH_LIMIT`].
pub fn octree_depth(n_cells: usize, bucket_size: usize, max_depth: u32) -> u32 {
    let bucket = bucket_size.max(1);
    if n_cells <= bucket {
        return 0;
    }
    let ratio = n_cells as f64 / bucket as f64;
    let levels = (ratio.ln() / 8f64.ln()).ceil() as u32;
    levels.min(max_depth).min(DEPTH_LIMIT)
}

impl BucketIndex {
    /// Builds the index over every cell of `chunk`.
    pub fn build(chunk: &MeshChunk, config: &LocatorConfig) -> Self {
        let n_cells = chunk.n_cells();
        let cell_bounds = cell_bounds(chunk);
        let mut bounds = cell_bounds
            .iter()
            .fold(Aabb::empty(), |acc, b| acc.union(b))
            .pad_degenerate(FLAT_PAD);
        let slack = config.tolerance * bounds.diagonal();
        for a in 0..3 {
            bounds.min[a] -= slack;
            bounds.max[a] += slack;
        }

        let depth = octree_depth(n_cells, config.bucket_size, config.max_depth);
        let divisions = 1usize << depth;
        let n_leaves = divisions * divisions * divisions;
        let mut index = Self {
            bounds,
            depth,
            divisions,
            tolerance: config.tolerance,
            offsets: vec![0; n_leaves + 1],
            cells: Vec::new(),
        };
        if n_cells == 0 {
            return index;
        }

        // 1) per-leaf counts
        let ranges: Vec<([usize; 3], [usize; 3])> = cell_bounds
            .iter()
            .map(|b| {
                let pad = slack.max(config.tolerance * b.diagonal());
                let lo = [b.min[0] - pad, b.min[1] - pad, b.min[2] - pad];
                let hi = [b.max[0] + pad, b.max[1] + pad, b.max[2] + pad];
                (index.leaf_coords_clamped(&lo), index.leaf_coords_clamped(&hi))
            })
            .collect();
        let mut counts = vec![0u32; n_leaves];
        for (lo, hi) in &ranges {
            for_each_leaf(*lo, *hi, divisions, |leaf| counts[leaf] += 1);
        }

        // 2) prefix sums
        for l in 0..n_leaves {
            index.offsets[l + 1] = index.offsets[l] + counts[l];
        }

        // 3) fill in ascending cell order so each leaf list is sorted
        let mut write: Vec<u32> = index.offsets[..n_leaves].to_vec();
        index.cells = vec![0; index.offsets[n_leaves] as usize];
        for (cell, (lo, hi)) in ranges.iter().enumerate() {
            for_each_leaf(*lo, *hi, divisions, |leaf| {
                index.cells[write[leaf] as usize] = cell as u32;
                write[leaf] += 1;
            });
        }

        log::debug!(
            "bucket index: {n_cells} cells, depth {depth}, {n_leaves} leaves, {} entries",
            index.cells.len()
        );
        index
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Total number of `(leaf, cell)` entries.
    pub fn n_entries(&self) -> usize {
        self.cells.len()
    }

    fn leaf_coords_clamped(&self, p: &[f64; 3]) -> [usize; 3] {
        let mut out = [0usize; 3];
        let ext = self.bounds.extent();
        for a in 0..3 {
            let t = if ext[a] > 0.0 {
                (p[a] - self.bounds.min[a]) / ext[a]
            } else {
                0.0
            };
            let i = (t * self.divisions as f64).floor();
            out[a] = if i <= 0.0 {
                0
            } else {
                (i as usize).min(self.divisions - 1)
            };
        }
        out
    }

    /// Leaf containing `p`, or `None` outside the indexed bounds.
    pub fn leaf_of(&self, p: &[f64; 3]) -> Option<usize> {
        if !self.bounds.contains(p) {
            return None;
        }
        let [i, j, k] = self.leaf_coords_clamped(p);
        Some(i + self.divisions * (j + self.divisions * k))
    }

    /// Candidate cells for `p`, ascending.
    pub fn candidates(&self, p: &[f64; 3]) -> &[u32] {
        match self.leaf_of(p) {
            Some(leaf) => {
                let lo = self.offsets[leaf] as usize;
                let hi = self.offsets[leaf + 1] as usize;
                &self.cells[lo..hi]
            }
            None => &[],
        }
    }

    /// First candidate cell of `chunk` that contains `p`.
    ///
    /// `chunk` must be the chunk the index was built from.
    pub fn find_cell(
        &self,
        chunk: &MeshChunk,
        p: [f64; 3],
        weights: &mut InterpolationWeights,
        ignore_ghost_cells: bool,
    ) -> Option<CellId> {
        weights.clear();
        let mut verts = Vec::with_capacity(8);
        let mut local = Vec::with_capacity(8);
        for &c in self.candidates(&p) {
            let cell = c as usize;
            if ignore_ghost_cells && chunk.is_ghost_zone(cell) {
                continue;
            }
            chunk.cell_vertices(cell, &mut verts);
            let ct = chunk.cell_type(cell);
            match evaluate_position(ct, &verts, p, self.tolerance, &mut local) {
                Ok(true) => {
                    weights.assign(chunk.cell_points(cell), &local);
                    return Some(cell);
                }
                Ok(false) => {}
                Err(e) => log::warn!("skipping cell {cell}: {e}"),
            }
        }
        None
    }
}

fn for_each_leaf(lo: [usize; 3], hi: [usize; 3], divisions: usize, mut f: impl FnMut(usize)) {
    for k in lo[2]..=hi[2] {
        for j in lo[1]..=hi[1] {
            for i in lo[0]..=hi[0] {
                f(i + divisions * (j + divisions * k));
            }
        }
    }
}

#[cfg(feature = "rayon")]
fn cell_bounds(chunk: &MeshChunk) -> Vec<Aabb> {
    use rayon::prelude::*;
    (0..chunk.n_cells())
        .into_par_iter()
        .map(|c| chunk.cell_bounds(c))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn cell_bounds(chunk: &MeshChunk) -> Vec<Aabb> {
    chunk.cells().map(|c| chunk.cell_bounds(c)).collect()
}

/// Locator over an arbitrary chunk; the index is built on first use.
pub struct BucketLocator<'a> {
    chunk: &'a MeshChunk,
    config: LocatorConfig,
    index: OnceCell<BucketIndex>,
}

impl<'a> BucketLocator<'a> {
    pub fn new(chunk: &'a MeshChunk, config: LocatorConfig) -> Self {
        Self {
            chunk,
            config,
            index: OnceCell::new(),
        }
    }

    pub fn chunk(&self) -> &'a MeshChunk {
        self.chunk
    }

    /// The index, building it if needed.
    pub fn index(&self) -> &BucketIndex {
        self.index
            .get_or_init(|| BucketIndex::build(self.chunk, &self.config))
    }
}

impl CellLocator for BucketLocator<'_> {
    fn build(&mut self) -> LocatorStatus {
        if self.chunk.n_cells() == 0 {
            log::warn!("bucket locator built on a chunk with no cells");
            return LocatorStatus::NoData;
        }
        self.index();
        LocatorStatus::Built
    }

    fn is_built(&self) -> bool {
        self.index.get().is_some()
    }

    fn find_cell(
        &self,
        position: [f64; 3],
        weights: &mut InterpolationWeights,
        ignore_ghost_cells: bool,
    ) -> Option<CellId> {
        if self.chunk.n_cells() == 0 {
            weights.clear();
            return None;
        }
        self.index()
            .find_cell(self.chunk, position, weights, ignore_ghost_cells)
    }
}

impl InvalidateCache for BucketLocator<'_> {
    fn invalidate_cache(&mut self) {
        self.index = OnceCell::new();
    }
}
