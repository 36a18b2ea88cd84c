//! Assignment of image regions to ranks.

use crate::extract::frame::RestrictionWindow;
use crate::mesh_error::MeshCompositeError;
use serde::{Deserialize, Serialize};

/// One disjoint pixel region per rank over a `rows × cols` image.
///
/// Regions need not cover the whole image; pixels outside every region
/// have no owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagePartition {
    rows: usize,
    cols: usize,
    regions: Vec<RestrictionWindow>,
}

impl ImagePartition {
    /// Horizontal bands of near-equal height; earlier ranks get the extra rows.
    pub fn even_rows(rows: usize, cols: usize, n_ranks: usize) -> Result<Self, MeshCompositeError> {
        if n_ranks == 0 {
            return Err(MeshCompositeError::InvalidPartition(
                "partition needs at least one rank".into(),
            ));
        }
        let base = rows / n_ranks;
        let extra = rows % n_ranks;
        let mut start = 0;
        let regions = (0..n_ranks)
            .map(|r| {
                let h = base + usize::from(r < extra);
                let w = RestrictionWindow {
                    col_min: 0,
                    col_max: cols,
                    row_min: start,
                    row_max: start + h,
                };
                start += h;
                w
            })
            .collect();
        Ok(Self {
            rows,
            cols,
            regions,
        })
    }

    /// Validates that regions lie inside the image and do not overlap.
    pub fn from_regions(
        rows: usize,
        cols: usize,
        regions: Vec<RestrictionWindow>,
    ) -> Result<Self, MeshCompositeError> {
        for (i, r) in regions.iter().enumerate() {
            if r.col_min > r.col_max || r.row_min > r.row_max || r.col_max > cols || r.row_max > rows
            {
                return Err(MeshCompositeError::InvalidPartition(format!(
                    "region {i} {r:?} is not inside the {rows}x{cols} image"
                )));
            }
        }
        for (i, a) in regions.iter().enumerate() {
            for (j, b) in regions.iter().enumerate().skip(i + 1) {
                let cols_meet = a.col_min.max(b.col_min) < a.col_max.min(b.col_max);
                let rows_meet = a.row_min.max(b.row_min) < a.row_max.min(b.row_max);
                if cols_meet && rows_meet {
                    return Err(MeshCompositeError::InvalidPartition(format!(
                        "regions {i} and {j} overlap"
                    )));
                }
            }
        }
        Ok(Self {
            rows,
            cols,
            regions,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn n_ranks(&self) -> usize {
        self.regions.len()
    }

    pub fn region(&self, rank: usize) -> Option<&RestrictionWindow> {
        self.regions.get(rank)
    }

    pub fn regions(&self) -> &[RestrictionWindow] {
        &self.regions
    }

    /// Rank owning pixel `(col, row)`.
    pub fn owner_of(&self, col: usize, row: usize) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(col, row))
    }
}
