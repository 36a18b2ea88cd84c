//! Domain boundaries of structured multi-block data.
//!
//! [`DomainBoundaries`] discovers which structured domains touch across which
//! faces, marks duplicated boundary nodes, and grows one layer of ghost zones
//! across every shared face. All entry points taking a [`ParallelContext`]
//! are collective.

pub mod adjacency;
pub mod ghost;

pub use adjacency::{DomainAdjacency, Face, Neighbor, face_signature};
pub use ghost::GhostedBlock;

use crate::algs::communicator::Communicator;
use crate::algs::context::ParallelContext;
use crate::data::structured::StructuredBlock;
use crate::mesh_error::MeshCompositeError;
use crate::topology::cache::InvalidateCache;
use crate::topology::ghost::GhostFlags;
use serde::{Deserialize, Serialize};

/// Ghost-zone builder settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostConfig {
    /// Keep the adjacency between calls until `invalidate_cache`.
    pub cache_adjacency: bool,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            cache_adjacency: true,
        }
    }
}

/// Adjacency discovery and ghost generation for equally sized structured domains.
#[derive(Debug)]
pub struct DomainBoundaries {
    dims: [usize; 3],
    config: GhostConfig,
    adjacency: Option<DomainAdjacency>,
}

impl DomainBoundaries {
    /// `dims` is the node count per axis every block must have.
    pub fn new(dims: [usize; 3], config: GhostConfig) -> Self {
        Self {
            dims,
            config,
            adjacency: None,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn config(&self) -> &GhostConfig {
        &self.config
    }

    pub fn cached_adjacency(&self) -> Option<&DomainAdjacency> {
        self.adjacency.as_ref()
    }

    /// Collective. Matches faces of every rank's blocks.
    pub fn compute_adjacency<C: Communicator>(
        &mut self,
        ctx: &ParallelContext<'_, C>,
        blocks: &[StructuredBlock],
    ) -> Result<DomainAdjacency, MeshCompositeError> {
        adjacency::check_blocks(self.dims, blocks)?;
        if let Some(adj) = &self.adjacency {
            return Ok(adj.clone());
        }
        let adj = adjacency::match_faces(ctx, blocks)?;
        if self.config.cache_adjacency {
            self.adjacency = Some(adj.clone());
        }
        Ok(adj)
    }

    /// Collective. Tags nodes on faces shared with a lower-numbered domain
    /// as `DUPLICATED`, so each shared node has exactly one owner.
    pub fn create_ghost_nodes<C: Communicator>(
        &mut self,
        ctx: &ParallelContext<'_, C>,
        blocks: &mut [StructuredBlock],
    ) -> Result<(), MeshCompositeError> {
        let adj = self.compute_adjacency(ctx, blocks)?;
        for block in blocks.iter_mut() {
            let dims = block.dims();
            let mut flags = block
                .ghost_nodes()
                .map_or_else(|| vec![GhostFlags::NONE; block.n_points()], <[_]>::to_vec);
            for face in Face::ALL {
                let Some(Neighbor::Domain(n)) = adj.neighbor(block.domain(), face) else {
                    continue;
                };
                if n >= block.domain() {
                    continue;
                }
                let a = face.axis();
                let at = if face.is_max() { dims[a] - 1 } else { 0 };
                for k in 0..dims[2] {
                    for j in 0..dims[1] {
                        for i in 0..dims[0] {
                            if [i, j, k][a] == at {
                                flags[block.node_index(i, j, k)].insert(GhostFlags::DUPLICATED);
                            }
                        }
                    }
                }
            }
            block.set_ghost_nodes(flags)?;
        }
        Ok(())
    }

    /// Collective. Returns each local block grown by one ghost-zone layer per
    /// shared face, in the order of `blocks`.
    pub fn create_ghost_zones<C: Communicator>(
        &mut self,
        ctx: &ParallelContext<'_, C>,
        blocks: &[StructuredBlock],
    ) -> Result<Vec<GhostedBlock>, MeshCompositeError> {
        let adj = self.compute_adjacency(ctx, blocks)?;
        ghost::grow_ghost_zones(ctx, &adj, blocks, self.dims)
    }

    /// Full mesh exchange between domains is not provided.
    pub fn exchange_mesh(&self) -> Result<(), MeshCompositeError> {
        log::error!("exchange_mesh requested; only ghost-zone exchange is supported");
        Err(MeshCompositeError::UnsupportedExchange("mesh"))
    }

    /// Full scalar-field exchange between domains is not provided.
    pub fn exchange_scalar(&self, _field: &str) -> Result<(), MeshCompositeError> {
        log::error!("exchange_scalar requested; only ghost-zone exchange is supported");
        Err(MeshCompositeError::UnsupportedExchange("scalar"))
    }

    /// Full vector-field exchange between domains is not provided.
    pub fn exchange_vector(&self, _field: &str) -> Result<(), MeshCompositeError> {
        log::error!("exchange_vector requested; only ghost-zone exchange is supported");
        Err(MeshCompositeError::UnsupportedExchange("vector"))
    }
}

impl InvalidateCache for DomainBoundaries {
    fn invalidate_cache(&mut self) {
        self.adjacency = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::data::field::{Centering, FieldArray};

    /// `n × 1` row of `dims`-sized unit-spaced blocks along I.
    fn row_of_blocks(n: usize, dims: [usize; 3]) -> Vec<StructuredBlock> {
        (0..n)
            .map(|b| {
                let mut pts = Vec::new();
                for k in 0..dims[2] {
                    for j in 0..dims[1] {
                        for i in 0..dims[0] {
                            let gi = b * (dims[0] - 1) + i;
                            pts.push([gi as f64, j as f64, k as f64]);
                        }
                    }
                }
                let mut blk = StructuredBlock::try_new(b, dims, pts).unwrap();
                let zones = vec![b as f64; blk.n_cells()];
                blk.add_field(FieldArray::scalar("owner", Centering::Zone, zones).unwrap())
                    .unwrap();
                blk
            })
            .collect()
    }

    #[test]
    fn ghost_nodes_on_lower_shared_faces() {
        let mut blocks = row_of_blocks(2, [3, 2, 1]);
        let comm = NoComm;
        let ctx = ParallelContext::new(&comm);
        let mut db = DomainBoundaries::new([3, 2, 1], GhostConfig::default());
        db.create_ghost_nodes(&ctx, &mut blocks).unwrap();
        let g0 = blocks[0].ghost_nodes().unwrap();
        assert!(g0.iter().all(|f| !f.is_ghost()));
        let g1 = blocks[1].ghost_nodes().unwrap();
        assert!(g1[blocks[1].node_index(0, 1, 0)].contains(GhostFlags::DUPLICATED));
        assert!(!g1[blocks[1].node_index(1, 1, 0)].is_ghost());
    }

    #[test]
    fn ghost_zones_copy_neighbour_layer() {
        let blocks = row_of_blocks(3, [3, 2, 1]);
        let comm = NoComm;
        let ctx = ParallelContext::new(&comm);
        let mut db = DomainBoundaries::new([3, 2, 1], GhostConfig::default());
        let out = db.create_ghost_zones(&ctx, &blocks).unwrap();
        let mid = &out[1];
        assert_eq!(mid.layers_lo(), [1, 0, 0]);
        assert_eq!(mid.layers_hi(), [1, 0, 0]);
        let b = mid.block();
        assert_eq!(b.dims(), [5, 2, 1]);
        let owner = b.field("owner").unwrap().values();
        assert_eq!(owner, &[0.0, 1.0, 1.0, 2.0]);
        let gz = b.ghost_zones().unwrap();
        assert!(gz[0].contains(GhostFlags::DUPLICATED) && !gz[1].is_ghost());
        assert_eq!(b.point(0, 0, 0), [1.0, 0.0, 0.0]);
        assert_eq!(b.point(4, 1, 0), [5.0, 1.0, 0.0]);
        assert_eq!(out[0].layers_lo(), [0, 0, 0]);
        assert!(db.cached_adjacency().is_some());
        db.invalidate_cache();
        assert!(db.cached_adjacency().is_none());
    }

    #[test]
    fn full_exchanges_unsupported() {
        let db = DomainBoundaries::new([2, 2, 2], GhostConfig::default());
        assert!(matches!(
            db.exchange_mesh(),
            Err(MeshCompositeError::UnsupportedExchange("mesh"))
        ));
        assert!(db.exchange_scalar("p").is_err());
        assert!(db.exchange_vector("v").is_err());
    }
}
