//! Bounded LRU cache of loaded domains and their locator indices.

use crate::data::mesh_chunk::{CellId, MeshChunk};
use crate::geometry::weights::InterpolationWeights;
use crate::locate::LocatorConfig;
use crate::locate::bucket::BucketIndex;
use crate::mesh_error::MeshCompositeError;
use crate::topology::cache::InvalidateCache;
use once_cell::sync::OnceCell;
use std::collections::VecDeque;
use std::sync::Arc;

/// Source of mesh chunks: "given domain id and timestep, produce the chunk".
pub trait MeshProvider {
    fn load_chunk(&self, domain: usize, timestep: usize) -> Result<MeshChunk, MeshCompositeError>;
}

impl<F> MeshProvider for F
where
    F: Fn(usize, usize) -> Result<MeshChunk, MeshCompositeError>,
{
    fn load_chunk(&self, domain: usize, timestep: usize) -> Result<MeshChunk, MeshCompositeError> {
        self(domain, timestep)
    }
}

/// A loaded domain; its bucket index is built on first query.
#[derive(Debug)]
pub struct CachedDomain {
    domain: usize,
    timestep: usize,
    chunk: MeshChunk,
    config: LocatorConfig,
    index: OnceCell<BucketIndex>,
}

impl CachedDomain {
    #[inline]
    pub fn domain(&self) -> usize {
        self.domain
    }

    #[inline]
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    #[inline]
    pub fn chunk(&self) -> &MeshChunk {
        &self.chunk
    }

    pub fn index(&self) -> &BucketIndex {
        self.index
            .get_or_init(|| BucketIndex::build(&self.chunk, &self.config))
    }

    pub fn is_indexed(&self) -> bool {
        self.index.get().is_some()
    }

    pub fn find_cell(
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
            .find_cell(&self.chunk, position, weights, ignore_ghost_cells)
    }
}

/// LRU queue of `(domain, timestep)` entries, most recent at the back.
pub struct DomainCache {
    max_len: usize,
    config: LocatorConfig,
    entries: VecDeque<Arc<CachedDomain>>,
    hits: usize,
    misses: usize,
}

impl DomainCache {
    pub fn new(max_len: usize, config: LocatorConfig) -> Self {
        Self {
            max_len,
            config,
            entries: VecDeque::with_capacity(max_len),
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    pub fn contains(&self, domain: usize, timestep: usize) -> bool {
        self.position(domain, timestep).is_some()
    }

    fn position(&self, domain: usize, timestep: usize) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.domain == domain && e.timestep == timestep)
    }

    /// Returns the cached domain, loading it through `provider` on a miss.
    ///
    /// A hit moves the entry to the most-recent end. A miss may evict the
    /// least-recently-used entry, which drops its index with it.
    pub fn get_or_load<P: MeshProvider + ?Sized>(
        &mut self,
        provider: &P,
        domain: usize,
        timestep: usize,
    ) -> Result<Arc<CachedDomain>, MeshCompositeError> {
        if let Some(pos) = self.position(domain, timestep) {
            self.hits += 1;
            let entry = self.entries.remove(pos).ok_or_else(|| {
                MeshCompositeError::ImproperUse("domain cache entry vanished".into())
            })?;
            self.entries.push_back(entry.clone());
            return Ok(entry);
        }
        self.misses += 1;
        let chunk = provider.load_chunk(domain, timestep)?;
        let entry = Arc::new(CachedDomain {
            domain,
            timestep,
            chunk,
            config: self.config.clone(),
            index: OnceCell::new(),
        });
        if self.max_len == 0 {
            return Ok(entry);
        }
        while self.entries.len() >= self.max_len {
            if let Some(old) = self.entries.pop_front() {
                log::debug!(
                    "domain cache: evicting domain {} timestep {} (indexed: {})",
                    old.domain,
                    old.timestep,
                    old.is_indexed()
                );
            }
        }
        self.entries.push_back(entry.clone());
        Ok(entry)
    }
}

impl InvalidateCache for DomainCache {
    fn invalidate_cache(&mut self) {
        self.entries.clear();
    }
}
