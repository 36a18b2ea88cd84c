//! Face-matching adjacency between structured domains.
//!
//! Every active face of every block is summarised by three corner points
//! (the face's first node and the far ends of its two transverse edges)
//! stored as raw `f64` bits. After an all-gather, entries are sorted by
//! signature; equal runs pair domains whose faces lie on opposite sides.
//! Matching is bit-exact: blocks must be cut from one shared lattice.

use crate::algs::communicator::Communicator;
use crate::algs::context::ParallelContext;
use crate::algs::wire::{KIND_FACES, WireCount, WireFaceEntry, WireReader, WireWriter};
use crate::data::structured::StructuredBlock;
use crate::mesh_error::MeshCompositeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the six logical faces of a structured block.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[repr(u8)]
pub enum Face {
    IMin = 0,
    IMax = 1,
    JMin = 2,
    JMax = 3,
    KMin = 4,
    KMax = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::IMin,
        Face::IMax,
        Face::JMin,
        Face::JMax,
        Face::KMin,
        Face::KMax,
    ];

    /// Logical axis the face is normal to.
    #[inline]
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    #[inline]
    pub fn is_max(self) -> bool {
        self as usize % 2 == 1
    }

    pub fn opposite(self) -> Face {
        Face::ALL[self as usize ^ 1]
    }

    pub fn from_axis(axis: usize, max: bool) -> Face {
        Face::ALL[axis * 2 + usize::from(max)]
    }

    fn from_u8(v: u8) -> Option<Face> {
        Face::ALL.get(usize::from(v)).copied()
    }
}

/// What lies across a face.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Neighbor {
    #[default]
    Exterior,
    Domain(usize),
}

/// Per-domain face neighbours plus the rank owning each domain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DomainAdjacency {
    faces: BTreeMap<usize, [Neighbor; 6]>,
    owners: BTreeMap<usize, usize>,
}

impl DomainAdjacency {
    pub fn neighbor(&self, domain: usize, face: Face) -> Option<Neighbor> {
        self.faces.get(&domain).map(|f| f[face as usize])
    }

    pub fn faces(&self, domain: usize) -> Option<&[Neighbor; 6]> {
        self.faces.get(&domain)
    }

    pub fn owner(&self, domain: usize) -> Option<usize> {
        self.owners.get(&domain).copied()
    }

    pub fn domains(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces.keys().copied()
    }

    pub fn n_domains(&self) -> usize {
        self.faces.len()
    }

    /// Number of (domain, face) pairs with a domain neighbour.
    pub fn n_links(&self) -> usize {
        self.faces
            .values()
            .flat_map(|f| f.iter())
            .filter(|n| matches!(n, Neighbor::Domain(_)))
            .count()
    }

    /// `true` when every link has a matching link back on the opposite face.
    pub fn is_symmetric(&self) -> bool {
        self.faces.iter().all(|(d, faces)| {
            Face::ALL.iter().all(|f| match faces[*f as usize] {
                Neighbor::Exterior => true,
                Neighbor::Domain(n) => {
                    self.neighbor(n, f.opposite()) == Some(Neighbor::Domain(*d))
                }
            })
        })
    }
}

/// Corner signature of `face`, or `None` when its axis is flat.
pub fn face_signature(block: &StructuredBlock, face: Face) -> Option<[u64; 9]> {
    let dims = block.dims();
    let a = face.axis();
    if dims[a] < 2 {
        return None;
    }
    let (b, c) = ((a + 1) % 3, (a + 2) % 3);
    let mut first = [0usize; 3];
    first[a] = if face.is_max() { dims[a] - 1 } else { 0 };
    let mut end_b = first;
    end_b[b] = dims[b] - 1;
    let mut end_c = first;
    end_c[c] = dims[c] - 1;
    let mut sig = [0u64; 9];
    for (n, ijk) in [first, end_b, end_c].iter().enumerate() {
        let p = block.point(ijk[0], ijk[1], ijk[2]);
        for d in 0..3 {
            sig[3 * n + d] = p[d].to_bits();
        }
    }
    Some(sig)
}

pub(crate) fn check_blocks(
    dims: [usize; 3],
    blocks: &[StructuredBlock],
) -> Result<(), MeshCompositeError> {
    for (i, b) in blocks.iter().enumerate() {
        if b.dims() != dims {
            return Err(MeshCompositeError::DomainDimensionMismatch {
                domain: b.domain(),
                expected: dims,
                found: b.dims(),
            });
        }
        if blocks[..i].iter().any(|o| o.domain() == b.domain()) {
            return Err(MeshCompositeError::ImproperUse(format!(
                "domain {} appears twice on one rank",
                b.domain()
            )));
        }
    }
    Ok(())
}

/// Collective face matching over every rank's blocks.
pub(crate) fn match_faces<C: Communicator>(
    ctx: &ParallelContext<'_, C>,
    blocks: &[StructuredBlock],
) -> Result<DomainAdjacency, MeshCompositeError> {
    let rank = ctx.rank();
    let mut w = WireWriter::with_header(KIND_FACES);
    w.put(&WireCount::new(blocks.len()));
    for b in blocks {
        w.put_u64(b.domain() as u64);
    }
    let entries: Vec<WireFaceEntry> = blocks
        .iter()
        .flat_map(|b| {
            Face::ALL.iter().filter_map(move |f| {
                face_signature(b, *f).map(|sig| WireFaceEntry::new(sig, b.domain(), *f as u8, rank))
            })
        })
        .collect();
    w.put(&WireCount::new(entries.len()));
    for e in &entries {
        w.put(e);
    }

    let mut adj = DomainAdjacency::default();
    let mut all = Vec::new();
    for (src, buf) in ctx.all_gather_bytes(&w.finish())?.iter().enumerate() {
        let mut r = WireReader::expect_header(buf, KIND_FACES)?;
        let n_domains = r.get::<WireCount>()?.get();
        for _ in 0..n_domains {
            let d = r.get_u64()? as usize;
            if let Some(prev) = adj.owners.insert(d, src) {
                return Err(MeshCompositeError::ImproperUse(format!(
                    "domain {d} is owned by both rank {prev} and rank {src}"
                )));
            }
            adj.faces.insert(d, [Neighbor::Exterior; 6]);
        }
        let n_faces = r.get::<WireCount>()?.get();
        for _ in 0..n_faces {
            let e: WireFaceEntry = r.get()?;
            let face = Face::from_u8(e.face())
                .ok_or_else(|| MeshCompositeError::Wire(format!("bad face id {}", e.face())))?;
            all.push((e.signature(), e.domain(), face));
        }
        r.finish()?;
    }

    all.sort_unstable();
    let mut unmatched = 0usize;
    for run in all.chunk_by(|a, b| a.0 == b.0) {
        if run.len() < 2 {
            continue;
        }
        for (_, d, f) in run {
            let partner = run
                .iter()
                .find(|(_, od, of)| od != d && *of == f.opposite());
            match partner {
                Some((_, od, _)) => {
                    if let Some(faces) = adj.faces.get_mut(d) {
                        faces[*f as usize] = Neighbor::Domain(*od);
                    }
                }
                None => unmatched += 1,
            }
        }
    }
    if unmatched > 0 {
        log::warn!("{unmatched} faces share a signature with no opposite-face partner");
    }
    log::debug!(
        "matched {} face links across {} domains",
        adj.n_links(),
        adj.n_domains()
    );
    Ok(adj)
}
