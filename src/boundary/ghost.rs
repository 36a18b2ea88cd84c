//! Ghost-zone construction for structured blocks.
//!
//! Layers are added one logical axis at a time (I, then J, then K). The
//! layer a block receives across a face is cut from the neighbour's
//! *current* state, which already includes the neighbour's ghost layers on
//! earlier axes; that is how edge and corner regions get filled without
//! diagonal neighbours. Entries the neighbour cannot provide collapse onto
//! the block's own face (zero thickness) and are tagged `NOT_APPLICABLE`.

use crate::algs::communicator::Communicator;
use crate::algs::context::ParallelContext;
use crate::algs::wire::{KIND_VALUES, WireCount, WireReader, WireWriter};
use crate::boundary::adjacency::{DomainAdjacency, Face, Neighbor};
use crate::data::field::{Centering, FieldArray};
use crate::data::mesh_chunk::MeshChunk;
use crate::data::structured::StructuredBlock;
use crate::mesh_error::MeshCompositeError;
use crate::topology::ghost::GhostFlags;
use hashbrown::HashMap;

/// A block extended by ghost layers.
#[derive(Clone, Debug, PartialEq)]
pub struct GhostedBlock {
    block: StructuredBlock,
    lo: [usize; 3],
    hi: [usize; 3],
}

impl GhostedBlock {
    pub fn domain(&self) -> usize {
        self.block.domain()
    }

    /// The extended block, with ghost-zone and ghost-node arrays attached.
    pub fn block(&self) -> &StructuredBlock {
        &self.block
    }

    pub fn into_block(self) -> StructuredBlock {
        self.block
    }

    /// Ghost layers prepended on each axis.
    pub fn layers_lo(&self) -> [usize; 3] {
        self.lo
    }

    /// Ghost layers appended on each axis.
    pub fn layers_hi(&self) -> [usize; 3] {
        self.hi
    }

    pub fn to_mesh_chunk(&self) -> Result<MeshChunk, MeshCompositeError> {
        self.block.to_mesh_chunk()
    }
}

/// Field layout shared by every block: name, centering, components.
type FieldSpec = (String, Centering, usize);

/// Mutable working copy of one block during layer growth.
#[derive(Clone, Debug)]
struct GrowState {
    domain: usize,
    dims: [usize; 3],
    lo: [usize; 3],
    hi: [usize; 3],
    points: Vec<[f64; 3]>,
    node_values: Vec<Vec<f64>>,
    zone_values: Vec<Vec<f64>>,
    node_flags: Vec<GhostFlags>,
    zone_flags: Vec<GhostFlags>,
}

fn zone_dims(dims: [usize; 3]) -> [usize; 3] {
    dims.map(|n| n.saturating_sub(1).max(1))
}

fn linear(dims: [usize; 3], ijk: [usize; 3]) -> usize {
    ijk[0] + dims[0] * (ijk[1] + dims[1] * ijk[2])
}

fn unlinear(dims: [usize; 3], mut i: usize) -> [usize; 3] {
    let a = i % dims[0];
    i /= dims[0];
    [a, i % dims[1], i / dims[1]]
}

/// Dims of a single layer normal to `axis`.
fn slab(mut dims: [usize; 3], axis: usize) -> [usize; 3] {
    dims[axis] = 1;
    dims
}

impl GrowState {
    fn from_block(block: &StructuredBlock, specs: &[FieldSpec]) -> Self {
        let pick = |c: Centering| -> Vec<Vec<f64>> {
            specs
                .iter()
                .filter(|s| s.1 == c)
                .filter_map(|s| block.field(&s.0).map(|f| f.values().to_vec()))
                .collect()
        };
        Self {
            domain: block.domain(),
            dims: block.dims(),
            lo: [0; 3],
            hi: [0; 3],
            points: block.points().to_vec(),
            node_values: pick(Centering::Node),
            zone_values: pick(Centering::Zone),
            node_flags: block
                .ghost_nodes()
                .map_or_else(|| vec![GhostFlags::NONE; block.n_points()], <[_]>::to_vec),
            zone_flags: block
                .ghost_zones()
                .map_or_else(|| vec![GhostFlags::NONE; block.n_cells()], <[_]>::to_vec),
        }
    }

    fn zone_dims(&self) -> [usize; 3] {
        zone_dims(self.dims)
    }

    /// The layer a neighbour across `face` of `self` needs: node layer one
    /// step in from the face plus the zone layer touching the face.
    fn outgoing_layer(&self, face: Face, comps: &(Vec<usize>, Vec<usize>)) -> Layer {
        let a = face.axis();
        let node_at = if face.is_max() { self.dims[a] - 2 } else { 1 };
        let zd = self.zone_dims();
        let zone_at = if face.is_max() { zd[a] - 1 } else { 0 };
        let mut layer = Layer {
            dims: self.dims,
            lo: self.lo,
            ..Layer::default()
        };
        let nd = slab(self.dims, a);
        for t in 0..nd.iter().product() {
            let mut ijk = unlinear(nd, t);
            ijk[a] = node_at;
            let i = linear(self.dims, ijk);
            layer.points.push(self.points[i]);
            layer.node_flags.push(self.node_flags[i]);
            for (f, vals) in self.node_values.iter().enumerate() {
                let c = comps.0[f];
                layer.node_values.extend_from_slice(&vals[i * c..(i + 1) * c]);
            }
        }
        let zs = slab(zd, a);
        for t in 0..zs.iter().product() {
            let mut ijk = unlinear(zs, t);
            ijk[a] = zone_at;
            let i = linear(zd, ijk);
            layer.zone_flags.push(self.zone_flags[i]);
            for (f, vals) in self.zone_values.iter().enumerate() {
                let c = comps.1[f];
                layer.zone_values.extend_from_slice(&vals[i * c..(i + 1) * c]);
            }
        }
        layer
    }

    /// Grows the state by one layer on each side of `axis` that has a layer.
    fn grow(
        &mut self,
        axis: usize,
        min_side: Option<&Layer>,
        max_side: Option<&Layer>,
        comps: &(Vec<usize>, Vec<usize>),
    ) {
        let lo = usize::from(min_side.is_some());
        let hi = usize::from(max_side.is_some());
        if lo + hi == 0 {
            return;
        }
        let old_dims = self.dims;
        let old_zd = self.zone_dims();
        let mut new_dims = old_dims;
        new_dims[axis] += lo + hi;
        let new_zd = zone_dims(new_dims);

        let mut points = Vec::with_capacity(new_dims.iter().product());
        let mut node_flags = Vec::with_capacity(points.capacity());
        let mut node_values: Vec<Vec<f64>> = comps.0.iter().map(|_| Vec::new()).collect();
        for n in 0..new_dims.iter().product() {
            let ijk = unlinear(new_dims, n);
            let along = ijk[axis];
            let side = if lo == 1 && along == 0 {
                Some((min_side, false))
            } else if hi == 1 && along == new_dims[axis] - 1 {
                Some((max_side, true))
            } else {
                None
            };
            match side {
                None => {
                    let mut o = ijk;
                    o[axis] -= lo;
                    let i = linear(old_dims, o);
                    points.push(self.points[i]);
                    node_flags.push(self.node_flags[i]);
                    for (f, vals) in self.node_values.iter().enumerate() {
                        let c = comps.0[f];
                        node_values[f].extend_from_slice(&vals[i * c..(i + 1) * c]);
                    }
                }
                Some((layer, is_max)) => {
                    let mut own = ijk;
                    own[axis] = if is_max { old_dims[axis] - 1 } else { 0 };
                    let own_i = linear(old_dims, own);
                    let hit = layer.and_then(|l| l.node_source(self, axis, ijk));
                    match (layer, hit) {
                        (Some(l), Some(t)) => {
                            points.push(l.points[t]);
                            node_flags.push(l.node_flags[t] | GhostFlags::DUPLICATED);
                            let mut off = t * comps.0.iter().sum::<usize>();
                            for (f, c) in comps.0.iter().enumerate() {
                                node_values[f].extend_from_slice(&l.node_values[off..off + c]);
                                off += c;
                            }
                        }
                        _ => {
                            points.push(self.points[own_i]);
                            node_flags.push(GhostFlags::NOT_APPLICABLE);
                            for (f, vals) in self.node_values.iter().enumerate() {
                                let c = comps.0[f];
                                node_values[f]
                                    .extend_from_slice(&vals[own_i * c..(own_i + 1) * c]);
                            }
                        }
                    }
                }
            }
        }

        let mut zone_flags = Vec::with_capacity(new_zd.iter().product());
        let mut zone_values: Vec<Vec<f64>> = comps.1.iter().map(|_| Vec::new()).collect();
        for z in 0..new_zd.iter().product() {
            let ijk = unlinear(new_zd, z);
            let along = ijk[axis];
            let side = if lo == 1 && along == 0 {
                Some((min_side, false))
            } else if hi == 1 && along == new_zd[axis] - 1 {
                Some((max_side, true))
            } else {
                None
            };
            match side {
                None => {
                    let mut o = ijk;
                    o[axis] -= lo;
                    let i = linear(old_zd, o);
                    zone_flags.push(self.zone_flags[i]);
                    for (f, vals) in self.zone_values.iter().enumerate() {
                        let c = comps.1[f];
                        zone_values[f].extend_from_slice(&vals[i * c..(i + 1) * c]);
                    }
                }
                Some((layer, is_max)) => {
                    let mut own = ijk;
                    own[axis] = if is_max { old_zd[axis] - 1 } else { 0 };
                    let own_i = linear(old_zd, own);
                    let hit = layer.and_then(|l| l.zone_source(self, axis, ijk));
                    match (layer, hit) {
                        (Some(l), Some(t)) => {
                            zone_flags.push(l.zone_flags[t] | GhostFlags::DUPLICATED);
                            let mut off = t * comps.1.iter().sum::<usize>();
                            for (f, c) in comps.1.iter().enumerate() {
                                zone_values[f].extend_from_slice(&l.zone_values[off..off + c]);
                                off += c;
                            }
                        }
                        _ => {
                            zone_flags.push(GhostFlags::NOT_APPLICABLE);
                            for (f, vals) in self.zone_values.iter().enumerate() {
                                let c = comps.1[f];
                                zone_values[f]
                                    .extend_from_slice(&vals[own_i * c..(own_i + 1) * c]);
                            }
                        }
                    }
                }
            }
        }

        self.dims = new_dims;
        self.lo[axis] += lo;
        self.hi[axis] += hi;
        self.points = points;
        self.node_flags = node_flags;
        self.node_values = node_values;
        self.zone_flags = zone_flags;
        self.zone_values = zone_values;
    }

    fn finish(self, specs: &[FieldSpec]) -> Result<GhostedBlock, MeshCompositeError> {
        let mut block = StructuredBlock::try_new(self.domain, self.dims, self.points)?;
        let mut nodes = self.node_values.into_iter();
        let mut zones = self.zone_values.into_iter();
        for (name, centering, comps) in specs {
            let values = match centering {
                Centering::Node => nodes.next(),
                Centering::Zone => zones.next(),
            }
            .unwrap_or_default();
            block.add_field(FieldArray::try_new(name.clone(), *centering, *comps, values)?)?;
        }
        block.set_ghost_nodes(self.node_flags)?;
        block.set_ghost_zones(self.zone_flags)?;
        Ok(GhostedBlock {
            block,
            lo: self.lo,
            hi: self.hi,
        })
    }
}

/// One face layer as shipped between domains, in the sender's layout.
#[derive(Clone, Debug, Default)]
struct Layer {
    /// Sender's current node dims and ghost offsets.
    dims: [usize; 3],
    lo: [usize; 3],
    points: Vec<[f64; 3]>,
    node_flags: Vec<GhostFlags>,
    /// Tuple-major, every node field's components in turn.
    node_values: Vec<f64>,
    zone_flags: Vec<GhostFlags>,
    zone_values: Vec<f64>,
}

impl Layer {
    /// Maps a transverse index of the receiver onto the sender's layer.
    fn remap(
        own_lo: [usize; 3],
        their_lo: [usize; 3],
        their_extent: [usize; 3],
        axis: usize,
        ijk: [usize; 3],
    ) -> Option<[usize; 3]> {
        let mut out = [0usize; 3];
        for b in (0..3).filter(|b| *b != axis) {
            let t = (ijk[b] + their_lo[b]).checked_sub(own_lo[b])?;
            if t >= their_extent[b] {
                return None;
            }
            out[b] = t;
        }
        Some(out)
    }

    fn node_source(&self, recv: &GrowState, axis: usize, ijk: [usize; 3]) -> Option<usize> {
        let t = Self::remap(recv.lo, self.lo, self.dims, axis, ijk)?;
        Some(linear(slab(self.dims, axis), t))
    }

    fn zone_source(&self, recv: &GrowState, axis: usize, ijk: [usize; 3]) -> Option<usize> {
        let zd = zone_dims(self.dims);
        let t = Self::remap(recv.lo, self.lo, zd, axis, ijk)?;
        Some(linear(slab(zd, axis), t))
    }

    fn encode(&self, w: &mut WireWriter) {
        for v in self.dims.iter().chain(&self.lo) {
            w.put_u64(*v as u64);
        }
        w.put(&WireCount::new(self.points.len()));
        for p in &self.points {
            p.iter().for_each(|c| w.put_f64(*c));
        }
        w.put_bytes(bytemuck::cast_slice(&self.node_flags));
        w.put(&WireCount::new(self.node_values.len()));
        self.node_values.iter().for_each(|v| w.put_f64(*v));
        w.put(&WireCount::new(self.zone_flags.len()));
        w.put_bytes(bytemuck::cast_slice(&self.zone_flags));
        w.put(&WireCount::new(self.zone_values.len()));
        self.zone_values.iter().for_each(|v| w.put_f64(*v));
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, MeshCompositeError> {
        let mut head = [0usize; 6];
        for h in &mut head {
            *h = r.get_u64()? as usize;
        }
        let mut layer = Layer {
            dims: [head[0], head[1], head[2]],
            lo: [head[3], head[4], head[5]],
            ..Layer::default()
        };
        let n_points = r.get::<WireCount>()?.get();
        for _ in 0..n_points {
            layer.points.push([r.get_f64()?, r.get_f64()?, r.get_f64()?]);
        }
        layer.node_flags = r
            .bytes(n_points)?
            .iter()
            .map(|b| GhostFlags::from_bits_truncate(*b))
            .collect();
        let n = r.get::<WireCount>()?.get();
        layer.node_values = (0..n).map(|_| r.get_f64()).collect::<Result<_, _>>()?;
        let n_zones = r.get::<WireCount>()?.get();
        layer.zone_flags = r
            .bytes(n_zones)?
            .iter()
            .map(|b| GhostFlags::from_bits_truncate(*b))
            .collect();
        let n = r.get::<WireCount>()?.get();
        layer.zone_values = (0..n).map(|_| r.get_f64()).collect::<Result<_, _>>()?;
        Ok(layer)
    }
}

fn encode_layers(items: &[(usize, Face, Layer)]) -> Vec<u8> {
    let mut w = WireWriter::with_header(KIND_VALUES);
    w.put(&WireCount::new(items.len()));
    for (target, face, layer) in items {
        w.put_u64(*target as u64);
        w.put_u64(*face as u64);
        layer.encode(&mut w);
    }
    w.finish()
}

fn decode_layers(buf: &[u8]) -> Result<Vec<(usize, Face, Layer)>, MeshCompositeError> {
    let mut r = WireReader::expect_header(buf, KIND_VALUES)?;
    let n = r.get::<WireCount>()?.get();
    let mut items = Vec::with_capacity(n);
    for _ in 0..n {
        let target = r.get_u64()? as usize;
        let id = r.get_u64()?;
        let face = Face::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| MeshCompositeError::Wire(format!("bad face id {id}")))?;
        items.push((target, face, Layer::decode(&mut r)?));
    }
    r.finish()?;
    Ok(items)
}

/// Field layout of the first block; every other block must match it.
pub(crate) fn field_specs(blocks: &[StructuredBlock]) -> Result<Vec<FieldSpec>, MeshCompositeError> {
    let Some(first) = blocks.first() else {
        return Ok(Vec::new());
    };
    let specs: Vec<FieldSpec> = first
        .fields()
        .iter()
        .map(|f| (f.name().to_string(), f.centering(), f.components()))
        .collect();
    for b in &blocks[1..] {
        let same = b.fields().len() == specs.len()
            && specs.iter().all(|(n, c, k)| {
                b.field(n)
                    .is_some_and(|f| f.centering() == *c && f.components() == *k)
            });
        if !same {
            return Err(MeshCompositeError::ImproperUse(format!(
                "domain {} carries different fields than domain {}",
                b.domain(),
                first.domain()
            )));
        }
    }
    Ok(specs)
}

/// Collective ghost-zone construction; see the module docs.
pub(crate) fn grow_ghost_zones<C: Communicator>(
    ctx: &ParallelContext<'_, C>,
    adjacency: &DomainAdjacency,
    blocks: &[StructuredBlock],
    dims: [usize; 3],
) -> Result<Vec<GhostedBlock>, MeshCompositeError> {
    let specs = field_specs(blocks)?;
    let comps: (Vec<usize>, Vec<usize>) = (
        specs
            .iter()
            .filter(|s| s.1 == Centering::Node)
            .map(|s| s.2)
            .collect(),
        specs
            .iter()
            .filter(|s| s.1 == Centering::Zone)
            .map(|s| s.2)
            .collect(),
    );
    let mut states: Vec<GrowState> = blocks
        .iter()
        .map(|b| GrowState::from_block(b, &specs))
        .collect();
    for axis in (0..3).filter(|a| dims[*a] > 1) {
        let mut bodies: Vec<Vec<(usize, Face, Layer)>> = vec![Vec::new(); ctx.size()];
        for s in &states {
            for max in [false, true] {
                let face = Face::from_axis(axis, max);
                let Some(Neighbor::Domain(n)) = adjacency.neighbor(s.domain, face) else {
                    continue;
                };
                let owner = adjacency.owner(n).ok_or_else(|| {
                    MeshCompositeError::ImproperUse(format!("domain {n} has no owning rank"))
                })?;
                bodies[owner].push((n, face.opposite(), s.outgoing_layer(face, &comps)));
            }
        }
        let sent: usize = bodies.iter().map(Vec::len).sum();
        let incoming = ctx.all_to_all_bytes(bodies.iter().map(|b| encode_layers(b)).collect())?;

        let mut received: HashMap<(usize, Face), Layer> = HashMap::new();
        for (src, buf) in incoming.iter().enumerate() {
            let items = decode_layers(buf).map_err(|e| MeshCompositeError::CommError {
                neighbor: src,
                reason: e.to_string(),
            })?;
            let (node_width, zone_width) = (comps.0.iter().sum::<usize>(), comps.1.iter().sum::<usize>());
            for (target, face, layer) in items {
                if layer.node_values.len() != layer.points.len() * node_width
                    || layer.zone_values.len() != layer.zone_flags.len() * zone_width
                {
                    return Err(MeshCompositeError::ImproperUse(format!(
                        "ghost layer for domain {target} from rank {src} has a different field layout"
                    )));
                }
                received.insert((target, face), layer);
            }
        }

        for s in &mut states {
            let lo = received.remove(&(s.domain, Face::from_axis(axis, false)));
            let hi = received.remove(&(s.domain, Face::from_axis(axis, true)));
            s.grow(axis, lo.as_ref(), hi.as_ref(), &comps);
        }
        if !received.is_empty() {
            let mut stray: Vec<usize> = received.keys().map(|(d, _)| *d).collect();
            stray.sort_unstable();
            log::warn!("dropped ghost layers for domains not held on this rank: {stray:?}");
        }
        log::debug!("ghost layers on axis {axis}: sent {sent}");
    }

    states.into_iter().map(|s| s.finish(&specs)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_helpers() {
        let d = [3, 4, 2];
        for n in 0..24 {
            assert_eq!(linear(d, unlinear(d, n)), n);
        }
        assert_eq!(zone_dims([1, 3, 2]), [1, 2, 1]);
        assert_eq!(slab(d, 1), [3, 1, 2]);
    }

    #[test]
    fn remap_rejects_missing_transverse_layers() {
        // receiver has one J ghost layer below, sender none
        assert_eq!(Layer::remap([0, 1, 0], [0, 0, 0], [3, 3, 1], 0, [0, 0, 0]), None);
        assert_eq!(
            Layer::remap([0, 1, 0], [0, 0, 0], [3, 3, 1], 0, [0, 1, 0]),
            Some([0, 0, 0])
        );
    }
}
