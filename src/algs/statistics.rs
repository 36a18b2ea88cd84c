//! Global summary statistics over a distributed field.

use crate::algs::communicator::Communicator;
use crate::algs::context::{ParallelContext, ReduceOp};
use crate::data::field::Centering;
use crate::data::mesh_chunk::MeshChunk;
use crate::mesh_error::MeshCompositeError;

/// Min/max/sum/count of one field component across all ranks.
///
/// With no contributing entries `min` is `+inf` and `max` is `-inf`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSummary {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl FieldSummary {
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Collective: summarises `component` of `field` over every rank's chunk.
///
/// With `ignore_ghosts`, entries flagged in the chunk's ghost-node (node
/// fields) or ghost-zone (zone fields) arrays are left out.
pub fn field_summary<C: Communicator>(
    ctx: &ParallelContext<'_, C>,
    chunk: &MeshChunk,
    field: &str,
    component: usize,
    ignore_ghosts: bool,
) -> Result<FieldSummary, MeshCompositeError> {
    let f = chunk.try_field(field)?;
    if component >= f.components() {
        return Err(MeshCompositeError::ImproperUse(format!(
            "field `{field}` has {} components, asked for component {component}",
            f.components()
        )));
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count = 0u64;
    for i in 0..f.len() {
        let ghost = match f.centering() {
            Centering::Node => chunk.is_ghost_node(i),
            Centering::Zone => chunk.is_ghost_zone(i),
        };
        if ignore_ghosts && ghost {
            continue;
        }
        let v = f.tuple(i)[component];
        min = min.min(v);
        max = max.max(v);
        sum += v;
        count += 1;
    }
    let lo = ctx.all_reduce_f64(&[min], ReduceOp::Min)?;
    let hi = ctx.all_reduce_f64(&[max], ReduceOp::Max)?;
    let total = ctx.all_reduce_f64(&[sum], ReduceOp::Sum)?;
    let n = ctx.all_reduce_u64(&[count], ReduceOp::Sum)?;
    Ok(FieldSummary {
        min: lo[0],
        max: hi[0],
        sum: total[0],
        count: n[0],
    })
}
