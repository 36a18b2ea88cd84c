//! Routes rank-local sample rays to the rank that owns their pixel.

use crate::algs::communicator::Communicator;
use crate::algs::context::ParallelContext;
use crate::algs::wire::{KIND_RAYS, WireCount, WireRayHdr, WireReader, WireSampleHdr, WireWriter};
use crate::composite::partition::ImagePartition;
use crate::data::sample_buffer::{Ray, Sample, SampleBuffer, merge_ray};
use crate::mesh_error::MeshCompositeError;

/// Collective. Returns a buffer of the same shape holding only the rays of
/// this rank's region, with every rank's contributions merged in rank order.
///
/// Rays whose pixel has no owner are dropped with a warning.
pub fn redistribute_samples<C: Communicator>(
    ctx: &ParallelContext<'_, C>,
    buffer: &SampleBuffer,
    partition: &ImagePartition,
) -> Result<SampleBuffer, MeshCompositeError> {
    if partition.n_ranks() != ctx.size() {
        return Err(MeshCompositeError::InvalidPartition(format!(
            "partition has {} regions for {} ranks",
            partition.n_ranks(),
            ctx.size()
        )));
    }
    if partition.rows() != buffer.height() || partition.cols() != buffer.width() {
        return Err(MeshCompositeError::InvalidPartition(format!(
            "partition is {}x{}, sample buffer is {}x{}",
            partition.rows(),
            partition.cols(),
            buffer.height(),
            buffer.width()
        )));
    }

    let mut routed: Vec<Vec<(usize, usize, &Ray)>> = vec![Vec::new(); ctx.size()];
    let mut dropped = 0usize;
    for (col, row, ray) in buffer.rays() {
        if ray.is_empty() {
            continue;
        }
        match partition.owner_of(col, row) {
            Some(r) => routed[r].push((col, row, ray)),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        log::warn!("{dropped} rays fall outside every partition region and were dropped");
    }

    let outgoing = routed
        .iter()
        .map(|rays| encode_rays(rays, buffer.n_vars()))
        .collect();
    let incoming = ctx.all_to_all_bytes(outgoing)?;

    let mut out = SampleBuffer::new(
        buffer.width(),
        buffer.height(),
        buffer.depth(),
        buffer.n_vars(),
    );
    for (src, buf) in incoming.iter().enumerate() {
        decode_rays(buf, &mut out).map_err(|e| MeshCompositeError::CommError {
            neighbor: src,
            reason: e.to_string(),
        })?;
    }
    Ok(out)
}

fn encode_rays(rays: &[(usize, usize, &Ray)], n_vars: usize) -> Vec<u8> {
    let mut w = WireWriter::with_header(KIND_RAYS);
    w.put(&WireCount::new(n_vars));
    w.put(&WireCount::new(rays.len()));
    for (col, row, ray) in rays {
        w.put(&WireRayHdr::new(*col, *row, ray.len()));
        for (slab, s) in ray.iter() {
            w.put(&WireSampleHdr::new(*slab, s.weight()));
            for v in s.sums() {
                w.put_f64(*v);
            }
        }
    }
    w.finish()
}

fn decode_rays(buf: &[u8], into: &mut SampleBuffer) -> Result<(), MeshCompositeError> {
    let mut r = WireReader::expect_header(buf, KIND_RAYS)?;
    let n_vars = r.get::<WireCount>()?.get();
    if n_vars != into.n_vars() {
        return Err(MeshCompositeError::Wire(format!(
            "rays carry {n_vars} variables, expected {}",
            into.n_vars()
        )));
    }
    let n_rays = r.get::<WireCount>()?.get();
    for _ in 0..n_rays {
        let h: WireRayHdr = r.get()?;
        if h.col() >= into.width() || h.row() >= into.height() {
            return Err(MeshCompositeError::Wire(format!(
                "ray ({}, {}) outside {}x{} buffer",
                h.col(),
                h.row(),
                into.width(),
                into.height()
            )));
        }
        let mut ray = Ray::new();
        for _ in 0..h.n_samples() {
            let s: WireSampleHdr = r.get()?;
            if s.slab() as usize >= into.depth() {
                return Err(MeshCompositeError::Wire(format!(
                    "slab {} outside depth {}",
                    s.slab(),
                    into.depth()
                )));
            }
            let sums = (0..n_vars)
                .map(|_| r.get_f64())
                .collect::<Result<Vec<_>, _>>()?;
            ray.insert(s.slab(), Sample::from_raw(sums, s.weight()));
        }
        merge_ray(into.ray_mut(h.col(), h.row()), &ray);
    }
    r.finish()
}
