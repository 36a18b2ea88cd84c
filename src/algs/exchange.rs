//! Two-stage point-to-point exchange: byte counts first, then payloads.
//!
//! Every collective in [`context`](super::context) is built on
//! [`exchange_bytes`]. Both stages post all receives before any send and
//! drain every send handle before returning, even when a receive fails.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, cast_slice_mut};
use crate::mesh_error::MeshCompositeError;
use std::collections::BTreeMap;

/// Sends `outgoing[peer]` to each peer and receives one message from each
/// rank in `incoming`. Uses `tag` for counts and `tag + 1` for payloads.
///
/// Zero-length payloads are announced in the count stage and never sent.
pub fn exchange_bytes<C: Communicator>(
    comm: &C,
    tag: CommTag,
    outgoing: &BTreeMap<usize, Vec<u8>>,
    incoming: &[usize],
) -> Result<BTreeMap<usize, Vec<u8>>, MeshCompositeError> {
    let sizes = exchange_counts(comm, tag, outgoing, incoming)?;
    let data_tag = tag.offset(1);

    // 1) post receives for non-empty payloads
    let mut pending_recv = Vec::with_capacity(incoming.len());
    let mut out = BTreeMap::new();
    for (&peer, &n) in &sizes {
        if n == 0 {
            out.insert(peer, Vec::new());
            continue;
        }
        let mut buf = vec![0u8; n];
        let h = comm.irecv(peer, data_tag.as_u16(), &mut buf);
        pending_recv.push((peer, n, h));
    }

    // 2) post sends
    let mut pending_sends = Vec::with_capacity(outgoing.len());
    for (&peer, payload) in outgoing {
        if !payload.is_empty() {
            pending_sends.push(comm.isend(peer, data_tag.as_u16(), payload));
        }
    }

    // 3) wait for receives without early return
    let mut maybe_err = None;
    for (peer, n, h) in pending_recv {
        match h.wait() {
            Some(data) if data.len() == n => {
                out.insert(peer, data);
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(MeshCompositeError::CommError {
                    neighbor: peer,
                    reason: format!("expected {n} payload bytes, got {}", data.len()),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshCompositeError::CommError {
                    neighbor: peer,
                    reason: "payload receive returned no data".into(),
                });
            }
            _ => {}
        }
    }

    // 4) always drain sends
    for s in pending_sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

fn exchange_counts<C: Communicator>(
    comm: &C,
    tag: CommTag,
    outgoing: &BTreeMap<usize, Vec<u8>>,
    incoming: &[usize],
) -> Result<BTreeMap<usize, usize>, MeshCompositeError> {
    let mut pending_recv = Vec::with_capacity(incoming.len());
    for &peer in incoming {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            peer,
            tag.as_u16(),
            cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        pending_recv.push((peer, h));
    }

    let mut pending_sends = Vec::with_capacity(outgoing.len());
    for (&peer, payload) in outgoing {
        let count = WireCount::new(payload.len());
        pending_sends.push(comm.isend(
            peer,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&count)),
        ));
    }

    let mut sizes = BTreeMap::new();
    let mut maybe_err = None;
    for (peer, h) in pending_recv {
        match h.wait() {
            Some(data) if data.len() == std::mem::size_of::<WireCount>() => {
                let cnt: WireCount = bytemuck::pod_read_unaligned(&data);
                sizes.insert(peer, cnt.get());
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(MeshCompositeError::CommError {
                    neighbor: peer,
                    reason: format!(
                        "expected {} bytes for size header, got {}",
                        std::mem::size_of::<WireCount>(),
                        data.len()
                    ),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshCompositeError::CommError {
                    neighbor: peer,
                    reason: format!("failed to receive size from rank {peer}"),
                });
            }
            _ => {}
        }
    }

    for s in pending_sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::RayonComm;
    use serial_test::serial;

    #[test]
    #[serial]
    fn ring_exchange_with_empty_payload() {
        let size = 3;
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    s.spawn(move || {
                        let comm = RayonComm::new(rank, size);
                        let next = (rank + 1) % size;
                        let prev = (rank + size - 1) % size;
                        let payload = if rank == 1 { Vec::new() } else { vec![rank as u8; rank + 1] };
                        let out = BTreeMap::from([(next, payload)]);
                        exchange_bytes(&comm, CommTag::new(900), &out, &[prev]).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0][&2], vec![2, 2, 2]);
        assert_eq!(results[1][&0], vec![0]);
        assert!(results[2][&1].is_empty());
    }
}
