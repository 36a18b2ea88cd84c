//! ParallelContext: communicator plus tag bookkeeping for blocking collectives.
//!
//! Every collective draws fresh tags from a per-context counter, so all ranks
//! must create their context at the same point and call the collectives in
//! the same order. Mismatched call sequences deadlock; nothing here detects
//! them. Results are combined in rank order, so every rank sees the same bits.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::exchange_bytes;
use crate::algs::wire::WireReader;
use crate::mesh_error::MeshCompositeError;
use std::cell::Cell;
use std::collections::BTreeMap;

const FIRST_TAG: u16 = 0x1000;

/// Element-wise reduction operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    fn combine_f64(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }

    fn combine_u64(self, a: u64, b: u64) -> u64 {
        match self {
            ReduceOp::Sum => a.wrapping_add(b),
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Communicator-scoped collectives.
pub struct ParallelContext<'a, C: Communicator> {
    comm: &'a C,
    next_tag: Cell<u16>,
}

impl<'a, C: Communicator> ParallelContext<'a, C> {
    pub fn new(comm: &'a C) -> Self {
        Self {
            comm,
            next_tag: Cell::new(FIRST_TAG),
        }
    }

    #[inline]
    pub fn comm(&self) -> &'a C {
        self.comm
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Each exchange uses two consecutive tags.
    fn fresh_tag(&self) -> CommTag {
        let t = self.next_tag.get();
        self.next_tag.set(t.wrapping_add(2));
        CommTag::new(t)
    }

    fn check_root(&self, root: usize) -> Result<(), MeshCompositeError> {
        if root >= self.size() {
            return Err(MeshCompositeError::InvalidRoot {
                root,
                size: self.size(),
            });
        }
        Ok(())
    }

    fn others(&self) -> Vec<usize> {
        let me = self.rank();
        (0..self.size()).filter(|r| *r != me).collect()
    }

    /// Every rank receives every rank's buffer, indexed by rank.
    pub fn all_gather_bytes(&self, local: &[u8]) -> Result<Vec<Vec<u8>>, MeshCompositeError> {
        let tag = self.fresh_tag();
        let others = self.others();
        let outgoing: BTreeMap<usize, Vec<u8>> =
            others.iter().map(|r| (*r, local.to_vec())).collect();
        let mut received = exchange_bytes(self.comm, tag, &outgoing, &others)?;
        Ok(self.assemble(local, &mut received))
    }

    /// Root receives every rank's buffer; other ranks get `None`.
    pub fn gather_bytes(
        &self,
        root: usize,
        local: &[u8],
    ) -> Result<Option<Vec<Vec<u8>>>, MeshCompositeError> {
        self.check_root(root)?;
        let tag = self.fresh_tag();
        if self.rank() == root {
            let others = self.others();
            let mut received = exchange_bytes(self.comm, tag, &BTreeMap::new(), &others)?;
            Ok(Some(self.assemble(local, &mut received)))
        } else {
            let outgoing = BTreeMap::from([(root, local.to_vec())]);
            exchange_bytes(self.comm, tag, &outgoing, &[])?;
            Ok(None)
        }
    }

    /// Returns root's `data` on every rank; non-root input is ignored.
    pub fn broadcast_bytes(&self, root: usize, data: &[u8]) -> Result<Vec<u8>, MeshCompositeError> {
        self.check_root(root)?;
        let tag = self.fresh_tag();
        if self.rank() == root {
            let outgoing: BTreeMap<usize, Vec<u8>> =
                self.others().into_iter().map(|r| (r, data.to_vec())).collect();
            exchange_bytes(self.comm, tag, &outgoing, &[])?;
            Ok(data.to_vec())
        } else {
            let mut received = exchange_bytes(self.comm, tag, &BTreeMap::new(), &[root])?;
            Ok(received.remove(&root).unwrap_or_default())
        }
    }

    /// `outgoing[r]` goes to rank `r`; the result holds what each rank sent here.
    pub fn all_to_all_bytes(
        &self,
        mut outgoing: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, MeshCompositeError> {
        if outgoing.len() != self.size() {
            return Err(MeshCompositeError::ImproperUse(format!(
                "all-to-all needs {} buffers, got {}",
                self.size(),
                outgoing.len()
            )));
        }
        let tag = self.fresh_tag();
        let me = self.rank();
        let local = std::mem::take(&mut outgoing[me]);
        let sends: BTreeMap<usize, Vec<u8>> = outgoing
            .into_iter()
            .enumerate()
            .filter(|(r, _)| *r != me)
            .collect();
        let mut received = exchange_bytes(self.comm, tag, &sends, &self.others())?;
        Ok(self.assemble(&local, &mut received))
    }

    /// Element-wise reduction; every rank gets the same result.
    pub fn all_reduce_f64(&self, values: &[f64], op: ReduceOp) -> Result<Vec<f64>, MeshCompositeError> {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        let all = self.all_gather_bytes(&bytes)?;
        let mut out: Option<Vec<f64>> = None;
        for buf in &all {
            let theirs = decode_words(buf, values.len())?;
            match out.as_mut() {
                None => out = Some(theirs.into_iter().map(f64::from_bits).collect()),
                Some(acc) => {
                    for (a, b) in acc.iter_mut().zip(theirs) {
                        *a = op.combine_f64(*a, f64::from_bits(b));
                    }
                }
            }
        }
        Ok(out.unwrap_or_default())
    }

    pub fn all_reduce_u64(&self, values: &[u64], op: ReduceOp) -> Result<Vec<u64>, MeshCompositeError> {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let all = self.all_gather_bytes(&bytes)?;
        let mut out: Option<Vec<u64>> = None;
        for buf in &all {
            let theirs = decode_words(buf, values.len())?;
            match out.as_mut() {
                None => out = Some(theirs),
                Some(acc) => {
                    for (a, b) in acc.iter_mut().zip(theirs) {
                        *a = op.combine_u64(*a, b);
                    }
                }
            }
        }
        Ok(out.unwrap_or_default())
    }

    /// Returns once every rank has entered the barrier.
    pub fn barrier(&self) -> Result<(), MeshCompositeError> {
        self.all_gather_bytes(&[]).map(|_| ())
    }

    fn assemble(&self, local: &[u8], received: &mut BTreeMap<usize, Vec<u8>>) -> Vec<Vec<u8>> {
        let me = self.rank();
        (0..self.size())
            .map(|r| {
                if r == me {
                    local.to_vec()
                } else {
                    received.remove(&r).unwrap_or_default()
                }
            })
            .collect()
    }
}

fn decode_words(buf: &[u8], n: usize) -> Result<Vec<u64>, MeshCompositeError> {
    if buf.len() != n * 8 {
        return Err(MeshCompositeError::Wire(format!(
            "reduction operand has {} bytes, expected {}",
            buf.len(),
            n * 8
        )));
    }
    let mut r = WireReader::new(buf);
    (0..n).map(|_| r.get_u64()).collect()
}
