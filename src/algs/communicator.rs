//! Thin façade over intra-process (mailbox) or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices. All handles are waitable but
//! non-blocking; the collectives in [`context`](super::context) call
//! `.wait()` before they trust a buffer.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;

/// Non-blocking point-to-point interface.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Message tag; each collective derives its tags from a fresh base.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CommTag(u16);

impl CommTag {
    #[inline]
    pub const fn new(base: u16) -> Self {
        Self(base)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// A tag `k` steps after this one.
    #[inline]
    pub const fn offset(self, k: u16) -> Self {
        Self(self.0.wrapping_add(k))
    }
}

/// Single-rank communicator for serial runs and unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

// --- RayonComm: intra-process / one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);

/// Receive handle for [`RayonComm`]; `wait` polls the mailbox.
pub struct LocalHandle {
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            let msg = MAILBOX
                .get_mut(&self.key)
                .and_then(|mut queue| queue.pop_front());
            if let Some(bytes) = msg {
                let n = bytes.len().min(self.len);
                return Some(bytes[..n].to_vec());
            }
            std::thread::yield_now();
        }
    }
}

/// In-process communicator: ranks are threads sharing a global mailbox.
///
/// Messages with the same `(src, dst, tag)` are delivered in send order.
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
}

impl RayonComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self { rank, size }
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        MAILBOX
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::mesh_error::MeshCompositeError;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination as _, Source as _};

    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, MeshCompositeError> {
            let universe = mpi::initialize().ok_or_else(|| MeshCompositeError::CommError {
                neighbor: 0,
                reason: "MPI is already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: universe,
                world,
                rank,
                size,
            })
        }
    }

    /// Pending send; owns the leaked payload until the request completes.
    pub struct MpiSendHandle {
        req: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
    }

    impl Wait for MpiSendHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.req.wait();
            // SAFETY: `buf` came from `Box::leak` in `isend` and the request
            // that borrowed it has completed.
            unsafe { drop(Box::from_raw(self.buf)) };
            None
        }
    }

    /// Deferred receive; matches `(peer, tag)` when waited on.
    pub struct MpiRecvHandle {
        peer: i32,
        tag: i32,
        len: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let world = SimpleCommunicator::world();
            let (mut data, _status) = world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            data.truncate(self.len);
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSendHandle {
            let leaked: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = leaked;
            // SAFETY: the payload stays alive until `MpiSendHandle::wait` reclaims it.
            let data: &'static [u8] = unsafe { &*ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiSendHandle { req, buf: ptr }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecvHandle {
            MpiRecvHandle {
                peer: peer as i32,
                tag: tag as i32,
                len: buf.len(),
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn rayon_roundtrip_two_ranks() {
        let comm0 = RayonComm::new(0, 2);
        let comm1 = RayonComm::new(1, 2);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        comm0.isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    #[serial]
    fn same_key_messages_stay_ordered() {
        let a = RayonComm::new(0, 2);
        let b = RayonComm::new(1, 2);
        a.isend(1, 11, &[1]);
        a.isend(1, 11, &[2, 2]);
        let mut buf = [0u8; 2];
        assert_eq!(b.irecv(0, 11, &mut buf).wait(), Some(vec![1]));
        assert_eq!(b.irecv(0, 11, &mut buf).wait(), Some(vec![2, 2]));
    }

    #[test]
    fn no_comm_is_single_rank() {
        let c = NoComm;
        assert_eq!((c.rank(), c.size()), (0, 1));
        assert_eq!(c.isend(0, 1, &[1]).wait(), None);
    }

    #[test]
    fn tag_offsets_wrap() {
        assert_eq!(CommTag::new(u16::MAX).offset(2).as_u16(), 1);
    }
}
