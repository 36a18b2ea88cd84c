//! Parallel plumbing: transport, wire records, and collectives.

pub mod communicator;
pub mod context;
pub mod exchange;
pub mod statistics;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, RayonComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use context::{ParallelContext, ReduceOp};
pub use statistics::{FieldSummary, field_summary};
