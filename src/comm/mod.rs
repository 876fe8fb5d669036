//! Message passing between participants of a distributed run
//!
//! The distributed strategy only needs three collectives: broadcast from one
//! participant, all-gather with per-participant counts, and a sum reduced to
//! one participant. [`Communicator`] is that seam; [`LocalCluster`] provides
//! an in-process implementation with one thread per participant.
//!
//! All collectives are blocking rendezvous points: every participant must
//! issue the same sequence of calls, and a participant returns from a call
//! only once the data it needs has arrived.

mod local;

pub use local::{LocalCluster, LocalCommunicator};

use anyhow::Result;

/// Collective operations over a fixed set of participants
pub trait Communicator {
    /// This participant's index in `0..world_size`
    fn rank(&self) -> usize;

    /// Number of participants
    fn world_size(&self) -> usize;

    /// Everyone receives `root`'s `value` (other participants' arguments are ignored)
    ///
    /// # Errors
    ///
    /// Returns [`PageRankError::Communication`](crate::PageRankError::Communication)
    /// if a peer disconnects, times out or sends the wrong message
    fn broadcast_f32(&self, root: usize, value: f32) -> Result<f32>;

    /// Everyone receives `root`'s `flag`
    ///
    /// # Errors
    ///
    /// Same as [`Communicator::broadcast_f32`]
    fn broadcast_flag(&self, root: usize, flag: bool) -> Result<bool>;

    /// Everyone receives every participant's `count`, in rank order
    ///
    /// # Errors
    ///
    /// Same as [`Communicator::broadcast_f32`]
    fn all_gather_counts(&self, count: usize) -> Result<Vec<usize>>;

    /// Concatenate every participant's `local` slice into `out`, in rank order
    ///
    /// `counts[p]` is participant `p`'s slice length and `out` must hold
    /// their sum.
    ///
    /// # Errors
    ///
    /// Same as [`Communicator::broadcast_f32`], plus an error if a slice does
    /// not match its announced count
    fn all_gather_varcount(&self, local: &[f32], counts: &[usize], out: &mut [f32]) -> Result<()>;

    /// Sum `value` over all participants; only `root` gets `Some(total)`
    ///
    /// Contributions are added in rank order, so the total is deterministic.
    ///
    /// # Errors
    ///
    /// Same as [`Communicator::broadcast_f32`]
    fn reduce_sum(&self, root: usize, value: f64) -> Result<Option<f64>>;
}
