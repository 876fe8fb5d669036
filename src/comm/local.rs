//! In-process participants connected by crossbeam channels
//!
//! Every ordered pair of participants gets its own unbounded channel, so
//! messages between two participants arrive in the order their collectives
//! were issued and a send never blocks. Receives block until the peer's
//! message arrives, the peer goes away, or the optional timeout expires.

use super::Communicator;
use crate::error::PageRankError;
use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

#[derive(Debug)]
enum Message {
    Scalar(f32),
    Flag(bool),
    Count(usize),
    Slice(Vec<f32>),
    Partial(f64),
}

fn comm_error(peer: usize, reason: impl Into<String>) -> anyhow::Error {
    PageRankError::Communication {
        peer,
        reason: reason.into(),
    }
    .into()
}

/// One participant's endpoint
#[derive(Debug)]
pub struct LocalCommunicator {
    rank: usize,
    /// Indexed by destination
    to_peer: Vec<Sender<Message>>,
    /// Indexed by source
    from_peer: Vec<Receiver<Message>>,
    timeout: Option<Duration>,
}

impl LocalCommunicator {
    fn send(&self, peer: usize, message: Message) -> Result<()> {
        self.to_peer[peer]
            .send(message)
            .map_err(|_| comm_error(peer, "peer hung up"))
    }

    fn recv(&self, peer: usize) -> Result<Message> {
        let channel = &self.from_peer[peer];
        match self.timeout {
            Some(timeout) => channel.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => {
                    comm_error(peer, format!("no message within {timeout:?}"))
                }
                RecvTimeoutError::Disconnected => comm_error(peer, "peer hung up"),
            }),
            None => channel.recv().map_err(|_| comm_error(peer, "peer hung up")),
        }
    }

    fn others(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.to_peer.len()).filter(move |&p| p != self.rank)
    }

    fn check_root(&self, root: usize) -> Result<()> {
        if root < self.to_peer.len() {
            Ok(())
        } else {
            Err(comm_error(
                root,
                format!("root outside a world of {}", self.to_peer.len()),
            ))
        }
    }

    fn broadcast<T>(
        &self,
        root: usize,
        value: T,
        wrap: impl Fn(T) -> Message,
        unwrap: impl Fn(Message) -> std::result::Result<T, Message>,
    ) -> Result<T>
    where
        T: Copy,
    {
        self.check_root(root)?;
        if self.rank == root {
            for peer in self.others() {
                self.send(peer, wrap(value))?;
            }
            Ok(value)
        } else {
            unwrap(self.recv(root)?)
                .map_err(|other| comm_error(root, format!("unexpected message {other:?}")))
        }
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.to_peer.len()
    }

    fn broadcast_f32(&self, root: usize, value: f32) -> Result<f32> {
        self.broadcast(root, value, Message::Scalar, |m| match m {
            Message::Scalar(v) => Ok(v),
            other => Err(other),
        })
    }

    fn broadcast_flag(&self, root: usize, flag: bool) -> Result<bool> {
        self.broadcast(root, flag, Message::Flag, |m| match m {
            Message::Flag(v) => Ok(v),
            other => Err(other),
        })
    }

    fn all_gather_counts(&self, count: usize) -> Result<Vec<usize>> {
        for peer in self.others() {
            self.send(peer, Message::Count(count))?;
        }
        (0..self.world_size())
            .map(|peer| {
                if peer == self.rank {
                    return Ok(count);
                }
                match self.recv(peer)? {
                    Message::Count(c) => Ok(c),
                    other => Err(comm_error(peer, format!("unexpected message {other:?}"))),
                }
            })
            .collect()
    }

    fn all_gather_varcount(&self, local: &[f32], counts: &[usize], out: &mut [f32]) -> Result<()> {
        let world = self.world_size();
        anyhow::ensure!(
            counts.len() == world,
            "all-gather needs one count per participant ({world}), got {}",
            counts.len()
        );
        let total: usize = counts.iter().sum();
        anyhow::ensure!(
            out.len() == total && local.len() == counts[self.rank],
            "all-gather buffers do not match counts (out {} of {total}, local {} of {})",
            out.len(),
            local.len(),
            counts[self.rank]
        );

        for peer in self.others() {
            self.send(peer, Message::Slice(local.to_vec()))?;
        }

        let mut displacement = 0;
        for (peer, &count) in counts.iter().enumerate() {
            let target = &mut out[displacement..displacement + count];
            if peer == self.rank {
                target.copy_from_slice(local);
            } else {
                match self.recv(peer)? {
                    Message::Slice(slice) if slice.len() == count => target.copy_from_slice(&slice),
                    Message::Slice(slice) => {
                        return Err(comm_error(
                            peer,
                            format!("sent {} values, expected {count}", slice.len()),
                        ))
                    }
                    other => return Err(comm_error(peer, format!("unexpected message {other:?}"))),
                }
            }
            displacement += count;
        }
        Ok(())
    }

    fn reduce_sum(&self, root: usize, value: f64) -> Result<Option<f64>> {
        self.check_root(root)?;
        if self.rank != root {
            self.send(root, Message::Partial(value))?;
            return Ok(None);
        }
        let mut total = 0.0;
        for peer in 0..self.world_size() {
            total += if peer == root {
                value
            } else {
                match self.recv(peer)? {
                    Message::Partial(v) => v,
                    other => return Err(comm_error(peer, format!("unexpected message {other:?}"))),
                }
            };
        }
        Ok(Some(total))
    }
}

/// A fixed group of in-process participants
///
/// # Example
///
/// ```
/// use sparse_pagerank::{Communicator, LocalCluster};
///
/// let cluster = LocalCluster::new(3).unwrap();
/// let sums = cluster
///     .run(|comm| {
///         #[allow(clippy::cast_precision_loss)]
///         let mine = comm.rank() as f64;
///         comm.reduce_sum(0, mine)
///     })
///     .unwrap();
/// assert_eq!(sums, vec![Some(3.0), None, None]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCluster {
    world_size: usize,
    timeout: Option<Duration>,
}

impl LocalCluster {
    /// Group of `world_size` participants
    ///
    /// # Errors
    ///
    /// Returns an error if `world_size` is 0
    pub fn new(world_size: usize) -> Result<Self> {
        anyhow::ensure!(world_size > 0, "a cluster needs at least one participant");
        Ok(Self {
            world_size,
            timeout: None,
        })
    }

    /// Fail a receive that waits longer than `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of participants
    #[must_use]
    pub const fn world_size(&self) -> usize {
        self.world_size
    }

    /// Fully connected endpoints, indexed by rank
    #[must_use]
    pub fn communicators(&self) -> Vec<LocalCommunicator> {
        let w = self.world_size;
        let mut senders: Vec<Vec<Sender<Message>>> =
            (0..w).map(|_| Vec::with_capacity(w)).collect();
        let mut receivers: Vec<Vec<Receiver<Message>>> =
            (0..w).map(|_| Vec::with_capacity(w)).collect();
        for from in 0..w {
            for to in 0..w {
                let (tx, rx) = crossbeam_channel::unbounded();
                senders[from].push(tx);
                receivers[to].push(rx);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (to_peer, from_peer))| LocalCommunicator {
                rank,
                to_peer,
                from_peer,
                timeout: self.timeout,
            })
            .collect()
    }

    /// Run `participant` once per rank, each on its own thread
    ///
    /// Returns the per-rank results in rank order.
    ///
    /// # Errors
    ///
    /// Returns the lowest-ranked participant's error, or an error if a
    /// participant thread panics or cannot be spawned
    pub fn run<T, F>(&self, participant: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&LocalCommunicator) -> Result<T> + Sync,
    {
        let participant = &participant;
        std::thread::scope(|scope| {
            let handles = self
                .communicators()
                .into_iter()
                .map(|comm| {
                    std::thread::Builder::new()
                        .name(format!("participant-{}", comm.rank))
                        .spawn_scoped(scope, move || participant(&comm))
                })
                .collect::<std::io::Result<Vec<_>>>()
                .map_err(|e| anyhow!("Failed to spawn participant thread: {e}"))?;

            // join everyone before reporting
            let outcomes: Vec<Result<T>> = handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("participant {rank} panicked")))
                })
                .collect();
            outcomes.into_iter().collect()
        })
    }
}
