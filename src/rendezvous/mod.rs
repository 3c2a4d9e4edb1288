//! Process-level rendezvous barrier over message passing.
//!
//! A centralized gather/release: rank 0 collects one arrival from every other
//! rank and only then releases them all. It runs once per outer
//! synchronization point, so its linear cost is not on the critical path of the
//! thread-level barrier.

pub mod channel;
pub mod message;
pub mod tcp;
pub mod transport;

pub use channel::ChannelTransport;
pub use message::{Message, FRAME_LEN};
pub use tcp::TcpTransport;
pub use transport::Transport;

use crate::error::{Error, Result, TransportError};

/// Synchronizes this process with every other rank of its group.
///
/// Every call uses epoch 0. Use [`RendezvousBarrier`] to have successive
/// calls checked against each other.
///
/// # Errors
/// Any transport failure, or a protocol violation by a peer. Neither is retried.
pub fn process_barrier<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    rendezvous(transport, 0)
}

fn rendezvous<T: Transport + ?Sized>(transport: &mut T, epoch: u32) -> Result<()> {
    let rank = transport.rank();
    let group_size = transport.group_size();
    if rank >= group_size {
        return Err(Error::InvalidGroup { rank, group_size });
    }

    if rank == 0 {
        for peer in 1..group_size {
            match transport.recv(peer)? {
                Message::Arrival { epoch: e } if e == epoch => {
                    tracing::trace!(peer, epoch, "arrival");
                }
                other => return Err(unexpected(peer, epoch, other)),
            }
        }
        tracing::debug!(epoch, group_size, "all ranks arrived, releasing");
        for peer in 1..group_size {
            transport.send(peer, Message::Release { epoch })?;
        }
    } else {
        transport.send(0, Message::Arrival { epoch })?;
        match transport.recv(0)? {
            Message::Release { epoch: e } if e == epoch => {
                tracing::debug!(rank, epoch, "released");
            }
            other => return Err(unexpected(0, epoch, other)),
        }
    }
    Ok(())
}

fn unexpected(peer: usize, epoch: u32, message: Message) -> Error {
    TransportError::Protocol(format!(
        "unexpected {message:?} from rank {peer} during epoch {epoch}"
    ))
    .into()
}

/// A reusable rendezvous barrier that owns its transport and numbers its epochs.
#[derive(Debug)]
pub struct RendezvousBarrier<T> {
    transport: T,
    epoch: u32,
}

impl<T: Transport> RendezvousBarrier<T> {
    /// Wraps `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            epoch: 0,
        }
    }

    /// Blocks until every rank has called `wait` for the same epoch.
    pub fn wait(&mut self) -> Result<()> {
        rendezvous(&mut self.transport, self.epoch)?;
        self.epoch = self.epoch.wrapping_add(1);
        Ok(())
    }

    /// This process's rank.
    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    /// Number of ranks.
    pub fn group_size(&self) -> usize {
        self.transport.group_size()
    }

    /// Completed rendezvous count, modulo 2^32.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Gives the transport back.
    pub fn into_inner(self) -> T {
        self.transport
    }
}
