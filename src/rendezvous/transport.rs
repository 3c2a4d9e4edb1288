//! The message-passing seam under the rendezvous barrier.

use super::message::Message;
use crate::error::TransportError;

/// Reliable, in-order, point-to-point delivery between ranks of a process group.
///
/// The rendezvous barrier only ever talks between rank 0 and the other ranks,
/// so implementations are free to provide just those links.
pub trait Transport {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn group_size(&self) -> usize;

    /// Sends `message` to rank `to`.
    fn send(&mut self, to: usize, message: Message) -> Result<(), TransportError>;

    /// Blocks until the next message from rank `from` arrives.
    fn recv(&mut self, from: usize) -> Result<Message, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn group_size(&self) -> usize {
        (**self).group_size()
    }

    fn send(&mut self, to: usize, message: Message) -> Result<(), TransportError> {
        (**self).send(to, message)
    }

    fn recv(&mut self, from: usize) -> Result<Message, TransportError> {
        (**self).recv(from)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn group_size(&self) -> usize {
        (**self).group_size()
    }

    fn send(&mut self, to: usize, message: Message) -> Result<(), TransportError> {
        (**self).send(to, message)
    }

    fn recv(&mut self, from: usize) -> Result<Message, TransportError> {
        (**self).recv(from)
    }
}
