//! In-memory star transport over crossbeam channels.
//!
//! Useful for tests and for modelling a process group with threads: every
//! "process" still exchanges only encoded frames, never shared state.

use crossbeam_channel::{bounded, Receiver, Sender};

use super::message::{Message, FRAME_LEN};
use super::transport::Transport;
use crate::error::{Error, Result, TransportError};

type Frame = [u8; FRAME_LEN];

// One arrival and one release can be in flight per link.
const LINK_CAPACITY: usize = 2;

struct Link {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

/// One rank's end of a channel-backed star.
pub struct ChannelTransport {
    rank: usize,
    group_size: usize,
    links: Vec<Option<Link>>,
}

impl ChannelTransport {
    /// Creates a star of `group_size` ranks centred on rank 0.
    ///
    /// The returned vector is indexed by rank.
    ///
    /// # Errors
    /// [`Error::InvalidGroup`] for an empty group.
    pub fn star(group_size: usize) -> Result<Vec<Self>> {
        if group_size == 0 {
            return Err(Error::InvalidGroup {
                rank: 0,
                group_size,
            });
        }

        let mut hub = Self::empty(0, group_size);
        let mut spokes = Vec::with_capacity(group_size - 1);
        for rank in 1..group_size {
            let (to_spoke, from_hub) = bounded(LINK_CAPACITY);
            let (to_hub, from_spoke) = bounded(LINK_CAPACITY);
            hub.links[rank] = Some(Link {
                tx: to_spoke,
                rx: from_spoke,
            });
            let mut spoke = Self::empty(rank, group_size);
            spoke.links[0] = Some(Link {
                tx: to_hub,
                rx: from_hub,
            });
            spokes.push(spoke);
        }

        let mut all = Vec::with_capacity(group_size);
        all.push(hub);
        all.extend(spokes);
        Ok(all)
    }

    fn empty(rank: usize, group_size: usize) -> Self {
        Self {
            rank,
            group_size,
            links: (0..group_size).map(|_| None).collect(),
        }
    }

    fn link(&self, peer: usize) -> Result<&Link, TransportError> {
        self.links
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(TransportError::NoRoute {
                from: self.rank,
                to: peer,
            })
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn group_size(&self) -> usize {
        self.group_size
    }

    fn send(&mut self, to: usize, message: Message) -> Result<(), TransportError> {
        self.link(to)?
            .tx
            .send(message.encode())
            .map_err(|_| TransportError::Disconnected { peer: to })
    }

    fn recv(&mut self, from: usize) -> Result<Message, TransportError> {
        let frame = self
            .link(from)?
            .rx
            .recv()
            .map_err(|_| TransportError::Disconnected { peer: from })?;
        Message::decode(frame)
    }
}
