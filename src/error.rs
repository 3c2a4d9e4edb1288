//! Error taxonomy for tree construction, participant bookkeeping and the
//! process-level rendezvous.
//!
//! Liveness failures (a participant that never arrives) are deliberately absent:
//! they manifest as a hang, not as an error value.

use crate::topology::{Role, Slot};

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors surfaced by the barrier crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The participant count is zero or above [`crate::MAX_PARTICIPANTS`].
    #[error("participant count must be in 1..={max}, got {count}")]
    InvalidParticipantCount {
        /// Requested participant count.
        count: usize,
        /// Largest supported participant count.
        max: usize,
    },

    /// The number of launched threads differs from the count the tree was built for.
    #[error("tree was built for {expected} participants but {actual} threads were launched")]
    ParticipantMismatch {
        /// Participant count of the tree.
        expected: usize,
        /// Number of threads the caller tried to launch.
        actual: usize,
    },

    /// A participant index outside `[0, P)` was requested.
    #[error("participant {vpid} is out of range for a group of {participants}")]
    ParticipantOutOfRange {
        /// Requested index.
        vpid: usize,
        /// Group size.
        participants: usize,
    },

    /// A participant slot is already owned by a live handle.
    #[error("participant {vpid} is already claimed by another handle")]
    ParticipantClaimed {
        /// The claimed index.
        vpid: usize,
    },

    /// Rank/group-size combination that cannot form a process group.
    #[error("rank {rank} is invalid for a process group of {group_size}")]
    InvalidGroup {
        /// Offending rank.
        rank: usize,
        /// Group size.
        group_size: usize,
    },

    /// The builder computed an opponent outside `[0, P)`.
    #[error("opponent of {at} ({role}) resolves to participant {opponent}, outside 0..{participants}")]
    OpponentOutOfRange {
        /// Cell whose opponent was being computed.
        at: Slot,
        /// Role of that cell.
        role: Role,
        /// The computed (signed) opponent index.
        opponent: isize,
        /// Group size.
        participants: usize,
    },

    /// The tree does not have exactly one champion.
    #[error("tree must have exactly one champion, found {found}")]
    ChampionCount {
        /// Number of champion cells found.
        found: usize,
    },

    /// A signalling cell's opponent does not point back at it.
    #[error("{at} ({role}) is paired with {opponent}, which does not pair back")]
    UnpairedOpponent {
        /// Cell with the one-sided link.
        at: Slot,
        /// Role of that cell.
        role: Role,
        /// Cell it points at.
        opponent: Slot,
    },

    /// A signalling cell has no opponent to signal.
    #[error("{at} ({role}) has no opponent")]
    MissingOpponent {
        /// Cell without a link.
        at: Slot,
        /// Role of that cell.
        role: Role,
    },

    /// A participant's climb reaches a role it can never act on.
    #[error("participant {vpid} reaches {role} at round {round} while climbing")]
    UnreachableRole {
        /// Climbing participant.
        vpid: usize,
        /// Round of the offending cell.
        round: usize,
        /// Role found there.
        role: Role,
    },

    /// A participant's climb runs past the top round without exiting.
    #[error("participant {vpid} climbs past round {depth} without losing or winning the tournament")]
    ClimbOverrun {
        /// Climbing participant.
        vpid: usize,
        /// Top round of the tree.
        depth: usize,
    },

    /// The process-level transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A worker thread panicked while running barrier episodes.
    #[error("worker thread for participant {vpid} panicked")]
    WorkerPanicked {
        /// Participant index of the panicked thread.
        vpid: usize,
    },
}

/// Failures of the message-passing layer under the rendezvous barrier.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("transport i/o failed")]
    Io(#[from] std::io::Error),

    /// The peer hung up.
    #[error("rank {peer} disconnected")]
    Disconnected {
        /// The rank that went away.
        peer: usize,
    },

    /// A frame could not be decoded.
    #[error("malformed control frame {bytes:02x?}")]
    Malformed {
        /// Raw frame bytes.
        bytes: [u8; 8],
    },

    /// A well-formed frame arrived out of protocol order.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The transport has no link between the two ranks.
    #[error("no link from rank {from} to rank {to}")]
    NoRoute {
        /// Sending rank.
        from: usize,
        /// Destination rank.
        to: usize,
    },
}
