//! # `tournament` - Two-Level Barrier Synchronization
//!
//! A scalable barrier for mixed thread/process parallel programs:
//!
//! - **Tournament barrier** (Mellor-Crummey & Scott): threads of one process
//!   climb a statically built combining tree, each spinning only on flags it
//!   owns. The critical path is `O(log P)` and no spin location is shared by
//!   more than two threads.
//! - **Rendezvous barrier**: processes that share no memory meet through a
//!   linear gather/release over message passing, once their threads have
//!   finished their local episodes.
//!
//! ## Architecture
//!
//! 1. **Topology** ([`topology`]): role and opponent of every
//!    `(participant, round)` cell, derived from the participant count with
//!    integer arithmetic and validated before any thread runs.
//! 2. **Engine** ([`barrier`]): the climb/descend traversal with sense
//!    reversal over release/acquire atomic flags.
//! 3. **Rendezvous** ([`rendezvous`]): the process barrier and its
//!    transports (in-memory channels, TCP).
//! 4. **Composition** ([`group`], [`config`]): run local episodes on scoped
//!    threads, join them, then rendezvous.
//!
//! ## Guarantees
//!
//! - **Safety**: no participant leaves episode `e` before every participant
//!   has entered it.
//! - **Locality**: every flag has one writer and one reader per episode.
//! - **No liveness detection**: a participant that never arrives blocks the
//!   group forever. There are no timeouts.
//!
//! ## Example
//!
//! ```rust
//! use tournament::TournamentBarrier;
//!
//! let barrier = TournamentBarrier::new(4).unwrap();
//! std::thread::scope(|s| {
//!     for mut p in barrier.participants().unwrap() {
//!         s.spawn(move || {
//!             for _ in 0..10 {
//!                 p.wait();
//!             }
//!         });
//!     }
//! });
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod barrier;
pub mod config;
pub mod error;
pub mod group;
pub mod rendezvous;
pub mod topology;

mod sync;

pub use barrier::{arrive_and_wait, tournament_barrier, Participant, SenseFlag, TournamentBarrier};
pub use config::{GroupConfig, RunConfig, RunSummary};
pub use error::{Error, Result, TransportError};
pub use rendezvous::{
    process_barrier, ChannelTransport, Message, RendezvousBarrier, TcpTransport, Transport,
};
pub use topology::{build_round_tree, Role, RoundEntry, RoundTree, Slot, MAX_PARTICIPANTS};

// A wire frame is two little-endian u32s.
const _: () = assert!(rendezvous::FRAME_LEN == 2 * core::mem::size_of::<u32>());
