//! Intra-process tournament barrier.
//!
//! Each thread spins only on flags inside its own row of the round tree, and
//! each flag has a single writer per episode, so no location is shared by more
//! than two threads. Flags are never reset: the alternating sense tells one
//! episode's signals from the next.

pub mod flag;
pub mod tournament;

pub use flag::SenseFlag;
pub use tournament::{arrive_and_wait, tournament_barrier, Participant, TournamentBarrier};
