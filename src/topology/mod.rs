//! Static topology of the tournament barrier.
//!
//! The tree is a pure function of the participant count: every cell's role and
//! opponent are derived once, validated, and never change. Only the per-cell
//! flags mutate while barrier episodes run.

pub mod role;
pub mod tree;

pub use role::{role_of, rounds_for, Role};
pub use tree::{RoundEntry, RoundTree, Slot, Topology, TopologyCell};

use crate::error::Result;

/// Largest group the builder accepts.
pub const MAX_PARTICIPANTS: usize = 1 << 16;

/// Builds the round tree for `participant_count` threads.
///
/// Equivalent to [`RoundTree::build`].
pub fn build_round_tree(participant_count: usize) -> Result<RoundTree> {
    RoundTree::build(participant_count)
}
