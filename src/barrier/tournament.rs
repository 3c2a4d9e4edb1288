//! The tournament barrier engine and its participant handles.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::topology::{Role, RoundEntry, RoundTree};

/// Runs one barrier episode for participant `vpid` and returns the next sense.
///
/// The climb starts at round 1. Winners wait for their loser and move up, byes
/// move up without waiting, a loser signals its winner and stops, and the
/// champion waits for the last loser. The descend then walks back down to the
/// round 0 dropout, with every winner waking the loser it beat.
///
/// Never returns if some participant of the tree does not arrive.
///
/// # Panics
/// If `vpid` is not below `tree.participants()`.
pub fn arrive_and_wait(tree: &RoundTree, vpid: usize, sense: bool) -> bool {
    assert!(
        vpid < tree.participants(),
        "participant {vpid} out of range for a tree of {}",
        tree.participants()
    );

    let depth = tree.depth();
    let mut round = 1;

    loop {
        let entry = tree.cell(vpid, round);
        match entry.role() {
            Role::Loser => {
                signal_opponent(tree, entry, sense);
                entry.flag().wait_for(sense);
                break;
            }
            Role::Winner => entry.flag().wait_for(sense),
            Role::Champion => {
                // No opponent only for a group of one: nobody to wait for or wake.
                if let Some(opponent) = entry.opponent() {
                    entry.flag().wait_for(sense);
                    tree.flag_at(opponent).signal(sense);
                }
                break;
            }
            Role::Bye => {}
            role @ (Role::Dropout | Role::Unused) => {
                unreachable!("participant {vpid} climbed into {role} at round {round}")
            }
        }
        debug_assert!(round < depth, "participant {vpid} climbed past round {depth}");
        round += 1;
    }

    loop {
        round -= 1;
        let entry = tree.cell(vpid, round);
        match entry.role() {
            Role::Winner => signal_opponent(tree, entry, sense),
            Role::Dropout => break,
            _ => {}
        }
    }

    !sense
}

/// In-place form of [`arrive_and_wait`]: flips `sense` for the next episode.
#[inline]
pub fn tournament_barrier(tree: &RoundTree, vpid: usize, sense: &mut bool) {
    *sense = arrive_and_wait(tree, vpid, *sense);
}

#[inline(always)]
fn signal_opponent(tree: &RoundTree, entry: &RoundEntry, sense: bool) {
    if let Some(opponent) = entry.opponent() {
        tree.flag_at(opponent).signal(sense);
    }
}

/// Owns a round tree and hands out one [`Participant`] per slot.
///
/// ```
/// use tournament::TournamentBarrier;
///
/// let barrier = TournamentBarrier::new(4).unwrap();
/// std::thread::scope(|s| {
///     for mut p in barrier.participants().unwrap() {
///         s.spawn(move || {
///             for _ in 0..3 {
///                 p.wait();
///             }
///         });
///     }
/// });
/// ```
pub struct TournamentBarrier {
    tree: RoundTree,
    claimed: Box<[AtomicBool]>,
}

impl TournamentBarrier {
    /// Builds the tree for `participants` threads.
    pub fn new(participants: usize) -> Result<Self> {
        let tree = RoundTree::build(participants)?;
        let claimed = (0..participants).map(|_| AtomicBool::new(false)).collect();
        Ok(Self { tree, claimed })
    }

    /// The underlying tree.
    #[inline]
    pub fn tree(&self) -> &RoundTree {
        &self.tree
    }

    /// Group size.
    #[inline]
    pub fn participants_len(&self) -> usize {
        self.tree.participants()
    }

    /// Claims slot `vpid`.
    ///
    /// # Errors
    /// [`Error::ParticipantOutOfRange`] if `vpid` is not a slot of this tree, and
    /// [`Error::ParticipantClaimed`] while another handle for it is alive.
    pub fn participant(&self, vpid: usize) -> Result<Participant<'_>> {
        let slot = self.claimed.get(vpid).ok_or(Error::ParticipantOutOfRange {
            vpid,
            participants: self.tree.participants(),
        })?;
        if slot.swap(true, Ordering::AcqRel) {
            return Err(Error::ParticipantClaimed { vpid });
        }
        Ok(Participant {
            barrier: self,
            vpid,
            sense: true,
            episodes: 0,
        })
    }

    /// Claims every slot, in vpid order.
    pub fn participants(&self) -> Result<Vec<Participant<'_>>> {
        (0..self.tree.participants()).map(|vpid| self.participant(vpid)).collect()
    }
}

impl fmt::Debug for TournamentBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TournamentBarrier")
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

/// Private state of one thread taking part in the barrier.
#[derive(Debug)]
pub struct Participant<'a> {
    barrier: &'a TournamentBarrier,
    vpid: usize,
    sense: bool,
    episodes: u64,
}

impl Participant<'_> {
    /// Blocks until every participant has arrived at this episode.
    ///
    /// Returns the sense the next episode will use.
    #[inline]
    pub fn wait(&mut self) -> bool {
        tournament_barrier(&self.barrier.tree, self.vpid, &mut self.sense);
        self.episodes += 1;
        self.sense
    }

    /// Stable index into the tree.
    #[inline]
    pub fn vpid(&self) -> usize {
        self.vpid
    }

    /// Sense expected by the next episode.
    #[inline]
    pub fn sense(&self) -> bool {
        self.sense
    }

    /// Episodes completed through this handle.
    #[inline]
    pub fn episodes(&self) -> u64 {
        self.episodes
    }
}

impl Drop for Participant<'_> {
    fn drop(&mut self) {
        self.barrier.claimed[self.vpid].store(false, Ordering::Release);
    }
}
