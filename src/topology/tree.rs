//! The round tree: every `(participant, round)` cell of a tournament, sized
//! exactly for the group it was built for.

use core::fmt;

use serde::Serialize;

use super::role::{role_of, rounds_for, Role};
use super::MAX_PARTICIPANTS;
use crate::barrier::SenseFlag;
use crate::error::{Error, Result};

/// Address of one cell: participant index and round number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slot {
    /// Participant (vpid) owning the cell.
    pub participant: usize,
    /// Round number, 0 being the dropout sentinel.
    pub round: usize,
}

impl Slot {
    /// Creates a slot.
    #[inline]
    pub const fn new(participant: usize, round: usize) -> Self {
        Self { participant, round }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.participant, self.round)
    }
}

/// One cell of the tree.
///
/// `role` and `opponent` are fixed at construction; only the flag changes.
#[derive(Debug)]
pub struct RoundEntry {
    role: Role,
    opponent: Option<Slot>,
    flag: SenseFlag,
}

impl RoundEntry {
    /// Role of the owner at this round.
    #[inline(always)]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The cell whose flag this entry signals, if its role signals at all.
    #[inline(always)]
    pub fn opponent(&self) -> Option<Slot> {
        self.opponent
    }

    /// The flag the owner spins on.
    #[inline(always)]
    pub fn flag(&self) -> &SenseFlag {
        &self.flag
    }
}

/// Role and opponent of one cell, without its flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopologyCell {
    /// Role of the cell.
    pub role: Role,
    /// Opponent link, if any.
    pub opponent: Option<Slot>,
}

/// Flag-free snapshot of a tree, comparable across builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    /// Group size.
    pub participants: usize,
    /// `ceil(log2(participants))`.
    pub num_rounds: usize,
    /// `cells[i][k]` for participant `i`, round `k`.
    pub cells: Vec<Vec<TopologyCell>>,
}

/// The shared tournament tree for a fixed group of participants.
///
/// Rows are stored contiguously per participant so the cells a participant
/// spins on sit next to each other.
pub struct RoundTree {
    participants: usize,
    num_rounds: usize,
    depth: usize,
    cells: Box<[RoundEntry]>,
}

impl RoundTree {
    /// Builds and validates the tree for `participants` threads.
    ///
    /// # Errors
    /// [`Error::InvalidParticipantCount`] for zero or oversized groups, and one
    /// of the topology errors if the derived tree is inconsistent.
    pub fn build(participants: usize) -> Result<Self> {
        if participants == 0 || participants > MAX_PARTICIPANTS {
            return Err(Error::InvalidParticipantCount {
                count: participants,
                max: MAX_PARTICIPANTS,
            });
        }

        let num_rounds = rounds_for(participants);
        // A lone participant still needs a champion cell at round 1.
        let depth = num_rounds.max(1);

        let mut cells = Vec::with_capacity(participants * (depth + 1));
        for i in 0..participants {
            for k in 0..=depth {
                let role = role_of(i, k, participants);
                let opponent = opponent_of(i, k, role, participants)?;
                cells.push(RoundEntry {
                    role,
                    opponent,
                    flag: SenseFlag::default(),
                });
            }
        }

        let tree = Self {
            participants,
            num_rounds,
            depth,
            cells: cells.into_boxed_slice(),
        };
        tree.validate()?;

        tracing::debug!(participants, num_rounds, "built tournament tree\n{tree}");
        Ok(tree)
    }

    /// Number of participants the tree was built for.
    #[inline]
    pub fn participants(&self) -> usize {
        self.participants
    }

    /// `ceil(log2(P))`; zero for a single participant.
    #[inline]
    pub fn num_rounds(&self) -> usize {
        self.num_rounds
    }

    /// Highest round index stored, `max(num_rounds, 1)`.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The cell at `(participant, round)`, if in range.
    pub fn entry(&self, participant: usize, round: usize) -> Option<&RoundEntry> {
        if participant < self.participants && round <= self.depth {
            Some(self.cell(participant, round))
        } else {
            None
        }
    }

    /// Role at `(participant, round)`, if in range.
    pub fn role(&self, participant: usize, round: usize) -> Option<Role> {
        self.entry(participant, round).map(RoundEntry::role)
    }

    /// Opponent link at `(participant, round)`, if in range and present.
    pub fn opponent(&self, participant: usize, round: usize) -> Option<Slot> {
        self.entry(participant, round).and_then(RoundEntry::opponent)
    }

    /// The unique champion cell.
    pub fn champion(&self) -> Slot {
        // Participant 0 is champion at the top round; validate() guarantees it.
        Slot::new(0, self.depth)
    }

    /// Flag-free snapshot of roles and links.
    pub fn topology(&self) -> Topology {
        let cells = (0..self.participants)
            .map(|i| {
                (0..=self.depth)
                    .map(|k| {
                        let e = self.cell(i, k);
                        TopologyCell {
                            role: e.role,
                            opponent: e.opponent,
                        }
                    })
                    .collect()
            })
            .collect();
        Topology {
            participants: self.participants,
            num_rounds: self.num_rounds,
            cells,
        }
    }

    #[inline(always)]
    pub(crate) fn cell(&self, participant: usize, round: usize) -> &RoundEntry {
        &self.cells[participant * (self.depth + 1) + round]
    }

    #[inline(always)]
    pub(crate) fn flag_at(&self, slot: Slot) -> &SenseFlag {
        &self.cell(slot.participant, slot.round).flag
    }

    /// Checks the structural invariants the engine relies on.
    fn validate(&self) -> Result<()> {
        let champions = self.cells.iter().filter(|e| e.role == Role::Champion).count();
        if champions != 1 {
            return Err(Error::ChampionCount { found: champions });
        }

        for i in 0..self.participants {
            for k in 0..=self.depth {
                self.check_pairing(Slot::new(i, k))?;
            }
            self.check_climb(i)?;
        }
        Ok(())
    }

    fn check_pairing(&self, at: Slot) -> Result<()> {
        let entry = self.cell(at.participant, at.round);
        if !entry.role.signals() {
            return Ok(());
        }
        let Some(opponent) = entry.opponent else {
            if entry.role == Role::Champion && self.participants == 1 {
                return Ok(());
            }
            return Err(Error::MissingOpponent {
                at,
                role: entry.role,
            });
        };

        let other = self.cell(opponent.participant, opponent.round);
        let roles_match = match entry.role {
            Role::Loser => matches!(other.role, Role::Winner | Role::Champion),
            _ => other.role == Role::Loser,
        };
        if roles_match && other.opponent == Some(at) {
            Ok(())
        } else {
            Err(Error::UnpairedOpponent {
                at,
                role: entry.role,
                opponent,
            })
        }
    }

    fn check_climb(&self, vpid: usize) -> Result<()> {
        for round in 1..=self.depth {
            match self.cell(vpid, round).role {
                Role::Winner | Role::Bye => {}
                Role::Loser | Role::Champion => return Ok(()),
                role @ (Role::Unused | Role::Dropout) => {
                    return Err(Error::UnreachableRole { vpid, round, role })
                }
            }
        }
        Err(Error::ClimbOverrun {
            vpid,
            depth: self.depth,
        })
    }
}

fn opponent_of(i: usize, k: usize, role: Role, participants: usize) -> Result<Option<Slot>> {
    let at = Slot::new(i, k);
    let half = 1isize << k.saturating_sub(1);
    let opponent = match role {
        Role::Loser => i as isize - half,
        Role::Champion if participants == 1 => return Ok(None),
        Role::Winner | Role::Champion => i as isize + half,
        _ => return Ok(None),
    };
    if opponent < 0 || opponent as usize >= participants {
        return Err(Error::OpponentOutOfRange {
            at,
            role,
            opponent,
            participants,
        });
    }
    Ok(Some(Slot::new(opponent as usize, k)))
}

impl fmt::Display for RoundTree {
    /// One line per round, one role code per participant.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for k in 0..=self.depth {
            write!(f, "round {k:>2}:")?;
            for i in 0..self.participants {
                write!(f, " {}", self.cell(i, k).role.code())?;
            }
            if k < self.depth {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RoundTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundTree")
            .field("participants", &self.participants)
            .field("num_rounds", &self.num_rounds)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    fn roles_at(tree: &RoundTree, k: usize) -> Vec<Role> {
        (0..tree.participants()).map(|i| tree.role(i, k).unwrap()).collect()
    }

    #[test]
    fn rejects_empty_group() {
        assert!(matches!(
            RoundTree::build(0),
            Err(Error::InvalidParticipantCount { count: 0, .. })
        ));
        assert!(matches!(
            RoundTree::build(MAX_PARTICIPANTS + 1),
            Err(Error::InvalidParticipantCount { .. })
        ));
    }

    #[test]
    fn single_participant_is_champion_without_opponent() {
        let tree = RoundTree::build(1).unwrap();
        assert_eq!(tree.num_rounds(), 0);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.role(0, 0), Some(Role::Dropout));
        assert_eq!(tree.role(0, 1), Some(Role::Champion));
        assert_eq!(tree.opponent(0, 1), None);
    }

    #[test]
    fn four_participant_fixture() {
        let tree = RoundTree::build(4).unwrap();
        assert_eq!(tree.num_rounds(), 2);
        assert_eq!(roles_at(&tree, 0), [Role::Dropout; 4]);
        assert_eq!(
            roles_at(&tree, 1),
            [Role::Winner, Role::Loser, Role::Winner, Role::Loser]
        );
        assert_eq!(
            roles_at(&tree, 2),
            [Role::Champion, Role::Unused, Role::Loser, Role::Unused]
        );

        assert_eq!(tree.opponent(0, 1), Some(Slot::new(1, 1)));
        assert_eq!(tree.opponent(1, 1), Some(Slot::new(0, 1)));
        assert_eq!(tree.opponent(2, 1), Some(Slot::new(3, 1)));
        assert_eq!(tree.opponent(3, 1), Some(Slot::new(2, 1)));
        assert_eq!(tree.opponent(0, 2), Some(Slot::new(2, 2)));
        assert_eq!(tree.opponent(2, 2), Some(Slot::new(0, 2)));
        assert_eq!(tree.champion(), Slot::new(0, 2));
    }

    #[test]
    fn five_participants_bye_then_lose() {
        let tree = RoundTree::build(5).unwrap();
        assert_eq!(tree.num_rounds(), 3);
        assert_eq!(tree.role(4, 1), Some(Role::Bye));
        assert_eq!(tree.role(4, 2), Some(Role::Bye));
        assert_eq!(tree.role(4, 3), Some(Role::Loser));
        assert_eq!(tree.opponent(4, 3), Some(Slot::new(0, 3)));
        assert_eq!(tree.role(0, 3), Some(Role::Champion));
        assert_eq!(tree.opponent(0, 3), Some(Slot::new(4, 3)));
        assert_eq!(tree.opponent(4, 1), None);
    }

    #[test]
    fn out_of_range_lookups_are_none() {
        let tree = RoundTree::build(3).unwrap();
        assert!(tree.entry(3, 0).is_none());
        assert!(tree.entry(0, tree.depth() + 1).is_none());
    }

    #[test]
    fn rebuild_is_identical() {
        for p in [1, 2, 3, 7, 13, 64, 100] {
            assert_eq!(
                RoundTree::build(p).unwrap().topology(),
                RoundTree::build(p).unwrap().topology()
            );
        }
    }

    #[test]
    fn display_renders_role_table() {
        let tree = RoundTree::build(4).unwrap();
        assert_eq!(
            tree.to_string(),
            "round  0: D D D D\nround  1: W L W L\nround  2: C . L ."
        );
    }

    #[test]
    fn opponent_arithmetic_is_checked() {
        // A winner at the right edge has no partner.
        assert!(matches!(
            opponent_of(4, 1, Role::Winner, 5),
            Err(Error::OpponentOutOfRange { opponent: 5, .. })
        ));
        // A loser at round 2 needs two cells to its left.
        assert!(matches!(
            opponent_of(1, 2, Role::Loser, 4),
            Err(Error::OpponentOutOfRange { opponent: -1, .. })
        ));
    }

    fn overwrite(tree: &mut RoundTree, at: Slot, role: Role, opponent: Option<Slot>) {
        let index = at.participant * (tree.depth + 1) + at.round;
        tree.cells[index].role = role;
        tree.cells[index].opponent = opponent;
    }

    #[test]
    fn validate_counts_champions() {
        let mut tree = RoundTree::build(4).unwrap();
        overwrite(&mut tree, Slot::new(0, 2), Role::Winner, Some(Slot::new(2, 2)));
        assert!(matches!(
            tree.validate(),
            Err(Error::ChampionCount { found: 0 })
        ));

        let mut tree = RoundTree::build(4).unwrap();
        overwrite(&mut tree, Slot::new(1, 2), Role::Champion, Some(Slot::new(3, 2)));
        assert!(matches!(
            tree.validate(),
            Err(Error::ChampionCount { found: 2 })
        ));
    }

    #[test]
    fn validate_rejects_champion_without_loser() {
        let mut tree = RoundTree::build(4).unwrap();
        overwrite(&mut tree, Slot::new(2, 2), Role::Bye, None);
        assert!(matches!(
            tree.validate(),
            Err(Error::UnpairedOpponent {
                at: Slot { participant: 0, round: 2 },
                role: Role::Champion,
                opponent: Slot { participant: 2, round: 2 },
            })
        ));
    }

    #[test]
    fn validate_rejects_one_sided_link() {
        let mut tree = RoundTree::build(4).unwrap();
        // 3 keeps its loser role but points at 0 instead of its winner 2.
        overwrite(&mut tree, Slot::new(3, 1), Role::Loser, Some(Slot::new(0, 1)));
        assert!(matches!(
            tree.validate(),
            Err(Error::UnpairedOpponent {
                at: Slot { participant: 2, round: 1 },
                role: Role::Winner,
                opponent: Slot { participant: 3, round: 1 },
            })
        ));
    }

    #[test]
    fn validate_rejects_missing_opponent() {
        let mut tree = RoundTree::build(4).unwrap();
        overwrite(&mut tree, Slot::new(0, 2), Role::Champion, None);
        let err = tree.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::MissingOpponent {
                at: Slot { participant: 0, round: 2 },
                role: Role::Champion,
            }
        ));
        assert_eq!(err.to_string(), "(0, 2) (champion) has no opponent");
    }

    #[test]
    fn validate_rejects_unused_on_climb() {
        // P = 3: participant 2 has a bye at round 1 and loses to 0 at round 2.
        let mut tree = RoundTree::build(3).unwrap();
        overwrite(&mut tree, Slot::new(2, 1), Role::Unused, None);
        assert!(matches!(
            tree.validate(),
            Err(Error::UnreachableRole {
                vpid: 2,
                round: 1,
                role: Role::Unused
            })
        ));
    }

    #[test]
    fn climb_without_exit_overruns() {
        let mut tree = RoundTree::build(3).unwrap();
        overwrite(&mut tree, Slot::new(2, 2), Role::Bye, None);
        assert!(matches!(
            tree.check_climb(2),
            Err(Error::ClimbOverrun { vpid: 2, depth: 2 })
        ));
        // The champion's link to 2 breaks first when the whole tree is checked.
        assert!(matches!(
            tree.validate(),
            Err(Error::UnpairedOpponent { .. })
        ));
    }

    #[test]
    fn flags_start_false() {
        let tree = RoundTree::build(8).unwrap();
        for i in 0..8 {
            for k in 0..=tree.depth() {
                assert!(!tree.entry(i, k).unwrap().flag().load());
            }
        }
    }
}
