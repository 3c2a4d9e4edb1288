//! Tournament roles and the pure role function.

use core::fmt;

use serde::Serialize;

/// What a participant does at one round of the tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    /// Waits for its loser, then climbs on; wakes the loser while descending.
    Winner,
    /// Signals its winner, then waits to be woken.
    Loser,
    /// Has no opponent this round and advances without waiting.
    Bye,
    /// Root of the tree: waits for the last loser, then starts the wakeup.
    Champion,
    /// Round 0 sentinel that ends the descend phase.
    Dropout,
    /// The participant has already left the tournament.
    Unused,
}

impl Role {
    /// Roles that carry an opponent link.
    #[inline]
    pub const fn signals(self) -> bool {
        matches!(self, Role::Winner | Role::Loser | Role::Champion)
    }

    /// Single-letter code used in role tables.
    pub const fn code(self) -> char {
        match self {
            Role::Winner => 'W',
            Role::Loser => 'L',
            Role::Bye => 'B',
            Role::Champion => 'C',
            Role::Dropout => 'D',
            Role::Unused => '.',
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Winner => "winner",
            Role::Loser => "loser",
            Role::Bye => "bye",
            Role::Champion => "champion",
            Role::Dropout => "dropout",
            Role::Unused => "unused",
        };
        f.write_str(name)
    }
}

/// Number of active rounds, `ceil(log2(participants))`.
///
/// Zero for a single participant. `participants` must be non-zero.
#[inline]
pub const fn rounds_for(participants: usize) -> usize {
    // next_power_of_two is exact for the sizes the builder accepts.
    participants.next_power_of_two().trailing_zeros() as usize
}

/// Role of participant `i` at round `k` in a tournament of `participants`.
///
/// Round 0 is always [`Role::Dropout`]. The champion rule is checked first:
/// at the top round participant 0 would otherwise satisfy neither the winner
/// nor the bye condition.
pub const fn role_of(i: usize, k: usize, participants: usize) -> Role {
    if k == 0 {
        return Role::Dropout;
    }
    let span = 1usize << k;
    let half = 1usize << (k - 1);

    if i == 0 && span >= participants {
        Role::Champion
    } else if i % span == 0 {
        if i + half < participants {
            // i == 0 with span < participants, or a later subtree root.
            Role::Winner
        } else {
            Role::Bye
        }
    } else if i % span == half {
        Role::Loser
    } else {
        Role::Unused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_use_integer_ceiling() {
        assert_eq!(rounds_for(1), 0);
        assert_eq!(rounds_for(2), 1);
        assert_eq!(rounds_for(3), 2);
        assert_eq!(rounds_for(4), 2);
        assert_eq!(rounds_for(5), 3);
        assert_eq!(rounds_for(8), 3);
        assert_eq!(rounds_for(9), 4);
        assert_eq!(rounds_for(13), 4);
        assert_eq!(rounds_for(1 << 16), 16);
    }

    #[test]
    fn round_zero_is_dropout() {
        for i in 0..16 {
            assert_eq!(role_of(i, 0, 16), Role::Dropout);
        }
    }

    #[test]
    fn four_participants() {
        let r1: Vec<_> = (0..4).map(|i| role_of(i, 1, 4)).collect();
        assert_eq!(r1, [Role::Winner, Role::Loser, Role::Winner, Role::Loser]);
        let r2: Vec<_> = (0..4).map(|i| role_of(i, 2, 4)).collect();
        assert_eq!(r2, [Role::Champion, Role::Unused, Role::Loser, Role::Unused]);
    }

    #[test]
    fn odd_participant_gets_byes() {
        assert_eq!(role_of(4, 1, 5), Role::Bye);
        assert_eq!(role_of(4, 2, 5), Role::Bye);
        assert_eq!(role_of(4, 3, 5), Role::Loser);
        assert_eq!(role_of(0, 3, 5), Role::Champion);
        // Participant 2 loses to 0 at round 2, so it has no role at round 3.
        assert_eq!(role_of(2, 3, 5), Role::Unused);
    }

    #[test]
    fn only_signalling_roles_signal() {
        assert!(Role::Winner.signals());
        assert!(Role::Loser.signals());
        assert!(Role::Champion.signals());
        assert!(!Role::Bye.signals());
        assert!(!Role::Dropout.signals());
        assert!(!Role::Unused.signals());
    }
}
