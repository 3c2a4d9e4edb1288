//! Two-level composition: local tournament episodes, then a process rendezvous.
//!
//! Threads of one process first run all their episodes and are joined; only
//! then does the process enter the rendezvous barrier with its peers.

use std::thread;

use crate::barrier::TournamentBarrier;
use crate::error::{Error, Result};
use crate::rendezvous::{RendezvousBarrier, Transport};

/// Runs `episodes` barrier episodes on `threads` scoped threads.
///
/// Each thread calls `work(vpid, episode)` before arriving at the barrier for
/// that episode. Returns once every thread has finished and been joined.
///
/// A panic inside `work` before the last episode leaves the other threads
/// spinning forever; the barrier has no liveness detection.
///
/// # Errors
/// [`Error::ParticipantMismatch`] if `threads` differs from the tree's
/// participant count, [`Error::ParticipantClaimed`] if some slot is held
/// elsewhere, and [`Error::WorkerPanicked`] for a panicked worker.
pub fn run_episodes<F>(
    barrier: &TournamentBarrier,
    threads: usize,
    episodes: usize,
    work: F,
) -> Result<()>
where
    F: Fn(usize, usize) + Sync,
{
    let expected = barrier.participants_len();
    if threads != expected {
        return Err(Error::ParticipantMismatch {
            expected,
            actual: threads,
        });
    }

    let participants = barrier.participants()?;
    let work = &work;

    thread::scope(|s| {
        let handles: Vec<_> = participants
            .into_iter()
            .map(|mut p| {
                s.spawn(move || {
                    let vpid = p.vpid();
                    tracing::trace!(vpid, "ready");
                    for episode in 0..episodes {
                        work(vpid, episode);
                        tracing::trace!(vpid, episode, "waiting at barrier");
                        p.wait();
                        tracing::trace!(vpid, episode, "left barrier");
                    }
                })
            })
            .collect();

        let mut outcome = Ok(());
        for (vpid, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() && outcome.is_ok() {
                outcome = Err(Error::WorkerPanicked { vpid });
            }
        }
        outcome
    })
}

/// Runs the local episodes, then one rendezvous with the rest of the group.
pub fn synchronize<F, T>(
    barrier: &TournamentBarrier,
    threads: usize,
    episodes: usize,
    rendezvous: &mut RendezvousBarrier<T>,
    work: F,
) -> Result<()>
where
    F: Fn(usize, usize) + Sync,
    T: Transport,
{
    run_episodes(barrier, threads, episodes, work)?;
    tracing::debug!(
        rank = rendezvous.rank(),
        episodes,
        "local episodes complete, entering rendezvous"
    );
    rendezvous.wait()
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn thread_count_must_match_tree() {
        let barrier = TournamentBarrier::new(4).unwrap();
        assert!(matches!(
            run_episodes(&barrier, 3, 1, |_, _| {}),
            Err(Error::ParticipantMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn zero_episodes_is_fine() {
        let barrier = TournamentBarrier::new(5).unwrap();
        run_episodes(&barrier, 5, 0, |_, _| unreachable!()).unwrap();
    }

    #[test]
    fn every_thread_runs_every_episode() {
        let barrier = TournamentBarrier::new(6).unwrap();
        let calls = AtomicUsize::new(0);
        run_episodes(&barrier, 6, 25, |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 6 * 25);
        // Handles were released on join.
        assert!(barrier.participant(0).is_ok());
    }

    #[test]
    fn panicking_worker_is_reported() {
        let barrier = TournamentBarrier::new(1).unwrap();
        let err = run_episodes(&barrier, 1, 1, |_, _| panic!("boom")).unwrap_err();
        assert!(matches!(err, Error::WorkerPanicked { vpid: 0 }));
    }
}
