//! Three in-process "ranks", each synchronizing its own threads with a
//! tournament barrier before meeting the other ranks over channels.
//!
//! `cargo run --example two_level`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tournament::{group, ChannelTransport, RendezvousBarrier, TournamentBarrier, Transport};

const RANKS: usize = 3;
const THREADS: usize = 4;
const EPISODES: usize = 1_000;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("two_level=info,tournament=info")
        .with_writer(std::io::stderr)
        .init();

    let work_done = AtomicUsize::new(0);
    let work_done = &work_done;

    thread::scope(|s| -> anyhow::Result<()> {
        let handles: Vec<_> = ChannelTransport::star(RANKS)?
            .into_iter()
            .map(|transport| {
                s.spawn(move || -> tournament::Result<usize> {
                    let rank = transport.rank();
                    let barrier = TournamentBarrier::new(THREADS)?;
                    let mut rendezvous = RendezvousBarrier::new(transport);
                    group::synchronize(&barrier, THREADS, EPISODES, &mut rendezvous, |_, _| {
                        work_done.fetch_add(1, Ordering::Relaxed);
                    })?;
                    tracing::info!(rank, rounds = barrier.tree().num_rounds(), "rank released");
                    Ok(rank)
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(result) => {
                    result?;
                }
                Err(_) => anyhow::bail!("a rank panicked"),
            }
        }
        Ok(())
    })?;

    println!(
        "{RANKS} ranks x {THREADS} threads completed {} episode bodies",
        work_done.load(Ordering::Relaxed)
    );
    Ok(())
}
