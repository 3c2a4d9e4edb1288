//! Run configuration and the summary a run produces.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::barrier::TournamentBarrier;
use crate::error::{Error, Result};
use crate::group;
use crate::rendezvous::{RendezvousBarrier, TcpTransport};
use crate::topology::MAX_PARTICIPANTS;

/// Default time a non-zero rank keeps retrying its connection to rank 0.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Membership in a multi-process group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    /// This process's rank.
    pub rank: usize,
    /// Number of processes.
    pub group_size: usize,
    /// Address rank 0 listens on and the others connect to.
    pub coordinator: SocketAddr,
    /// How long a non-zero rank retries its connection.
    pub connect_timeout: Duration,
}

/// Everything needed for one two-level run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Threads in this process, equal to the tree's participant count.
    pub threads: usize,
    /// Barrier episodes each thread performs.
    pub barriers: usize,
    /// Process group to rendezvous with afterwards; `None` for a lone process.
    pub group: Option<GroupConfig>,
}

impl RunConfig {
    /// A single-process run.
    pub fn local(threads: usize, barriers: usize) -> Self {
        Self {
            threads,
            barriers,
            group: None,
        }
    }

    /// Rejects configurations no barrier can run with.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 || self.threads > MAX_PARTICIPANTS {
            return Err(Error::InvalidParticipantCount {
                count: self.threads,
                max: MAX_PARTICIPANTS,
            });
        }
        if let Some(g) = &self.group {
            if g.group_size == 0 || g.rank >= g.group_size {
                return Err(Error::InvalidGroup {
                    rank: g.rank,
                    group_size: g.group_size,
                });
            }
        }
        Ok(())
    }

    /// Rank of this process, 0 when running alone.
    pub fn rank(&self) -> usize {
        self.group.as_ref().map_or(0, |g| g.rank)
    }

    /// Size of the process group, 1 when running alone.
    pub fn group_size(&self) -> usize {
        self.group.as_ref().map_or(1, |g| g.group_size)
    }

    /// Runs the configured episodes, then the process rendezvous if any.
    ///
    /// The transport is set up before the clock starts; the summary times the
    /// local episodes plus the rendezvous.
    pub fn run(&self) -> Result<RunSummary> {
        self.validate()?;

        let barrier = TournamentBarrier::new(self.threads)?;
        let mut rendezvous = self.group.as_ref().map(connect).transpose()?;

        tracing::info!(
            threads = self.threads,
            barriers = self.barriers,
            rank = self.rank(),
            group_size = self.group_size(),
            num_rounds = barrier.tree().num_rounds(),
            "starting run"
        );

        let start = Instant::now();
        match rendezvous.as_mut() {
            Some(r) => group::synchronize(&barrier, self.threads, self.barriers, r, |_, _| {})?,
            None => group::run_episodes(&barrier, self.threads, self.barriers, |_, _| {})?,
        }
        let elapsed = start.elapsed();

        let summary = RunSummary::new(self, barrier.tree().num_rounds(), elapsed);
        tracing::info!(elapsed_us = summary.elapsed_us, "run complete");
        Ok(summary)
    }
}

fn connect(g: &GroupConfig) -> Result<RendezvousBarrier<TcpTransport>> {
    let transport = if g.rank == 0 {
        TcpTransport::listen(g.coordinator, g.group_size)?
    } else {
        TcpTransport::connect_retrying(g.coordinator, g.rank, g.group_size, g.connect_timeout)?
    };
    Ok(RendezvousBarrier::new(transport))
}

/// Outcome of one run, serializable for sweep tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Threads in this process.
    pub threads: usize,
    /// Episodes per thread.
    pub barriers: usize,
    /// Rank of this process.
    pub rank: usize,
    /// Processes in the group.
    pub group_size: usize,
    /// Active rounds of the tree.
    pub num_rounds: usize,
    /// Wall time of the run, in microseconds.
    pub elapsed_us: u64,
    /// Wall time divided by the episode count, in nanoseconds.
    pub per_episode_ns: f64,
}

impl RunSummary {
    fn new(config: &RunConfig, num_rounds: usize, elapsed: Duration) -> Self {
        let per_episode_ns = if config.barriers == 0 {
            0.0
        } else {
            elapsed.as_nanos() as f64 / config.barriers as f64
        };
        Self {
            threads: config.threads,
            barriers: config.barriers,
            rank: config.rank(),
            group_size: config.group_size(),
            num_rounds,
            elapsed_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            per_episode_ns,
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn local_run_reports_its_shape() {
        let summary = RunConfig::local(5, 20).run().unwrap();
        assert_eq!(summary.threads, 5);
        assert_eq!(summary.barriers, 20);
        assert_eq!(summary.rank, 0);
        assert_eq!(summary.group_size, 1);
        assert_eq!(summary.num_rounds, 3);
    }

    #[test]
    fn zero_threads_is_a_configuration_error() {
        assert!(matches!(
            RunConfig::local(0, 1).run(),
            Err(Error::InvalidParticipantCount { count: 0, .. })
        ));
    }

    #[test]
    fn rank_must_fit_group() {
        let config = RunConfig {
            threads: 2,
            barriers: 1,
            group: Some(GroupConfig {
                rank: 3,
                group_size: 3,
                coordinator: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            }),
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidGroup {
                rank: 3,
                group_size: 3
            })
        ));
    }

    #[test]
    fn summary_serializes_flat() {
        let summary = RunConfig::local(1, 0).run().unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["threads"], 1);
        assert_eq!(json["per_episode_ns"], 0.0);
        assert!(json.get("elapsed_us").is_some());
    }
}
