//! Run sequencing: configure, listen, pile, hold, terminate.
//!
//! Phases only move forward. The hold phase has no cancellation hook; the
//! run ends when the hold duration has elapsed.

use crate::engine::acceptor::Acceptor;
use crate::engine::endpoint::{dial_target, resolve_dial, Endpoint};
use crate::engine::piler::{pile_up, PileReport};
use crate::error::PileError;
use pile_common::{format_duration, Config};
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuring,
    Listening,
    Piling,
    Holding,
    Terminating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configuring => "configuring",
            Phase::Listening => "listening",
            Phase::Piling => "piling",
            Phase::Holding => "holding",
            Phase::Terminating => "terminating",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: PileReport,
    /// Connections the local listener accepted, if one was bound.
    pub accepted: Option<usize>,
    /// Endpoint the workers dialed.
    pub target: Endpoint,
    pub held_for: Duration,
}

fn enter(phase: Phase) {
    debug!(phase = %phase, "Entering phase");
}

/// Block until the gate yields one byte or reaches EOF.
pub async fn wait_for_gate<R>(gate: &mut R) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut one = [0u8; 1];
    gate.read(&mut one).await.map(|_| ())
}

/// Execute one complete run.
///
/// `gate` is only read when `config.gate` is set. A bind failure is returned
/// before any worker is spawned; every other failure is absorbed into the
/// pile report.
pub async fn run<R>(config: &Config, mut gate: R) -> Result<RunSummary, PileError>
where
    R: AsyncRead + Unpin,
{
    enter(Phase::Configuring);
    config.validate()?;

    if config.gate {
        info!("Waiting for input before listening");
        wait_for_gate(&mut gate).await.map_err(PileError::Gate)?;
    }

    enter(Phase::Listening);
    let acceptor = if config.listen {
        Some(Acceptor::start(config).await?)
    } else {
        info!("Listener disabled, piling against an external endpoint");
        None
    };
    let target = match &acceptor {
        Some(acceptor) => dial_target(acceptor.local_endpoint()),
        None => resolve_dial(config.transport, &config.address).await?,
    };

    enter(Phase::Piling);
    let report = pile_up(config, &target).await;
    info!(
        connected = report.connected,
        failed = report.failed,
        target = %target,
        "piled up {} clients",
        config.workers
    );

    enter(Phase::Holding);
    info!("wait for {}", format_duration(config.duration));
    let started = Instant::now();
    tokio::time::sleep(config.duration).await;
    let held_for = started.elapsed();

    enter(Phase::Terminating);
    let accepted = acceptor.as_ref().map(Acceptor::accepted);
    if let Some(acceptor) = acceptor {
        acceptor.shutdown().await;
    }
    info!("done.");

    Ok(RunSummary {
        report,
        accepted,
        target,
        held_for,
    })
}
