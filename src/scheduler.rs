//! Task scheduler (C5, §4.6). Runs a materialized [`Chain`] through
//! `Idle -> Activating -> Running -> Stopping -> Done/Failed/Cancelled`,
//! on a single cooperative thread, pumping a 500ms tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::errors::SchedulerError;
use crate::plugin::{AdmissionResult, StageContext, StopOutcome};
use crate::planner::{Chain, Stage};

const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Whether stages perform real side-effects or a dry run (§4.6's two modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Check,
    Run,
}

/// Final status of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Done,
    Failed,
    Cancelled,
    Dangerous,
    /// Every stage declined via `NotSupported`; only reachable in
    /// [`RunMode::Check`] where that degrades to a default size estimate.
    NotRunning,
}

/// Internal result of one activation-through-stop attempt: either the chain
/// restarts from the first stage (a stage requested `Retry`), or the run is
/// over.
#[derive(Debug)]
enum AttemptOutcome {
    Restart,
    Final(RunStatus),
}

/// A suspension point the run loop blocks on between ticks. Implementations
/// trade production fidelity (`WallClockTicker`) for test determinism
/// (`ImmediateTicker`), per the timer abstraction called for in §9/§10.4.
pub trait Ticker: std::fmt::Debug {
    /// Blocks until a tick is due or a stop signal arrives; returns `false`
    /// in the latter case.
    fn wait(&self) -> bool;
}

/// Production ticker: blocks on a channel with a 500ms timeout, so an
/// external `cancel()` wakes the scheduler immediately instead of waiting
/// out the tick.
#[derive(Debug)]
pub struct WallClockTicker {
    stop_rx: Receiver<()>,
}

impl WallClockTicker {
    pub fn new(stop_rx: Receiver<()>) -> Self {
        WallClockTicker { stop_rx }
    }
}

impl Ticker for WallClockTicker {
    fn wait(&self) -> bool {
        match self.stop_rx.recv_timeout(TICK_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => true,
            _ => false,
        }
    }
}

/// Test-only ticker that fires instantly, so scheduler tests never sleep in
/// wall time.
#[derive(Debug)]
pub struct ImmediateTicker {
    stop: Arc<AtomicBool>,
}

impl ImmediateTicker {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        ImmediateTicker { stop }
    }
}

impl Ticker for ImmediateTicker {
    fn wait(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerKind {
    WallClock,
    Immediate,
}

/// Drives one [`Chain`] to completion. Owned exclusively by the thread that
/// calls [`Scheduler::run`]; not `Sync`.
pub struct Scheduler {
    chain: Chain,
    mode: RunMode,
    protect_dangerous: bool,
    cancel: Arc<AtomicBool>,
    dangerous: bool,
    progress_bar: Option<ProgressBar>,
    ticker_kind: TickerKind,
}

impl Scheduler {
    pub fn new(chain: Chain, mode: RunMode) -> Self {
        Scheduler {
            chain,
            mode,
            protect_dangerous: true,
            cancel: Arc::new(AtomicBool::new(false)),
            dangerous: false,
            progress_bar: None,
            ticker_kind: TickerKind::WallClock,
        }
    }

    pub fn with_dangerous(mut self, dangerous: bool) -> Self {
        self.dangerous = dangerous;
        self
    }

    /// Swaps in [`ImmediateTicker`] so a run never blocks on wall-clock time.
    /// Meant for tests; production callers get [`WallClockTicker`] by default.
    pub fn with_immediate_ticker(mut self) -> Self {
        self.ticker_kind = TickerKind::Immediate;
        self
    }

    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {percent}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        self.progress_bar = Some(bar);
        self
    }

    /// Handle external callers can use to request cancellation (§5:
    /// cooperative, deadline-free).
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn run(mut self) -> Result<RunStatus, SchedulerError> {
        loop {
            match self.run_once()? {
                AttemptOutcome::Restart => continue,
                AttemptOutcome::Final(status) => return Ok(status),
            }
        }
    }

    fn run_once(&mut self) -> Result<AttemptOutcome, SchedulerError> {
        let mut active = vec![true; self.chain.stages.len()];
        let mut contexts: Vec<StageContext> = self
            .chain
            .stages
            .iter()
            .map(|_| StageContext {
                check_mode: self.mode == RunMode::Check,
                ..Default::default()
            })
            .collect();

        let activated = match self.activate(&mut active, &mut contexts) {
            Ok(activated) => activated,
            Err(err) => {
                self.stop(&active, &mut contexts);
                return Err(err);
            }
        };
        if !activated {
            info!("no stage activated, nothing to do");
            return Ok(AttemptOutcome::Final(RunStatus::Done));
        }

        match self.start(&mut active, &mut contexts) {
            Ok(Some(status)) => {
                self.stop(&active, &mut contexts);
                return Ok(AttemptOutcome::Final(status));
            }
            Ok(None) => {}
            Err(err) => {
                self.stop(&active, &mut contexts);
                return Err(err);
            }
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let ticker: Box<dyn Ticker> = match self.ticker_kind {
            TickerKind::WallClock => Box::new(WallClockTicker::new(stop_rx)),
            TickerKind::Immediate => Box::new(ImmediateTicker::new(self.cancel.clone())),
        };

        let outcome = loop {
            if self.cancel.load(Ordering::SeqCst) {
                if self.dangerous && self.protect_dangerous {
                    warn!("cancel refused: run touches a dangerous medium");
                    let media = self
                        .chain
                        .stages
                        .last()
                        .and_then(|s| s.output_type)
                        .and_then(|t| t.media())
                        .unwrap_or_default();
                    self.stop(&active, &mut contexts);
                    return Err(SchedulerError::Dangerous { media });
                }
                info!("run cancelled");
                break AttemptOutcome::Final(RunStatus::Cancelled);
            }

            if !ticker.wait() {
                break AttemptOutcome::Final(RunStatus::Cancelled);
            }

            for (stage, (is_active, ctx)) in self
                .chain
                .stages
                .iter()
                .zip(active.iter().zip(contexts.iter_mut()))
            {
                if *is_active {
                    stage.plugin.clock_tick(ctx);
                }
            }

            if contexts.iter().zip(active.iter()).any(|(c, a)| *a && c.retry_requested) {
                info!("stage requested retry, restarting chain from the first stage");
                break AttemptOutcome::Restart;
            }

            let total: f64 = contexts
                .iter()
                .zip(active.iter())
                .filter(|(_, a)| **a)
                .map(|(c, _)| c.progress)
                .sum();
            let count = active.iter().filter(|a| **a).count().max(1);
            let aggregate = total / count as f64;

            if let Some(bar) = &self.progress_bar {
                bar.set_position((aggregate * 100.0) as u64);
            }

            if aggregate >= 1.0 {
                info!("run complete");
                break AttemptOutcome::Final(RunStatus::Done);
            }
        };

        drop(stop_tx);
        self.stop(&active, &mut contexts);
        if matches!(outcome, AttemptOutcome::Final(_)) {
            if let Some(bar) = &self.progress_bar {
                bar.finish();
            }
        }
        Ok(outcome)
    }

    fn activate(
        &self,
        active: &mut [bool],
        contexts: &mut [StageContext],
    ) -> Result<bool, SchedulerError> {
        let mut any_active = false;
        for (i, stage) in self.chain.stages.iter().enumerate() {
            match stage.plugin.activate(&mut contexts[i]) {
                AdmissionResult::Ok => {
                    active[i] = true;
                    any_active = true;
                }
                AdmissionResult::NotRunning | AdmissionResult::NotSupported => {
                    active[i] = false;
                }
                AdmissionResult::Err(message) => {
                    return Err(SchedulerError::StageError {
                        plugin: stage.plugin_name().to_string(),
                        message,
                    });
                }
            }
        }
        Ok(any_active)
    }

    fn start(
        &self,
        active: &mut [bool],
        contexts: &mut [StageContext],
    ) -> Result<Option<RunStatus>, SchedulerError> {
        let mut declines = 0usize;
        let considered = active.iter().filter(|a| **a).count();

        for i in (0..self.chain.stages.len()).rev() {
            if !active[i] {
                continue;
            }
            let stage = &self.chain.stages[i];
            match stage.plugin.start(&mut contexts[i]) {
                AdmissionResult::Ok => {}
                AdmissionResult::NotRunning => active[i] = false,
                AdmissionResult::NotSupported => declines += 1,
                AdmissionResult::Err(message) => {
                    return Err(SchedulerError::StageError {
                        plugin: stage.plugin_name().to_string(),
                        message,
                    });
                }
            }
        }

        if considered > 0 && declines == considered {
            return Ok(Some(if self.mode == RunMode::Check {
                RunStatus::NotRunning
            } else {
                RunStatus::Failed
            }));
        }

        Ok(None)
    }

    /// Walks stages input->output calling `stop` on every activated one,
    /// exactly once. Best-effort: the first error is preserved, later ones
    /// are only logged (§4.6, §5 guarantee 3).
    fn stop(&self, active: &[bool], contexts: &mut [StageContext]) -> Option<String> {
        let mut first_error = None;
        for (i, stage) in self.chain.stages.iter().enumerate() {
            if !active[i] {
                continue;
            }
            if let StopOutcome::Err(message) = stage.plugin.stop(&mut contexts[i]) {
                warn!(plugin = stage.plugin_name(), %message, "stop failed");
                first_error.get_or_insert(message);
            }
        }
        first_error
    }
}
