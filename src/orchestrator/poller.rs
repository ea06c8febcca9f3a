//! Adaptive progress polling with completion, stagnation and timeout exits

use crate::error::Result;
use crate::models::{PhaseKind, PhaseReport, PollOutcome};
use crate::orchestrator::cancel::CancelSignal;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Timing policy for one polled phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between samples
    pub interval: Duration,
    /// Consecutive identical readings that count as stalled
    pub stagnation_threshold: u32,
    /// Total time allowed for the phase
    pub budget: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, stagnation_threshold: u32, budget: Duration) -> Self {
        Self {
            interval,
            stagnation_threshold,
            budget,
        }
    }
}

/// Live state of one polling cycle
#[derive(Debug)]
pub struct PhaseRun {
    pub phase: PhaseKind,
    pub started_at: Instant,
    pub last_progress: Option<u8>,
    /// Length of the current run of identical readings
    pub stagnant: u32,
    pub samples: u32,
}

impl PhaseRun {
    fn new(phase: PhaseKind) -> Self {
        Self {
            phase,
            started_at: Instant::now(),
            last_progress: None,
            stagnant: 0,
            samples: 0,
        }
    }

    fn observe(&mut self, progress: u8) {
        self.samples += 1;
        if self.last_progress == Some(progress) {
            self.stagnant += 1;
        } else {
            self.stagnant = 1;
        }
        self.last_progress = Some(progress);
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn finish(self, outcome: PollOutcome, error: Option<String>) -> PollReport {
        PollReport {
            phase: self.phase,
            outcome,
            last_progress: self.last_progress,
            samples: self.samples,
            elapsed: self.elapsed(),
            error,
        }
    }
}

/// How a polling cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub phase: PhaseKind,
    pub outcome: PollOutcome,
    /// `None` when no sample ever succeeded
    pub last_progress: Option<u8>,
    pub samples: u32,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl PollReport {
    pub fn progress(&self) -> u8 {
        self.last_progress.unwrap_or(0)
    }

    /// Folds this cycle into the form kept on the scan result
    pub fn to_phase_report(&self) -> PhaseReport {
        PhaseReport {
            phase: self.phase,
            outcome: self.outcome,
            progress: self.progress(),
            samples: self.samples,
            elapsed_secs: self.elapsed.as_secs(),
            error: self.error.clone(),
        }
    }
}

/// Samples a progress value until it completes, stalls or runs out of time.
///
/// A failed sample ends the cycle; it is never retried here.
#[derive(Debug, Clone, Copy)]
pub struct AdaptivePoller {
    policy: PollPolicy,
}

impl AdaptivePoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub async fn poll<F, Fut>(
        &self,
        phase: PhaseKind,
        cancel: &CancelSignal,
        mut sample: F,
    ) -> PollReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<u8>>,
    {
        let mut run = PhaseRun::new(phase);

        let report = loop {
            if cancel.is_cancelled() {
                break run.finish(PollOutcome::Cancelled, None);
            }

            let progress = match sample().await {
                Ok(p) => p.min(100),
                Err(e) => {
                    warn!("[{phase}] status check failed: {e}");
                    break run.finish(PollOutcome::SampleError, Some(e.to_string()));
                }
            };
            run.observe(progress);
            debug!(
                "[{phase}] progress {progress}% (sample {}, {}s elapsed)",
                run.samples,
                run.elapsed().as_secs()
            );

            if progress >= 100 {
                break run.finish(PollOutcome::Completed, None);
            }
            if run.stagnant >= self.policy.stagnation_threshold {
                break run.finish(PollOutcome::Stalled, None);
            }

            let elapsed = run.elapsed();
            if elapsed >= self.policy.budget {
                break run.finish(PollOutcome::TimedOut, None);
            }

            let wait = self.policy.interval.min(self.policy.budget - elapsed);
            if !cancel.sleep(wait).await {
                break run.finish(PollOutcome::Cancelled, None);
            }
        };

        info!(
            "[{phase}] {} at {}% after {}s ({} samples)",
            report.outcome,
            report.progress(),
            report.elapsed.as_secs(),
            report.samples
        );
        report
    }
}
