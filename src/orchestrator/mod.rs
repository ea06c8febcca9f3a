//! Phased scan orchestration: connect, discover, settle, attack, collect
//!
//! The controller walks a fixed state machine and always hands back a
//! well-formed [`ScanResult`]. Phase failures degrade the run to a partial
//! result whenever some output can still be collected; only a missing
//! session, an active scan that never started, or failed alert retrieval
//! end the run in [`RunState::Failed`].

pub mod cancel;
pub mod negotiator;
pub mod poller;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use negotiator::{AuthStrategy, ConnectionNegotiator, Connector, Session, ZapConnector};
pub use poller::{AdaptivePoller, PhaseRun, PollPolicy, PollReport};

use crate::engine::EngineSetting;
use crate::models::{PhaseKind, PollOutcome, RunState, ScanResult};
use crate::triage::aggregate;
use std::time::Duration;
use tracing::{error, info, warn};

/// Engine tuning applied before discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTuning {
    pub max_depth: u32,
    pub thread_count: u32,
    pub delay_ms: u32,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            max_depth: 5,
            thread_count: 5,
            delay_ms: 0,
        }
    }
}

impl EngineTuning {
    /// Named, independent settings, applied in order
    pub fn settings(&self) -> Vec<(&'static str, EngineSetting)> {
        vec![
            ("spider depth", EngineSetting::SpiderMaxDepth(self.max_depth)),
            (
                "spider concurrency",
                EngineSetting::SpiderThreadCount(self.thread_count),
            ),
            (
                "active scan concurrency",
                EngineSetting::ActiveScanThreadsPerHost(self.thread_count),
            ),
            (
                "active scan delay",
                EngineSetting::ActiveScanDelayMs(self.delay_ms),
            ),
        ]
    }
}

/// Timing for every phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseConfig {
    pub discovery: PollPolicy,
    pub passive_settle: Duration,
    pub active: PollPolicy,
    pub tuning: EngineTuning,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            discovery: PollPolicy::new(Duration::from_secs(10), 12, Duration::from_secs(600)),
            passive_settle: Duration::from_secs(10),
            active: PollPolicy::new(Duration::from_secs(10), 180, Duration::from_secs(3600)),
            tuning: EngineTuning::default(),
        }
    }
}

/// Engine-side phase ids started during a run and whether they finished
#[derive(Debug, Default)]
struct RunScope {
    discovery: Option<(String, bool)>,
    active: Option<(String, bool)>,
}

impl RunScope {
    fn mark_finished(&mut self, phase: PhaseKind, finished: bool) {
        let slot = match phase {
            PhaseKind::Discovery => &mut self.discovery,
            PhaseKind::ActiveProbing => &mut self.active,
        };
        if let Some((_, done)) = slot.as_mut() {
            *done = finished;
        }
    }

    /// Stops every phase the engine may still be running
    async fn release(self, session: &Session) {
        if let Some((id, false)) = self.discovery {
            match session.engine().stop_discovery(&id).await {
                Ok(()) => info!("[cleanup] stopped discovery {id}"),
                Err(e) => warn!("[cleanup] could not stop discovery {id}: {e}"),
            }
        }
        if let Some((id, false)) = self.active {
            match session.engine().stop_active_scan(&id).await {
                Ok(()) => info!("[cleanup] stopped active scan {id}"),
                Err(e) => warn!("[cleanup] could not stop active scan {id}: {e}"),
            }
        }
    }
}

/// Drives one scan run through the phase state machine
pub struct ScanPhaseController<C> {
    negotiator: ConnectionNegotiator<C>,
    config: PhaseConfig,
}

impl<C: Connector> ScanPhaseController<C> {
    pub fn new(negotiator: ConnectionNegotiator<C>, config: PhaseConfig) -> Self {
        Self { negotiator, config }
    }

    /// Runs every phase against `target`. Never fails; errors land in
    /// `ScanResult::error`.
    pub async fn run(&self, target: &str, cancel: &CancelSignal) -> ScanResult {
        let mut result = ScanResult::new(target);
        info!("Starting scan run {} for {target}", result.scan_id);
        transition(&mut result, RunState::Connecting);

        let session = match self.negotiator.negotiate().await {
            Ok(session) => session,
            Err(e) => {
                fail(&mut result, e.to_string());
                result.finish();
                return result;
            }
        };
        result.engine_version = Some(session.version().to_string());

        let mut scope = RunScope::default();
        self.drive(&session, target, cancel, &mut scope, &mut result)
            .await;
        scope.release(&session).await;

        result.engine_requests = session.engine().request_count();
        result.finish();
        info!(
            "Scan run {} ended {} with {} findings",
            result.scan_id,
            result.state,
            result.findings.len()
        );
        result
    }

    async fn drive(
        &self,
        session: &Session,
        target: &str,
        cancel: &CancelSignal,
        scope: &mut RunScope,
        result: &mut ScanResult,
    ) {
        let engine = session.engine();

        transition(result, RunState::Discovering);
        self.apply_tuning(session).await;

        let discovery_id = match engine.start_discovery(target).await {
            Ok(id) => id,
            Err(e) => return fail(result, format!("discovery failed to start: {e}")),
        };
        scope.discovery = Some((discovery_id.clone(), false));

        let id = discovery_id.as_str();
        let discovery = AdaptivePoller::new(self.config.discovery)
            .poll(PhaseKind::Discovery, cancel, move || engine.discovery_progress(id))
            .await;
        scope.mark_finished(PhaseKind::Discovery, discovery.outcome == PollOutcome::Completed);
        result.phases.push(discovery.to_phase_report());

        match discovery.outcome {
            PollOutcome::Cancelled => return cancelled(result, RunState::Discovering),
            PollOutcome::SampleError if discovery.last_progress.is_none() => {
                let detail = discovery.error.as_deref().unwrap_or("no status reported");
                return fail(result, format!("discovery status unavailable: {detail}"));
            }
            _ => {}
        }

        transition(result, RunState::PassiveSettling);
        if !cancel.sleep(self.config.passive_settle).await {
            return cancelled(result, RunState::PassiveSettling);
        }

        transition(result, RunState::ActiveProbing);
        let active_id = match engine.start_active_scan(target).await {
            Ok(id) => id,
            Err(e) => return fail(result, format!("active scan failed to start: {e}")),
        };
        scope.active = Some((active_id.clone(), false));

        let id = active_id.as_str();
        let active = AdaptivePoller::new(self.config.active)
            .poll(PhaseKind::ActiveProbing, cancel, move || engine.active_scan_progress(id))
            .await;
        scope.mark_finished(PhaseKind::ActiveProbing, active.outcome == PollOutcome::Completed);
        result.phases.push(active.to_phase_report());

        if active.outcome == PollOutcome::Cancelled {
            return cancelled(result, RunState::ActiveProbing);
        }

        transition(result, RunState::Collecting);
        let alerts = match engine.alerts(target).await {
            Ok(alerts) => alerts,
            Err(e) => return fail(result, format!("alert retrieval failed: {e}")),
        };

        let aggregated = aggregate(&alerts);
        result.findings = aggregated.findings;
        result.summary = aggregated.summary;
        for note in result
            .phases
            .iter()
            .filter_map(|p| p.shortfall_note())
            .collect::<Vec<_>>()
        {
            result.summary.push_phase_note(note);
        }

        let complete = result.phases.iter().all(|p| p.completed());
        transition(
            result,
            if complete {
                RunState::Done
            } else {
                RunState::PartialDone
            },
        );
    }

    async fn apply_tuning(&self, session: &Session) {
        for (name, setting) in self.config.tuning.settings() {
            match session.engine().apply_setting(setting).await {
                Ok(()) => info!("[config] {setting}"),
                Err(e) => warn!("[config] could not apply {name}: {e}"),
            }
        }
    }
}

fn transition(result: &mut ScanResult, next: RunState) {
    info!("[state] {} -> {next}", result.state);
    result.state = next;
}

/// Ends the run in `Failed` with an empty but well-formed result
fn fail(result: &mut ScanResult, reason: String) {
    error!("[{}] {reason}", result.state);
    result.findings.clear();
    result.summary = Default::default();
    let notes: Vec<String> = result.phases.iter().map(|p| p.progress_note()).collect();
    for note in notes {
        result.summary.push_phase_note(note);
    }
    result.error = Some(reason);
    transition(result, RunState::Failed);
}

fn cancelled(result: &mut ScanResult, during: RunState) {
    fail(result, format!("scan cancelled during {during}"));
}
