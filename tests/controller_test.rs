//! Integration tests for the scan phase controller

mod common;

use common::*;
use scanwarden::models::{PhaseKind, PollOutcome, RunState, Severity};
use scanwarden::orchestrator::{cancel_pair, AuthStrategy, CancelSignal};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_complete_run_is_done() {
    let connector = ScriptedConnector::new(Script::completing(vec![
        alert("SQL Injection", "High"),
        alert("CSRF", "Medium"),
        alert("Missing CSP", "Medium"),
        alert("Cookie flags", "Low"),
    ]));

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::Done);
    assert!(result.error.is_none());
    assert_eq!(result.engine_version.as_deref(), Some(ENGINE_VERSION));
    assert_eq!(result.findings.len(), 4);
    assert_eq!(result.summary.count(Severity::High), 1);
    assert_eq!(result.summary.count(Severity::Medium), 2);
    assert_eq!(result.summary.count(Severity::Low), 1);
    assert_eq!(result.summary.total(), 4);
    assert!(result.summary.phase_notes().is_empty());
    assert!(result.summary.note().is_none());
    assert_eq!(result.phases.len(), 2);
    assert!(result.phases.iter().all(|p| p.completed()));
    assert!(result.finished_at.is_some());
    assert!(result.engine_requests > 0);
}

#[tokio::test(start_paused = true)]
async fn test_negotiation_failure_yields_empty_failed_result() {
    let connector = ScriptedConnector {
        unreachable: true,
        ..ScriptedConnector::default()
    };
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::Failed);
    let error = result.error.expect("failed run carries an error");
    assert!(error.contains("2 attempt(s)"), "unexpected error: {error}");
    assert!(error.contains("connection refused"));
    assert!(result.findings.is_empty());
    assert_eq!(result.summary.total(), 0);
    assert!(result.phases.is_empty());
    assert!(result.engine_version.is_none());
    assert_eq!(calls.lock().unwrap().strategies.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_falls_back_to_anonymous_session() {
    let connector = ScriptedConnector {
        reject_keyed: true,
        ..ScriptedConnector::new(Script::completing(vec![alert("XSS", "High")]))
    };
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::Done);
    let strategies = calls.lock().unwrap().strategies.clone();
    assert!(matches!(strategies[0], AuthStrategy::ApiKey { .. }));
    assert_eq!(strategies[1], AuthStrategy::Anonymous);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_discovery_degrades_to_partial() {
    let script = Script {
        discovery: vec![10, 40],
        active: vec![50, 100],
        alerts: vec![alert("XSS", "High"), alert("Banner", "Informational")],
        ..Script::default()
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::PartialDone);
    assert!(result.error.is_none());
    assert_eq!(result.findings.len(), 2);
    assert_eq!(result.summary.total(), 2);

    let discovery = result.phase(PhaseKind::Discovery).unwrap();
    assert_eq!(discovery.outcome, PollOutcome::Stalled);
    assert_eq!(discovery.progress, 40);
    assert_eq!(discovery.samples, 13);

    let notes = result.summary.phase_notes();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].contains("discovery"));
    assert!(notes[0].contains("40%"));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.stopped_discovery, vec![DISCOVERY_ID.to_string()]);
    assert!(calls.stopped_active.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_active_timeout_degrades_to_partial_and_stops_scan() {
    let script = Script {
        discovery: vec![100],
        active: (1..=99).collect(),
        alerts: vec![alert("XSS", "High")],
        ..Script::default()
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::PartialDone);
    let active = result.phase(PhaseKind::ActiveProbing).unwrap();
    assert_eq!(active.outcome, PollOutcome::TimedOut);
    assert!(active.elapsed_secs >= 300);
    assert!(result.summary.phase_notes()[0].contains("timed out"));

    let calls = calls.lock().unwrap();
    assert!(calls.stopped_discovery.is_empty());
    assert_eq!(calls.stopped_active, vec![ACTIVE_ID.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_discovery_status_unavailable_fails_run() {
    let script = Script {
        fail_discovery_status: true,
        ..Script::completing(vec![alert("XSS", "High")])
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::Failed);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .starts_with("discovery status unavailable"));
    assert_eq!(
        result.phase(PhaseKind::Discovery).unwrap().outcome,
        PollOutcome::SampleError
    );
    assert!(result.phase(PhaseKind::ActiveProbing).is_none());
    assert_eq!(
        calls.lock().unwrap().stopped_discovery,
        vec![DISCOVERY_ID.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_discovery_status_lost_mid_poll_degrades_to_partial() {
    let script = Script {
        discovery: vec![10, 20, 30],
        discovery_fail_after: Some(3),
        ..Script::completing(vec![alert("XSS", "High"), alert("CSRF", "Medium")])
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::PartialDone);
    assert!(result.error.is_none());
    assert_eq!(result.findings.len(), 2);
    assert_eq!(result.summary.total(), 2);

    let discovery = result.phase(PhaseKind::Discovery).unwrap();
    assert_eq!(discovery.outcome, PollOutcome::SampleError);
    assert_eq!(discovery.progress, 30);
    assert!(discovery.error.as_deref().unwrap().contains("spider status refused"));
    assert!(result.phase(PhaseKind::ActiveProbing).unwrap().completed());

    let notes = result.summary.phase_notes();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].starts_with("discovery did not complete (status unavailable at 30%"));
    assert_eq!(
        calls.lock().unwrap().stopped_discovery,
        vec![DISCOVERY_ID.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_active_status_lost_mid_poll_degrades_to_partial() {
    let script = Script {
        discovery: vec![10, 20, 30],
        discovery_fail_after: Some(3),
        active: vec![20, 40, 55],
        active_fail_after: Some(3),
        ..Script::completing(vec![alert("XSS", "High")])
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::PartialDone);
    assert!(result.error.is_none());
    assert_eq!(result.findings.len(), 1);

    let active = result.phase(PhaseKind::ActiveProbing).unwrap();
    assert_eq!(active.outcome, PollOutcome::SampleError);
    assert_eq!(active.progress, 55);
    assert_eq!(active.samples, 3);

    let notes = result.summary.phase_notes();
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n.contains("status unavailable")));
    assert!(notes[1].starts_with("active probing did not complete (status unavailable at 55%"));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.stopped_discovery, vec![DISCOVERY_ID.to_string()]);
    assert_eq!(calls.stopped_active, vec![ACTIVE_ID.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_discovery_start_failure_fails_run() {
    let script = Script {
        fail_discovery_start: true,
        ..Script::completing(Vec::new())
    };

    let result = controller(ScriptedConnector::new(script))
        .run("http://target.test", &CancelSignal::never())
        .await;

    assert_eq!(result.state, RunState::Failed);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("discovery failed to start"));
    assert!(result.phases.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_active_start_failure_fails_run() {
    let script = Script {
        fail_active_start: true,
        ..Script::completing(vec![alert("XSS", "High")])
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::Failed);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("active scan failed to start"));
    assert!(result.findings.is_empty());
    assert_eq!(result.summary.total(), 0);
    assert_eq!(
        result.summary.phase_notes(),
        &["discovery completed (100% after 10s)".to_string()]
    );

    let calls = calls.lock().unwrap();
    assert!(calls.stopped_discovery.is_empty());
    assert!(calls.stopped_active.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_alert_retrieval_failure_keeps_discovery_progress() {
    let script = Script {
        discovery: vec![10, 40],
        fail_alerts: true,
        ..Script::completing(vec![alert("XSS", "High")])
    };

    let result = controller(ScriptedConnector::new(script))
        .run("http://target.test", &CancelSignal::never())
        .await;

    assert_eq!(result.state, RunState::Failed);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("alert retrieval failed"));
    assert!(result.findings.is_empty());
    assert_eq!(result.summary.total(), 0);

    let notes = result.summary.phase_notes();
    assert_eq!(notes.len(), 2);
    assert!(notes[0].contains("40%"));
    assert!(notes[1].contains("active probing completed"));
}

#[tokio::test(start_paused = true)]
async fn test_tuning_failures_are_not_fatal() {
    let script = Script {
        fail_settings: true,
        ..Script::completing(vec![alert("XSS", "High")])
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();

    let result = controller(connector).run("http://target.test", &CancelSignal::never()).await;

    assert_eq!(result.state, RunState::Done);
    assert_eq!(calls.lock().unwrap().settings.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_settle_fails_run() {
    let connector = ScriptedConnector::new(Script::completing(vec![alert("XSS", "High")]));
    let calls = connector.calls.clone();
    let controller = controller(connector);
    let (handle, signal) = cancel_pair();

    let (result, _) = tokio::join!(controller.run("http://target.test", &signal), async move {
        // discovery completes at 10s, settle runs until 20s
        tokio::time::sleep(Duration::from_secs(15)).await;
        handle.cancel();
    });

    assert_eq!(result.state, RunState::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("scan cancelled during passive settling")
    );
    assert!(result.phase(PhaseKind::ActiveProbing).is_none());
    assert_eq!(calls.lock().unwrap().active_samples, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_running_discovery() {
    let script = Script {
        discovery: vec![10, 20, 30, 40, 50, 60, 70],
        ..Script::completing(vec![alert("XSS", "High")])
    };
    let connector = ScriptedConnector::new(script);
    let calls = connector.calls.clone();
    let signal =
        CancelSignal::never().with_deadline(tokio::time::Instant::now() + Duration::from_secs(35));

    let result = controller(connector).run("http://target.test", &signal).await;

    assert_eq!(result.state, RunState::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("scan cancelled during discovering")
    );
    let discovery = result.phase(PhaseKind::Discovery).unwrap();
    assert_eq!(discovery.outcome, PollOutcome::Cancelled);
    assert_eq!(discovery.progress, 40);
    assert!(result.summary.phase_notes()[0].contains("40%"));
    assert_eq!(
        calls.lock().unwrap().stopped_discovery,
        vec![DISCOVERY_ID.to_string()]
    );
}
