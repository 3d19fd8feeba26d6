use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use pboss_client::{endpoint, MockBackend, MockReply};
use pboss_core::{format_duration, goal_label, Phase, Totals};
use pboss_notify::{CollectNotifier, NotifyEvent, Permission};
use pboss_secret::{CredentialStore, MemoryStore};
use pboss_session::{
    spawn, Command, FailureKind, SessionClient, SessionError, SessionSettings, Update,
};

struct Harness {
    backend: Arc<MockBackend>,
    notifier: Arc<CollectNotifier>,
    secrets: Arc<MemoryStore>,
    client: SessionClient,
    updates: mpsc::UnboundedReceiver<Update>,
}

impl Harness {
    fn new() -> Self {
        Self::with(MockBackend::new(), Permission::Granted)
    }

    fn with(backend: MockBackend, permission: Permission) -> Self {
        let backend = Arc::new(backend);
        let notifier = Arc::new(CollectNotifier::new(permission));
        let secrets = Arc::new(MemoryStore::new());
        let (tx, updates) = mpsc::unbounded_channel();
        let client = SessionClient::new(
            backend.clone(),
            secrets.clone(),
            notifier.clone(),
            SessionSettings::default(),
            tx,
        );
        Self {
            backend,
            notifier,
            secrets,
            client,
            updates,
        }
    }

    async fn ready() -> Self {
        let mut h = Self::new();
        h.client.initialize().await.unwrap();
        h.drain();
        h
    }

    fn drain(&mut self) -> Vec<Update> {
        let mut out = Vec::new();
        while let Ok(u) = self.updates.try_recv() {
            out.push(u);
        }
        out
    }
}

fn status(work: u64, distraction: u64, idle: u64, message: &str) -> MockReply {
    MockReply::Json(json!({
        "work_time": work,
        "distraction_time": distraction,
        "idle_time": idle,
        "message": message,
    }))
}

// ── Initialize ──

#[tokio::test]
async fn coach_persona_with_consent_hides_prompt() {
    let mut h = Harness::new();
    h.client.initialize().await.unwrap();

    let updates = h.drain();
    let [Update::Ready {
        personas,
        preselected,
        consent_required,
        api_key_present,
    }] = updates.as_slice()
    else {
        panic!("unexpected updates: {updates:?}");
    };
    assert_eq!(personas.len(), 1);
    assert_eq!(personas[0].id, "p1");
    assert_eq!(personas[0].name, "Coach");
    assert!(preselected.is_none());
    assert!(!consent_required);
    assert!(!api_key_present);
    assert!(h.client.personas().contains("p1"));
    assert_eq!(h.client.phase(), Phase::Setup);
}

#[tokio::test(start_paused = true)]
async fn persona_fetch_is_retried_once_after_a_second() {
    let backend = MockBackend::new();
    backend.script(endpoint::PERSONAS, vec![MockReply::Unreachable]);
    let mut h = Harness::with(backend, Permission::Granted);

    let t0 = tokio::time::Instant::now();
    h.client.initialize().await.unwrap();
    assert!(t0.elapsed() >= Duration::from_millis(1000));
    assert_eq!(h.backend.call_count(endpoint::PERSONAS), 2);
    assert!(h.client.personas().contains("p1"));
}

#[tokio::test(start_paused = true)]
async fn second_persona_failure_is_fatal_and_final() {
    let backend = MockBackend::new();
    backend.script(
        endpoint::PERSONAS,
        vec![MockReply::Unreachable, MockReply::Status(500, String::new())],
    );
    let mut h = Harness::with(backend, Permission::Granted);

    let err = h.client.initialize().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::StartupConnectivity);
    assert_eq!(
        err.to_string(),
        "Could not connect to backend. Please ensure the application is running properly."
    );
    assert_eq!(h.backend.call_count(endpoint::PERSONAS), 2);
    assert_eq!(h.backend.call_count(endpoint::PREFS), 0);
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn unreachable_preferences_degrade_to_consent_given() {
    let backend = MockBackend::new();
    backend.script(endpoint::PREFS, vec![MockReply::Unreachable]);
    let mut h = Harness::with(backend, Permission::Granted);

    h.client.initialize().await.unwrap();
    assert!(h.client.consent_given());
    assert!(matches!(
        h.drain().as_slice(),
        [Update::Ready {
            consent_required: false,
            preselected: None,
            ..
        }]
    ));
}

#[tokio::test]
async fn last_persona_is_preselected_only_when_known() {
    let backend = MockBackend::new();
    backend.script(
        endpoint::PREFS,
        vec![MockReply::Json(json!({"consent_given": true, "last_persona": "p1"}))],
    );
    let mut h = Harness::with(backend, Permission::Granted);
    h.client.initialize().await.unwrap();
    assert!(matches!(
        h.drain().as_slice(),
        [Update::Ready { preselected: Some(id), .. }] if id == "p1"
    ));

    let backend = MockBackend::new();
    backend.script(
        endpoint::PREFS,
        vec![MockReply::Json(json!({"consent_given": true, "last_persona": "ghost"}))],
    );
    let mut h = Harness::with(backend, Permission::Granted);
    h.client.initialize().await.unwrap();
    assert!(matches!(
        h.drain().as_slice(),
        [Update::Ready { preselected: None, .. }]
    ));
}

#[tokio::test]
async fn stored_api_key_is_reported_at_startup() {
    let mut h = Harness::new();
    h.secrets.store("sk-test").unwrap();
    h.client.initialize().await.unwrap();
    assert!(matches!(
        h.drain().as_slice(),
        [Update::Ready {
            api_key_present: true,
            ..
        }]
    ));
}

#[tokio::test]
async fn key_presence_from_the_caller_skips_the_store() {
    let h = Harness::new();
    h.secrets.store("sk-test").unwrap();
    let (tx, mut updates) = mpsc::unbounded_channel();
    let mut client = SessionClient::new(
        h.backend.clone(),
        h.secrets.clone(),
        h.notifier.clone(),
        SessionSettings::default(),
        tx,
    )
    .with_api_key_present(false);
    client.initialize().await.unwrap();
    assert!(matches!(
        updates.try_recv(),
        Ok(Update::Ready {
            api_key_present: false,
            ..
        })
    ));
}

// ── Consent ──

#[tokio::test]
async fn pending_consent_blocks_start_until_accepted() {
    let backend = MockBackend::new();
    backend.script(
        endpoint::PREFS,
        vec![MockReply::Json(json!({"consent_given": false}))],
    );
    let mut h = Harness::with(backend, Permission::Granted);
    h.client.initialize().await.unwrap();
    assert!(matches!(
        h.drain().as_slice(),
        [Update::Ready {
            consent_required: true,
            ..
        }]
    ));

    let err = h.client.start("p1", "").await.unwrap_err();
    assert!(matches!(err, SessionError::ConsentPending));
    assert_eq!(h.backend.call_count(endpoint::START_DAY), 0);

    h.client.accept_consent().await.unwrap();
    assert_eq!(h.drain(), vec![Update::ConsentAccepted]);
    h.client.start("p1", "").await.unwrap();
    assert_eq!(h.client.phase(), Phase::Active);
}

#[tokio::test]
async fn failed_consent_is_not_assumed() {
    let backend = MockBackend::new();
    backend.script(
        endpoint::PREFS,
        vec![MockReply::Json(json!({"consent_given": false}))],
    );
    backend.script(
        endpoint::CONSENT,
        vec![MockReply::Status(500, "db locked".into())],
    );
    let mut h = Harness::with(backend, Permission::Granted);
    h.client.initialize().await.unwrap();
    h.drain();

    let err = h.client.accept_consent().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Operation);
    assert!(!h.client.consent_given());
    assert!(h.drain().is_empty());
}

// ── Start ──

#[tokio::test]
async fn empty_persona_is_rejected_without_network() {
    let mut h = Harness::ready().await;
    let before = h.backend.calls().len();

    for selection in ["", "   "] {
        let err = h.client.start(selection, "goal").await.unwrap_err();
        assert!(matches!(err, SessionError::NoPersona));
        assert_eq!(err.kind(), FailureKind::Validation);
        assert_eq!(err.to_string(), "Please select a persona.");
    }
    assert_eq!(h.backend.calls().len(), before);
    assert_eq!(h.client.phase(), Phase::Setup);
    assert!(!h.client.polling());
}

#[tokio::test]
async fn unknown_persona_is_rejected_without_network() {
    let mut h = Harness::ready().await;
    let err = h.client.start("ghost", "").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);
    assert_eq!(h.backend.call_count(endpoint::START_DAY), 0);
}

#[tokio::test]
async fn start_trims_goal_arms_one_timer_and_polls_immediately() {
    let mut h = Harness::ready().await;
    h.client.start("p1", "  ship the report \n").await.unwrap();

    assert_eq!(h.client.phase(), Phase::Active);
    assert!(h.client.polling());
    let sent = h.backend.start_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].goals, "ship the report");
    assert_eq!(sent[0].persona, "p1");
    assert_eq!(h.backend.call_count(endpoint::STATUS), 1);

    let updates = h.drain();
    assert!(matches!(
        &updates[0],
        Update::Started { goal, persona, message: None } if goal == "ship the report" && persona.id == "p1"
    ));
    assert!(matches!(
        &updates[1],
        Update::Status { totals, message: None } if *totals == Totals::default()
    ));
}

#[tokio::test]
async fn empty_goal_displays_as_none_with_zero_counters() {
    let mut h = Harness::ready().await;
    h.client.start("p1", "").await.unwrap();

    let updates = h.drain();
    let Update::Started { goal, .. } = &updates[0] else {
        panic!("expected Started, got {updates:?}");
    };
    assert_eq!(goal_label(goal), "(none)");
    let Update::Status { totals, .. } = &updates[1] else {
        panic!("expected Status, got {updates:?}");
    };
    for secs in [totals.work, totals.distraction, totals.idle] {
        assert_eq!(format_duration(secs), "0m");
    }
}

#[tokio::test]
async fn initial_message_wins_over_persona_greeting() {
    let personas = json!([{"id": "p1", "name": "Coach", "greeting": "Let's get moving."}]);

    let backend = MockBackend::new();
    backend.script(endpoint::PERSONAS, vec![MockReply::Json(personas.clone())]);
    let mut h = Harness::with(backend, Permission::Granted);
    h.client.initialize().await.unwrap();
    h.drain();
    h.client.start("p1", "").await.unwrap();
    assert!(matches!(
        &h.drain()[0],
        Update::Started { message: Some(m), .. } if m == "Let's get moving."
    ));

    let backend = MockBackend::new();
    backend.script(endpoint::PERSONAS, vec![MockReply::Json(personas)]);
    backend.script(
        endpoint::START_DAY,
        vec![MockReply::Json(json!({"initial_message": "Day one. Go."}))],
    );
    let mut h = Harness::with(backend, Permission::Granted);
    h.client.initialize().await.unwrap();
    h.drain();
    h.client.start("p1", "").await.unwrap();
    assert!(matches!(
        &h.drain()[0],
        Update::Started { message: Some(m), .. } if m == "Day one. Go."
    ));
}

#[tokio::test]
async fn rejected_start_stays_in_setup_with_backend_text() {
    let mut h = Harness::ready().await;
    h.backend.script(
        endpoint::START_DAY,
        vec![MockReply::Status(400, r#"{"error":"Day already started"}"#.into())],
    );

    let err = h.client.start("p1", "").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Operation);
    assert_eq!(err.to_string(), "Error starting day: Day already started");
    assert_eq!(h.client.phase(), Phase::Setup);
    assert!(!h.client.polling());
    assert_eq!(h.backend.call_count(endpoint::STATUS), 0);
}

// ── Poll ──

#[tokio::test]
async fn empty_message_keeps_the_last_nudge() {
    let mut h = Harness::ready().await;
    h.backend
        .script(endpoint::STATUS, vec![status(125, 0, 40, "")]);
    h.client.start("p1", "").await.unwrap();

    let updates = h.drain();
    let Update::Status { totals, message } = &updates[1] else {
        panic!("expected Status, got {updates:?}");
    };
    assert!(message.is_none());
    assert_eq!(format_duration(totals.work), "2m");
    assert_eq!(format_duration(totals.idle), "<1m");
    assert!(h.notifier.events().is_empty());
    assert_eq!(h.notifier.times_asked(), 0);
}

#[tokio::test]
async fn long_work_time_formats_with_hours() {
    let mut h = Harness::ready().await;
    h.backend
        .script(endpoint::STATUS, vec![status(7384, 0, 0, "")]);
    h.client.start("p1", "").await.unwrap();
    let updates = h.drain();
    assert!(matches!(
        &updates[1],
        Update::Status { totals, .. } if format_duration(totals.work) == "2h 3m"
    ));
}

#[tokio::test(start_paused = true)]
async fn timer_drives_polls_and_nudges_notify_after_one_permission_prompt() {
    let mut h = Harness::ready().await;
    h.backend.script(
        endpoint::STATUS,
        vec![status(60, 0, 0, "Eyes on the prize."), status(120, 0, 0, "Still here?")],
    );
    h.client.start("p1", "").await.unwrap();

    let t0 = tokio::time::Instant::now();
    let generation = h.client.next_tick().await;
    assert_eq!(t0.elapsed(), Duration::from_secs(60));
    h.client.on_tick(generation).await.unwrap();
    assert_eq!(h.backend.call_count(endpoint::STATUS), 2);

    assert_eq!(h.notifier.times_asked(), 1);
    let events = h.notifier.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[1],
        NotifyEvent::Nudge { persona, message } if persona == "Coach" && message == "Still here?"
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_poll_is_followed_by_at_most_one_catch_up_poll() {
    let mut h = Harness::ready().await;
    h.backend.script(
        endpoint::STATUS,
        vec![
            status(0, 0, 0, ""),
            MockReply::Slow(
                Duration::from_secs(600),
                json!({"work_time": 600, "distraction_time": 0, "idle_time": 0}),
            ),
        ],
    );
    h.client.start("p1", "").await.unwrap();

    let generation = h.client.next_tick().await;
    h.client.on_tick(generation).await.unwrap();
    assert_eq!(h.backend.call_count(endpoint::STATUS), 2);

    // ten periods passed during the slow poll
    let mut back_to_back = 0;
    while let Ok(generation) =
        tokio::time::timeout(Duration::from_millis(1), h.client.next_tick()).await
    {
        h.client.on_tick(generation).await.unwrap();
        back_to_back += 1;
    }
    assert!(back_to_back <= 1, "{back_to_back} polls fired back to back");
    assert!(h.client.polling());
}

#[tokio::test]
async fn denied_permission_still_updates_the_message() {
    let mut h = Harness::with(MockBackend::new(), Permission::Denied);
    h.client.initialize().await.unwrap();
    h.backend
        .script(endpoint::STATUS, vec![status(5, 0, 0, "Back to work!")]);
    h.client.start("p1", "").await.unwrap();

    let updates = h.drain();
    assert!(matches!(
        updates.last(),
        Some(Update::Status { message: Some(m), .. }) if m == "Back to work!"
    ));
    assert!(h.notifier.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn poll_failure_stops_the_timer_for_good() {
    let mut h = Harness::ready().await;
    h.backend
        .script(endpoint::STATUS, vec![MockReply::Unreachable]);

    let err = h.client.start("p1", "").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::ConnectionLost);
    assert_eq!(
        err.to_string(),
        "Lost connection to backend. Please restart the app."
    );
    assert_eq!(h.client.phase(), Phase::Active);
    assert!(!h.client.polling());

    let tick = tokio::time::timeout(Duration::from_secs(600), h.client.next_tick()).await;
    assert!(tick.is_err(), "timer still ticking");
    assert_eq!(h.backend.call_count(endpoint::STATUS), 1);
}

#[tokio::test]
async fn backend_exit_stops_polling() {
    let mut h = Harness::ready().await;
    h.client.start("p1", "").await.unwrap();
    let err = h.client.backend_exited("exit status: 1").unwrap_err();
    assert_eq!(err.kind(), FailureKind::ConnectionLost);
    assert!(!h.client.polling());
    assert_eq!(h.client.phase(), Phase::Active);
}

// ── End ──

#[tokio::test]
async fn end_outside_active_is_a_noop() {
    let mut h = Harness::ready().await;
    h.client.end().await.unwrap();
    assert_eq!(h.backend.call_count(endpoint::END_DAY), 0);
    assert_eq!(h.client.phase(), Phase::Setup);

    h.client.start("p1", "").await.unwrap();
    h.client.end().await.unwrap();
    h.client.end().await.unwrap();
    assert_eq!(h.backend.call_count(endpoint::END_DAY), 1);
    assert_eq!(h.client.phase(), Phase::Reported);
}

#[tokio::test]
async fn end_freezes_goal_and_reports() {
    let mut h = Harness::ready().await;
    h.backend.script(
        endpoint::END_DAY,
        vec![MockReply::Json(json!({
            "work_time": 7384,
            "distraction_time": 300,
            "idle_time": 40,
            "persona_report": "Solid effort."
        }))],
    );
    h.client.start("p1", " deep work ").await.unwrap();
    h.drain();

    h.client.end().await.unwrap();
    assert_eq!(h.client.phase(), Phase::Reported);
    assert!(!h.client.polling());

    let report = h.client.report().cloned().unwrap();
    assert_eq!(report.goal, "deep work");
    assert_eq!(report.persona.id, "p1");
    assert_eq!(report.message, "Solid effort.");
    assert_eq!(format_duration(report.totals.work), "2h 3m");
    assert_eq!(h.drain(), vec![Update::Ended(report.clone())]);

    let events = h.notifier.events();
    assert!(matches!(events.last(), Some(NotifyEvent::DayReport { goal, .. }) if goal == "deep work"));
}

#[tokio::test(start_paused = true)]
async fn failed_end_stays_active_on_a_fresh_timer() {
    let mut h = Harness::ready().await;
    h.backend
        .script(endpoint::END_DAY, vec![MockReply::Status(500, String::new())]);
    h.client.start("p1", "").await.unwrap();

    let err = h.client.end().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::EndFailed);
    assert!(err.to_string().starts_with("Error ending day:"));
    assert_eq!(h.client.phase(), Phase::Active);
    assert!(h.client.polling());
    assert!(h.client.report().is_none());

    // a tick from the first timer is stale
    h.client.on_tick(1).await.unwrap();
    assert_eq!(h.backend.call_count(endpoint::STATUS), 1);

    let generation = h.client.next_tick().await;
    assert_eq!(generation, 2);
    h.client.on_tick(generation).await.unwrap();
    assert_eq!(h.backend.call_count(endpoint::STATUS), 2);

    h.client.end().await.unwrap();
    assert_eq!(h.client.phase(), Phase::Reported);
}

#[tokio::test]
async fn failed_end_after_lost_connection_does_not_resume_polling() {
    let mut h = Harness::ready().await;
    h.backend
        .script(endpoint::STATUS, vec![MockReply::Unreachable]);
    h.backend
        .script(endpoint::END_DAY, vec![MockReply::Unreachable]);
    h.client.start("p1", "").await.unwrap_err();

    h.client.end().await.unwrap_err();
    assert_eq!(h.client.phase(), Phase::Active);
    assert!(!h.client.polling());
}

// ── API key ──

#[tokio::test]
async fn api_key_save_goes_through_the_store() {
    let mut h = Harness::ready().await;
    h.client.save_api_key("").unwrap();
    h.client.save_api_key(" sk-live-123 ").unwrap();
    assert_eq!(
        h.drain(),
        vec![
            Update::ApiKeySaved { stored: false },
            Update::ApiKeySaved { stored: true }
        ]
    );
    assert_eq!(h.secrets.read().unwrap().as_deref(), Some("sk-live-123"));
}

// ── Runtime ──

#[tokio::test]
async fn runtime_runs_a_full_day() {
    let backend = Arc::new(MockBackend::new());
    let notifier = Arc::new(CollectNotifier::new(Permission::Granted));
    let (handle, mut updates, task) = spawn(
        backend.clone(),
        Arc::new(MemoryStore::new()),
        notifier,
        SessionSettings::default(),
        false,
    );

    assert!(matches!(updates.recv().await, Some(Update::Ready { .. })));
    let sent = handle
        .send(Command::Start {
            persona: String::new(),
            goal: String::new(),
        })
        .await;
    assert!(sent);
    assert!(matches!(
        updates.recv().await,
        Some(Update::Failed { kind: FailureKind::Validation, .. })
    ));

    handle
        .send(Command::Start {
            persona: "p1".into(),
            goal: "focus".into(),
        })
        .await;
    assert!(matches!(updates.recv().await, Some(Update::Started { .. })));
    assert!(matches!(updates.recv().await, Some(Update::Status { .. })));

    handle.send(Command::End).await;
    assert!(matches!(updates.recv().await, Some(Update::Ended(r)) if r.goal == "focus"));

    handle.send(Command::Shutdown).await;
    task.await.unwrap();
    assert!(updates.recv().await.is_none());
    assert_eq!(backend.call_count(endpoint::END_DAY), 1);
}

#[tokio::test]
async fn runtime_stops_after_fatal_startup() {
    let backend = MockBackend::new();
    backend.script(
        endpoint::PERSONAS,
        vec![MockReply::Unreachable, MockReply::Unreachable],
    );
    let settings = SessionSettings {
        persona_retry_delay: Duration::from_millis(1),
        ..SessionSettings::default()
    };
    let (handle, mut updates, task) = spawn(
        Arc::new(backend),
        Arc::new(MemoryStore::new()),
        Arc::new(CollectNotifier::new(Permission::Denied)),
        settings,
        false,
    );

    assert!(matches!(
        updates.recv().await,
        Some(Update::Failed { kind: FailureKind::StartupConnectivity, .. })
    ));
    task.await.unwrap();
    assert!(!handle.send(Command::End).await);
}

#[test]
fn commands_never_print_the_api_key() {
    let cmd = Command::SaveApiKey("sk-secret".into());
    assert_eq!(format!("{cmd:?}"), "save_api_key");
}
