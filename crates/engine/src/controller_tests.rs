// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use vigil_adapters::{FakePortProbe, FakeProcessAdapter, ProcessCall};
use vigil_core::test_support::{daemon, dev_server, unconfigured};
use vigil_core::FakeClock;

const COOLDOWN: Duration = Duration::from_secs(15);

struct Harness {
    controller: ProcessController<FakeProcessAdapter, FakePortProbe, FakeClock>,
    process: FakeProcessAdapter,
    ports: FakePortProbe,
    clock: FakeClock,
    scheduler: Arc<Mutex<Scheduler>>,
    ledger: Arc<Mutex<CooldownLedger>>,
    _events: mpsc::Receiver<Event>,
}

fn harness_with(settings: ControllerSettings) -> Harness {
    let process = FakeProcessAdapter::new();
    let ports = FakePortProbe::new();
    let clock = FakeClock::new();
    let scheduler = Arc::new(Mutex::new(Scheduler::new()));
    let ledger = Arc::new(Mutex::new(CooldownLedger::new(COOLDOWN)));
    let (tx, rx) = mpsc::channel(16);
    let controller = ProcessController::new(
        ControllerDeps {
            process: process.clone(),
            ports: ports.clone(),
        },
        clock.clone(),
        settings,
        Arc::clone(&scheduler),
        Arc::clone(&ledger),
        tx,
    );
    Harness {
        controller,
        process,
        ports,
        clock,
        scheduler,
        ledger,
        _events: rx,
    }
}

fn harness() -> Harness {
    harness_with(ControllerSettings {
        port_release_delay: Duration::ZERO,
        ..ControllerSettings::default()
    })
}

fn id(s: &str) -> ResourceId {
    ResourceId::new(s)
}

fn restart_deadline(h: &Harness, resource: &str) -> Option<std::time::Instant> {
    h.scheduler
        .lock()
        .deadline(TimerId::restart(&id(resource)).as_str())
}

#[tokio::test]
async fn start_spawns_dev_server_with_forced_color() {
    let h = harness();
    let web = dev_server("web", "npm run dev").with_env("NODE_ENV", "development");

    let status = h.controller.start(&web).await.unwrap();
    assert_eq!(status, ResourceStatus::Starting);

    let spawns = h.process.spawns();
    assert_eq!(spawns.len(), 1);
    assert_eq!(spawns[0].command, "npm run dev");
    assert_eq!(spawns[0].generation, Generation(1));
    assert_eq!(
        spawns[0].env,
        vec![
            ("FORCE_COLOR".to_string(), "1".to_string()),
            ("NODE_ENV".to_string(), "development".to_string()),
        ]
    );
}

#[tokio::test]
async fn start_is_idempotent_while_starting_or_running() {
    let h = harness();
    let web = dev_server("web", "vite");

    h.controller.start(&web).await.unwrap();
    assert_eq!(h.controller.start(&web).await.unwrap(), ResourceStatus::Starting);

    h.controller.on_output(&id("web"), Generation(1), "ready in 200ms");
    assert_eq!(h.controller.start(&web).await.unwrap(), ResourceStatus::Running);

    assert_eq!(h.process.spawn_count(), 1);
}

#[tokio::test]
async fn resource_without_command_stays_not_configured() {
    let h = harness();

    let err = h.controller.start(&unconfigured("web")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotConfigured(ref r) if r == "web"));
    assert_eq!(h.controller.status(&id("web")).status, ResourceStatus::NotConfigured);
    assert_eq!(h.process.spawn_count(), 0);
}

#[tokio::test]
async fn bound_port_marks_external_without_spawning() {
    let h = harness();
    h.ports.bind(5173);
    let web = dev_server("web", "vite --port 5173");

    assert_eq!(h.controller.start(&web).await.unwrap(), ResourceStatus::External);
    assert_eq!(h.ports.checked(), vec![5173]);
    assert_eq!(h.process.spawn_count(), 0);

    let snapshot = h.controller.status(&id("web"));
    assert_eq!(snapshot.status, ResourceStatus::External);
    assert_eq!(snapshot.port, Some(5173));

    // External counts as active
    h.controller.start(&web).await.unwrap();
    assert_eq!(h.process.spawn_count(), 0);
}

#[tokio::test]
async fn readiness_signature_moves_starting_to_running() {
    let h = harness();
    h.controller.start(&dev_server("web", "vite")).await.unwrap();

    h.controller.on_output(&id("web"), Generation(1), "vite v5.0.0 building...\n");
    assert_eq!(h.controller.status(&id("web")).status, ResourceStatus::Starting);

    h.controller
        .on_output(&id("web"), Generation(1), "  Local: http://localhost:5173/\n");
    let snapshot = h.controller.status(&id("web"));
    assert_eq!(snapshot.status, ResourceStatus::Running);
    assert_eq!(snapshot.port, Some(5173));
    assert!(snapshot.recent_output.contains("building"));
}

#[tokio::test]
async fn daemon_runs_as_soon_as_spawned() {
    let h = harness();
    let status = h.controller.start(&daemon("weldr", "weldr watch")).await.unwrap();
    assert_eq!(status, ResourceStatus::Running);
    // Daemons do not get FORCE_COLOR
    assert!(h.process.spawns()[0].env.is_empty());
}

#[tokio::test]
async fn crash_restarts_until_budget_then_fails() {
    let h = harness();
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();

    for attempt in 1..=3u32 {
        let generation = Generation(u64::from(attempt));
        h.controller.on_exit(&id("web"), generation, Some(1));

        let snapshot = h.controller.status(&id("web"));
        assert_eq!(snapshot.restart_count, attempt);
        assert_eq!(snapshot.status, ResourceStatus::Stopped);
        assert!(snapshot.restart_pending);
        assert_eq!(
            restart_deadline(&h, "web"),
            Some(h.clock.now() + Duration::from_secs(3))
        );

        // Let the cooldown from the previous restart lapse
        h.clock.advance(COOLDOWN);
        let outcome = h.controller.on_restart_timer(&id("web")).await;
        assert_eq!(outcome, RestartOutcome::Restarted);
        assert_eq!(h.process.spawn_count(), attempt as usize + 1);
    }

    h.controller.on_exit(&id("web"), Generation(4), Some(1));
    let snapshot = h.controller.status(&id("web"));
    assert_eq!(snapshot.status, ResourceStatus::Failed);
    assert_eq!(snapshot.restart_count, 3);
    assert!(!snapshot.restart_pending);
    assert_eq!(restart_deadline(&h, "web"), None);
}

#[tokio::test]
async fn clean_or_signalled_exit_stops_without_restart() {
    let h = harness();
    h.controller.start(&dev_server("a", "vite")).await.unwrap();
    h.controller.start(&dev_server("b", "vite")).await.unwrap();

    h.controller.on_exit(&id("a"), Generation(1), Some(0));
    h.controller.on_exit(&id("b"), Generation(2), None);

    for name in ["a", "b"] {
        let snapshot = h.controller.status(&id(name));
        assert_eq!(snapshot.status, ResourceStatus::Stopped);
        assert_eq!(snapshot.restart_count, 0);
        assert_eq!(restart_deadline(&h, name), None);
    }
}

#[tokio::test]
async fn exit_of_superseded_instance_is_ignored() {
    let h = harness();
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();
    h.controller.stop(&id("web")).await;
    h.controller.start(&web).await.unwrap();

    // Late exit from the first instance
    h.controller.on_exit(&id("web"), Generation(1), Some(137));
    h.controller.on_output(&id("web"), Generation(1), "ready");

    let snapshot = h.controller.status(&id("web"));
    assert_eq!(snapshot.status, ResourceStatus::Starting);
    assert_eq!(snapshot.restart_count, 0);
    assert!(snapshot.recent_output.is_empty());
    assert_eq!(restart_deadline(&h, "web"), None);
}

#[tokio::test]
async fn stop_kills_and_forgets() {
    let h = harness();
    h.controller.start(&dev_server("web", "vite")).await.unwrap();

    assert!(h.controller.stop(&id("web")).await);
    assert_eq!(h.process.kills().len(), 1);
    assert_eq!(h.controller.status(&id("web")).status, ResourceStatus::NotConfigured);

    assert!(!h.controller.stop(&id("web")).await);
}

#[tokio::test]
async fn stop_cancels_pending_crash_restart() {
    let h = harness();
    h.controller.start(&dev_server("web", "vite")).await.unwrap();
    h.controller.on_exit(&id("web"), Generation(1), Some(1));
    assert!(restart_deadline(&h, "web").is_some());

    h.controller.stop(&id("web")).await;
    assert_eq!(restart_deadline(&h, "web"), None);
    assert_eq!(
        h.controller.on_restart_timer(&id("web")).await,
        RestartOutcome::Skipped
    );
}

#[tokio::test]
async fn manual_restart_resets_budget() {
    let h = harness();
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();
    h.controller.on_exit(&id("web"), Generation(1), Some(1));
    assert_eq!(h.controller.status(&id("web")).restart_count, 1);

    let status = h.controller.restart(&web).await.unwrap();
    assert_eq!(status, ResourceStatus::Starting);
    assert_eq!(h.controller.status(&id("web")).restart_count, 0);
    assert_eq!(h.process.spawn_count(), 2);
    // The pending crash restart was superseded
    assert_eq!(restart_deadline(&h, "web"), None);
    assert_eq!(
        h.ledger.lock().last_attempt("devserver:web"),
        Some(h.clock.now())
    );
}

#[tokio::test]
async fn recover_keeps_restart_count() {
    let h = harness();
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();
    h.controller.on_exit(&id("web"), Generation(1), Some(1));

    h.controller.recover(&web).await.unwrap();
    let snapshot = h.controller.status(&id("web"));
    assert_eq!(snapshot.status, ResourceStatus::Starting);
    assert_eq!(snapshot.restart_count, 1);
}

#[tokio::test]
async fn spawn_failure_fails_immediately() {
    let h = harness();
    h.process.fail_spawn("missing-binary --serve");

    let err = h
        .controller
        .start(&dev_server("web", "missing-binary --serve"))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn { .. }));

    let snapshot = h.controller.status(&id("web"));
    assert_eq!(snapshot.status, ResourceStatus::Failed);
    assert_eq!(snapshot.restart_count, 0);
    assert_eq!(restart_deadline(&h, "web"), None);
}

#[tokio::test]
async fn crash_restart_inside_cooldown_is_rescheduled() {
    let h = harness();
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();
    // Another path restarted this resource just now
    h.ledger.lock().stamp("devserver:web", h.clock.now());

    h.controller.on_exit(&id("web"), Generation(1), Some(1));
    h.clock.advance(Duration::from_secs(3));

    let outcome = h.controller.on_restart_timer(&id("web")).await;
    assert_eq!(
        outcome,
        RestartOutcome::Declined {
            reason: DeclineReason::Cooldown {
                remaining: Duration::from_secs(12)
            }
        }
    );
    assert_eq!(h.process.spawn_count(), 1);
    assert_eq!(
        restart_deadline(&h, "web"),
        Some(h.clock.now() + Duration::from_secs(12))
    );

    h.clock.advance(Duration::from_secs(12));
    assert_eq!(
        h.controller.on_restart_timer(&id("web")).await,
        RestartOutcome::Restarted
    );
    assert_eq!(h.process.spawn_count(), 2);
}

#[tokio::test]
async fn status_carries_only_the_recent_output() {
    let h = harness_with(ControllerSettings {
        output_tail_bytes: 32,
        status_tail_bytes: 10,
        ..ControllerSettings::default()
    });
    h.controller.start(&dev_server("web", "vite")).await.unwrap();

    h.controller
        .on_output(&id("web"), Generation(1), "0123456789abcdef");
    assert_eq!(h.controller.status(&id("web")).recent_output, "6789abcdef");
    assert_eq!(
        h.controller.output(&id("web")).as_deref(),
        Some("0123456789abcdef")
    );
}

#[tokio::test]
async fn bulk_start_and_stop() {
    let h = harness();
    h.process.fail_spawn("broken");
    let resources = vec![
        dev_server("web", "vite"),
        daemon("weldr", "weldr watch"),
        unconfigured("docs"),
        dev_server("api", "broken"),
    ];

    assert_eq!(h.controller.start_all(&resources).await, 2);
    assert_eq!(h.process.spawn_count(), 3);

    let ids: Vec<String> = h
        .controller
        .statuses()
        .into_iter()
        .map(|(id, _)| id.to_string())
        .collect();
    assert_eq!(ids, vec!["api", "web", "weldr"]);

    assert_eq!(h.controller.stop_all().await, 3);
    let kills = h
        .process
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ProcessCall::Kill { .. }))
        .count();
    assert_eq!(kills, 2);
}

#[tokio::test]
async fn crash_restart_that_cannot_spawn_reports_failure() {
    let h = harness();
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();
    h.controller.on_exit(&id("web"), Generation(1), Some(1));
    // Binary disappeared between runs
    h.process.fail_spawn("vite");

    let outcome = h.controller.on_restart_timer(&id("web")).await;
    assert_eq!(outcome, RestartOutcome::Failed);
    assert_eq!(h.controller.status(&id("web")).status, ResourceStatus::Failed);
    assert_eq!(restart_deadline(&h, "web"), None);
}

#[tokio::test]
async fn shutdown_refuses_later_launches() {
    let h = harness();
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();

    assert_eq!(h.controller.shutdown().await, 1);
    assert!(h.controller.is_shutting_down());

    let err = h.controller.start(&web).await.unwrap_err();
    assert!(matches!(err, SupervisorError::ShuttingDown(ref rid) if rid == &id("web")));
    assert_eq!(h.process.spawn_count(), 1);
    assert_eq!(h.controller.status(&id("web")).status, ResourceStatus::NotConfigured);
}

#[tokio::test(start_paused = true)]
async fn recovery_waiting_on_port_release_does_not_outlive_shutdown() {
    let h = harness_with(ControllerSettings {
        port_release_delay: Duration::from_secs(1),
        ..ControllerSettings::default()
    });
    let web = dev_server("web", "vite");
    h.controller.start(&web).await.unwrap();
    h.controller.on_exit(&id("web"), Generation(1), Some(0));

    let (recovered, stopped) = tokio::join!(h.controller.recover(&web), async {
        tokio::task::yield_now().await;
        h.controller.shutdown().await
    });

    assert!(matches!(recovered, Err(SupervisorError::ShuttingDown(_))));
    assert_eq!(stopped, 0);
    assert_eq!(h.process.spawn_count(), 1);
    assert_eq!(h.controller.status(&id("web")).status, ResourceStatus::NotConfigured);
}
