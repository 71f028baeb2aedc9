//! Session actor driven through its handle on a paused clock.

mod common;

use std::io::Write;
use std::time::Duration;

use common::{b, seq, session, session_with, StubEngine};
use sequin_session::{
    AttackError, AttackMode, Error, Metric, ReplayState, SequinConfig, SessionEvent,
    SessionHandle, SolveStage, Strategy, SummaryKind, ViewEvent,
};
use tokio::sync::broadcast;

fn spawn(budget: usize) -> (std::sync::Arc<StubEngine>, SessionHandle, tokio::task::JoinHandle<()>) {
    let (engine, s) = session(budget);
    let (handle, join) = SessionHandle::spawn(s, SequinConfig::default());
    (engine, handle, join)
}

fn drain(rx: &mut broadcast::Receiver<ViewEvent>) -> Vec<ViewEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_attack_round_trip() {
    let (_engine, handle, _join) = spawn(3);
    let mut rx = handle.subscribe();

    handle.attack(b(2)).await.unwrap();
    handle.attack(b(4)).await.unwrap();

    let status = handle.status().await.unwrap();
    assert_eq!(status.sequence, seq(&[2, 4]));
    assert_eq!(status.step_count(), 2);
    assert_eq!(status.cursor, 2);
    assert_eq!(status.case, "ring5");

    let events = drain(&mut rx);
    assert!(events.contains(&ViewEvent::Session(SessionEvent::Attacked {
        branch: b(4),
        step: 2
    })));
    assert!(events.contains(&ViewEvent::CursorMoved {
        cursor: 2,
        step_count: 2
    }));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_attack_surfaces_error() {
    let (engine, handle, _join) = spawn(3);
    handle.attack(b(1)).await.unwrap();

    let err = handle.attack(b(1)).await.unwrap_err();
    assert!(matches!(err, Error::Attack(AttackError::AlreadyAttacked(_))));

    engine.fail_on(b(3), SolveStage::Simultaneous);
    let err = handle.attack(b(3)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Attack(AttackError::Solver {
            stage: SolveStage::Simultaneous,
            ..
        })
    ));
    assert_eq!(handle.status().await.unwrap().sequence, seq(&[1]));
}

#[tokio::test(start_paused = true)]
async fn test_undo_and_reset() {
    let (_engine, handle, _join) = spawn(3);
    handle.attack(b(2)).await.unwrap();
    handle.attack(b(5)).await.unwrap();

    assert_eq!(handle.undo().await.unwrap(), Some(b(5)));
    assert_eq!(handle.status().await.unwrap().cursor, 1);
    assert_eq!(handle.reset().await.unwrap(), seq(&[2]));
    assert_eq!(handle.undo().await.unwrap(), None);

    let status = handle.status().await.unwrap();
    assert!(status.sequence.is_empty());
    assert_eq!(status.cursor, 0);
}

#[tokio::test(start_paused = true)]
async fn test_replay_plays_on_timer() {
    let (_engine, handle, _join) = spawn(3);
    for id in [1, 2, 3] {
        handle.attack(b(id)).await.unwrap();
    }

    let status = handle.play().await.unwrap();
    assert_eq!(status.playback, ReplayState::Playing);
    assert_eq!(status.cursor, 0);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.cursor, 1);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.cursor, 3);
    assert_eq!(status.playback, ReplayState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_manual_moves() {
    let (_engine, handle, _join) = spawn(3);
    handle.attack(b(1)).await.unwrap();
    handle.attack(b(2)).await.unwrap();

    handle.play().await.unwrap();
    let status = handle.stop().await.unwrap();
    assert_eq!(status.playback, ReplayState::Idle);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.status().await.unwrap().cursor, 0);

    assert_eq!(handle.step().await.unwrap().cursor, 1);
    assert_eq!(handle.step().await.unwrap().cursor, 2);
    // past the end is ignored
    assert_eq!(handle.step().await.unwrap().cursor, 2);
    assert_eq!(handle.back().await.unwrap().cursor, 1);
    assert_eq!(handle.seek(9).await.unwrap().cursor, 1);
    assert_eq!(handle.seek(0).await.unwrap().cursor, 0);
}

#[tokio::test(start_paused = true)]
async fn test_highlight_finishes_after_attack() {
    let (_engine, handle, _join) = spawn(3);
    let mut rx = handle.subscribe();
    handle.attack(b(4)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    handle.status().await.unwrap();

    let styles: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ViewEvent::StyleChanged { branch, style } if branch == b(4) => Some(style),
            _ => None,
        })
        .collect();
    assert_eq!(styles.last(), Some(&sequin_session::EdgeStyle::Marked));
    assert!(styles.contains(&sequin_session::EdgeStyle::Emphasis));
}

#[tokio::test(start_paused = true)]
async fn test_strategy_and_queries() {
    let (_engine, handle, _join) = spawn(3);

    let outcome = handle.run_strategy(Strategy::GreedyFlow).await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.applied, seq(&[5, 4, 3]));

    let records = handle.records().await.unwrap();
    assert_eq!(records.len(), 3);

    let shed = handle
        .metric(Metric::LoadShed, 3, Some(AttackMode::Simultaneous))
        .await
        .unwrap();
    assert_eq!(shed.step, 3);

    let err = handle.metric(Metric::LoadShed, 4, None).await.unwrap_err();
    assert!(matches!(err, Error::StepOutOfRange { step: 4, len: 4 }));

    let islands = handle.summarize(SummaryKind::Islands).await.unwrap();
    assert_eq!(islands.sequential, vec![1.0, 2.0, 3.0]);
}

#[tokio::test(start_paused = true)]
async fn test_random_strategy_respects_budget() {
    let (_engine, handle, _join) = spawn(4);
    handle.attack(b(1)).await.unwrap();

    let outcome = handle.run_strategy(Strategy::Random).await.unwrap();
    assert_eq!(outcome.applied.len(), 3);
    assert!(!outcome.applied.contains(&b(1)));

    let outcome = handle.run_strategy(Strategy::Random).await.unwrap();
    assert!(outcome.candidates.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_settings_round_trip() {
    let (_engine, handle, _join) = spawn(3);
    handle.attack(b(1)).await.unwrap();
    handle.attack(b(2)).await.unwrap();

    handle.set_mode(AttackMode::Simultaneous).await.unwrap();
    assert_eq!(handle.status().await.unwrap().mode, AttackMode::Simultaneous);

    let err = handle.set_budget(1).await.unwrap_err();
    assert!(matches!(err, Error::Attack(AttackError::InvalidBudget { .. })));
    handle.set_budget(5).await.unwrap();
    assert_eq!(handle.status().await.unwrap().budget, 5);

    assert!(handle.set_ramp_bound(f64::NAN).await.is_err());
    handle.set_ramp_bound(0.5).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_load_case_replaces_session() {
    let (_engine, handle, _join) = spawn(3);
    let before = handle.status().await.unwrap();
    handle.attack(b(2)).await.unwrap();

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    writeln!(bad, "garbage").unwrap();
    let err = handle.load_case(bad.path()).await.unwrap_err();
    assert!(matches!(err, Error::LoadFailed { .. }));
    assert_eq!(handle.status().await.unwrap().sequence, seq(&[2]));

    let mut case = tempfile::NamedTempFile::new().unwrap();
    writeln!(case, "function mpc = ring5").unwrap();
    let mut rx = handle.subscribe();
    let id = handle.load_case(case.path()).await.unwrap();

    let status = handle.status().await.unwrap();
    assert_ne!(id, before.id);
    assert_eq!(status.id, id);
    assert!(status.sequence.is_empty());
    assert_eq!(status.cursor, 0);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ViewEvent::Session(SessionEvent::CaseLoaded { n_branch: 5, .. })
    )));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_actor() {
    let engine = StubEngine::new();
    let (handle, join) = SessionHandle::spawn(session_with(engine, 3), SequinConfig::default());

    handle.shutdown().await.unwrap();
    join.await.unwrap();
    assert!(matches!(handle.status().await, Err(Error::ChannelClosed)));
}
