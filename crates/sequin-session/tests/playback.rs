//! Replay cursor and highlight behaviour driven by a real session.

mod common;

use std::time::Duration;

use common::{b, session};
use sequin_session::{EdgeStyle, HighlightState, Playback, PlaybackConfig, ReplayState, ViewEvent};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn test_manual_moves_follow_sequence() {
    let (_engine, mut s) = session(3);
    let mut p = Playback::default();
    for id in [2, 4, 1] {
        s.push(b(id)).unwrap();
        p.on_attack(s.sequence().as_slice());
    }
    let sequence = s.sequence().as_slice().to_vec();
    assert_eq!(p.cursor(), 3);

    let events = p.seek(1, &sequence);
    assert!(events.contains(&ViewEvent::CursorMoved {
        cursor: 1,
        step_count: 3
    }));
    // moving back highlights the line at the new cursor
    assert!(p.board().is_highlighting(b(4)));

    p.advance(ms(2000), &sequence);
    assert_eq!(p.style(b(2)), EdgeStyle::Marked);
    assert_eq!(p.style(b(4)), EdgeStyle::Normal);
    assert_eq!(p.style(b(1)), EdgeStyle::Normal);

    p.step(&sequence);
    assert_eq!(p.cursor(), 2);
    assert!(p.board().is_highlighting(b(4)));
    p.advance(ms(2000), &sequence);
    assert_eq!(p.board().state(b(4)), HighlightState::Marked);
}

#[test]
fn test_out_of_range_moves_are_ignored() {
    let (_engine, mut s) = session(3);
    let mut p = Playback::default();
    s.push(b(5)).unwrap();
    p.on_attack(s.sequence().as_slice());

    assert!(p.step(s.sequence().as_slice()).is_empty());
    assert!(p.seek(7, s.sequence().as_slice()).is_empty());
    assert_eq!(p.cursor(), 1);
}

#[test]
fn test_highlight_restores_style_captured_at_start() {
    let (_engine, mut s) = session(3);
    let mut p = Playback::default();
    s.push(b(3)).unwrap();
    p.on_attack(s.sequence().as_slice());
    assert!(p.board().is_highlighting(b(3)));

    p.advance(ms(300), s.sequence().as_slice());
    assert!(p.board().is_highlighting(b(3)));

    p.advance(ms(1100), s.sequence().as_slice());
    assert!(!p.board().is_highlighting(b(3)));
    assert_eq!(p.style(b(3)), EdgeStyle::Marked);
}

#[test]
fn test_undo_during_highlight_cancels_it() {
    let (_engine, mut s) = session(3);
    let mut p = Playback::default();
    s.push(b(1)).unwrap();
    p.on_attack(s.sequence().as_slice());
    p.advance(ms(200), s.sequence().as_slice());

    let restored = s.undo().unwrap();
    p.on_undo(restored, s.sequence().as_slice());
    p.advance(ms(5000), s.sequence().as_slice());

    assert_eq!(p.style(b(1)), EdgeStyle::Normal);
    assert_eq!(p.cursor(), 0);
    assert!(p.timers().is_empty());
}

#[test]
fn test_custom_timings() {
    let (_engine, mut s) = session(3);
    let config = PlaybackConfig {
        replay_delay_ms: 250,
        highlight_tick_ms: 10,
        highlight_repeat: 1,
    };
    let mut p = Playback::new(&config);
    s.push(b(1)).unwrap();
    s.push(b(2)).unwrap();
    let sequence = s.sequence().as_slice().to_vec();

    p.run(&sequence);
    assert_eq!(p.state(), ReplayState::Playing);
    assert_eq!(p.cursor(), 1);

    p.advance(ms(250), &sequence);
    assert_eq!(p.cursor(), 2);
    assert_eq!(p.state(), ReplayState::Idle);

    // one pass of the animation is 7 ticks
    p.advance(ms(70), &sequence);
    assert!(p.timers().is_empty());
}
