//! Unit tests for the window orchestration
//!
//! All tests run against the headless compositor.

use super::*;
use crate::backend::{HeadlessBackend, HeadlessControl, HeadlessOptions, ReleaseMode};
use crate::protocol::{KeyboardNotification, PointerNotification, ShellNotification};

fn session_with(options: HeadlessOptions) -> (Session<HeadlessBackend>, HeadlessControl) {
    let (backend, control) = HeadlessBackend::new(options);
    (Session::with_backend(backend).unwrap(), control)
}

fn drain<B: Backend>(window: &mut Window<'_, B>) -> Vec<Event> {
    std::iter::from_fn(|| window.get_event()).collect()
}

#[test]
fn create_waits_for_initial_configure() {
    let mut options = HeadlessOptions::default();
    options.initial_configure = (1024, 768);
    let (mut session, control) = session_with(options);
    let mut window = Window::create(&mut session, 0, 0, 64, 48).unwrap();

    assert!(window.is_configured());
    assert_eq!(window.role(), Some(ShellRole::XdgToplevel));
    assert_eq!(control.live_surfaces(), 1);
    assert_eq!(control.live_buffers(), 2);
    assert_eq!(
        drain(&mut window),
        vec![Event::new(EventKind::Configure, 1024, 768)]
    );
}

#[test]
fn legacy_shell_skips_configure_handshake() {
    let options = HeadlessOptions::default()
        .without_global("xdg_wm_base")
        .with_global("wl_shell", 1);
    let (mut session, _control) = session_with(options);
    let window = Window::create(&mut session, 0, 0, 32, 32).unwrap();

    assert_eq!(window.role(), Some(ShellRole::ShellSurface));
    assert!(!window.is_configured());
}

#[test]
fn zero_size_is_rejected_before_allocation() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let result = Window::create(&mut session, 0, 0, 0, 480);
    assert!(matches!(
        result,
        Err(PaneError::InvalidGeometry {
            width: 0,
            height: 480
        })
    ));
    assert_eq!(control.pools_created(), 0);
}

#[test]
fn missing_shell_fails_without_allocation() {
    let options = HeadlessOptions::default().without_global("xdg_wm_base");
    let (mut session, control) = session_with(options);
    let result = Window::create(&mut session, 0, 0, 32, 32);
    assert!(matches!(
        result,
        Err(PaneError::MissingCapability(Capability::Shell))
    ));
    assert_eq!(control.pools_created(), 0);
    assert_eq!(control.live_surfaces(), 0);
}

#[test]
fn failed_creation_releases_everything() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut config = PaneConfig::default();
    config.dispatch.timeout_ms = Some(20);
    control.drop_connection("compositor crashed");
    let result = Window::create_with(&mut session, &config, 0, 0, 32, 32);
    assert!(result.is_err());
    assert_eq!(control.live_pools(), 0);
    assert_eq!(control.live_buffers(), 0);
    assert_eq!(control.live_surfaces(), 0);
}

#[test]
fn swap_attaches_damages_and_commits_full_surface() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut window = Window::create(&mut session, 0, 0, 40, 30).unwrap();
    window.get_active_buffer().unwrap().fill(0xFF11_2233);
    window.swap_buffers(true).unwrap();

    let commits = control.commits();
    let last = commits.last().unwrap();
    assert_eq!(last.buffer, Some(window.pool().slot(0).unwrap().buffer));
    assert_eq!(last.damage, Some((0, 0, 40, 30)));
    assert!(last.frame_requested);
    assert!(window.pool().is_busy(0));
    assert_eq!(window.active_index(), 1);
    assert_eq!(window.pool().slot_pixels(0).unwrap()[0], 0xFF11_2233);
}

#[test]
fn single_slot_blocks_until_release() {
    let (mut session, _control) =
        session_with(HeadlessOptions::default().release_mode(ReleaseMode::Immediate));
    let mut config = PaneConfig::default();
    config.window.slot_count = 1;
    let mut window = Window::create_with(&mut session, &config, 0, 0, 16, 16).unwrap();

    for _ in 0..5 {
        assert_eq!(window.active_index(), 0);
        window.get_active_buffer().unwrap().fill(0);
        window.swap_buffers(true).unwrap();
    }
    assert_eq!(window.frames_presented(), 5);
}

#[test]
fn single_slot_reuses_buffer_the_compositor_keeps_attached() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut config = PaneConfig::default();
    config.window.slot_count = 1;
    config.dispatch.timeout_ms = Some(200);
    let mut window = Window::create_with(&mut session, &config, 0, 0, 16, 16).unwrap();

    for frame in 0..4u32 {
        window.get_active_buffer().unwrap().fill(frame);
        window.swap_buffers(true).unwrap();
    }
    assert_eq!(window.frames_presented(), 4);
    assert_eq!(window.get_active_buffer().unwrap()[0], 3);

    let commits = control.commits();
    let buffer = window.pool().slot(0).unwrap().buffer;
    assert!(commits
        .iter()
        .filter(|c| c.buffer.is_some())
        .all(|c| c.buffer == Some(buffer)));
}

#[test]
fn create_rejects_invalid_config() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut config = PaneConfig::default();
    config.dispatch.timeout_ms = Some(0);

    assert!(matches!(
        Window::create_with(&mut session, &config, 0, 0, 16, 16),
        Err(PaneError::ProtocolViolation(_))
    ));
    assert_eq!(control.pools_created(), 0);
    assert_eq!(control.live_surfaces(), 0);
}

#[test]
fn exhausted_buffers_time_out_when_configured() {
    let (mut session, _control) =
        session_with(HeadlessOptions::default().release_mode(ReleaseMode::Never));
    let mut config = PaneConfig::default();
    config.dispatch.timeout_ms = Some(20);
    let mut window = Window::create_with(&mut session, &config, 0, 0, 16, 16).unwrap();

    window.swap_buffers(false).unwrap();
    window.swap_buffers(false).unwrap();
    assert!(matches!(
        window.get_active_buffer(),
        Err(PaneError::Timeout(_))
    ));
    assert!(!window.is_lost());
}

#[test]
fn unpaced_swaps_never_wait_for_frames() {
    let (mut session, control) = session_with(HeadlessOptions::default().manual_frames());
    let mut window = Window::create(&mut session, 0, 0, 16, 16).unwrap();
    window.set_pacing(PacingPolicy::Unpaced);

    for _ in 0..6 {
        window.get_active_buffer().unwrap();
        window.swap_buffers(true).unwrap();
    }
    assert_eq!(window.frames_presented(), 6);
    // Only one frame request is ever outstanding.
    assert_eq!(control.outstanding_frames(), 1);
    assert_eq!(control.blocking_dispatches(), 0);
}

#[test]
fn unsynced_swap_ignores_pacing_policy() {
    let (mut session, control) = session_with(HeadlessOptions::default().manual_frames());
    let mut window = Window::create(&mut session, 0, 0, 16, 16).unwrap();

    window.swap_buffers(false).unwrap();
    window.swap_buffers(false).unwrap();
    assert_eq!(window.frames_presented(), 2);
    assert_eq!(control.blocking_dispatches(), 0);
}

#[test]
fn round_trip_pacing_uses_round_trips() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut config = PaneConfig::default();
    config.window.pacing = PacingPolicy::BlockingRoundTrip;
    let mut window = Window::create_with(&mut session, &config, 0, 0, 16, 16).unwrap();
    let before = control.roundtrips();

    window.swap_buffers(true).unwrap();
    window.swap_buffers(true).unwrap();
    assert_eq!(control.roundtrips(), before + 2);
}

#[test]
fn close_request_is_an_event_not_a_flag() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut window = Window::create(&mut session, 0, 0, 16, 16).unwrap();
    drain(&mut window);

    control.inject(ShellNotification::Close);
    assert_eq!(window.get_event(), Some(Event::bare(EventKind::Close)));
    assert!(!window.should_close());
    window.request_close();
    assert!(window.should_close());
}

#[test]
fn lost_connection_surfaces_once() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut window = Window::create(&mut session, 0, 0, 16, 16).unwrap();
    drain(&mut window);

    control.drop_connection("broken pipe");
    assert_eq!(
        window.get_event(),
        Some(Event::bare(EventKind::ConnectionLost))
    );
    assert_eq!(window.get_event(), None);
    assert!(window.should_close());
    assert!(matches!(
        window.swap_buffers(true),
        Err(PaneError::ConnectionLost(_))
    ));
    assert_eq!(window.get_event(), None);
}

#[test]
fn queue_capacity_comes_from_config() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut config = PaneConfig::default();
    config.events.queue_capacity = 3;
    let mut window = Window::create_with(&mut session, &config, 0, 0, 16, 16).unwrap();
    drain(&mut window);

    control.inject_all((0..10).map(|i| PointerNotification::Motion {
        x: i as f64,
        y: 0.0,
    }));
    let events = drain(&mut window);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].a, 7);
    assert_eq!(window.dropped_events(), 7);
}

#[test]
fn destroy_tears_down_in_order() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    let mut window = Window::create(&mut session, 10, 20, 16, 16).unwrap();
    assert_eq!(window.position(), (10, 20));
    window.swap_buffers(true).unwrap();
    control.inject(KeyboardNotification::Enter);
    window.destroy();

    assert_eq!(control.live_surfaces(), 0);
    assert_eq!(control.live_buffers(), 0);
    assert_eq!(control.live_pools(), 0);
}

#[test]
fn dropping_window_releases_resources() {
    let (mut session, control) = session_with(HeadlessOptions::default());
    {
        let _window = Window::create(&mut session, 0, 0, 16, 16).unwrap();
        assert_eq!(control.live_pools(), 1);
    }
    assert_eq!(control.live_pools(), 0);
    assert_eq!(control.live_surfaces(), 0);
}
