// Integration test: a real compositor (feature `live-compositor`) accepts a
// session, maps a window and answers frame callbacks.
//
// Needs WAYLAND_DISPLAY pointing at a running compositor.

#![cfg(feature = "live-compositor")]

use anyhow::Result;

use wlpane::{Capability, EventKind, PaneConfig, Session, Window};

#[test]
fn test_live_session_binds_required_capabilities() -> Result<()> {
    let _ = env_logger::try_init();

    let session = Session::connect(None)?;
    for capability in Capability::ALL.into_iter().filter(|c| c.is_required()) {
        assert!(session.has_capability(capability), "missing {capability}");
    }
    session.disconnect();

    Ok(())
}

#[test]
fn test_live_window_presents_frames() -> Result<()> {
    let _ = env_logger::try_init();

    let mut session = Session::connect(None)?;
    let mut config = PaneConfig::default();
    config.window.title = "wlpane live test".to_string();
    config.dispatch.timeout_ms = Some(2_000);

    let mut window = Window::create_with(&mut session, &config, 0, 0, 320, 240)?;
    for frame in 0..30u32 {
        let shade = frame * 8;
        window
            .get_active_buffer()?
            .fill(0xFF00_0000 | shade << 16 | shade << 8 | shade);
        window.swap_buffers(true)?;
        while let Some(event) = window.get_event() {
            assert_ne!(event.kind, EventKind::ConnectionLost);
        }
    }
    assert_eq!(window.frames_presented(), 30);

    window.destroy();
    session.disconnect();

    Ok(())
}
