//! Translation of protocol notifications into application events
//!
//! An [`EventBridge`] is the window's [`ProtocolHandler`]: it borrows the
//! window state for the length of one dispatch call. Input and shell traffic
//! becomes [`Event`]s in delivery order; buffer releases and frame
//! completions update the buffer pool and the pacer directly and never reach
//! the application.

use log::{debug, info};

use super::{Event, EventKind, EventQueue, Modifiers, KEY_ESCAPE};
use crate::backend::BufferId;
use crate::frame_pacing::{FramePacer, FrameToken};
use crate::protocol::{KeyboardNotification, PointerNotification, ProtocolHandler, ShellNotification};
use crate::shm::BufferPool;

pub struct EventBridge<'w> {
    events: &'w mut EventQueue,
    pool: &'w mut BufferPool,
    pacer: &'w mut FramePacer,
    should_close: &'w mut bool,
    configured: &'w mut bool,
}

impl<'w> EventBridge<'w> {
    pub fn new(
        events: &'w mut EventQueue,
        pool: &'w mut BufferPool,
        pacer: &'w mut FramePacer,
        should_close: &'w mut bool,
        configured: &'w mut bool,
    ) -> Self {
        Self {
            events,
            pool,
            pacer,
            should_close,
            configured,
        }
    }

    fn push(&mut self, kind: EventKind, a: u32, b: u32) {
        self.events.push(Event::new(kind, a, b));
    }
}

/// Surface coordinate to pixel; `as` saturates negatives and NaN to 0.
fn pixel(v: f64) -> u32 {
    v as u32
}

fn flag(pressed: bool) -> u32 {
    u32::from(pressed)
}

impl ProtocolHandler for EventBridge<'_> {
    fn on_pointer_event(&mut self, event: PointerNotification) {
        match event {
            PointerNotification::Enter { x, y } => {
                self.push(EventKind::PointerEnter, pixel(x), pixel(y))
            }
            PointerNotification::Leave => self.push(EventKind::PointerLeave, 0, 0),
            PointerNotification::Motion { x, y } => {
                self.push(EventKind::PointerMotion, pixel(x), pixel(y))
            }
            PointerNotification::Button { button, pressed } => {
                self.push(EventKind::PointerButton, button, flag(pressed))
            }
            PointerNotification::Axis { axis, value } => {
                self.push(EventKind::PointerAxis, axis, value as i32 as u32)
            }
        }
    }

    fn on_key_event(&mut self, event: KeyboardNotification) {
        match event {
            KeyboardNotification::Keymap { format, size } => {
                self.push(EventKind::Keymap, format, size)
            }
            KeyboardNotification::Enter => self.push(EventKind::KeyboardEnter, 0, 0),
            KeyboardNotification::Leave => self.push(EventKind::KeyboardLeave, 0, 0),
            KeyboardNotification::Key { key, pressed } => {
                if pressed && key == KEY_ESCAPE && !*self.should_close {
                    info!("⎋ Escape pressed, window marked for close");
                    *self.should_close = true;
                }
                self.push(EventKind::Key, key, flag(pressed));
            }
            KeyboardNotification::Modifiers {
                depressed,
                latched,
                locked,
                ..
            } => {
                let active = Modifiers::from_bits_truncate(depressed | latched);
                let locked = Modifiers::from_bits_truncate(locked);
                self.push(EventKind::Modifiers, active.bits(), locked.bits());
            }
            KeyboardNotification::RepeatInfo { rate, delay } => {
                self.push(EventKind::RepeatInfo, rate.max(0) as u32, delay.max(0) as u32)
            }
        }
    }

    fn on_configure(&mut self, event: ShellNotification) {
        match event {
            ShellNotification::Configure { width, height } => {
                *self.configured = true;
                self.push(
                    EventKind::Configure,
                    width.max(0) as u32,
                    height.max(0) as u32,
                );
            }
            ShellNotification::Ping { serial } => self.push(EventKind::Ping, serial, 0),
            ShellNotification::Close => self.push(EventKind::Close, 0, 0),
        }
    }

    fn on_release(&mut self, buffer: BufferId) {
        match self.pool.slot_for_buffer(buffer) {
            Some(slot) => self.pool.mark_free(slot),
            None => debug!("release for foreign {}", buffer),
        }
    }

    fn on_frame_complete(&mut self, token: FrameToken, _time: u32) {
        self.pacer.on_completion_signal(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, HeadlessOptions};
    use crate::input::{BTN_LEFT, KEY_F1};
    use crate::session::Session;

    struct Fixture {
        events: EventQueue,
        pool: BufferPool,
        pacer: FramePacer,
        should_close: bool,
        configured: bool,
        session: Session<HeadlessBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            let (backend, _control) = HeadlessBackend::new(HeadlessOptions::default());
            let mut session = Session::with_backend(backend).unwrap();
            let pool = BufferPool::create(&mut session, 8, 8, 2).unwrap();
            Self {
                events: EventQueue::default(),
                pool,
                pacer: FramePacer::new(),
                should_close: false,
                configured: false,
                session,
            }
        }

        fn bridge(&mut self) -> EventBridge<'_> {
            EventBridge::new(
                &mut self.events,
                &mut self.pool,
                &mut self.pacer,
                &mut self.should_close,
                &mut self.configured,
            )
        }

        fn drain(&mut self) -> Vec<Event> {
            std::iter::from_fn(|| self.events.pop()).collect()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.pool.release_handles(self.session.backend_mut());
        }
    }

    #[test]
    fn pointer_payloads() {
        let mut fx = Fixture::new();
        let mut bridge = fx.bridge();
        bridge.on_pointer_event(PointerNotification::Enter { x: 12.7, y: -3.0 });
        bridge.on_pointer_event(PointerNotification::Button {
            button: BTN_LEFT,
            pressed: true,
        });
        bridge.on_pointer_event(PointerNotification::Axis { axis: 0, value: -10.0 });

        let events = fx.drain();
        assert_eq!(events[0], Event::new(EventKind::PointerEnter, 12, 0));
        assert_eq!(events[1], Event::new(EventKind::PointerButton, BTN_LEFT, 1));
        assert_eq!(events[2].axis_value(), Some(-10));
    }

    #[test]
    fn escape_press_sets_close_flag() {
        let mut fx = Fixture::new();
        fx.bridge().on_key_event(KeyboardNotification::Key {
            key: KEY_F1,
            pressed: true,
        });
        assert!(!fx.should_close);
        fx.bridge().on_key_event(KeyboardNotification::Key {
            key: KEY_ESCAPE,
            pressed: false,
        });
        assert!(!fx.should_close);
        fx.bridge().on_key_event(KeyboardNotification::Key {
            key: KEY_ESCAPE,
            pressed: true,
        });
        assert!(fx.should_close);
        assert_eq!(fx.drain().len(), 3);
    }

    #[test]
    fn modifiers_fold_depressed_and_latched() {
        let mut fx = Fixture::new();
        fx.bridge().on_key_event(KeyboardNotification::Modifiers {
            depressed: Modifiers::SHIFT.bits(),
            latched: Modifiers::CONTROL.bits(),
            locked: Modifiers::CAPS_LOCK.bits() | 0x8000,
            group: 0,
        });
        let event = fx.drain()[0];
        assert_eq!(event.modifiers(), Some(Modifiers::SHIFT | Modifiers::CONTROL));
        assert_eq!(event.b, Modifiers::CAPS_LOCK.bits());
    }

    #[test]
    fn configure_marks_window_configured() {
        let mut fx = Fixture::new();
        fx.bridge()
            .on_configure(ShellNotification::Configure { width: 640, height: -1 });
        assert!(fx.configured);
        assert_eq!(fx.drain(), vec![Event::new(EventKind::Configure, 640, 0)]);
    }

    #[test]
    fn release_and_frame_are_not_events() {
        let mut fx = Fixture::new();
        fx.pool.mark_busy(1);
        let buffer = fx.pool.slot(1).unwrap().buffer;
        let token = fx.pacer.request_token().unwrap();

        let mut bridge = fx.bridge();
        bridge.on_release(buffer);
        bridge.on_release(BufferId(9999));
        bridge.on_frame_complete(token, 16);

        assert!(!fx.pool.is_busy(1));
        assert!(fx.pacer.consume_ready());
        assert!(fx.events.is_empty());
    }
}
