//! Input and lifecycle events
//!
//! Everything the compositor tells the application ends up as an [`Event`]:
//! a plain `{kind, a, b}` record with integer payloads, safe to queue and
//! inspect after the object that produced it is gone.
//!
//! | kind | a | b |
//! |---|---|---|
//! | `PointerEnter`, `PointerMotion` | x | y |
//! | `PointerButton` | button code | 1 pressed, 0 released |
//! | `PointerAxis` | axis (0 vertical, 1 horizontal) | value as `i32` bits |
//! | `Key` | evdev key code | 1 pressed, 0 released |
//! | `Modifiers` | active mask | locked mask |
//! | `Keymap` | format | size |
//! | `RepeatInfo` | rate | delay |
//! | `Configure` | width | height |
//! | `Ping` | serial | 0 |

use std::collections::VecDeque;

use bitflags::bitflags;
use log::warn;

pub mod bridge;

pub use bridge::EventBridge;

pub const BTN_LEFT: u32 = 0x0110;
pub const BTN_RIGHT: u32 = 0x0111;
pub const BTN_MIDDLE: u32 = 0x0112;

pub const KEY_ESCAPE: u32 = 0x0001;
pub const KEY_F1: u32 = 0x003B;

/// Default bound on queued events.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

bitflags! {
    /// Modifier state, in the xkb core modifier mask layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 0x0001;
        const CAPS_LOCK = 0x0002;
        const CONTROL = 0x0004;
        const ALT = 0x0008;
        const NUM_LOCK = 0x0010;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    Pointer,
    Keyboard,
    Configure,
    Lifecycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerEnter,
    PointerLeave,
    PointerMotion,
    PointerButton,
    PointerAxis,
    Keymap,
    KeyboardEnter,
    KeyboardLeave,
    Key,
    Modifiers,
    RepeatInfo,
    Configure,
    Ping,
    Close,
    ConnectionLost,
}

impl EventKind {
    pub fn class(self) -> EventClass {
        match self {
            EventKind::PointerEnter
            | EventKind::PointerLeave
            | EventKind::PointerMotion
            | EventKind::PointerButton
            | EventKind::PointerAxis => EventClass::Pointer,
            EventKind::Keymap
            | EventKind::KeyboardEnter
            | EventKind::KeyboardLeave
            | EventKind::Key
            | EventKind::Modifiers
            | EventKind::RepeatInfo => EventClass::Keyboard,
            EventKind::Configure => EventClass::Configure,
            EventKind::Ping | EventKind::Close | EventKind::ConnectionLost => {
                EventClass::Lifecycle
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    pub kind: EventKind,
    pub a: u32,
    pub b: u32,
}

impl Event {
    pub fn new(kind: EventKind, a: u32, b: u32) -> Self {
        Self { kind, a, b }
    }

    pub fn bare(kind: EventKind) -> Self {
        Self::new(kind, 0, 0)
    }

    pub fn class(&self) -> EventClass {
        self.kind.class()
    }

    /// Press transition of a key or button.
    pub fn is_press(&self) -> bool {
        matches!(self.kind, EventKind::Key | EventKind::PointerButton) && self.b == 1
    }

    pub fn is_key_press(&self, key: u32) -> bool {
        self.kind == EventKind::Key && self.a == key && self.b == 1
    }

    /// Surface-local position for enter/motion events.
    pub fn position(&self) -> Option<(u32, u32)> {
        match self.kind {
            EventKind::PointerEnter | EventKind::PointerMotion => Some((self.a, self.b)),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> Option<Modifiers> {
        (self.kind == EventKind::Modifiers).then(|| Modifiers::from_bits_truncate(self.a))
    }

    pub fn axis_value(&self) -> Option<i32> {
        (self.kind == EventKind::PointerAxis).then_some(self.b as i32)
    }
}

/// Bounded FIFO of events.
///
/// When full, the oldest event is dropped to make room.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
    overflowing: bool,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY)),
            capacity,
            dropped: 0,
            overflowing: false,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
            if !self.overflowing {
                warn!(
                    "⚠️ Event queue full ({} events), dropping oldest",
                    self.capacity
                );
                self.overflowing = true;
            }
        }
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        let event = self.events.pop_front();
        if self.events.len() < self.capacity {
            self.overflowing = false;
        }
        event
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.overflowing = false;
    }
}
