//! Protocol notifications and the handler capability set
//!
//! Backends translate raw protocol traffic into the small value types below
//! and hand them to a [`ProtocolHandler`]. Nothing here carries a proxy or a
//! file descriptor, so notifications stay valid after the object that sent
//! them is gone.
//!
//! # Usage
//!
//! ```no_run
//! use wlpane::backend::BufferId;
//! use wlpane::frame_pacing::FrameToken;
//! use wlpane::protocol::{
//!     KeyboardNotification, PointerNotification, ProtocolHandler, ShellNotification,
//! };
//!
//! struct Printer;
//!
//! impl ProtocolHandler for Printer {
//!     fn on_pointer_event(&mut self, event: PointerNotification) { println!("{event:?}") }
//!     fn on_key_event(&mut self, event: KeyboardNotification) { println!("{event:?}") }
//!     fn on_configure(&mut self, event: ShellNotification) { println!("{event:?}") }
//!     fn on_release(&mut self, buffer: BufferId) { println!("released {buffer}") }
//!     fn on_frame_complete(&mut self, token: FrameToken, _time: u32) { println!("{token:?}") }
//! }
//! ```

use crate::backend::BufferId;
use crate::frame_pacing::FrameToken;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerNotification {
    Enter { x: f64, y: f64 },
    Leave,
    Motion { x: f64, y: f64 },
    Button { button: u32, pressed: bool },
    Axis { axis: u32, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardNotification {
    /// The keymap fd itself is closed by the backend.
    Keymap { format: u32, size: u32 },
    Enter,
    Leave,
    Key { key: u32, pressed: bool },
    Modifiers {
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    },
    RepeatInfo { rate: i32, delay: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellNotification {
    /// A completed (and already acknowledged) configure sequence.
    /// Zero sizes leave the choice to the client.
    Configure { width: i32, height: i32 },
    /// Liveness check; the backend has already answered it.
    Ping { serial: u32 },
    /// The user asked the compositor to close the toplevel.
    Close,
}

/// Any notification a backend may deliver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    Pointer(PointerNotification),
    Keyboard(KeyboardNotification),
    Shell(ShellNotification),
    BufferReleased(BufferId),
    FrameDone { token: FrameToken, time: u32 },
}

impl Notification {
    /// Route this notification to the matching handler method.
    pub fn deliver(self, handler: &mut dyn ProtocolHandler) {
        match self {
            Notification::Pointer(event) => handler.on_pointer_event(event),
            Notification::Keyboard(event) => handler.on_key_event(event),
            Notification::Shell(event) => handler.on_configure(event),
            Notification::BufferReleased(buffer) => handler.on_release(buffer),
            Notification::FrameDone { token, time } => handler.on_frame_complete(token, time),
        }
    }
}

impl From<PointerNotification> for Notification {
    fn from(event: PointerNotification) -> Self {
        Notification::Pointer(event)
    }
}

impl From<KeyboardNotification> for Notification {
    fn from(event: KeyboardNotification) -> Self {
        Notification::Keyboard(event)
    }
}

impl From<ShellNotification> for Notification {
    fn from(event: ShellNotification) -> Self {
        Notification::Shell(event)
    }
}

/// Receiver of translated protocol traffic.
pub trait ProtocolHandler {
    fn on_pointer_event(&mut self, event: PointerNotification);

    fn on_key_event(&mut self, event: KeyboardNotification);

    fn on_configure(&mut self, event: ShellNotification);

    /// The compositor finished reading `buffer`.
    fn on_release(&mut self, buffer: BufferId);

    /// The frame requested with `token` was presented.
    fn on_frame_complete(&mut self, token: FrameToken, time: u32);
}

/// Handler for traffic that arrives while no window exists.
#[derive(Debug, Default)]
pub struct Unrouted {
    pub dropped: usize,
}

impl Unrouted {
    fn note(&mut self, what: &dyn std::fmt::Debug) {
        self.dropped += 1;
        log::trace!("unrouted notification: {:?}", what);
    }
}

impl ProtocolHandler for Unrouted {
    fn on_pointer_event(&mut self, event: PointerNotification) {
        self.note(&event);
    }

    fn on_key_event(&mut self, event: KeyboardNotification) {
        self.note(&event);
    }

    fn on_configure(&mut self, event: ShellNotification) {
        self.note(&event);
    }

    fn on_release(&mut self, buffer: BufferId) {
        self.note(&buffer);
    }

    fn on_frame_complete(&mut self, token: FrameToken, _time: u32) {
        self.note(&token);
    }
}
