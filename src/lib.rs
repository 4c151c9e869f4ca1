//! # wlpane
//!
//! A pollable software framebuffer window for Wayland: connect, get a block
//! of pixels, draw into it, swap, and drain input events, all from a plain
//! loop with no callbacks on the application side.
//!
//! ## Architecture
//!
//! wlpane is built from small layers:
//! - `session`: connection and capability negotiation
//! - `shm`: shared-memory buffer pool and slot rotation
//! - `frame_pacing`: frame-callback bookkeeping and pacing policies
//! - `protocol`: backend-neutral notifications and the handler trait
//! - `input`: application events, the bounded event queue and the bridge
//!   that translates notifications into events
//! - `window`: the pollable window tying the above together
//! - `backend`: the compositor connection (real Wayland or in-process)
//! - `config`: TOML configuration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wlpane::{Session, Window};
//!
//! fn main() -> wlpane::PaneResult<()> {
//!     let mut session = Session::connect(None)?;
//!     let mut window = Window::create(&mut session, 0, 0, 640, 480)?;
//!     while !window.should_close() {
//!         window.get_active_buffer()?.fill(0xFF20_2020);
//!         window.swap_buffers(true)?;
//!         while let Some(_event) = window.get_event() {}
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod frame_pacing;
pub mod input;
pub mod protocol;
pub mod session;
pub mod shm;
pub mod window;

// Re-export main types for easy access
pub use backend::{Backend, Capability, HeadlessBackend, HeadlessControl, WaylandBackend};
pub use config::PaneConfig;
pub use error::{PaneError, PaneResult};
pub use frame_pacing::{FramePacer, PacingPolicy};
pub use input::{Event, EventClass, EventKind, EventQueue, Modifiers};
pub use session::Session;
pub use shm::BufferPool;
pub use window::Window;

/// Version information for wlpane
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
