//! Compositor backends
//!
//! The [`Backend`] trait is everything the window layer needs from a
//! compositor connection: global enumeration and binding, shared-memory pools
//! and buffers, surfaces with a toplevel role, frame callbacks, and the three
//! dispatch flavours (round trip, non-blocking, blocking).
//!
//! Two implementations ship with the crate:
//! - [`wayland::WaylandBackend`]: a real `wayland-client` connection
//! - [`headless::HeadlessBackend`]: an in-process compositor driven by a
//!   [`headless::HeadlessControl`] handle, used by tests and `--headless` runs
//!
//! Protocol objects are referred to by small typed ids so that the window
//! layer never holds a proxy whose lifetime it cannot see.

use std::fmt;
use std::os::fd::BorrowedFd;
use std::time::Duration;

use crate::error::PaneResult;
use crate::frame_pacing::FrameToken;
use crate::protocol::ProtocolHandler;

pub mod headless;
pub mod wayland;

pub use headless::{HeadlessBackend, HeadlessControl, HeadlessOptions, ReleaseMode};
pub use wayland::WaylandBackend;

macro_rules! object_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

object_id!(PoolId);
object_id!(BufferId);
object_id!(SurfaceId);

/// Well-known globals a session binds once at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Surface factory (`wl_compositor`)
    Compositor,
    /// Shared-memory allocator (`wl_shm`)
    SharedMemory,
    /// Input seat (`wl_seat`)
    Seat,
    /// Shell / surface management (`xdg_wm_base`, or legacy `wl_shell`)
    Shell,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Compositor,
        Capability::SharedMemory,
        Capability::Seat,
        Capability::Shell,
    ];

    /// Interface names that satisfy this capability, most preferred first.
    pub fn interfaces(self) -> &'static [&'static str] {
        match self {
            Capability::Compositor => &["wl_compositor"],
            Capability::SharedMemory => &["wl_shm"],
            Capability::Seat => &["wl_seat"],
            Capability::Shell => &["xdg_wm_base", "wl_shell"],
        }
    }

    /// Highest version of `interface` this crate speaks.
    pub fn max_version(self, interface: &str) -> u32 {
        match (self, interface) {
            (Capability::Compositor, _) => 4,
            (Capability::SharedMemory, _) => 1,
            (Capability::Seat, _) => 5,
            (Capability::Shell, "xdg_wm_base") => 2,
            (Capability::Shell, _) => 1,
        }
    }

    /// Window creation cannot proceed without these.
    pub fn is_required(self) -> bool {
        !matches!(self, Capability::Seat)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interfaces().join("|").as_str())
    }
}

/// One entry of the server's global list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalInfo {
    pub name: u32,
    pub interface: String,
    pub version: u32,
}

impl GlobalInfo {
    pub fn new(name: u32, interface: impl Into<String>, version: u32) -> Self {
        Self {
            name,
            interface: interface.into(),
            version,
        }
    }
}

/// Placement of one framebuffer inside a shared-memory pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    pub offset: usize,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl BufferLayout {
    pub fn len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which shell role a surface ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellRole {
    /// xdg toplevel: must see a configure before the first buffer commit
    XdgToplevel,
    /// legacy wl_shell surface: mapped on commit, no configure handshake
    ShellSurface,
}

impl ShellRole {
    pub fn awaits_configure(self) -> bool {
        matches!(self, ShellRole::XdgToplevel)
    }
}

/// The compositor-facing collaborator.
///
/// Every dispatch method delivers notifications to `handler` in the order the
/// transport produced them and returns how many were delivered.
pub trait Backend {
    /// Globals advertised by the server, as of the last round trip.
    fn globals(&self) -> Vec<GlobalInfo>;

    fn bind(&mut self, capability: Capability, global: &GlobalInfo) -> PaneResult<()>;

    /// Register `size` bytes of `fd` with the shared-memory allocator.
    fn create_pool(&mut self, fd: BorrowedFd<'_>, size: usize) -> PaneResult<PoolId>;

    /// Carve an XRGB8888 buffer out of `pool`.
    fn create_buffer(&mut self, pool: PoolId, layout: &BufferLayout) -> PaneResult<BufferId>;

    fn destroy_buffer(&mut self, buffer: BufferId);

    fn destroy_pool(&mut self, pool: PoolId);

    fn create_surface(&mut self) -> PaneResult<SurfaceId>;

    fn assign_toplevel(
        &mut self,
        surface: SurfaceId,
        title: &str,
        app_id: &str,
    ) -> PaneResult<ShellRole>;

    fn attach(&mut self, surface: SurfaceId, buffer: Option<BufferId>, x: i32, y: i32);

    fn damage(&mut self, surface: SurfaceId, x: i32, y: i32, width: i32, height: i32);

    /// Ask for a completion signal tied to the next commit of `surface`.
    fn request_frame(&mut self, surface: SurfaceId, token: FrameToken);

    fn commit(&mut self, surface: SurfaceId);

    /// Destroy the shell role objects of `surface`, leaving the surface itself.
    fn destroy_role(&mut self, surface: SurfaceId);

    fn destroy_surface(&mut self, surface: SurfaceId);

    fn flush(&mut self) -> PaneResult<()>;

    /// Block until the server has processed every request sent so far.
    fn roundtrip(&mut self, handler: &mut dyn ProtocolHandler) -> PaneResult<usize>;

    /// Deliver whatever is already available without blocking.
    fn dispatch_pending(&mut self, handler: &mut dyn ProtocolHandler) -> PaneResult<usize>;

    /// Block until at least one notification arrives, or `timeout` expires.
    fn blocking_dispatch(
        &mut self,
        handler: &mut dyn ProtocolHandler,
        timeout: Option<Duration>,
    ) -> PaneResult<usize>;

    /// Release every bound global and close the connection.
    fn disconnect(&mut self);
}
