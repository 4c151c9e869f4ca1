//! `wayland-client` backend
//!
//! Speaks the core protocol plus xdg-shell (with a legacy `wl_shell`
//! fallback) over a single event queue. Proxies never leave this module:
//! the window layer sees [`PoolId`]s, [`BufferId`]s and [`SurfaceId`]s, and
//! receives traffic as [`Notification`]s once each dispatch has finished.
//!
//! Requests that expect an answer inside the protocol (ping/pong, configure
//! acknowledgement) are handled here so a slow application loop can never
//! get the client disconnected.

use std::collections::{HashMap, VecDeque};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use wayland_client::backend::WaylandError;
use wayland_client::globals::{registry_queue_init, GlobalList, GlobalListContents};
use wayland_client::protocol::{
    wl_buffer::{self, WlBuffer},
    wl_callback::{self, WlCallback},
    wl_compositor::WlCompositor,
    wl_keyboard::{self, WlKeyboard},
    wl_pointer::{self, WlPointer},
    wl_registry::{self, WlRegistry},
    wl_seat::{self, WlSeat},
    wl_shell::WlShell,
    wl_shell_surface::{self, WlShellSurface},
    wl_shm::{self, WlShm},
    wl_shm_pool::WlShmPool,
    wl_surface::WlSurface,
};
use wayland_client::{
    Connection, Dispatch, DispatchError, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

use super::{
    Backend, BufferId, BufferLayout, Capability, GlobalInfo, PoolId, ShellRole, SurfaceId,
};
use crate::error::{PaneError, PaneResult};
use crate::frame_pacing::FrameToken;
use crate::protocol::{
    KeyboardNotification, Notification, PointerNotification, ProtocolHandler, ShellNotification,
};

/// First `wl_surface` version with `damage_buffer`.
const DAMAGE_BUFFER_SINCE: u32 = 4;
/// First `wl_pointer` / `wl_keyboard` version with `release`.
const INPUT_RELEASE_SINCE: u32 = 3;
/// First `wl_seat` version with `release`.
const SEAT_RELEASE_SINCE: u32 = 5;

enum Role {
    Xdg {
        surface: XdgSurface,
        toplevel: XdgToplevel,
    },
    Legacy(WlShellSurface),
}

struct SurfaceEntry {
    surface: WlSurface,
    role: Option<Role>,
    /// Size from the latest toplevel configure, reported once the
    /// surface configure closes the sequence.
    pending_size: (i32, i32),
}

/// Dispatch target: bound globals plus notifications collected during the
/// current dispatch.
#[derive(Default)]
struct ProtocolState {
    compositor: Option<WlCompositor>,
    shm: Option<WlShm>,
    seat: Option<WlSeat>,
    wm_base: Option<XdgWmBase>,
    shell: Option<WlShell>,
    pointer: Option<WlPointer>,
    keyboard: Option<WlKeyboard>,
    surfaces: HashMap<SurfaceId, SurfaceEntry>,
    pending: VecDeque<Notification>,
}

impl ProtocolState {
    fn push(&mut self, notification: impl Into<Notification>) {
        self.pending.push_back(notification.into());
    }
}

pub struct WaylandBackend {
    conn: Connection,
    queue: EventQueue<ProtocolState>,
    qh: QueueHandle<ProtocolState>,
    globals: GlobalList,
    state: ProtocolState,
    pools: HashMap<PoolId, WlShmPool>,
    buffers: HashMap<BufferId, WlBuffer>,
    next_id: u32,
    disconnected: bool,
}

impl WaylandBackend {
    /// Open a connection.
    ///
    /// `None` follows `$WAYLAND_DISPLAY`, a bare name is looked up under
    /// `$XDG_RUNTIME_DIR`, and an absolute path is used as the socket.
    pub fn connect(target: Option<&str>) -> PaneResult<Self> {
        let conn = match target {
            None => Connection::connect_to_env()
                .map_err(|e| PaneError::connection(e.to_string()))?,
            Some(target) => {
                let path = socket_path(target)?;
                debug!("connecting to {}", path.display());
                let stream = UnixStream::connect(&path)
                    .map_err(|e| PaneError::connection(format!("{}: {e}", path.display())))?;
                Connection::from_socket(stream)
                    .map_err(|e| PaneError::connection(e.to_string()))?
            }
        };

        let (globals, queue) = registry_queue_init::<ProtocolState>(&conn)
            .map_err(|e| PaneError::connection(e.to_string()))?;
        let qh = queue.handle();
        info!(
            "🔌 Connected to {}",
            target.unwrap_or("$WAYLAND_DISPLAY")
        );

        Ok(Self {
            conn,
            queue,
            qh,
            globals,
            state: ProtocolState::default(),
            pools: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 0,
            disconnected: false,
        })
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn registry(&self) -> &WlRegistry {
        self.globals.registry()
    }

    fn check_alive(&self) -> PaneResult<()> {
        if self.disconnected {
            return Err(PaneError::lost("disconnected"));
        }
        match self.conn.protocol_error() {
            Some(err) => Err(PaneError::lost(format!(
                "protocol error {} on {}@{}: {}",
                err.code, err.object_interface, err.object_id, err.message
            ))),
            None => Ok(()),
        }
    }

    /// Hand collected notifications to `handler`, oldest first.
    fn deliver(&mut self, handler: &mut dyn ProtocolHandler) -> usize {
        let mut count = 0;
        while let Some(notification) = self.state.pending.pop_front() {
            trace!("wayland → {:?}", notification);
            notification.deliver(handler);
            count += 1;
        }
        count
    }

    fn dispatch_queued(&mut self) -> PaneResult<()> {
        self.queue
            .dispatch_pending(&mut self.state)
            .map(|_| ())
            .map_err(dispatch_error)
    }

    /// Read from the socket if it becomes readable within `timeout`
    /// (`None` waits indefinitely). Returns false on timeout.
    fn read_socket(&mut self, timeout: Option<Duration>) -> PaneResult<bool> {
        let Some(guard) = self.queue.prepare_read() else {
            // Events are already queued; nothing to read.
            return Ok(true);
        };
        if !poll_readable(guard.connection_fd(), timeout)? {
            return Ok(false);
        }
        match guard.read() {
            Ok(_) => Ok(true),
            Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(true),
            Err(e) => Err(PaneError::lost(e.to_string())),
        }
    }
}

impl Backend for WaylandBackend {
    fn globals(&self) -> Vec<GlobalInfo> {
        self.globals
            .contents()
            .clone_list()
            .into_iter()
            .map(|g| GlobalInfo::new(g.name, g.interface, g.version))
            .collect()
    }

    fn bind(&mut self, capability: Capability, global: &GlobalInfo) -> PaneResult<()> {
        self.check_alive()?;
        let registry = self.registry().clone();
        let (name, version) = (global.name, global.version);
        let qh = &self.qh;
        match (capability, global.interface.as_str()) {
            (Capability::Compositor, _) => {
                self.state.compositor = Some(registry.bind(name, version, qh, ()));
            }
            (Capability::SharedMemory, _) => {
                self.state.shm = Some(registry.bind(name, version, qh, ()));
            }
            (Capability::Seat, _) => {
                self.state.seat = Some(registry.bind(name, version, qh, ()));
            }
            (Capability::Shell, "xdg_wm_base") => {
                self.state.wm_base = Some(registry.bind(name, version, qh, ()));
            }
            (Capability::Shell, "wl_shell") => {
                self.state.shell = Some(registry.bind(name, version, qh, ()));
            }
            (capability, interface) => {
                return Err(PaneError::protocol(format!(
                    "{interface} cannot provide {capability}"
                )));
            }
        }
        debug!("bound {} v{} (global {})", global.interface, version, name);
        Ok(())
    }

    fn create_pool(&mut self, fd: BorrowedFd<'_>, size: usize) -> PaneResult<PoolId> {
        self.check_alive()?;
        let shm = self
            .state
            .shm
            .as_ref()
            .ok_or(PaneError::MissingCapability(Capability::SharedMemory))?;
        let size = i32::try_from(size)
            .map_err(|_| PaneError::allocation(format!("pool of {size} bytes is too large")))?;
        let pool = shm.create_pool(fd, size, &self.qh, ());
        let id = PoolId(self.next_id());
        self.pools.insert(id, pool);
        Ok(id)
    }

    fn create_buffer(&mut self, pool: PoolId, layout: &BufferLayout) -> PaneResult<BufferId> {
        self.check_alive()?;
        let offset = i32::try_from(layout.offset)
            .map_err(|_| PaneError::allocation(format!("offset {} out of range", layout.offset)))?;
        let id = BufferId(self.next_id());
        let wl_pool = self
            .pools
            .get(&pool)
            .ok_or_else(|| PaneError::protocol(format!("create_buffer on unknown {pool}")))?;
        let buffer = wl_pool.create_buffer(
            offset,
            layout.width as i32,
            layout.height as i32,
            layout.stride as i32,
            wl_shm::Format::Xrgb8888,
            &self.qh,
            id,
        );
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        match self.buffers.remove(&buffer) {
            Some(wl_buffer) => wl_buffer.destroy(),
            None => warn!("destroy of unknown {}", buffer),
        }
    }

    fn destroy_pool(&mut self, pool: PoolId) {
        match self.pools.remove(&pool) {
            Some(wl_pool) => wl_pool.destroy(),
            None => warn!("destroy of unknown {}", pool),
        }
    }

    fn create_surface(&mut self) -> PaneResult<SurfaceId> {
        self.check_alive()?;
        let compositor = self
            .state
            .compositor
            .as_ref()
            .ok_or(PaneError::MissingCapability(Capability::Compositor))?;
        let surface = compositor.create_surface(&self.qh, ());
        let id = SurfaceId(self.next_id());
        self.state.surfaces.insert(
            id,
            SurfaceEntry {
                surface,
                role: None,
                pending_size: (0, 0),
            },
        );
        Ok(id)
    }

    fn assign_toplevel(
        &mut self,
        surface: SurfaceId,
        title: &str,
        app_id: &str,
    ) -> PaneResult<ShellRole> {
        self.check_alive()?;
        let state = &mut self.state;
        let entry = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| PaneError::protocol(format!("role for unknown {surface}")))?;
        if entry.role.is_some() {
            return Err(PaneError::protocol(format!("{surface} already has a role")));
        }

        let (role, kind) = if let Some(wm_base) = &state.wm_base {
            let xdg = wm_base.get_xdg_surface(&entry.surface, &self.qh, surface);
            let toplevel = xdg.get_toplevel(&self.qh, surface);
            toplevel.set_title(title.to_string());
            toplevel.set_app_id(app_id.to_string());
            (
                Role::Xdg {
                    surface: xdg,
                    toplevel,
                },
                ShellRole::XdgToplevel,
            )
        } else if let Some(shell) = &state.shell {
            let shell_surface = shell.get_shell_surface(&entry.surface, &self.qh, surface);
            shell_surface.set_toplevel();
            shell_surface.set_title(title.to_string());
            shell_surface.set_class(app_id.to_string());
            (Role::Legacy(shell_surface), ShellRole::ShellSurface)
        } else {
            return Err(PaneError::MissingCapability(Capability::Shell));
        };

        entry.role = Some(role);
        debug!("{} is now {:?} '{}'", surface, kind, title);
        Ok(kind)
    }

    fn attach(&mut self, surface: SurfaceId, buffer: Option<BufferId>, x: i32, y: i32) {
        let Some(entry) = self.state.surfaces.get(&surface) else {
            warn!("attach on unknown {}", surface);
            return;
        };
        let wl_buffer = buffer.and_then(|id| self.buffers.get(&id));
        entry.surface.attach(wl_buffer, x, y);
    }

    fn damage(&mut self, surface: SurfaceId, x: i32, y: i32, width: i32, height: i32) {
        if let Some(entry) = self.state.surfaces.get(&surface) {
            // Buffer and surface coordinates coincide at scale 1.
            if entry.surface.version() >= DAMAGE_BUFFER_SINCE {
                entry.surface.damage_buffer(x, y, width, height);
            } else {
                entry.surface.damage(x, y, width, height);
            }
        }
    }

    fn request_frame(&mut self, surface: SurfaceId, token: FrameToken) {
        if let Some(entry) = self.state.surfaces.get(&surface) {
            let _callback = entry.surface.frame(&self.qh, token);
        }
    }

    fn commit(&mut self, surface: SurfaceId) {
        match self.state.surfaces.get(&surface) {
            Some(entry) => entry.surface.commit(),
            None => warn!("commit on unknown {}", surface),
        }
    }

    fn destroy_role(&mut self, surface: SurfaceId) {
        let Some(entry) = self.state.surfaces.get_mut(&surface) else {
            return;
        };
        match entry.role.take() {
            Some(Role::Xdg {
                surface: xdg,
                toplevel,
            }) => {
                toplevel.destroy();
                xdg.destroy();
            }
            // wl_shell_surface has no destructor; it dies with its surface.
            Some(Role::Legacy(_)) | None => {}
        }
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        match self.state.surfaces.remove(&surface) {
            Some(entry) => {
                if entry.role.is_some() {
                    warn!("{} destroyed before its role", surface);
                }
                entry.surface.destroy();
            }
            None => warn!("destroy of unknown {}", surface),
        }
    }

    fn flush(&mut self) -> PaneResult<()> {
        self.check_alive()?;
        match self.conn.flush() {
            Ok(()) => Ok(()),
            // The rest stays buffered for the next flush.
            Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(PaneError::lost(e.to_string())),
        }
    }

    fn roundtrip(&mut self, handler: &mut dyn ProtocolHandler) -> PaneResult<usize> {
        self.check_alive()?;
        self.queue
            .roundtrip(&mut self.state)
            .map_err(dispatch_error)?;
        Ok(self.deliver(handler))
    }

    fn dispatch_pending(&mut self, handler: &mut dyn ProtocolHandler) -> PaneResult<usize> {
        self.flush()?;
        self.read_socket(Some(Duration::ZERO))?;
        self.dispatch_queued()?;
        Ok(self.deliver(handler))
    }

    fn blocking_dispatch(
        &mut self,
        handler: &mut dyn ProtocolHandler,
        timeout: Option<Duration>,
    ) -> PaneResult<usize> {
        self.flush()?;
        let deadline = timeout.map(|limit| Instant::now() + limit);
        self.dispatch_queued()?;
        while self.state.pending.is_empty() {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining == Some(Duration::ZERO) || !self.read_socket(remaining)? {
                if let Some(limit) = timeout {
                    return Err(PaneError::Timeout(limit));
                }
                continue;
            }
            self.dispatch_queued()?;
            self.check_alive()?;
        }
        Ok(self.deliver(handler))
    }

    fn disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        let state = &mut self.state;
        if let Some(pointer) = state.pointer.take() {
            if pointer.version() >= INPUT_RELEASE_SINCE {
                pointer.release();
            }
        }
        if let Some(keyboard) = state.keyboard.take() {
            if keyboard.version() >= INPUT_RELEASE_SINCE {
                keyboard.release();
            }
        }
        if let Some(seat) = state.seat.take() {
            if seat.version() >= SEAT_RELEASE_SINCE {
                seat.release();
            }
        }
        if let Some(wm_base) = state.wm_base.take() {
            wm_base.destroy();
        }
        state.shell = None;
        state.shm = None;
        state.compositor = None;
        state.pending.clear();
        if let Err(e) = self.conn.flush() {
            debug!("flush during disconnect failed: {}", e);
        }
        self.disconnected = true;
    }
}

fn socket_path(target: &str) -> PaneResult<PathBuf> {
    let path = PathBuf::from(target);
    if path.is_absolute() {
        return Ok(path);
    }
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
        .ok_or_else(|| PaneError::connection("XDG_RUNTIME_DIR is not set"))?;
    Ok(PathBuf::from(runtime_dir).join(path))
}

fn poll_readable(fd: BorrowedFd<'_>, timeout: Option<Duration>) -> PaneResult<bool> {
    let deadline = timeout.map(|limit| Instant::now() + limit);
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        let timeout_ms = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                // Round up so a sub-millisecond remainder still waits.
                remaining.as_micros().div_ceil(1000).min(i32::MAX as u128) as i32
            }
            None => -1,
        };

        // SAFETY: `pfd` is a valid pollfd and the count matches.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                trace!("poll interrupted, retrying");
                continue;
            }
            return Err(PaneError::lost(format!("poll: {err}")));
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 && pfd.revents & libc::POLLIN == 0 {
            return Err(PaneError::lost("compositor hung up"));
        }
        return Ok(rc > 0 && pfd.revents & libc::POLLIN != 0);
    }
}

fn dispatch_error(err: DispatchError) -> PaneError {
    match err {
        DispatchError::BadMessage {
            sender_id,
            interface,
            opcode,
        } => PaneError::protocol(format!(
            "malformed message from {interface}@{sender_id} (opcode {opcode})"
        )),
        DispatchError::Backend(e) => PaneError::lost(e.to_string()),
    }
}

fn wenum_raw<T: Into<u32>>(value: WEnum<T>) -> u32 {
    match value {
        WEnum::Value(v) => v.into(),
        WEnum::Unknown(raw) => raw,
    }
}

fn surface_id_of(state: &ProtocolState, surface: &WlSurface) -> Option<SurfaceId> {
    state
        .surfaces
        .iter()
        .find(|(_, entry)| entry.surface == *surface)
        .map(|(id, _)| *id)
}

impl Dispatch<WlRegistry, GlobalListContents> for ProtocolState {
    fn event(
        _state: &mut Self,
        _proxy: &WlRegistry,
        event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name, interface, ..
            } => trace!("global {} announced: {}", name, interface),
            wl_registry::Event::GlobalRemove { name } => debug!("global {} removed", name),
            _ => {}
        }
    }
}

impl Dispatch<WlSeat, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        } = event
        {
            if capabilities.contains(wl_seat::Capability::Pointer) && state.pointer.is_none() {
                state.pointer = Some(seat.get_pointer(qh, ()));
                debug!("🖱️ Pointer available");
            }
            if capabilities.contains(wl_seat::Capability::Keyboard) && state.keyboard.is_none() {
                state.keyboard = Some(seat.get_keyboard(qh, ()));
                debug!("⌨️ Keyboard available");
            }
        }
    }
}

impl Dispatch<WlPointer, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        _proxy: &WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let notification = match event {
            wl_pointer::Event::Enter {
                surface_x,
                surface_y,
                ..
            } => PointerNotification::Enter {
                x: surface_x,
                y: surface_y,
            },
            wl_pointer::Event::Leave { .. } => PointerNotification::Leave,
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => PointerNotification::Motion {
                x: surface_x,
                y: surface_y,
            },
            wl_pointer::Event::Button {
                button,
                state: button_state,
                ..
            } => PointerNotification::Button {
                button,
                pressed: matches!(button_state, WEnum::Value(wl_pointer::ButtonState::Pressed)),
            },
            wl_pointer::Event::Axis { axis, value, .. } => PointerNotification::Axis {
                axis: wenum_raw(axis),
                value,
            },
            _ => return,
        };
        state.push(notification);
    }
}

impl Dispatch<WlKeyboard, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        _proxy: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let notification = match event {
            // The keymap fd closes when the event is dropped.
            wl_keyboard::Event::Keymap { format, fd: _, size } => KeyboardNotification::Keymap {
                format: wenum_raw(format),
                size,
            },
            wl_keyboard::Event::Enter { .. } => KeyboardNotification::Enter,
            wl_keyboard::Event::Leave { .. } => KeyboardNotification::Leave,
            wl_keyboard::Event::Key {
                key,
                state: key_state,
                ..
            } => KeyboardNotification::Key {
                key,
                pressed: matches!(key_state, WEnum::Value(wl_keyboard::KeyState::Pressed)),
            },
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => KeyboardNotification::Modifiers {
                depressed: mods_depressed,
                latched: mods_latched,
                locked: mods_locked,
                group,
            },
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                KeyboardNotification::RepeatInfo { rate, delay }
            }
            _ => return,
        };
        state.push(notification);
    }
}

impl Dispatch<XdgWmBase, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        wm_base: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
            state.push(ShellNotification::Ping { serial });
        }
    }
}

impl Dispatch<XdgSurface, SurfaceId> for ProtocolState {
    fn event(
        state: &mut Self,
        xdg: &XdgSurface,
        event: xdg_surface::Event,
        surface: &SurfaceId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg.ack_configure(serial);
            let (width, height) = state
                .surfaces
                .get(surface)
                .map(|entry| entry.pending_size)
                .unwrap_or_default();
            trace!("{} configured to {}x{} (serial {})", surface, width, height, serial);
            state.push(ShellNotification::Configure { width, height });
        }
    }
}

impl Dispatch<XdgToplevel, SurfaceId> for ProtocolState {
    fn event(
        state: &mut Self,
        _proxy: &XdgToplevel,
        event: xdg_toplevel::Event,
        surface: &SurfaceId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                if let Some(entry) = state.surfaces.get_mut(surface) {
                    entry.pending_size = (width, height);
                }
            }
            xdg_toplevel::Event::Close => state.push(ShellNotification::Close),
            _ => {}
        }
    }
}

impl Dispatch<WlShellSurface, SurfaceId> for ProtocolState {
    fn event(
        state: &mut Self,
        shell_surface: &WlShellSurface,
        event: wl_shell_surface::Event,
        _surface: &SurfaceId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_shell_surface::Event::Ping { serial } => {
                shell_surface.pong(serial);
                state.push(ShellNotification::Ping { serial });
            }
            wl_shell_surface::Event::Configure { width, height, .. } => {
                state.push(ShellNotification::Configure { width, height });
            }
            _ => {}
        }
    }
}

impl Dispatch<WlSurface, ()> for ProtocolState {
    fn event(
        state: &mut Self,
        surface: &WlSurface,
        event: <WlSurface as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let Some(id) = surface_id_of(state, surface) {
            trace!("{} output change: {:?}", id, event);
        }
    }
}

impl Dispatch<WlBuffer, BufferId> for ProtocolState {
    fn event(
        state: &mut Self,
        _proxy: &WlBuffer,
        event: wl_buffer::Event,
        buffer: &BufferId,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            state.push(Notification::BufferReleased(*buffer));
        }
    }
}

impl Dispatch<WlCallback, FrameToken> for ProtocolState {
    fn event(
        state: &mut Self,
        _proxy: &WlCallback,
        event: wl_callback::Event,
        token: &FrameToken,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { callback_data } = event {
            state.push(Notification::FrameDone {
                token: *token,
                time: callback_data,
            });
        }
    }
}

wayland_client::delegate_noop!(ProtocolState: ignore WlCompositor);
wayland_client::delegate_noop!(ProtocolState: ignore WlShm);
wayland_client::delegate_noop!(ProtocolState: ignore WlShmPool);
wayland_client::delegate_noop!(ProtocolState: ignore WlShell);
