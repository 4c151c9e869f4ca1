//! In-process compositor
//!
//! [`HeadlessBackend`] behaves like a small, well-mannered compositor: it
//! advertises a global list, validates pools and buffers against the real
//! backing file, answers toplevel creation with a configure, releases
//! buffers and completes frame callbacks on commit. The paired
//! [`HeadlessControl`] can be moved to another thread to inject input,
//! complete frames on demand, drop the connection, and inspect what the
//! client did.
//!
//! ```no_run
//! use wlpane::backend::{HeadlessBackend, HeadlessOptions};
//! use wlpane::protocol::KeyboardNotification;
//! use wlpane::{Session, Window};
//!
//! let (backend, control) = HeadlessBackend::new(HeadlessOptions::default());
//! let mut session = Session::with_backend(backend)?;
//! let mut window = Window::create(&mut session, 0, 0, 320, 240)?;
//! control.inject(KeyboardNotification::Key { key: 1, pressed: true });
//! while let Some(event) = window.get_event() {
//!     println!("{event:?}");
//! }
//! # Ok::<(), wlpane::PaneError>(())
//! ```

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::os::fd::BorrowedFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use super::{
    Backend, BufferId, BufferLayout, Capability, GlobalInfo, PoolId, ShellRole, SurfaceId,
};
use crate::error::{PaneError, PaneResult};
use crate::frame_pacing::FrameToken;
use crate::protocol::{Notification, ProtocolHandler, ShellNotification};
use crate::shm::BYTES_PER_PIXEL;

/// When the headless compositor hands buffers back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// Right after the commit that presented it (copying compositor)
    Immediate,
    /// When a later commit replaces it on the surface
    #[default]
    OnReplace,
    /// Only through [`HeadlessControl::release_buffer`]
    Never,
}

#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub globals: Vec<GlobalInfo>,
    pub release: ReleaseMode,
    /// Complete frame callbacks as soon as the commit lands
    pub auto_frame_done: bool,
    /// Size sent in the first toplevel configure
    pub initial_configure: (i32, i32),
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            globals: vec![
                GlobalInfo::new(1, "wl_compositor", 4),
                GlobalInfo::new(2, "wl_shm", 1),
                GlobalInfo::new(3, "wl_seat", 5),
                GlobalInfo::new(4, "xdg_wm_base", 2),
            ],
            release: ReleaseMode::default(),
            auto_frame_done: true,
            initial_configure: (0, 0),
        }
    }
}

impl HeadlessOptions {
    pub fn without_global(mut self, interface: &str) -> Self {
        self.globals.retain(|g| g.interface != interface);
        self
    }

    pub fn with_global(mut self, interface: &str, version: u32) -> Self {
        let name = self.globals.iter().map(|g| g.name).max().unwrap_or(0) + 1;
        self.globals.push(GlobalInfo::new(name, interface, version));
        self
    }

    pub fn release_mode(mut self, release: ReleaseMode) -> Self {
        self.release = release;
        self
    }

    /// Frame callbacks fire only through [`HeadlessControl::complete_frames`].
    pub fn manual_frames(mut self) -> Self {
        self.auto_frame_done = false;
        self
    }
}

/// What one `commit` carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub surface: SurfaceId,
    pub buffer: Option<BufferId>,
    pub damage: Option<(i32, i32, i32, i32)>,
    pub frame_requested: bool,
}

#[derive(Debug, Default)]
struct SurfaceRecord {
    role: Option<ShellRole>,
    attached: Option<BufferId>,
    current: Option<BufferId>,
    damage: Option<(i32, i32, i32, i32)>,
    pending_frames: Vec<FrameToken>,
}

#[derive(Debug, Default)]
struct CompositorState {
    globals: Vec<GlobalInfo>,
    bound: Vec<String>,
    pools: HashMap<PoolId, usize>,
    buffers: HashMap<BufferId, (PoolId, BufferLayout)>,
    surfaces: HashMap<SurfaceId, SurfaceRecord>,
    queue: VecDeque<Notification>,
    outstanding_frames: Vec<FrameToken>,
    commits: Vec<CommitRecord>,
    next_id: u32,
    pools_created: usize,
    roundtrips: usize,
    blocking_dispatches: usize,
    disconnect_count: usize,
    lost: Option<String>,
}

impl CompositorState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_alive(&self) -> PaneResult<()> {
        match &self.lost {
            Some(reason) => Err(PaneError::lost(reason.clone())),
            None if self.disconnect_count > 0 => Err(PaneError::lost("disconnected")),
            None => Ok(()),
        }
    }

    fn is_bound(&self, interface: &str) -> bool {
        self.bound.iter().any(|b| b == interface)
    }
}

struct Shared {
    state: Mutex<CompositorState>,
    wake: Condvar,
}

pub struct HeadlessBackend {
    shared: Arc<Shared>,
    options: HeadlessOptions,
}

/// Test-side handle onto a [`HeadlessBackend`].
#[derive(Clone)]
pub struct HeadlessControl {
    shared: Arc<Shared>,
}

impl HeadlessBackend {
    pub fn new(options: HeadlessOptions) -> (Self, HeadlessControl) {
        let state = CompositorState {
            globals: options.globals.clone(),
            ..Default::default()
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            wake: Condvar::new(),
        });
        let control = HeadlessControl {
            shared: Arc::clone(&shared),
        };
        (Self { shared, options }, control)
    }

    fn drain(&self, handler: &mut dyn ProtocolHandler) -> usize {
        let batch: Vec<Notification> = self.shared.state.lock().queue.drain(..).collect();
        let count = batch.len();
        for notification in batch {
            trace!("headless → {:?}", notification);
            notification.deliver(handler);
        }
        count
    }
}

impl Backend for HeadlessBackend {
    fn globals(&self) -> Vec<GlobalInfo> {
        self.shared.state.lock().globals.clone()
    }

    fn bind(&mut self, capability: Capability, global: &GlobalInfo) -> PaneResult<()> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        if !state
            .globals
            .iter()
            .any(|g| g.name == global.name && g.interface == global.interface)
        {
            return Err(PaneError::protocol(format!(
                "bind of unknown global {} ({})",
                global.name, global.interface
            )));
        }
        debug!("headless: bound {} as {:?}", global.interface, capability);
        state.bound.push(global.interface.clone());
        Ok(())
    }

    fn create_pool(&mut self, fd: BorrowedFd<'_>, size: usize) -> PaneResult<PoolId> {
        let file = File::from(
            fd.try_clone_to_owned()
                .map_err(|e| PaneError::protocol(format!("invalid pool fd: {e}")))?,
        );
        let file_len = file
            .metadata()
            .map_err(|e| PaneError::protocol(format!("stat pool fd: {e}")))?
            .len();
        if (file_len as usize) < size || size == 0 {
            return Err(PaneError::protocol(format!(
                "pool of {size} bytes over a {file_len} byte file"
            )));
        }

        let mut state = self.shared.state.lock();
        state.check_alive()?;
        if !state.is_bound("wl_shm") {
            return Err(PaneError::MissingCapability(Capability::SharedMemory));
        }
        let id = PoolId(state.next_id());
        state.pools.insert(id, size);
        state.pools_created += 1;
        Ok(id)
    }

    fn create_buffer(&mut self, pool: PoolId, layout: &BufferLayout) -> PaneResult<BufferId> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        let pool_size = *state
            .pools
            .get(&pool)
            .ok_or_else(|| PaneError::protocol(format!("create_buffer on unknown {pool}")))?;
        if layout.stride < layout.width * BYTES_PER_PIXEL {
            return Err(PaneError::protocol(format!(
                "stride {} too small for width {}",
                layout.stride, layout.width
            )));
        }
        if layout.offset + layout.len() > pool_size {
            return Err(PaneError::protocol(format!(
                "buffer [{}, {}) exceeds {pool} of {pool_size} bytes",
                layout.offset,
                layout.offset + layout.len()
            )));
        }
        let id = BufferId(state.next_id());
        state.buffers.insert(id, (pool, *layout));
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.shared.state.lock().buffers.remove(&buffer).is_none() {
            warn!("headless: destroy of unknown {}", buffer);
        }
    }

    fn destroy_pool(&mut self, pool: PoolId) {
        if self.shared.state.lock().pools.remove(&pool).is_none() {
            warn!("headless: destroy of unknown {}", pool);
        }
    }

    fn create_surface(&mut self) -> PaneResult<SurfaceId> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        if !state.is_bound("wl_compositor") {
            return Err(PaneError::MissingCapability(Capability::Compositor));
        }
        let id = SurfaceId(state.next_id());
        state.surfaces.insert(id, SurfaceRecord::default());
        Ok(id)
    }

    fn assign_toplevel(
        &mut self,
        surface: SurfaceId,
        title: &str,
        _app_id: &str,
    ) -> PaneResult<ShellRole> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        let role = if state.is_bound("xdg_wm_base") {
            ShellRole::XdgToplevel
        } else if state.is_bound("wl_shell") {
            ShellRole::ShellSurface
        } else {
            return Err(PaneError::MissingCapability(Capability::Shell));
        };
        let record = state
            .surfaces
            .get_mut(&surface)
            .ok_or_else(|| PaneError::protocol(format!("role for unknown {surface}")))?;
        if record.role.is_some() {
            return Err(PaneError::protocol(format!("{surface} already has a role")));
        }
        record.role = Some(role);
        if role.awaits_configure() {
            let (width, height) = self.options.initial_configure;
            state
                .queue
                .push_back(ShellNotification::Configure { width, height }.into());
        }
        debug!("headless: {} is now {:?} '{}'", surface, role, title);
        Ok(role)
    }

    fn attach(&mut self, surface: SurfaceId, buffer: Option<BufferId>, _x: i32, _y: i32) {
        if let Some(record) = self.shared.state.lock().surfaces.get_mut(&surface) {
            record.attached = buffer;
        }
    }

    fn damage(&mut self, surface: SurfaceId, x: i32, y: i32, width: i32, height: i32) {
        if let Some(record) = self.shared.state.lock().surfaces.get_mut(&surface) {
            record.damage = Some((x, y, width, height));
        }
    }

    fn request_frame(&mut self, surface: SurfaceId, token: FrameToken) {
        if let Some(record) = self.shared.state.lock().surfaces.get_mut(&surface) {
            record.pending_frames.push(token);
        }
    }

    fn commit(&mut self, surface: SurfaceId) {
        let mut state = self.shared.state.lock();
        let Some(record) = state.surfaces.get_mut(&surface) else {
            warn!("headless: commit on unknown {}", surface);
            return;
        };
        let attached = record.attached.take();
        let damage = record.damage.take();
        let frames: Vec<FrameToken> = record.pending_frames.drain(..).collect();
        let previous = match attached {
            Some(buffer) => record.current.replace(buffer),
            None => None,
        };

        let mut released = Vec::new();
        if let Some(buffer) = attached {
            match self.options.release {
                ReleaseMode::Immediate => released.push(buffer),
                ReleaseMode::OnReplace => {
                    if let Some(old) = previous.filter(|old| *old != buffer) {
                        released.push(old);
                    }
                }
                ReleaseMode::Never => {}
            }
        }

        state.commits.push(CommitRecord {
            surface,
            buffer: attached,
            damage,
            frame_requested: !frames.is_empty(),
        });
        for buffer in released {
            state.queue.push_back(Notification::BufferReleased(buffer));
        }
        if self.options.auto_frame_done {
            let time = state.commits.len() as u32;
            for token in frames {
                state.queue.push_back(Notification::FrameDone { token, time });
            }
        } else {
            state.outstanding_frames.extend(frames);
        }
        drop(state);
        self.shared.wake.notify_all();
    }

    fn destroy_role(&mut self, surface: SurfaceId) {
        if let Some(record) = self.shared.state.lock().surfaces.get_mut(&surface) {
            record.role = None;
        }
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        let mut state = self.shared.state.lock();
        match state.surfaces.remove(&surface) {
            Some(record) if record.role.is_some() => {
                warn!("headless: {} destroyed before its role", surface);
            }
            Some(_) => {}
            None => warn!("headless: destroy of unknown {}", surface),
        }
    }

    fn flush(&mut self) -> PaneResult<()> {
        self.shared.state.lock().check_alive()
    }

    fn roundtrip(&mut self, handler: &mut dyn ProtocolHandler) -> PaneResult<usize> {
        {
            let mut state = self.shared.state.lock();
            state.check_alive()?;
            state.roundtrips += 1;
        }
        Ok(self.drain(handler))
    }

    fn dispatch_pending(&mut self, handler: &mut dyn ProtocolHandler) -> PaneResult<usize> {
        self.shared.state.lock().check_alive()?;
        Ok(self.drain(handler))
    }

    fn blocking_dispatch(
        &mut self,
        handler: &mut dyn ProtocolHandler,
        timeout: Option<Duration>,
    ) -> PaneResult<usize> {
        {
            let mut state = self.shared.state.lock();
            state.blocking_dispatches += 1;
            let deadline = timeout.map(|limit| Instant::now() + limit);
            loop {
                state.check_alive()?;
                if !state.queue.is_empty() {
                    break;
                }
                match (timeout, deadline) {
                    (Some(limit), Some(deadline)) => {
                        if self.shared.wake.wait_until(&mut state, deadline).timed_out()
                            && state.queue.is_empty()
                        {
                            state.check_alive()?;
                            return Err(PaneError::Timeout(limit));
                        }
                    }
                    _ => self.shared.wake.wait(&mut state),
                }
            }
        }
        Ok(self.drain(handler))
    }

    fn disconnect(&mut self) {
        let mut state = self.shared.state.lock();
        state.bound.clear();
        state.disconnect_count += 1;
        drop(state);
        self.shared.wake.notify_all();
    }
}

impl HeadlessControl {
    /// Queue a notification as if the compositor had sent it.
    pub fn inject(&self, notification: impl Into<Notification>) {
        self.shared
            .state
            .lock()
            .queue
            .push_back(notification.into());
        self.shared.wake.notify_all();
    }

    pub fn inject_all<I, N>(&self, notifications: I)
    where
        I: IntoIterator<Item = N>,
        N: Into<Notification>,
    {
        {
            let mut state = self.shared.state.lock();
            state
                .queue
                .extend(notifications.into_iter().map(Into::into));
        }
        self.shared.wake.notify_all();
    }

    /// Fire every outstanding frame callback. Returns how many fired.
    pub fn complete_frames(&self) -> usize {
        let fired = {
            let mut state = self.shared.state.lock();
            let frames: Vec<FrameToken> = state.outstanding_frames.drain(..).collect();
            let time = state.commits.len() as u32;
            for token in &frames {
                state.queue.push_back(Notification::FrameDone {
                    token: *token,
                    time,
                });
            }
            frames.len()
        };
        self.shared.wake.notify_all();
        fired
    }

    pub fn release_buffer(&self, buffer: BufferId) {
        self.inject(Notification::BufferReleased(buffer));
    }

    /// Make every further request fail as if the socket had closed.
    pub fn drop_connection(&self, reason: &str) {
        self.shared.state.lock().lost = Some(reason.to_string());
        self.shared.wake.notify_all();
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        self.shared.state.lock().commits.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.shared.state.lock().commits.len()
    }

    pub fn outstanding_frames(&self) -> usize {
        self.shared.state.lock().outstanding_frames.len()
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn bound_interfaces(&self) -> Vec<String> {
        self.shared.state.lock().bound.clone()
    }

    pub fn live_pools(&self) -> usize {
        self.shared.state.lock().pools.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.shared.state.lock().buffers.len()
    }

    pub fn live_surfaces(&self) -> usize {
        self.shared.state.lock().surfaces.len()
    }

    pub fn pools_created(&self) -> usize {
        self.shared.state.lock().pools_created
    }

    pub fn roundtrips(&self) -> usize {
        self.shared.state.lock().roundtrips
    }

    pub fn blocking_dispatches(&self) -> usize {
        self.shared.state.lock().blocking_dispatches
    }

    pub fn is_disconnected(&self) -> bool {
        self.shared.state.lock().disconnect_count > 0
    }

    pub fn disconnect_count(&self) -> usize {
        self.shared.state.lock().disconnect_count
    }
}
