//! Pollable window
//!
//! A [`Window`] ties one surface to a [`BufferPool`], a [`FramePacer`] and an
//! [`EventQueue`] and exposes the imperative loop an application drives:
//!
//! ```no_run
//! use wlpane::{Session, Window};
//!
//! let mut session = Session::connect(None)?;
//! let mut window = Window::create(&mut session, 0, 0, 800, 600)?;
//! let mut shade = 0u32;
//! while !window.should_close() {
//!     let pixels = window.get_active_buffer()?;
//!     pixels.fill(0xFF00_0000 | shade << 16 | shade << 8 | shade);
//!     window.swap_buffers(true)?;
//!     while let Some(event) = window.get_event() {
//!         println!("{event:?}");
//!     }
//!     shade = (shade + 1) % 0xFF;
//! }
//! window.destroy();
//! session.disconnect();
//! # Ok::<(), wlpane::PaneError>(())
//! ```
//!
//! Protocol traffic is only processed inside window calls: `get_event`
//! dispatches without blocking, `swap_buffers(true)` may block according to
//! the [`PacingPolicy`], and `get_active_buffer` blocks while the compositor
//! still holds the slot it is about to hand out.

use std::time::Duration;

use log::{debug, error, info, trace, warn};

use crate::backend::{Backend, Capability, ShellRole, SurfaceId, WaylandBackend};
use crate::config::PaneConfig;
use crate::error::{PaneError, PaneResult};
use crate::frame_pacing::{FramePacer, PacingPolicy};
use crate::input::{Event, EventBridge, EventKind, EventQueue};
use crate::session::Session;
use crate::shm::{self, BufferPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Pending,
    Blocking,
    RoundTrip,
}

pub struct Window<'s, B: Backend = WaylandBackend> {
    session: &'s mut Session<B>,
    surface: Option<SurfaceId>,
    role: Option<ShellRole>,
    pool: BufferPool,
    pacer: FramePacer,
    events: EventQueue,
    policy: PacingPolicy,
    dispatch_timeout: Option<Duration>,
    should_close: bool,
    configured: bool,
    lost: Option<String>,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    frames_presented: u64,
}

impl<'s, B: Backend> Window<'s, B> {
    /// Create a toplevel window with default settings.
    pub fn create(
        session: &'s mut Session<B>,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> PaneResult<Self> {
        Self::create_with(session, &PaneConfig::default(), x, y, width, height)
    }

    /// Create a toplevel window; returns once the shell handshake is done.
    pub fn create_with(
        session: &'s mut Session<B>,
        config: &PaneConfig,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> PaneResult<Self> {
        config
            .validate()
            .map_err(|e| PaneError::protocol(format!("invalid configuration: {e:#}")))?;
        for capability in [
            Capability::Compositor,
            Capability::SharedMemory,
            Capability::Shell,
        ] {
            session.capability(capability)?;
        }
        let slot_count = config.window.slot_count as usize;
        shm::pool_size(width, height, slot_count)?;

        let pool = BufferPool::create(session, width, height, slot_count)?;
        let surface = match session.backend_mut().create_surface() {
            Ok(surface) => surface,
            Err(e) => {
                pool.destroy(session.backend_mut());
                return Err(e);
            }
        };

        // From here on, Drop tears down whatever was built.
        let mut window = Self {
            session,
            surface: Some(surface),
            role: None,
            pool,
            pacer: FramePacer::new(),
            events: EventQueue::with_capacity(config.events.queue_capacity),
            policy: config.window.pacing,
            dispatch_timeout: config.dispatch_timeout(),
            should_close: false,
            configured: false,
            lost: None,
            x,
            y,
            width,
            height,
            frames_presented: 0,
        };

        let role = window.session.backend_mut().assign_toplevel(
            surface,
            &config.window.title,
            &config.window.app_id,
        )?;
        window.role = Some(role);
        window.session.backend_mut().commit(surface);
        window.dispatch(Dispatch::RoundTrip)?;
        if role.awaits_configure() {
            while !window.configured {
                window.flush()?;
                window.dispatch(Dispatch::Blocking)?;
            }
        }

        if x != 0 || y != 0 {
            debug!("requested position ({}, {}) is up to the compositor", x, y);
        }
        info!(
            "🪟 Window '{}' created: {}x{}, {} slots, {} pacing",
            config.window.title,
            width,
            height,
            slot_count,
            window.policy.as_str()
        );

        Ok(window)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per pixel row of the active buffer.
    pub fn stride(&self) -> u32 {
        self.pool.stride()
    }

    /// Position requested at creation.
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn role(&self) -> Option<ShellRole> {
        self.role
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn should_close(&self) -> bool {
        self.should_close
    }

    pub fn request_close(&mut self) {
        self.should_close = true;
    }

    pub fn pacing(&self) -> PacingPolicy {
        self.policy
    }

    pub fn set_pacing(&mut self, policy: PacingPolicy) {
        self.policy = policy;
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn active_index(&self) -> usize {
        self.pool.active_index()
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    pub fn is_lost(&self) -> bool {
        self.lost.is_some()
    }

    /// Writable pixels of the active slot, row-major, `width` pixels per row.
    ///
    /// Blocks while the compositor still holds that slot.
    pub fn get_active_buffer(&mut self) -> PaneResult<&mut [u32]> {
        self.wait_for_free_slot()?;
        self.pool.active_slot()
    }

    /// Present the active slot and rotate to the next one.
    ///
    /// With `wait_for_sync` the call first paces according to the window's
    /// [`PacingPolicy`]; without it, only pending traffic is processed.
    pub fn swap_buffers(&mut self, wait_for_sync: bool) -> PaneResult<()> {
        self.ensure_alive()?;
        let surface = self
            .surface
            .ok_or_else(|| PaneError::protocol("swap on a destroyed window"))?;

        self.wait_for_free_slot()?;
        if wait_for_sync {
            self.pace()?;
        } else {
            self.dispatch(Dispatch::Pending)?;
            self.pacer.consume_ready();
        }

        let slot = self.pool.active_index();
        let buffer = self.pool.active_buffer();
        let backend = self.session.backend_mut();
        backend.attach(surface, Some(buffer), 0, 0);
        backend.damage(surface, 0, 0, self.width as i32, self.height as i32);
        // Frame requests apply to the next commit, so they go first.
        if self.pacer.is_idle() {
            let token = self.pacer.request_token()?;
            backend.request_frame(surface, token);
        }
        backend.commit(surface);

        self.pool.mark_busy(slot);
        let next = self.pool.advance();
        self.frames_presented += 1;
        trace!("presented slot {} ({}), next slot {}", slot, buffer, next);

        self.flush()
    }

    /// Process pending traffic without blocking, then pop one event.
    pub fn get_event(&mut self) -> Option<Event> {
        if self.lost.is_none() {
            if let Err(e) = self.dispatch(Dispatch::Pending) {
                if !e.is_fatal() {
                    warn!("dispatch failed: {}", e);
                }
            }
        }
        self.events.pop()
    }

    /// Tear down the role, surface and buffers, then release pool memory.
    pub fn destroy(mut self) {
        self.teardown();
    }

    fn pace(&mut self) -> PaneResult<()> {
        match self.policy {
            PacingPolicy::Unpaced => {
                self.dispatch(Dispatch::Pending)?;
            }
            PacingPolicy::BlockingRoundTrip => {
                self.dispatch(Dispatch::RoundTrip)?;
            }
            PacingPolicy::FrameCallbackGated => {
                self.dispatch(Dispatch::Pending)?;
                while self.pacer.is_awaiting() {
                    self.flush()?;
                    self.dispatch(Dispatch::Blocking)?;
                }
            }
        }
        self.pacer.consume_ready();
        Ok(())
    }

    fn wait_for_free_slot(&mut self) -> PaneResult<()> {
        if !self.pool.active_is_busy() {
            return Ok(());
        }
        self.dispatch(Dispatch::Pending)?;
        // A lone slot is reused right away; a compositor that keeps the
        // attached buffer until it is replaced would never hand it back.
        if self.pool.len() == 1 && self.pool.active_is_busy() {
            trace!("reusing the single slot while the compositor holds it");
            self.pool.mark_free(self.pool.active_index());
            return Ok(());
        }
        while self.pool.active_is_busy() {
            trace!("slot {} still held by the compositor", self.pool.active_index());
            self.flush()?;
            self.dispatch(Dispatch::Blocking)?;
        }
        Ok(())
    }

    fn ensure_alive(&self) -> PaneResult<()> {
        match &self.lost {
            Some(reason) => Err(PaneError::lost(reason.clone())),
            None => Ok(()),
        }
    }

    fn dispatch(&mut self, mode: Dispatch) -> PaneResult<usize> {
        self.ensure_alive()?;
        let timeout = self.dispatch_timeout;
        let mut bridge = EventBridge::new(
            &mut self.events,
            &mut self.pool,
            &mut self.pacer,
            &mut self.should_close,
            &mut self.configured,
        );
        let backend = self.session.backend_mut();
        let result = match mode {
            Dispatch::Pending => backend.dispatch_pending(&mut bridge),
            Dispatch::Blocking => backend.blocking_dispatch(&mut bridge, timeout),
            Dispatch::RoundTrip => backend.roundtrip(&mut bridge),
        };
        if let Err(e) = &result {
            self.note_failure(e);
        }
        result
    }

    fn flush(&mut self) -> PaneResult<()> {
        let result = self.session.backend_mut().flush();
        if let Err(e) = &result {
            self.note_failure(e);
        }
        result
    }

    /// Fatal errors are surfaced once as a `ConnectionLost` event.
    fn note_failure(&mut self, err: &PaneError) {
        if !err.is_fatal() || self.lost.is_some() {
            return;
        }
        error!("💥 Compositor connection lost: {}", err);
        self.lost = Some(err.to_string());
        self.should_close = true;
        self.events.push(Event::bare(EventKind::ConnectionLost));
    }

    fn teardown(&mut self) {
        let Some(surface) = self.surface.take() else {
            return;
        };
        self.pacer.cancel();
        let backend = self.session.backend_mut();
        if self.role.take().is_some() {
            backend.destroy_role(surface);
        }
        backend.destroy_surface(surface);
        self.pool.release_handles(backend);
        if let Err(e) = backend.flush() {
            debug!("flush during teardown failed: {}", e);
        }
        self.events.clear();
        info!(
            "🗑️ Window destroyed after {} frames",
            self.frames_presented
        );
    }
}

impl<B: Backend> Drop for Window<'_, B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests;
