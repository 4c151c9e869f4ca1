//! Frame pacing
//!
//! Gates buffer swaps on the compositor's frame-completion signal so the
//! application never produces frames faster than the compositor consumes them.
//!
//! # States
//!
//! ```text
//!            request_token()               on_completion_signal()
//!   ┌──────┐ ───────────────► ┌────────────────────┐ ──────────────► ┌───────┐
//!   │ Idle │                  │ AwaitingCompletion │                 │ Ready │
//!   └──────┘ ◄─────────────────────────────────────────────────────── └───────┘
//!                               consume_ready()
//! ```
//!
//! At most one [`FrameToken`] is outstanding at any time. A completion for a
//! token that is no longer outstanding (cancelled by teardown) is ignored.

use std::str::FromStr;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::{PaneError, PaneResult};

/// How `swap_buffers(wait_for_sync = true)` paces the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PacingPolicy {
    /// Never wait; pending traffic is dispatched without blocking.
    Unpaced,
    /// Wait for a full round trip with the compositor before presenting.
    BlockingRoundTrip,
    /// Wait for the previous frame's completion signal.
    #[default]
    FrameCallbackGated,
}

impl PacingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacingPolicy::Unpaced => "unpaced",
            PacingPolicy::BlockingRoundTrip => "blocking-round-trip",
            PacingPolicy::FrameCallbackGated => "frame-callback-gated",
        }
    }
}

impl FromStr for PacingPolicy {
    type Err = PaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unpaced" | "none" => Ok(PacingPolicy::Unpaced),
            "blocking-round-trip" | "roundtrip" => Ok(PacingPolicy::BlockingRoundTrip),
            "frame-callback-gated" | "frame" | "vsync" => Ok(PacingPolicy::FrameCallbackGated),
            other => Err(PaneError::protocol(format!("unknown pacing policy '{other}'"))),
        }
    }
}

/// An outstanding "tell me when this frame is consumed" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken {
    serial: u64,
}

impl FrameToken {
    pub fn new(serial: u64) -> Self {
        Self { serial }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    Idle,
    AwaitingCompletion(FrameToken),
    Ready,
}

/// Frame-completion gate for one surface.
#[derive(Debug)]
pub struct FramePacer {
    state: PacerState,
    next_serial: u64,
    /// Frames presented with a completion signal
    completed: u64,
    /// Completions that arrived for a token we no longer track
    stale: u64,
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePacer {
    pub fn new() -> Self {
        Self {
            state: PacerState::Idle,
            next_serial: 1,
            completed: 0,
            stale: 0,
        }
    }

    pub fn state(&self) -> PacerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PacerState::Idle
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, PacerState::AwaitingCompletion(_))
    }

    pub fn completed_frames(&self) -> u64 {
        self.completed
    }

    pub fn stale_signals(&self) -> u64 {
        self.stale
    }

    /// Hand out a new token. Only valid from `Idle`.
    pub fn request_token(&mut self) -> PaneResult<FrameToken> {
        match self.state {
            PacerState::Idle => {
                let token = FrameToken::new(self.next_serial);
                self.next_serial += 1;
                self.state = PacerState::AwaitingCompletion(token);
                trace!("frame token {} requested", token.serial);
                Ok(token)
            }
            PacerState::AwaitingCompletion(token) => Err(PaneError::protocol(format!(
                "frame token {} is still outstanding",
                token.serial
            ))),
            PacerState::Ready => Err(PaneError::protocol(
                "previous frame completion has not been consumed",
            )),
        }
    }

    /// Completion signal for `token` arrived from the compositor.
    pub fn on_completion_signal(&mut self, token: FrameToken) {
        match self.state {
            PacerState::AwaitingCompletion(outstanding) if outstanding == token => {
                self.state = PacerState::Ready;
                self.completed += 1;
            }
            _ => {
                self.stale += 1;
                debug!(
                    "ignoring completion for frame token {} in state {:?}",
                    token.serial, self.state
                );
            }
        }
    }

    /// `Ready -> Idle`, exactly once per completion.
    pub fn consume_ready(&mut self) -> bool {
        if self.state == PacerState::Ready {
            self.state = PacerState::Idle;
            true
        } else {
            false
        }
    }

    /// Forget any outstanding token; a late completion becomes stale.
    pub fn cancel(&mut self) {
        if let PacerState::AwaitingCompletion(token) = self.state {
            debug!("cancelling frame token {}", token.serial);
        }
        self.state = PacerState::Idle;
    }
}
