//! Configuration management for wlpane
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files: which display to connect to, how windows are created,
//! how swaps are paced and how long blocking dispatches may wait.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::frame_pacing::PacingPolicy;
use crate::input::DEFAULT_QUEUE_CAPACITY;
use crate::shm::MAX_SLOTS;

/// Main configuration struct containing all wlpane settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PaneConfig {
    /// Compositor connection
    #[serde(default)]
    pub session: SessionConfig,

    /// Window creation and presentation
    #[serde(default)]
    pub window: WindowConfig,

    /// Application event queue
    #[serde(default)]
    pub events: EventConfig,

    /// Blocking dispatch behaviour
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Display socket name or absolute path (None = $WAYLAND_DISPLAY)
    pub display: Option<String>,
}

/// Window configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Toplevel title
    pub title: String,

    /// Toplevel application id
    pub app_id: String,

    /// Number of framebuffers (1 = single, 2 = double buffering)
    pub slot_count: u8,

    /// Swap pacing when `wait_for_sync` is requested
    pub pacing: PacingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventConfig {
    /// Events kept before the oldest are dropped
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Give up on a blocking dispatch after this many milliseconds (None = wait forever)
    pub timeout_ms: Option<u64>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "wlpane".to_string(),
            app_id: "wlpane".to_string(),
            slot_count: 2,
            pacing: PacingPolicy::default(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PaneConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: PaneConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let slots = self.window.slot_count as usize;
        if slots == 0 || slots > MAX_SLOTS {
            anyhow::bail!("Invalid slot_count: must be between 1 and {}", MAX_SLOTS);
        }

        if self.events.queue_capacity == 0 {
            anyhow::bail!("Invalid queue_capacity: must be greater than 0");
        }

        if self.dispatch.timeout_ms == Some(0) {
            anyhow::bail!("Invalid timeout_ms: use a positive value or omit it");
        }

        if let Some(display) = &self.session.display {
            if display.trim().is_empty() {
                anyhow::bail!("Invalid display: must not be empty");
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Merge a partial configuration into this one
    /// Non-default sections from the partial config override this config
    pub fn merge_partial(mut self, partial: PaneConfig) -> Self {
        let default_config = PaneConfig::default();

        if partial.session != default_config.session {
            self.session = partial.session;
        }
        if partial.window != default_config.window {
            self.window = partial.window;
        }
        if partial.events != default_config.events {
            self.events = partial.events;
        }
        if partial.dispatch != default_config.dispatch {
            self.dispatch = partial.dispatch;
        }

        self
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests;

#[cfg(test)]
mod property_tests;
