//! Compositor session
//!
//! A [`Session`] owns the backend connection and the capability registry
//! filled once at connect time. Windows borrow the session mutably for their
//! whole lifetime, so all protocol traffic goes through one owner.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::backend::{Backend, Capability, GlobalInfo, WaylandBackend};
use crate::error::{PaneError, PaneResult};
use crate::protocol::Unrouted;

/// A capability that was found and bound during connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCapability {
    pub capability: Capability,
    pub global: GlobalInfo,
    /// Version actually bound (min of advertised and supported)
    pub version: u32,
}

pub struct Session<B: Backend = WaylandBackend> {
    backend: B,
    capabilities: HashMap<Capability, BoundCapability>,
    connected: bool,
}

impl Session<WaylandBackend> {
    /// Connect to `target` (`None` = `$WAYLAND_DISPLAY`) and bind the
    /// well-known capabilities.
    pub fn connect(target: Option<&str>) -> PaneResult<Self> {
        let backend = WaylandBackend::connect(target)?;
        Self::with_backend(backend)
    }
}

impl<B: Backend> Session<B> {
    /// Run the initial capability negotiation over an already-open backend.
    pub fn with_backend(mut backend: B) -> PaneResult<Self> {
        let mut unrouted = Unrouted::default();
        backend.roundtrip(&mut unrouted)?;

        let globals = backend.globals();
        debug!("📋 Server advertised {} globals", globals.len());

        let mut capabilities = HashMap::new();
        for capability in Capability::ALL {
            let Some(global) = find_global(&globals, capability) else {
                if capability.is_required() {
                    warn!("⚠️ Capability {} not offered by the server", capability);
                } else {
                    debug!("capability {} not offered", capability);
                }
                continue;
            };
            let version = global
                .version
                .min(capability.max_version(&global.interface));
            let mut bound_global = global.clone();
            bound_global.version = version;
            backend.bind(capability, &bound_global)?;
            capabilities.insert(
                capability,
                BoundCapability {
                    capability,
                    global: global.clone(),
                    version,
                },
            );
        }

        // Binds are only guaranteed visible after another round trip.
        backend.roundtrip(&mut unrouted)?;

        info!(
            "🔗 Session ready: {} capabilities bound",
            capabilities.len()
        );

        Ok(Self {
            backend,
            capabilities,
            connected: true,
        })
    }

    pub fn capability(&self, capability: Capability) -> PaneResult<&BoundCapability> {
        self.capabilities
            .get(&capability)
            .ok_or(PaneError::MissingCapability(capability))
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains_key(&capability)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Release all bound capabilities and the connection.
    pub fn disconnect(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.connected {
            return;
        }
        self.capabilities.clear();
        self.backend.disconnect();
        self.connected = false;
        info!("👋 Session disconnected");
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn find_global(globals: &[GlobalInfo], capability: Capability) -> Option<&GlobalInfo> {
    capability
        .interfaces()
        .iter()
        .find_map(|interface| globals.iter().find(|g| g.interface == *interface))
}
