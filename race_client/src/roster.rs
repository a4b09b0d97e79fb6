//! Remote player table.
//!
//! One renderable proxy per remote peer, keyed by connection id, driven
//! entirely by relay notifications. The local player is never in this
//! table; it is rendered from local state, not from network echo.
//!
//! Model acquisition is slow and fallible, so it runs on a spawned task
//! and must never stall the message pump or the tick loop: a join
//! registers a placeholder immediately, and the visual is upgraded once
//! the load completes. A failed load keeps the placeholder; a join
//! notification never leaves its id unregistered.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use race_shared::net::{ConnId, Transform};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Material tint, RGB packed as `0xRRGGBB`.
pub type CarTint = u32;

/// Tint for the locally driven car.
pub const LOCAL_CAR_TINT: CarTint = 0xff00ff;
/// Tint for remote players' cars.
pub const REMOTE_CAR_TINT: CarTint = 0x00ff00;

/// Default car asset path, relative to the static bundle.
pub const CAR_ASSET: &str = "/models/car.glb";

/// A loaded, tinted car model handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarModel {
    pub asset: String,
    pub tint: CarTint,
}

/// What a proxy looks like on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyVisual {
    Model(CarModel),
    /// Deterministic fallback while a model loads, or when it cannot be
    /// acquired at all.
    Placeholder(CarTint),
}

/// Renderable stand-in for one remote player.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProxy {
    pub name: String,
    pub visual: ProxyVisual,
    pub transform: Transform,
}

/// Seam to the asset pipeline. Loading may take arbitrarily long and may
/// fail; callers must keep running either way.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, tint: CarTint) -> anyhow::Result<CarModel>;
}

/// Loader that hands out the bundled car asset without touching disk.
/// The real decode happens in the renderer, which is out of scope here.
#[derive(Debug, Default)]
pub struct StaticModelLoader;

#[async_trait]
impl ModelLoader for StaticModelLoader {
    async fn load(&self, tint: CarTint) -> anyhow::Result<CarModel> {
        Ok(CarModel {
            asset: CAR_ASSET.to_string(),
            tint,
        })
    }
}

/// Mapping from peer id to its locally rendered proxy.
///
/// Must live inside a tokio runtime: joins spawn the model load and feed
/// completions back through a channel drained by [`apply_loaded`].
///
/// [`apply_loaded`]: RemotePlayerTable::apply_loaded
pub struct RemotePlayerTable {
    local_id: ConnId,
    loader: Arc<dyn ModelLoader>,
    proxies: HashMap<ConnId, RemoteProxy>,
    loaded_tx: mpsc::UnboundedSender<(ConnId, CarModel)>,
    loaded_rx: mpsc::UnboundedReceiver<(ConnId, CarModel)>,
}

impl RemotePlayerTable {
    pub fn new(local_id: ConnId, loader: Arc<dyn ModelLoader>) -> Self {
        let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
        Self {
            local_id,
            loader,
            proxies: HashMap::new(),
            loaded_tx,
            loaded_rx,
        }
    }

    /// Handles a join notification. No-op if the id is already known or is
    /// the local player. The proxy is inserted right away with a
    /// placeholder visual; the model load runs on its own task and never
    /// blocks the caller.
    pub fn on_join(&mut self, id: ConnId, name: String) {
        if id == self.local_id || self.proxies.contains_key(&id) {
            return;
        }

        self.proxies.insert(
            id.clone(),
            RemoteProxy {
                name,
                visual: ProxyVisual::Placeholder(REMOTE_CAR_TINT),
                transform: Transform::default(),
            },
        );

        let loader = Arc::clone(&self.loader);
        let loaded_tx = self.loaded_tx.clone();
        tokio::spawn(async move {
            match loader.load(REMOTE_CAR_TINT).await {
                Ok(model) => {
                    // The table may be gone by now; a closed channel just
                    // drops the result.
                    let _ = loaded_tx.send((id, model));
                }
                Err(e) => {
                    warn!(peer = %id, error = %e, "Car model load failed, keeping placeholder");
                }
            }
        });
    }

    /// Drains finished model loads and upgrades the matching placeholders.
    /// A completion for a peer that already left is dropped.
    pub fn apply_loaded(&mut self) {
        while let Ok((id, model)) = self.loaded_rx.try_recv() {
            if let Some(proxy) = self.proxies.get_mut(&id) {
                if matches!(proxy.visual, ProxyVisual::Placeholder(_)) {
                    proxy.visual = ProxyVisual::Model(model);
                }
            }
        }
    }

    /// Handles a leave notification. No-op if absent, which guards against
    /// double delivery.
    pub fn on_leave(&mut self, id: &ConnId) {
        if self.proxies.remove(id).is_some() {
            debug!(peer = %id, "Remote player removed");
        }
    }

    /// Applies a position broadcast: for each known peer, overwrite its
    /// transform directly. Last write wins; no smoothing. The local id and
    /// unknown ids are skipped.
    pub fn on_update(&mut self, deltas: &BTreeMap<ConnId, Transform>) {
        for (id, transform) in deltas {
            if *id == self.local_id {
                continue;
            }
            if let Some(proxy) = self.proxies.get_mut(id) {
                proxy.transform = *transform;
            }
        }
    }

    /// Session teardown: detach every proxy from the scene.
    pub fn detach_all(&mut self) {
        self.proxies.clear();
    }

    pub fn get(&self, id: &ConnId) -> Option<&RemoteProxy> {
        self.proxies.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnId> {
        self.proxies.keys()
    }

    pub fn contains(&self, id: &ConnId) -> bool {
        self.proxies.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}
