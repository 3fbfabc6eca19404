// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared application state: one handle per subsystem actor, passed by
//! reference to every transport via explicit dependency injection rather
//! than process globals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hub_cascade::CascadeHandle;
use hub_config::HubConfig;
use hub_core::WorkspaceHandle;
use hub_docs::DocHandle;
use hub_world::WorldHandle;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub workspace: WorkspaceHandle,
    pub docs: DocHandle,
    pub world: WorldHandle,
    pub cascade: CascadeHandle,
    pub config: Arc<HubConfig>,
    /// Fan-out of the combined hub version, bumped whenever either the
    /// workspace store or the world state bumps its own version. The
    /// cascade engine keeps its own independent event log and does not
    /// feed this counter.
    pub changes: broadcast::Sender<u64>,
    hub_version: Arc<AtomicU64>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn hub_version(&self) -> u64 {
        self.hub_version.load(Ordering::SeqCst)
    }

    /// Spawns the bridge tasks that fold the workspace and world version
    /// streams into a single combined counter and rebroadcast it on
    /// `changes`, which both `/changes` polling and the SSE transport
    /// read from.
    pub fn bridge_versions(&self) {
        let hub_version = self.hub_version.clone();
        let changes = self.changes.clone();
        let mut workspace_rx = self.workspace.subscribe_version();
        tokio::spawn(async move {
            while let Ok(v) = workspace_rx.recv().await {
                let combined = hub_version.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = v;
                let _ = changes.send(combined);
            }
        });

        let hub_version = self.hub_version.clone();
        let changes = self.changes.clone();
        let mut world_rx = self.world.subscribe_version();
        tokio::spawn(async move {
            while let Ok(v) = world_rx.recv().await {
                let combined = hub_version.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = v;
                let _ = changes.send(combined);
            }
        });
    }
}

pub fn new_state(config: HubConfig) -> AppState {
    let timings = config.timings;
    let workspace = hub_core::WorkspaceActor::spawn(hub_core::SweepTimings {
        lock_sweep_interval: timings.lock_sweep_interval,
        presence_sweep_interval: timings.presence_sweep_interval,
        presence_disconnect_after: timings.presence_disconnect_after,
        presence_remove_after: timings.presence_remove_after,
    });
    let docs = hub_docs::DocActor::spawn();
    let world = hub_world::WorldActor::spawn(timings.convergence_tick_interval);
    let cascade = hub_cascade::CascadeActor::spawn(None);
    let (changes, _) = broadcast::channel(256);

    let state = AppState {
        workspace,
        docs,
        world,
        cascade,
        config: Arc::new(config),
        changes,
        hub_version: Arc::new(AtomicU64::new(0)),
        started_at: chrono::Utc::now(),
    };
    state.bridge_versions();
    state
}
