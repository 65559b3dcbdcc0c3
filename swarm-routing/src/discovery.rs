// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Discovery Seam
//!
//! The swarm's source of truth for "which peers serve which blocks" lives in
//! an external membership store (a DHT in production). Routing only ever
//! reads it through the [`Discovery`] trait; [`StaticDiscovery`] backs
//! single-process swarms and tests with an in-memory table.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use libp2p_identity::PeerId;
use parking_lot::RwLock;
use thiserror::Error;

use swarm_core::{ModuleUid, RemoteModuleInfo, ServerInfo};

/// Error type for discovery lookups.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery backend error: {0}")]
    Backend(String),
}

/// Read-only view of swarm membership.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Fetch the current [`RemoteModuleInfo`] for every requested block, in
    /// request order. An entry is `None` on a lookup miss.
    ///
    /// `max_staleness` bounds how old a cached entry the backend may serve;
    /// `Duration::MAX` asks for the freshest available view.
    async fn get_module_infos(
        &self,
        uids: &[ModuleUid],
        max_staleness: Duration,
    ) -> Result<Vec<Option<RemoteModuleInfo>>, DiscoveryError>;
}

/// In-memory [`Discovery`] over a mutable announcement table.
#[derive(Default)]
pub struct StaticDiscovery {
    table: RwLock<HashMap<ModuleUid, RemoteModuleInfo>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the full entry for one block.
    pub fn announce(&self, info: RemoteModuleInfo) {
        self.table.write().insert(info.uid.clone(), info);
    }

    /// Upsert a single server into a block's entry.
    pub fn announce_server(&self, uid: &ModuleUid, peer_id: PeerId, server: ServerInfo) {
        let mut table = self.table.write();
        table
            .entry(uid.clone())
            .or_insert_with(|| RemoteModuleInfo::new(uid.clone()))
            .servers
            .insert(peer_id, server);
    }

    /// Withdraw one server from a block's entry.
    pub fn withdraw_server(&self, uid: &ModuleUid, peer_id: &PeerId) {
        if let Some(info) = self.table.write().get_mut(uid) {
            info.servers.remove(peer_id);
        }
    }

    /// Drop a block's entry entirely, turning lookups into misses.
    pub fn remove(&self, uid: &ModuleUid) {
        self.table.write().remove(uid);
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn get_module_infos(
        &self,
        uids: &[ModuleUid],
        _max_staleness: Duration,
    ) -> Result<Vec<Option<RemoteModuleInfo>>, DiscoveryError> {
        let table = self.table.read();
        Ok(uids.iter().map(|uid| table.get(uid).cloned()).collect())
    }
}
