// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Shared fixtures for routing integration tests.

#![allow(dead_code)]

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use libp2p_identity::PeerId;

use swarm_core::{ModuleUid, ServerInfo, ServerState};
use swarm_routing::{PeerStub, PeerTransport, StaticDiscovery, TransportError};

/// Call counters shared between a [`TestTransport`] and its stubs.
#[derive(Default)]
pub struct TransportLog {
    pub open_calls: AtomicU32,
    pub info_calls: AtomicU32,
    pub failures_remaining: AtomicU32,
}

/// Transport double that serves a fixed capability payload, failing the
/// first `failures` info calls with a transient rpc error.
pub struct TestTransport {
    pub log: Arc<TransportLog>,
    payload: Vec<u8>,
}

impl TestTransport {
    pub fn new(payload: &[u8], failures: u32) -> Self {
        let log = Arc::new(TransportLog::default());
        log.failures_remaining.store(failures, Ordering::SeqCst);
        Self {
            log,
            payload: payload.to_vec(),
        }
    }
}

struct TestStub {
    peer_id: PeerId,
    log: Arc<TransportLog>,
    payload: Vec<u8>,
}

#[async_trait]
impl PeerStub for TestStub {
    async fn capability_info(&self, _uid: &ModuleUid) -> Result<Vec<u8>, TransportError> {
        self.log.info_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.log.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.log
                .failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Rpc {
                peer_id: self.peer_id,
                reason: "simulated transient failure".into(),
            });
        }
        Ok(self.payload.clone())
    }
}

#[async_trait]
impl PeerTransport for TestTransport {
    async fn open(&self, peer_id: &PeerId) -> Result<Box<dyn PeerStub>, TransportError> {
        self.log.open_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TestStub {
            peer_id: *peer_id,
            log: self.log.clone(),
            payload: self.payload.clone(),
        }))
    }
}

pub fn online(throughput: f64) -> ServerInfo {
    ServerInfo::new(ServerState::Online, throughput)
}

pub fn uids(model: &str, blocks: usize) -> Vec<ModuleUid> {
    (0..blocks).map(|i| ModuleUid::new(model, i)).collect()
}

/// Announce `peer` as ONLINE for the given blocks of `model`.
pub fn announce_peer(discovery: &StaticDiscovery, model: &str, peer: PeerId, blocks: Range<usize>) {
    for block in blocks {
        discovery.announce_server(&ModuleUid::new(model, block), peer, online(1.0));
    }
}
