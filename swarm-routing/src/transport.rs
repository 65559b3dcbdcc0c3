// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Transport Seam and Capability Payloads
//!
//! Routing contacts peers only for one thing: the capability descriptor of
//! a server holding the first block. The p2p connection machinery itself is
//! an external collaborator behind [`PeerTransport`]; payloads cross the
//! boundary as raw bytes and are decoded here with the wire codec.

use async_trait::async_trait;
use libp2p_identity::PeerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use swarm_core::ModuleUid;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open stub to {peer_id}: {reason}")]
    Connect { peer_id: PeerId, reason: String },
    #[error("rpc to {peer_id} failed: {reason}")]
    Rpc { peer_id: PeerId, reason: String },
    #[error("malformed capability payload: {0}")]
    Codec(String),
}

/// Opaque capability descriptor advertised by a serving peer.
///
/// Decoded once from the wire payload and cached verbatim; routing never
/// interprets the contents, it only hands them to the execution layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityInfo(serde_json::Value);

impl CapabilityInfo {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(bytes)
            .map(Self)
            .map_err(|e| TransportError::Codec(e.to_string()))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// One open connection to a remote peer.
#[async_trait]
pub trait PeerStub: Send + Sync {
    /// Fetch the serialized capability descriptor for `uid`.
    async fn capability_info(&self, uid: &ModuleUid) -> Result<Vec<u8>, TransportError>;
}

/// Connection factory over the p2p layer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn open(&self, peer_id: &PeerId) -> Result<Box<dyn PeerStub>, TransportError>;
}
