// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use std::collections::HashMap;
use std::fmt;

use libp2p_identity::PeerId;
use serde::{Deserialize, Serialize};

/// Stable identifier of one sequential model block, e.g. `"mistral-7b.3"`.
///
/// The `"<model-name>.<index>"` format is a contract with the discovery
/// service; ordering of blocks is positional and carried by the surrounding
/// sequence, never parsed back out of the string.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleUid(String);

impl ModuleUid {
    /// Build the UID for `block_index` of `model_name`.
    pub fn new(model_name: &str, block_index: usize) -> Self {
        Self(format!("{model_name}.{block_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ModuleUid {
    fn from(uid: String) -> Self {
        Self(uid)
    }
}

impl From<&str> for ModuleUid {
    fn from(uid: &str) -> Self {
        Self(uid.to_string())
    }
}

impl fmt::Display for ModuleUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state a server advertises for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerState {
    /// Downloading weights; counts toward planned load, not yet routable.
    Joining,
    /// Serving requests.
    Online,
    /// Announced shutdown or declared dead; ignored everywhere.
    Offline,
}

impl ServerState {
    pub fn is_online(self) -> bool {
        matches!(self, ServerState::Online)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Joining => write!(f, "joining"),
            ServerState::Online => write!(f, "online"),
            ServerState::Offline => write!(f, "offline"),
        }
    }
}

/// What one peer reports for one block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub state: ServerState,
    /// Estimated serving capacity, non-negative. The load-balancing currency.
    pub throughput: f64,
}

impl ServerInfo {
    pub fn new(state: ServerState, throughput: f64) -> Self {
        Self { state, throughput }
    }
}

/// Everything known about one block as of the last discovery refresh.
#[derive(Clone, Debug)]
pub struct RemoteModuleInfo {
    pub uid: ModuleUid,
    pub servers: HashMap<PeerId, ServerInfo>,
}

impl RemoteModuleInfo {
    pub fn new(uid: ModuleUid) -> Self {
        Self {
            uid,
            servers: HashMap::new(),
        }
    }

    pub fn with_servers(uid: ModuleUid, servers: HashMap<PeerId, ServerInfo>) -> Self {
        Self { uid, servers }
    }

    /// Peers currently serving this block in the ONLINE state.
    pub fn online_peers(&self) -> impl Iterator<Item = &PeerId> {
        self.servers
            .iter()
            .filter(|(_, server)| server.state.is_online())
            .map(|(peer_id, _)| peer_id)
    }
}

/// A contiguous run of blocks `[start, end)` served by a single peer.
///
/// Spans produced by span computation are maximal: they cannot be extended
/// in either direction without crossing a block the peer does not serve
/// ONLINE or the edge of the managed range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteSpanInfo {
    pub start: usize,
    /// Exclusive. Always greater than `start`.
    pub end: usize,
    pub peer_id: PeerId,
}

impl RemoteSpanInfo {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, block_index: usize) -> bool {
        self.start <= block_index && block_index < self.end
    }
}
