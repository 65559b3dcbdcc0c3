// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Client-Side Routing for the Inference Swarm
//!
//! This crate turns an eventually-consistent view of "which peers serve
//! which blocks" into request routes:
//!
//! - **spans**: pure computation of maximal contiguous per-peer coverage
//! - **RemoteSequenceManager**: background-refreshed swarm view plus the
//!   `make_sequence` routing operation and the capability-info query
//! - **Discovery / PeerTransport**: the collaborator seams for the DHT and
//!   the p2p RPC layer; this crate never owns either
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use swarm_routing::{RemoteSequenceManager, RoutingStrategy, SequenceManagerConfig};
//!
//! let manager = RemoteSequenceManager::new(
//!     block_uids,
//!     discovery,
//!     transport,
//!     SequenceManagerConfig::default(),
//!     true, // start the background refresh loop
//! )
//! .await?;
//!
//! let route = manager
//!     .make_sequence(0, None, RoutingStrategy::Random, None, &mut rng)
//!     .await?;
//! for span in route {
//!     // open a connection to span.peer_id for blocks [span.start, span.end)
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod sequence_manager;
pub mod spans;
pub mod transport;

pub use config::{ConfigError, SequenceManagerConfig};
pub use discovery::{Discovery, DiscoveryError, StaticDiscovery};
pub use sequence_manager::{
    RemoteSequenceManager, RoutingError, RoutingStrategy, SequenceManagerStats,
};
pub use spans::compute_spans;
pub use transport::{CapabilityInfo, PeerStub, PeerTransport, TransportError};
