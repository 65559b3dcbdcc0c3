// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Remote Sequence Manager
//!
//! Keeps track of which peers serve which blocks of a partitioned model,
//! refreshes that view in the background, and forms sequences of servers
//! that collectively cover a contiguous block range. TL;DR it tells you
//! which peers to ask for a specific block.
//!
//! The swarm view is eventually consistent: routing decisions are made on
//! the latest snapshot and may go stale between refreshes. Missing coverage
//! at call time forces one refresh and a retry before failing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use libp2p_identity::PeerId;
use parking_lot::RwLock;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{watch, Mutex, OnceCell};

use swarm_core::{ModuleUid, RemoteModuleInfo, RemoteSpanInfo};

use crate::config::SequenceManagerConfig;
use crate::discovery::{Discovery, DiscoveryError};
use crate::spans::compute_spans;
use crate::transport::{CapabilityInfo, PeerTransport, TransportError};

/// Route selection policy for [`RemoteSequenceManager::make_sequence`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutingStrategy {
    /// Pick a random compatible server at each branch and take every block
    /// it serves.
    Random,
    /// Minimize the estimated time to process a given number of tokens,
    /// including per-hop latency. Contract declared, not implemented.
    Fastest,
    /// Use servers in proportion to their speed, on average over many
    /// sequences. Contract declared, not implemented.
    LoadBalanced,
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingStrategy::Random => write!(f, "random"),
            RoutingStrategy::Fastest => write!(f, "fastest"),
            RoutingStrategy::LoadBalanced => write!(f, "load-balanced"),
        }
    }
}

/// Error type for route planning.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no online servers for block {0}")]
    NoServersForBlock(ModuleUid),
    #[error("routing strategy '{0}' is not implemented")]
    UnsupportedStrategy(RoutingStrategy),
    #[error("no span covers block {index}")]
    NoRouteAvailable { index: usize },
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("capability query failed after {attempts} attempts: {last}")]
    RpcExhausted { attempts: u32, last: String },
}

/// Derived routing state. Refresh replaces the whole struct content under
/// one lock so readers never observe the three fields out of sync.
struct RoutingState {
    module_infos: Vec<Option<RemoteModuleInfo>>,
    /// Every maximal span, longest first.
    spans_by_priority: Vec<RemoteSpanInfo>,
    /// For each block index, the spans covering it, in priority order.
    spans_by_block: Vec<Vec<RemoteSpanInfo>>,
    last_refresh: Option<DateTime<Utc>>,
}

/// Point-in-time counters for monitoring.
#[derive(Clone, Debug)]
pub struct SequenceManagerStats {
    pub total_blocks: usize,
    pub covered_blocks: usize,
    pub total_spans: usize,
    pub longest_span: usize,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Tracks remote servers that collectively serve a sequence of blocks.
///
/// Created over a fixed block range; performs a blocking initial refresh,
/// then refreshes periodically on a background task for its lifetime.
/// Sub-ranges are derived with [`sub_range`](Self::sub_range).
///
/// Running redundant managers for the same blocks wastes CPU and network
/// I/O; derive sub-ranges from one shared manager instead.
pub struct RemoteSequenceManager {
    block_uids: Vec<ModuleUid>,
    discovery: Arc<dyn Discovery>,
    transport: Arc<dyn PeerTransport>,
    config: SequenceManagerConfig,
    state: RwLock<RoutingState>,
    /// Serializes refreshes end-to-end (fetch + swap).
    refresh_gate: Mutex<()>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
    rpc_info: OnceCell<CapabilityInfo>,
    background_started: AtomicBool,
    /// Handle to ourselves for the background task; never upgraded inside
    /// the refresh path.
    weak_self: Weak<Self>,
}

impl fmt::Debug for RemoteSequenceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSequenceManager")
            .field("block_uids", &self.block_uids)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RemoteSequenceManager {
    /// Create a manager over `block_uids`.
    ///
    /// With `start = true` this performs the initial refresh, verifies every
    /// block has at least one online server, and starts the background
    /// refresh loop. With `start = false` the manager comes up empty and
    /// becomes usable after its first successful [`refresh`](Self::refresh).
    pub async fn new(
        block_uids: Vec<ModuleUid>,
        discovery: Arc<dyn Discovery>,
        transport: Arc<dyn PeerTransport>,
        config: SequenceManagerConfig,
        start: bool,
    ) -> Result<Arc<Self>, RoutingError> {
        assert!(!block_uids.is_empty(), "a manager needs at least one block");
        let manager = Self::new_inactive(block_uids, discovery, transport, config);
        if start {
            manager.refresh().await?;
            manager.check_initial_coverage()?;
            manager.start_background();
        }
        Ok(manager)
    }

    fn new_inactive(
        block_uids: Vec<ModuleUid>,
        discovery: Arc<dyn Discovery>,
        transport: Arc<dyn PeerTransport>,
        config: SequenceManagerConfig,
    ) -> Arc<Self> {
        let blocks = block_uids.len();
        let (ready_tx, ready_rx) = watch::channel(false);
        Arc::new_cyclic(|weak_self| Self {
            block_uids,
            discovery,
            transport,
            config,
            state: RwLock::new(RoutingState {
                module_infos: vec![None; blocks],
                spans_by_priority: Vec::new(),
                spans_by_block: vec![Vec::new(); blocks],
                last_refresh: None,
            }),
            refresh_gate: Mutex::new(()),
            ready_tx,
            ready_rx,
            rpc_info: OnceCell::new(),
            background_started: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    /// Number of blocks under management.
    pub fn len(&self) -> usize {
        self.block_uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_uids.is_empty()
    }

    pub fn block_uids(&self) -> &[ModuleUid] {
        &self.block_uids
    }

    /// Whether the first refresh has completed.
    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Snapshot of the current spans, longest first.
    pub fn spans(&self) -> Vec<RemoteSpanInfo> {
        self.state.read().spans_by_priority.clone()
    }

    pub fn stats(&self) -> SequenceManagerStats {
        let state = self.state.read();
        SequenceManagerStats {
            total_blocks: self.block_uids.len(),
            covered_blocks: state
                .spans_by_block
                .iter()
                .filter(|spans| !spans.is_empty())
                .count(),
            total_spans: state.spans_by_priority.len(),
            longest_span: state
                .spans_by_priority
                .first()
                .map(|span| span.len())
                .unwrap_or(0),
            last_refresh: state.last_refresh,
        }
    }

    /// Fetch the latest per-block info from discovery and rebuild the span
    /// structures.
    ///
    /// Anomalies in individual entries (lookup miss, mismatched uid, zero
    /// servers) are logged and tolerated; the previous entry is kept for
    /// misses so routing stays best-effort over stale data.
    pub async fn refresh(&self) -> Result<(), RoutingError> {
        let _gate = self.refresh_gate.lock().await;

        let fetched = self
            .discovery
            .get_module_infos(&self.block_uids, Duration::MAX)
            .await?;
        assert_eq!(
            fetched.len(),
            self.block_uids.len(),
            "discovery returned a misaligned module info list"
        );

        let merged = {
            let state = self.state.read();
            merge_module_infos(&self.block_uids, &state.module_infos, fetched)
        };
        let (spans_by_priority, spans_by_block) = compute_spans(&merged);

        {
            let mut state = self.state.write();
            state.module_infos = merged;
            state.spans_by_priority = spans_by_priority;
            state.spans_by_block = spans_by_block;
            state.last_refresh = Some(Utc::now());
        }

        // The first successful refresh readies the manager; later sends are
        // no-ops since the flag never clears.
        self.ready_tx.send_replace(true);
        Ok(())
    }

    fn check_initial_coverage(&self) -> Result<(), RoutingError> {
        let state = self.state.read();
        for (block_index, covering) in state.spans_by_block.iter().enumerate() {
            if covering.is_empty() {
                return Err(RoutingError::NoServersForBlock(
                    self.block_uids[block_index].clone(),
                ));
            }
        }
        Ok(())
    }

    /// Start the periodic refresh loop. Idempotent. The task holds a weak
    /// handle and exits once the manager is dropped; an in-flight refresh
    /// always runs to completion.
    pub fn start_background(&self) {
        if self.background_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let weak = self.weak_self.clone();
        let period = self.config.update_period();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; construction already
            // refreshed, so consume it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else { break };
                if let Err(err) = manager.refresh().await {
                    tracing::warn!("Background refresh failed: {}", err);
                }
            }
        });
    }

    async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        // The sender lives on self, so this cannot fail while we hold &self.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Form a sequence of remote servers that collectively serve
    /// `[start_index, end_index)`; `end_index = None` means the end of the
    /// managed range.
    ///
    /// Waits for the first refresh if it has not completed yet. `num_tokens`
    /// is only meaningful for [`RoutingStrategy::Fastest`].
    pub async fn make_sequence<R: Rng + Send>(
        &self,
        start_index: usize,
        end_index: Option<usize>,
        strategy: RoutingStrategy,
        num_tokens: Option<u64>,
        rng: &mut R,
    ) -> Result<Vec<RemoteSpanInfo>, RoutingError> {
        if !self.is_ready() {
            tracing::warn!("RemoteSequenceManager is still initializing, waiting until it's ready...");
            self.wait_ready().await;
            tracing::warn!("Finished waiting for RemoteSequenceManager to initialize");
        }
        if (strategy == RoutingStrategy::Fastest) != num_tokens.is_some() {
            tracing::warn!("please specify num_tokens with the fastest strategy (and only with it)");
        }
        let end_index = end_index.unwrap_or(self.block_uids.len());
        assert!(
            start_index <= end_index && end_index <= self.block_uids.len(),
            "sequence range [{start_index}, {end_index}) out of bounds"
        );
        match strategy {
            RoutingStrategy::Random => {}
            unsupported => return Err(RoutingError::UnsupportedStrategy(unsupported)),
        }

        match self.walk_random(start_index, end_index, rng) {
            Ok(sequence) => Ok(sequence),
            Err(gap) => {
                // The view went stale and a gap opened; refresh once and retry.
                tracing::warn!("No span covers block {}, refreshing the swarm view", gap);
                self.refresh().await?;
                self.walk_random(start_index, end_index, rng)
                    .map_err(|index| RoutingError::NoRouteAvailable { index })
            }
        }
    }

    /// One pass of random routing over the current view. Returns the first
    /// uncovered index on failure.
    fn walk_random<R: Rng>(
        &self,
        start_index: usize,
        end_index: usize,
        rng: &mut R,
    ) -> Result<Vec<RemoteSpanInfo>, usize> {
        let state = self.state.read();
        let mut sequence = Vec::new();
        let mut current_index = start_index;
        while current_index < end_index {
            let candidates = &state.spans_by_block[current_index];
            if candidates.is_empty() {
                return Err(current_index);
            }
            let chosen = &candidates[rng.gen_range(0..candidates.len())];
            debug_assert!(chosen.contains(current_index));
            sequence.push(chosen.clone());
            current_index = chosen.end;
        }
        Ok(sequence)
    }

    /// Derive a manager over `block_uids[start_index..end_index]`.
    ///
    /// Waits for the parent's first refresh, then copies the parent's
    /// snapshot by value. Spans are recomputed over the slice rather than
    /// sliced: a parent span crossing the boundary must be truncated. The
    /// already-fetched capability descriptor is inherited, and the child
    /// starts its own background loop iff the parent's is running.
    pub async fn sub_range(
        &self,
        start_index: usize,
        end_index: usize,
    ) -> Arc<RemoteSequenceManager> {
        assert!(
            start_index < end_index && end_index <= self.block_uids.len(),
            "sub-range [{start_index}, {end_index}) out of bounds"
        );
        self.wait_ready().await;

        let child = Self::new_inactive(
            self.block_uids[start_index..end_index].to_vec(),
            self.discovery.clone(),
            self.transport.clone(),
            self.config.clone(),
        );
        {
            let state = self.state.read();
            let module_infos = state.module_infos[start_index..end_index].to_vec();
            let (spans_by_priority, spans_by_block) = compute_spans(&module_infos);
            let mut child_state = child.state.write();
            child_state.module_infos = module_infos;
            child_state.spans_by_priority = spans_by_priority;
            child_state.spans_by_block = spans_by_block;
            child_state.last_refresh = state.last_refresh;
        }
        if let Some(info) = self.rpc_info.get() {
            let _ = child.rpc_info.set(info.clone());
        }
        child.ready_tx.send_replace(true);
        if self.background_started.load(Ordering::SeqCst) {
            child.start_background();
        }
        child
    }

    /// The capability descriptor of the swarm, queried from a random online
    /// server of the first block and cached for the manager's lifetime.
    ///
    /// Each attempt forces a refresh so the peer choice reflects the current
    /// membership; failures are retried up to the configured attempt count.
    pub async fn rpc_info<R: Rng + Send>(
        &self,
        rng: &mut R,
    ) -> Result<CapabilityInfo, RoutingError> {
        let info = self
            .rpc_info
            .get_or_try_init(|| self.fetch_rpc_info(rng))
            .await?;
        Ok(info.clone())
    }

    async fn fetch_rpc_info<R: Rng + Send>(
        &self,
        rng: &mut R,
    ) -> Result<CapabilityInfo, RoutingError> {
        let attempts = self.config.max_retries.max(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            match self.fetch_rpc_info_once(rng).await {
                Ok(info) => return Ok(info),
                Err(err) => {
                    tracing::warn!(
                        "Capability query attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        err
                    );
                    last = err.to_string();
                }
            }
        }
        Err(RoutingError::RpcExhausted { attempts, last })
    }

    async fn fetch_rpc_info_once<R: Rng>(&self, rng: &mut R) -> Result<CapabilityInfo, RoutingError> {
        self.refresh().await?;
        let peer_id = {
            let state = self.state.read();
            let peers: Vec<PeerId> = state.module_infos[0]
                .as_ref()
                .map(|info| info.online_peers().copied().collect())
                .unwrap_or_default();
            if peers.is_empty() {
                return Err(RoutingError::NoServersForBlock(self.block_uids[0].clone()));
            }
            peers[rng.gen_range(0..peers.len())]
        };
        let stub = self.transport.open(&peer_id).await?;
        let payload = stub.capability_info(&self.block_uids[0]).await?;
        Ok(CapabilityInfo::from_bytes(&payload)?)
    }
}

/// Fold a freshly fetched info list into the previous one, logging (never
/// failing on) per-entry anomalies.
fn merge_module_infos(
    block_uids: &[ModuleUid],
    previous: &[Option<RemoteModuleInfo>],
    fetched: Vec<Option<RemoteModuleInfo>>,
) -> Vec<Option<RemoteModuleInfo>> {
    let mut merged = Vec::with_capacity(block_uids.len());
    for ((uid, prev), entry) in block_uids.iter().zip(previous).zip(fetched) {
        match entry {
            None => {
                tracing::warn!("Found no block info for {}", uid);
                merged.push(prev.clone());
            }
            Some(info) if info.uid != *uid => {
                tracing::warn!("The discovery entry for {} actually points to {}", uid, info.uid);
                merged.push(prev.clone());
            }
            Some(info) => {
                if info.servers.is_empty() {
                    tracing::warn!("Found no active peers for block {}", uid);
                }
                merged.push(Some(info));
            }
        }
    }
    merged
}
