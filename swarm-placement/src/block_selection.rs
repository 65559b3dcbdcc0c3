// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Block Selection
//!
//! A server hosts one contiguous window of blocks. The window is chosen to
//! lift the least-loaded blocks first: among all candidate windows, take
//! the one whose sorted per-block aggregate-throughput profile is
//! lexicographically smallest (min-max fairness, not a plain sum).
//!
//! Relocation decisions simulate a full greedy rebalance of every peer to
//! estimate the achievable bottleneck throughput; only the caller's own
//! move is ever acted on.

use std::cmp::Ordering;
use std::collections::HashMap;

use libp2p_identity::PeerId;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use swarm_core::{RemoteModuleInfo, ServerState};

/// Below this margin a projected balance improvement is not worth the
/// disruption of relocating.
const BALANCE_EPS: f64 = 1e-6;

/// Error type for placement decisions.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("span served by peer {0} is not present in the swarm snapshot")]
    SpanNotFound(PeerId),
}

/// One server's hosting window plus the throughput it contributes to every
/// block inside it.
///
/// Unlike routing spans this is an envelope: a peer advertising
/// non-contiguous blocks gets the smallest window covering all of them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServerSpan {
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    pub throughput: f64,
}

impl ServerSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    fn move_to(&mut self, new_start: usize) {
        let length = self.len();
        self.start = new_start;
        self.end = new_start + length;
    }
}

/// Per-peer hosting windows and per-block aggregate throughput.
///
/// Every non-OFFLINE server counts: a JOINING peer is about to contribute
/// its throughput, and placement must not pile onto blocks it already
/// committed to.
pub fn compute_spans(
    module_infos: &[Option<RemoteModuleInfo>],
) -> (HashMap<PeerId, ServerSpan>, Vec<f64>) {
    let mut spans: HashMap<PeerId, ServerSpan> = HashMap::new();
    let mut throughputs = vec![0.0; module_infos.len()];

    for (block, module) in module_infos.iter().enumerate() {
        let Some(module) = module else { continue };
        for (peer_id, server) in &module.servers {
            if server.state == ServerState::Offline {
                continue;
            }
            spans
                .entry(*peer_id)
                .and_modify(|span| {
                    span.start = span.start.min(block);
                    span.end = span.end.max(block + 1);
                })
                .or_insert(ServerSpan {
                    start: block,
                    end: block + 1,
                    throughput: server.throughput,
                });
            throughputs[block] += server.throughput;
        }
    }

    (spans, throughputs)
}

fn profile_cmp(lhs: &[f64], rhs: &[f64]) -> Ordering {
    for (a, b) in lhs.iter().zip(rhs) {
        match a.total_cmp(b) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }
    lhs.len().cmp(&rhs.len())
}

/// Start of the window whose sorted load profile is lexicographically
/// smallest, preferring `cur_start` on ties so a balanced server stays put.
fn choose_best_start(throughputs: &[f64], num_blocks: usize, cur_start: Option<usize>) -> usize {
    assert!(
        num_blocks >= 1 && num_blocks <= throughputs.len(),
        "window of {num_blocks} block(s) does not fit a range of {}",
        throughputs.len()
    );

    let sorted_window = |start: usize| {
        let mut profile = throughputs[start..start + num_blocks].to_vec();
        profile.sort_by(f64::total_cmp);
        profile
    };

    let mut best_start = 0;
    let mut best_profile = sorted_window(0);
    let mut best_moves = Some(0) != cur_start;
    for start in 1..=(throughputs.len() - num_blocks) {
        let profile = sorted_window(start);
        let moves = Some(start) != cur_start;
        let ordering = profile_cmp(&profile, &best_profile).then(moves.cmp(&best_moves));
        if ordering == Ordering::Less {
            best_start = start;
            best_profile = profile;
            best_moves = moves;
        }
    }
    best_start
}

/// Choose the window of `num_blocks` contiguous blocks a new server should
/// host, given the current swarm snapshot. Deterministic.
///
/// Returns the chosen block indices. `num_blocks` must fit the snapshot.
pub fn choose_best_blocks(
    num_blocks: usize,
    module_infos: &[Option<RemoteModuleInfo>],
) -> Vec<usize> {
    let (_, throughputs) = compute_spans(module_infos);
    let start = choose_best_start(&throughputs, num_blocks, None);
    (start..start + num_blocks).collect()
}

/// Decide whether the calling server should relocate its window.
///
/// Simulates moving every peer to its individually best window, in random
/// order, until a full pass moves nobody, then compares the swarm's current
/// bottleneck throughput to the achievable one. Only the caller's own move
/// is actionable; the simulation just prices in that everyone else
/// rebalances too.
///
/// `min_balance_quality` above `1.0` forces rebalancing on each check (a
/// debug override). Fails with [`PlacementError::SpanNotFound`] if the
/// caller is missing from the snapshot.
pub fn should_choose_other_blocks<R: Rng>(
    local_peer_id: &PeerId,
    module_infos: &[Option<RemoteModuleInfo>],
    min_balance_quality: f64,
    rng: &mut R,
) -> Result<bool, PlacementError> {
    if min_balance_quality > 1.0 {
        return Ok(true);
    }

    let (mut spans, mut throughputs) = compute_spans(module_infos);
    let initial_throughput = min_throughput(&throughputs);

    let mut local_span = *spans
        .get(local_peer_id)
        .ok_or(PlacementError::SpanNotFound(*local_peer_id))?;
    apply_span(&mut throughputs, &local_span, -1.0);

    let new_start = choose_best_start(&throughputs, local_span.len(), Some(local_span.start));
    if local_span.start == new_start {
        return Ok(false); // already on its best place
    }
    local_span.move_to(new_start);
    apply_span(&mut throughputs, &local_span, 1.0);
    spans.insert(*local_peer_id, local_span);

    // Greedy fixed point: keep letting peers grab their best window until a
    // whole pass changes nothing.
    let mut peer_order: Vec<PeerId> = spans.keys().copied().collect();
    peer_order.sort_unstable();
    let mut moved = true;
    while moved {
        peer_order.shuffle(rng);
        moved = false;
        for peer_id in &peer_order {
            let mut span = spans[peer_id];
            apply_span(&mut throughputs, &span, -1.0);
            let best_start = choose_best_start(&throughputs, span.len(), Some(span.start));
            if span.start != best_start {
                span.move_to(best_start);
                moved = true;
            }
            apply_span(&mut throughputs, &span, 1.0);
            spans.insert(*peer_id, span);
        }
    }

    let new_throughput = min_throughput(&throughputs);
    if new_throughput <= 0.0 {
        // Some block stays unserved even after the simulated rebalance; any
        // coverage beats none.
        tracing::warn!("Some blocks have no servers even after simulated rebalancing");
        return Ok(true);
    }

    let balance_quality = initial_throughput / new_throughput;
    tracing::info!("Swarm balance quality: {:.1}%", balance_quality * 100.0);
    Ok(balance_quality < min_balance_quality - BALANCE_EPS)
}

fn apply_span(throughputs: &mut [f64], span: &ServerSpan, sign: f64) {
    for throughput in &mut throughputs[span.start..span.end] {
        *throughput += sign * span.throughput;
    }
}

fn min_throughput(throughputs: &[f64]) -> f64 {
    throughputs.iter().fold(f64::INFINITY, |min, &t| min.min(t))
}
