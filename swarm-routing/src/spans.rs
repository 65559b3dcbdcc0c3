// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Span Computation
//!
//! Turns a per-block snapshot of the swarm into maximal contiguous per-peer
//! coverage runs. Routing prefers long spans: a peer that serves many
//! consecutive blocks is one hop instead of several.

use std::collections::BTreeMap;

use libp2p_identity::PeerId;

use swarm_core::{RemoteModuleInfo, RemoteSpanInfo};

/// Compute per-peer spans over a contiguous block range.
///
/// Returns `(spans_by_priority, spans_by_block)`:
/// - `spans_by_priority` holds every maximal span of every ONLINE peer,
///   sorted by length descending. Equal lengths keep the order in which
///   spans closed during the scan (an arbitrary tie-break).
/// - `spans_by_block[i]` lists, in the same priority order, exactly the
///   spans whose range contains block `i`.
///
/// Single left-to-right scan, O(total peer-block entries). Blocks with a
/// missing snapshot entry contribute nothing and terminate every open span.
pub fn compute_spans(
    module_infos: &[Option<RemoteModuleInfo>],
) -> (Vec<RemoteSpanInfo>, Vec<Vec<RemoteSpanInfo>>) {
    let mut closed_spans: Vec<RemoteSpanInfo> = Vec::new();
    // BTreeMap keeps the close order deterministic when several spans end
    // at the same block.
    let mut open_spans: BTreeMap<PeerId, RemoteSpanInfo> = BTreeMap::new();

    for (block_index, info) in module_infos.iter().enumerate() {
        if let Some(info) = info {
            for (peer_id, server) in &info.servers {
                if !server.state.is_online() {
                    continue;
                }
                open_spans
                    .entry(*peer_id)
                    .and_modify(|span| span.end = block_index + 1)
                    .or_insert(RemoteSpanInfo {
                        start: block_index,
                        end: block_index + 1,
                        peer_id: *peer_id,
                    });
            }
        }

        let last_block = block_index + 1 == module_infos.len();
        let to_close: Vec<PeerId> = open_spans
            .iter()
            .filter(|&(peer_id, _)| {
                last_block
                    || info
                        .as_ref()
                        .and_then(|i| i.servers.get(peer_id))
                        .map_or(true, |server| !server.state.is_online())
            })
            .map(|(&peer_id, _)| peer_id)
            .collect();
        for peer_id in to_close {
            if let Some(span) = open_spans.remove(&peer_id) {
                closed_spans.push(span);
            }
        }
    }

    // Every opened span closes by construction; anything left is a bug.
    assert!(
        open_spans.is_empty(),
        "span scan left {} span(s) open",
        open_spans.len()
    );

    closed_spans.sort_by_key(|span| std::cmp::Reverse(span.len()));

    let mut spans_by_block: Vec<Vec<RemoteSpanInfo>> = vec![Vec::new(); module_infos.len()];
    for span in &closed_spans {
        for covered in &mut spans_by_block[span.start..span.end] {
            covered.push(span.clone());
        }
    }

    (closed_spans, spans_by_block)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use swarm_core::{ModuleUid, ServerInfo, ServerState};

    use super::*;

    fn snapshot(
        blocks: usize,
        entries: &[(PeerId, ServerState, &[usize])],
    ) -> Vec<Option<RemoteModuleInfo>> {
        (0..blocks)
            .map(|block| {
                let mut servers = HashMap::new();
                for (peer_id, state, covered) in entries {
                    if covered.contains(&block) {
                        servers.insert(*peer_id, ServerInfo::new(*state, 1.0));
                    }
                }
                Some(RemoteModuleInfo::with_servers(
                    ModuleUid::new("model", block),
                    servers,
                ))
            })
            .collect()
    }

    #[test]
    fn test_two_peer_partition() {
        let a = PeerId::random();
        let b = PeerId::random();
        let infos = snapshot(
            4,
            &[
                (a, ServerState::Online, &[0, 1]),
                (b, ServerState::Online, &[2, 3]),
            ],
        );

        let (by_priority, by_block) = compute_spans(&infos);
        assert_eq!(by_priority.len(), 2);
        assert!(by_priority
            .iter()
            .any(|s| s.peer_id == a && s.start == 0 && s.end == 2));
        assert!(by_priority
            .iter()
            .any(|s| s.peer_id == b && s.start == 2 && s.end == 4));

        for block in 0..4 {
            assert_eq!(by_block[block].len(), 1);
            assert!(by_block[block][0].contains(block));
        }
    }

    #[test]
    fn test_gap_splits_peer_into_disjoint_spans() {
        let a = PeerId::random();
        let infos = snapshot(5, &[(a, ServerState::Online, &[0, 1, 3, 4])]);

        let (by_priority, by_block) = compute_spans(&infos);
        assert_eq!(by_priority.len(), 2);
        assert!(by_priority
            .iter()
            .any(|s| s.start == 0 && s.end == 2 && s.peer_id == a));
        assert!(by_priority
            .iter()
            .any(|s| s.start == 3 && s.end == 5 && s.peer_id == a));
        assert!(by_block[2].is_empty());
    }

    #[test]
    fn test_only_online_peers_form_spans() {
        let joining = PeerId::random();
        let offline = PeerId::random();
        let infos = snapshot(
            3,
            &[
                (joining, ServerState::Joining, &[0, 1, 2]),
                (offline, ServerState::Offline, &[0, 1, 2]),
            ],
        );

        let (by_priority, by_block) = compute_spans(&infos);
        assert!(by_priority.is_empty());
        assert!(by_block.iter().all(|spans| spans.is_empty()));
    }

    #[test]
    fn test_state_change_closes_span() {
        let a = PeerId::random();
        let mut infos = snapshot(4, &[(a, ServerState::Online, &[0, 1, 2, 3])]);
        // Peer flaps to JOINING at block 2: coverage must split around it.
        if let Some(info) = infos[2].as_mut() {
            info.servers
                .insert(a, ServerInfo::new(ServerState::Joining, 1.0));
        }

        let (by_priority, _) = compute_spans(&infos);
        assert_eq!(by_priority.len(), 2);
        assert!(by_priority.iter().any(|s| s.start == 0 && s.end == 2));
        assert!(by_priority.iter().any(|s| s.start == 3 && s.end == 4));
    }

    #[test]
    fn test_missing_entry_closes_spans() {
        let a = PeerId::random();
        let mut infos = snapshot(3, &[(a, ServerState::Online, &[0, 1, 2])]);
        infos[1] = None;

        let (by_priority, by_block) = compute_spans(&infos);
        assert_eq!(by_priority.len(), 2);
        assert!(by_block[1].is_empty());
    }

    #[test]
    fn test_priority_orders_longest_first() {
        let long = PeerId::random();
        let short = PeerId::random();
        let infos = snapshot(
            6,
            &[
                (short, ServerState::Online, &[0, 1]),
                (long, ServerState::Online, &[0, 1, 2, 3, 4, 5]),
            ],
        );

        let (by_priority, by_block) = compute_spans(&infos);
        assert_eq!(by_priority[0].peer_id, long);
        assert_eq!(by_priority[0].len(), 6);
        assert_eq!(by_priority[1].peer_id, short);
        // Per-block lists keep the same priority order.
        assert_eq!(by_block[0][0].peer_id, long);
        assert_eq!(by_block[0][1].peer_id, short);
    }

    #[test]
    fn test_spans_are_maximal_and_disjoint_per_peer() {
        let a = PeerId::random();
        let b = PeerId::random();
        let infos = snapshot(
            8,
            &[
                (a, ServerState::Online, &[0, 1, 2, 4, 5]),
                (b, ServerState::Online, &[1, 2, 3, 4, 5, 6, 7]),
            ],
        );

        let (by_priority, _) = compute_spans(&infos);
        for span in &by_priority {
            // Maximal: the block just outside either edge is not served
            // ONLINE by the same peer.
            if span.start > 0 {
                let before = infos[span.start - 1].as_ref().and_then(|i| i.servers.get(&span.peer_id));
                assert!(before.map_or(true, |s| !s.state.is_online()));
            }
            if span.end < infos.len() {
                let after = infos[span.end].as_ref().and_then(|i| i.servers.get(&span.peer_id));
                assert!(after.map_or(true, |s| !s.state.is_online()));
            }
        }
        // Disjoint per peer.
        for (i, lhs) in by_priority.iter().enumerate() {
            for rhs in by_priority.iter().skip(i + 1) {
                if lhs.peer_id == rhs.peer_id {
                    assert!(lhs.end <= rhs.start || rhs.end <= lhs.start);
                }
            }
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let (by_priority, by_block) = compute_spans(&[]);
        assert!(by_priority.is_empty());
        assert!(by_block.is_empty());
    }
}
