// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Server-Side Block Placement for the Inference Swarm
//!
//! Pure functions that decide which contiguous run of blocks a server
//! should host so that the swarm's worst-case (bottleneck) throughput stays
//! as high as possible:
//!
//! - [`choose_best_blocks`]: pick the initial window for a new server
//! - [`should_choose_other_blocks`]: decide whether an already-placed
//!   server should relocate, by simulating a swarm-wide greedy rebalance
//!
//! Everything operates on an immutable snapshot and touches no shared
//! state, so any thread may call in without locking.

pub mod block_selection;

pub use block_selection::{
    choose_best_blocks, compute_spans, should_choose_other_blocks, PlacementError, ServerSpan,
};
