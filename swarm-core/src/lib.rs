// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Shared Data Model for the Inference Swarm
//!
//! A large model is partitioned into sequential blocks, each hosted
//! redundantly by one or more peers. This crate holds the types that both
//! sides of the swarm agree on:
//!
//! - **ModuleUid**: stable identifier of one model block
//! - **ServerState / ServerInfo**: per (block, peer) health and throughput
//! - **RemoteModuleInfo**: per-block peer membership at the last refresh
//! - **RemoteSpanInfo**: a contiguous run of blocks served by one peer

pub mod types;

pub use types::{ModuleUid, RemoteModuleInfo, RemoteSpanInfo, ServerInfo, ServerState};
