// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the AIGEN Blockchain project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Client Configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config loading failed: {0}")]
    Load(String),
    #[error("config saving failed: {0}")]
    Save(String),
}

/// Tuning knobs for a [`RemoteSequenceManager`](crate::RemoteSequenceManager).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceManagerConfig {
    /// Seconds between background refreshes of the swarm view.
    pub update_period_secs: u64,
    /// Attempts for the capability-info query before giving up.
    pub max_retries: u32,
}

impl Default for SequenceManagerConfig {
    fn default() -> Self {
        Self {
            update_period_secs: 30,
            max_retries: 3,
        }
    }
}

impl SequenceManagerConfig {
    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.update_period_secs)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Save(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Save(e.to_string()))
    }
}
