// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tool configuration file (`registry-kube.toml`)

use crate::domain::registry::RegistrySpec;
use crate::infrastructure::constants::{
    DEFAULT_ACQUIRE_RETRIES, DEFAULT_LEASE_FILE, DEFAULT_LOCK_WAIT_SECS,
};
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::time::Duration;

/// Main tool configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConf {
    pub registry: RegistrySpec,
    pub lease: LeaseConf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConf {
    pub file: String,
    pub lock_wait_secs: u64,
    pub max_retries: usize,
}

impl Default for LeaseConf {
    fn default() -> Self {
        Self {
            file: DEFAULT_LEASE_FILE.to_string(),
            lock_wait_secs: DEFAULT_LOCK_WAIT_SECS,
            max_retries: DEFAULT_ACQUIRE_RETRIES,
        }
    }
}

impl LeaseConf {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }
}

impl RegistryConf {
    /// Load configuration from TOML file
    pub fn from<T: AsRef<str>>(path: T) -> anyhow::Result<Self> {
        let content = read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.as_ref(), e))?;

        let conf: Self =
            toml::from_str(&content).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;

        Ok(conf)
    }
}
