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

use crate::infrastructure::constants::META_ENABLED;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;

/// Output contract of a setup run and the input of the matching teardown.
///
/// Owned exclusively by the caller after return; the pipeline keeps no
/// reference. Serializable so the CLI can persist it next to the run's other
/// files and a later invocation can read it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningArtifact {
    pub test_id: String,
    /// Logical name to path relative to the run's temp directory.
    pub files: BTreeMap<String, String>,
    /// Key facts about the provisioned registry (FQDN, namespace, cert and
    /// credential paths, enabled flag, port, owning cluster).
    pub metadata: BTreeMap<String, String>,
    /// Absolute paths owned by this run, removed on teardown.
    pub managed_resources: Vec<String>,
    /// Exported variables for downstream template expansion.
    pub env: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl ProvisioningArtifact {
    pub fn new(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            files: BTreeMap::new(),
            metadata: BTreeMap::new(),
            managed_resources: Vec::new(),
            env: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Minimal artifact for a run disabled by configuration: nothing was
    /// acquired, only the enabled flag is recorded.
    pub fn disabled(test_id: impl Into<String>) -> Self {
        let mut artifact = Self::new(test_id);
        artifact
            .metadata
            .insert(META_ENABLED.to_string(), "false".to_string());
        artifact
    }

    pub fn is_enabled(&self) -> bool {
        self.metadata.get(META_ENABLED).map(String::as_str) == Some("true")
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_file(path: &Path) -> crate::shared::Result<Self> {
        let raw = read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_artifact_is_minimal() {
        let artifact = ProvisioningArtifact::disabled("t-1");
        assert_eq!(artifact.metadata.get(META_ENABLED).unwrap(), "false");
        assert!(!artifact.is_enabled());
        assert!(artifact.files.is_empty());
        assert!(artifact.managed_resources.is_empty());
        assert!(artifact.env.is_empty());
    }

    #[test]
    fn artifact_roundtrips_through_json() {
        let mut artifact = ProvisioningArtifact::new("t-2");
        artifact
            .metadata
            .insert(META_ENABLED.to_string(), "true".to_string());
        artifact
            .files
            .insert("ca.crt".to_string(), "certs/ca.crt".to_string());

        let json = artifact.to_json().expect("serialize");
        let parsed: ProvisioningArtifact = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.test_id, "t-2");
        assert!(parsed.is_enabled());
        assert_eq!(parsed.files.get("ca.crt").unwrap(), "certs/ca.crt");
    }
}
