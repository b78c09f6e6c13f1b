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

use serde::{Deserialize, Serialize};

/// What a setup run should provision. A disabled spec short-circuits the
/// pipeline before any resource acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySpec {
    pub enabled: bool,
    pub namespace: String,
    /// Images to mirror into the registry once it is trusted and tunneled.
    pub images: Vec<String>,
    pub pull_secret: Option<PullSecretSpec>,
}

impl Default for RegistrySpec {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "registry".to_string(),
            images: Vec::new(),
            pull_secret: None,
        }
    }
}

/// Image-pull Secret to create in each named namespace after setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullSecretSpec {
    pub name: String,
    pub namespaces: Vec<String>,
}
