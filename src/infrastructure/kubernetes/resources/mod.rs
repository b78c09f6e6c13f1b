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

//! Kubernetes resource builders for the registry workload

pub mod deployment;
pub mod namespace;
pub mod secret;
pub mod service;

pub use deployment::RegistryDeploymentBuilder;
pub use namespace::NamespaceBuilder;
pub use secret::{AuthSecretBuilder, PullSecretBuilder, TlsSecretBuilder};
pub use service::RegistryServiceBuilder;

use std::collections::BTreeMap;

use crate::infrastructure::constants::{
    LABEL_APP, LABEL_TYPE, LABEL_TYPE_VALUE, REGISTRY_SERVICE,
};

/// Labels common to everything this tool creates.
pub(crate) fn registry_labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP.to_string(), REGISTRY_SERVICE.to_string());
    labels.insert(LABEL_TYPE.to_string(), LABEL_TYPE_VALUE.to_string());
    labels
}
