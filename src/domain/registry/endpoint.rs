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

use crate::infrastructure::constants::{POD_CLUSTER_DOMAIN, REGISTRY_SERVICE};
use std::fmt;

/// In-cluster address of the provisioned registry. Derived from namespace and
/// the leased port, recomputed per pipeline run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    pub namespace: String,
    pub host: String,
    pub port: u16,
}

impl RegistryEndpoint {
    pub fn new(namespace: impl Into<String>, port: u16) -> Self {
        let namespace = namespace.into();
        let host = format!(
            "{}.{}.svc.{}",
            REGISTRY_SERVICE, namespace, POD_CLUSTER_DOMAIN
        );
        Self {
            namespace,
            host,
            port,
        }
    }

    /// `host:port`, the form embedded in trust documents and image refs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_derived_from_namespace_and_port() {
        let endpoint = RegistryEndpoint::new("ns", 30500);
        assert_eq!(endpoint.host, "registry.ns.svc.cluster.local");
        assert_eq!(endpoint.address(), "registry.ns.svc.cluster.local:30500");
        assert_eq!(endpoint.to_string(), endpoint.address());
    }
}
