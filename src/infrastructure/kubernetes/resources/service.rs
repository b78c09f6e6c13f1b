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

use crate::infrastructure::constants::{
    REGISTRY_CONTAINER_PORT, REGISTRY_SERVICE,
};
use crate::infrastructure::kubernetes::resources::registry_labels;
use crate::shared::error::Result;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Builds the registry's NodePort Service. The service port and the node
/// port both carry the leased port so the FQDN:port address is valid from
/// pods, nodes, and the host tunnel alike.
pub struct RegistryServiceBuilder {
    namespace: String,
    port: u16,
}

impl RegistryServiceBuilder {
    pub fn new(namespace: impl Into<String>, port: u16) -> Self {
        Self {
            namespace: namespace.into(),
            port,
        }
    }

    pub fn build(&self) -> Result<Service> {
        let labels = registry_labels();

        Ok(Service {
            metadata: ObjectMeta {
                name: Some(REGISTRY_SERVICE.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("NodePort".to_string()),
                selector: Some(labels),
                ports: Some(vec![ServicePort {
                    name: Some("https".to_string()),
                    port: i32::from(self.port),
                    node_port: Some(i32::from(self.port)),
                    target_port: Some(IntOrString::Int(REGISTRY_CONTAINER_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
