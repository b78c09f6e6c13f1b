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
    AUTH_MOUNT_PATH, AUTH_SECRET_NAME, REGISTRY_CONTAINER, REGISTRY_CONTAINER_PORT,
    REGISTRY_DEPLOYMENT, REGISTRY_IMAGE, TLS_MOUNT_PATH, TLS_SECRET_NAME, VOLUME_NAME_AUTH,
    VOLUME_NAME_TLS,
};
use crate::infrastructure::kubernetes::resources::registry_labels;
use crate::shared::error::Result;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Probe, SecretVolumeSource,
    TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Builds the registry Deployment: one `registry:2` replica serving TLS with
/// htpasswd auth, both mounted from the Secrets created earlier in the run.
pub struct RegistryDeploymentBuilder {
    namespace: String,
}

impl RegistryDeploymentBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn build(&self) -> Result<Deployment> {
        let labels = registry_labels();

        let env = vec![
            env_var(
                "REGISTRY_HTTP_ADDR",
                format!("0.0.0.0:{}", REGISTRY_CONTAINER_PORT),
            ),
            env_var(
                "REGISTRY_HTTP_TLS_CERTIFICATE",
                format!("{}/tls.crt", TLS_MOUNT_PATH),
            ),
            env_var("REGISTRY_HTTP_TLS_KEY", format!("{}/tls.key", TLS_MOUNT_PATH)),
            env_var("REGISTRY_AUTH", "htpasswd"),
            env_var("REGISTRY_AUTH_HTPASSWD_REALM", "Registry Realm"),
            env_var(
                "REGISTRY_AUTH_HTPASSWD_PATH",
                format!("{}/htpasswd", AUTH_MOUNT_PATH),
            ),
        ];

        let container = Container {
            name: REGISTRY_CONTAINER.to_string(),
            image: Some(REGISTRY_IMAGE.to_string()),
            ports: Some(vec![ContainerPort {
                container_port: REGISTRY_CONTAINER_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            env: Some(env),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: VOLUME_NAME_TLS.to_string(),
                    mount_path: TLS_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
                VolumeMount {
                    name: VOLUME_NAME_AUTH.to_string(),
                    mount_path: AUTH_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            readiness_probe: Some(Probe {
                tcp_socket: Some(TCPSocketAction {
                    port: IntOrString::Int(REGISTRY_CONTAINER_PORT),
                    ..Default::default()
                }),
                initial_delay_seconds: Some(2),
                period_seconds: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };

        let volumes = vec![
            secret_volume(VOLUME_NAME_TLS, TLS_SECRET_NAME),
            secret_volume(VOLUME_NAME_AUTH, AUTH_SECRET_NAME),
        ];

        Ok(Deployment {
            metadata: ObjectMeta {
                name: Some(REGISTRY_DEPLOYMENT.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        volumes: Some(volumes),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn secret_volume(name: &str, secret_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_runs_one_tls_registry_replica() {
        let deployment = RegistryDeploymentBuilder::new("reg-test")
            .build()
            .expect("build");

        assert_eq!(
            deployment.metadata.name.as_deref(),
            Some(REGISTRY_DEPLOYMENT)
        );
        let spec = deployment.spec.expect("spec");
        assert_eq!(spec.replicas, Some(1));

        let pod = spec.template.spec.expect("pod spec");
        let container = &pod.containers[0];
        assert_eq!(container.image.as_deref(), Some(REGISTRY_IMAGE));

        let env = container.env.as_ref().expect("env");
        assert!(env
            .iter()
            .any(|e| e.name == "REGISTRY_AUTH" && e.value.as_deref() == Some("htpasswd")));
        assert!(env
            .iter()
            .any(|e| e.name == "REGISTRY_HTTP_TLS_CERTIFICATE"));

        let volumes = pod.volumes.expect("volumes");
        assert!(volumes
            .iter()
            .any(|v| v.secret.as_ref().and_then(|s| s.secret_name.as_deref())
                == Some(TLS_SECRET_NAME)));
    }
}
