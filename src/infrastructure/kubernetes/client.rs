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

use crate::infrastructure::constants::REGISTRY_SERVICE;
use crate::infrastructure::nodes::ServiceIpResolver;
use crate::shared::error::{RegistryError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Secret, Service};
use kube::{Api, Client};

#[async_trait::async_trait]
pub trait RegistryKubeClient: Send + Sync {
    async fn create_namespace(&self, namespace: &Namespace) -> Result<()>;

    async fn delete_namespace(&self, name: &str) -> Result<()>;

    async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<()>;

    async fn apply_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()>;

    async fn apply_service(&self, namespace: &str, service: &Service) -> Result<()>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;
}

#[derive(Clone)]
pub struct RegistryKubeClientImpl {
    client: Client,
}

impl RegistryKubeClientImpl {
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await.map_err(|e| {
            RegistryError::KubeApi(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client })
    }

    pub async fn new_with_config(kubeconfig_path: Option<String>) -> Result<Self> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let kubeconfig = if let Some(path) = kubeconfig_path {
            Kubeconfig::read_from(path).map_err(|e| {
                RegistryError::KubeApi(format!("Failed to load kubeconfig: {}", e))
            })?
        } else {
            Kubeconfig::read().map_err(|e| {
                RegistryError::KubeApi(format!("Failed to load kubeconfig: {}", e))
            })?
        };

        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    RegistryError::KubeApi(format!("Failed to create Kubernetes config: {}", e))
                })?;

        let client = Client::try_from(config).map_err(|e| {
            RegistryError::KubeApi(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl RegistryKubeClient for RegistryKubeClientImpl {
    async fn create_namespace(&self, namespace: &Namespace) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let pp = kube::api::PostParams::default();

        match api.create(&pp, namespace).await {
            Ok(_) => Ok(()),
            // An existing namespace is fine, setup is idempotent per run.
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
            Err(e) => Err(RegistryError::KubeApi(e.to_string())),
        }
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let dp = kube::api::DeleteParams::default();

        match api.delete(name, &dp).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(RegistryError::KubeApi(e.to_string())),
        }
    }

    async fn apply_secret(&self, namespace: &str, secret: &Secret) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let name = secret
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| RegistryError::ConfigError("Secret name is required".to_string()))?;

        match api.get(name).await {
            Ok(_) => {
                let patch_params = kube::api::PatchParams::apply("registry-kube").force();
                let patch = serde_json::to_value(secret).map_err(|e| {
                    RegistryError::KubeApi(format!("Failed to serialize Secret: {}", e))
                })?;
                api.patch(name, &patch_params, &kube::api::Patch::Apply(patch))
                    .await?;
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let pp = kube::api::PostParams::default();
                api.create(&pp, secret).await?;
            }
            Err(e) => return Err(RegistryError::KubeApi(e.to_string())),
        }
        Ok(())
    }

    async fn apply_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let name = deployment
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| RegistryError::ConfigError("Deployment name is required".to_string()))?;

        match api.get(name).await {
            Ok(_) => {
                let patch_params = kube::api::PatchParams::apply("registry-kube").force();
                let patch = serde_json::to_value(deployment).map_err(|e| {
                    RegistryError::KubeApi(format!("Failed to serialize Deployment: {}", e))
                })?;
                api.patch(name, &patch_params, &kube::api::Patch::Apply(patch))
                    .await?;
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let pp = kube::api::PostParams::default();
                api.create(&pp, deployment).await?;
            }
            Err(e) => return Err(RegistryError::KubeApi(e.to_string())),
        }
        Ok(())
    }

    async fn apply_service(&self, namespace: &str, service: &Service) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let name = service
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| RegistryError::ConfigError("Service name is required".to_string()))?;

        match api.get(name).await {
            Ok(existing) => {
                let mut service_to_patch = service.clone();
                if let (Some(existing_spec), Some(ref mut new_spec)) =
                    (&existing.spec, &mut service_to_patch.spec)
                {
                    new_spec.cluster_ip = existing_spec.cluster_ip.clone();
                    new_spec.cluster_ips = existing_spec.cluster_ips.clone();
                }

                let patch_params = kube::api::PatchParams::apply("registry-kube").force();
                let patch = serde_json::to_value(&service_to_patch).map_err(|e| {
                    RegistryError::KubeApi(format!("Failed to serialize Service: {}", e))
                })?;
                api.patch(name, &patch_params, &kube::api::Patch::Apply(patch))
                    .await?;
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let pp = kube::api::PostParams::default();
                api.create(&pp, service).await?;
            }
            Err(e) => return Err(RegistryError::KubeApi(e.to_string())),
        }
        Ok(())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| RegistryError::KubeApi(e.to_string()))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| RegistryError::KubeApi(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ServiceIpResolver for RegistryKubeClientImpl {
    async fn cluster_ip(&self, namespace: &str) -> Result<String> {
        let service = self.get_service(namespace, REGISTRY_SERVICE).await?;
        service
            .spec
            .and_then(|s| s.cluster_ip)
            .filter(|ip| !ip.is_empty() && ip != "None")
            .ok_or_else(|| {
                RegistryError::KubeApi(format!(
                    "Service {}/{} has no cluster IP",
                    namespace, REGISTRY_SERVICE
                ))
            })
    }
}
