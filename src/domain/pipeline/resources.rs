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

use crate::domain::pipeline::ClusterResources;
use crate::infrastructure::constants::{
    REGISTRY_DEPLOYMENT, REGISTRY_READY_INTERVAL_SECS, REGISTRY_READY_TIMEOUT_SECS,
};
use crate::infrastructure::credentials::RegistryCredentials;
use crate::infrastructure::kubernetes::resources::{
    AuthSecretBuilder, NamespaceBuilder, PullSecretBuilder, RegistryDeploymentBuilder,
    RegistryServiceBuilder, TlsSecretBuilder,
};
use crate::infrastructure::kubernetes::RegistryKubeClient;
use crate::infrastructure::tls::TlsBundle;
use crate::shared::error::{RegistryError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

/// Kube-backed cluster-resource adapters: each stage builds its objects and
/// applies them through the client.
pub struct KubeClusterResources {
    client: Box<dyn RegistryKubeClient>,
}

impl KubeClusterResources {
    pub fn new(client: Box<dyn RegistryKubeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterResources for KubeClusterResources {
    async fn provision_scaffolding(&self, namespace: &str) -> Result<()> {
        let ns = NamespaceBuilder::new(namespace).build()?;
        self.client.create_namespace(&ns).await
    }

    async fn provision_credentials(
        &self,
        namespace: &str,
        credentials: &RegistryCredentials,
    ) -> Result<()> {
        let secret = AuthSecretBuilder::new(namespace, credentials).build()?;
        self.client.apply_secret(namespace, &secret).await
    }

    async fn provision_tls(&self, namespace: &str, tls: &TlsBundle) -> Result<()> {
        let secret = TlsSecretBuilder::new(namespace, tls).build()?;
        self.client.apply_secret(namespace, &secret).await
    }

    async fn deploy_registry(&self, namespace: &str, port: u16) -> Result<()> {
        let deployment = RegistryDeploymentBuilder::new(namespace).build()?;
        self.client.apply_deployment(namespace, &deployment).await?;

        let service = RegistryServiceBuilder::new(namespace, port).build()?;
        self.client.apply_service(namespace, &service).await
    }

    async fn wait_registry_ready(&self, namespace: &str) -> Result<()> {
        let mut waited = 0;
        while waited < REGISTRY_READY_TIMEOUT_SECS {
            if let Ok(deployment) = self.client.get_deployment(namespace, REGISTRY_DEPLOYMENT).await
            {
                let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                let ready = deployment
                    .status
                    .as_ref()
                    .and_then(|s| s.ready_replicas)
                    .unwrap_or(0);
                if ready == desired {
                    return Ok(());
                }
            }

            sleep(Duration::from_secs(REGISTRY_READY_INTERVAL_SECS)).await;
            waited += REGISTRY_READY_INTERVAL_SECS;
        }

        Err(RegistryError::Timeout(format!(
            "Registry deployment in namespace {} did not become ready within {} seconds",
            namespace, REGISTRY_READY_TIMEOUT_SECS
        )))
    }

    async fn create_pull_secret(
        &self,
        namespace: &str,
        name: &str,
        server: &str,
        credentials: &RegistryCredentials,
    ) -> Result<()> {
        let secret = PullSecretBuilder::new(name, namespace, server, credentials).build()?;
        self.client.apply_secret(namespace, &secret).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.client.delete_namespace(namespace).await
    }
}
