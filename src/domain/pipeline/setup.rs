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

use crate::domain::pipeline::{RegistryProvisioner, SetupRequest};
use crate::domain::registry::{ProvisioningArtifact, RegistryEndpoint};
use crate::infrastructure::constants::{
    CA_CERT_FILE, CERTS_SUBDIR, CREDENTIALS_FILE, ENV_OUT_ADDRESS, ENV_OUT_CA_PATH, ENV_OUT_HOST,
    ENV_OUT_NAMESPACE, ENV_OUT_PORT, META_CA_CERT, META_CLUSTER_ID, META_CREDENTIALS,
    META_ENABLED, META_FQDN, META_NAMESPACE, META_PORT, META_STAGE,
};
use crate::infrastructure::credentials::RegistryCredentials;
use crate::infrastructure::tls::TlsBundle;
use crate::shared::error::{RegistryError, Result};
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

impl RegistryProvisioner {
    /// Provision the registry end to end and return the artifact describing
    /// it.
    ///
    /// Any failure after the port lease was taken stops the tunnel started by
    /// this call (if any) and releases the lease before the error returns;
    /// the caller never inherits partial state.
    pub async fn setup(&self, request: SetupRequest) -> Result<ProvisioningArtifact> {
        if !request.spec.enabled {
            info!(test_id = %request.test_id, "registry disabled by configuration");
            return Ok(ProvisioningArtifact::disabled(&request.test_id));
        }

        let cluster_id = request
            .cluster_metadata
            .get(META_CLUSTER_ID)
            .cloned()
            .ok_or_else(|| {
                RegistryError::precondition(format!(
                    "cluster metadata key '{}' from the provision-cluster stage",
                    META_CLUSTER_ID
                ))
            })?;

        let ports = Arc::clone(&self.ports);
        let owner = cluster_id.clone();
        let port = tokio::task::spawn_blocking(move || ports.acquire(&owner))
            .await
            .map_err(|e| RegistryError::Io(std::io::Error::other(e)))??;
        println!("✓ Node port {} leased to {}", port, cluster_id);

        match self.setup_inner(&request, &cluster_id, port).await {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                if let Some(mut tunnel) = self.tunnels.take(&request.test_id) {
                    tunnel.stop().await;
                }

                let ports = Arc::clone(&self.ports);
                let owner = cluster_id.clone();
                match tokio::task::spawn_blocking(move || ports.release(&owner)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(release_err)) => {
                        warn!(owner = %cluster_id, "failed to release port lease: {}", release_err)
                    }
                    Err(join_err) => warn!("port release task failed: {}", join_err),
                }
                Err(e)
            }
        }
    }

    async fn setup_inner(
        &self,
        request: &SetupRequest,
        cluster_id: &str,
        port: u16,
    ) -> Result<ProvisioningArtifact> {
        let endpoint = RegistryEndpoint::new(request.spec.namespace.clone(), port);

        fs::create_dir_all(&request.temp_dir)?;
        let credentials = RegistryCredentials::generate()?;
        let credentials_path = request.temp_dir.join(CREDENTIALS_FILE);
        credentials.write_to(&credentials_path)?;

        let tls = TlsBundle::issue(&endpoint.host)?;
        let certs_dir = request.temp_dir.join(CERTS_SUBDIR);
        let tls_paths = tls.write_to(&certs_dir)?;
        println!("✓ TLS material and credentials generated");

        self.resources
            .provision_scaffolding(&endpoint.namespace)
            .await
            .map_err(|e| RegistryError::provisioning("scaffolding", e.to_string()))?;
        self.resources
            .provision_credentials(&endpoint.namespace, &credentials)
            .await
            .map_err(|e| RegistryError::provisioning("credentials", e.to_string()))?;
        self.resources
            .provision_tls(&endpoint.namespace, &tls)
            .await
            .map_err(|e| RegistryError::provisioning("tls", e.to_string()))?;
        self.resources
            .deploy_registry(&endpoint.namespace, port)
            .await
            .map_err(|e| RegistryError::provisioning("registry-deployment", e.to_string()))?;
        self.resources
            .wait_registry_ready(&endpoint.namespace)
            .await
            .map_err(|e| RegistryError::provisioning("registry-ready", e.to_string()))?;
        println!("✓ Registry workload deployed at {}", endpoint);

        let mut tunnel =
            (self.tunnel_factory)(&endpoint.namespace, port, request.kubeconfig.clone());
        tunnel.start().await?;
        self.tunnels.insert(&request.test_id, tunnel);
        println!("✓ Port-forward up on 127.0.0.1:{}", port);

        self.trust
            .configure(cluster_id, &endpoint, &tls_paths.ca_cert)
            .await?;
        println!("✓ Containerd trust configured on all nodes");

        // The trust rollout restarted containerd everywhere: the registry pod
        // was rescheduled and the tunnel lost its backend.
        if let Some(mut dead) = self.tunnels.take(&request.test_id) {
            dead.stop().await;
        }
        self.resources
            .wait_registry_ready(&endpoint.namespace)
            .await
            .map_err(|e| RegistryError::provisioning("registry-recovery", e.to_string()))?;

        let mut tunnel =
            (self.tunnel_factory)(&endpoint.namespace, port, request.kubeconfig.clone());
        tunnel.start().await?;
        let local = tunnel.local_endpoint();
        self.tunnels.insert(&request.test_id, tunnel);
        println!("✓ Port-forward re-established after trust rollout");

        if !request.spec.images.is_empty() {
            self.session.login(&local, &credentials).await?;
            for image in &request.spec.images {
                let pushed = self
                    .session
                    .mirror(image, &local, &endpoint.address())
                    .await?;
                println!("✓ Mirrored {} as {}", image, pushed);
            }
        }

        if let Some(ref pull) = request.spec.pull_secret {
            let server = endpoint.address();
            futures::future::try_join_all(pull.namespaces.iter().map(|ns| {
                self.resources
                    .create_pull_secret(ns, &pull.name, &server, &credentials)
            }))
            .await?;
            println!(
                "✓ Pull secret '{}' created in {} namespace(s)",
                pull.name,
                pull.namespaces.len()
            );
        }

        let mut artifact = ProvisioningArtifact::new(&request.test_id);
        artifact.files.insert(
            CA_CERT_FILE.to_string(),
            format!("{}/{}", CERTS_SUBDIR, CA_CERT_FILE),
        );
        artifact
            .files
            .insert(CREDENTIALS_FILE.to_string(), CREDENTIALS_FILE.to_string());

        let ca_path = tls_paths.ca_cert.to_string_lossy().to_string();
        let metadata = &mut artifact.metadata;
        metadata.insert(META_CLUSTER_ID.to_string(), cluster_id.to_string());
        metadata.insert(META_FQDN.to_string(), endpoint.host.clone());
        metadata.insert(META_NAMESPACE.to_string(), endpoint.namespace.clone());
        metadata.insert(META_CA_CERT.to_string(), ca_path.clone());
        metadata.insert(
            META_CREDENTIALS.to_string(),
            credentials_path.to_string_lossy().to_string(),
        );
        metadata.insert(META_ENABLED.to_string(), "true".to_string());
        metadata.insert(META_PORT.to_string(), port.to_string());
        metadata.insert(META_STAGE.to_string(), request.stage.clone());

        artifact
            .managed_resources
            .push(certs_dir.to_string_lossy().to_string());
        artifact
            .managed_resources
            .push(credentials_path.to_string_lossy().to_string());

        let env = &mut artifact.env;
        env.insert(ENV_OUT_ADDRESS.to_string(), endpoint.address());
        env.insert(ENV_OUT_HOST.to_string(), endpoint.host.clone());
        env.insert(ENV_OUT_PORT.to_string(), port.to_string());
        env.insert(ENV_OUT_NAMESPACE.to_string(), endpoint.namespace.clone());
        env.insert(ENV_OUT_CA_PATH.to_string(), ca_path);

        Ok(artifact)
    }
}
