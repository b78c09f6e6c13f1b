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

//! Setup/teardown provisioning pipeline
//!
//! [`RegistryProvisioner`] composes the port allocator, the cluster-resource
//! adapters, the tunnel, the trust configurator and the registry session.
//! Every collaborator sits behind a trait so scenario tests run the full
//! sequencing against fakes.

pub mod resources;
pub mod setup;
pub mod teardown;

use crate::domain::lease::manager::{KindClusterLiveness, PortAllocator, PortLeaseManager};
use crate::domain::lease::store::FileLeaseStore;
use crate::domain::registry::RegistrySpec;
use crate::domain::config::RegistryConf;
use crate::infrastructure::credentials::RegistryCredentials;
use crate::infrastructure::engine::{EngineCommand, EngineRegistrySession, RegistrySession};
use crate::infrastructure::kubernetes::RegistryKubeClientImpl;
use crate::infrastructure::nodes::{ContainerdTrustConfigurator, KindNodeRunner, TrustConfigurator};
use crate::infrastructure::tls::TlsBundle;
use crate::infrastructure::tunnel::{PortForwarder, Tunnel, TunnelRegistry};
use crate::shared::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs of one setup invocation, assembled by the caller from its
/// configuration, the upstream cluster-provisioning metadata, and the
/// environment.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub test_id: String,
    pub stage: String,
    pub spec: RegistrySpec,
    pub kubeconfig: Option<String>,
    pub temp_dir: PathBuf,
    /// Metadata from the prior cluster-provisioning step; must contain the
    /// cluster identifier.
    pub cluster_metadata: HashMap<String, String>,
}

/// Inputs of one teardown invocation: the metadata and owned paths recorded
/// by the matching setup.
#[derive(Debug, Clone)]
pub struct TeardownRequest {
    pub test_id: String,
    pub metadata: BTreeMap<String, String>,
    pub managed_resources: Vec<String>,
}

/// Cluster-side provisioning adapters, invoked by setup in a fixed order and
/// by teardown best-effort.
#[async_trait]
pub trait ClusterResources: Send + Sync {
    async fn provision_scaffolding(&self, namespace: &str) -> Result<()>;

    async fn provision_credentials(
        &self,
        namespace: &str,
        credentials: &RegistryCredentials,
    ) -> Result<()>;

    async fn provision_tls(&self, namespace: &str, tls: &TlsBundle) -> Result<()>;

    async fn deploy_registry(&self, namespace: &str, port: u16) -> Result<()>;

    async fn wait_registry_ready(&self, namespace: &str) -> Result<()>;

    async fn create_pull_secret(
        &self,
        namespace: &str,
        name: &str,
        server: &str,
        credentials: &RegistryCredentials,
    ) -> Result<()>;

    async fn delete_namespace(&self, namespace: &str) -> Result<()>;
}

/// Creates a fresh (not yet started) tunnel for a namespace/port pair.
pub type TunnelFactory =
    Box<dyn Fn(&str, u16, Option<String>) -> Box<dyn Tunnel> + Send + Sync>;

pub struct RegistryProvisioner {
    ports: Arc<dyn PortAllocator>,
    resources: Box<dyn ClusterResources>,
    trust: Box<dyn TrustConfigurator>,
    session: Box<dyn RegistrySession>,
    tunnel_factory: TunnelFactory,
    tunnels: &'static TunnelRegistry,
}

impl RegistryProvisioner {
    pub fn new(
        ports: Arc<dyn PortAllocator>,
        resources: Box<dyn ClusterResources>,
        trust: Box<dyn TrustConfigurator>,
        session: Box<dyn RegistrySession>,
        tunnel_factory: TunnelFactory,
    ) -> Self {
        Self {
            ports,
            resources,
            trust,
            session,
            tunnel_factory,
            tunnels: TunnelRegistry::global(),
        }
    }

    /// Production wiring: file-backed lease store, kube client, kind node
    /// access and the engine CLI, all resolved from configuration and
    /// environment.
    pub async fn with_defaults(conf: &RegistryConf, kubeconfig: Option<String>) -> Result<Self> {
        let store = FileLeaseStore::new(conf.lease.file.clone());
        let manager = PortLeaseManager::new(store, Box::new(KindClusterLiveness))
            .with_limits(conf.lease.lock_wait(), conf.lease.max_retries);

        let client = if kubeconfig.is_some() {
            RegistryKubeClientImpl::new_with_config(kubeconfig.clone()).await?
        } else {
            RegistryKubeClientImpl::new().await?
        };

        let trust = ContainerdTrustConfigurator::new(
            Box::new(KindNodeRunner::new(EngineCommand::from_env_elevated())),
            Box::new(client.clone()),
        );

        let tunnel_kubeconfig = kubeconfig;
        let tunnel_factory: TunnelFactory = Box::new(move |namespace, port, override_path| {
            let path = override_path.or_else(|| tunnel_kubeconfig.clone());
            Box::new(PortForwarder::new(namespace, port, path))
        });

        Ok(Self::new(
            Arc::new(manager),
            Box::new(resources::KubeClusterResources::new(Box::new(client))),
            Box::new(trust),
            Box::new(EngineRegistrySession::new(EngineCommand::from_env())),
            tunnel_factory,
        ))
    }
}
