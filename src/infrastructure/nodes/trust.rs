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

//! Pushes the registry's CA and a containerd hosts.toml to every cluster
//! node, adds a node-local DNS entry for the registry FQDN, and verifies the
//! result node by node.
//!
//! Applying the settings restarts containerd on each node, which kills every
//! running pod in the cluster. Callers must expect the disruption and re-wait
//! for their workloads. The operation is convergent: a partially configured
//! cluster is safe to leave in place and retry.

use crate::domain::registry::RegistryEndpoint;
use crate::infrastructure::constants::{
    CONTAINERD_CERTS_DIR, KIND_BIN, NODE_HOSTS_FILE, TRUST_CA_FILE, TRUST_HOSTS_FILE,
};
use crate::infrastructure::engine::EngineCommand;
use crate::shared::error::{RegistryError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// Seam the pipeline configures node trust through.
#[async_trait]
pub trait TrustConfigurator: Send + Sync {
    async fn configure(
        &self,
        cluster_id: &str,
        endpoint: &RegistryEndpoint,
        ca_cert: &Path,
    ) -> Result<Vec<NodeOutcome>>;
}

/// Node enumeration and per-node exec/copy, as opaque commands.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    async fn list_nodes(&self, cluster_id: &str) -> Result<Vec<String>>;
    async fn exec(&self, node: &str, cmd: &[&str]) -> Result<String>;
    async fn copy_to(&self, node: &str, local: &Path, remote: &str) -> Result<()>;
    async fn write_file(&self, node: &str, remote: &str, content: &str) -> Result<()>;
}

/// Resolves the registry Service's in-cluster IP for the DNS shim. Cluster
/// DNS is not reachable from the node's host network namespace, so nodes get
/// a literal `/etc/hosts` entry instead.
#[async_trait]
pub trait ServiceIpResolver: Send + Sync {
    async fn cluster_ip(&self, namespace: &str) -> Result<String>;
}

/// Result of configuring one node, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    pub node: String,
    pub configured: bool,
    pub verified: bool,
}

/// Generate the containerd hosts.toml for the registry endpoint.
pub fn trust_document(endpoint: &str) -> String {
    format!(
        "server = \"https://{endpoint}\"\n\
         \n\
         [host.\"https://{endpoint}\"]\n\
         capabilities = [\"pull\", \"resolve\", \"push\"]\n\
         ca = \"{certs_dir}/{endpoint}/{ca_file}\"\n\
         skip_verify = false\n",
        endpoint = endpoint,
        certs_dir = CONTAINERD_CERTS_DIR,
        ca_file = TRUST_CA_FILE,
    )
}

fn hosts_file_has_entry(hosts: &str, host: &str) -> bool {
    let pattern = format!(r"(?m)^\s*\S+\s+(?:\S+\s+)*{}(?:\s|$)", regex::escape(host));
    Regex::new(&pattern)
        .map(|re| re.is_match(hosts))
        .unwrap_or(false)
}

/// Kind-cluster node access: nodes are containers of the host's engine,
/// enumerated with `kind get nodes` and reached with `exec`/`cp`.
pub struct KindNodeRunner {
    engine: EngineCommand,
}

impl KindNodeRunner {
    pub fn new(engine: EngineCommand) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl NodeRunner for KindNodeRunner {
    async fn list_nodes(&self, cluster_id: &str) -> Result<Vec<String>> {
        let output = Command::new(KIND_BIN)
            .args(["get", "nodes", "--name", cluster_id])
            .output()
            .await?;
        if !output.status.success() {
            return Err(RegistryError::command(
                format!("{} get nodes --name {}", KIND_BIN, cluster_id),
                String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn exec(&self, node: &str, cmd: &[&str]) -> Result<String> {
        let mut args = vec!["exec", node];
        args.extend_from_slice(cmd);
        self.engine.run(&args).await
    }

    async fn copy_to(&self, node: &str, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_string_lossy();
        let target = format!("{}:{}", node, remote);
        self.engine
            .run(&["cp", local.as_ref(), target.as_str()])
            .await?;
        Ok(())
    }

    async fn write_file(&self, node: &str, remote: &str, content: &str) -> Result<()> {
        let redirect = format!("cat > {}", remote);
        self.engine
            .run_with_stdin(&["exec", "-i", node, "sh", "-c", redirect.as_str()], content)
            .await?;
        Ok(())
    }
}

pub struct ContainerdTrustConfigurator {
    runner: Box<dyn NodeRunner>,
    resolver: Box<dyn ServiceIpResolver>,
}

impl ContainerdTrustConfigurator {
    pub fn new(runner: Box<dyn NodeRunner>, resolver: Box<dyn ServiceIpResolver>) -> Self {
        Self { runner, resolver }
    }

    async fn configure_node(
        &self,
        node: &str,
        endpoint: &RegistryEndpoint,
        registry_ip: &str,
        ca_cert: &Path,
    ) -> Result<()> {
        let address = endpoint.address();
        let trust_dir = format!("{}/{}", CONTAINERD_CERTS_DIR, address);

        self.runner
            .exec(node, &["mkdir", "-p", trust_dir.as_str()])
            .await?;
        self.runner
            .copy_to(node, ca_cert, &format!("{}/{}", trust_dir, TRUST_CA_FILE))
            .await?;
        self.runner
            .write_file(
                node,
                &format!("{}/{}", trust_dir, TRUST_HOSTS_FILE),
                &trust_document(&address),
            )
            .await?;

        let hosts = self.runner.exec(node, &["cat", NODE_HOSTS_FILE]).await?;
        if !hosts_file_has_entry(&hosts, &endpoint.host) {
            let append = format!(
                "echo '{} {}' >> {}",
                registry_ip, endpoint.host, NODE_HOSTS_FILE
            );
            self.runner
                .exec(node, &["sh", "-c", append.as_str()])
                .await?;
        }

        // containerd only consults certs.d when config_path is set; applying
        // it requires a restart, which kills every pod on the node.
        let enable_certs_dir = format!(
            "grep -q 'config_path' /etc/containerd/config.toml || \
             printf '\\n[plugins.\"io.containerd.grpc.v1.cri\".registry]\\n  config_path = \"{}\"\\n' \
             >> /etc/containerd/config.toml",
            CONTAINERD_CERTS_DIR
        );
        self.runner
            .exec(node, &["sh", "-c", enable_certs_dir.as_str()])
            .await?;
        self.runner
            .exec(node, &["systemctl", "restart", "containerd"])
            .await?;
        Ok(())
    }

    async fn verify_node(&self, node: &str, endpoint: &RegistryEndpoint) -> Result<()> {
        let address = endpoint.address();
        let trust_dir = format!("{}/{}", CONTAINERD_CERTS_DIR, address);
        let ca_path = format!("{}/{}", trust_dir, TRUST_CA_FILE);
        let hosts_toml = format!("{}/{}", trust_dir, TRUST_HOSTS_FILE);

        self.runner
            .exec(node, &["test", "-f", ca_path.as_str()])
            .await
            .map_err(|e| RegistryError::node_verification(node, format!("missing CA: {}", e)))?;

        let written = self
            .runner
            .exec(node, &["cat", hosts_toml.as_str()])
            .await
            .map_err(|e| {
                RegistryError::node_verification(node, format!("missing hosts.toml: {}", e))
            })?;
        if written.trim() != trust_document(&address).trim() {
            return Err(RegistryError::node_verification(
                node,
                "hosts.toml content does not match the generated document",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TrustConfigurator for ContainerdTrustConfigurator {
    async fn configure(
        &self,
        cluster_id: &str,
        endpoint: &RegistryEndpoint,
        ca_cert: &Path,
    ) -> Result<Vec<NodeOutcome>> {
        let nodes = self.runner.list_nodes(cluster_id).await?;
        if nodes.is_empty() {
            return Err(RegistryError::NoClusterNodes(cluster_id.to_string()));
        }

        let registry_ip = self.resolver.cluster_ip(&endpoint.namespace).await?;

        let mut outcomes = Vec::with_capacity(nodes.len());
        for node in &nodes {
            self.configure_node(node, endpoint, &registry_ip, ca_cert)
                .await
                .map_err(|e| RegistryError::node_configuration(node, e.to_string()))?;
            self.verify_node(node, endpoint).await?;
            info!(node = %node, registry = %endpoint, "node trusts the registry");
            outcomes.push(NodeOutcome {
                node: node.clone(),
                configured: true,
                verified: true,
            });
        }
        Ok(outcomes)
    }
}
