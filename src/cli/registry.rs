//! Registry lifecycle commands

use crate::cli::display::TableRenderer;
use crate::domain::config::RegistryConf;
use crate::domain::pipeline::{RegistryProvisioner, SetupRequest, TeardownRequest};
use crate::domain::registry::ProvisioningArtifact;
use crate::infrastructure::constants::{
    ARTIFACT_FILE, ENV_KUBECONFIG, META_CLUSTER_ID, REGISTRY_DEPLOYMENT, REGISTRY_SERVICE,
};
use crate::infrastructure::kubernetes::{RegistryKubeClient, RegistryKubeClientImpl};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct SetupCommand {
    /// Identifier of the test run; teardown must use the same value
    #[arg(long, short = 't')]
    pub test_id: String,

    /// Pipeline stage name recorded in the artifact metadata
    #[arg(long, default_value = "e2e")]
    pub stage: String,

    /// Path to the tool configuration file (registry-kube.toml)
    /// If not provided, built-in defaults are used
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// YAML file with metadata from the provision-cluster stage
    /// (must contain the cluster identifier under "cluster.id")
    #[arg(long, value_name = "PATH")]
    pub cluster_metadata: Option<String>,

    /// Cluster identifier, overriding the cluster-metadata file
    #[arg(long, short = 'c')]
    pub cluster_id: Option<String>,

    /// Directory for TLS material, credentials and the artifact file
    #[arg(long, default_value = "/tmp/registry-kube")]
    pub temp_dir: PathBuf,

    /// Path to kubeconfig file
    /// If not specified, falls back to the metadata file, then to KUBECONFIG
    #[arg(long)]
    pub kubeconfig: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct TeardownCommand {
    /// Identifier of the test run used at setup time
    #[arg(long, short = 't')]
    pub test_id: String,

    /// Path to the tool configuration file (registry-kube.toml)
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<String>,

    /// Directory the matching setup wrote its artifact into
    #[arg(long, default_value = "/tmp/registry-kube")]
    pub temp_dir: PathBuf,

    /// Path to kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<String>,
}

#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Kubernetes namespace of the registry
    #[arg(long, short = 'n', default_value = "registry")]
    pub namespace: String,

    /// Path to kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<String>,
}

fn load_conf(config_file: &Option<String>) -> anyhow::Result<RegistryConf> {
    match config_file {
        Some(path) => RegistryConf::from(path),
        None => {
            println!("ℹ️  No configuration file specified, using default settings");
            Ok(RegistryConf::default())
        }
    }
}

impl SetupCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = load_conf(&self.config_file)?;

        let mut cluster_metadata: HashMap<String, String> =
            if let Some(ref path) = self.cluster_metadata {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to read cluster metadata {}: {}", path, e)
                })?;
                serde_yaml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Failed to parse cluster metadata: {}", e))?
            } else {
                HashMap::new()
            };
        if let Some(ref cluster_id) = self.cluster_id {
            cluster_metadata.insert(META_CLUSTER_ID.to_string(), cluster_id.clone());
        }

        // Resolution order: flag > metadata > process environment
        let kubeconfig = self
            .kubeconfig
            .clone()
            .or_else(|| cluster_metadata.get("kubeconfig").cloned())
            .or_else(|| std::env::var(ENV_KUBECONFIG).ok());

        let provisioner = RegistryProvisioner::with_defaults(&conf, kubeconfig.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create provisioner: {}", e))?;

        let request = SetupRequest {
            test_id: self.test_id.clone(),
            stage: self.stage.clone(),
            spec: conf.registry.clone(),
            kubeconfig,
            temp_dir: self.temp_dir.clone(),
            cluster_metadata,
        };

        let mut artifact = provisioner
            .setup(request)
            .await
            .map_err(|e| anyhow::anyhow!("Setup failed: {}", e))?;

        let artifact_path = self.temp_dir.join(ARTIFACT_FILE);
        if artifact.is_enabled() {
            artifact
                .managed_resources
                .push(artifact_path.to_string_lossy().to_string());
        }
        std::fs::create_dir_all(&self.temp_dir)?;
        std::fs::write(&artifact_path, artifact.to_json()?)?;
        println!("✓ Artifact written to {}", artifact_path.display());

        let renderer = TableRenderer::new();
        println!("{}", renderer.render_artifact(&artifact));

        for (key, value) in &artifact.env {
            println!("export {}={}", key, value);
        }

        Ok(())
    }
}

impl TeardownCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = load_conf(&self.config_file)?;

        // Precondition read: without the artifact there is nothing to match
        // this teardown against, so this failure does propagate.
        let artifact_path = self.temp_dir.join(ARTIFACT_FILE);
        let artifact = ProvisioningArtifact::from_file(&artifact_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read setup artifact {}: {}",
                artifact_path.display(),
                e
            )
        })?;

        let kubeconfig = self
            .kubeconfig
            .clone()
            .or_else(|| std::env::var(ENV_KUBECONFIG).ok());
        let provisioner = RegistryProvisioner::with_defaults(&conf, kubeconfig)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create provisioner: {}", e))?;

        let request = TeardownRequest {
            test_id: self.test_id.clone(),
            metadata: artifact.metadata,
            managed_resources: artifact.managed_resources,
        };

        provisioner
            .teardown(request)
            .await
            .map_err(|e| anyhow::anyhow!("Teardown failed: {}", e))?;

        println!("Registry for test {} torn down", self.test_id);
        Ok(())
    }
}

impl StatusCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let client = if self.kubeconfig.is_some() {
            RegistryKubeClientImpl::new_with_config(self.kubeconfig.clone()).await
        } else {
            RegistryKubeClientImpl::new().await
        }
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

        let deployment = client
            .get_deployment(&self.namespace, REGISTRY_DEPLOYMENT)
            .await
            .ok();
        let service = client.get_service(&self.namespace, REGISTRY_SERVICE).await.ok();

        let ready = deployment
            .as_ref()
            .and_then(|d| d.status.as_ref())
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        let replicas = deployment
            .as_ref()
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.replicas)
            .unwrap_or(0);
        let cluster_ip = service
            .as_ref()
            .and_then(|s| s.spec.as_ref())
            .and_then(|s| s.cluster_ip.clone());
        let node_port = service
            .as_ref()
            .and_then(|s| s.spec.as_ref())
            .and_then(|s| s.ports.as_ref())
            .and_then(|p| p.first())
            .and_then(|p| p.node_port);

        let renderer = TableRenderer::new();
        println!(
            "{}",
            renderer.render_status(&self.namespace, ready, replicas, cluster_ip.as_deref(), node_port)
        );

        Ok(())
    }
}
