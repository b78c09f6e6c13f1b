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

//! End-to-end pipeline scenarios against fake collaborators.

use async_trait::async_trait;
use registry_kube::domain::pipeline::{ClusterResources, TunnelFactory};
use registry_kube::domain::registry::RegistryEndpoint;
use registry_kube::infrastructure::credentials::RegistryCredentials;
use registry_kube::infrastructure::engine::RegistrySession;
use registry_kube::infrastructure::tls::TlsBundle;
use registry_kube::{
    NodeOutcome, PortAllocator, ProvisioningArtifact, PullSecretSpec, RegistryError,
    RegistryProvisioner, RegistrySpec, Result, SetupRequest, TeardownRequest, TrustConfigurator,
    Tunnel, TunnelRegistry,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

mod test_utils {
    use super::*;

    pub const TEST_PORT: u16 = 30500;

    pub struct FakeAllocator {
        pub acquire_calls: AtomicUsize,
        pub released: Mutex<Vec<String>>,
    }

    impl FakeAllocator {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                acquire_calls: AtomicUsize::new(0),
                released: Mutex::new(Vec::new()),
            })
        }
    }

    impl PortAllocator for FakeAllocator {
        fn acquire(&self, _owner: &str) -> Result<u16> {
            self.acquire_calls.fetch_add(1, Ordering::SeqCst);
            Ok(TEST_PORT)
        }

        fn release(&self, owner: &str) -> Result<()> {
            self.released.lock().unwrap().push(owner.to_string());
            Ok(())
        }
    }

    pub struct FakeResources {
        pub fail_stage: Option<&'static str>,
        pub fail_namespace_delete: bool,
        pub pull_secrets: Mutex<Vec<(String, String)>>,
        pub deleted_namespaces: Mutex<Vec<String>>,
    }

    impl FakeResources {
        pub fn ok() -> Self {
            Self {
                fail_stage: None,
                fail_namespace_delete: false,
                pull_secrets: Mutex::new(Vec::new()),
                deleted_namespaces: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_at(stage: &'static str) -> Self {
            Self {
                fail_stage: Some(stage),
                ..Self::ok()
            }
        }

        fn check(&self, stage: &'static str) -> Result<()> {
            if self.fail_stage == Some(stage) {
                return Err(RegistryError::KubeApi(format!("fake {} outage", stage)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ClusterResources for FakeResources {
        async fn provision_scaffolding(&self, _namespace: &str) -> Result<()> {
            self.check("scaffolding")
        }

        async fn provision_credentials(
            &self,
            _namespace: &str,
            _credentials: &RegistryCredentials,
        ) -> Result<()> {
            self.check("credentials")
        }

        async fn provision_tls(&self, _namespace: &str, _tls: &TlsBundle) -> Result<()> {
            self.check("tls")
        }

        async fn deploy_registry(&self, _namespace: &str, _port: u16) -> Result<()> {
            self.check("registry-deployment")
        }

        async fn wait_registry_ready(&self, _namespace: &str) -> Result<()> {
            self.check("registry-ready")
        }

        async fn create_pull_secret(
            &self,
            namespace: &str,
            name: &str,
            _server: &str,
            _credentials: &RegistryCredentials,
        ) -> Result<()> {
            self.pull_secrets
                .lock()
                .unwrap()
                .push((namespace.to_string(), name.to_string()));
            Ok(())
        }

        async fn delete_namespace(&self, namespace: &str) -> Result<()> {
            if self.fail_namespace_delete {
                return Err(RegistryError::KubeApi("fake delete outage".to_string()));
            }
            self.deleted_namespaces
                .lock()
                .unwrap()
                .push(namespace.to_string());
            Ok(())
        }
    }

    pub struct FakeTrust {
        pub fail: bool,
    }

    #[async_trait]
    impl TrustConfigurator for FakeTrust {
        async fn configure(
            &self,
            _cluster_id: &str,
            _endpoint: &RegistryEndpoint,
            _ca_cert: &Path,
        ) -> Result<Vec<NodeOutcome>> {
            if self.fail {
                return Err(RegistryError::node_configuration(
                    "kind-worker",
                    "fake containerd failure",
                ));
            }
            Ok(vec![NodeOutcome {
                node: "kind-control-plane".to_string(),
                configured: true,
                verified: true,
            }])
        }
    }

    pub struct FakeSession {
        pub mirrored: Mutex<Vec<String>>,
    }

    impl FakeSession {
        pub fn new() -> Self {
            Self {
                mirrored: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RegistrySession for FakeSession {
        async fn login(&self, _endpoint: &str, _credentials: &RegistryCredentials) -> Result<()> {
            Ok(())
        }

        async fn mirror(&self, image: &str, _local: &str, cluster: &str) -> Result<String> {
            self.mirrored.lock().unwrap().push(image.to_string());
            Ok(format!("{}/{}", cluster, image.rsplit('/').next().unwrap()))
        }
    }

    pub struct FakeTunnel {
        port: u16,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tunnel for FakeTunnel {
        async fn start(&mut self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn local_endpoint(&self) -> String {
            format!("127.0.0.1:{}", self.port)
        }
    }

    pub struct TunnelCounters {
        pub starts: Arc<AtomicUsize>,
        pub stops: Arc<AtomicUsize>,
    }

    pub fn counting_tunnel_factory() -> (TunnelFactory, TunnelCounters) {
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let counters = TunnelCounters {
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        };
        let factory: TunnelFactory = Box::new(move |_namespace, port, _kubeconfig| {
            Box::new(FakeTunnel {
                port,
                starts: Arc::clone(&starts),
                stops: Arc::clone(&stops),
            })
        });
        (factory, counters)
    }

    pub fn request(test_id: &str, enabled: bool, temp_dir: &Path) -> SetupRequest {
        let mut cluster_metadata = HashMap::new();
        cluster_metadata.insert("cluster.id".to_string(), "kind-pipeline".to_string());

        SetupRequest {
            test_id: test_id.to_string(),
            stage: "e2e".to_string(),
            spec: RegistrySpec {
                enabled,
                namespace: "reg-test".to_string(),
                images: vec!["docker.io/library/busybox:latest".to_string()],
                pull_secret: Some(PullSecretSpec {
                    name: "registry-pull".to_string(),
                    namespaces: vec!["default".to_string(), "apps".to_string()],
                }),
            },
            kubeconfig: None,
            temp_dir: temp_dir.to_path_buf(),
            cluster_metadata,
        }
    }
}

use test_utils::*;

#[tokio::test]
async fn disabled_setup_never_touches_the_port_allocator() {
    let temp = tempfile::tempdir().expect("tempdir");
    let allocator = FakeAllocator::new();
    let (factory, _counters) = counting_tunnel_factory();
    let provisioner = RegistryProvisioner::new(
        Arc::clone(&allocator) as Arc<dyn PortAllocator>,
        Box::new(FakeResources::ok()),
        Box::new(FakeTrust { fail: false }),
        Box::new(FakeSession::new()),
        factory,
    );

    let artifact = provisioner
        .setup(request("t-disabled", false, temp.path()))
        .await
        .expect("setup");

    assert_eq!(
        artifact.metadata.get("registry.enabled").map(String::as_str),
        Some("false")
    );
    assert!(artifact.files.is_empty());
    assert!(artifact.managed_resources.is_empty());
    assert_eq!(allocator.acquire_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn successful_setup_restarts_the_tunnel_and_fills_the_artifact() {
    let temp = tempfile::tempdir().expect("tempdir");
    let allocator = FakeAllocator::new();
    let (factory, counters) = counting_tunnel_factory();
    let provisioner = RegistryProvisioner::new(
        Arc::clone(&allocator) as Arc<dyn PortAllocator>,
        Box::new(FakeResources::ok()),
        Box::new(FakeTrust { fail: false }),
        Box::new(FakeSession::new()),
        factory,
    );

    let artifact = provisioner
        .setup(request("t-success", true, temp.path()))
        .await
        .expect("setup");

    // One tunnel before trust configuration, a fresh one after it.
    assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
    assert_eq!(counters.stops.load(Ordering::SeqCst), 1);

    assert_eq!(
        artifact.metadata.get("registry.enabled").map(String::as_str),
        Some("true")
    );
    assert_eq!(
        artifact.metadata.get("registry.port").map(String::as_str),
        Some("30500")
    );
    assert_eq!(
        artifact.metadata.get("registry.fqdn").map(String::as_str),
        Some("registry.reg-test.svc.cluster.local")
    );
    assert_eq!(
        artifact.env.get("REGISTRY_ADDRESS").map(String::as_str),
        Some("registry.reg-test.svc.cluster.local:30500")
    );
    assert!(artifact.env.contains_key("REGISTRY_CA_PATH"));

    // Material was actually written into the temp dir.
    assert!(temp.path().join("certs").join("ca.crt").is_file());
    assert!(temp.path().join("registry-credentials.json").is_file());

    // The second tunnel stays parked for teardown.
    let registry = TunnelRegistry::global();
    assert!(registry.contains("t-success"));
    let mut tunnel = registry.take("t-success").expect("parked tunnel");
    tunnel.stop().await;
}

#[tokio::test]
async fn trust_failure_releases_the_lease_and_stops_the_tunnel() {
    let temp = tempfile::tempdir().expect("tempdir");
    let allocator = FakeAllocator::new();
    let (factory, counters) = counting_tunnel_factory();
    let provisioner = RegistryProvisioner::new(
        Arc::clone(&allocator) as Arc<dyn PortAllocator>,
        Box::new(FakeResources::ok()),
        Box::new(FakeTrust { fail: true }),
        Box::new(FakeSession::new()),
        factory,
    );

    let err = provisioner
        .setup(request("t-trust-fail", true, temp.path()))
        .await
        .expect_err("setup must fail");

    match err {
        RegistryError::NodeConfigurationFailed { node, .. } => assert_eq!(node, "kind-worker"),
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(
        *allocator.released.lock().unwrap(),
        vec!["kind-pipeline".to_string()]
    );
    assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
    assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    assert!(!TunnelRegistry::global().contains("t-trust-fail"));
}

#[tokio::test]
async fn provisioning_failure_names_the_stage_and_cleans_up() {
    let temp = tempfile::tempdir().expect("tempdir");
    let allocator = FakeAllocator::new();
    let (factory, counters) = counting_tunnel_factory();
    let provisioner = RegistryProvisioner::new(
        Arc::clone(&allocator) as Arc<dyn PortAllocator>,
        Box::new(FakeResources::failing_at("tls")),
        Box::new(FakeTrust { fail: false }),
        Box::new(FakeSession::new()),
        factory,
    );

    let err = provisioner
        .setup(request("t-tls-fail", true, temp.path()))
        .await
        .expect_err("setup must fail");

    match err {
        RegistryError::ResourceProvisioningFailed { stage, .. } => assert_eq!(stage, "tls"),
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(
        *allocator.released.lock().unwrap(),
        vec!["kind-pipeline".to_string()]
    );
    // The pipeline never reached the tunnel stage.
    assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_cluster_id_is_a_precondition_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let allocator = FakeAllocator::new();
    let (factory, _counters) = counting_tunnel_factory();
    let provisioner = RegistryProvisioner::new(
        Arc::clone(&allocator) as Arc<dyn PortAllocator>,
        Box::new(FakeResources::ok()),
        Box::new(FakeTrust { fail: false }),
        Box::new(FakeSession::new()),
        factory,
    );

    let mut req = request("t-no-cluster", true, temp.path());
    req.cluster_metadata.clear();

    let err = provisioner.setup(req).await.expect_err("setup must fail");
    assert!(matches!(err, RegistryError::PreconditionMissing(_)));
    assert_eq!(allocator.acquire_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn teardown_is_best_effort_and_always_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");
    let allocator = FakeAllocator::new();
    let (factory, counters) = counting_tunnel_factory();

    let resources = FakeResources {
        fail_namespace_delete: true,
        ..FakeResources::ok()
    };
    let provisioner = RegistryProvisioner::new(
        Arc::clone(&allocator) as Arc<dyn PortAllocator>,
        Box::new(resources),
        Box::new(FakeTrust { fail: false }),
        Box::new(FakeSession::new()),
        factory,
    );

    // Run a full setup so a tunnel is parked and files exist on disk.
    let artifact = provisioner
        .setup(request("t-teardown", true, temp.path()))
        .await
        .expect("setup");
    let managed_file = temp.path().join("registry-credentials.json");
    assert!(managed_file.is_file());

    provisioner
        .teardown(TeardownRequest {
            test_id: "t-teardown".to_string(),
            metadata: artifact.metadata,
            managed_resources: artifact.managed_resources,
        })
        .await
        .expect("teardown must swallow step failures");

    // Tunnel from setup (2 starts) was stopped a second time by teardown.
    assert_eq!(counters.stops.load(Ordering::SeqCst), 2);
    assert!(!TunnelRegistry::global().contains("t-teardown"));
    assert!(!managed_file.exists());
    assert_eq!(
        *allocator.released.lock().unwrap(),
        vec!["kind-pipeline".to_string()]
    );
}

#[tokio::test]
async fn teardown_of_a_disabled_artifact_is_a_noop() {
    let allocator = FakeAllocator::new();
    let (factory, _counters) = counting_tunnel_factory();
    let provisioner = RegistryProvisioner::new(
        Arc::clone(&allocator) as Arc<dyn PortAllocator>,
        Box::new(FakeResources::ok()),
        Box::new(FakeTrust { fail: false }),
        Box::new(FakeSession::new()),
        factory,
    );

    let artifact = ProvisioningArtifact::disabled("t-disabled-teardown");
    provisioner
        .teardown(TeardownRequest {
            test_id: "t-disabled-teardown".to_string(),
            metadata: artifact.metadata,
            managed_resources: artifact.managed_resources,
        })
        .await
        .expect("teardown");

    assert!(allocator.released.lock().unwrap().is_empty());
}
