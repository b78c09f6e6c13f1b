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

/// NodePort allocation range
pub const NODE_PORT_MIN: u16 = 30000;
pub const NODE_PORT_MAX: u16 = 32767;

/// Port lease coordination
pub const DEFAULT_LEASE_FILE: &str = "/tmp/registry-kube-ports.json";
pub const LOCK_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_LOCK_WAIT_SECS: u64 = 30;
pub const DEFAULT_ACQUIRE_RETRIES: usize = 10;
pub const CANDIDATE_SAMPLE_LIMIT: usize = 64;

/// Tunnel readiness
pub const TUNNEL_POLL_INTERVAL_MS: u64 = 250;
pub const TUNNEL_READY_TIMEOUT_SECS: u64 = 30;

/// Registry deployment readiness
pub const REGISTRY_READY_TIMEOUT_SECS: u64 = 300;
pub const REGISTRY_READY_INTERVAL_SECS: u64 = 5;

/// Registry workload
pub const REGISTRY_IMAGE: &str = "docker.io/library/registry:2";
pub const REGISTRY_SERVICE: &str = "registry";
pub const REGISTRY_DEPLOYMENT: &str = "registry";
pub const REGISTRY_CONTAINER: &str = "registry";
pub const REGISTRY_CONTAINER_PORT: i32 = 5000;
pub const REGISTRY_USERNAME: &str = "registry";
pub const TLS_SECRET_NAME: &str = "registry-tls";
pub const AUTH_SECRET_NAME: &str = "registry-auth";
pub const POD_CLUSTER_DOMAIN: &str = "cluster.local";

/// Resource labels
pub const LABEL_APP: &str = "app";
pub const LABEL_TYPE: &str = "type";
pub const LABEL_TYPE_VALUE: &str = "registry-kube-managed";

/// Volume and VolumeMount names
pub const VOLUME_NAME_TLS: &str = "registry-tls";
pub const VOLUME_NAME_AUTH: &str = "registry-auth";
pub const TLS_MOUNT_PATH: &str = "/certs";
pub const AUTH_MOUNT_PATH: &str = "/auth";

/// Node-local containerd trust paths
pub const CONTAINERD_CERTS_DIR: &str = "/etc/containerd/certs.d";
pub const NODE_HOSTS_FILE: &str = "/etc/hosts";
pub const TRUST_CA_FILE: &str = "ca.crt";
pub const TRUST_HOSTS_FILE: &str = "hosts.toml";

/// External tools
pub const KIND_BIN: &str = "kind";
pub const KUBECTL_BIN: &str = "kubectl";
pub const DEFAULT_CONTAINER_ENGINE: &str = "docker";

/// Environment variables consumed
pub const ENV_CONTAINER_ENGINE: &str = "CONTAINER_ENGINE";
pub const ENV_ENGINE_CMD_PREFIX: &str = "ENGINE_CMD_PREFIX";
pub const ENV_ENGINE_SUDO_CMD_PREFIX: &str = "ENGINE_SUDO_CMD_PREFIX";
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";

/// Environment variables produced for downstream consumers
pub const ENV_OUT_ADDRESS: &str = "REGISTRY_ADDRESS";
pub const ENV_OUT_HOST: &str = "REGISTRY_HOST";
pub const ENV_OUT_PORT: &str = "REGISTRY_PORT";
pub const ENV_OUT_NAMESPACE: &str = "REGISTRY_NAMESPACE";
pub const ENV_OUT_CA_PATH: &str = "REGISTRY_CA_PATH";

/// Artifact metadata keys
pub const META_CLUSTER_ID: &str = "cluster.id";
pub const META_FQDN: &str = "registry.fqdn";
pub const META_NAMESPACE: &str = "registry.namespace";
pub const META_CA_CERT: &str = "registry.ca-cert";
pub const META_CREDENTIALS: &str = "registry.credentials";
pub const META_ENABLED: &str = "registry.enabled";
pub const META_PORT: &str = "registry.port";
pub const META_STAGE: &str = "pipeline.stage";

/// Artifact files
pub const ARTIFACT_FILE: &str = "registry-artifact.json";
pub const CREDENTIALS_FILE: &str = "registry-credentials.json";
pub const CERTS_SUBDIR: &str = "certs";
pub const CA_CERT_FILE: &str = "ca.crt";
pub const TLS_CERT_FILE: &str = "tls.crt";
pub const TLS_KEY_FILE: &str = "tls.key";
