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

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Could not acquire the port lease lock within {0:?}")]
    LockTimeout(Duration),

    #[error("No free node port found after {attempts} attempts")]
    MaxRetriesReached { attempts: usize },

    #[error("Missing required input: {0}")]
    PreconditionMissing(String),

    #[error("Provisioning stage '{stage}' failed: {reason}")]
    ResourceProvisioningFailed { stage: String, reason: String },

    #[error("Port-forward to 127.0.0.1:{port} did not become reachable within {waited:?}")]
    TunnelNotReady { port: u16, waited: Duration },

    #[error("Configuring node '{node}' failed: {reason}")]
    NodeConfigurationFailed { node: String, reason: String },

    #[error("Verification on node '{node}' failed: {reason}")]
    NodeVerificationFailed { node: String, reason: String },

    #[error("Cluster '{0}' has no nodes")]
    NoClusterNodes(String),

    #[error("Command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("TLS material error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Kubernetes API error: {0}")]
    KubeApi(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for RegistryError {
    fn from(err: kube::Error) -> Self {
        RegistryError::KubeApi(err.to_string())
    }
}

impl RegistryError {
    pub fn precondition(context: impl Into<String>) -> Self {
        Self::PreconditionMissing(context.into())
    }

    pub fn provisioning(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceProvisioningFailed {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    pub fn node_configuration(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeConfigurationFailed {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub fn node_verification(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeVerificationFailed {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}
