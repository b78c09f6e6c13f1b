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

use crate::infrastructure::constants::{AUTH_SECRET_NAME, TLS_SECRET_NAME};
use crate::infrastructure::credentials::RegistryCredentials;
use crate::infrastructure::kubernetes::resources::registry_labels;
use crate::infrastructure::tls::TlsBundle;
use crate::shared::error::Result;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

fn secret_meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(registry_labels()),
        ..Default::default()
    }
}

/// `kubernetes.io/tls` Secret mounted into the registry pod.
pub struct TlsSecretBuilder<'a> {
    namespace: String,
    bundle: &'a TlsBundle,
}

impl<'a> TlsSecretBuilder<'a> {
    pub fn new(namespace: impl Into<String>, bundle: &'a TlsBundle) -> Self {
        Self {
            namespace: namespace.into(),
            bundle,
        }
    }

    pub fn build(&self) -> Result<Secret> {
        let mut data = BTreeMap::new();
        data.insert("tls.crt".to_string(), self.bundle.server_cert_pem.clone());
        data.insert("tls.key".to_string(), self.bundle.server_key_pem.clone());

        Ok(Secret {
            metadata: secret_meta(TLS_SECRET_NAME, &self.namespace),
            type_: Some("kubernetes.io/tls".to_string()),
            string_data: Some(data),
            ..Default::default()
        })
    }
}

/// Opaque Secret holding the registry's htpasswd file.
pub struct AuthSecretBuilder<'a> {
    namespace: String,
    credentials: &'a RegistryCredentials,
}

impl<'a> AuthSecretBuilder<'a> {
    pub fn new(namespace: impl Into<String>, credentials: &'a RegistryCredentials) -> Self {
        Self {
            namespace: namespace.into(),
            credentials,
        }
    }

    pub fn build(&self) -> Result<Secret> {
        let mut data = BTreeMap::new();
        data.insert("htpasswd".to_string(), self.credentials.htpasswd.clone());

        Ok(Secret {
            metadata: secret_meta(AUTH_SECRET_NAME, &self.namespace),
            type_: Some("Opaque".to_string()),
            string_data: Some(data),
            ..Default::default()
        })
    }
}

/// `kubernetes.io/dockerconfigjson` Secret for pulling from the registry.
pub struct PullSecretBuilder<'a> {
    name: String,
    namespace: String,
    server: String,
    credentials: &'a RegistryCredentials,
}

impl<'a> PullSecretBuilder<'a> {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        server: impl Into<String>,
        credentials: &'a RegistryCredentials,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            server: server.into(),
            credentials,
        }
    }

    pub fn build(&self) -> Result<Secret> {
        let config = serde_json::json!({
            "auths": {
                &self.server: {
                    "username": self.credentials.username,
                    "password": self.credentials.password,
                    "auth": self.credentials.docker_auth(),
                }
            }
        });

        let mut data = BTreeMap::new();
        data.insert(".dockerconfigjson".to_string(), config.to_string());

        Ok(Secret {
            metadata: secret_meta(&self.name, &self.namespace),
            type_: Some("kubernetes.io/dockerconfigjson".to_string()),
            string_data: Some(data),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> RegistryCredentials {
        RegistryCredentials::generate().expect("generate")
    }

    #[test]
    fn tls_secret_has_cert_and_key() {
        let bundle = TlsBundle::issue("registry.reg.svc.cluster.local").expect("issue");
        let secret = TlsSecretBuilder::new("reg", &bundle).build().expect("build");

        assert_eq!(secret.metadata.name.as_deref(), Some(TLS_SECRET_NAME));
        assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/tls"));
        let data = secret.string_data.expect("string data");
        assert!(data.contains_key("tls.crt"));
        assert!(data.contains_key("tls.key"));
    }

    #[test]
    fn auth_secret_holds_the_htpasswd_line() {
        let creds = credentials();
        let secret = AuthSecretBuilder::new("reg", &creds).build().expect("build");

        let data = secret.string_data.expect("string data");
        assert_eq!(data.get("htpasswd"), Some(&creds.htpasswd));
    }

    #[test]
    fn pull_secret_embeds_the_server_address() {
        let creds = credentials();
        let secret = PullSecretBuilder::new(
            "registry-pull",
            "default",
            "registry.reg.svc.cluster.local:30500",
            &creds,
        )
        .build()
        .expect("build");

        assert_eq!(
            secret.type_.as_deref(),
            Some("kubernetes.io/dockerconfigjson")
        );
        let data = secret.string_data.expect("string data");
        let config: serde_json::Value =
            serde_json::from_str(data.get(".dockerconfigjson").expect("config")).expect("json");
        let auth = &config["auths"]["registry.reg.svc.cluster.local:30500"];
        assert_eq!(auth["username"], creds.username);
        assert_eq!(auth["auth"], creds.docker_auth());
    }
}
