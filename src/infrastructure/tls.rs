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

//! TLS material for the ephemeral registry
//!
//! Each setup run issues a throwaway CA and one server certificate signed by
//! it. The server certificate carries SANs for the in-cluster FQDN as well as
//! `localhost`/`127.0.0.1` so the same endpoint is valid through the
//! port-forward tunnel.

use crate::infrastructure::constants::{CA_CERT_FILE, TLS_CERT_FILE, TLS_KEY_FILE};
use crate::shared::error::{RegistryError, Result};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue, IsCa, Issuer,
    KeyPair, KeyUsagePurpose,
};
use std::fs;
use std::path::{Path, PathBuf};

const CA_COMMON_NAME: &str = "registry-kube ephemeral CA";
const ORGANIZATION: &str = "registry-kube";

/// PEM-encoded registry TLS material.
pub struct TlsBundle {
    pub ca_cert_pem: String,
    pub server_cert_pem: String,
    pub server_key_pem: String,
}

/// On-disk locations of a written [`TlsBundle`].
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub ca_cert: PathBuf,
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
}

impl TlsBundle {
    /// Issue a fresh CA and a server certificate for `fqdn`.
    pub fn issue(fqdn: &str) -> Result<Self> {
        let ca_key = KeyPair::generate()
            .map_err(|e| RegistryError::Tls(format!("failed to generate CA key: {}", e)))?;

        let mut ca_params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(CA_COMMON_NAME.to_string()),
        );
        dn.push(
            DnType::OrganizationName,
            DnValue::Utf8String(ORGANIZATION.to_string()),
        );
        ca_params.distinguished_name = dn;
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        ca_params.not_before = rcgen::date_time_ymd(2025, 1, 1);
        ca_params.not_after = rcgen::date_time_ymd(2035, 1, 1);

        let ca_cert = ca_params
            .self_signed(&ca_key)
            .map_err(|e| RegistryError::Tls(format!("failed to create CA cert: {}", e)))?;
        let ca_cert_pem = ca_cert.pem();

        let server_key = KeyPair::generate()
            .map_err(|e| RegistryError::Tls(format!("failed to generate server key: {}", e)))?;

        let sans = vec![
            fqdn.to_string(),
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ];
        let mut server_params = CertificateParams::new(sans)
            .map_err(|e| RegistryError::Tls(format!("invalid subject alt names: {}", e)))?;
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, DnValue::Utf8String(fqdn.to_string()));
        dn.push(
            DnType::OrganizationName,
            DnValue::Utf8String(ORGANIZATION.to_string()),
        );
        server_params.distinguished_name = dn;
        server_params.is_ca = IsCa::NoCa;
        server_params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        server_params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];
        server_params.not_before = rcgen::date_time_ymd(2025, 1, 1);
        server_params.not_after = rcgen::date_time_ymd(2035, 1, 1);

        let issuer = Issuer::from_ca_cert_pem(&ca_cert_pem, &ca_key)
            .map_err(|e| RegistryError::Tls(format!("failed to create issuer: {}", e)))?;
        let server_cert = server_params
            .signed_by(&server_key, &issuer)
            .map_err(|e| RegistryError::Tls(format!("failed to sign server cert: {}", e)))?;

        Ok(Self {
            ca_cert_pem,
            server_cert_pem: server_cert.pem(),
            server_key_pem: server_key.serialize_pem(),
        })
    }

    /// Write `ca.crt`, `tls.crt` and `tls.key` into `dir`, creating it first.
    pub fn write_to(&self, dir: &Path) -> Result<TlsPaths> {
        fs::create_dir_all(dir)?;

        let paths = TlsPaths {
            ca_cert: dir.join(CA_CERT_FILE),
            server_cert: dir.join(TLS_CERT_FILE),
            server_key: dir.join(TLS_KEY_FILE),
        };
        fs::write(&paths.ca_cert, &self.ca_cert_pem)?;
        fs::write(&paths.server_cert, &self.server_cert_pem)?;
        fs::write(&paths.server_key, &self.server_key_pem)?;
        Ok(paths)
    }
}
