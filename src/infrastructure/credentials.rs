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

use crate::infrastructure::constants::REGISTRY_USERNAME;
use crate::shared::error::{RegistryError, Result};
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const PASSWORD_LENGTH: usize = 32;

/// Basic-auth credentials for the ephemeral registry. Generated once per
/// setup run; the htpasswd line goes into the registry's auth Secret, the
/// plaintext pair into the run's credentials file for `docker login` and
/// image-pull Secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    pub htpasswd: String,
}

impl RegistryCredentials {
    pub fn generate() -> Result<Self> {
        let password = Alphanumeric.sample_string(&mut rand::thread_rng(), PASSWORD_LENGTH);
        let hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
            .map_err(|e| RegistryError::ConfigError(format!("htpasswd hash failed: {}", e)))?;

        Ok(Self {
            username: REGISTRY_USERNAME.to_string(),
            htpasswd: format!("{}:{}", REGISTRY_USERNAME, hash),
            password,
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The base64 `user:password` form used in dockerconfigjson Secrets.
    pub fn docker_auth(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htpasswd_line_verifies_against_the_password() {
        let creds = RegistryCredentials::generate().expect("generate");
        assert_eq!(creds.username, REGISTRY_USERNAME);
        assert_eq!(creds.password.len(), PASSWORD_LENGTH);

        let (user, hash) = creds.htpasswd.split_once(':').expect("htpasswd shape");
        assert_eq!(user, creds.username);
        assert!(bcrypt::verify(&creds.password, hash).expect("verify"));
    }

    #[test]
    fn docker_auth_decodes_to_user_and_password() {
        use base64::Engine;
        let creds = RegistryCredentials::generate().expect("generate");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(creds.docker_auth())
            .expect("decode");
        assert_eq!(
            String::from_utf8(decoded).expect("utf8"),
            format!("{}:{}", creds.username, creds.password)
        );
    }
}
