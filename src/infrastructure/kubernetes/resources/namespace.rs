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

use crate::infrastructure::kubernetes::resources::registry_labels;
use crate::shared::error::Result;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

pub struct NamespaceBuilder {
    name: String,
}

impl NamespaceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn build(&self) -> Result<Namespace> {
        Ok(Namespace {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                labels: Some(registry_labels()),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::constants::{LABEL_TYPE, LABEL_TYPE_VALUE};

    #[test]
    fn namespace_carries_the_managed_label() {
        let namespace = NamespaceBuilder::new("reg-test").build().expect("build");
        assert_eq!(namespace.metadata.name.as_deref(), Some("reg-test"));
        let labels = namespace.metadata.labels.expect("labels");
        assert_eq!(labels.get(LABEL_TYPE).map(String::as_str), Some(LABEL_TYPE_VALUE));
    }
}
