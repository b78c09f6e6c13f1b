//! Table rendering for CLI output

use crate::domain::registry::ProvisioningArtifact;
use crate::infrastructure::constants::{
    META_CA_CERT, META_FQDN, META_NAMESPACE, META_PORT,
};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};

/// Table renderer for formatted output
#[derive(Default)]
pub struct TableRenderer;

impl TableRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render the key facts of a provisioning artifact
    pub fn render_artifact(&self, artifact: &ProvisioningArtifact) -> String {
        if !artifact.is_enabled() {
            return format!(
                "Registry provisioning for test {} is {}",
                artifact.test_id,
                "disabled".yellow()
            );
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("FIELD").set_alignment(CellAlignment::Left),
                Cell::new("VALUE").set_alignment(CellAlignment::Left),
            ]);

        table.add_row(vec![Cell::new("Test ID"), Cell::new(&artifact.test_id)]);
        for (label, key) in [
            ("Registry FQDN", META_FQDN),
            ("Namespace", META_NAMESPACE),
            ("Node port", META_PORT),
            ("CA certificate", META_CA_CERT),
        ] {
            if let Some(value) = artifact.metadata.get(key) {
                table.add_row(vec![Cell::new(label), Cell::new(value)]);
            }
        }
        table.add_row(vec![
            Cell::new("Created"),
            Cell::new(artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ]);

        table.to_string()
    }

    /// Render the registry workload state in a namespace
    pub fn render_status(
        &self,
        namespace: &str,
        ready: i32,
        replicas: i32,
        cluster_ip: Option<&str>,
        node_port: Option<i32>,
    ) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("NAMESPACE"),
                Cell::new("READY").set_alignment(CellAlignment::Center),
                Cell::new("CLUSTER-IP"),
                Cell::new("NODE-PORT").set_alignment(CellAlignment::Center),
                Cell::new("STATUS").set_alignment(CellAlignment::Center),
            ]);

        let (status, color) = if replicas == 0 {
            ("Missing", Color::Red)
        } else if ready == replicas {
            ("Running", Color::Green)
        } else {
            ("Degraded", Color::Yellow)
        };

        table.add_row(vec![
            Cell::new(namespace),
            Cell::new(format!("{}/{}", ready, replicas)).set_alignment(CellAlignment::Center),
            Cell::new(cluster_ip.unwrap_or("-")),
            Cell::new(
                node_port
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            )
            .set_alignment(CellAlignment::Center),
            Cell::new(status)
                .fg(color)
                .set_alignment(CellAlignment::Center),
        ]);

        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::constants::META_ENABLED;

    #[test]
    fn disabled_artifact_renders_a_single_line() {
        let artifact = ProvisioningArtifact::disabled("t-render");
        let rendered = TableRenderer::new().render_artifact(&artifact);
        assert!(rendered.contains("t-render"));
        assert!(rendered.contains("disabled"));
    }

    #[test]
    fn enabled_artifact_renders_metadata_rows() {
        let mut artifact = ProvisioningArtifact::new("t-render");
        artifact
            .metadata
            .insert(META_ENABLED.to_string(), "true".to_string());
        artifact
            .metadata
            .insert(META_FQDN.to_string(), "registry.reg.svc.cluster.local".to_string());
        artifact
            .metadata
            .insert(META_PORT.to_string(), "30500".to_string());

        let rendered = TableRenderer::new().render_artifact(&artifact);
        assert!(rendered.contains("registry.reg.svc.cluster.local"));
        assert!(rendered.contains("30500"));
    }
}
