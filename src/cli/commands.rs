// CLI command definitions

use super::registry::{SetupCommand, StatusCommand, TeardownCommand};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "registry-kube",
    version,
    about = "Ephemeral TLS registry provisioner for Kubernetes test clusters",
    long_about = "Provisions a TLS-secured container registry inside a throwaway kind cluster and makes it reachable and trusted from the host and every cluster node"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Provision the registry for a test run (lease a port, deploy, trust, tunnel)
    Setup(SetupCommand),

    /// Tear down a previously provisioned registry (best-effort)
    Teardown(TeardownCommand),

    /// Show the registry workload state in a namespace
    Status(StatusCommand),
}
