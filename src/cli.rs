use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubetop",
    version,
    about = "A live top-style dashboard for Kubernetes nodes, pods and events."
)]
pub struct CliArgs {
    /// Initial view: nodes, pods or events
    #[arg(value_name = "VIEW")]
    pub view: Option<String>,

    /// Path to a kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Start filtered to a namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Stop the dashboard on the first failed refresh
    #[arg(long)]
    pub exit_on_error: bool,

    /// Dashboard config file (YAML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
