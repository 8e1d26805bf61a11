use clap::Parser;
use std::path::PathBuf;

/// Start-up options for the sidecar. Everything else lives in the workspace.
#[derive(Debug, Parser, Clone)]
#[command(name = "schoold", version, about = "School grading and fee ledger sidecar")]
pub struct Config {
    /// Workspace directory to open before reading requests.
    #[arg(long, env = "SCHOOLD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[arg(long, env = "SCHOOLD_LOG", default_value = "info")]
    pub log_level: String,
}
