use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "kbase")]
#[command(version, about = "Upload documents to a knowledge base", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Knowledge API base URL (overrides the saved server)
    #[arg(long, global = true, env = "KBASE_API_URL")]
    pub api_url: Option<String>,

    /// Show timing/latency information
    #[arg(long, global = true)]
    pub timing: bool,

    /// Enable verbose debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload files to a knowledge base
    Upload(UploadArgs),
    /// Validate files without uploading them
    Check(CheckArgs),
    /// Save an API token
    Login {
        /// Token to save (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,

        /// Also remember this server as the default
        #[arg(long)]
        save_server: bool,
    },
    /// Forget the saved API token
    Logout,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Validation overrides shared by `upload` and `check`.
#[derive(Args, Debug, Clone, Default)]
pub struct IntakeArgs {
    /// Allowed extension; repeat to allow several (default: .pdf .txt .doc .docx)
    #[arg(long = "allow-ext", value_name = "EXT")]
    pub allow_ext: Vec<String>,

    /// Per-file size limit in bytes (default: 10 MiB)
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Knowledge base ID
    #[arg(long, short = 'k')]
    pub knowledge: String,

    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub intake: IntakeArgs,

    /// Delete the file record when its upload fails
    #[arg(long)]
    pub cleanup_orphans: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Suppress progress bars
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Files to validate
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub intake: IntakeArgs,
}
