#![allow(clippy::exit)]

use anyhow::Result;
use clap::Parser as _;
use kbase_cli::cli::{Cli, Commands};
use kbase_cli::commands::{generate_completions, run_check, run_login, run_logout, run_upload};
use kbase_cli::config::Config;
use kbase_cli::output::Output;
use kbase_cli::timing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    timing::init_tracing(cli.verbose, cli.timing);

    let out = Output::new();
    match cli.command {
        Commands::Upload(args) => {
            let config = Config::load()?.business_config(cli.api_url.as_deref());
            let report = match run_upload(config, args, &out).await {
                Ok(report) => report,
                Err(e) => {
                    out.error(format!("{e:#}"));
                    std::process::exit(1);
                }
            };
            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Check(args) => {
            if run_check(&args, &out)? > 0 {
                std::process::exit(1);
            }
        }
        Commands::Login { token, save_server } => {
            let server = cli.api_url.as_deref().filter(|_| save_server);
            run_login(token, server, &out)?;
        }
        Commands::Logout => run_logout(&out)?,
        Commands::Completions { shell } => generate_completions(shell),
    }
    Ok(())
}
