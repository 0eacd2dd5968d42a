//! Loomwork CLI entrypoint.

use clap::{Parser, Subcommand};

mod config;
mod demo;

use config::CliConfig;
use loomwork_runtime::CancelToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loomwork")]
#[command(author, version, about = "Typed dependency-inference pipeline orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the demo pipeline and print its execution plan.
    Describe,
    /// Run the demo pipeline end to end.
    Run,
    /// Inspect the demo pipeline without printing the plan; exits non-zero
    /// on any inspection error.
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::load().unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Describe => {
            let mut pipeline = demo::build_demo_pipeline()?;
            println!("{}", pipeline.describe()?);
        }
        Commands::Run => {
            let mut pipeline = demo::build_demo_pipeline()?;
            pipeline.run(&CancelToken::new()).await?;
            let out: demo::Container2<demo::Product2> = pipeline.get_last_output().await?;
            println!("{out:?}");
        }
        Commands::Validate => {
            let mut pipeline = demo::build_demo_pipeline()?;
            pipeline.describe()?;
            println!("pipeline `{}` is valid", config.pipeline_name);
        }
    }

    Ok(())
}
