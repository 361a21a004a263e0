mod aws;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use site_serverless_lambda::provision::{provision, synthesize, teardown, ProvisionRequest};
use site_serverless_lambda::settings::{DeploySettings, StackSettings};
use tracing_subscriber::EnvFilter;

use crate::aws::{CloudFormationStackDeployer, S3ObjectStore};

#[derive(Parser)]
#[command(
    name = "provision",
    about = "Provision the static site bucket and its hello endpoint"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the CloudFormation template without touching the account
    Synth {
        #[command(flatten)]
        settings: DeploySettings,
        /// Write the template here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Upload the handler, deploy the stack, publish assets and outputs
    Deploy {
        #[command(flatten)]
        settings: DeploySettings,
        /// Also write the published outputs to this JSON file
        #[arg(long, env = "SITE_OUTPUTS_FILE")]
        outputs_file: Option<PathBuf>,
    },
    /// Empty the site bucket (all versions) and delete the stack
    Destroy {
        #[command(flatten)]
        stack: StackSettings,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Synth { settings, output } => {
            let request = ProvisionRequest::load(&settings)?;
            let synthesized = synthesize(&request)?;
            match output {
                Some(path) => std::fs::write(&path, &synthesized.template_body)
                    .with_context(|| format!("failed to write template to {}", path.display()))?,
                None => println!("{}", synthesized.template_body),
            }
        }
        Commands::Deploy {
            settings,
            outputs_file,
        } => {
            let request = ProvisionRequest::load(&settings)?;
            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let report = provision(
                &request,
                &CloudFormationStackDeployer::new(&config),
                &S3ObjectStore::new(&config),
            )
            .with_context(|| format!("provisioning stack {} failed", request.stack_name))?;

            let outputs = report
                .outputs
                .to_outputs_file(&request.stack_name)
                .context("failed to render published outputs")?;
            if let Some(path) = outputs_file {
                std::fs::write(&path, &outputs)
                    .with_context(|| format!("failed to write outputs to {}", path.display()))?;
            }
            println!("{outputs}");
        }
        Commands::Destroy { stack } => {
            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let report = teardown(
                &stack.stack_name,
                &CloudFormationStackDeployer::new(&config),
                &S3ObjectStore::new(&config),
            )
            .with_context(|| format!("tearing down stack {} failed", stack.stack_name))?;
            if report.stack_existed {
                eprintln!(
                    "Deleted stack {} ({} object versions removed)",
                    stack.stack_name, report.deleted_versions
                );
            } else {
                eprintln!("Stack {} does not exist; nothing to do", stack.stack_name);
            }
        }
    }

    Ok(())
}
