use std::path::PathBuf;

use clap::{Args, ValueEnum};
use site_serverless_core::topology::{Architecture, DEFAULT_STAGE};

pub const DEFAULT_STACK_NAME: &str = "site-serverless";
pub const DEFAULT_ASSET_DIR: &str = "frontend";
pub const DEFAULT_LAMBDA_PACKAGE: &str = "dist/hello_lambda.zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LambdaArchitecture {
    #[default]
    #[value(name = "x86-64")]
    X86_64,
    Arm64,
}

impl From<LambdaArchitecture> for Architecture {
    fn from(value: LambdaArchitecture) -> Self {
        match value {
            LambdaArchitecture::X86_64 => Architecture::X86_64,
            LambdaArchitecture::Arm64 => Architecture::Arm64,
        }
    }
}

/// Stack identity shared by every provisioning command.
#[derive(Debug, Clone, Args)]
pub struct StackSettings {
    /// CloudFormation stack name
    #[arg(long, env = "SITE_STACK_NAME", default_value = DEFAULT_STACK_NAME)]
    pub stack_name: String,
}

/// Inputs needed to declare (and deploy) the stack.
#[derive(Debug, Clone, Args)]
pub struct DeploySettings {
    #[command(flatten)]
    pub stack: StackSettings,
    /// Gateway stage; `$default` serves routes at the API root
    #[arg(long, env = "SITE_STAGE", default_value = DEFAULT_STAGE)]
    pub stage: String,
    /// Local directory uploaded into the site bucket
    #[arg(long, env = "SITE_ASSET_DIR", default_value = DEFAULT_ASSET_DIR)]
    pub asset_dir: PathBuf,
    /// Existing bucket that receives the packaged handler zip
    #[arg(long, env = "SITE_ARTIFACT_BUCKET")]
    pub artifact_bucket: String,
    /// Zip produced by `cargo run -p xtask -- lambda-package`
    #[arg(long, env = "SITE_LAMBDA_PACKAGE", default_value = DEFAULT_LAMBDA_PACKAGE)]
    pub lambda_package: PathBuf,
    #[arg(value_enum, long, env = "SITE_LAMBDA_ARCH", default_value_t = LambdaArchitecture::X86_64)]
    pub architecture: LambdaArchitecture,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: DeploySettings,
    }

    #[test]
    fn defaults_apply_when_only_bucket_is_given() {
        let cli = TestCli::try_parse_from(["provision", "--artifact-bucket", "build-artifacts"])
            .expect("settings should parse");

        assert_eq!(cli.settings.stage, "$default");
        assert_eq!(cli.settings.asset_dir, PathBuf::from("frontend"));
        assert_eq!(
            cli.settings.lambda_package,
            PathBuf::from("dist/hello_lambda.zip")
        );
        assert_eq!(cli.settings.architecture, LambdaArchitecture::X86_64);
    }

    #[test]
    fn architecture_flag_maps_to_topology_value() {
        let cli = TestCli::try_parse_from([
            "provision",
            "--artifact-bucket",
            "build-artifacts",
            "--architecture",
            "arm64",
        ])
        .expect("settings should parse");

        assert_eq!(
            Architecture::from(cli.settings.architecture),
            Architecture::Arm64
        );
    }
}
