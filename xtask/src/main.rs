use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_CRATE: &str = "site_serverless_lambda";
const HANDLER_BIN: &str = "hello_lambda";
const PROVISION_BIN: &str = "provision";
const DIST_DIR: &str = "dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the site serverless workspace",
    long_about = "Packages the hello handler for Lambda, drives the provisioner\n\
                  (synth, deploy, destroy), and runs CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the hello handler and zip it as a Lambda `bootstrap`
    LambdaPackage {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Print the CloudFormation template (arguments are passed to `provision synth`)
    Synth {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Package the handler, then run `provision deploy` with the given arguments
    Deploy {
        #[command(flatten)]
        build: BuildArgs,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run `provision destroy` with the given arguments
    Destroy {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run CI checks (fmt, clippy, tests, lambda package)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Compilation target triple for the Lambda binary
    #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
    target: String,
    /// Build profile used for the binary
    #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
    profile: BuildProfile,
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and zip the Lambda handler
    Package,
    /// Run check + package
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn run_cargo(args: &[&str]) {
    eprintln!("+ cargo {}", args.join(" "));
    let status: ExitStatus = Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo");
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_provision(subcommand: &str, extra: &[String]) {
    let mut args = vec![
        "run",
        "-p",
        LAMBDA_CRATE,
        "--bin",
        PROVISION_BIN,
        "--",
        subcommand,
    ];
    args.extend(extra.iter().map(String::as_str));
    run_cargo(&args);
}

fn package_lambda(build: &BuildArgs) -> PathBuf {
    require_rust_target(&build.target);

    step("Build hello handler");
    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_CRATE,
        "--target",
        build.target.as_str(),
        "--bin",
        HANDLER_BIN,
    ];
    if let Some(flag) = build.profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package Lambda zip");
    let binary = Path::new("target")
        .join(&build.target)
        .join(build.profile.dir_name())
        .join(HANDLER_BIN);
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");
    let zip_path = dist_dir.join(format!("{HANDLER_BIN}.zip"));
    write_bootstrap_zip(&binary, &zip_path);

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
    zip_path
}

fn require_rust_target(target: &str) {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(_) | Err(_) => {
            eprintln!("warning: could not list installed rust targets; skipping target preflight");
            return;
        }
    };

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        eprintln!(
            "required rust target `{target}` is not installed; run `rustup target add {target}` and retry"
        );
        exit(1);
    }
}

/// Lambda custom runtimes look for an executable named `bootstrap` at the zip root.
fn write_bootstrap_zip(binary_path: &Path, zip_path: &Path) {
    let binary = fs::read(binary_path).unwrap_or_else(|error| {
        panic!(
            "expected handler binary at '{}': {error}",
            binary_path.display()
        )
    });
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry in lambda zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

/// Lambda architecture for a target triple, spelled as `provision --architecture` expects.
fn lambda_architecture(target: &str) -> Option<&'static str> {
    match target.split('-').next() {
        Some("aarch64") => Some("arm64"),
        Some("x86_64") => Some("x86-64"),
        _ => None,
    }
}

/// Points `provision deploy` at the fresh zip and, unless the caller picked
/// one, at the architecture the handler was compiled for.
fn deploy_args(zip_path: &Path, target: &str, extra: Vec<String>) -> Vec<String> {
    let mut args = vec![
        "--lambda-package".to_string(),
        zip_path.display().to_string(),
    ];
    let picked_architecture = extra
        .iter()
        .any(|arg| arg == "--architecture" || arg.starts_with("--architecture="));
    if !picked_architecture {
        if let Some(architecture) = lambda_architecture(target) {
            args.push("--architecture".to_string());
            args.push(architecture.to_string());
        }
    }
    args.extend(extra);
    args
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test site_serverless_core");
    run_cargo(&["test", "-p", "site_serverless_core"]);

    step("Test site_serverless_lambda");
    run_cargo(&["test", "-p", LAMBDA_CRATE]);

    step("Test xtask");
    run_cargo(&["test", "-p", "xtask"]);
}

fn ci_package() {
    package_lambda(&BuildArgs {
        target: "x86_64-unknown-linux-gnu".to_string(),
        profile: BuildProfile::Release,
    });
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::LambdaPackage { build } => {
            package_lambda(&build);
        }
        Commands::Synth { args } => {
            run_provision("synth", &args);
        }
        Commands::Deploy { build, args } => {
            let zip_path = package_lambda(&build);
            step("Provision stack");
            run_provision("deploy", &deploy_args(&zip_path, &build.target, args));
        }
        Commands::Destroy { args } => {
            run_provision("destroy", &args);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Package => ci_package(),
                CiJob::All => {
                    ci_check();
                    ci_package();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
