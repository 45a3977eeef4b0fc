use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use git_packages::config::PackagesConfig;
use git_packages::error::PackagesError;
use git_packages::fetcher::HttpArchiveFetcher;
use git_packages::manifest::ManifestLoader;
use git_packages::output::{HumanOutput, JsonOutput, OutputMode, RunReport};
use git_packages::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "mgp")]
#[command(about = "Fetch packages from tarballs or link local checkouts into a package directory")]
#[command(version, author)]
struct Cli {
    /// Manifest file (defaults to ./git-packages.json)
    #[arg(long, global = true)]
    manifest: Option<String>,

    /// Package directory (defaults to ./packages)
    #[arg(long, global = true)]
    package_dir: Option<String>,

    /// Print a JSON report instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    #[command(about = "Download tarball packages and update the ignore list (default)")]
    Install,
    #[command(about = "Symlink local packages and update the ignore list")]
    Link,
    #[command(about = "Only update the ignore list")]
    Ignore,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PackagesError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PackagesError) -> u8 {
    match error {
        error if error.is_configuration() => 2,
        PackagesError::Http(_)
        | PackagesError::HttpStatus { .. }
        | PackagesError::InvalidHeader(_)
        | PackagesError::Extraction(_)
        | PackagesError::UnsafeArchivePath(_) => 3,
        _ => 1,
    }
}

async fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let mut config = PackagesConfig::new()?;
    if let Some(dir) = cli.package_dir.as_deref() {
        config = config.with_package_dir(dir)?;
    }
    let manifest = ManifestLoader::load(&config, cli.manifest.as_deref())?;

    let fetcher = HttpArchiveFetcher::new()?;
    let pipeline = Pipeline::new(config, fetcher);

    let mut report = RunReport::default();
    match cli.command.unwrap_or(Command::Install) {
        Command::Install => {
            report.acquired = Some(pipeline.acquire(&manifest).await?);
            report.ignored = Some(pipeline.ensure_ignored(&manifest).await?);
        }
        Command::Link => {
            report.linked = Some(pipeline.link(&manifest).await?);
            report.ignored = Some(pipeline.ensure_ignored(&manifest).await?);
        }
        Command::Ignore => {
            report.ignored = Some(pipeline.ensure_ignored(&manifest).await?);
        }
    }

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_report(&report).into_diagnostic()?,
    }
    Ok(())
}
