use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use naip_fetch::app::Downloader;
use naip_fetch::config::{ConfigLoader, DownloadOverrides, Environment};
use naip_fetch::credentials::S3cmdConfig;
use naip_fetch::domain::{Lister, SampleCount, Selection};
use naip_fetch::error::NaipError;
use naip_fetch::listing::KeyLister;
use naip_fetch::output::{ConsoleOutput, JsonOutput, OutputMode};
use naip_fetch::s3::{ObjectFetcher, S3Client, S3Settings};
use naip_fetch::s3cmd::S3cmdLister;
use naip_fetch::store::Store;

const USAGE: &str = "parameters are: download";

#[derive(Parser)]
#[command(name = "naip-fetch")]
#[command(about = "Download a random sample of NAIP tiles from the aws-naip requester-pays bucket")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List, sample, and download NAIP tiles")]
    Download(DownloadArgs),
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(long, help = "Path to a JSON config file (default: naip-fetch.json if present)")]
    config: Option<String>,

    #[arg(long, help = "region/year/resolution/spectrum/grid, e.g. md/2013/1m/rgbir/38077")]
    selection: Option<String>,

    #[arg(long, allow_hyphen_values = true, help = "Number of tiles, or `all` / -1")]
    count: Option<String>,

    #[arg(long)]
    lister: Option<Lister>,

    #[arg(long, help = "Seed for reproducible sampling")]
    seed: Option<u64>,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = err.print();
            } else {
                println!("{USAGE}");
            }
            return ExitCode::SUCCESS;
        }
    };

    let Some(Commands::Download(args)) = cli.command else {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    };

    if let Err(report) = run(args) {
        eprintln!("{report:?}");
        if let Some(naip) = report.downcast_ref::<NaipError>() {
            return ExitCode::from(map_exit_code(naip));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &NaipError) -> u8 {
    match error {
        NaipError::MissingEnv(_)
        | NaipError::InvalidSelection(_)
        | NaipError::InvalidSampleCount(_)
        | NaipError::UnsafeKey(_)
        | NaipError::ConfigRead(_)
        | NaipError::ConfigParse(_)
        | NaipError::CredentialFile { .. } => 2,
        NaipError::MissingTool(_)
        | NaipError::Listing(_)
        | NaipError::S3(_)
        | NaipError::ObjectNotFound { .. } => 3,
        _ => 1,
    }
}

fn run(args: DownloadArgs) -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let DownloadArgs {
        config,
        selection,
        count,
        lister,
        seed,
        json,
    } = args;

    let overrides = DownloadOverrides {
        selection: selection
            .map(|value| value.parse::<Selection>())
            .transpose()?,
        count: count
            .map(|value| value.parse::<SampleCount>())
            .transpose()?,
        lister,
    };
    let mut resolved = ConfigLoader::resolve(config.as_deref())?;
    resolved.apply(overrides);

    let env = Environment::from_env();
    let store = Store::new(&env)?;
    let s3 = S3Client::new(&S3Settings::resolve(&resolved, &env))?;
    let output_mode = if json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    tracing::debug!(
        prefix = %resolved.prefix(),
        count = %resolved.count,
        lister = %resolved.lister,
        "resolved configuration"
    );

    match resolved.lister {
        Lister::Native => {
            let downloader =
                Downloader::new(store, resolved.prefix(), resolved.count, &s3, &s3)?;
            run_download(&downloader, &mut rng, output_mode)
        }
        Lister::S3cmd => {
            let s3cmd = S3cmdLister::new();
            tracing::debug!(tool = ?s3cmd.tool_info(), "using s3cmd lister");
            let downloader =
                Downloader::new(store, resolved.prefix(), resolved.count, s3cmd, &s3)?;
            let outcome = S3cmdConfig::locate(&env)?.ensure_configured(&env.require_credentials()?)?;
            tracing::debug!(?outcome, "s3cmd credentials");
            run_download(&downloader, &mut rng, output_mode)
        }
    }
}

fn run_download<L: KeyLister, F: ObjectFetcher>(
    downloader: &Downloader<L, F>,
    rng: &mut StdRng,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => {
            let report = downloader.download_naips(rng, &JsonOutput)?;
            JsonOutput::print_report(&report).into_diagnostic()?;
        }
        OutputMode::Console => {
            let report = downloader.download_naips(rng, &ConsoleOutput)?;
            ConsoleOutput::print_summary(&report);
        }
    }
    Ok(())
}
