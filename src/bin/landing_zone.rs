use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use temporal_landing_zone::catalog::OpenDataHttpClient;
use temporal_landing_zone::collector::Collector;
use temporal_landing_zone::config::{ConfigLoader, StagingBackend, StagingSettings};
use temporal_landing_zone::error::LandingError;
use temporal_landing_zone::hbase::HBaseRestClient;
use temporal_landing_zone::loader::Loader;
use temporal_landing_zone::output::{JsonOutput, TracingSink};
use temporal_landing_zone::staging::{LocalStaging, StagingFs, StagingLayout};
use temporal_landing_zone::webhdfs::WebHdfsClient;

#[derive(Parser)]
#[command(name = "landing-zone")]
#[command(about = "Temporal landing zone: stage Barcelona open data in HDFS and load it into HBase")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    #[command(about = "Upload local CSV/JSON sources and catalog resources to the landing zone")]
    DataCollection,
    #[command(about = "Load staged files into one HBase table per source")]
    PersistenceLoading,
}

enum Outcome {
    Complete,
    Partial(usize),
}

fn main() -> ExitCode {
    // `.env` also feeds LOG_DIR, so it is loaded before logging starts.
    let _ = dotenvy::dotenv();
    let _guard = init_logging();

    match run() {
        Ok(Outcome::Complete) => ExitCode::SUCCESS,
        Ok(Outcome::Partial(skipped)) => {
            tracing::warn!(skipped, "run finished with skipped files");
            ExitCode::from(4)
        }
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<LandingError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn init_logging() -> WorkerGuard {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "landing-zone.log"));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}

fn map_exit_code(error: &LandingError) -> u8 {
    match error {
        LandingError::MissingSetting(_) | LandingError::InvalidSetting { .. } => 2,
        err if err.is_fatal() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<Outcome> {
    let cli = Cli::parse();
    match cli.mode {
        Mode::DataCollection => run_collection(),
        Mode::PersistenceLoading => run_loading(),
    }
}

fn connect_staging(settings: &StagingSettings) -> Result<Box<dyn StagingFs>, LandingError> {
    match &settings.backend {
        StagingBackend::WebHdfs { host, port, user } => {
            Ok(Box::new(WebHdfsClient::new(host, *port, user)?))
        }
        StagingBackend::Local { root } => Ok(Box::new(LocalStaging::new(root.clone()))),
    }
}

fn run_collection() -> miette::Result<Outcome> {
    let settings = ConfigLoader::collection()?;
    let sink = TracingSink::new("collector");
    let staging = connect_staging(&settings.staging)?;
    let catalog = OpenDataHttpClient::new(&settings.catalog.base_url, &settings.catalog.api_key)?;

    let mut collector = Collector::connect(
        staging,
        catalog,
        StagingLayout::from_settings(&settings.staging),
        settings.data_dir.clone(),
        &sink,
    )?;
    let report = collector.run(&settings.catalog.dataset_id, &sink)?;
    tracing::info!(
        staged = report.staged.len(),
        skipped = report.skipped.len(),
        "data collection completed"
    );
    JsonOutput::print_collection(&report).into_diagnostic()?;

    Ok(match report.skipped.len() {
        0 => Outcome::Complete,
        skipped => Outcome::Partial(skipped),
    })
}

fn run_loading() -> miette::Result<Outcome> {
    let settings = ConfigLoader::loading()?;
    let sink = TracingSink::new("loader");
    let staging = connect_staging(&settings.staging)?;
    let store = HBaseRestClient::new(&settings.hbase_host, settings.hbase_port)?;

    let mut loader = Loader::connect(
        staging,
        store,
        StagingLayout::from_settings(&settings.staging),
        &sink,
    );
    let report = loader.run(&sink)?;
    tracing::info!(
        tables = report.tables.len(),
        skipped = report.skipped(),
        "persistence loading completed"
    );
    JsonOutput::print_load(&report).into_diagnostic()?;

    Ok(match report.skipped() {
        0 => Outcome::Complete,
        skipped => Outcome::Partial(skipped),
    })
}
