// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// posprint — print PDFs on a POS terminal's thermal head.
//
// Entry point. Initialises logging, parses the command line and runs one
// command against the print services.

mod services;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use posprint_core::error::{PosPrintError, Result};
use posprint_core::{JobReport, JobStatus};
use posprint_document::PdfInfo;
use posprint_driver::STATUS_UNAVAILABLE;
use tracing::{error, info, warn};

use services::app_services::{self, AppServices, HeadChoice};
use services::config_store::{self, CONFIG_FILE};
use services::data_dir;

#[derive(ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "lowercase")]
enum Driver {
    /// The terminal's built-in head.
    Platform,
    /// PNG files, one per printed page.
    Image,
}

#[derive(Parser)]
#[command(name = "posprint")]
#[command(about = "Print PDF documents on a POS thermal printer")]
#[command(version)]
struct Cli {
    /// Printer config file (defaults to config.json in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every page of a PDF
    Print(PrintArgs),
    /// Show page count and page sizes of a PDF
    Info {
        path: PathBuf,
    },
    /// List previously printed documents, newest first
    History,
    /// Print an archived document again
    Reprint {
        id: String,
        #[command(flatten)]
        head: HeadArgs,
    },
    /// Query the head status
    Status(HeadArgs),
    /// Write the effective config to the config file
    InitConfig,
}

#[derive(Args)]
struct HeadArgs {
    #[arg(long, value_enum, default_value_t = Driver::Platform)]
    driver: Driver,
    /// Output directory for --driver image
    #[arg(long, default_value = "posprint-out")]
    out: PathBuf,
    /// Directory containing libpdfium
    #[arg(long)]
    pdfium_dir: Option<PathBuf>,
}

#[derive(Args)]
struct PrintArgs {
    path: PathBuf,
    #[command(flatten)]
    head: HeadArgs,
    /// Retry failed pages up to this many times
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

impl HeadArgs {
    fn choice(&self) -> HeadChoice {
        match self.driver {
            Driver::Platform => HeadChoice::Platform,
            Driver::Image => HeadChoice::Images(self.out.clone()),
        }
    }

    fn services(&self, config: Option<&Path>) -> Result<AppServices> {
        AppServices::init(config, self.choice(), self.pdfium_dir.as_deref())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(code = err.channel_code(), error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Print(args) => {
            let services = args.head.services(config)?;
            print(services, PrintTarget::File(args.path), args.retries).await
        }
        Commands::Reprint { id, head } => {
            let services = head.services(config)?;
            print(services, PrintTarget::Archived(id), 0).await
        }
        Commands::Info { path } => {
            let info = PdfInfo::probe(&path)?;
            print_json(&info)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::History => {
            let settings = config_store::load_config(&config_path(config)?)?;
            let history = app_services::open_history(settings.history_limit)?;
            print_json(&history.entries()?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status(head) => {
            let services = head.services(config)?;
            let code = services.controller.printer_status().await?;
            if code == STATUS_UNAVAILABLE {
                return Err(PosPrintError::PlatformUnavailable);
            }
            println!("{}", code);
            Ok(if code.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::InitConfig => {
            let path = config_path(config)?;
            let settings = config_store::load_config(&path)?;
            config_store::persist_config(&path, &settings)?;
            info!(path = %path.display(), "config written");
            Ok(ExitCode::SUCCESS)
        }
    }
}

enum PrintTarget {
    File(PathBuf),
    Archived(String),
}

async fn print(services: AppServices, target: PrintTarget, retries: u32) -> Result<ExitCode> {
    let AppServices {
        controller,
        mut progress,
        ..
    } = services;

    let progress_task = tokio::spawn(async move {
        while let Some(event) = progress.recv().await {
            eprintln!(
                "{} {}/{}",
                event.stage.method_name(),
                event.current_page,
                event.total_pages
            );
        }
    });

    let cancel = controller.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling print job");
            cancel.cancel();
        }
    });

    let mut report = match &target {
        PrintTarget::File(path) => controller.print_document(path).await?,
        PrintTarget::Archived(id) => controller.reprint_document(id).await?,
    };
    print_json(&report)?;

    for attempt in 1..=retries {
        if !needs_retry(&report) {
            break;
        }
        info!(attempt, pages = ?report.failed_pages, "retrying failed pages");
        report = controller.retry_failed_pages().await?;
        print_json(&report)?;
    }

    // Dropping the controller closes the progress channel.
    drop(controller);
    if let Err(err) = progress_task.await {
        warn!(error = %err, "progress printer stopped early");
    }

    Ok(match report.status {
        JobStatus::Success | JobStatus::RetrySuccess | JobStatus::NoRetryNeeded => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn needs_retry(report: &JobReport) -> bool {
    matches!(
        report.status,
        JobStatus::PartialSuccess | JobStatus::PartialRetrySuccess
    )
}

fn config_path(config: Option<&Path>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(data_dir::data_dir()?.join(CONFIG_FILE)),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(PosPrintError::Serialization)?;
    println!("{}", json);
    Ok(())
}
