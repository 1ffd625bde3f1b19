// techlog - stage, extract and annotate tech-log PDF batches
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use techlog::batch::CancelFlag;
use techlog::classify::classify;
use techlog::config::Config;
use techlog::dedup::review_file;
use techlog::pdf_extraction::FileContext;
use techlog::pipeline::{Pipeline, PipelineReport, REVIEW_DIR};
use techlog::staging::{batch_stamp, stage_registrations};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "techlog")]
#[command(about = "Tech-log PDF batch extraction with rotation assignment")]
#[command(version)]
struct Cli {
    /// Config file (default: $TECHLOG_CONFIG or ./techlog.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for techlog
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move registration folders from To_Be_Processed into a new batch
    Stage {
        #[arg(required = true)]
        registrations: Vec<String>,
    },
    /// Process an existing batch under Processing/
    Process { batch: String },
    /// Stage then process in one go
    Run {
        #[arg(required = true)]
        registrations: Vec<String>,
    },
    /// Extract a single report and print it as JSON
    Extract {
        pdf: PathBuf,
        /// Enquiry number (default: the parent folder name)
        #[arg(long)]
        enquiry: Option<String>,
    },
    /// Write the duplicate review sheets for an existing table
    Dedup {
        table: PathBuf,
        /// Output directory (default: a `duplicates` folder next to the table)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let mut directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "techlog=info".to_string());
    if verbose {
        directives.push_str(",techlog=debug");
    }
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("techlog=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Ctrl-C stops new files from starting; in-flight files still finish.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing in-flight files");
            flag.cancel();
        }
    });
    cancel
}

fn print_report(report: &PipelineReport) {
    println!("Batch {}: {} processed, {} failed", report.batch, report.success_files.len(), report.failed_files.len());
    for (file, err) in &report.failed_files {
        println!("  failed {}: {}", file, err);
    }
    println!("{} records, {} kept after deduplication", report.records, report.kept);
    if report.review_written {
        println!("Duplicate review sheets written");
    }
    if report.cancelled {
        println!("Cancelled; batch left at {}", report.folder.display());
    } else {
        println!("Moved to {}", report.folder.display());
    }
    for (sink, err) in &report.sink_failures {
        println!("  sink {} failed: {}", sink, err);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Stage { registrations } => {
            let layout = config.layout();
            layout.init()?;
            let stamp = batch_stamp(chrono::Local::now().naive_local());
            let report = stage_registrations(&layout, &registrations, &stamp)?;
            for (reg, err) in &report.failed {
                eprintln!("Error moving files from {}: {}", reg, err);
            }
            if report.file_count() == 0 {
                bail!("no files staged");
            }
            println!("{}", stamp);
        }
        Commands::Process { batch } => {
            let pipeline = Pipeline::from_config(&config)?;
            let report = pipeline
                .process(&batch, &cancel_on_ctrl_c())
                .await
                .with_context(|| format!("processing batch {}", batch))?;
            print_report(&report);
        }
        Commands::Run { registrations } => {
            let pipeline = Pipeline::from_config(&config)?;
            let (staging, report) = pipeline.run(&registrations, &cancel_on_ctrl_c()).await?;
            for (reg, err) in &staging.failed {
                eprintln!("Error moving files from {}: {}", reg, err);
            }
            print_report(&report);
        }
        Commands::Extract { pdf, enquiry } => {
            let extractor = config.build_extractor()?;
            let mut context = FileContext::from_path(&pdf);
            if let Some(enquiry) = enquiry {
                context.enquiry_no = enquiry;
            }
            let record = extractor
                .extract_file(config.text_source().as_ref(), &pdf, &context)
                .with_context(|| format!("reading {}", pdf.display()))?;
            println!("{}", serde_json::to_string_pretty(&classify(record))?);
        }
        Commands::Dedup { table, out } => {
            let out = out.unwrap_or_else(|| {
                table
                    .parent()
                    .map(|p| p.join(REVIEW_DIR))
                    .unwrap_or_else(|| PathBuf::from(REVIEW_DIR))
            });
            match review_file(&table, &out, config.split_not_flown)? {
                Some(dir) => println!("Review sheets written to {}", dir.display()),
                None => println!("No duplicates or not-flown rows"),
            }
        }
    }
    Ok(())
}
