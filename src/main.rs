//! crawl-graph main entry point
//!
//! This is the command-line interface for the crawl-graph site crawler.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crawl_graph::config::load_or_default;
use crawl_graph::output::{print_job_list, print_report};
use crawl_graph::{CrawlService, JobStatus};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// crawl-graph: map the link graph of a website
///
/// crawl-graph crawls a site from a seed URL while respecting robots.txt,
/// records every page and link it finds in SQLite, and exports the result as
/// a JSON graph.
#[derive(Parser, Debug)]
#[command(name = "crawl-graph")]
#[command(version)]
#[command(about = "Map the link graph of a website", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and wait for the job to finish (Ctrl-C stops it)
    Crawl {
        /// Seed URL
        url: String,

        /// Use this job id instead of a generated one
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Show the status of a job
    Status { job_id: String },

    /// List all jobs, newest first
    Jobs,

    /// Ask a job to stop (works across processes)
    Stop { job_id: String },

    /// Write a job's graph as JSON
    Graph {
        job_id: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Continue a job that was interrupted while running
    Resume { job_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let loaded = load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    match (&cli.config, &loaded.hash) {
        (Some(path), Some(hash)) => {
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash)
        }
        _ => tracing::debug!("No configuration file given, using defaults"),
    }
    tracing::debug!("Database: {}", loaded.config.storage.database_path);

    let service = CrawlService::new(loaded.config).context("Failed to open database")?;

    match cli.command {
        Command::Crawl { url, job_id } => {
            let job_id = match job_id {
                Some(id) => service.submit_with_id(&id, &url)?,
                None => service.submit(&url)?,
            };
            println!("Job {} started for {}", job_id, url);
            let status = wait_for_job(&service, &job_id).await?;
            finish(&service, &job_id, status)?;
        }
        Command::Status { job_id } => match service.status(&job_id)? {
            Some(report) => print_report(&report),
            None => bail!("No job with id {}", job_id),
        },
        Command::Jobs => {
            let reports = service.list_jobs()?;
            print_job_list(&reports);
        }
        Command::Stop { job_id } => {
            if !service.stop(&job_id)? {
                bail!("No job with id {}", job_id);
            }
            println!("Stop requested for job {}", job_id);
        }
        Command::Graph { job_id, output } => {
            let export = match &output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    service.write_graph(&job_id, &mut BufWriter::new(file))?
                }
                None => {
                    let stdout = io::stdout();
                    service.write_graph(&job_id, &mut stdout.lock())?
                }
            };
            tracing::info!(
                "Wrote {} nodes and {} edges for job {}",
                export.nodes,
                export.edges,
                job_id
            );
        }
        Command::Resume { job_id } => {
            if !service.resume(&job_id)? {
                bail!("Job {} cannot be resumed", job_id);
            }
            let status = wait_for_job(&service, &job_id).await?;
            finish(&service, &job_id, status)?;
        }
    }

    Ok(())
}

/// Waits for a job; the first Ctrl-C requests a stop and keeps waiting
async fn wait_for_job(service: &CrawlService, job_id: &str) -> anyhow::Result<JobStatus> {
    let wait = service.wait(job_id);
    tokio::pin!(wait);

    let status = tokio::select! {
        result = &mut wait => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping job {}", job_id);
            service.stop(job_id)?;
            wait.await?
        }
    };

    Ok(status)
}

fn finish(service: &CrawlService, job_id: &str, status: JobStatus) -> anyhow::Result<()> {
    if let Some(report) = service.status(job_id)? {
        print_report(&report);
    }
    if status == JobStatus::Failed {
        bail!("Job {} failed", job_id);
    }
    Ok(())
}

/// Sets up logging based on verbosity flags
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_graph=info,warn"),
            1 => EnvFilter::new("crawl_graph=debug,info"),
            2 => EnvFilter::new("crawl_graph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
