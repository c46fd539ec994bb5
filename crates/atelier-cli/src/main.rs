//! atelier-media: move legacy inline images out of portfolio projects.
//!
//! Reads MONGODB_URI and the CLOUDINARY_* settings from the environment (or a
//! `.env` file). Exits 0 only when the pass fully succeeded.

use anyhow::Context;
use atelier_cli::{
    check_strategy_flags, connect_scoped, init_tracing, render_report, render_summary,
    OutputFormat,
};
use atelier_core::{
    AtelierConfig, ClassCounts, ContentClassifier, PassKind, PassSummary, ProjectId, Strategy,
};
use atelier_db::{with_mongo_store, ContentStore, ScanOptions, DEFAULT_BATCH_SIZE};
use atelier_services::{
    CleanupOptions, CleanupPass, MigrationOptions, MigrationPipeline, VerificationPass,
    VerificationReport,
};
use atelier_storage::create_uploader;
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "atelier-media",
    about = "Migrate inline project images to Cloudinary"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ScanArgs {
    /// Documents fetched from the store per round trip
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    batch_size: u32,
    /// Only process the project with this id
    #[arg(long, value_name = "ID")]
    project: Option<String>,
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl ScanArgs {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            batch_size: self.batch_size,
            project_id: self.project.as_deref().map(ProjectId::from),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replace inline image payloads with hosted URLs
    Migrate {
        #[command(flatten)]
        scan: ScanArgs,
        /// upload (default) or discard; discard deletes the images
        #[arg(long, default_value_t = Strategy::Upload)]
        strategy: Strategy,
        /// Report what would change without uploading or writing
        #[arg(long)]
        dry_run: bool,
        /// Skip payloads larger than this many decoded bytes (upload only)
        #[arg(
            long,
            value_name = "BYTES",
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        max_payload_bytes: Option<u64>,
        /// Replacement text for discarded payloads (discard only, default empty)
        #[arg(long, value_name = "TEXT")]
        placeholder: Option<String>,
    },
    /// Audit section content without changing anything
    Verify {
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Discard inline image payloads without uploading them
    Cleanup {
        #[command(flatten)]
        scan: ScanArgs,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Replacement text for discarded payloads (default empty)
        #[arg(long, value_name = "TEXT")]
        placeholder: Option<String>,
    },
    /// Check connectivity to the content store and Cloudinary
    Ping,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize report")?;
    println!("{}", out);
    Ok(())
}

fn print_summary(summary: &PassSummary, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            println!("{}", render_summary(summary));
            Ok(())
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Run a mutating pass inside a scoped store connection. A connection
/// failure still yields a summary, in the `Failed` state.
async fn run_scoped<F, Fut>(
    config: &AtelierConfig,
    mut summary: PassSummary,
    pass: F,
) -> PassSummary
where
    F: FnOnce(Arc<dyn ContentStore>) -> Fut,
    Fut: Future<Output = PassSummary>,
{
    match connect_scoped(&mut summary, with_mongo_store(&config.store, pass)).await {
        Some(mut completed) => {
            completed.finish();
            completed
        }
        None => summary,
    }
}

async fn migrate(
    config: &AtelierConfig,
    scan: ScanArgs,
    dry_run: bool,
    max_payload_bytes: Option<u64>,
) -> anyhow::Result<ExitCode> {
    let uploader = create_uploader(config)
        .context("Cloudinary is required for the upload strategy")?;
    let max_payload_bytes = match max_payload_bytes {
        Some(bytes) => Some(usize::try_from(bytes).context("--max-payload-bytes is too large")?),
        None => config.max_payload_bytes,
    };
    let options = MigrationOptions {
        scan: scan.scan_options(),
        dry_run,
        max_payload_bytes,
    };

    let summary = run_scoped(
        config,
        PassSummary::new(PassKind::Migrate, Some(Strategy::Upload), dry_run),
        |store| async move { MigrationPipeline::new(store, uploader, options).run().await },
    )
    .await;

    print_summary(&summary, scan.format)?;
    Ok(exit_code(summary.is_success()))
}

async fn cleanup(
    config: &AtelierConfig,
    scan: ScanArgs,
    dry_run: bool,
    placeholder: Option<String>,
) -> anyhow::Result<ExitCode> {
    let options = CleanupOptions {
        scan: scan.scan_options(),
        dry_run,
        replacement: placeholder.unwrap_or_default(),
    };

    let summary = run_scoped(
        config,
        PassSummary::new(PassKind::Cleanup, Some(Strategy::Discard), dry_run),
        |store| async move { CleanupPass::new(store, options).run().await },
    )
    .await;

    print_summary(&summary, scan.format)?;
    Ok(exit_code(summary.is_success()))
}

async fn verify(config: &AtelierConfig, scan: ScanArgs) -> anyhow::Result<ExitCode> {
    let classifier = ContentClassifier::new(
        config.hosted_url_marker.clone(),
        config.placeholder_marker.clone(),
    );
    let scan_options = scan.scan_options();

    let mut summary = PassSummary::new(PassKind::Verify, None, false);
    let session = with_mongo_store(&config.store, |store| async move {
        VerificationPass::new(store, classifier, scan_options)
            .run()
            .await
    });
    let report = match connect_scoped(&mut summary, session).await {
        Some(mut report) => {
            report.summary.finish();
            report
        }
        None => VerificationReport {
            summary,
            totals: ClassCounts::default(),
            projects: Vec::new(),
        },
    };

    match scan.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => println!("{}", render_report(&report)),
    }
    Ok(exit_code(report.is_complete()))
}

async fn ping(config: &AtelierConfig) -> anyhow::Result<ExitCode> {
    let uploader = create_uploader(config).context("Cloudinary is not configured")?;

    let store_ok = match with_mongo_store(&config.store, |_| async {}).await {
        Ok(()) => {
            println!("content store ({}): ok", config.store.collection);
            true
        }
        Err(e) => {
            println!("content store: FAILED ({})", e);
            false
        }
    };

    let storage_ok = match uploader.ping().await {
        Ok(()) => {
            println!("object storage ({}): ok", uploader.backend_name());
            true
        }
        Err(e) => {
            println!(
                "object storage ({}): FAILED ({})",
                uploader.backend_name(),
                e
            );
            false
        }
    };

    Ok(exit_code(store_ok && storage_ok))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Commands::Migrate {
        strategy,
        placeholder,
        max_payload_bytes,
        ..
    } = &cli.command
    {
        let checked = check_strategy_flags(*strategy, placeholder.as_deref(), *max_payload_bytes);
        if let Err(e) = checked {
            Cli::command().error(ErrorKind::ArgumentConflict, e).exit();
        }
    }

    let config = AtelierConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Migrate {
            scan,
            strategy,
            dry_run,
            max_payload_bytes,
            placeholder,
        } => {
            tracing::info!(strategy = %strategy, dry_run, "Starting migration");
            if strategy.is_destructive() {
                tracing::warn!("Discard strategy selected: inline images will not be uploaded");
                cleanup(&config, scan, dry_run, placeholder).await
            } else {
                migrate(&config, scan, dry_run, max_payload_bytes).await
            }
        }
        Commands::Verify { scan } => verify(&config, scan).await,
        Commands::Cleanup {
            scan,
            dry_run,
            placeholder,
        } => cleanup(&config, scan, dry_run, placeholder).await,
        Commands::Ping => ping(&config).await,
    }
}
