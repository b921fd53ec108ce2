//! Batch command - ingest multiple document files.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fatura_core::input::media_type_for_extension;
use fatura_core::{
    process_batch, DocumentFile, HttpBackend, ItemStatus, MemoryStore, ProgressCallback, QueueItem,
    RecordStore,
};

use super::load_config;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory for per-document JSON results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Override the maximum documents in flight
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Do not commit records, only report
    #[arg(long)]
    dry_run: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;

    if let Some(concurrency) = args.concurrency {
        config.batch.max_concurrency = concurrency.max(1);
    }

    // Expand glob pattern over the supported extensions
    let paths: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            media_type_for_extension(ext).is_some()
        })
        .collect();

    if paths.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!("{} Found {} files to process", style("ℹ").blue(), paths.len());

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let media_type = media_type_for_extension(&ext).unwrap_or("application/pdf");
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        files.push(DocumentFile::new(name, media_type, fs::read(path)?));
    }

    let backend = Arc::new(HttpBackend::new(config.service.clone())?);
    let store: Option<Arc<dyn RecordStore>> = if args.dry_run {
        None
    } else {
        Some(Arc::new(MemoryStore::new()))
    };

    // Stop promptly on Ctrl-C instead of draining the queue
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested");
                cancel.cancel();
            }
        });
    }

    let overall = ProgressBar::new(files.len() as u64);
    overall.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let on_progress: ProgressCallback = {
        let overall = overall.clone();
        Arc::new(move |_, item: &QueueItem| {
            if item.status.is_terminal() {
                overall.inc(1);
            } else if item.status == ItemStatus::Processing && item.progress <= 20 {
                overall.set_message(item.file_name.clone());
            }
        })
    };

    let items = process_batch(
        files,
        backend,
        store,
        Arc::new(config),
        on_progress,
        cancel,
    )
    .await?;

    overall.finish_with_message("Complete");

    // Write per-document outputs
    if let Some(ref output_dir) = args.output_dir {
        for item in &items {
            let stem = PathBuf::from(&item.file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document")
                .to_string();
            let output_path = output_dir.join(format!("{}.json", stem));
            fs::write(&output_path, serde_json::to_string_pretty(item)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &items)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    // Print summary
    let completed: Vec<_> = items
        .iter()
        .filter(|i| i.status == ItemStatus::Completed)
        .collect();
    let failed: Vec<_> = items
        .iter()
        .filter(|i| i.status == ItemStatus::Error)
        .collect();
    let unsaved: Vec<_> = completed
        .iter()
        .filter(|i| i.invoice.is_some() && i.record_id.is_none())
        .collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        items.len(),
        start.elapsed()
    );
    println!(
        "   {} completed, {} failed",
        style(completed.len()).green(),
        style(failed.len()).red()
    );

    if !args.dry_run && !unsaved.is_empty() {
        println!(
            "   {} concluídos mas não gravados (confiança baixa ou duplicados)",
            style(unsaved.len()).yellow()
        );
    }

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for item in &failed {
            println!(
                "  - {}: {}",
                item.file_name,
                item.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn write_summary(path: &PathBuf, items: &[QueueItem]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "supplier_nif",
        "document_number",
        "document_date",
        "fiscal_period",
        "total_vat",
        "total_amount",
        "confidence",
        "record_id",
        "warnings",
        "error",
    ])?;

    for item in items {
        if let Some(invoice) = &item.invoice {
            wtr.write_record([
                item.file_name.as_str(),
                "completed",
                invoice.supplier_nif.as_deref().unwrap_or(""),
                invoice.document_number.as_deref().unwrap_or(""),
                &invoice.document_date.to_string(),
                invoice.fiscal_period.as_str(),
                &invoice.total_vat.to_string(),
                &invoice.total_amount.to_string(),
                &invoice.confidence.to_string(),
                item.record_id.as_deref().unwrap_or(""),
                &item.warnings.join("; "),
                "",
            ])?;
        } else {
            wtr.write_record([
                item.file_name.as_str(),
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                &item.warnings.join("; "),
                item.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
