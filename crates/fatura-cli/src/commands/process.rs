//! Process command - ingest a single document file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use fatura_core::input::media_type_for_extension;
use fatura_core::{ingest_result, DocumentFile, HttpBackend, IngestResult};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show the arithmetic checks alongside the record
    #[arg(long)]
    show_checks: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let extension = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let media_type = media_type_for_extension(&extension)
        .ok_or_else(|| anyhow::anyhow!("Unsupported file format: {}", extension))?;

    info!("Processing file: {}", args.input.display());

    let data = fs::read(&args.input)?;
    let name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();
    let file = DocumentFile::new(name, media_type, data);

    let backend = HttpBackend::new(config.service.clone())?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb.set_message("A extrair...");

    let result = ingest_result(&file, &backend, &config).await;

    pb.finish_and_clear();

    if !result.warnings.is_empty() {
        eprintln!("{}", style("Avisos:").yellow());
        for warning in &result.warnings {
            eprintln!("  - {}", warning);
        }
    }

    for correction in &result.corrections {
        eprintln!(
            "{} {} corrigido: {} -> {}",
            style("±").cyan(),
            correction.field,
            correction.old_value,
            correction.new_value
        );
    }

    let output = format_result(&result, args.format, args.show_checks)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    info!("Processed in {:?}", start.elapsed());

    match &result.error {
        Some(error) => anyhow::bail!("Processing failed: {}", error),
        None => Ok(()),
    }
}

fn format_result(
    result: &IngestResult,
    format: OutputFormat,
    show_checks: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            if show_checks {
                Ok(serde_json::to_string_pretty(result)?)
            } else {
                match &result.invoice {
                    Some(invoice) => Ok(serde_json::to_string_pretty(invoice)?),
                    None => Ok(serde_json::to_string_pretty(result)?),
                }
            }
        }
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_text(result: &IngestResult) -> String {
    let mut output = String::new();

    let Some(invoice) = &result.invoice else {
        output.push_str(&format!(
            "Falhou: {}\n",
            result.error.as_deref().unwrap_or("erro desconhecido")
        ));
        return output;
    };

    if let Some(name) = &invoice.supplier_name {
        output.push_str(&format!("Fornecedor: {}\n", name));
    }
    if let Some(nif) = &invoice.supplier_nif {
        output.push_str(&format!("NIF: {}\n", nif));
    }
    if let Some(vat_id) = &invoice.supplier_vat_id {
        output.push_str(&format!("IVA estrangeiro: {}\n", vat_id));
    }
    if let Some(number) = &invoice.document_number {
        output.push_str(&format!("Documento: {}\n", number));
    }
    output.push_str(&format!("Data: {}\n", invoice.document_date));
    output.push_str(&format!("Período fiscal: {}\n", invoice.fiscal_period));
    output.push('\n');

    output.push_str("Totais:\n");
    output.push_str(&format!("  Bases:  {}\n", invoice.bases_sum()));
    output.push_str(&format!("  IVA:    {}\n", invoice.total_vat));
    output.push_str(&format!("  Total:  {}\n", invoice.total_amount));
    if let Some(r) = invoice.regularization {
        output.push_str(&format!("  Regularização: {}\n", r));
    }
    output.push_str(&format!("\nConfiança: {}/100\n", invoice.confidence));

    if let Some(checks) = &result.checks {
        output.push_str(&format!(
            "Verificação aritmética: {}\n",
            if checks.all_passed() { "OK" } else { "com desvios" }
        ));
    }

    output
}
