//! Validate command - check a tax identifier from the command line.

use clap::Args;
use console::style;

use fatura_core::rules::{category, validate_nif, validate_niss};

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Identifier to validate
    #[arg(required = true)]
    id: String,

    /// Validate as a NISS (11-digit social identifier) instead of a NIF
    #[arg(long)]
    niss: bool,
}

pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    if args.niss {
        match validate_niss(&args.id) {
            Ok(()) => {
                println!("{} NISS válido", style("✓").green());
                Ok(())
            }
            Err(e) => {
                println!("{} NISS inválido: {}", style("✗").red(), e);
                anyhow::bail!("validation failed")
            }
        }
    } else {
        match validate_nif(&args.id) {
            Ok(()) => {
                println!("{} NIF válido", style("✓").green());
                if let Some(cat) = category(&args.id) {
                    println!("  Categoria: {:?}", cat);
                }
                Ok(())
            }
            Err(e) => {
                println!("{} NIF inválido: {}", style("✗").red(), e);
                anyhow::bail!("validation failed")
            }
        }
    }
}
