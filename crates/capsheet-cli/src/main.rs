//! Capsheet CLI - compile cap-table documents into formula listings

use anyhow::{Context, Result};
use capsheet::prelude::*;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "capsheet")]
#[command(
    author,
    version,
    about = "Compile a cap-table document into spreadsheet formulas"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a document and print the cell listing
    Compile {
        /// Input document (JSON)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Emit raw absolute ranges instead of structured table references
        #[arg(long)]
        raw_ranges: bool,
    },

    /// Show information about a document
    Info {
        /// Input document (JSON)
        input: PathBuf,
    },

    /// List the defined names a compiled document exports
    Names {
        /// Input document (JSON)
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// One `Sheet!Cell = content` line per cell
    Text,
    /// A JSON array of cell entries
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            format,
            raw_ranges,
        } => compile_command(&input, output.as_deref(), format, raw_ranges),
        Commands::Info { input } => show_info(&input),
        Commands::Names { input } => list_names(&input),
    }
}

fn load_document(input: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse document {}", input.display()))
}

fn compile_document(input: &Path, raw_ranges: bool) -> Result<CompiledModel> {
    let doc = load_document(input)?;
    let options = AssemblyOptions {
        structured_refs: !raw_ranges,
        ..Default::default()
    };
    compile(&doc, &options).context("Failed to compile document")
}

fn compile_command(
    input: &Path,
    output: Option<&Path>,
    format: Format,
    raw_ranges: bool,
) -> Result<()> {
    let model = compile_document(input, raw_ranges)?;

    let rendered = match format {
        Format::Text => render_text(&model),
        Format::Json => render_json(&model)?,
    };

    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(rendered.as_bytes())?;
        }
    }

    Ok(())
}

fn render_text(model: &CompiledModel) -> String {
    let mut out = String::new();
    for (sheet, addr, content) in model.entries() {
        out.push_str(&format!("{}!{} = {}\n", sheet, addr, content));
    }
    for name in &model.defined_names {
        out.push_str(&format!("name {} -> {}\n", name.name, name.refers_to));
    }
    out
}

fn render_json(model: &CompiledModel) -> Result<String> {
    let cells: Vec<serde_json::Value> = model
        .entries()
        .map(|(sheet, addr, content)| {
            let (kind, value) = match content {
                CellContent::Text(s) => ("text", s.clone()),
                CellContent::Number(n) => ("number", n.to_string()),
                CellContent::Formula(f) => ("formula", f.clone()),
            };
            serde_json::json!({
                "sheet": sheet,
                "cell": addr.to_string(),
                "kind": kind,
                "value": value,
            })
        })
        .collect();

    let names: Vec<serde_json::Value> = model
        .defined_names
        .iter()
        .map(|n| serde_json::json!({"name": n.name, "refers_to": n.refers_to}))
        .collect();

    let doc = serde_json::json!({
        "company": model.company,
        "cells": cells,
        "defined_names": names,
    });

    let mut rendered = serde_json::to_string_pretty(&doc)?;
    rendered.push('\n');
    Ok(rendered)
}

fn show_info(input: &Path) -> Result<()> {
    let doc = load_document(input)?;

    if let Some(company) = &doc.company {
        println!("Company: {}", company);
    }
    println!("Holders: {}", doc.holders.len());
    println!("Rounds:  {}", doc.rounds.len());
    for round in &doc.rounds {
        println!(
            "  {} ({}) - {:?}: {} primary, {} pro-rata, {} anti-dilution",
            round.name,
            round.date,
            round.calculation_type,
            round.primary_instruments().count(),
            round.pro_rata_instruments().count(),
            round.anti_dilution_instruments().count()
        );
    }

    let model = compile(&doc, &AssemblyOptions::default()).context("Failed to compile document")?;
    println!(
        "Compiled: {} sheets, {} formulas, {} defined names",
        model.sheets.len(),
        model.formula_count(),
        model.defined_names.len()
    );

    Ok(())
}

fn list_names(input: &Path) -> Result<()> {
    let model = compile_document(input, false)?;

    for name in &model.defined_names {
        println!("{} -> {}", name.name, name.refers_to);
    }

    Ok(())
}
