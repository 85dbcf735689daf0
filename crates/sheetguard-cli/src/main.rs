//! sheetguard CLI - validated formula writes for spreadsheet agents

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sheetguard::prelude::*;
use sheetguard::{registry, FunctionCategory};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sheetguard")]
#[command(
    author,
    version,
    about = "Validate spreadsheet formulas before writing them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a formula against a workbook without writing it
    Check {
        /// Workbook file (xlsx)
        input: PathBuf,
        /// Target sheet name
        sheet: String,
        /// Target cell, in A1 notation
        cell: String,
        /// Formula text, with or without the leading '='
        formula: String,

        /// Round numeric results to this many decimal places
        #[arg(short, long)]
        precision: Option<u32>,
    },

    /// Validate a formula and write it only if it evaluates cleanly
    Write {
        input: PathBuf,
        sheet: String,
        cell: String,
        formula: String,

        /// Round numeric results to this many decimal places
        #[arg(short, long)]
        precision: Option<u32>,
    },

    /// Write a formula, repairing division by zero and falling back to a literal
    Repair {
        input: PathBuf,
        sheet: String,
        cell: String,
        formula: String,

        /// Maximum number of guarded writes
        #[arg(short, long, default_value = "3")]
        max_retries: usize,

        /// Literal written when every attempt fails (number, TRUE/FALSE or text)
        #[arg(short, long)]
        fallback: Option<String>,
    },

    /// List the sheets of a workbook with their populated cell counts
    Sheets {
        input: PathBuf,
    },

    /// List the functions formulas may call
    Functions {
        /// Only this category (math, statistical, logical, text, date, lookup, financial, info)
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[derive(Serialize)]
struct SheetInfo<'a> {
    name: &'a str,
    cells: usize,
}

#[derive(Serialize)]
struct CategoryInfo {
    category: &'static str,
    functions: Vec<&'static str>,
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check {
            input,
            sheet,
            cell,
            formula,
            precision,
        } => {
            let result = GuardedWriter::with_options(guard_options(precision))
                .check(&input, &sheet, &cell, &formula)
                .with_context(|| format!("Failed to check formula in '{}'", input.display()))?;
            print_json(&result)
        }
        Commands::Write {
            input,
            sheet,
            cell,
            formula,
            precision,
        } => {
            let result = GuardedWriter::with_options(guard_options(precision))
                .write_and_evaluate_formula(&input, &sheet, &cell, &formula)
                .with_context(|| format!("Failed to write formula to '{}'", input.display()))?;
            print_json(&result)
        }
        Commands::Repair {
            input,
            sheet,
            cell,
            formula,
            max_retries,
            fallback,
        } => {
            let mut options = RepairOptions::default().with_max_retries(max_retries);
            if let Some(text) = fallback {
                options = options.with_fallback(ScalarValue::parse_literal(&text));
            }
            let outcome = RepairLoop::new(options)
                .run(&input, &sheet, &cell, &formula)
                .with_context(|| format!("Failed to repair formula in '{}'", input.display()))?;
            print_json(&outcome)
        }
        Commands::Sheets { input } => list_sheets(&input),
        Commands::Functions { category } => list_functions(category.as_deref()),
    }
}

fn guard_options(precision: Option<u32>) -> GuardOptions {
    match precision {
        Some(places) => GuardOptions::default().with_precision(places),
        None => GuardOptions::default(),
    }
}

fn list_sheets(input: &Path) -> Result<()> {
    let snapshot = XlsxStore
        .load_snapshot(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;

    let sheets: Vec<SheetInfo<'_>> = snapshot
        .sheets
        .iter()
        .map(|sheet| SheetInfo {
            name: &sheet.name,
            cells: sheet.cells.len(),
        })
        .collect();
    print_json(&sheets)
}

fn list_functions(category: Option<&str>) -> Result<()> {
    let categories = match category {
        Some(name) => vec![name
            .parse::<FunctionCategory>()
            .map_err(anyhow::Error::msg)?],
        None => FunctionCategory::ALL.to_vec(),
    };

    let listing: Vec<CategoryInfo> = categories
        .into_iter()
        .map(|c| CategoryInfo {
            category: c.as_str(),
            functions: registry().names_in(c),
        })
        .collect();
    print_json(&listing)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", text);
    Ok(())
}
