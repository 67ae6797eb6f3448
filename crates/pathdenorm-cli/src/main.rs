//! PathDenorm CLI
//!
//! - `denormalize`: run a denormalization described by a JSON document
//! - `prune`: show the pruned schema and alias table for a path set
//! - `parse-paths`: expand a path expression into its canonical list

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use pathdenorm_core::{prune, Denormalizer};
use pathdenorm_paths::{format_paths, parse_paths};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod document;

use document::{load_schema, Document, PathsSpec};

#[derive(Parser)]
#[command(name = "pathdenorm")]
#[command(author, version, about = "Path-scoped denormalization of normalized entity graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Denormalize `result` from an input document against its schema and entities.
    Denormalize {
        /// Input document: `{ schema, entities, result, paths?, config? }`
        #[arg(short, long)]
        input: PathBuf,
        /// Path expression; overrides the document's `paths`
        #[arg(short, long)]
        paths: Option<String>,
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the schema pruned to a path set, with its alias table.
    Prune {
        /// Schema JSON: `{ root, entities }`
        #[arg(short, long)]
        schema: PathBuf,
        /// Path expression, e.g. `[pet, partner.[pet, owners]]`
        #[arg(short, long)]
        paths: String,
    },

    /// Expand a path expression and print it in canonical form.
    ParsePaths {
        expr: String,
        /// Print the paths as a JSON list of segment lists
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Denormalize {
            input,
            paths,
            pretty,
        } => cmd_denormalize(&input, paths, pretty),
        Commands::Prune { schema, paths } => cmd_prune(&schema, &paths),
        Commands::ParsePaths { expr, json } => cmd_parse_paths(&expr, json),
    }
}

fn cmd_denormalize(input: &Path, paths: Option<String>, pretty: bool) -> Result<()> {
    let doc = Document::load(input)?;
    let store = doc.store()?;

    let allowed = match paths.map(PathsSpec::Expr).or(doc.paths) {
        Some(spec) => Some(spec.resolve()?),
        None => None,
    };
    match &allowed {
        Some(allowed) => debug!(input = %input.display(), paths = %format_paths(allowed), "denormalizing"),
        None => debug!(input = %input.display(), "denormalizing without paths"),
    }

    let out = Denormalizer::new(doc.config)
        .denormalize(&doc.result, &doc.schema, &store, allowed.as_deref())
        .context("denormalizing")?;
    print_json(&out, pretty)
}

#[derive(Serialize)]
struct PruneReport<'a> {
    paths: String,
    #[serde(flatten)]
    pruned: &'a pathdenorm_core::PrunedSchema,
}

fn cmd_prune(schema: &Path, paths: &str) -> Result<()> {
    let schema = load_schema(schema)?;
    let allowed = parse_paths(paths).with_context(|| format!("parsing paths `{paths}`"))?;
    let pruned = prune(&schema, &allowed).context("pruning schema")?;

    eprintln!(
        "{} {} entity types, {} aliases",
        "ok".green().bold(),
        pruned.schema.entities().count(),
        pruned.aliases.len()
    );
    print_json(
        &PruneReport {
            paths: format_paths(&allowed),
            pruned: &pruned,
        },
        true,
    )
}

fn cmd_parse_paths(expr: &str, json: bool) -> Result<()> {
    let paths = parse_paths(expr).with_context(|| format!("parsing paths `{expr}`"))?;
    if json {
        print_json(&paths, false)
    } else {
        println!("{}", format_paths(&paths));
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
