//! vibequery - evaluate or compile serialized expression trees

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use log::{debug, info};
use std::path::{Path, PathBuf};
use vibequery::codec;
use vibequery::expression::{EvaluatorConfig, ExpressionCompiler, ExpressionEvaluator, Scope};
use vibequery::formatter::SqlFormatter;
use vibequery::value::{record_from_json, rows_from_json, Evaluation, Record};

/// vibequery - evaluate or compile serialized expression trees
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a tree against a record or a collection of records
    Eval {
        /// JSON file holding the serialized tree
        #[arg(short, long)]
        tree: PathBuf,

        /// JSON object to evaluate against
        #[arg(short, long, conflicts_with = "rows")]
        record: Option<PathBuf>,

        /// JSON array of objects, for grouping operators
        #[arg(long)]
        rows: Option<PathBuf>,

        /// JSON object with context variables
        #[arg(short, long)]
        env: Option<PathBuf>,

        /// Maximum tree depth
        #[arg(long, default_value = "512")]
        max_depth: usize,
    },

    /// Compile a tree into a SQL fragment
    Sql {
        /// JSON file holding the serialized tree
        #[arg(short, long)]
        tree: PathBuf,

        /// JSON object with context variables
        #[arg(short, long)]
        env: Option<PathBuf>,

        /// Render as a select-list item, applying the tree's alias
        #[arg(long)]
        select: bool,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Eval {
            tree,
            record,
            rows,
            env,
            max_depth,
        } => {
            let config = EvaluatorConfig { max_depth };
            let expr = read_tree(&tree, config)?;
            let environment = env.as_deref().map(read_object).transpose()?;
            let record = record.as_deref().map(read_object).transpose()?;
            let rows = rows.as_deref().map(read_rows).transpose()?;

            let scope = match (&record, &rows) {
                (Some(record), _) => Some(Scope::Row(record)),
                (None, Some(rows)) => Some(Scope::Rows(rows.as_slice())),
                (None, None) => None,
            };
            let result = ExpressionEvaluator::new(scope)
                .with_environment(environment.as_ref())
                .with_config(config)
                .evaluate(&expr)
                .context("Failed to evaluate expression")?;
            println!("{}", render(&result)?);
        }

        Command::Sql { tree, env, select } => {
            let expr = read_tree(&tree, EvaluatorConfig::default())?;
            let environment = env.as_deref().map(read_object).transpose()?;
            let formatter = SqlFormatter::new();
            let compiler = ExpressionCompiler::new(&formatter).with_environment(environment.as_ref());
            let sql = if select {
                compiler.compile_select(&expr)
            } else {
                compiler.compile(&expr)
            }
            .context("Failed to compile expression")?;
            println!("{}", sql);
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn read_tree(path: &Path, config: EvaluatorConfig) -> Result<vibequery::Expression> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let expr = codec::from_json_with_config(&text, config)
        .with_context(|| format!("Failed to decode expression tree in {}", path.display()))?;
    info!("loaded expression {}", expr);
    Ok(expr)
}

fn read_object(path: &Path) -> Result<Record> {
    let record = record_from_json(read_json(path)?)
        .with_context(|| format!("Expected a JSON object in {}", path.display()))?;
    debug!("read {} fields from {}", record.len(), path.display());
    Ok(record)
}

fn read_rows(path: &Path) -> Result<Vec<Record>> {
    let rows = rows_from_json(read_json(path)?)
        .with_context(|| format!("Expected a JSON array of objects in {}", path.display()))?;
    debug!("read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// JSON rendering of an evaluation, with a marker for indeterminate results
fn render(result: &Evaluation) -> Result<String> {
    let json = match result {
        Some(value) => serde_json::Value::from(value),
        None => serde_json::json!("indeterminate"),
    };
    Ok(serde_json::to_string_pretty(&json)?)
}
