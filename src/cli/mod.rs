//! featswarm CLI
//!
//! Command-line interface for feature selection, correlation ranking and
//! data inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::dataset::{ColumnData, Dataset};
use crate::selection::{SelectionConfig, SelectionEngine, SelectionReport, SelectionStatus};
use crate::training::ModelKind;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 110, 100) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "featswarm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Particle swarm feature selection for regression models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for the variable subset with the lowest penalized CV error
    Select {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// JSON run configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Response column
        #[arg(short, long)]
        response: Option<String>,

        /// Model kind (linear, mixed_effects, random_forest)
        #[arg(short, long)]
        model: Option<String>,

        /// Metadata columns to exclude from the candidates
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Grouping column (required for mixed_effects)
        #[arg(short, long)]
        group: Option<String>,

        /// Number of cross-validation folds
        #[arg(short = 'k', long)]
        folds: Option<usize>,

        /// Number of particles
        #[arg(long)]
        swarm_size: Option<usize>,

        /// Iteration cap
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Penalty per selected variable, in response standard deviations
        #[arg(long)]
        penalty_factor: Option<f64>,

        /// Top-N sizes of the correlation-seeded particles
        #[arg(long, value_delimiter = ',')]
        warm_start: Option<Vec<usize>>,

        /// Swarm seed
        #[arg(long)]
        seed: Option<u64>,

        /// Fold assignment seed
        #[arg(long)]
        cv_seed: Option<u64>,

        /// Stop after this many iterations without improvement
        #[arg(long)]
        patience: Option<usize>,

        /// Evaluate particles on one thread
        #[arg(long)]
        serial: bool,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rank numeric candidates by absolute correlation with the response
    Rank {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Response column
        #[arg(short, long)]
        response: String,

        /// Metadata columns to exclude
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Grouping column
        #[arg(short, long)]
        group: Option<String>,

        /// Show only the first N
        #[arg(short, long)]
        top: Option<usize>,
    },

    /// Show dataset information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Flag overrides for a selection run
#[derive(Debug, Default, Clone)]
pub struct SelectArgs {
    pub response: Option<String>,
    pub model: Option<String>,
    pub exclude: Vec<String>,
    pub group: Option<String>,
    pub folds: Option<usize>,
    pub swarm_size: Option<usize>,
    pub max_iterations: Option<usize>,
    pub penalty_factor: Option<f64>,
    pub warm_start: Option<Vec<usize>>,
    pub seed: Option<u64>,
    pub cv_seed: Option<u64>,
    pub patience: Option<usize>,
    pub serial: bool,
}

impl SelectArgs {
    /// Apply the flags on top of a base configuration
    pub fn apply(self, mut config: SelectionConfig) -> anyhow::Result<SelectionConfig> {
        if let Some(response) = self.response {
            config.response = response;
        }
        if let Some(model) = self.model {
            config.model_kind = model.parse::<ModelKind>()?;
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude;
        }
        if self.group.is_some() {
            config.group = self.group;
        }
        if let Some(k) = self.folds {
            config.folds = k;
        }
        if let Some(n) = self.swarm_size {
            config.pso.swarm_size = n;
        }
        if let Some(n) = self.max_iterations {
            config.pso.max_iterations = n;
        }
        if let Some(f) = self.penalty_factor {
            config.penalty_factor = f;
        }
        if let Some(sizes) = self.warm_start {
            config.warm_start_sizes = sizes;
        }
        if let Some(seed) = self.seed {
            config.pso.seed = seed;
        }
        if let Some(seed) = self.cv_seed {
            config.cv_seed = seed;
        }
        if self.patience.is_some() {
            config.pso.early_stopping_patience = self.patience;
        }
        if self.serial {
            config.pso.parallel = false;
        }
        Ok(config)
    }
}

/// Load a data file into a [`Dataset`]
pub fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let df = DataLoader::new().load_auto(path)?;
    Ok(Dataset::from_dataframe(&df)?)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_select(
    data_path: &Path,
    config_path: Option<&Path>,
    args: SelectArgs,
    output: Option<&Path>,
) -> anyhow::Result<SelectionReport> {
    section("Select");

    let base = match config_path {
        Some(path) => SelectionConfig::from_json_file(path)?,
        None => SelectionConfig::default(),
    };
    let config = args.apply(base)?;
    let engine = SelectionEngine::new(config)?;

    step_run("Loading data");
    let start = Instant::now();
    let data = load_dataset(data_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        data.n_rows(),
        data.n_columns(),
        start.elapsed()
    ));

    let cfg = engine.config();
    step_run(&format!(
        "Running {} particles × {} iterations with {}",
        cfg.pso.swarm_size,
        cfg.pso.max_iterations,
        cfg.model_kind.to_string().cyan()
    ));
    let report = engine.run(&data)?;
    step_done(&format!("{:.2}s", report.elapsed_secs));

    println!();
    match report.status {
        SelectionStatus::Stable => {
            kv("Selected", &format!("{} of {}", report.selected.len(), report.n_candidates));
            for name in &report.selected {
                println!("  {:<16} {}", "", name.white().bold());
            }
            if let Some(cv) = report.cv_error {
                kv("CV MAE", &format!("{:.6}", cv));
            }
            kv("Fitness", &format!("{:.6}", report.fitness));
        }
        SelectionStatus::Unstable => {
            println!("  {}", bad("UNSTABLE").bold());
            println!(
                "  {}",
                muted("No subset could be cross-validated on every fold; the best fitness is the failure sentinel.")
            );
            kv("Failed", &format!("{} of {} evaluations", report.failed_evaluations, report.evaluations));
        }
    }
    kv("Iterations", &format!("{} ({})", report.iterations, report.state));
    kv("Evaluations", &report.evaluations.to_string());

    if let Some(path) = output {
        report.save_json(path)?;
        println!();
        println!("  {} report written to {}", ok("✓"), path.display());
    }
    println!();

    Ok(report)
}

pub fn cmd_rank(
    data_path: &Path,
    response: &str,
    exclude: Vec<String>,
    group: Option<String>,
    top: Option<usize>,
) -> anyhow::Result<()> {
    section("Correlation ranking");

    let data = load_dataset(data_path)?;
    let mut config = SelectionConfig::new(response).with_exclude(exclude).with_warm_start_sizes(vec![]);
    config.group = group;
    let ranking = SelectionEngine::new(config)?.rank(&data)?;

    println!("  {:>4} {:<28} {:>10}", muted("#"), muted("Variable"), muted("|r|"));
    println!("  {}", dim(&"─".repeat(44)));
    for (i, var) in ranking.iter().take(top.unwrap_or(usize::MAX)).enumerate() {
        println!(
            "  {:>4} {:<28} {:>10}",
            i + 1,
            var.name,
            format!("{:.4}", var.abs_correlation).white()
        );
    }
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let data = load_dataset(data_path)?;

    kv("File", &data_path.display().to_string());
    kv("Rows", &data.n_rows().to_string());
    kv("Columns", &data.n_columns().to_string());
    println!();

    println!("  {:<20} {:<12} {:>8} {:>20}", muted("Column"), muted("Type"), muted("Missing"), muted("Range / Levels"));
    println!("  {}", dim(&"─".repeat(64)));

    for col in data.columns() {
        let (missing, summary) = match col.data() {
            ColumnData::Numeric(values) => {
                let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
                let summary = if finite.is_empty() {
                    "-".to_string()
                } else {
                    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
                    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    format!("{:.3} .. {:.3}", lo, hi)
                };
                (values.len() - finite.len(), summary)
            }
            ColumnData::Categorical { levels, .. } => (0, format!("{} levels", levels.len())),
        };
        println!(
            "  {:<20} {:<12} {:>8} {:>20}",
            col.name(),
            col.type_name().truecolor(140, 140, 140),
            missing,
            summary
        );
    }

    println!();
    Ok(())
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Select {
            data,
            config,
            response,
            model,
            exclude,
            group,
            folds,
            swarm_size,
            max_iterations,
            penalty_factor,
            warm_start,
            seed,
            cv_seed,
            patience,
            serial,
            output,
        } => {
            let args = SelectArgs {
                response,
                model,
                exclude,
                group,
                folds,
                swarm_size,
                max_iterations,
                penalty_factor,
                warm_start,
                seed,
                cv_seed,
                patience,
                serial,
            };
            let report = cmd_select(&data, config.as_deref(), args, output.as_deref())?;
            if !report.is_stable() {
                anyhow::bail!("selection finished without a stable subset");
            }
        }
        Commands::Rank {
            data,
            response,
            exclude,
            group,
            top,
        } => cmd_rank(&data, &response, exclude, group, top)?,
        Commands::Info { data } => cmd_info(&data)?,
    }
    Ok(())
}
