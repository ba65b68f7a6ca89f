//! Headless driver
//!
//! Loads a config, seeds a grid, runs it for a number of generations and
//! prints the performance metrics. With `--analyze` the configured rule is
//! classified on a background thread while the simulation runs.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::info;

use voxel_life::analysis::AnalysisWorker;
use voxel_life::{AnalysisResult, EngineConfig, MetricsSnapshot, RuleAnalyzer};

#[derive(Parser, Debug)]
#[command(name = "voxel-life-headless")]
#[command(about = "Run a 3D cellular automaton without a renderer")]
struct Args {
    /// TOML config file; built-in defaults when omitted
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Generations to simulate
    #[arg(long, short = 'g', default_value_t = 100)]
    generations: u64,

    /// Worker threads, overriding the config (0 = detected)
    #[arg(long)]
    workers: Option<usize>,

    /// Seed for the initial fill, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Also classify the configured rule
    #[arg(long)]
    analyze: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct Report {
    rule: String,
    generation: u64,
    population: usize,
    metrics: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisResult>,
}

fn run(args: Args) -> Result<Report, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(seed) = args.seed {
        config.seed.seed = seed;
    }

    let rules = config.rule_set()?;
    let mut worker = None;
    if args.analyze {
        let mut w = AnalysisWorker::spawn(RuleAnalyzer::new(config.analysis.clone()))?;
        w.submit(rules.clone(), config.dimensions())?;
        worker = Some(w);
    }

    let mut engine = config.build_engine()?;
    info!(
        rule = %rules.notation(),
        population = engine.live_cell_count(),
        generations = args.generations,
        "simulation starting"
    );
    engine.run_simulation(args.generations)?;

    let analysis = match worker {
        Some(w) => {
            let outcome = w.recv()?;
            w.shutdown()?;
            Some(outcome.result?)
        }
        None => None,
    };

    Ok(Report {
        rule: rules.name,
        generation: engine.generation(),
        population: engine.live_cell_count(),
        metrics: engine.metrics(),
        analysis,
    })
}

fn print_text(report: &Report) {
    println!("rule:        {}", report.rule);
    println!("generation:  {}", report.generation);
    println!("population:  {}", report.population);
    println!(
        "throughput:  {:.0} cells/s",
        report.metrics.throughput_cells_per_second
    );
    println!("memory eff.: {:.1}%", report.metrics.memory_efficiency);
    if let Some(analysis) = &report.analysis {
        println!("stability:   {:.3}", analysis.stability);
        println!("growth rate: {:.4}", analysis.growth_rate);
        println!("complexity:  {:.3}", analysis.complexity);
        println!("patterns:    {:?}", analysis.observed_patterns);
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let format = args.format;

    let report = match run(args) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if format == OutputFormat::Json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_text(&report);
    }
    ExitCode::SUCCESS
}
