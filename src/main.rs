use taskfleet::metrics::RunReport;
use taskfleet::metrics::logger::StepLogger;
use taskfleet::prelude::*;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Instant;
use tracing::{Level, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario with one seed
    Run {
        /// Path to a scenario JSON file
        scenario: String,
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        /// Override the scenario's task selector (params stay as configured)
        #[arg(long)]
        selector: Option<String>,
        /// Write per-step CSVs alongside the report
        #[arg(long)]
        csv: bool,
        #[arg(short, long, default_value = "results")]
        out_dir: String,
    },

    /// Run one scenario over several seeds per selector and tabulate makespans
    Compare {
        scenario: String,
        #[arg(long, default_value = "nearest,ads")]
        selectors: String,
        #[arg(short, long, default_value_t = 5)]
        repetitions: u64,
        #[arg(long, default_value_t = 0)]
        base_seed: u64,
        #[arg(short, long, default_value = "results")]
        out_dir: String,
    },

    /// List registered task selectors
    List,
}

fn main() -> Result<()> {
    let program_start = Instant::now();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { scenario, seed, selector, csv, out_dir } => {
            run_once(&scenario, seed, selector.as_deref(), csv, &out_dir)?;
        }
        Commands::Compare { scenario, selectors, repetitions, base_seed, out_dir } => {
            compare_selectors(&scenario, &selectors, repetitions, base_seed, &out_dir)?;
        }
        Commands::List => {
            println!("\nAvailable task selectors:");
            for name in SelectorRegistry::global().list() {
                println!("  - {name}");
            }
            println!("\nUsage: taskfleet run <scenario.json> --selector <name>\n");
        }
    }

    info!("total runtime: {:.2}s", program_start.elapsed().as_secs_f64());
    Ok(())
}

fn build_simulation(
    cfg: &Scenario,
    seed: u64,
    selector_override: Option<&str>,
) -> Result<Simulation> {
    let mut sim = Simulation::from_scenario(cfg, seed)?;
    if let Some(name) = selector_override {
        let params = SelectorParams::new(cfg.task_selector.params.clone());
        sim = sim.with_selector(SelectorRegistry::global().create(name, &params)?);
    }
    Ok(sim)
}

fn run_once(
    scenario_path: &str,
    seed: u64,
    selector_override: Option<&str>,
    csv: bool,
    out_dir: &str,
) -> Result<()> {
    let cfg = Scenario::from_path(scenario_path)?;
    let mut sim = build_simulation(&cfg, seed, selector_override)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let prefix = format!("{}_{}_seed{:04}_{}", cfg.scenario_name, sim.selector_name(), seed, timestamp);
    if csv {
        sim = sim.with_logger(StepLogger::new(out_dir, &prefix)?);
    }

    let report = sim.run()?;

    std::fs::create_dir_all(out_dir)?;
    let report_path = format!("{out_dir}/{prefix}_report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    info!("report saved to: {report_path}");

    println!();
    println!("scenario:  {}", report.scenario);
    println!("selector:  {}", report.selector);
    println!("steps:     {}", report.steps);
    println!("makespan:  {:.2}", report.makespan);
    println!("all done:  {}", report.all_done);
    println!("distance:  {:.2}", report.total_move_distance);
    Ok(())
}

fn compare_selectors(
    scenario_path: &str,
    selectors: &str,
    repetitions: u64,
    base_seed: u64,
    out_dir: &str,
) -> Result<()> {
    let cfg = Scenario::from_path(scenario_path)?;
    let names: Vec<&str> = selectors.split(',').map(|s| s.trim()).collect();

    let mut all_reports: Vec<Vec<RunReport>> = Vec::new();
    for name in &names {
        info!("comparing selector: {name}");
        let mut reports = Vec::new();
        for rep in 0..repetitions {
            let mut sim = build_simulation(&cfg, base_seed + rep, Some(name))?;
            reports.push(sim.run()?);
        }
        all_reports.push(reports);
    }

    println!("\n selector    | runs | done | mean makespan | mean distance");
    println!("-------------+------+------+---------------+--------------");
    for (name, reports) in names.iter().zip(&all_reports) {
        let n = reports.len() as f64;
        let done = reports.iter().filter(|r| r.all_done).count();
        let makespan = reports.iter().map(|r| r.makespan).sum::<f64>() / n;
        let distance = reports.iter().map(|r| r.total_move_distance).sum::<f64>() / n;
        println!(
            " {:<11} | {:>4} | {:>4} | {:>13.2} | {:>12.2}",
            name,
            reports.len(),
            done,
            makespan,
            distance,
        );
    }
    println!();

    std::fs::create_dir_all(out_dir)?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("{out_dir}/comparison_{}_{timestamp}.json", cfg.scenario_name);
    let flat: Vec<&RunReport> = all_reports.iter().flatten().collect();
    std::fs::write(&path, serde_json::to_string_pretty(&flat)?)?;
    info!("comparison saved to: {path}");
    Ok(())
}
