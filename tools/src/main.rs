//! datagen-runner: headless synthetic bettor dataset generator.
//!
//! Usage:
//!   datagen-runner --seed 42 --players 10000 --out-dir ./output
//!   datagen-runner --seed 7 --players 500 --db runs.db --append --no-validate
//!   datagen-runner --config data/registry.json --threads 4 --json

use anyhow::{bail, Result};
use sentinel_core::{
    config::GeneratorConfig,
    engine::{Generator, RunRequest},
    export::export_dataset,
    store::{ArtifactStore, WriteMode},
    types::Cohort,
    validation::ValidationReport,
};
use serde::Serialize;
use std::{env, path::Path};

#[derive(Serialize)]
struct RunSummary {
    run_id:           String,
    seed:             u64,
    players:          usize,
    bets:             usize,
    assessments:      usize,
    cohorts:          Vec<(String, usize)>,
    validation:       Option<ValidationSummary>,
}

#[derive(Serialize)]
struct ValidationSummary {
    passed:           bool,
    deviations:       usize,
    null_sport_count: usize,
    correlations:     Vec<(String, Option<f64>, f64)>,
}

impl From<&ValidationReport> for ValidationSummary {
    fn from(r: &ValidationReport) -> Self {
        Self {
            passed: r.passed(),
            deviations: r.deviation_count(),
            null_sport_count: r.null_sport_count,
            correlations: r
                .correlations
                .iter()
                .map(|c| {
                    (
                        format!("{}~{}", c.trait_dim.label(), c.metric.label()),
                        c.achieved,
                        c.target,
                    )
                })
                .collect(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let players = parse_arg(&args, "--players", 10_000usize);
    let threads = parse_arg(&args, "--threads", 0usize);
    let validate = !has_flag(&args, "--no-validate");
    let inject_edge_cases = !has_flag(&args, "--no-edge-cases");
    let append = has_flag(&args, "--append");
    let json = has_flag(&args, "--json");
    let db = flag_value(&args, "--db");
    let out_dir = flag_value(&args, "--out-dir");
    let config_path = flag_value(&args, "--config");

    if players == 0 {
        bail!("--players must be at least 1");
    }

    let config = match config_path {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };

    if !json {
        println!("datagen-runner");
        println!("  seed:      {seed}");
        println!("  players:   {players}");
        println!("  validate:  {validate}");
        println!("  edges:     {inject_edge_cases}");
        println!("  threads:   {}", if threads == 0 { "auto".to_string() } else { threads.to_string() });
        println!("  registry:  {}", config_path.unwrap_or("(built-in)"));
        println!();
    }

    let generator = Generator::new(config)?;
    let request = RunRequest {
        seed,
        population: players,
        validate,
        inject_edge_cases,
        threads: (threads > 0).then_some(threads),
    };
    let output = generator.run(&request)?;
    let dataset = &output.dataset;

    let run_id = format!("run-{seed}-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);

    if let Some(dir) = out_dir {
        let paths = export_dataset(dataset, Path::new(dir))?;
        log::info!("players -> {}", paths.players_csv.display());
        log::info!("bets -> {}", paths.bets_csv.display());
        log::info!("assessments -> {}", paths.assessments_csv.display());
    }

    if let Some(db) = db {
        let mut store = ArtifactStore::open(db)?;
        store.migrate()?;
        let mode = if append { WriteMode::Append } else { WriteMode::FullRebuild };
        store.write_run(
            &run_id,
            generator.registry().config(),
            dataset,
            output.report.as_ref(),
            mode,
        )?;
    }

    let summary = RunSummary {
        run_id,
        seed,
        players: dataset.players.len(),
        bets: dataset.bets.len(),
        assessments: dataset.assessments.len(),
        cohorts: Cohort::ALL
            .iter()
            .map(|c| {
                let n = dataset.players.iter().filter(|p| p.cohort == *c).count();
                (c.label().to_string(), n)
            })
            .collect(),
        validation: output.report.as_ref().map(ValidationSummary::from),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, output.report.as_ref());
    }

    if let Some(report) = &output.report {
        if !report.passed() {
            bail!("blocking validation failed");
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, report: Option<&ValidationReport>) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", summary.run_id);
    println!("  players:        {}", summary.players);
    println!("  bets:           {}", summary.bets);
    println!("  assessments:    {}", summary.assessments);
    for (label, n) in &summary.cohorts {
        let pct = 100.0 * *n as f64 / summary.players.max(1) as f64;
        println!("  {label:<15} {n} ({pct:.1}%)");
    }

    if let Some(report) = report {
        println!();
        println!("=== VALIDATION ===");
        print!("{}", report.render());
        println!();
        println!("=== CORRELATIONS (achieved values are authoritative) ===");
        for c in &report.correlations {
            let achieved = c.achieved.map_or("n/a".to_string(), |r| format!("{r:.3}"));
            println!(
                "  {:<22} ~ {:<22} r={achieved:<7} target={:.2}",
                c.trait_dim.label(),
                c.metric.label(),
                c.target
            );
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
