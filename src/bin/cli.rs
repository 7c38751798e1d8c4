use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use partd::config::global_config;
use partd::prelude::*;

#[derive(Parser)]
#[command(name = "partdcli")]
#[command(about = "Part D formulary CLI - compare plan coverage and restriction terms across snapshot periods", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show formulary-level statistics for one NDC in a single snapshot
    Stats(StatsArgs),
    /// Compare plan coverage for one NDC between two snapshot periods
    Compare(CompareArgs),
    /// Collect a multi-period series from a TOML manifest and export it
    Series(SeriesArgs),
}

#[derive(Args)]
struct StatsArgs {
    /// Path to the formulary snapshot file
    #[arg(short, long)]
    formulary: PathBuf,
    /// NDC code to analyze
    #[arg(short, long)]
    ndc: String,
}

#[derive(Args)]
struct CompareArgs {
    /// Older period formulary file
    #[arg(long)]
    old_formulary: PathBuf,
    /// Older period plan information file
    #[arg(long)]
    old_plans: PathBuf,
    /// Newer period formulary file
    #[arg(long)]
    new_formulary: PathBuf,
    /// Newer period plan information file
    #[arg(long)]
    new_plans: PathBuf,
    /// NDC code to analyze
    #[arg(short, long)]
    ndc: String,
}

#[derive(Args)]
struct SeriesArgs {
    /// TOML manifest listing periods and drugs
    #[arg(short, long)]
    manifest: PathBuf,
    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
    /// Export format
    #[arg(long, value_enum, default_value_t = ExportFormatOpt::Csv)]
    format: ExportFormatOpt,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ExportFormatOpt {
    Csv,
    Json,
}

impl std::fmt::Display for ExportFormatOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormatOpt::Csv => write!(f, "csv"),
            ExportFormatOpt::Json => write!(f, "json"),
        }
    }
}

/// TOML manifest for the series command:
///
/// ```toml
/// [[period]]
/// label = "2024-12"
/// formulary = "data/2024-12/basic drugs formulary file  20241231.txt"
/// plans = "data/2024-12/plan information  20241231.txt"
///
/// [drugs]
/// Ozempic = ["00169413013"]
/// ```
#[derive(Deserialize)]
struct SeriesManifest {
    period: Vec<ManifestPeriod>,
    drugs: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct ManifestPeriod {
    label: String,
    formulary: PathBuf,
    plans: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Stats(args) => cmd_stats(args),
        Commands::Compare(args) => cmd_compare(args),
        Commands::Series(args) => cmd_series(args),
    }
}

fn configured_reader() -> SnapshotReader {
    match global_config().reader() {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("Error in configuration: {}", e.user_message());
            std::process::exit(1);
        }
    }
}

fn parse_ndc(raw: &str) -> Ndc {
    match Ndc::new(raw) {
        Ok(ndc) => ndc,
        Err(e) => {
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    }
}

fn cmd_stats(args: StatsArgs) {
    let reader = configured_reader();
    let ndc = parse_ndc(&args.ndc);

    match reader.load_formulary_data(&args.formulary) {
        Ok(rows) => {
            let snapshot = Snapshot::new(rows, Vec::new());
            let stats = NdcStats::analyze(&snapshot, &ndc);

            println!("\nFormulary Statistics for NDC {}:", stats.ndc);
            println!("• Listed on {} formulary rows ({} distinct formularies)",
                stats.row_count, stats.formularies.len());
            println!("• Average Tier Level: {}", stats.metrics.avg_tier);
            println!("• Prior Authorization Required: {}% of rows", stats.metrics.pa_percent);
            println!("• Step Therapy Required: {}% of rows", stats.metrics.st_percent);
        }
        Err(e) => {
            eprintln!("Error loading formulary file: {}", e.user_message());
            std::process::exit(1);
        }
    }
}

fn cmd_compare(args: CompareArgs) {
    let ndc = parse_ndc(&args.ndc);

    let old = load_snapshot(&args.old_formulary, &args.old_plans);
    let new = load_snapshot(&args.new_formulary, &args.new_plans);

    let comparison = PlanComparison::compare(&old, &new, &ndc);
    print_comparison(&comparison);
}

fn load_snapshot(formulary: &Path, plans: &Path) -> Snapshot {
    let builder = SnapshotBuilder::new()
        .formulary_file(formulary)
        .plan_file(plans)
        .reader(configured_reader());
    match builder.build() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error loading snapshot: {}", e.user_message());
            std::process::exit(1);
        }
    }
}

fn print_comparison(comparison: &PlanComparison) {
    println!("\nPlan Coverage Comparison for NDC {}:", comparison.ndc);

    println!("\n1. Plan Changes:");
    println!("• Added: {} plans", comparison.added.len());
    println!("• Removed: {} plans", comparison.removed.len());
    println!("• Maintained: {} plans", comparison.maintained.len());

    let coverage_change = comparison.new_coverage_percent - comparison.old_coverage_percent;
    let coverage_trend = if coverage_change > 0.0 {
        "↑"
    } else if coverage_change < 0.0 {
        "↓"
    } else {
        "→"
    };

    println!("\n2. Coverage Analysis:");
    println!(
        "• Old period: {}% of plans ({} of {})",
        comparison.old_coverage_percent, comparison.old_covered_plans, comparison.old_total_plans
    );
    println!(
        "• New period: {}% of plans ({} of {})",
        comparison.new_coverage_percent, comparison.new_covered_plans, comparison.new_total_plans
    );
    println!("• Trend: {} {:.2}% change", coverage_trend, coverage_change.abs());

    println!("\n3. Drug Requirements Analysis:");

    println!("\nAll Plans Metrics:");
    print_metric_change("Average Tier", comparison.metrics.all_old.avg_tier, comparison.metrics.all_new.avg_tier, "");
    print_metric_change("Prior Authorization", comparison.metrics.all_old.pa_percent, comparison.metrics.all_new.pa_percent, "%");
    print_metric_change("Step Therapy", comparison.metrics.all_old.st_percent, comparison.metrics.all_new.st_percent, "%");

    let maintained_count = comparison.maintained.len();
    if maintained_count > 0 {
        println!("\nMaintained Plans Metrics:");
        print_metric_change("Average Tier", comparison.metrics.maintained_old.avg_tier, comparison.metrics.maintained_new.avg_tier, "");
        print_metric_change("Prior Authorization", comparison.metrics.maintained_old.pa_percent, comparison.metrics.maintained_new.pa_percent, "%");
        print_metric_change("Step Therapy", comparison.metrics.maintained_old.st_percent, comparison.metrics.maintained_new.st_percent, "%");

        if comparison.changes.pa_changes > 0 {
            println!(
                "• Prior Authorization requirements changed for {} plans ({:.1}%)",
                comparison.changes.pa_changes,
                comparison.changes.pa_changes as f64 / maintained_count as f64 * 100.0
            );
        }
        if comparison.changes.st_changes > 0 {
            println!(
                "• Step Therapy requirements changed for {} plans ({:.1}%)",
                comparison.changes.st_changes,
                comparison.changes.st_changes as f64 / maintained_count as f64 * 100.0
            );
        }
    }

    if !comparison.added_details.is_empty() {
        println!("\nNewly Added Plans Metrics:");
        println!("• Average Tier: {}", comparison.metrics.added.avg_tier);
        println!("• Prior Authorization: {}%", comparison.metrics.added.pa_percent);
        println!("• Step Therapy: {}%", comparison.metrics.added.st_percent);

        println!("\nExample Added Plans (up to 5):");
        for detail in comparison.added_details.iter().take(5) {
            println!("• {} ({} / {})", detail.plan_key, detail.contract_name, detail.plan_name);
        }
    }

    if !comparison.removed_details.is_empty() {
        println!("\nExample Removed Plans (up to 5):");
        for detail in comparison.removed_details.iter().take(5) {
            println!("• {} ({} / {})", detail.plan_key, detail.contract_name, detail.plan_name);
        }
    }
}

fn print_metric_change(label: &str, old: f64, new: f64, unit: &str) {
    let change = new - old;
    let trend = if change > 0.0 {
        "increased"
    } else if change < 0.0 {
        "decreased"
    } else {
        "unchanged"
    };
    println!(
        "• {}: {} by {:.1}{} ({:.1}{} → {:.1}{})",
        label,
        trend,
        change.abs(),
        unit,
        old,
        unit,
        new,
        unit
    );
}

fn cmd_series(args: SeriesArgs) {
    let manifest = match read_manifest(&args.manifest) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let reader = configured_reader();

    let period_files: Vec<PeriodFiles> = manifest
        .period
        .iter()
        .map(|p| PeriodFiles {
            label: p.label.clone(),
            formulary: p.formulary.clone(),
            plans: p.plans.clone(),
        })
        .collect();

    let periods = match load_period_snapshots(&period_files, &reader) {
        Ok(periods) => periods,
        Err(e) => {
            eprintln!("Error loading period snapshots: {}", e.user_message());
            std::process::exit(1);
        }
    };

    let drugs: Vec<DrugNdcs> = manifest
        .drugs
        .into_iter()
        .map(|(name, ndcs)| DrugNdcs { name, ndcs })
        .collect();

    let report = collect_series(&periods, &drugs);

    for failure in &report.failures {
        eprintln!(
            "Warning: skipped {} / NDC {}: {}",
            failure.drug, failure.ndc, failure.reason
        );
    }

    let format = match args.format {
        ExportFormatOpt::Csv => ExportFormat::Csv,
        ExportFormatOpt::Json => ExportFormat::Json,
    };

    match export_report(&report.rows, &args.output, format) {
        Ok(_) => println!("Exported {} rows to {}", report.rows.len(), args.output.display()),
        Err(e) => {
            eprintln!("Export error: {}", e);
            std::process::exit(1);
        }
    }
}

fn read_manifest(path: &Path) -> anyhow::Result<SeriesManifest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest '{}'", path.display()))?;
    let manifest: SeriesManifest = toml::from_str(&contents)
        .with_context(|| format!("parsing manifest '{}'", path.display()))?;
    if manifest.period.is_empty() {
        anyhow::bail!("manifest '{}' lists no periods", path.display());
    }
    Ok(manifest)
}
