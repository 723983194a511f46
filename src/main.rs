// Exposure Ledger - CLI
//
//   exposure-ledger unify     <entity source files...>
//   exposure-ledger aggregate --totals funds.csv <holdings files or dirs...>
//   exposure-ledger search    <query> [--limit N]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use exposure_ledger::config::{AssetSelection, MissingTotalPolicy};
use exposure_ledger::output::{read_aggregation, write_aggregation, write_unified};
use exposure_ledger::{run_aggregation, run_unification, search_securities, EngineConfig, MatchPolicy, SecurityNormalizer};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exposure-ledger", version, about = "Entity resolution and fund exposure aggregation")]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory (overrides [output].dir)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge entity source files into one canonical dataset
    Unify {
        /// Source files (boycott JSON, who-profits JSON, AFSC CSV, generic CSV)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        #[arg(long)]
        threshold: Option<u8>,
    },

    /// Aggregate fund holdings into per-security exposure
    Aggregate {
        /// Holdings JSON files, or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Fund totals CSV (name in column 0, value in column 2)
        #[arg(long)]
        totals: PathBuf,

        #[arg(long, value_enum)]
        assets: Option<AssetsArg>,

        /// Abort on a fund with no declared total instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Keep share classes as separate securities
        #[arg(long)]
        no_share_class_grouping: bool,
    },

    /// Search aggregated securities by name
    Search {
        query: String,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Exact,
    Fuzzy,
}

#[derive(Clone, Copy, ValueEnum)]
enum AssetsArg {
    Restricted,
    Unrestricted,
    Larger,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exposure_ledger=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.output {
        config.output.dir = dir;
    }

    match cli.command {
        Command::Unify { files, policy, threshold } => {
            if let Some(policy) = policy {
                config.matching.policy = match policy {
                    PolicyArg::Exact => MatchPolicy::Exact,
                    PolicyArg::Fuzzy => MatchPolicy::Fuzzy,
                };
            }
            if let Some(threshold) = threshold {
                config.matching.entity_threshold = threshold;
            }
            config.validate()?;
            run_unify(&config, files)
        }
        Command::Aggregate {
            inputs,
            totals,
            assets,
            strict,
            no_share_class_grouping,
        } => {
            if let Some(assets) = assets {
                config.aggregation.asset_selection = match assets {
                    AssetsArg::Restricted => AssetSelection::Restricted,
                    AssetsArg::Unrestricted => AssetSelection::Unrestricted,
                    AssetsArg::Larger => AssetSelection::Larger,
                };
            }
            if strict {
                config.aggregation.on_missing_total = MissingTotalPolicy::Abort;
            }
            if no_share_class_grouping {
                config.aggregation.group_share_classes = false;
            }
            run_aggregate(&config, inputs, &totals)
        }
        Command::Search { query, limit } => run_search(&config, &query, limit),
    }
}

fn run_unify(config: &EngineConfig, files: Vec<PathBuf>) -> Result<()> {
    println!("🏢 Entity Unification");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let dataset = run_unification(config, files)?;

    for source in &dataset.metadata.sources {
        println!(
            "✓ {} ({}): {} new, {} merged, {} skipped",
            source.name, source.file, source.entities_loaded, source.records_merged, source.records_skipped
        );
    }

    let stats = &dataset.metadata.statistics;
    println!("\n📊 Statistics");
    println!("   Total entities:        {}", stats.total_entities);
    println!("   Multi-source entities: {}", stats.multi_source_entities);
    println!("   Skipped empty names:   {}", stats.skipped_empty_names);
    for (entity_type, count) in &stats.by_type {
        println!("   - {}: {}", entity_type, count);
    }

    let written = write_unified(&config.output, &dataset)?;
    println!();
    for path in written {
        println!("💾 {}", path.display());
    }

    Ok(())
}

fn run_aggregate(config: &EngineConfig, inputs: Vec<PathBuf>, totals: &Path) -> Result<()> {
    println!("💰 Exposure Aggregation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let files = expand_holdings_inputs(inputs)?;
    println!("✓ {} holdings files", files.len());

    let output = run_aggregation(config, files, totals)?;
    let summary = &output.summary;

    println!("✓ {} securities", summary.securities.len());
    println!("✓ {} rows ({} malformed weights, {} blank, {} percentage-corrected)",
        summary.counters.rows_processed,
        summary.counters.malformed_weights,
        summary.counters.blank_weights,
        summary.counters.percentage_weights,
    );
    println!("   Total sum:     ${:.2}", summary.total_sum);
    println!("   Unknown money: ${:.2}", summary.unknown_money);
    println!("\n🧮 {}", output.discrepancies.summary());

    for skipped in &output.discrepancies.skipped_funds {
        println!("   ⚠️  skipped {}: {}", skipped.fund_name, skipped.reason);
    }

    let written = write_aggregation(&config.output, &output)?;
    println!();
    for path in written {
        println!("💾 {}", path.display());
    }

    Ok(())
}

fn run_search(config: &EngineConfig, query: &str, limit: Option<usize>) -> Result<()> {
    let output = read_aggregation(&config.output).context("Run `aggregate` first")?;

    let normalizer = SecurityNormalizer::new(config.aggregation.group_share_classes);
    let limit = config.server.clamp_limit(limit);
    let hits = search_securities(&output.summary.securities, query, &normalizer, limit);

    if hits.is_empty() {
        println!("No securities match '{}'", query);
        return Ok(());
    }

    for security in hits {
        println!(
            "{:<50} ${:>18.2}  ({} funding sources)",
            security.asset,
            security.total_investment,
            security.funding_sources.len()
        );
    }

    Ok(())
}

/// Files pass through; directories contribute their *.json files
fn expand_holdings_inputs(inputs: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(&input)
                .with_context(|| format!("Failed to read directory: {}", input.display()))?;
            let mut dir_files = Vec::new();
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    dir_files.push(path);
                }
            }
            // read_dir order is platform-dependent
            dir_files.sort();
            files.extend(dir_files);
        } else {
            files.push(input);
        }
    }

    Ok(files)
}
