#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use itertools::Itertools;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::process;

use hcle::config::{SimulatorConfig, check_base_value};
use hcle::source::{BetaCsvSource, JsonSnapshotSource, latest_change};
use hcle::{
    Attribution, CoefficientStore, DataSource, DemoPolicy, LiveInputs, Region, ScenarioState,
    ScenarioStatus, SimulationResult, Variable, refresh, simulate,
};

#[derive(Args)]
pub struct SourceArgs {
    /// Path to a simulator configuration file (.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Dashboard snapshot (.json) to load coefficients and baselines from
    #[arg(long, value_name = "PATH", conflicts_with = "beta_csv")]
    pub snapshot: Option<PathBuf>,

    /// Coefficient table (.csv) with Variabel and Koefisien (Beta) columns
    #[arg(long = "beta-csv", value_name = "PATH")]
    pub beta_csv: Option<PathBuf>,
}

#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Adjust one input by a percentage, e.g. NEET=5 or Internet=-10. Repeatable.
    #[arg(long = "change", value_name = "VAR=PERCENT", value_parser = parse_change)]
    pub changes: Vec<(Variable, f64)>,

    /// Region to simulate: National, or Cluster N
    #[arg(long, default_value = "National")]
    pub region: Region,

    /// Use this base value instead of the region's baseline (finite, non-negative)
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub base: Option<f64>,

    /// Do not substitute the demo change when no input is adjusted
    #[arg(long)]
    pub no_demo: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
#[command(
    name = "hcle",
    about = "What-if scenario simulation for the HCLE index",
    long_about = "Applies percentage changes of socioeconomic inputs to the HCLE regression \
                 coefficients, predicts the resulting index, and breaks the change down by input."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario simulation
    #[command(about = "Predict HCLE for a set of input changes")]
    Simulate(SimulateArgs),

    /// Show the coefficients in use, ranked by magnitude
    #[command(about = "Rank model coefficients by impact magnitude")]
    Coefficients(SourceArgs),

    /// Show the yearly national series and its latest movement
    #[command(about = "Show the national HCLE and NEET trend by year")]
    Trend(SourceArgs),

    /// List the selectable regions and their baselines
    #[command(about = "List regions and baseline HCLE values")]
    Regions(SourceArgs),

    /// Write a configuration file holding every default
    #[command(about = "Write the default configuration (outputs: a .toml file)")]
    InitConfig {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Simulate(args)) => run_simulate(args),
        Some(Commands::Coefficients(args)) => run_coefficients(args),
        Some(Commands::Trend(args)) => run_trend(args),
        Some(Commands::Regions(args)) => run_regions(args),
        Some(Commands::InitConfig { path }) => run_init_config(path),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(|e| Box::new(e) as Box<dyn Error>),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Parses `VAR=PERCENT` into a variable and a percentage.
fn parse_change(raw: &str) -> Result<(Variable, f64), String> {
    let (name, percent) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected VAR=PERCENT, got '{raw}'"))?;
    let variable = name.parse::<Variable>().map_err(|e| e.to_string())?;
    let percent: f64 = percent
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|e| format!("invalid percentage '{percent}': {e}"))?;
    if !percent.is_finite() {
        return Err(format!("percentage for {variable} must be finite"));
    }
    Ok((variable, percent))
}

/// Everything a command needs: the configuration, the coefficient store and the
/// baselines, refreshed from a source when one is configured.
struct Inputs {
    config: SimulatorConfig,
    store: CoefficientStore,
    live: LiveInputs,
}

fn load_inputs(args: &SourceArgs) -> Result<Inputs, Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };

    let snapshot = args.snapshot.clone().or_else(|| config.snapshot.clone());
    let beta_csv = args.beta_csv.clone().or_else(|| config.beta_csv.clone());
    let source: Option<Box<dyn DataSource>> = match (snapshot, beta_csv) {
        (Some(path), _) => Some(Box::new(JsonSnapshotSource::new(path)) as Box<dyn DataSource>),
        (None, Some(path)) => Some(Box::new(BetaCsvSource::new(path)) as Box<dyn DataSource>),
        (None, None) => None,
    };

    let mut store = CoefficientStore::with_defaults();
    let live = match &source {
        Some(source) => {
            let live = refresh(&**source, &mut store, config.base_value);
            if !live.live {
                eprintln!(
                    "Note: live data is unavailable; simulating with default coefficients and base value."
                );
            }
            live
        }
        None => LiveInputs::offline(config.base_value),
    };
    config.apply_overrides(&mut store);

    Ok(Inputs {
        config,
        store,
        live,
    })
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    region: String,
    live_data: bool,
    status: ScenarioStatus,
    result: &'a SimulationResult,
    attributions: Vec<Attribution>,
}

fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let inputs = load_inputs(&args.sources)?;

    let mut state = ScenarioState::new();
    for (variable, percent) in &args.changes {
        state.set_percent(*variable, *percent);
    }

    let policy = if args.no_demo {
        DemoPolicy::disabled()
    } else {
        inputs.config.demo
    };
    let changes = state.payload(&policy);
    let status = state.status();

    let base = match args.base {
        Some(base) => check_base_value(base)?,
        None => inputs
            .live
            .baselines
            .base_for(args.region, &inputs.config.region),
    };

    let result = simulate(base, &changes, &inputs.store);

    if args.json {
        let report = SimulationReport {
            region: args.region.to_string(),
            live_data: inputs.live.live,
            status,
            result: &result,
            attributions: result.attributions(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if status == ScenarioStatus::Unset && !changes.is_empty() {
        println!(
            "No inputs adjusted; simulating the demo change {} {:+.1}%.",
            policy.variable,
            policy.change * 100.0
        );
    }
    print_simulation(args.region, &state, &result);
    Ok(())
}

fn print_simulation(region: Region, state: &ScenarioState, result: &SimulationResult) {
    println!("Region:            {region}");
    println!(
        "Adjustment:        {:.1}% total ({:?})",
        state.total_adjustment_percent(),
        state.status()
    );
    println!("Base HCLE:         {:.4}", result.base_value);
    println!("Predicted HCLE:    {:.4}", result.predicted_value);
    println!(
        "Delta:             {:.4} ({})",
        result.total_delta,
        result.direction()
    );
    println!(
        "Relative change:   {:.1}% of base",
        -result.relative_change_percent()
    );
    if result.clamped {
        println!(
            "Prediction clamped at zero; unclamped impact was {:.4}.",
            result.impact_sum
        );
    }

    let attributions = result.attributions();
    if attributions.is_empty() {
        println!("No inputs changed; nothing to attribute.");
        return;
    }

    println!();
    println!("{:<10} {:>9} {:>10} {:>9}", "Input", "Change", "Impact", "Share");
    for attribution in &attributions {
        println!(
            "{:<10} {:>8.1}% {:>10.5} {:>8.1}%",
            attribution.variable,
            attribution.contribution.change * 100.0,
            attribution.contribution.impact,
            attribution.percent
        );
    }
}

fn run_coefficients(args: SourceArgs) -> Result<(), Box<dyn Error>> {
    let inputs = load_inputs(&args)?;
    let origin = if inputs.store.is_refreshed() {
        "refreshed"
    } else {
        "built-in defaults"
    };
    println!("Coefficients ({origin}):");
    println!(
        "    {:<10} {:>9} {:>9} {:>8}",
        "Input", "Beta", "Magnitude", "P-value"
    );
    for (rank, row) in inputs.store.ranking().iter().enumerate() {
        let p_value = inputs
            .live
            .p_values
            .get(&row.variable)
            .map_or_else(|| "-".to_string(), |p| format!("{p:.4}"));
        println!(
            "{:>2}. {:<10} {:>9.4} {:>9.4} {:>8}  ({})",
            rank + 1,
            row.variable,
            row.coefficient,
            row.magnitude,
            p_value,
            row.variable.describe()
        );
    }
    if let Some(metrics) = inputs.live.metrics {
        println!(
            "Held-out fit: R2 = {:.4}, MSE = {:.6}",
            metrics.r_squared, metrics.mean_squared_error
        );
    }
    Ok(())
}

fn run_trend(args: SourceArgs) -> Result<(), Box<dyn Error>> {
    let inputs = load_inputs(&args)?;
    let trend = &inputs.live.trend;
    println!("{:<6} {:>8} {:>7}", "Year", "HCLE", "NEET");
    for point in trend {
        let neet = point
            .neet
            .map_or_else(|| "-".to_string(), |n| format!("{n:.1}%"));
        println!("{:<6} {:>8.4} {:>7}", point.year, point.mean_value, neet);
    }
    if let Some(change) = latest_change(trend) {
        let neet = change
            .neet_delta
            .map(|d| format!(", NEET {d:+.1} pp"))
            .unwrap_or_default();
        println!(
            "Latest ({}): HCLE {:+.4} vs previous year{neet}",
            change.year, change.mean_delta
        );
    }
    Ok(())
}

fn run_regions(args: SourceArgs) -> Result<(), Box<dyn Error>> {
    let inputs = load_inputs(&args)?;
    let baselines = &inputs.live.baselines;
    let lines = baselines
        .regions()
        .into_iter()
        .map(|region| {
            let source = match region {
                Region::Cluster(n) if !baselines.clusters.contains_key(&n) => "scaled",
                Region::Cluster(_) => "cluster mean",
                Region::National => "national mean",
            };
            format!(
                "{:<12} {:.4}  ({source})",
                region.to_string(),
                baselines.base_for(region, &inputs.config.region)
            )
        })
        .join("\n");
    println!("{lines}");
    Ok(())
}

fn run_init_config(path: PathBuf) -> Result<(), Box<dyn Error>> {
    SimulatorConfig::default().save(&path)?;
    println!("Default configuration written to {}", path.display());
    Ok(())
}

/// Format seconds into a human-readable duration like "2.4 hours ago"
fn format_duration_ago(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    if seconds < MINUTE {
        format!("{seconds} seconds ago")
    } else if seconds < HOUR {
        format!("{:.1} minutes ago", seconds as f64 / MINUTE as f64)
    } else if seconds < DAY {
        format!("{:.1} hours ago", seconds as f64 / HOUR as f64)
    } else {
        format!("{:.1} days ago", seconds as f64 / DAY as f64)
    }
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let build_timestamp: u64 = env!("HCLE_BUILD_TIMESTAMP").parse().unwrap_or(0);

    println!("hcle {version}");

    if build_timestamp > 0 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if now > build_timestamp {
            println!("Built: {}", format_duration_ago(now - build_timestamp));
        } else {
            println!("Built: just now");
        }
    }
}
