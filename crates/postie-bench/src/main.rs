//! postie-bench: CLI tool for timing Chinese Postman solves.
//!
//! Builds a synthetic graph family in memory, solves it with
//! configurable parameters, and prints per-stage diagnostics. Useful for:
//!
//! - Seeing how the matching search grows with the odd-vertex count
//! - Comparing the `minimum` and `first` parallel-edge weight policies
//! - Checking that a search budget fails fast instead of hanging
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin postie-bench -- [OPTIONS]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod families;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use postie_route::diagnostics::{self, Clock, SolveDiagnostics};
use postie_route::postman::Postman;
use postie_route::{Graph, GraphError, Route, SearchBudget, SolverConfig, WeightPolicy};
use tracing_subscriber::filter::LevelFilter;

use families::Family;

/// Chinese Postman solve timing and diagnostics for postie.
///
/// Solves a generated graph and prints detailed per-stage timing and
/// count diagnostics.
#[derive(Parser)]
#[command(name = "postie-bench", version)]
struct Cli {
    /// Graph family to generate.
    #[arg(long, value_enum, default_value_t = Family::Grid)]
    family: Family,

    /// Family size: grid side, ladder length, star leaves, wheel rim or
    /// complete-graph order.
    #[arg(long, default_value_t = 6, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    size: u32,

    /// Use varied edge weights in `1..=9` instead of unit weights.
    #[arg(long)]
    weighted: bool,

    /// How parallel edges are priced during shortest-path search.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_POLICY)]
    weight_policy: Policy,

    /// Maximum matching search nodes.
    #[arg(long, default_value_t = SolverConfig::DEFAULT_MAX_NODES)]
    max_nodes: u64,

    /// Remove the matching node limit.
    #[arg(long, conflicts_with = "max_nodes")]
    unbounded: bool,

    /// Wall-clock limit for the matching search, in milliseconds.
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Vertex the closed walk starts and ends at.
    #[arg(long)]
    start: Option<u32>,

    /// Print the route of the first run.
    #[arg(long)]
    walk: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full solver config as a JSON string.
    ///
    /// When provided, the weight policy and budget flags are ignored.
    /// The JSON must be a valid `SolverConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Log solver progress to stderr.
    #[arg(long, short)]
    verbose: bool,
}

/// Weight policy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// Cheapest of the parallel edges.
    Minimum,
    /// First inserted parallel edge.
    First,
}

const fn policy_from_route(p: WeightPolicy) -> Policy {
    match p {
        WeightPolicy::Minimum => Policy::Minimum,
        WeightPolicy::First => Policy::First,
    }
}

/// The CLI default policy, derived from [`SolverConfig::DEFAULT_WEIGHT_POLICY`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_POLICY: Policy = policy_from_route(SolverConfig::DEFAULT_WEIGHT_POLICY);

/// Build a [`SolverConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual solver flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SolverConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SolverConfig {
        weight_policy: match cli.weight_policy {
            Policy::Minimum => WeightPolicy::Minimum,
            Policy::First => WeightPolicy::First,
        },
        search_budget: SearchBudget {
            max_nodes: (!cli.unbounded).then_some(cli.max_nodes),
            time_limit: cli.time_limit_ms.map(Duration::from_millis),
        },
    })
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    if let Err(e) = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init()
    {
        eprintln!("Logging disabled: {e}");
    }
}

fn solve_once(
    graph: &Graph<u32>,
    config: SolverConfig,
    start: Option<u32>,
) -> Result<(Route<u32>, SolveDiagnostics), GraphError> {
    let mut pending = Postman::new(graph, config);
    if let Some(start) = start {
        pending = pending.starting_at(start)?;
    }
    diagnostics::solve_with_diagnostics(pending, &StdClock)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let graph = match cli.family.build(cli.size, cli.weighted) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error building {:?} graph of size {}: {e}", cli.family, cli.size);
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Graph: {:?} size {} ({} vertices, {} edges, {} odd)",
        cli.family,
        cli.size,
        graph.vertex_count(),
        graph.edge_count(),
        graph.odd_degree_vertices().len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match solve_once(&graph, config, cli.start) {
            Ok((route, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Print the route on the first run only.
                if run == 0 && cli.walk {
                    print_route(&route, cli.json);
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Solve error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn print_route(route: &Route<u32>, json: bool) {
    if json {
        match serde_json::to_string_pretty(route) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing route: {e}"),
        }
        return;
    }
    let walk: Vec<String> = route.walk.iter().map(u32::to_string).collect();
    println!();
    println!("Walk ({} edges): {}", route.edge_count(), walk.join(" -> "));
    if !route.duplicated_edges.is_empty() {
        let duplicated: Vec<String> = route
            .duplicated_edges
            .iter()
            .map(|(u, v, w)| format!("{u}-{v} ({w})"))
            .collect();
        println!("Duplicated: {}", duplicated.join(", "));
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&SolveDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[SolveDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Odd Vertices", |d| d.odd_vertices.duration),
        ("Distances", |d| d.distances.duration),
        ("Matching", |d| d.matching.duration),
        ("Augmentation", |d| d.augmentation.duration),
        ("Circuit", |d| d.circuit.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("postie-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_solver_config() {
        let cli = parse(&[]);
        assert_eq!(config_from_cli(&cli).unwrap(), SolverConfig::default());
    }

    #[test]
    fn flags_build_config() {
        let cli = parse(&["--weight-policy", "first", "--max-nodes", "10", "--time-limit-ms", "250"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.weight_policy, WeightPolicy::First);
        assert_eq!(config.search_budget.max_nodes, Some(10));
        assert_eq!(config.search_budget.time_limit, Some(Duration::from_millis(250)));
    }

    #[test]
    fn unbounded_clears_node_limit() {
        let cli = parse(&["--unbounded"]);
        assert_eq!(config_from_cli(&cli).unwrap().search_budget.max_nodes, None);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "--weight-policy",
            "minimum",
            "--config-json",
            r#"{"weight_policy":"First","search_budget":{"max_nodes":null}}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.weight_policy, WeightPolicy::First);
        assert_eq!(config.search_budget, SearchBudget::unbounded());
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = parse(&["--config-json", "{"]);
        assert!(config_from_cli(&cli).unwrap_err().starts_with("Error parsing --config-json"));
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(
            Cli::try_parse_from(["postie-bench", "--size", "0"]).is_err(),
            "size must be at least 1"
        );
    }

    #[test]
    fn solve_once_honours_start() {
        let graph = Family::Wheel.build(4, false).unwrap();
        let (route, diag) = solve_once(&graph, SolverConfig::default(), Some(3)).unwrap();
        assert_eq!(route.walk.first(), Some(&3));
        assert_eq!(diag.summary.odd_vertex_count, 4);
        assert!(matches!(
            solve_once(&graph, SolverConfig::default(), Some(99)),
            Err(GraphError::VertexNotFound(_))
        ));
    }
}
