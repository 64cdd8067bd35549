//! Metrica CLI - inspect a semantic manifest
//!
//! Usage:
//!   metrica validate [manifest.json]
//!   metrica linkable [manifest.json] [--metric <name>]... [--with <prop>]... [--without <prop>]...
//!   metrica plan [manifest.json] --metric <name>... --group-by <name>... [--where <template>]...
//!
//! Examples:
//!   metrica validate target/semantic_manifest.json
//!   metrica linkable target/semantic_manifest.json --metric bookings --without multi_hop
//!   metrica plan target/semantic_manifest.json --metric bookings --group-by metric_time__month

use clap::{Parser, Subcommand};
use metrica::config::Settings;
use metrica::logging;
use metrica::model::{Manifest, MetricReference};
use metrica::planner::{MetricQuery, QueryPlanner};
use metrica::semantic::{
    LinkableElementFilter, LinkableElementProperty, MetricAccessor, MetricLookup,
    SemanticModelAccessor,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "metrica")]
#[command(about = "Metrica - linkable elements, join paths and dataflow plans for a semantic manifest")]
#[command(version)]
struct Cli {
    /// Settings file (overrides METRICA_CONFIG and the default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index, lookup and resolver and report any manifest issue
    Validate {
        /// Path to the JSON manifest (defaults to [manifest] path in the settings)
        manifest: Option<PathBuf>,
    },

    /// Print the elements a set of metrics can be grouped by
    Linkable {
        /// Path to the JSON manifest (defaults to [manifest] path in the settings)
        manifest: Option<PathBuf>,

        /// Metric to intersect over (none lists the distinct-values set)
        #[arg(short, long = "metric")]
        metrics: Vec<String>,

        /// Keep elements with any of these properties
        #[arg(long = "with")]
        with: Vec<String>,

        /// Drop elements with any of these properties
        #[arg(long = "without")]
        without: Vec<String>,
    },

    /// Resolve a query and print its dataflow plan
    Plan {
        /// Path to the JSON manifest (defaults to [manifest] path in the settings)
        manifest: Option<PathBuf>,

        #[arg(short, long = "metric")]
        metrics: Vec<String>,

        #[arg(short, long = "group-by")]
        group_by: Vec<String>,

        /// Filter template, e.g. "{{ Dimension('listing__country_latest') }} = 'us'"
        #[arg(short, long = "where")]
        where_filters: Vec<String>,

        /// Metric or group-by item, prefix with '-' for descending
        #[arg(short, long = "order-by", allow_hyphen_values = true)]
        order_by: Vec<String>,

        #[arg(short, long)]
        limit: Option<u64>,

        /// Write to this table instead of a dataframe
        #[arg(short, long)]
        table: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.logging);

    match cli.command {
        Commands::Validate { manifest } => cmd_validate(&settings, manifest),
        Commands::Linkable {
            manifest,
            metrics,
            with,
            without,
        } => cmd_linkable(&settings, manifest, metrics, with, without),
        Commands::Plan {
            manifest,
            metrics,
            group_by,
            where_filters,
            order_by,
            limit,
            table,
        } => {
            let mut query = MetricQuery::new().metrics(metrics).group_by(group_by);
            query.where_filters = where_filters;
            query.order_by = order_by;
            query.limit = limit;
            query.output_table = table;
            cmd_plan(&settings, manifest, query)
        }
    }
}

fn load_manifest(settings: &Settings, path: Option<PathBuf>) -> Result<Manifest, String> {
    let path = match path {
        Some(p) => p,
        None => match settings.manifest.resolved_path() {
            Ok(Some(p)) => p,
            Ok(None) => {
                return Err("No manifest given and no [manifest] path configured".to_string())
            }
            Err(e) => return Err(format!("Configuration error: {}", e)),
        },
    };
    let source = fs::read_to_string(&path)
        .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
    Manifest::from_json_str(&source)
        .map_err(|e| format!("Error parsing manifest '{}': {}", path.display(), e))
}

fn build_lookup(settings: &Settings, path: Option<PathBuf>) -> Result<MetricLookup, String> {
    let manifest = load_manifest(settings, path)?;
    MetricLookup::from_manifest(&manifest, settings.resolver_config()).map_err(|e| e.to_string())
}

fn cmd_validate(settings: &Settings, manifest: Option<PathBuf>) -> ExitCode {
    match build_lookup(settings, manifest) {
        Ok(lookup) => {
            let index = lookup.semantic_model_index();
            println!(
                "OK: {} semantic models, {} measures, {} metrics, {} join edges",
                index.semantic_models().len(),
                index.measure_references().len(),
                lookup.metric_references().len(),
                lookup.join_evaluator().edge_count()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Validation errors:\n{}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_properties(names: &[String]) -> Result<Vec<LinkableElementProperty>, String> {
    names
        .iter()
        .map(|name| {
            LinkableElementProperty::parse(name)
                .ok_or_else(|| format!("Unknown element property '{}'", name))
        })
        .collect()
}

fn cmd_linkable(
    settings: &Settings,
    manifest: Option<PathBuf>,
    metrics: Vec<String>,
    with: Vec<String>,
    without: Vec<String>,
) -> ExitCode {
    let lookup = match build_lookup(settings, manifest) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter = match (parse_properties(&with), parse_properties(&without)) {
        (Ok(with), Ok(without)) => {
            let mut filter = LinkableElementFilter::new(&with, &without);
            if with.is_empty() {
                filter.with_any_of = LinkableElementProperty::all();
            }
            filter
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = if metrics.is_empty() {
        Ok(lookup.linkable_elements_for_no_metrics_query(Some(&filter)))
    } else {
        let references: Vec<MetricReference> =
            metrics.iter().map(MetricReference::new).collect();
        lookup.linkable_elements_for_metrics(&references, Some(&filter))
    };

    match result {
        Ok(set) => {
            print!("{}", set.dump());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Lookup error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_plan(settings: &Settings, manifest: Option<PathBuf>, query: MetricQuery) -> ExitCode {
    let lookup = match build_lookup(settings, manifest) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let planner = QueryPlanner::new(&lookup).with_suggestion_config(settings.suggestion_config());
    match planner.plan(&query) {
        Ok(plan) => {
            print!("{}", plan.text_structure());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Planning error: {}", e);
            ExitCode::FAILURE
        }
    }
}
