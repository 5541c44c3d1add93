use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::*;

use alloc_labels::config::{self, Config};
use alloc_labels::{external_allocation_name, LabelConfig};

const LOG_LEVEL_ENV: &str = "ALLOC_LABELS_LOG_LEVEL";

#[derive(Parser)]
#[clap(version, about = "Resolve cost allocation names from workload labels")]
struct CliArgs {
    #[clap(long = "config", default_value = config::CONFIG_PATH)]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the allocation name for a set of labels
    Resolve {
        /// cluster, namespace, pod, ... or label:<key>
        #[clap(long = "aggregate-by")]
        aggregate_by: String,

        /// A single key=value label, may be repeated
        #[clap(long = "label")]
        label: Vec<String>,

        /// Labels as key=value;key=value
        #[clap(long = "labels")]
        labels: Option<String>,

        /// JSON object of labels, '-' for stdin
        #[clap(long = "labels-json")]
        labels_json: Option<PathBuf>,

        /// Fail if no allocation name can be derived
        #[clap(long = "require")]
        require: bool,
    },

    /// Print the label configuration with defaults filled in
    Mapping {
        #[clap(long = "json")]
        json: bool,
    },
}

fn main() {
    let args = CliArgs::parse();

    if let Err(err) = run(args) {
        eprintln!("err: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let from_rust_log = init_logging();

    let config = Config::load(&args.config)?;
    if !from_rust_log {
        log::set_max_level(level_filter(&config.log_level()));
    }

    let version = env!("CARGO_PKG_VERSION");
    debug!("alloc-labels v{version}");

    let lc = config.label_config();

    match args.command {
        Command::Resolve {
            aggregate_by,
            label,
            labels,
            labels_json,
            require,
        } => {
            let all = collect_labels(labels_json.as_deref(), labels.as_deref(), &label)?;
            if let Some(name) = resolve(&lc, &all, &aggregate_by, require)? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Mapping { json } => {
            print!("{}", render_mapping(&lc, json)?);
            Ok(())
        }
    }
}

// Installed before the config is loaded so that loading can log. Returns true
// when RUST_LOG drives the filters; otherwise the level is narrowed once the
// configured level is known.
fn init_logging() -> bool {
    let rust_log = std::env::var("RUST_LOG").ok();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.parse_filters(rust_log.as_deref().unwrap_or("trace"));

    // A second init (e.g. embedding) is harmless
    _ = builder.try_init();

    if rust_log.is_some() {
        return true;
    }

    let early = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    log::set_max_level(level_filter(&early));
    false
}

fn level_filter(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

// Sources are applied in order: JSON, then --labels, then each --label.
fn collect_labels(
    labels_json: Option<&Path>,
    labels: Option<&str>,
    label: &[String],
) -> Result<HashMap<String, String>> {
    let mut all = HashMap::new();

    if let Some(path) = labels_json {
        all.extend(load_labels_json(path)?);
    }

    if let Some(labels) = labels {
        all.extend(config::parse_labels(labels));
    }

    for kv in label {
        let (k, v) = config::parse_label(kv)
            .ok_or_else(|| anyhow!("--label expects key=value, got '{kv}'"))?;
        all.insert(k, v);
    }

    Ok(all)
}

fn load_labels_json(path: &Path) -> Result<HashMap<String, String>> {
    let mut buf = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut buf)?;
    } else {
        buf = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read labels from {}", path.display()))?;
    }

    serde_json::from_str(&buf).context("Labels must be a JSON object of strings")
}

fn resolve(
    lc: &LabelConfig,
    labels: &HashMap<String, String>,
    aggregate_by: &str,
    require: bool,
) -> Result<Option<String>> {
    debug!("Resolving '{aggregate_by}' over {} labels", labels.len());

    let name = external_allocation_name(Some(lc), labels, aggregate_by);
    if name.is_empty() {
        if require {
            return Err(anyhow!("No allocation name for '{aggregate_by}'"));
        }
        return Ok(None);
    }

    Ok(Some(name))
}

fn render_mapping(lc: &LabelConfig, json: bool) -> Result<String> {
    let m = lc.map();
    if json {
        Ok(serde_json::to_string_pretty(&m)? + "\n")
    } else {
        Ok(serde_yaml::to_string(&m)?)
    }
}
