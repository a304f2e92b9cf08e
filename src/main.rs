use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use community_flow::config::{Config, IdentityPolicy, IntervalMode};
use community_flow::data::loader::load_temporal_graph;
use community_flow::layout::OptimizerControl;
use community_flow::{build_flow_diagram_with, storage};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Identity {
    RawLabel,
    TrackedChain,
}

impl From<Identity> for IdentityPolicy {
    fn from(identity: Identity) -> Self {
        match identity {
            Identity::RawLabel => IdentityPolicy::RawLabel,
            Identity::TrackedChain => IdentityPolicy::TrackedChain,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "community-flow",
    about = "Track communities across time slices and lay them out as a flow diagram"
)]
struct Cli {
    /// Node membership table (node_id, time, cluster), CSV or Parquet
    #[clap(long)]
    nodes: PathBuf,

    /// Edge table (src, dst, time)
    #[clap(long)]
    edges: PathBuf,

    /// Community roster table (time, community_id, size, label)
    #[clap(long)]
    communities: PathBuf,

    /// Output directory for results
    #[clap(long, default_value = "flow_results")]
    output_dir: String,

    /// JSON configuration file; flags below override its values
    #[clap(long)]
    config: Option<PathBuf>,

    /// Jaccard similarity a match must exceed to become a curve
    #[clap(long)]
    theta_match: Option<f64>,

    /// Jaccard similarity needed to carry a dynamic identity forward
    #[clap(long)]
    theta_track: Option<f64>,

    /// Weight of positional churn against crossings
    #[clap(long)]
    lambda: Option<f64>,

    /// Number of optimizer restarts
    #[clap(long)]
    restarts: Option<usize>,

    /// Maximum sweeps per restart
    #[clap(long)]
    sweeps_max: Option<usize>,

    /// Sweeps without improvement before a restart stops
    #[clap(long)]
    early_stop: Option<usize>,

    /// Seed for shuffled starting orders
    #[clap(long)]
    seed: Option<u64>,

    /// How dynamic community identities are assigned
    #[clap(long, value_enum)]
    identity: Option<Identity>,

    /// Block heights proportional to community size
    #[clap(long)]
    size_weighted: bool,

    /// Stop launching optimizer restarts after this many milliseconds
    #[clap(long)]
    deadline_ms: Option<u64>,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(v) = self.theta_match {
            config.match_threshold = v;
        }
        if let Some(v) = self.theta_track {
            config.track_threshold = v;
        }
        if let Some(v) = self.lambda {
            config.stability_weight = v;
        }
        if let Some(v) = self.restarts {
            config.restarts = v;
        }
        if let Some(v) = self.sweeps_max {
            config.sweeps_max = v;
        }
        if let Some(v) = self.early_stop {
            config.early_stop_threshold = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(identity) = self.identity {
            config.identity_policy = identity.into();
        }
        if self.size_weighted {
            config.interval_mode = IntervalMode::BySize;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = args.resolve_config()?;
    log::debug!("Configuration: {:?}", config);

    // 1. Load data
    let graph = load_temporal_graph(&args.nodes, &args.edges, &args.communities)?;

    // 2. Track, measure and lay out
    let control = match args.deadline_ms {
        Some(ms) => OptimizerControl::with_deadline(Instant::now() + Duration::from_millis(ms)),
        None => OptimizerControl::default(),
    };
    let diagram = build_flow_diagram_with(&graph, &config, &control);

    if let Some(warning) = &diagram.layout.fallback {
        log::warn!("Layout used the initial order: {}", warning);
    }

    // 3. Save results
    storage::save_results(&diagram, &args.output_dir)?;

    log::info!("Done. Results saved to {}", args.output_dir);

    Ok(())
}
