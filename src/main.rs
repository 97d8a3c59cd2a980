use anyhow::Result;
use clap::{Parser, Subcommand};

use sigalign_rust::map;

#[derive(Parser, Debug)]
#[command(
    name = "sigalign-rust",
    author,
    version,
    about = "Raw nanopore signal aligner inspired by UNCALLED",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build and persist forward/reverse FM indexes of the reference
    Index {
        /// Reference FASTA file
        reference: String,
        /// Output prefix for index files (<prefix>.fwd.fmi / <prefix>.rev.fmi)
        #[arg(short, long, default_value = "ref")]
        output: String,
        /// Rank sampling interval (memory vs. rank-query latency)
        #[arg(long = "tally-gap", default_value_t = 32)]
        tally_gap: usize,
    },
    /// Map signal-event reads against the reference on both strands
    Map {
        /// Reference FASTA file
        reference: String,
        /// Pore k-mer model TSV
        model: String,
        /// Signal-event TSV files, one read each
        #[arg(required = true)]
        reads: Vec<String>,
        /// Rank sampling interval for the in-memory index build
        #[arg(long = "tally-gap", default_value_t = 32)]
        tally_gap: usize,
        /// Load persisted indexes with this prefix instead of rebuilding
        #[arg(long = "index")]
        index: Option<String>,
        /// Use the dense suffix-array index layout
        #[arg(long)]
        dense: bool,
        /// Minimum seed length in events
        #[arg(short = 'k', long = "seed-len", default_value_t = 32)]
        seed_len: u32,
        /// Seed lifetime in events before retirement
        #[arg(long = "window", default_value_t = 64)]
        window: u32,
        /// Absolute per-step log-probability pruning threshold
        #[arg(long = "min-step-prob", default_value_t = -9.2103, allow_hyphen_values = true)]
        min_step_prob: f64,
        /// Stall transition penalty (log probability)
        #[arg(long = "stay-penalty", default_value_t = -3.75, allow_hyphen_values = true)]
        stay_penalty: f64,
        /// Skipped-position transition penalty (log probability)
        #[arg(long = "skip-penalty", default_value_t = -5.2983, allow_hyphen_values = true)]
        skip_penalty: f64,
        /// Maximum suffix-interval rows a seed may report
        #[arg(long = "max-hits", default_value_t = 10)]
        max_hits: u64,
        #[arg(short = 't', long = "threads", default_value_t = 0)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Index { reference, output, tally_gap } => {
            map::run_index(&reference, &output, tally_gap)
        }
        Commands::Map {
            reference,
            model,
            reads,
            tally_gap,
            index,
            dense,
            seed_len,
            window,
            min_step_prob,
            stay_penalty,
            skip_penalty,
            max_hits,
            threads,
        } => {
            let opt = map::MapOpt {
                tally_gap,
                index_prefix: index,
                dense,
                threads,
                params: map::SeedGraphParams {
                    k: seed_len,
                    event_window: window,
                    min_step_prob,
                    stay_penalty,
                    skip_penalty,
                    max_hits,
                },
            };
            map::run_map(&reference, &model, &reads, &opt)
        }
    }
}
