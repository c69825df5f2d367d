use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "conclave",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIMESTAMP"), ")"),
    about = "Autonomous multi-agent orchestration and consensus engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute the configured task batch against the worker pool
    Run(RunArgs),
    /// Put one question to the pool and aggregate the votes
    Round(RoundArgs),
    /// Inspect and manage suspended pipelines
    Suspensions(SuspensionsArgs),
    /// Inspect and manage working-directory checkpoints
    Checkpoints(CheckpointsArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// YAML configuration file (workers + tasks)
    #[arg(short, long)]
    pub config: String,

    /// Scheduling mode: sequential, parallel, pipeline, swarm
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Replace every executor with a canned one (no external calls)
    #[arg(long)]
    pub dry_run: bool,

    /// Emit batch results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct RoundArgs {
    /// YAML configuration file (workers)
    #[arg(short, long)]
    pub config: String,

    /// The decision prompt put to every eligible worker
    #[arg(short, long)]
    pub prompt: String,

    /// Per-voter timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Replace every executor with a canned one (no external calls)
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the consensus result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct SuspensionsArgs {
    /// Path of the sqlite database
    #[arg(short, long, default_value = "./conclave.db")]
    pub db: String,

    #[command(subcommand)]
    pub action: SuspensionsAction,
}

#[derive(Subcommand, Clone)]
pub enum SuspensionsAction {
    /// List suspended pipelines
    List {
        /// Filter by pipeline id
        #[arg(long)]
        pipeline: Option<String>,
        /// Show only expired records
        #[arg(long)]
        expired: bool,
        /// Maximum records shown
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show live/expired record counts
    Count,
    /// Delete every expired record
    Prune,
    /// Delete one record by id
    Delete { id: String },
    /// Resume a suspended pipeline and print its state
    Resume {
        id: String,
        /// JSON input overriding the stored resume input
        #[arg(long)]
        input: Option<String>,
    },
}

#[derive(Args, Clone)]
pub struct CheckpointsArgs {
    /// Versioned working directory
    #[arg(short, long, default_value = ".")]
    pub working_dir: String,

    #[command(subcommand)]
    pub action: CheckpointsAction,
}

#[derive(Subcommand, Clone)]
pub enum CheckpointsAction {
    /// List checkpoints for a session
    List { session: String },
    /// Attach a name to a checkpoint
    Tag { id: String, name: String },
    /// Restore the working directory to a checkpoint
    Restore { id: String },
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// YAML configuration file
    pub config: String,
}
