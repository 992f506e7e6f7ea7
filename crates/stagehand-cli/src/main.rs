mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{apps::AppsSubcommand, config::ConfigSubcommand, status::StatusArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stagehand",
    about = "Staged Helm rollouts: install app groups, then track the agent until it settles",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .stagehand/ or stagehand.yaml)
    #[arg(long, global = true, env = "STAGEHAND_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the action plan: token, core apps, default apps, tracking
    Deploy {
        /// Action plan YAML naming which stages run
        #[arg(long)]
        plan: PathBuf,

        /// App group files, installed in the order given
        #[arg(long = "group", value_name = "FILE")]
        groups: Vec<PathBuf>,

        /// Bearer token for the agent's status endpoint
        #[arg(long, env = "STAGEHAND_AGENT_TOKEN")]
        token: Option<String>,
    },

    /// Show rollout status reported by the agent
    Status {
        /// Fetch one report and exit instead of waiting for completion
        #[arg(long)]
        once: bool,

        /// Seconds between polls (overrides agent.pollIntervalSeconds)
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Give up after this many seconds (overrides agent.timeoutSeconds)
        #[arg(long)]
        timeout: Option<u64>,

        /// Bearer token for the agent's status endpoint
        #[arg(long, env = "STAGEHAND_AGENT_TOKEN")]
        token: Option<String>,
    },

    /// Resolve placeholders in a YAML file against the global values
    Render {
        /// YAML file containing {{ .key }} placeholders
        template: PathBuf,

        /// Values file (default: config/global-values.yaml)
        #[arg(long)]
        values: Option<PathBuf>,

        /// Extra values as key=value, applied over the values file
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Inspect installed apps
    Apps {
        #[command(subcommand)]
        subcommand: AppsSubcommand,
    },

    /// Inspect and validate stagehand.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Deploy { .. } | Commands::Status { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Deploy {
            plan,
            groups,
            token,
        } => cmd::deploy::run(&root, &plan, &groups, token, cli.json),
        Commands::Status {
            once,
            poll_interval,
            timeout,
            token,
        } => cmd::status::run(
            &root,
            StatusArgs {
                once,
                poll_interval,
                timeout,
                token,
            },
            cli.json,
        ),
        Commands::Render {
            template,
            values,
            set,
        } => cmd::render::run(&root, &template, values, &set, cli.json),
        Commands::Apps { subcommand } => cmd::apps::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}
