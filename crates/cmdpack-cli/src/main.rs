mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cmdpack",
    about = "Run declarative command packs: templated steps executed in order",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .cmdpack/ or .git/)
    #[arg(long, global = true, env = "CMDPACK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize cmdpack in the current project (config + sample pack)
    Init,

    /// List installed command packs
    List,

    /// Show a command pack's manifest
    Show { slug: String },

    /// Execute a command pack and print its trace
    Run {
        slug: String,

        /// Input context as JSON (or YAML) text
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Read the input context from a JSON or YAML file
        #[arg(long, value_name = "PATH")]
        input_file: Option<PathBuf>,

        /// Render and dispatch every step without external side effects
        #[arg(long)]
        dry_run: bool,
    },

    /// Render a template against an input context
    Render {
        template: String,

        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,

        #[arg(long, value_name = "PATH")]
        input_file: Option<PathBuf>,
    },

    /// Evaluate a condition against an input context
    Eval {
        condition: String,

        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,

        #[arg(long, value_name = "PATH")]
        input_file: Option<PathBuf>,
    },

    /// Inspect and validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Show { slug } => cmd::show::run(&root, &slug, cli.json),
        Commands::Run {
            slug,
            input,
            input_file,
            dry_run,
        } => cmd::run::run(
            &root,
            &slug,
            input.as_deref(),
            input_file.as_deref(),
            dry_run,
            cli.json,
        ),
        Commands::Render {
            template,
            input,
            input_file,
        } => cmd::render::run(
            &root,
            &template,
            input.as_deref(),
            input_file.as_deref(),
            cli.json,
        ),
        Commands::Eval {
            condition,
            input,
            input_file,
        } => cmd::eval::run(
            &root,
            &condition,
            input.as_deref(),
            input_file.as_deref(),
            cli.json,
        ),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
