use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use sierra_pkg::application::{InstallOptions, Summary};
use sierra_pkg::commands::{self, Config, ConfigOptions};
use sierra_pkg::error::PkgError;
use sierra_pkg::package::SearchQuery;
use sierra_pkg::runtime::RealRuntime;

/// sierra-pkg - package manager for Sierra invoker scripts
///
/// Fetches script registries from configured sources, validates scripts
/// without running them, and installs them into an environment.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
#[derive(Parser, Debug)]
#[command(author, version = env!("SIERRA_PKG_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State directory for sources and caches (default ~/.sierra)
    #[arg(long, env = "SIERRA_HOME", value_name = "PATH", global = true)]
    home: Option<PathBuf>,

    /// Environment to install into (default <home>/env)
    #[arg(long = "env", env = "SIERRA_ENV", value_name = "PATH", global = true)]
    env_root: Option<PathBuf>,

    /// Raw content host for GitHub sources
    #[arg(long, env = "SIERRA_RAW_URL", value_name = "URL", global = true)]
    raw_url: Option<String>,

    /// Number of concurrent fetches and installs
    #[arg(long, short = 'j', env = "SIERRA_JOBS", value_name = "N", global = true)]
    jobs: Option<usize>,

    /// Use cached registries only
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage package sources
    #[command(subcommand)]
    Source(SourceCommands),

    /// Search available packages (no arguments lists everything by category)
    Search(SearchArgs),

    /// Show details about a package
    Info {
        name: String,
        /// Look the package up in this source only
        #[arg(long)]
        source: Option<String>,
    },

    /// Install packages into the environment
    Install(InstallArgs),

    /// List installed packages that have a newer version available
    Upgradable,

    /// Update installed packages (all of them when no name is given)
    Update { names: Vec<String> },

    /// Remove installed packages
    Remove {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List installed packages
    List,

    /// Validate a script file without running it
    Validate {
        file: PathBuf,
        /// metadata.json published alongside the script
        #[arg(long, value_name = "PATH")]
        metadata: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
enum SourceCommands {
    /// Add a source (GitHub repository or http(s) URL)
    Add {
        url: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        /// Lower numbers win when sources publish the same package
        #[arg(long)]
        priority: Option<u32>,
    },
    /// List configured sources
    List,
    /// Remove a source and its cache
    Remove { name: String },
    /// Enable a source
    Enable { name: String },
    /// Disable a source without removing it
    Disable { name: String },
    /// Fetch every enabled source
    Update,
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Case-insensitive text matched against package names and descriptions
    query: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    source: Option<String>,
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    #[arg(required = true)]
    names: Vec<String>,
    /// Install from this source even if another one has priority
    #[arg(long)]
    source: Option<String>,
    /// Reinstall even when the same version is installed
    #[arg(long, short)]
    force: bool,
    /// Install scripts that fail validation
    #[arg(long)]
    skip_validation: bool,
}

async fn run(cli: Cli) -> Result<Summary> {
    let options = ConfigOptions {
        home: cli.home,
        env: cli.env_root,
        raw_url: cli.raw_url,
        jobs: cli.jobs,
        offline: cli.offline,
    };
    let config = Config::new(RealRuntime, options)?;

    match cli.command {
        Commands::Source(cmd) => match cmd {
            SourceCommands::Add {
                url,
                name,
                branch,
                priority,
            } => commands::source_add(&config, &url, name.as_deref(), branch.as_deref(), priority),
            SourceCommands::List => commands::source_list(&config),
            SourceCommands::Remove { name } => commands::source_remove(&config, &name),
            SourceCommands::Enable { name } => commands::source_enable(&config, &name, true),
            SourceCommands::Disable { name } => commands::source_enable(&config, &name, false),
            SourceCommands::Update => commands::source_update(&config).await,
        },
        Commands::Search(args) => {
            let query = SearchQuery {
                text: args.query.unwrap_or_default(),
                tag: args.tag,
                category: args.category,
                source: args.source,
            };
            commands::search(&config, &query).await
        }
        Commands::Info { name, source } => commands::info(&config, &name, source.as_deref()).await,
        Commands::Install(args) => {
            let options = InstallOptions {
                force: args.force,
                skip_validation: args.skip_validation,
            };
            commands::install(&config, &args.names, args.source.as_deref(), options).await
        }
        Commands::Upgradable => commands::upgradable(&config).await,
        Commands::Update { names } => commands::update(&config, &names).await,
        Commands::Remove { names } => commands::remove(&config, &names),
        Commands::List => commands::list(&config),
        Commands::Validate {
            file,
            metadata,
            json,
        } => commands::validate(&config.runtime, &file, metadata.as_deref(), json),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(Summary::Failure) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#} [{}]", e, PkgError::kind_of(&e));
            ExitCode::FAILURE
        }
    }
}
