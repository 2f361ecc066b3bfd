//! s4ac - S4AC access-control CLI
//!
//! Loads an access-control configuration and answers access questions
//! against it: which graphs a user sees, how a query gets restricted,
//! whether an update is allowed.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use s4ac_core::{
    AccessControlConfig, AccessPrivilege, ControllerSettings, ControllerStores, PolicyWatcher, S4acAccessController,
    S4acError, UserIdentity,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(name = "s4ac")]
#[command(version)]
#[command(about = "S4AC graph-level access control for RDF stores", long_about = None)]
struct Cli {
    /// Access-control configuration file
    #[arg(long, short = 'c', global = true, default_value = s4ac_core::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the graphs a user may access
    Graphs {
        /// User IRI or name (anonymous when omitted)
        #[arg(long, short = 'u')]
        user: Option<String>,
        /// Privilege to check (create, read, update, delete)
        #[arg(long, short = 'p', default_value = "read")]
        privilege: AccessPrivilege,
    },
    /// List graphs no policy protects
    Public,
    /// Restrict a query to the graphs a user may read
    Rewrite {
        #[arg(long, short = 'u')]
        user: Option<String>,
        /// Query text
        #[arg(long, short = 'q', conflicts_with = "file")]
        query: Option<String>,
        /// File holding the query
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Check whether a user may run an update
    CheckUpdate {
        #[arg(long, short = 'u')]
        user: Option<String>,
        /// Update text
        #[arg(long, conflicts_with = "file")]
        update: Option<String>,
        /// File holding the update
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Show loaded policies
    Policies {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Validate the configuration and the policies it points to
    Validate,
    /// Reload policies whenever their source files change
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_controller(config_path: &Path) -> Result<(AccessControlConfig, ControllerStores, S4acAccessController), S4acError> {
    let config = AccessControlConfig::load(config_path)?;
    let stores = ControllerStores::load(&config)?;
    let controller = S4acAccessController::with_stores(&stores, ControllerSettings::from(&config))?;
    Ok((config, stores, controller))
}

fn read_text(inline: Option<String>, file: Option<PathBuf>, what: &str) -> Result<String, S4acError> {
    match (inline, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
        (None, None) => Err(S4acError::Config(format!("Provide the {} inline or with --file", what))),
    }
}

fn print_graphs(title: &str, graphs: &std::collections::BTreeSet<String>) {
    println!("{} ({})", title.bold(), graphs.len());
    for graph in graphs {
        println!("  {}", graph);
    }
}

fn deny(e: &S4acError) -> ! {
    eprintln!("{} {}", "✗ Access denied:".red().bold(), e);
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Graphs { user, privilege } => {
            let (_, _, controller) = load_controller(&cli.config)?;
            let user: UserIdentity = controller.resolve_user(user.as_deref())?;
            let graphs = controller.accessible_graphs(&user, privilege);

            print_graphs(&format!("{} graphs for {}", privilege, user), &graphs);
            if graphs.is_empty() {
                println!("  {}", "(none)".dimmed());
            }
        }

        Commands::Public => {
            let (_, _, controller) = load_controller(&cli.config)?;
            let graphs = controller.try_public_graphs()?;
            print_graphs("Public graphs", &graphs);
        }

        Commands::Rewrite { user, query, file } => {
            let (_, _, controller) = load_controller(&cli.config)?;
            let user = controller.resolve_user(user.as_deref())?;
            let query = read_text(query, file, "query")?;

            match controller.restrict_query(&user, &query) {
                Ok(restricted) => println!("{}", restricted),
                Err(e) if e.is_denial() => deny(&e),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::CheckUpdate { user, update, file } => {
            let (_, _, controller) = load_controller(&cli.config)?;
            let user = controller.resolve_user(user.as_deref())?;
            let update = read_text(update, file, "update")?;

            match controller.authorize_update(&user, &update) {
                Ok(scope) => {
                    println!("{} {} may run this update", "✓".green(), user);
                    for requirement in &scope.requirements {
                        println!("  {}", requirement);
                    }
                }
                Err(e) if e.is_denial() => deny(&e),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Policies { format } => {
            let (_, _, controller) = load_controller(&cli.config)?;
            let policies = controller.policies();

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&policies)?),
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&policies)?),
                OutputFormat::Table => {
                    println!("\n{:<48} {:<12} {:<28} {:<7} {:<5}", "POLICY", "MODE", "PRIVILEGES", "GRAPHS", "ASKS");
                    for policy in policies.values() {
                        let privileges: Vec<String> = policy.privileges.iter().map(|p| p.to_string()).collect();
                        println!(
                            "{:<48} {:<12} {:<28} {:<7} {:<5}",
                            policy.id,
                            policy.mode.to_string(),
                            privileges.join(","),
                            policy.graphs.len(),
                            policy.asks.len()
                        );
                    }
                    println!();
                }
            }
        }

        Commands::Validate => {
            let config = AccessControlConfig::load(&cli.config)?;
            println!("{} Configuration valid: {}", "✓".green(), config.metadata.name);

            let stores = ControllerStores::load(&config)?;
            println!("  Policy store: {} quads", stores.policy.len()?);
            println!("  Data store: {} quads", stores.data.len()?);

            let controller = S4acAccessController::with_stores(&stores, ControllerSettings::from(&config))?;
            println!("  Policies: {}", controller.policies().len());
            println!("  Public graphs: {}", controller.try_public_graphs()?.len());
        }

        Commands::Watch => {
            let (config, stores, controller) = load_controller(&cli.config)?;
            let controller = Arc::new(controller);

            let shutdown = Arc::new(AtomicBool::new(false));
            let shutdown_clone = shutdown.clone();

            // Set up SIGTERM/SIGINT handler
            ctrlc::set_handler(move || {
                eprintln!("[PolicyWatcher] Received SIGTERM/SIGINT, shutting down gracefully...");
                shutdown_clone.store(true, Ordering::SeqCst);
            })?;

            let watcher = PolicyWatcher::new(
                controller,
                stores.policy,
                config.spec.policy_store.clone(),
                config.base_dir.clone(),
            )?;
            watcher.start(shutdown)?;

            eprintln!("[PolicyWatcher] Shutdown complete");
        }
    }

    Ok(())
}
