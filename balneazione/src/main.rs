//! Point d'entrée CLI pour balneazione

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::{Commands, UpdateArgs};

/// Snapshots versionnés de la qualité des eaux de baignade italiennes
#[derive(Parser)]
#[command(name = "balneazione")]
#[command(author, version)]
#[command(about = "Récolter les zones de baignade du Portale Acque vers des snapshots SQLite/JSON")]
#[command(long_about = "Récolte les zones de baignade région par région, les enrichit avec leurs analyses et les archive dans des snapshots datés.\n\nPar défaut, lance une mise à jour. Utilisez 'diff' pour comparer les deux derniers snapshots.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier de configuration JSON (régions, répertoires, pools)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sous-commande (défaut: update)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments de la mise à jour (commande par défaut)
    #[command(flatten)]
    update: Option<UpdateArgs>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = balneazione::RunConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Update(args)) => {
            info!("Running update");
            cli::cmd_update(config, &args).await?;
        }
        Some(Commands::Diff(args)) => {
            info!("Running snapshot diff");
            cli::cmd_diff(config, &args)?;
        }
        None => {
            let args = cli.update.unwrap_or_default();
            info!("Running update");
            cli::cmd_update(config, &args).await?;
        }
    }

    Ok(())
}

/// `.env` du répertoire courant, sinon celui du binaire
fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }
    let beside_binary = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")));
    if let Some(path) = beside_binary {
        let _ = dotenvy::from_path(path);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
