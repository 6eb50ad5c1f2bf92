use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tracklog_cli::{commands, settings};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push local changes, then pull the given window
    Sync {
        #[arg(long, help = "First day of the pull window (YYYY-MM-DD, default today)")]
        from: Option<NaiveDate>,
        #[arg(long, help = "Length of the pull window in days")]
        days: Option<u32>,
    },
    /// Show records waiting to be synced
    Pending,
    /// Show or change stored settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    #[command(name = "set-remote")]
    SetRemote {
        url: String,
        #[arg(long, env = "TRACKLOG_API_KEY")]
        api_key: Option<String>,
    },
    #[command(name = "set-concurrency")]
    SetConcurrency { n: usize },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mgr = settings::SettingsManager::new();

    match cli.command {
        Commands::Sync { from, days } => {
            let settings = mgr.load()?;
            commands::cmd_sync(&settings, from, days).await?;
        }
        Commands::Pending => {
            let settings = mgr.load()?;
            commands::cmd_pending(&settings)?;
        }
        Commands::Settings { command } => match command {
            SettingsCommands::Show => settings::handle_show(&mgr)?,
            SettingsCommands::SetRemote { url, api_key } => {
                settings::handle_set_remote(&mgr, url, api_key)?
            }
            SettingsCommands::SetConcurrency { n } => settings::handle_set_concurrency(&mgr, n)?,
        },
    }

    Ok(())
}
