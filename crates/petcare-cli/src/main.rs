use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "petcare-cli", version, about = "Petcare CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Adopt, feed and play with pets
    Pet {
        #[command(subcommand)]
        action: commands::pet::PetAction,
    },
    /// Attention alerts
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run decay and attention checks until Ctrl-C
    Daemon,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays machine-readable JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("petcare_core=info,petcare_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Pet { action } => commands::pet::run(action).await,
        Commands::Notify { action } => commands::notify::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Daemon => commands::daemon::run().await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
