use crate::commands::{
    run_effectiveness, run_import, run_letters, run_property, EffectivenessArgs, ImportArgs,
    LettersCommand, PropertyCommand,
};
use crate::server;
use cartera::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cartera",
    about = "Arrears snapshots, collection letters and recovery analytics for managed properties",
    version
)]
struct Cli {
    /// Override the configured SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Register and list properties
    Property {
        #[command(subcommand)]
        command: PropertyCommand,
    },
    /// Stage or store a monthly arrears CSV export
    Import(ImportArgs),
    /// Inspect and generate collection letters
    Letters {
        #[command(subcommand)]
        command: LettersCommand,
    },
    /// Show letter effectiveness across consecutive periods
    Effectiveness(EffectivenessArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let database = cli.database;
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args, database).await,
        Command::Property { command } => run_property(command, database),
        Command::Import(args) => run_import(args, database),
        Command::Letters { command } => run_letters(command, database),
        Command::Effectiveness(args) => run_effectiveness(args, database),
    }
}
