use crate::demo::{run_demo, run_frappe_jobs, run_migrate, DemoArgs, FrappeJobsArgs, MigrateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use signodrive::config::StorageBackend;
use signodrive::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "SignoDrive",
    about = "Run the SignoDrive driver marketplace API and its maintenance commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Create or upgrade the SQLite schema and report its version
    Migrate(MigrateArgs),
    /// Walk through registration, hiring and trip logging against in-memory storage
    Demo(DemoArgs),
    /// Query the hosted Frappe backend
    Frappe {
        #[command(subcommand)]
        command: FrappeCommand,
    },
}

#[derive(Subcommand, Debug)]
enum FrappeCommand {
    /// List open job openings
    Jobs(FrappeJobsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Storage backend: memory or sqlite
    #[arg(long, value_parser = crate::infra::parse_storage)]
    pub(crate) storage: Option<StorageBackend>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Migrate(args) => run_migrate(args),
        Command::Demo(args) => run_demo(args),
        Command::Frappe {
            command: FrappeCommand::Jobs(args),
        } => run_frappe_jobs(args).await,
    }
}
