use crate::demo::{run_demo, run_validate_step, DemoArgs, ValidateStepArgs};
use crate::server;
use ag_declaration::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Agricultural Declaration Service",
    about = "Run and exercise the agricultural declaration intake service from the command line",
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
    /// Check a JSON payload against one wizard step without storing anything
    ValidateStep(ValidateStepArgs),
    /// Walk a declaration through every wizard step against an in-memory store
    Demo(DemoArgs),
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
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::ValidateStep(args) => run_validate_step(args),
        Command::Demo(args) => run_demo(args),
    }
}
