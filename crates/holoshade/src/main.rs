mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let paths = AppPaths::discover()?;
    match cli.command.unwrap_or(Command::Run(cli::RunArgs::default())) {
        Command::Run(args) => run::run_preview(&cli.global, &args, &paths),
        Command::Still(args) => run::run_still(&cli.global, &args, &paths),
        Command::Params { number } => run::print_params(&cli.global, number, &paths),
        Command::Layers { json } => run::print_layers(json),
        Command::Where => run::print_where(&cli.global, &paths),
    }
}
