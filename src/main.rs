//! fsindex CLI entry point

use std::process::ExitCode;

use clap::Parser;

use fsindex::cli::{Cli, Commands};
use fsindex::commands::{
    run_config, run_rebuild, run_search, run_serve, run_status, CommandContext,
};

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> fsindex::Result<String> {
    let cli = Cli::parse();
    let ctx = CommandContext::from_cli(cli.config.clone(), cli.verbose);

    match &cli.command {
        Commands::Serve(args) => run_serve(&ctx, args),
        Commands::Search(args) => run_search(&ctx, args),
        Commands::Rebuild => run_rebuild(&ctx),
        Commands::Status => run_status(&ctx),
        Commands::Config(args) => run_config(&ctx, args),
    }
}
