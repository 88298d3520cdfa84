mod list;
mod repl;
mod run;
mod send;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hark::launcher::Launcher;
use hark::load_config;
use hark::messages::ConsoleHost;

#[derive(Parser, Debug)]
#[command(name = "hark", about = "Text-command launcher with remotely installable commands")]
struct Cli {
    /// Path to config file (auto-detected if not specified)
    #[arg(short, long)]
    config: Option<String>,

    /// Log file path (logs go to stderr if not specified)
    #[arg(long)]
    log_file: Option<String>,

    /// Do not start the install listener
    #[arg(long)]
    no_listen: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a running hark to install the extension at a URL
    Send(send::SendArgs),
    /// List registered commands
    List,
    /// Resolve and run a single input, then exit
    Run(run::RunArgs),
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_file = cli
        .log_file
        .as_ref()
        .map(std::fs::File::create)
        .transpose()?;
    hark::logger::init(log_file)?;

    let config = load_config(cli.config.as_deref())?;

    let launcher = || Launcher::new(&config, Box::new(ConsoleHost));
    match cli.command {
        Some(Commands::Send(ref args)) => send::run(args, &config),
        Some(Commands::List) => Ok(list::list(&launcher()?)),
        Some(Commands::Run(ref args)) => Ok(run::run(args, &mut launcher()?)),
        None => {
            let listen = !cli.no_listen && config.listen;
            repl::run(&mut launcher()?, &config, listen)
        }
    }
}
