use std::error::Error;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use punchcard_core::{Config, OutputFormat};

mod commands;
mod context;
mod logging;
mod output;

use context::Context;

#[derive(Parser)]
#[command(name = "punchcard", version, about = "Attendance and projects in the HR web app, from the terminal")]
struct Cli {
    /// Config file (default: ~/.config/punchcard/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format: pretty or json
    #[arg(short, long, global = true, value_name = "FORMAT")]
    output: Option<OutputFormat>,
    /// Two-factor code, skipping the prompt
    #[arg(long, global = true, value_name = "CODE")]
    two_factor_code: Option<String>,
    /// Token from the account-unlock email
    #[arg(long, global = true, value_name = "TOKEN")]
    email_token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print who the session belongs to
    Login,
    /// Print the logged-in employee
    Whoami,
    /// Attendance calendar and day edits
    Attendance {
        #[command(subcommand)]
        action: commands::attendance::AttendanceAction,
    },
    /// Project lookups
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },
    /// Send an arbitrary request as the logged-in user
    Raw(commands::raw::RawArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "punchcard", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config {
            action: commands::config::ConfigAction::Path,
        } => {
            println!("{}", config_path.display());
            return Ok(());
        }
        Commands::Config {
            action: commands::config::ConfigAction::Schema { indent, file },
        } => return commands::config::schema(*indent, file),
        _ => {}
    }

    let mut config = Config::load_from(&config_path)?;
    config.apply_process_env();
    if let Some(code) = cli.two_factor_code {
        config.auth.two_factor_code = Some(code);
    }
    if let Some(token) = cli.email_token {
        config.auth.email_token = Some(token);
    }
    logging::init(&config.log);

    let output = cli.output.unwrap_or(config.output);
    let ctx = Context::new(config, config_path, output);

    match cli.command {
        Commands::Login => commands::login::login(&ctx),
        Commands::Whoami => commands::login::whoami(&ctx),
        Commands::Attendance { action } => commands::attendance::run(action, &ctx),
        Commands::Project { action } => commands::project::run(action, &ctx),
        Commands::Raw(args) => commands::raw::run(args, &ctx),
        Commands::Config { action } => commands::config::run(action, &ctx),
        Commands::Completions { .. } => Ok(()),
    }
}
