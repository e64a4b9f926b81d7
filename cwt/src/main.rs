mod cli;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cwt_core::{Model, RefreshEngine, Repository, config};
use std::{env, path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(version, about = "Git worktree session manager")]
struct Cli {
    /// Override path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List worktrees of the enclosing repository
    List {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let args = Cli::parse();

    let config = match config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(2);
        }
    };

    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(2);
        }
    };

    // The only failure allowed to terminate the process: not in a repository
    let repositories = Repository::discover_all(&cwd);
    if repositories.is_empty() {
        eprintln!("Error: Not in a git repository");
        return ExitCode::from(1);
    }

    let result = match args.command {
        Some(Commands::List { json }) => cli::cmd_list(&repositories, json),
        None => run_tui(repositories, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run_tui(repositories: Vec<Repository>, config: &config::Config) -> Result<()> {
    if let Err(err) = logging::setup_logging(parse_level(&config.log_level)) {
        eprintln!("Warning: logging disabled: {err}");
    }

    let mut model = Model::new(repositories);
    let engine = RefreshEngine::start();

    let mut terminal = ratatui::init();
    let result = cwt_tui::run(&mut terminal, &mut model, &engine, &config.tool);
    ratatui::restore();
    result?;

    // Hand the shell off inside the last resumed worktree
    if let Some(dir) = model.resume_dir.take()
        && dir.is_dir()
    {
        env::set_current_dir(&dir)?;
        // OSC 7 tells terminal emulators (Ghostty, tmux, iTerm2) the CWD
        // for new panes
        print!("\x1b]7;file://localhost{}\x1b\\", dir.display());
        exec_shell()?;
    }

    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => log::LevelFilter::Off,
        "error" => log::LevelFilter::Error,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    }
}

#[cfg(unix)]
fn exec_shell() -> Result<()> {
    use std::os::unix::process::CommandExt;

    let shell = env::var("SHELL").unwrap_or_else(|_| "/bin/zsh".to_string());
    // exec only returns on failure
    let err = std::process::Command::new(shell).exec();
    Err(err.into())
}

#[cfg(not(unix))]
fn exec_shell() -> Result<()> {
    let shell = env::var("SHELL").unwrap_or_else(|_| "sh".to_string());
    std::process::Command::new(shell).status()?;
    Ok(())
}
