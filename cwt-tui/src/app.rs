use crate::{theme::Theme, view};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use cwt_core::{
    Command, Model, Msg, RefreshEngine, SetupError, Worktree,
    paths, process, state,
};
use ratatui::DefaultTerminal;
use std::{io, path::Path, sync::mpsc, time::Duration};

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Scoped terminal suspension around a foreground subprocess. Raw mode and
/// the alternate screen come back on every exit path, including errors and
/// setup aborts.
struct SuspendedTerminal;

impl SuspendedTerminal {
    fn new() -> Result<Self> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        // Clear the primary screen so script output starts at the top
        print!("\x1b[H\x1b[2J");
        Ok(Self)
    }
}

impl Drop for SuspendedTerminal {
    fn drop(&mut self) {
        let _ = enable_raw_mode();
        let _ = execute!(io::stdout(), EnterAlternateScreen);
    }
}

/// Run the UI loop until the user quits. The model is the only mutable
/// state; background results arrive over the channel and are drained
/// without blocking between redraws.
pub fn run(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    engine: &RefreshEngine,
    tool: &str,
) -> Result<()> {
    let theme = Theme::default();
    let (tx, rx) = mpsc::channel::<Msg>();

    // Initial load, then first background cycle
    let cmd = state::update(model, Msg::RefreshList);
    dispatch(cmd, model, terminal, engine, &tx, tool)?;

    while model.running {
        terminal.draw(|f| view::draw(f, model, &theme))?;

        // Drain background results without blocking
        while let Ok(msg) = rx.try_recv() {
            let cmd = state::update(model, msg);
            dispatch(cmd, model, terminal, engine, &tx, tool)?;
        }

        if event::poll(INPUT_POLL_TIMEOUT)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let cmd = state::update(model, Msg::Key(key));
                dispatch(cmd, model, terminal, engine, &tx, tool)?;
            }
        } else {
            let cmd = state::update(model, Msg::Tick);
            dispatch(cmd, model, terminal, engine, &tx, tool)?;
        }
    }

    Ok(())
}

/// Execute a command produced by the state machine. Most commands re-enter
/// `update` with the matching message; follow-up commands are dispatched
/// recursively.
fn dispatch(
    cmd: Option<Command>,
    model: &mut Model,
    terminal: &mut DefaultTerminal,
    engine: &RefreshEngine,
    tx: &mpsc::Sender<Msg>,
    tool: &str,
) -> Result<()> {
    let Some(cmd) = cmd else {
        return Ok(());
    };

    match cmd {
        Command::Quit => {
            model.running = false;
        }
        Command::StartBackgroundFetch => {
            let generation = model.bump_generation();
            engine.dispatch(generation, model.worktrees(), tx);
        }
        Command::RefreshList => {
            let next = state::update(model, Msg::RefreshList);
            dispatch(next, model, terminal, engine, tx, tool)?;
        }
        Command::CreateWorktree { name } => {
            let next = state::update(model, Msg::CreateWorktree { name });
            dispatch(next, model, terminal, engine, tx, tool)?;
        }
        Command::DeleteWorktree { path, force } => {
            // Suspend so teardown output is visible
            let next = {
                let _suspended = SuspendedTerminal::new()?;
                state::update(model, Msg::DeleteWorktree { path, force })
            };
            terminal.clear()?;
            dispatch(next, model, terminal, engine, tx, tool)?;
        }
        Command::ResumeWorktree { path } => {
            let next = state::update(model, Msg::ResumeWorktree { path });
            dispatch(next, model, terminal, engine, tx, tool)?;
        }
        Command::SuspendAndResume { path } => {
            suspend_and_run(&path, model, terminal, tool)?;
            let next = state::update(model, Msg::RefreshList);
            dispatch(next, model, terminal, engine, tx, tool)?;
        }
    }

    Ok(())
}

/// Tear down the display, run setup if the worktree still needs it, launch
/// the tool inside the worktree, and restore the display afterwards.
fn suspend_and_run(
    path: &Path,
    model: &mut Model,
    terminal: &mut DefaultTerminal,
    tool: &str,
) -> Result<()> {
    let Some(worktree) = model
        .worktrees()
        .iter()
        .find(|wt| wt.path() == path)
        .cloned()
    else {
        model.message = "Worktree no longer exists".to_string();
        return Ok(());
    };

    {
        let _suspended = SuspendedTerminal::new()?;
        resume_in_worktree(&worktree, model, tool);
    }
    terminal.clear()?;

    Ok(())
}

/// Runs with the terminal already suspended. Failures surface on the
/// status line; they never tear down the application.
fn resume_in_worktree(worktree: &Worktree, model: &mut Model, tool: &str) {
    if worktree.needs_setup() {
        match worktree.run_setup(true) {
            Ok(()) => {
                if let Err(err) = worktree.mark_setup_complete() {
                    log::warn!("failed to clear setup marker: {err}");
                }
            }
            Err(SetupError::Aborted) => {
                println!("\nSetup aborted.");
                model.message = "Setup aborted".to_string();
                return;
            }
            Err(SetupError::Io(err)) => {
                model.message = format!("Error: {err}");
                return;
            }
        }
    }

    launch_tool(worktree, model, tool);
}

fn launch_tool(worktree: &Worktree, model: &mut Model, tool: &str) {
    println!("Launching {tool} in {}...", worktree.path().display());

    match process::run_attached(tool, &[], worktree.path(), &[]) {
        Ok(_) => {
            // Track the last resumed path for the exit hand-off
            model.resume_dir = Some(paths::normalize(worktree.path()));
        }
        Err(err) => {
            log::warn!("failed to launch {tool}: {err}");
            model.message = format!("Error: {err}");
        }
    }
}
