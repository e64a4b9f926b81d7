use crate::{
    paths,
    repo::Repository,
    worktree::{DeleteOutcome, Worktree},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::{Path, PathBuf};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Creating,
    Filtering,
}

/// Discrete events fed to `update`, one at a time, on the UI thread.
#[derive(Debug, Clone)]
pub enum Msg {
    /// Redraw cadence only; no state change
    Tick,
    Key(KeyEvent),
    RefreshList,
    CreateWorktree {
        name: String,
    },
    DeleteWorktree {
        path: PathBuf,
        force: bool,
    },
    ResumeWorktree {
        path: PathBuf,
    },
    /// Background status probe result, stamped with the generation it was
    /// issued under
    StatusFetched {
        path: PathBuf,
        dirty: bool,
        generation: u64,
    },
    /// Background commit-age result, stamped like `StatusFetched`
    AgeFetched {
        path: PathBuf,
        age: String,
        generation: u64,
    },
}

/// A side effect requested by `update`, consumed exactly once by the
/// orchestrator. The state machine never performs these itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    CreateWorktree { name: String },
    DeleteWorktree { path: PathBuf, force: bool },
    ResumeWorktree { path: PathBuf },
    RefreshList,
    StartBackgroundFetch,
    SuspendAndResume { path: PathBuf },
}

/// The single owner of all mutable application state. Only the UI loop
/// mutates it; background workers talk to it through `Msg` values.
#[derive(Debug)]
pub struct Model {
    repositories: Vec<Repository>,
    worktrees: Vec<Worktree>,
    pub mode: Mode,
    selected: usize,
    input: String,
    filter: String,
    pub message: String,
    pub running: bool,
    fetch_generation: u64,
    /// Directory handed off to the shell after the UI exits
    pub resume_dir: Option<PathBuf>,
}

impl Model {
    pub fn new(repositories: Vec<Repository>) -> Self {
        Self {
            repositories,
            worktrees: Vec::new(),
            mode: Mode::Normal,
            selected: 0,
            input: String::new(),
            filter: String::new(),
            message: "Welcome to cwt".to_string(),
            running: true,
            fetch_generation: 0,
            resume_dir: None,
        }
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn primary_repository(&self) -> &Repository {
        &self.repositories[0]
    }

    pub fn worktrees(&self) -> &[Worktree] {
        &self.worktrees
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn generation(&self) -> u64 {
        self.fetch_generation
    }

    /// Increment the fetch generation, invalidating every in-flight result,
    /// and return the new value for stamping the next cycle's work.
    pub fn bump_generation(&mut self) -> u64 {
        self.fetch_generation += 1;
        self.fetch_generation
    }

    /// Worktrees matching the current filter (all of them when it is empty),
    /// in insertion order.
    pub fn visible_worktrees(&self) -> Vec<&Worktree> {
        if self.filter.is_empty() {
            self.worktrees.iter().collect()
        } else {
            self.worktrees
                .iter()
                .filter(|wt| {
                    wt.path().to_string_lossy().contains(&self.filter)
                        || wt.branch().is_some_and(|b| b.contains(&self.filter))
                })
                .collect()
        }
    }

    pub fn selected_worktree(&self) -> Option<&Worktree> {
        self.visible_worktrees().get(self.selected).copied()
    }

    /// Move the selection by `delta`, rejecting moves that would leave the
    /// visible range.
    pub fn move_selection(&mut self, delta: i32) {
        let len = self.visible_worktrees().len();
        if len == 0 {
            return;
        }
        let step = delta.unsigned_abs() as usize;
        let next = if delta >= 0 {
            self.selected.checked_add(step)
        } else {
            self.selected.checked_sub(step)
        };
        if let Some(next) = next
            && next < len
        {
            self.selected = next;
        }
    }

    /// Reload the worktree collection from every discovered repository,
    /// preserving git's listing order (primary repository first).
    pub fn refresh_worktrees(&mut self) {
        self.worktrees = self
            .repositories
            .iter()
            .flat_map(Repository::worktrees)
            .collect();
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_worktrees().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        match mode {
            Mode::Creating => {
                self.input.clear();
                self.message = "Enter session name: ".to_string();
            }
            Mode::Filtering => {
                // Keep the existing query; the user is editing it
                self.message = "Filter: ".to_string();
            }
            Mode::Normal => {
                self.message = "Ready".to_string();
            }
        }
    }

    fn set_filter(&mut self, query: String) {
        self.filter = query;
        self.selected = 0;
    }

    fn input_append(&mut self, c: char) {
        if self.mode == Mode::Filtering {
            self.filter.push(c);
            self.selected = 0;
        } else {
            self.input.push(c);
        }
    }

    fn input_backspace(&mut self) {
        let buffer = if self.mode == Mode::Filtering {
            &mut self.filter
        } else {
            &mut self.input
        };
        if let Some((idx, _)) = buffer.grapheme_indices(true).next_back() {
            buffer.truncate(idx);
        }
        if self.mode == Mode::Filtering {
            self.selected = 0;
        }
    }

    fn find_worktree_mut(&mut self, path: &Path) -> Option<&mut Worktree> {
        let normalized = paths::normalize(path);
        self.worktrees
            .iter_mut()
            .find(|wt| wt.path() == normalized)
    }

    fn find_worktree(&self, path: &Path) -> Option<&Worktree> {
        let normalized = paths::normalize(path);
        self.worktrees.iter().find(|wt| wt.path() == normalized)
    }

    #[cfg(test)]
    pub(crate) fn set_worktrees_for_test(&mut self, worktrees: Vec<Worktree>) {
        self.worktrees = worktrees;
        self.clamp_selection();
    }
}

/// Advance the state machine by one message, mutating the model in place
/// and optionally requesting a follow-up side effect.
pub fn update(model: &mut Model, msg: Msg) -> Option<Command> {
    match msg {
        Msg::Tick => None,
        Msg::Key(key) => handle_key(model, key),
        Msg::RefreshList => {
            model.refresh_worktrees();
            Some(Command::StartBackgroundFetch)
        }
        Msg::CreateWorktree { name } => {
            let created = model.primary_repository().create_worktree(&name);
            match created {
                Ok(worktree) => {
                    model.refresh_worktrees();
                    model.set_mode(Mode::Normal);
                    model.message = format!("Created worktree: {name}");
                    model.set_filter(String::new());
                    // Auto-enter the new session
                    Some(Command::ResumeWorktree {
                        path: worktree.path().to_path_buf(),
                    })
                }
                Err(err) => {
                    model.message = format!("Error: {err}");
                    None
                }
            }
        }
        Msg::DeleteWorktree { path, force } => {
            let Some(worktree) = model.find_worktree(&path).cloned() else {
                return None;
            };
            match worktree.delete(force) {
                Ok(DeleteOutcome::Removed) => {
                    model.message = "Deleted worktree".to_string();
                    model.refresh_worktrees();
                    Some(Command::StartBackgroundFetch)
                }
                Ok(DeleteOutcome::BranchKept { warning }) => {
                    model.message = format!("Warning: {warning}. Use 'D' to force delete.");
                    model.refresh_worktrees();
                    Some(Command::StartBackgroundFetch)
                }
                Err(err) => {
                    model.message = format!("Error deleting: {err}. Use 'D' to force delete.");
                    None
                }
            }
        }
        Msg::ResumeWorktree { path } => Some(Command::SuspendAndResume { path }),
        Msg::StatusFetched {
            path,
            dirty,
            generation,
        } => {
            if generation != model.generation() {
                return None;
            }
            if let Some(worktree) = model.find_worktree_mut(&path) {
                worktree.dirty = Some(dirty);
            }
            None
        }
        Msg::AgeFetched {
            path,
            age,
            generation,
        } => {
            if generation != model.generation() {
                return None;
            }
            if let Some(worktree) = model.find_worktree_mut(&path) {
                worktree.last_commit = Some(age);
            }
            None
        }
    }
}

fn handle_key(model: &mut Model, key: KeyEvent) -> Option<Command> {
    match model.mode {
        Mode::Creating => handle_creating_key(model, key),
        Mode::Filtering => handle_filtering_key(model, key),
        Mode::Normal => handle_normal_key(model, key),
    }
}

fn handle_creating_key(model: &mut Model, key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Enter => Some(Command::CreateWorktree {
            name: model.input().to_string(),
        }),
        KeyCode::Esc => {
            model.set_mode(Mode::Normal);
            None
        }
        KeyCode::Backspace => {
            model.input_backspace();
            None
        }
        KeyCode::Char(c) => {
            model.input_append(c);
            None
        }
        _ => None,
    }
}

fn handle_filtering_key(model: &mut Model, key: KeyEvent) -> Option<Command> {
    match key.code {
        KeyCode::Enter => {
            if let Some(worktree) = model.selected_worktree() {
                let path = worktree.path().to_path_buf();
                model.set_filter(String::new());
                model.set_mode(Mode::Normal);
                Some(Command::ResumeWorktree { path })
            } else {
                model.set_mode(Mode::Normal);
                None
            }
        }
        KeyCode::Esc => {
            model.set_filter(String::new());
            model.set_mode(Mode::Normal);
            None
        }
        KeyCode::Backspace => {
            model.input_backspace();
            None
        }
        KeyCode::Down => {
            model.move_selection(1);
            None
        }
        KeyCode::Up => {
            model.move_selection(-1);
            None
        }
        KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            model.move_selection(1);
            None
        }
        KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            model.move_selection(-1);
            None
        }
        KeyCode::Char(c) => {
            model.input_append(c);
            None
        }
        _ => None,
    }
}

fn handle_normal_key(model: &mut Model, key: KeyEvent) -> Option<Command> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Command::Quit);
    }

    match key.code {
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Char('j') | KeyCode::Down => {
            model.move_selection(1);
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            model.move_selection(-1);
            None
        }
        KeyCode::Char('n') => {
            model.set_mode(Mode::Creating);
            None
        }
        KeyCode::Char('/') => {
            model.set_mode(Mode::Filtering);
            None
        }
        KeyCode::Char('d') => model.selected_worktree().map(|wt| Command::DeleteWorktree {
            path: wt.path().to_path_buf(),
            force: false,
        }),
        KeyCode::Char('D') => model.selected_worktree().map(|wt| Command::DeleteWorktree {
            path: wt.path().to_path_buf(),
            force: true,
        }),
        KeyCode::Enter => {
            let path = model.selected_worktree()?.path().to_path_buf();
            model.set_filter(String::new());
            Some(Command::ResumeWorktree { path })
        }
        KeyCode::Char('r') => Some(Command::RefreshList),
        _ => None,
    }
}
