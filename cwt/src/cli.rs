use anyhow::Result;
use cwt_core::Repository;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct WorktreeRow {
    name: String,
    path: PathBuf,
    branch: Option<String>,
    needs_setup: bool,
}

/// Print every worktree of every discovered repository, primary first.
pub fn cmd_list(repositories: &[Repository], json: bool) -> Result<()> {
    let rows: Vec<WorktreeRow> = repositories
        .iter()
        .flat_map(Repository::worktrees)
        .map(|wt| WorktreeRow {
            name: wt.name(),
            path: wt.path().to_path_buf(),
            branch: wt.branch().map(String::from),
            needs_setup: wt.needs_setup(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in rows {
        let branch = row.branch.as_deref().unwrap_or("(detached)");
        let marker = if row.needs_setup { " [needs setup]" } else { "" };
        println!("{:<25} {:<25} {}{marker}", row.name, branch, row.path.display());
    }
    Ok(())
}
