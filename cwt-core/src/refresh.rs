//! Background refresh of per-worktree status and commit age.
//!
//! Supersession is logical, not physical: dispatching a new cycle never
//! cancels in-flight work. Every task and result carries the generation it
//! was issued under, and the state machine drops results whose generation
//! no longer matches the model's.

use crate::{constants::STATUS_POOL_SIZE, git, state::Msg, worktree::Worktree};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::mpsc,
    thread,
};

struct StatusTask {
    path: PathBuf,
    generation: u64,
    reply: mpsc::Sender<Msg>,
}

/// Fixed-size pool of persistent status workers plus a one-shot commit-age
/// batch per refresh cycle. Constructed once at startup and passed by
/// reference; never resized or drained, process exit terminates it.
pub struct RefreshEngine {
    tasks: crossbeam_channel::Sender<StatusTask>,
}

impl RefreshEngine {
    pub fn start() -> Self {
        let (tasks, queue) = crossbeam_channel::unbounded::<StatusTask>();

        for worker in 0..STATUS_POOL_SIZE {
            let queue = queue.clone();
            thread::spawn(move || {
                while let Ok(task) = queue.recv() {
                    match git::status_dirty(&task.path) {
                        Ok(dirty) => {
                            let _ = task.reply.send(Msg::StatusFetched {
                                path: task.path,
                                dirty,
                                generation: task.generation,
                            });
                        }
                        Err(err) => {
                            // Swallowed: this worktree just gets no update
                            // this cycle
                            log::debug!(
                                "status worker {worker}: probe failed for {}: {err}",
                                task.path.display()
                            );
                        }
                    }
                }
            });
        }

        Self { tasks }
    }

    /// Dispatch one refresh cycle stamped with `generation`: a status task
    /// per worktree, and a single one-shot age batch per owning repository.
    pub fn dispatch(&self, generation: u64, worktrees: &[Worktree], reply: &mpsc::Sender<Msg>) {
        self.dispatch_age_batches(generation, worktrees, reply);

        for worktree in worktrees {
            let _ = self.tasks.send(StatusTask {
                path: worktree.path().to_path_buf(),
                generation,
                reply: reply.clone(),
            });
        }
    }

    /// Commit ages are looked up against the owning repository root; a hash
    /// resolved against the wrong repository is a "bad object".
    fn dispatch_age_batches(
        &self,
        generation: u64,
        worktrees: &[Worktree],
        reply: &mpsc::Sender<Msg>,
    ) {
        let mut groups: HashMap<PathBuf, Vec<(PathBuf, String)>> = HashMap::new();
        for worktree in worktrees {
            if let Some(sha) = worktree.sha() {
                groups
                    .entry(worktree.repo().root().to_path_buf())
                    .or_default()
                    .push((worktree.path().to_path_buf(), sha.to_string()));
            }
        }

        if groups.is_empty() {
            return;
        }

        let reply = reply.clone();
        thread::spawn(move || {
            for (root, entries) in groups {
                let shas: Vec<String> = entries.iter().map(|(_, sha)| sha.clone()).collect();
                let ages = git::commit_ages(&root, &shas);

                for (path, sha) in entries {
                    if let Some(age) = ages.get(&sha) {
                        let _ = reply.send(Msg::AgeFetched {
                            path,
                            age: age.clone(),
                            generation,
                        });
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{process::run_captured, repo::Repository};
    use std::{fs, path::Path, time::Duration};

    fn init_test_repo(dir: &Path) {
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            run_captured("git", &args, Some(dir)).unwrap();
        }
        fs::write(dir.join("README.md"), "# test").unwrap();
        run_captured("git", &["add", "."], Some(dir)).unwrap();
        run_captured("git", &["commit", "-m", "init"], Some(dir)).unwrap();
    }

    fn recv_all(rx: &mpsc::Receiver<Msg>, expected: usize) -> Vec<Msg> {
        let mut messages = Vec::new();
        while messages.len() < expected {
            match rx.recv_timeout(Duration::from_secs(10)) {
                Ok(msg) => messages.push(msg),
                Err(err) => panic!("timed out waiting for results: {err} ({messages:?})"),
            }
        }
        messages
    }

    #[test]
    fn test_dispatch_delivers_status_and_age_for_each_worktree() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        let repo = Repository::new(tmp.path());
        let worktrees = repo.worktrees();
        assert_eq!(worktrees.len(), 1);

        let engine = RefreshEngine::start();
        let (tx, rx) = mpsc::channel();
        engine.dispatch(7, &worktrees, &tx);

        let messages = recv_all(&rx, 2);
        let mut saw_status = false;
        let mut saw_age = false;
        for msg in messages {
            match msg {
                Msg::StatusFetched {
                    dirty, generation, ..
                } => {
                    assert_eq!(generation, 7);
                    assert!(!dirty);
                    saw_status = true;
                }
                Msg::AgeFetched {
                    age, generation, ..
                } => {
                    assert_eq!(generation, 7);
                    assert!(!age.is_empty());
                    saw_age = true;
                }
                other => panic!("unexpected message: {other:?}"),
            }
        }
        assert!(saw_status);
        assert!(saw_age);
    }

    #[test]
    fn test_dispatch_groups_ages_by_owning_repository() {
        let tmp_a = tempfile::tempdir().unwrap();
        let tmp_b = tempfile::tempdir().unwrap();
        init_test_repo(tmp_a.path());
        init_test_repo(tmp_b.path());

        let mut worktrees = Repository::new(tmp_a.path()).worktrees();
        worktrees.extend(Repository::new(tmp_b.path()).worktrees());
        assert_eq!(worktrees.len(), 2);

        let engine = RefreshEngine::start();
        let (tx, rx) = mpsc::channel();
        engine.dispatch(1, &worktrees, &tx);

        // 2 status + 2 age results: each hash resolved against its own root
        let messages = recv_all(&rx, 4);
        let ages = messages
            .iter()
            .filter(|msg| matches!(msg, Msg::AgeFetched { .. }))
            .count();
        assert_eq!(ages, 2);
    }

    #[test]
    fn test_redispatch_supersedes_without_cancellation() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        let worktrees = Repository::new(tmp.path()).worktrees();

        let engine = RefreshEngine::start();
        let (tx, rx) = mpsc::channel();
        engine.dispatch(1, &worktrees, &tx);
        engine.dispatch(2, &worktrees, &tx);

        // Both cycles run to completion; stale filtering is the consumer's job
        let messages = recv_all(&rx, 4);
        let generations: Vec<u64> = messages
            .iter()
            .map(|msg| match msg {
                Msg::StatusFetched { generation, .. } | Msg::AgeFetched { generation, .. } => {
                    *generation
                }
                other => panic!("unexpected message: {other:?}"),
            })
            .collect();
        assert!(generations.contains(&1));
        assert!(generations.contains(&2));
    }

    #[test]
    fn test_worktree_without_sha_gets_no_age_batch() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        let repo = Repository::new(tmp.path());
        let fresh = Worktree::new(repo, tmp.path().join("fresh"), None, None);

        let engine = RefreshEngine::start();
        let (tx, rx) = mpsc::channel();
        engine.dispatch(1, &[fresh], &tx);

        // Only the status probe reports; there is no hash to age
        let messages = recv_all(&rx, 1);
        assert!(matches!(messages[0], Msg::StatusFetched { .. }));
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
