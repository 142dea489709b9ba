//! Sync cursor: the branch tips last exchanged with the remote.
//!
//! # Storage layout
//!
//! ```text
//! <context>/.git/
//!   refs/contrail/cursor/<branch>   (tip last published or imported)
//!   contrail/imported-keys          (every object key consumed, one per line)
//!   config  [contrail] lastImported = <object key>
//! ```
//!
//! Keys are stamped with the publisher's clock, so a key can land in the
//! store after newer-sorting keys were already pulled. Pull therefore skips
//! keys by membership in `imported-keys`, never by comparing against
//! `lastImported` (which only records the most recent key applied).
//!
//! Cursor refs also keep the exchanged commits reachable, so they can always
//! serve as bundle prerequisites.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use contrail_core::{BranchName, CommitId, GitRepo, RepositoryHandle};

use crate::error::{io_err, SyncError};

pub const CURSOR_PREFIX: &str = "refs/contrail/cursor/";
const LAST_IMPORTED_KEY: &str = "contrail.lastImported";
const IMPORTED_KEYS_FILE: &str = "contrail/imported-keys";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    tips: BTreeMap<BranchName, CommitId>,
}

impl SyncCursor {
    pub fn get(&self, branch: &BranchName) -> Option<&CommitId> {
        self.tips.get(branch)
    }

    pub fn set(&mut self, branch: BranchName, tip: CommitId) {
        self.tips.insert(branch, tip);
    }

    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BranchName, &CommitId)> {
        self.tips.iter()
    }

    /// Distinct tips, for use as bundle prerequisites.
    pub fn commits(&self) -> Vec<CommitId> {
        let mut commits: Vec<CommitId> = self.tips.values().cloned().collect();
        commits.sort();
        commits.dedup();
        commits
    }
}

impl FromIterator<(BranchName, CommitId)> for SyncCursor {
    fn from_iter<T: IntoIterator<Item = (BranchName, CommitId)>>(iter: T) -> Self {
        Self {
            tips: iter.into_iter().collect(),
        }
    }
}

pub fn load(repo: &GitRepo) -> Result<SyncCursor, SyncError> {
    Ok(repo
        .refs_under(CURSOR_PREFIX)?
        .into_iter()
        .map(|(branch, tip)| (BranchName::from(branch), tip))
        .collect())
}

/// Write every entry of `cursor`. Entries absent from `cursor` are left alone.
pub fn save(repo: &GitRepo, cursor: &SyncCursor) -> Result<(), SyncError> {
    for (branch, tip) in cursor.iter() {
        repo.update_ref(&format!("{CURSOR_PREFIX}{branch}"), tip, None)?;
    }
    Ok(())
}

/// Move one cursor entry from `expect` to `to`, where `None` means the entry
/// must not exist yet. Returns `false` without touching the ref when another
/// writer moved it first.
pub fn advance(
    repo: &GitRepo,
    branch: &BranchName,
    to: &CommitId,
    expect: Option<&CommitId>,
) -> Result<bool, SyncError> {
    let name = format!("{CURSOR_PREFIX}{branch}");
    let written = match expect {
        Some(old) => repo.update_ref(&name, to, Some(old)),
        None => repo.create_ref(&name, to),
    };
    match written {
        Ok(()) => Ok(true),
        Err(err) => {
            let current = repo.resolve(&name)?;
            if current.as_ref() != expect {
                tracing::debug!("cursor {branch} moved concurrently; keeping {current:?}");
                Ok(false)
            } else {
                Err(err.into())
            }
        }
    }
}

fn imported_keys_path(repo: &GitRepo) -> PathBuf {
    repo.git_dir().join(IMPORTED_KEYS_FILE)
}

/// Every object key already applied to (or published from) this repository.
pub fn imported_keys(repo: &GitRepo) -> Result<BTreeSet<String>, SyncError> {
    let path = imported_keys_path(repo);
    match fs::read_to_string(&path) {
        Ok(body) => Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeSet::new()),
        Err(err) => Err(io_err(&path, err)),
    }
}

/// Append `key` to the consumed set. Needs no project lock.
pub fn record_imported(repo: &GitRepo, key: &str) -> Result<(), SyncError> {
    let path = imported_keys_path(repo);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| io_err(&path, e))?;
    file.write_all(format!("{key}\n").as_bytes())
        .map_err(|e| io_err(&path, e))
}

pub fn last_imported(repo: &GitRepo) -> Result<Option<String>, SyncError> {
    Ok(repo.config_get(LAST_IMPORTED_KEY)?)
}

pub fn set_last_imported(repo: &GitRepo, key: &str) -> Result<(), SyncError> {
    Ok(repo.config_set(LAST_IMPORTED_KEY, key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_repository_has_empty_cursor() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepo::init(dir.path(), &BranchName::from("main")).unwrap();
        assert!(load(&repo).unwrap().is_empty());
        assert_eq!(last_imported(&repo).unwrap(), None);
    }

    #[test]
    fn save_then_load_preserves_nested_branch_names() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepo::init(dir.path(), &BranchName::from("main")).unwrap();
        let tip = repo.commit("one", true).unwrap();

        let mut cursor = SyncCursor::default();
        cursor.set(BranchName::from("main"), tip.clone());
        cursor.set(BranchName::from("feature/x"), tip.clone());
        save(&repo, &cursor).unwrap();

        let loaded = load(&repo).unwrap();
        assert_eq!(loaded, cursor);
        assert_eq!(loaded.commits(), vec![tip]);

        set_last_imported(&repo, "p/bundles/1.bundle").unwrap();
        assert_eq!(last_imported(&repo).unwrap().as_deref(), Some("p/bundles/1.bundle"));
    }

    #[test]
    fn advance_refuses_to_roll_back_a_moved_entry() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepo::init(dir.path(), &BranchName::from("main")).unwrap();
        let old = repo.commit("one", true).unwrap();
        let newer = repo.commit("two", true).unwrap();
        let main = BranchName::from("main");

        assert!(advance(&repo, &main, &old, None).unwrap());
        // A concurrent pull moved the entry to `newer`.
        assert!(advance(&repo, &main, &newer, Some(&old)).unwrap());

        // A publish that loaded the cursor before that move must not win.
        assert!(!advance(&repo, &main, &old, Some(&old)).unwrap());
        assert!(!advance(&repo, &main, &old, None).unwrap());
        assert_eq!(load(&repo).unwrap().get(&main), Some(&newer));
    }

    #[test]
    fn imported_keys_accumulate_in_any_order() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepo::init(dir.path(), &BranchName::from("main")).unwrap();
        assert!(imported_keys(&repo).unwrap().is_empty());

        record_imported(&repo, "p/bundles/0002.bundle").unwrap();
        record_imported(&repo, "p/bundles/0001.bundle").unwrap();
        let keys = imported_keys(&repo).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("p/bundles/0001.bundle"));
    }
}
