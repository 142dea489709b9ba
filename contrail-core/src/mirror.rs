//! Branch mirroring: every code branch that receives a capture gets a
//! context branch of the same name.
//!
//! A missing branch is created from the best available starting point:
//!
//! 1. the ancestor hint, when it names a commit that exists;
//! 2. otherwise the context repository's root commit;
//! 3. otherwise a fresh empty root commit (brand-new repository).
//!
//! An existing branch is never moved.

use crate::error::CoreError;
use crate::repo::RepositoryHandle;
use crate::types::{BranchName, CommitId};

/// Message of the empty bootstrap commit.
pub const BOOTSTRAP_MESSAGE: &str = "Empty initial state";

/// A context branch guaranteed to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBranch {
    pub name: BranchName,
    pub tip: CommitId,
    /// True when this call created the branch.
    pub created: bool,
}

/// Make sure `name` exists in `repo`, creating it when absent.
pub fn ensure_branch<R: RepositoryHandle + ?Sized>(
    repo: &R,
    name: &BranchName,
    ancestor_hint: Option<&CommitId>,
) -> Result<ContextBranch, CoreError> {
    if let Some(tip) = repo.branch_tip(name)? {
        return Ok(ContextBranch {
            name: name.clone(),
            tip,
            created: false,
        });
    }

    let start = match ancestor_hint {
        Some(hint) => repo.resolve(&hint.0)?,
        None => None,
    };
    let start = match start {
        Some(commit) => commit,
        None => match repo.root_commit()? {
            Some(root) => root,
            None => {
                tracing::info!("bootstrapping context repository at {}", repo.root().display());
                repo.create_root_commit(BOOTSTRAP_MESSAGE)?
            }
        },
    };

    repo.create_branch(name, &start)?;
    tracing::info!("created context branch {name} at {}", start.short());
    Ok(ContextBranch {
        name: name.clone(),
        tip: start,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::GitRepo;
    use tempfile::TempDir;

    fn fresh() -> (TempDir, GitRepo) {
        let dir = TempDir::new().expect("tempdir");
        let repo = GitRepo::init(dir.path(), &BranchName::from("main")).expect("init");
        (dir, repo)
    }

    #[test]
    fn bootstraps_empty_repository() {
        let (_dir, repo) = fresh();
        let branch = ensure_branch(&repo, &BranchName::from("main"), None).unwrap();
        assert!(branch.created);
        assert_eq!(repo.root_commit().unwrap(), Some(branch.tip.clone()));
        assert_eq!(repo.branch_tip(&BranchName::from("main")).unwrap(), Some(branch.tip));
    }

    #[test]
    fn second_call_is_a_no_op() {
        let (_dir, repo) = fresh();
        let name = BranchName::from("main");
        let first = ensure_branch(&repo, &name, None).unwrap();
        let second = ensure_branch(&repo, &name, None).unwrap();
        assert!(!second.created);
        assert_eq!(first.tip, second.tip);
    }

    #[test]
    fn existing_tip_is_never_moved_by_a_hint() {
        let (_dir, repo) = fresh();
        repo.commit("one", true).unwrap();
        let tip = repo.commit("two", true).unwrap();
        let root = repo.root_commit().unwrap().unwrap();
        let branch = ensure_branch(&repo, &BranchName::from("main"), Some(&root)).unwrap();
        assert_eq!(branch.tip, tip);
        assert!(!branch.created);
    }

    #[test]
    fn new_branch_starts_at_hint_or_root() {
        let (_dir, repo) = fresh();
        repo.commit("one", true).unwrap();
        let second = repo.commit("two", true).unwrap();
        let root = repo.root_commit().unwrap().unwrap();

        let hinted = ensure_branch(&repo, &BranchName::from("feature"), Some(&second)).unwrap();
        assert_eq!(hinted.tip, second);

        let bogus = CommitId::from("1111111111111111111111111111111111111111");
        let fallback = ensure_branch(&repo, &BranchName::from("other"), Some(&bogus)).unwrap();
        assert_eq!(fallback.tip, root);
    }
}
