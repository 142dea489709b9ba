//! Repository handle: the capability surface both orchestrators need from a
//! version-controlled working tree.
//!
//! [`RepositoryHandle`] is the seam; [`GitRepo`] implements it by shelling out
//! to the `git` binary (`git -C <root> …`). Variables that hooks export
//! (`GIT_DIR`, `GIT_INDEX_FILE`, …) are stripped from every child process so
//! context-repository commands can never be redirected into the code
//! repository that triggered the hook.
//!
//! Lookups of refs or objects that do not exist return `Ok(None)`; only
//! genuine command failures surface as [`CoreError::Git`].

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::{io_err, CoreError};
use crate::types::{BranchName, CommitId, HeadState};

/// Variables git exports to hooks. Inheriting them would make `git -C` target
/// the wrong repository.
const HOOK_ENV: &[&str] = &[
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_PREFIX",
    "GIT_OBJECT_DIRECTORY",
    "GIT_COMMON_DIR",
    "GIT_ALTERNATE_OBJECT_DIRECTORIES",
];

/// Set on every git child contrail spawns. The installed hooks exit
/// immediately when they see it, so a checkout contrail performs in the code
/// repository does not re-enter contrail while the project lock is held.
pub const HOOKS_SUPPRESSED_ENV: &str = "CONTRAIL_HOOKS_SUPPRESSED";

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// One entry of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter porcelain code, e.g. `"??"`, `" M"`, `"A "`.
    pub code: String,
    /// Path relative to the repository root.
    pub path: PathBuf,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }
}

/// One entry of `git stash list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    pub id: CommitId,
    /// Positional selector at listing time, e.g. `stash@{0}`.
    pub selector: String,
    pub message: String,
}

/// Outcome of reapplying a stash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StashApply {
    Applied,
    /// The stash could not be applied cleanly; it is left in the stash list.
    Conflict { detail: String },
}

/// A commit returned by [`RepositoryHandle::log_grep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: CommitId,
    pub message: String,
}

/// Which history a log query walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogScope<'a> {
    Branch(&'a BranchName),
    AllBranches,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Thin capability wrapper over a single working tree.
pub trait RepositoryHandle {
    fn root(&self) -> &Path;

    fn head(&self) -> Result<HeadState, CoreError>;

    /// Tracked modifications and untracked files, recursively.
    fn status(&self) -> Result<Vec<StatusEntry>, CoreError>;

    fn is_dirty(&self) -> Result<bool, CoreError> {
        Ok(!self.status()?.is_empty())
    }

    /// Resolve a revision to a commit id; `None` when it does not exist.
    fn resolve(&self, rev: &str) -> Result<Option<CommitId>, CoreError>;

    fn branch_tip(&self, branch: &BranchName) -> Result<Option<CommitId>, CoreError> {
        self.resolve(&branch.as_ref_name())
    }

    fn list_branches(&self) -> Result<Vec<BranchName>, CoreError>;

    /// Create `branch` at `at`. Fails if the branch already exists.
    fn create_branch(&self, branch: &BranchName, at: &CommitId) -> Result<(), CoreError>;

    /// Create a parentless commit with an empty tree and return its id. No ref
    /// is updated.
    fn create_root_commit(&self, message: &str) -> Result<CommitId, CoreError>;

    fn checkout_branch(&self, branch: &BranchName) -> Result<(), CoreError>;

    fn checkout_detached(&self, commit: &CommitId) -> Result<(), CoreError>;

    /// Switch to an arbitrary user-supplied ref (branch, tag, commit).
    fn checkout_ref(&self, target: &str) -> Result<(), CoreError>;

    fn stage(&self, paths: &[PathBuf]) -> Result<(), CoreError>;

    fn commit(&self, message: &str, allow_empty: bool) -> Result<CommitId, CoreError>;

    /// Move the current branch (or detached HEAD) to `to`, resetting the
    /// index but leaving the working tree untouched.
    fn reset_mixed(&self, to: &CommitId) -> Result<(), CoreError>;

    /// Check out tracked files missing from the working tree without touching
    /// files that exist. Returns how many were restored.
    fn restore_missing(&self) -> Result<usize, CoreError>;

    /// Save tracked modifications and untracked files. `None` when there was
    /// nothing to save.
    fn stash_push(&self, message: &str) -> Result<Option<CommitId>, CoreError>;

    fn stash_list(&self) -> Result<Vec<StashEntry>, CoreError>;

    /// Reapply a stash onto the current state without dropping it.
    fn stash_apply(&self, stash: &CommitId) -> Result<StashApply, CoreError>;

    /// Remove a stash from the list by identity.
    fn stash_drop(&self, stash: &CommitId) -> Result<(), CoreError>;

    /// Commits whose message contains `needle`, newest first.
    fn log_grep(&self, scope: LogScope<'_>, needle: &str) -> Result<Vec<LogEntry>, CoreError>;

    fn parents(&self, commit: &CommitId) -> Result<Vec<CommitId>, CoreError>;

    /// The oldest parentless commit reachable from any branch.
    fn root_commit(&self) -> Result<Option<CommitId>, CoreError>;

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool, CoreError>;
}

// ---------------------------------------------------------------------------
// GitRepo
// ---------------------------------------------------------------------------

/// Committer identity forced onto commits contrail creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "contrail".to_string(),
            email: "contrail@localhost".to_string(),
        }
    }
}

/// [`RepositoryHandle`] backed by the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
    identity: Option<Identity>,
}

impl GitRepo {
    /// Open the working tree that contains `path` (any subdirectory works).
    pub fn discover(path: &Path) -> Result<Self, CoreError> {
        let probe = Self::at(path);
        let output = probe.run(["rev-parse", "--show-toplevel"])?;
        if !output.status.success() {
            return Err(CoreError::NotARepository {
                path: path.to_path_buf(),
            });
        }
        let top = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        let root = std::fs::canonicalize(&top).map_err(|e| io_err(&top, e))?;
        Ok(Self::at(root))
    }

    /// Open an existing context repository rooted exactly at `root`, with the
    /// contrail identity applied to every commit.
    pub fn open_context(root: &Path) -> Result<Self, CoreError> {
        if !Self::is_repository(root) {
            return Err(CoreError::NotInitialized {
                path: root.to_path_buf(),
            });
        }
        Ok(Self::at(root).with_identity(Identity::default()))
    }

    /// `git init -b <initial_branch>` at `root` (created if missing).
    pub fn init(root: &Path, initial_branch: &BranchName) -> Result<Self, CoreError> {
        std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
        let repo = Self::at(root).with_identity(Identity::default());
        repo.git_ok(["init", "-q", "-b", initial_branch.0.as_str()])?;
        Ok(repo)
    }

    /// True when `root` itself holds a `.git` directory.
    pub fn is_repository(root: &Path) -> bool {
        root.join(".git").is_dir()
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// `<root>/.git`
    pub fn git_dir(&self) -> PathBuf {
        self.root.join(".git")
    }

    /// `git rev-parse --git-path <name>`, absolute. Unlike [`Self::git_dir`]
    /// this resolves shared paths such as `hooks` correctly from a linked
    /// worktree, and honours `core.hooksPath`.
    pub fn git_path(&self, name: &str) -> Result<PathBuf, CoreError> {
        let out = self.git_ok(["rev-parse", "--git-path", name])?;
        let path = PathBuf::from(out.trim());
        Ok(if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        })
    }

    fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            identity: None,
        }
    }

    // -- command plumbing --------------------------------------------------

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.root)
            .args(["-c", "commit.gpgsign=false", "-c", "core.quotepath=false"])
            .args(args)
            .stdin(Stdio::null());
        for var in HOOK_ENV {
            cmd.env_remove(var);
        }
        cmd.env(HOOKS_SUPPRESSED_ENV, "1");
        if let Some(identity) = &self.identity {
            cmd.env("GIT_AUTHOR_NAME", &identity.name)
                .env("GIT_AUTHOR_EMAIL", &identity.email)
                .env("GIT_COMMITTER_NAME", &identity.name)
                .env("GIT_COMMITTER_EMAIL", &identity.email);
        }
        cmd
    }

    /// Run git and return the raw output regardless of exit status.
    fn run<I, S>(&self, args: I) -> Result<Output, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command(args).output().map_err(|source| CoreError::Spawn {
            root: self.root.clone(),
            source,
        })
    }

    /// Run git, require success, return trimmed stdout.
    fn git_ok<I, S>(&self, args: I) -> Result<String, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(self.failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    fn failure(&self, args: &[OsString], output: &Output) -> CoreError {
        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            stderr = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        CoreError::Git {
            root: self.root.clone(),
            args: args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" "),
            stderr,
        }
    }

    fn stash_tip(&self) -> Result<Option<CommitId>, CoreError> {
        self.resolve("refs/stash")
    }

    // -- plumbing used by bundle exchange ----------------------------------

    /// `refs/<prefix>…` → commit, keyed by the ref name with `prefix` removed.
    pub fn refs_under(&self, prefix: &str) -> Result<BTreeMap<String, CommitId>, CoreError> {
        let out = self.git_ok([
            "for-each-ref",
            "--format=%(refname)%1f%(objectname)",
            prefix,
        ])?;
        let mut refs = BTreeMap::new();
        for line in out.lines() {
            let Some((name, id)) = line.split_once(FIELD_SEP) else {
                continue;
            };
            let short = name.strip_prefix(prefix).unwrap_or(name);
            refs.insert(short.to_string(), CommitId::from(id));
        }
        Ok(refs)
    }

    /// `git update-ref`, optionally guarded by the expected old value.
    pub fn update_ref(
        &self,
        name: &str,
        to: &CommitId,
        expect: Option<&CommitId>,
    ) -> Result<(), CoreError> {
        let mut args = vec!["update-ref", "-m", "contrail", name, to.0.as_str()];
        if let Some(old) = expect {
            args.push(old.0.as_str());
        }
        self.git_ok(args).map(drop)
    }

    /// Create `name` at `to`; fails if the ref already exists.
    pub fn create_ref(&self, name: &str, to: &CommitId) -> Result<(), CoreError> {
        self.git_ok(["update-ref", "-m", "contrail", name, to.0.as_str(), ""])
            .map(drop)
    }

    pub fn delete_ref(&self, name: &str) -> Result<(), CoreError> {
        self.git_ok(["update-ref", "-d", name]).map(drop)
    }

    /// `git bundle create <path> <revs…>`.
    pub fn bundle_create(&self, path: &Path, revs: &[String]) -> Result<(), CoreError> {
        let mut args: Vec<OsString> = vec!["bundle".into(), "create".into(), "-q".into()];
        args.push(path.as_os_str().to_owned());
        args.extend(revs.iter().map(OsString::from));
        self.git_ok(args).map(drop)
    }

    /// `git bundle verify`; `Err` carries git's explanation (typically the
    /// missing prerequisite commits).
    pub fn bundle_verify(&self, path: &Path) -> Result<Result<(), String>, CoreError> {
        let output = self.run([OsStr::new("bundle"), OsStr::new("verify"), path.as_os_str()])?;
        if output.status.success() {
            return Ok(Ok(()));
        }
        let mut detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if detail.is_empty() {
            detail = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        Ok(Err(detail))
    }

    /// Branch heads recorded in a bundle file.
    pub fn bundle_heads(&self, path: &Path) -> Result<BTreeMap<BranchName, CommitId>, CoreError> {
        let out = self.git_ok([
            OsStr::new("bundle"),
            OsStr::new("list-heads"),
            path.as_os_str(),
        ])?;
        let mut heads = BTreeMap::new();
        for line in out.lines() {
            let Some((id, name)) = line.split_once(' ') else {
                continue;
            };
            if let Some(branch) = name.strip_prefix("refs/heads/") {
                heads.insert(BranchName::from(branch), CommitId::from(id));
            }
        }
        Ok(heads)
    }

    /// Fetch refs from a bundle file using the given refspec.
    pub fn fetch_bundle(&self, path: &Path, refspec: &str) -> Result<(), CoreError> {
        self.git_ok([
            OsStr::new("fetch"),
            OsStr::new("-q"),
            OsStr::new("--no-tags"),
            path.as_os_str(),
            OsStr::new(refspec),
        ])
        .map(drop)
    }

    /// `git merge --ff-only <rev>` on the checked-out branch. `Err` carries the
    /// reason when git refuses.
    pub fn merge_ff_only(&self, rev: &str) -> Result<Result<(), String>, CoreError> {
        let output = self.run(["merge", "-q", "--ff-only", rev])?;
        if output.status.success() {
            Ok(Ok(()))
        } else {
            Ok(Err(String::from_utf8_lossy(&output.stderr).trim().to_string()))
        }
    }

    pub fn config_get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let output = self.run(["config", "--local", "--get", key])?;
        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            Some(1) => Ok(None),
            _ => Err(self.failure(
                &[OsString::from("config"), OsString::from("--get"), OsString::from(key)],
                &output,
            )),
        }
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.git_ok(["config", "--local", key, value]).map(drop)
    }
}

impl RepositoryHandle for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn head(&self) -> Result<HeadState, CoreError> {
        let symbolic = self.run(["symbolic-ref", "-q", "HEAD"])?;
        let commit = self.resolve("HEAD")?;
        if symbolic.status.success() {
            let full = String::from_utf8_lossy(&symbolic.stdout).trim().to_string();
            let name = BranchName::from(full.strip_prefix("refs/heads/").unwrap_or(&full));
            return Ok(match commit {
                Some(commit) => HeadState::Branch { name, commit },
                None => HeadState::Unborn { branch: name },
            });
        }
        match commit {
            Some(commit) => Ok(HeadState::Detached { commit }),
            None => Err(self.failure(
                &[OsString::from("symbolic-ref"), OsString::from("HEAD")],
                &symbolic,
            )),
        }
    }

    fn status(&self) -> Result<Vec<StatusEntry>, CoreError> {
        let out = self.git_ok(["status", "--porcelain=v1", "-z", "--untracked-files=all"])?;
        Ok(parse_porcelain(&out))
    }

    fn resolve(&self, rev: &str) -> Result<Option<CommitId>, CoreError> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.run(["rev-parse", "-q", "--verify", spec.as_str()])?;
        if !output.status.success() {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!id.is_empty()).then(|| CommitId::from(id)))
    }

    fn list_branches(&self) -> Result<Vec<BranchName>, CoreError> {
        Ok(self
            .refs_under("refs/heads/")?
            .into_keys()
            .map(BranchName::from)
            .collect())
    }

    fn create_branch(&self, branch: &BranchName, at: &CommitId) -> Result<(), CoreError> {
        let name = branch.as_ref_name();
        // Empty old value: refuse to overwrite an existing branch.
        self.git_ok(["update-ref", name.as_str(), at.0.as_str(), ""])
            .map(drop)
    }

    fn create_root_commit(&self, message: &str) -> Result<CommitId, CoreError> {
        let tree = self.git_ok(["mktree"])?;
        let id = self.git_ok(["commit-tree", tree.trim(), "-m", message])?;
        Ok(CommitId::from(id.trim()))
    }

    fn checkout_branch(&self, branch: &BranchName) -> Result<(), CoreError> {
        self.git_ok(["checkout", "-q", branch.0.as_str(), "--"]).map(drop)
    }

    fn checkout_detached(&self, commit: &CommitId) -> Result<(), CoreError> {
        self.git_ok(["checkout", "-q", "--detach", commit.0.as_str(), "--"])
            .map(drop)
    }

    fn checkout_ref(&self, target: &str) -> Result<(), CoreError> {
        self.git_ok(["checkout", "-q", target, "--"]).map(drop)
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<(), CoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<OsString> = vec!["add".into(), "-A".into(), "--".into()];
        args.extend(paths.iter().map(|p| p.as_os_str().to_owned()));
        self.git_ok(args).map(drop)
    }

    fn commit(&self, message: &str, allow_empty: bool) -> Result<CommitId, CoreError> {
        let mut args = vec!["commit", "-q", "--no-verify", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.git_ok(args)?;
        self.resolve("HEAD")?.ok_or_else(|| CoreError::Git {
            root: self.root.clone(),
            args: "rev-parse HEAD".to_string(),
            stderr: "HEAD missing after commit".to_string(),
        })
    }

    fn reset_mixed(&self, to: &CommitId) -> Result<(), CoreError> {
        self.git_ok(["reset", "-q", "--mixed", to.0.as_str()]).map(drop)
    }

    fn restore_missing(&self) -> Result<usize, CoreError> {
        let out = self.git_ok(["ls-files", "-z", "--deleted"])?;
        let missing: Vec<&str> = out.split('\0').filter(|p| !p.is_empty()).collect();
        if missing.is_empty() {
            return Ok(0);
        }
        let mut args = vec!["checkout", "-q", "--"];
        args.extend(missing.iter().copied());
        self.git_ok(args)?;
        Ok(missing.len())
    }

    fn stash_push(&self, message: &str) -> Result<Option<CommitId>, CoreError> {
        let before = self.stash_tip()?;
        self.git_ok(["stash", "push", "-q", "--include-untracked", "-m", message])?;
        let after = self.stash_tip()?;
        Ok(if after != before { after } else { None })
    }

    fn stash_list(&self) -> Result<Vec<StashEntry>, CoreError> {
        let out = self.git_ok(["stash", "list", "--format=%gd%x1f%H%x1f%gs"])?;
        Ok(out
            .lines()
            .filter_map(|line| {
                let mut parts = line.splitn(3, FIELD_SEP);
                let selector = parts.next()?.to_string();
                let id = CommitId::from(parts.next()?);
                let message = parts.next().unwrap_or_default().to_string();
                Some(StashEntry {
                    id,
                    selector,
                    message,
                })
            })
            .collect())
    }

    fn stash_apply(&self, stash: &CommitId) -> Result<StashApply, CoreError> {
        // Not quiet: the merge reports which paths conflicted on stdout.
        let output = self.run(["stash", "apply", stash.0.as_str()])?;
        if output.status.success() {
            return Ok(StashApply::Applied);
        }
        let detail = [&output.stderr, &output.stdout]
            .iter()
            .map(|stream| String::from_utf8_lossy(stream).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(StashApply::Conflict { detail })
    }

    fn stash_drop(&self, stash: &CommitId) -> Result<(), CoreError> {
        let entry = self
            .stash_list()?
            .into_iter()
            .find(|entry| &entry.id == stash);
        match entry {
            Some(entry) => self
                .git_ok(["stash", "drop", "-q", entry.selector.as_str()])
                .map(drop),
            None => Ok(()),
        }
    }

    fn log_grep(&self, scope: LogScope<'_>, needle: &str) -> Result<Vec<LogEntry>, CoreError> {
        let rev = match scope {
            LogScope::Branch(branch) => {
                let name = branch.as_ref_name();
                if self.resolve(&name)?.is_none() {
                    return Ok(Vec::new());
                }
                name
            }
            LogScope::AllBranches => {
                if self.refs_under("refs/heads/")?.is_empty() {
                    return Ok(Vec::new());
                }
                "--branches".to_string()
            }
        };
        let grep = format!("--grep={needle}");
        let out = self.git_ok([
            "log",
            rev.as_str(),
            "--fixed-strings",
            grep.as_str(),
            "--format=%H%x1f%B%x1e",
        ])?;
        Ok(parse_log_records(&out))
    }

    fn parents(&self, commit: &CommitId) -> Result<Vec<CommitId>, CoreError> {
        let out = self.git_ok(["rev-list", "--parents", "-n", "1", commit.0.as_str()])?;
        Ok(out
            .split_whitespace()
            .skip(1)
            .map(CommitId::from)
            .collect())
    }

    fn root_commit(&self) -> Result<Option<CommitId>, CoreError> {
        if self.refs_under("refs/heads/")?.is_empty() {
            return Ok(None);
        }
        let out = self.git_ok(["rev-list", "--max-parents=0", "--branches"])?;
        Ok(out.lines().last().map(|line| CommitId::from(line.trim())))
    }

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool, CoreError> {
        let args = [
            "merge-base",
            "--is-ancestor",
            ancestor.0.as_str(),
            descendant.0.as_str(),
        ];
        let output = self.run(args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(self.failure(
                &args.iter().map(OsString::from).collect::<Vec<_>>(),
                &output,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Parse `git status --porcelain=v1 -z`. Rename and copy entries carry their
/// original path as an extra NUL-separated field, which is skipped.
fn parse_porcelain(raw: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut fields = raw.split('\0').filter(|f| !f.is_empty());
    while let Some(field) = fields.next() {
        if field.len() < 4 {
            continue;
        }
        let code = field[..2].to_string();
        let path = PathBuf::from(&field[3..]);
        if code.starts_with('R') || code.starts_with('C') {
            fields.next();
        }
        entries.push(StatusEntry { code, path });
    }
    entries
}

fn parse_log_records(raw: &str) -> Vec<LogEntry> {
    raw.split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_start_matches(['\n', '\r']);
            let (id, message) = record.split_once(FIELD_SEP)?;
            let id = id.trim();
            if id.is_empty() {
                return None;
            }
            Some(LogEntry {
                id: CommitId::from(id),
                message: message.trim_end().to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
