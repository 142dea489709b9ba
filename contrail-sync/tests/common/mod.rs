//! Fixtures shared by the integration tests: a code repository and its
//! context repository in temp directories.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use contrail_core::link;
use contrail_core::{BranchName, CommitId, GitRepo, RepositoryHandle};
use contrail_sync::{CaptureOptions, PublishQueue};

pub struct Pair {
    pub code_dir: tempfile::TempDir,
    pub ctx_dir: tempfile::TempDir,
    pub code: GitRepo,
    pub ctx: GitRepo,
}

impl Pair {
    /// Code repository with one commit on `main`; context repository with
    /// the bootstrap commit on `main`.
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let code_dir = tempfile::TempDir::new().expect("code dir");
        let ctx_dir = tempfile::TempDir::new().expect("ctx dir");
        let main = BranchName::from("main");
        let code = GitRepo::init(code_dir.path(), &main).expect("init code");
        let ctx = GitRepo::init(ctx_dir.path(), &main).expect("init ctx");
        ctx.commit("Empty initial state", true).expect("bootstrap");
        let pair = Self {
            code_dir,
            ctx_dir,
            code,
            ctx,
        };
        pair.code_commit("README.md", "hello\n", "initial");
        pair
    }

    pub fn code_path(&self, rel: &str) -> PathBuf {
        self.code_dir.path().join(rel)
    }

    pub fn ctx_path(&self, rel: &str) -> PathBuf {
        self.ctx_dir.path().join(rel)
    }

    pub fn code_commit(&self, file: &str, body: &str, message: &str) -> CommitId {
        write(&self.code_path(file), body);
        self.code.stage(&[PathBuf::from(file)]).expect("stage code");
        self.code.commit(message, false).expect("commit code")
    }

    pub fn transcript(&self, rel: &str, body: &str) {
        write(&self.ctx_path(rel), body);
    }

    pub fn ctx_head(&self) -> CommitId {
        self.ctx.head().expect("ctx head").commit().cloned().expect("born")
    }

    pub fn linked_code_commit(&self, ctx_commit: &CommitId) -> Option<CommitId> {
        let entries = self
            .ctx
            .log_grep(contrail_core::LogScope::AllBranches, link::LINK_TRAILER)
            .expect("log");
        entries
            .into_iter()
            .find(|e| &e.id == ctx_commit)
            .and_then(|e| link::decode(&e.message))
    }
}

pub fn write(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, body).expect("write");
}

pub fn options() -> CaptureOptions {
    CaptureOptions::default()
}

/// Records every publish request.
#[derive(Default)]
pub struct RecordingQueue {
    pub requests: RefCell<Vec<CommitId>>,
}

impl PublishQueue for RecordingQueue {
    fn request_publish(&self, context_commit: &CommitId) {
        self.requests.borrow_mut().push(context_commit.clone());
    }
}
