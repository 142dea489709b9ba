//! Project session: opens both repositories of a binding and runs the
//! orchestrators under the per-project lock.
//!
//! Hook entry points go through here so that a missing context repository
//! or a held lock becomes a reportable result instead of an error.

use contrail_core::{Config, CoreError, GitRepo, ProjectBinding, ProjectLock, TranscriptFilter};

use crate::capture::{self, CaptureOptions, CaptureResult, SkipReason};
use crate::checkout::{self, CheckoutResult, CheckoutTarget};
use crate::error::SyncError;
use crate::outcome::Failure;
use crate::queue::PublishQueue;
use crate::recovery::{self, PairState};

#[derive(Debug, Clone)]
pub struct ProjectSession {
    pub binding: ProjectBinding,
    pub config: Config,
}

impl ProjectSession {
    pub fn new(binding: ProjectBinding, config: Config) -> Self {
        Self { binding, config }
    }

    pub fn code(&self) -> Result<GitRepo, CoreError> {
        GitRepo::discover(&self.binding.code_root)
    }

    pub fn context(&self) -> Result<GitRepo, CoreError> {
        GitRepo::open_context(&self.binding.context_root)
    }

    pub fn lock(&self, context: &GitRepo) -> Result<ProjectLock, CoreError> {
        ProjectLock::acquire(&context.git_dir(), self.config.lock_timeout())
    }

    pub fn filter(&self) -> TranscriptFilter {
        TranscriptFilter::new(self.config.transcript_extensions.iter().cloned())
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            filter: self.filter(),
            ancestor_search_depth: self.config.ancestor_search_depth,
        }
    }

    /// Post-commit entry point. Never returns an error.
    pub fn capture(&self, queue: &dyn PublishQueue) -> CaptureResult {
        if !self.binding.is_initialized() {
            return CaptureResult::skipped(SkipReason::NotInitialized);
        }
        let (code, context, _lock) = match self.open_locked() {
            Ok(opened) => opened,
            Err(failure) => return CaptureResult::failed(failure),
        };
        capture::capture(&code, &context, &self.capture_options(), queue)
    }

    /// Checkout entry point. Never returns an error.
    pub fn checkout(&self, target: CheckoutTarget<'_>) -> CheckoutResult {
        let (code, context, _lock) = match self.open_locked() {
            Ok(opened) => opened,
            Err(failure) => return CheckoutResult::failed(failure),
        };
        checkout::checkout(&code, &context, target, self.config.ancestor_search_depth)
    }

    pub fn diagnose(&self) -> Result<PairState, SyncError> {
        let code = self.code()?;
        let context = self.context()?;
        Ok(recovery::diagnose(&code, &context)?)
    }

    pub fn resume(&self) -> CheckoutResult {
        let (code, context, _lock) = match self.open_locked() {
            Ok(opened) => opened,
            Err(failure) => return CheckoutResult::failed(failure),
        };
        recovery::resume(&code, &context, self.config.ancestor_search_depth)
    }

    fn open_locked(&self) -> Result<(GitRepo, GitRepo, ProjectLock), Failure> {
        let code = self.code().map_err(|e| Failure::code("open", e))?;
        let context = self.context().map_err(|e| Failure::context("open", e))?;
        let lock = self.lock(&context).map_err(|e| Failure::context("lock", e))?;
        Ok((code, context, lock))
    }
}
