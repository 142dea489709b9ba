//! Bundle export/import and the publish/pull pipeline over a filesystem
//! object store.

mod common;

use std::path::Path;

use common::write;
use contrail_core::{BranchName, CommitId, Config, GitRepo, ProjectBinding, ProjectId, RepositoryHandle};
use contrail_sync::bundle::{export, import};
use contrail_sync::pipeline::{self, object_prefix};
use contrail_sync::{cursor, BranchImport, FsObjectStore, ObjectStore, SyncCursor};
use tempfile::TempDir;

fn repo_at(path: &Path) -> GitRepo {
    GitRepo::init(path, &BranchName::from("main")).expect("init")
}

fn commit_file(repo: &GitRepo, rel: &str, body: &str) -> CommitId {
    write(&repo.root().join(rel), body);
    repo.stage(&[rel.into()]).expect("stage");
    repo.commit(&format!("add {rel}"), false).expect("commit")
}

fn tips(repo: &GitRepo) -> Vec<(String, CommitId)> {
    repo.refs_under("refs/heads/").unwrap().into_iter().collect()
}

/// Binding for a context repository living at `ctx_root`.
fn binding(ctx_root: &Path) -> ProjectBinding {
    ProjectBinding {
        id: ProjectId::from("00112233aabbccdd"),
        code_root: "/nonexistent/code".into(),
        context_root: ctx_root.to_path_buf(),
    }
}

#[test]
fn full_bundle_reproduces_branches_in_fresh_repository() {
    let a_dir = TempDir::new().unwrap();
    let a = repo_at(a_dir.path());
    commit_file(&a, "one.jsonl", "1");
    let main_tip = commit_file(&a, "two.jsonl", "2");
    a.create_branch(&BranchName::from("feature"), &main_tip).unwrap();
    a.checkout_branch(&BranchName::from("feature")).unwrap();
    commit_file(&a, "three.jsonl", "3");

    let artifact = export(&a, &SyncCursor::default()).unwrap().expect("bundle");
    assert_eq!(artifact.tips.len(), 2);

    let b_dir = TempDir::new().unwrap();
    let b = repo_at(b_dir.path());
    let report = import(&b, &artifact.bytes, &SyncCursor::default()).unwrap();

    assert!(report
        .branches
        .iter()
        .all(|u| u.outcome == BranchImport::Created));
    assert_eq!(tips(&a), tips(&b));
    assert!(b.refs_under("refs/contrail/incoming/").unwrap().is_empty());
    // HEAD of the fresh repository was unborn on main; its files are present.
    assert_eq!(std::fs::read_to_string(b_dir.path().join("two.jsonl")).unwrap(), "2");
    assert!(!b.is_dirty().unwrap());
}

#[test]
fn incremental_bundle_fast_forwards() {
    let a_dir = TempDir::new().unwrap();
    let a = repo_at(a_dir.path());
    commit_file(&a, "one.jsonl", "1");
    let full = export(&a, &SyncCursor::default()).unwrap().unwrap();

    let b_dir = TempDir::new().unwrap();
    let b = repo_at(b_dir.path());
    let first = import(&b, &full.bytes, &SyncCursor::default()).unwrap();

    let mut base = SyncCursor::default();
    for (branch, tip) in &full.tips {
        base.set(branch.clone(), tip.clone());
    }
    let newer = commit_file(&a, "two.jsonl", "2");
    let inc = export(&a, &base).unwrap().unwrap();
    assert_eq!(inc.base, base);

    let report = import(&b, &inc.bytes, &first.cursor).unwrap();
    assert!(matches!(
        report.branches[0].outcome,
        BranchImport::FastForwarded { .. }
    ));
    assert_eq!(b.branch_tip(&BranchName::from("main")).unwrap(), Some(newer.clone()));
    assert_eq!(report.cursor.get(&BranchName::from("main")), Some(&newer));
    // Checked-out branch: working tree follows.
    assert!(b_dir.path().join("two.jsonl").exists());
}

#[test]
fn divergent_history_is_reported_not_rewritten() {
    let a_dir = TempDir::new().unwrap();
    let a = repo_at(a_dir.path());
    commit_file(&a, "one.jsonl", "1");
    let full = export(&a, &SyncCursor::default()).unwrap().unwrap();

    let b_dir = TempDir::new().unwrap();
    let b = repo_at(b_dir.path());
    let first = import(&b, &full.bytes, &SyncCursor::default()).unwrap();

    commit_file(&a, "remote.jsonl", "r");
    let local = commit_file(&b, "local.jsonl", "l");
    let remote_full = export(&a, &SyncCursor::default()).unwrap().unwrap();

    let report = import(&b, &remote_full.bytes, &first.cursor).unwrap();
    assert!(matches!(
        report.branches[0].outcome,
        BranchImport::Diverged { .. }
    ));
    assert_eq!(report.diverged().count(), 1);
    assert_eq!(b.branch_tip(&BranchName::from("main")).unwrap(), Some(local));
    assert_eq!(report.cursor, first.cursor);
}

#[test]
fn local_ahead_is_left_alone() {
    let a_dir = TempDir::new().unwrap();
    let a = repo_at(a_dir.path());
    commit_file(&a, "one.jsonl", "1");
    let full = export(&a, &SyncCursor::default()).unwrap().unwrap();
    let ahead = commit_file(&a, "two.jsonl", "2");

    let report = import(&a, &full.bytes, &SyncCursor::default()).unwrap();
    assert_eq!(report.branches[0].outcome, BranchImport::LocalAhead);
    assert_eq!(a.branch_tip(&BranchName::from("main")).unwrap(), Some(ahead));
}

#[test]
fn publish_then_pull_into_second_machine() {
    let store_dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(store_dir.path());
    let config = Config::default();

    let a_dir = TempDir::new().unwrap();
    let a = repo_at(a_dir.path());
    commit_file(&a, "s1.jsonl", "1");
    let a_binding = binding(a_dir.path());

    let published = pipeline::publish(&a_binding, &store).unwrap();
    let key = published.key.clone().expect("uploaded");
    assert!(key.starts_with(&object_prefix(&a_binding.id)));
    assert_eq!(published.branches, vec![BranchName::from("main")]);

    let again = pipeline::publish(&a_binding, &store).unwrap();
    assert_eq!(again.key, None, "cursor moved after the first publish");

    // Second machine: no context repository yet.
    let b_parent = TempDir::new().unwrap();
    let b_root = b_parent.path().join("ctx");
    let b_binding = binding(&b_root);
    let pulled = pipeline::pull(&b_binding, &config, &store).unwrap();
    assert!(pulled.created);
    assert_eq!(pulled.applied, vec![key.clone()]);
    let b = GitRepo::open_context(&b_root).unwrap();
    assert_eq!(tips(&a), tips(&b));
    assert_eq!(cursor::last_imported(&b).unwrap(), Some(key));

    // Nothing new on a second pull; nothing to publish from b.
    assert!(pipeline::pull(&b_binding, &config, &store).unwrap().applied.is_empty());
    assert_eq!(pipeline::publish(&b_binding, &store).unwrap().key, None);

    // b adds history and syncs; a pulls it as a fast-forward.
    commit_file(&b, "s2.jsonl", "2");
    std::thread::sleep(std::time::Duration::from_millis(5));
    let synced = pipeline::sync(&b_binding, &config, &store).unwrap();
    assert!(synced.publish.key.is_some());

    let a_pull = pipeline::pull(&a_binding, &config, &store).unwrap();
    assert!(a_pull
        .updates
        .iter()
        .any(|u| matches!(u.outcome, BranchImport::FastForwarded { .. })));
    assert_eq!(tips(&a), tips(&b));
    assert_eq!(store.list(&object_prefix(&a_binding.id)).unwrap().len(), 2);
}

#[test]
fn pull_defers_bundle_until_its_prerequisites_arrive() {
    let store_dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(store_dir.path());
    let config = Config::default();
    let id = ProjectId::from("00112233aabbccdd");

    let a_dir = TempDir::new().unwrap();
    let a = repo_at(a_dir.path());
    let first = commit_file(&a, "s1.jsonl", "1");
    let base: SyncCursor = [(BranchName::from("main"), first)].into_iter().collect();
    commit_file(&a, "s2.jsonl", "2");
    let inc = export(&a, &base).unwrap().unwrap();
    let inc_key = pipeline::object_key(&id, 2, &inc.head12());
    store.put(&inc_key, &inc.bytes).unwrap();

    let b_parent = TempDir::new().unwrap();
    let b_binding = binding(&b_parent.path().join("ctx"));
    let pulled = pipeline::pull(&b_binding, &config, &store).unwrap();
    assert!(pulled.applied.is_empty());
    assert_eq!(pulled.deferred, vec![inc_key.clone()]);
    let b = GitRepo::open_context(&b_binding.context_root).unwrap();
    assert_eq!(cursor::last_imported(&b).unwrap(), None);
    assert!(cursor::imported_keys(&b).unwrap().is_empty());

    // The history the incremental bundle builds on lands under a later key.
    let full = export(&a, &SyncCursor::default()).unwrap().unwrap();
    let full_key = pipeline::object_key(&id, 3, &full.head12());
    store.put(&full_key, &full.bytes).unwrap();

    let pulled = pipeline::pull(&b_binding, &config, &store).unwrap();
    assert_eq!(pulled.applied, vec![full_key, inc_key]);
    assert!(pulled.deferred.is_empty());
    assert_eq!(tips(&a), tips(&b));
    assert!(pipeline::pull(&b_binding, &config, &store).unwrap().applied.is_empty());
}

#[test]
fn late_landing_bundle_is_still_applied() {
    let store_dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(store_dir.path());
    let config = Config::default();
    let id = ProjectId::from("00112233aabbccdd");

    let a_dir = TempDir::new().unwrap();
    let a = repo_at(a_dir.path());
    commit_file(&a, "s1.jsonl", "1");
    let a_binding = binding(a_dir.path());
    pipeline::publish(&a_binding, &store).unwrap().key.expect("uploaded");

    let b_parent = TempDir::new().unwrap();
    let b_binding = binding(&b_parent.path().join("ctx"));
    pipeline::pull(&b_binding, &config, &store).unwrap();
    let b = GitRepo::open_context(&b_binding.context_root).unwrap();

    let c_parent = TempDir::new().unwrap();
    let c_binding = binding(&c_parent.path().join("ctx"));
    pipeline::pull(&c_binding, &config, &store).unwrap();
    let c = GitRepo::open_context(&c_binding.context_root).unwrap();

    // b publishes with a clock behind a's: its key sorts before the key c
    // already consumed.
    commit_file(&b, "s2.jsonl", "2");
    let late = export(&b, &cursor::load(&b).unwrap()).unwrap().unwrap();
    let late_key = pipeline::object_key(&id, 1, &late.head12());
    store.put(&late_key, &late.bytes).unwrap();
    cursor::record_imported(&b, &late_key).unwrap();
    cursor::save(&b, &late.tips.clone().into_iter().collect()).unwrap();

    let pulled = pipeline::pull(&c_binding, &config, &store).unwrap();
    assert_eq!(pulled.applied, vec![late_key]);
    assert_eq!(tips(&b), tips(&c));

    // b's next ordinary publish builds on the late bundle and applies cleanly.
    commit_file(&b, "s3.jsonl", "3");
    let next = pipeline::publish(&b_binding, &store).unwrap().key.expect("uploaded");
    let pulled = pipeline::pull(&c_binding, &config, &store).unwrap();
    assert_eq!(pulled.applied, vec![next]);
    assert!(pulled.deferred.is_empty());
    assert_eq!(tips(&b), tips(&c));
}
