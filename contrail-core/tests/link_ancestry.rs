//! Cross-repository link lookups against real git repositories.

use contrail_core::link::{self, nearest_linked};
use contrail_core::mirror::ensure_branch;
use contrail_core::{BranchName, CommitId, GitRepo, RepositoryHandle};
use tempfile::TempDir;

struct Pair {
    _code_dir: TempDir,
    _ctx_dir: TempDir,
    code: GitRepo,
    ctx: GitRepo,
}

fn pair() -> Pair {
    let code_dir = TempDir::new().expect("code dir");
    let ctx_dir = TempDir::new().expect("ctx dir");
    let main = BranchName::from("main");
    let code = GitRepo::init(code_dir.path(), &main).expect("init code");
    let ctx = GitRepo::init(ctx_dir.path(), &main).expect("init ctx");
    Pair {
        _code_dir: code_dir,
        _ctx_dir: ctx_dir,
        code,
        ctx,
    }
}

fn link_on(ctx: &GitRepo, branch: &str, code: &CommitId) -> CommitId {
    let name = BranchName::from(branch);
    ensure_branch(ctx, &name, None).expect("ensure");
    ctx.checkout_branch(&name).expect("checkout");
    ctx.commit(&link::encode(code), true).expect("commit")
}

#[test]
fn nearest_ancestor_with_context_is_found() {
    let p = pair();
    let c1 = p.code.commit("c1", true).unwrap();
    let c2 = p.code.commit("c2", true).unwrap();
    let c3 = p.code.commit("c3", true).unwrap();

    let linked = link_on(&p.ctx, "main", &c1);

    let found = nearest_linked(&p.code, &p.ctx, &c3, 100, true)
        .unwrap()
        .expect("ancestor link");
    assert_eq!(found.code, c1);
    assert_eq!(found.context, linked);

    let exact = link_on(&p.ctx, "main", &c2);
    let found = nearest_linked(&p.code, &p.ctx, &c3, 100, true).unwrap().unwrap();
    assert_eq!(found.code, c2);
    assert_eq!(found.context, exact);
}

#[test]
fn search_depth_bounds_the_walk() {
    let p = pair();
    let c1 = p.code.commit("c1", true).unwrap();
    for i in 0..5 {
        p.code.commit(&format!("filler {i}"), true).unwrap();
    }
    let head = p.code.head().unwrap().commit().cloned().unwrap();
    link_on(&p.ctx, "main", &c1);

    assert!(nearest_linked(&p.code, &p.ctx, &head, 3, true).unwrap().is_none());
    assert!(nearest_linked(&p.code, &p.ctx, &head, 10, true).unwrap().is_some());
}

#[test]
fn links_on_other_branches_count_for_ancestry() {
    let p = pair();
    let c1 = p.code.commit("c1", true).unwrap();
    let c2 = p.code.commit("c2", true).unwrap();
    let on_feature = link_on(&p.ctx, "feature", &c1);

    assert_eq!(link::resolve(&p.ctx, &BranchName::from("main"), &c1).unwrap(), None);
    assert_eq!(link::resolve_any(&p.ctx, &c1).unwrap(), Some(on_feature.clone()));

    let found = nearest_linked(&p.code, &p.ctx, &c2, 100, false).unwrap().unwrap();
    assert_eq!(found.context, on_feature);
}
