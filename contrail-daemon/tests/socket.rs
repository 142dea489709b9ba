use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;

use contrail_core::config::{self, Config, RemoteConfig};
use contrail_core::{BranchName, GitRepo, ProjectBinding, RepositoryHandle, TranscriptFilter};
use contrail_daemon::paths::socket_path;
use contrail_daemon::{request_publish, request_status, request_stop, run, Enqueued};
use contrail_sync::pipeline::object_prefix;
use contrail_sync::{FsObjectStore, ObjectStore};

struct Fixture {
    home: TempDir,
    code_root: PathBuf,
    binding: ProjectBinding,
}

fn fixture(with_remote: bool) -> Fixture {
    let home = TempDir::new().expect("home");
    let mut config = Config {
        context_root: home.path().join("contexts"),
        ..Config::default()
    };
    if with_remote {
        config.remote = Some(RemoteConfig::Fs {
            path: home.path().join("store"),
        });
    }
    config::save_at(home.path(), &config).expect("save config");

    let code_dir = home.path().join("code");
    std::fs::create_dir_all(&code_dir).expect("code dir");
    let code = GitRepo::init(&code_dir, &BranchName::from("main")).expect("init code");
    std::fs::write(code_dir.join("README.md"), "hi\n").expect("write");
    code.stage(&[PathBuf::from("README.md")]).expect("stage");
    code.commit("initial", false).expect("commit");

    let binding = ProjectBinding::discover(&code_dir, &config, home.path()).expect("binding");
    contrail_sync::init::init(&binding, &TranscriptFilter::default()).expect("init context");
    Fixture {
        code_root: binding.code_root.clone(),
        home,
        binding,
    }
}

async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::task::spawn_blocking(f).await.expect("join")
}

async fn wait_for_socket(home: &Path) {
    let socket = socket_path(home);
    for _ in 0..100 {
        if socket.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon socket never appeared at {}", socket.display());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_request_uploads_a_bundle_and_shows_in_status() {
    let fx = fixture(true);
    let home = fx.home.path().to_path_buf();
    let daemon = tokio::spawn(run(home.clone()));
    wait_for_socket(&home).await;

    let (h, root) = (home.clone(), fx.code_root.clone());
    let queued = blocking(move || request_publish(&h, &root)).await.expect("publish");
    assert_eq!(queued.queued, Enqueued::Started);
    assert_eq!(queued.project, fx.binding.id);

    let mut last = Value::Null;
    for _ in 0..100 {
        let h = home.clone();
        let status = blocking(move || request_status(&h)).await.expect("status");
        last = status["projects"][0]["last"].clone();
        if !last.is_null() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(last["outcome"]["Ok"]["key"].is_string(), "{last}");

    let h = home.clone();
    blocking(move || request_stop(&h)).await.expect("stop");
    daemon.await.expect("join").expect("daemon exit");
    assert!(!socket_path(&home).exists());

    let store = FsObjectStore::new(home.join("store"));
    let keys = store.list(&object_prefix(&fx.binding.id)).expect("list");
    assert_eq!(keys.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_without_remote_is_rejected() {
    let fx = fixture(false);
    let home = fx.home.path().to_path_buf();
    let daemon = tokio::spawn(run(home.clone()));
    wait_for_socket(&home).await;

    let (h, root) = (home.clone(), fx.code_root.clone());
    let err = blocking(move || request_publish(&h, &root)).await.unwrap_err();
    assert!(err.to_string().contains("no remote"), "{err}");

    let h = home.clone();
    blocking(move || request_stop(&h)).await.expect("stop");
    daemon.await.expect("join").expect("daemon exit");
}
