use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use contrail_core::{config, ProjectBinding};
use contrail_sync::{pipeline, store};

use crate::error::{io_err, DaemonError};
use crate::paths::{contrail_root, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse, PublishAck};
use crate::scheduler::{PublishFn, SyncScheduler};

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    crate::init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon until a `stop` request or ctrl-c, then wait for in-flight
/// publishes to finish.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let root = contrail_root(&home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let config = config::load_at(&home)?;
    let scheduler = SyncScheduler::new(config.publish_min_interval());
    let started_at = Utc::now();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                scheduler,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    tracing::info!(socket = %socket_path(&home).display(), "contrail daemon started");
    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    scheduler.flush_all().await;
    tracing::info!("contrail daemon stopped");

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    scheduler: SyncScheduler,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at: DateTime<Utc>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let scheduler = scheduler.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, scheduler, shutdown_tx, started_at).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    scheduler: SyncScheduler,
    shutdown_tx: broadcast::Sender<()>,
    started_at: DateTime<Utc>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };

        let stop = request == DaemonRequest::Stop;
        let response = match request {
            DaemonRequest::Publish { project } => {
                match enqueue_publish(&home, &scheduler, project).await {
                    Ok(ack) => DaemonResponse::ok(serde_json::to_value(ack)?),
                    Err(err) => DaemonResponse::error(err.to_string()),
                }
            }
            DaemonRequest::Status => DaemonResponse::ok(status_payload(&home, &scheduler, started_at)),
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
        };

        write_response(&mut writer, &response).await?;
        if stop {
            break;
        }
    }

    Ok(())
}

/// Resolve the project and queue its publish. The config is re-read so that a
/// newly configured remote takes effect without a restart.
async fn enqueue_publish(
    home: &Path,
    scheduler: &SyncScheduler,
    code_root: PathBuf,
) -> Result<PublishAck, DaemonError> {
    let home_for_lookup = home.to_path_buf();
    let (binding, remote) = tokio::task::spawn_blocking(move || {
        let config = config::load_at(&home_for_lookup)?;
        let binding = ProjectBinding::discover(&code_root, &config, &home_for_lookup)?;
        Ok::<_, DaemonError>((binding, config.remote))
    })
    .await
    .map_err(|err| DaemonError::Protocol(format!("project lookup join error: {err}")))??;

    let Some(remote) = remote else {
        return Err(DaemonError::Sync(contrail_sync::SyncError::NoRemote));
    };
    if !binding.is_initialized() {
        return Err(DaemonError::Protocol(format!(
            "project {} has no context repository",
            binding.code_root.display()
        )));
    }

    let project = binding.id.clone();
    let job: PublishFn = Box::new(move || {
        let store = store::open(&remote)?;
        pipeline::publish(&binding, store.as_ref())
    });
    let queued = scheduler.enqueue(project.clone(), job);
    tracing::debug!(project = %project, queued = ?queued, "publish requested");

    Ok(PublishAck { project, queued })
}

fn status_payload(home: &Path, scheduler: &SyncScheduler, started_at: DateTime<Utc>) -> Value {
    json!({
        "running": true,
        "started_at": started_at,
        "socket": socket_path(home).display().to_string(),
        "projects": scheduler.snapshot(),
    })
}

/// Remove a socket file left by a daemon that died without cleaning up. A
/// socket that still accepts connections belongs to a live daemon.
fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }
    if StdUnixStream::connect(socket).is_ok() {
        return Err(DaemonError::Protocol(format!(
            "another daemon is listening on {}",
            socket.display()
        )));
    }

    tracing::warn!(socket = %socket.display(), "removing stale daemon socket");
    fs::remove_file(socket).or_else(|err| match err.kind() {
        ErrorKind::NotFound => Ok(()),
        _ => Err(io_err(socket, err)),
    })
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn stale_socket_file_is_removed() {
        let dir = TempDir::new().expect("dir");
        let socket = dir.path().join("daemon.sock");
        fs::write(&socket, b"").expect("stale file");

        prepare_socket_for_bind(&socket).expect("prepare");
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn live_socket_is_not_replaced() {
        let dir = TempDir::new().expect("dir");
        let socket = dir.path().join("daemon.sock");
        let _listener = UnixListener::bind(&socket).expect("bind");

        let err = tokio::task::spawn_blocking(move || prepare_socket_for_bind(&socket))
            .await
            .expect("join")
            .unwrap_err();
        assert!(err.to_string().contains("another daemon"));
    }

    #[tokio::test]
    async fn status_lists_scheduler_slots() {
        let home = TempDir::new().expect("home");
        let scheduler = SyncScheduler::new(Duration::ZERO);
        let payload = status_payload(home.path(), &scheduler, Utc::now());
        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["projects"], json!([]));
        assert!(payload["socket"].as_str().unwrap().ends_with("daemon.sock"));
    }
}
