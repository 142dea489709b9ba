//! Newline-delimited JSON over the daemon's Unix socket. One connection may
//! carry several requests; `stop` ends it.
//!
//! ```text
//! → {"cmd":"publish","project":"/home/ada/src/widget"}
//! ← {"ok":true,"data":{"project":"3f2a…","queued":"started"}}
//! → {"cmd":"status"}
//! → {"cmd":"stop"}
//! ← {"ok":false,"error":"no remote configured"}
//! ```

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use contrail_core::ProjectId;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::scheduler::Enqueued;

/// Hook processes must never hang on a wedged daemon.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

/// `status` is also used right after `daemon start`, before the socket exists.
const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    /// Queue a publish for the project whose code repository is at `project`.
    Publish { project: PathBuf },
    Status,
    Stop,
}

/// Reply to a `publish` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    pub project: ProjectId,
    pub queued: Enqueued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn into_data<T: DeserializeOwned>(self) -> Result<T, DaemonError> {
        if !self.ok {
            return Err(DaemonError::Protocol(
                self.error.unwrap_or_else(|| "unknown daemon error".to_string()),
            ));
        }
        Ok(serde_json::from_value(self.data.unwrap_or(Value::Null))?)
    }
}

/// Ask the daemon to publish the project rooted at `code_root`. Returns as
/// soon as the request is queued.
pub fn request_publish(home: &Path, code_root: &Path) -> Result<PublishAck, DaemonError> {
    let request = DaemonRequest::Publish {
        project: code_root.to_path_buf(),
    };
    round_trip(home, &request)?.into_data()
}

/// The daemon's status document, retried briefly while the socket appears.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let mut attempt = 1;
    loop {
        match round_trip(home, &DaemonRequest::Status) {
            Ok(response) => return response.into_data(),
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                sleep(STATUS_RETRY_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    round_trip(home, &DaemonRequest::Stop)?
        .into_data::<Value>()
        .map(drop)
}

/// One request and its response on a fresh connection.
fn round_trip(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    let not_running = || DaemonError::DaemonNotRunning {
        socket: socket.clone(),
    };

    let stream = UnixStream::connect(&socket).map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
            not_running()
        }
        _ => io_err(&socket, err),
    })?;
    stream
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .and_then(|_| stream.set_write_timeout(Some(CLIENT_TIMEOUT)))
        .map_err(|e| io_err(&socket, e))?;

    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    (&stream)
        .write_all(&line)
        .map_err(|e| io_err(&socket, e))?;

    let mut reply = String::new();
    if BufReader::new(&stream)
        .read_line(&mut reply)
        .map_err(|e| io_err(&socket, e))?
        == 0
    {
        return Err(DaemonError::Protocol(
            "daemon closed the connection without replying".to_string(),
        ));
    }
    Ok(serde_json::from_str(reply.trim_end())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn missing_socket_means_not_running() {
        let home = TempDir::new().expect("home");
        let err = request_publish(home.path(), Path::new("/code")).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }

    #[test]
    fn requests_use_the_cmd_tag_on_the_wire() {
        let publish = DaemonRequest::Publish {
            project: PathBuf::from("/code"),
        };
        assert_eq!(
            serde_json::to_string(&publish).unwrap(),
            r#"{"cmd":"publish","project":"/code"}"#
        );
        assert_eq!(
            serde_json::to_string(&DaemonRequest::Status).unwrap(),
            r#"{"cmd":"status"}"#
        );
        assert_eq!(
            serde_json::from_str::<DaemonRequest>(r#"{"cmd":"stop"}"#).unwrap(),
            DaemonRequest::Stop
        );
    }

    #[test]
    fn malformed_requests_are_rejected() {
        assert!(serde_json::from_str::<DaemonRequest>(r#"{"cmd":"publish"}"#).is_err());
        assert!(serde_json::from_str::<DaemonRequest>(r#"{"cmd":"reboot"}"#).is_err());
    }

    #[test]
    fn publish_ack_decodes_from_response_data() {
        let response = DaemonResponse::ok(json!({ "project": "0011", "queued": "coalesced" }));
        let ack: PublishAck = response.into_data().unwrap();
        assert_eq!(ack.project, ProjectId::from("0011"));
        assert_eq!(ack.queued, Enqueued::Coalesced);
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let err = DaemonResponse::error("no remote")
            .into_data::<Value>()
            .unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(ref m) if m == "no remote"));
    }
}
