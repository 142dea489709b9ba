//! Object-store contract and its two implementations.
//!
//! Bundles travel through a plain blob store addressed by `/`-separated
//! keys. Nothing beyond read-after-write on `get` is assumed.
//!
//! - [`FsObjectStore`]: a directory tree; writes are `.tmp` + rename.
//! - [`HttpObjectStore`]: bucket-style REST storage:
//!   `POST {base}/object/{bucket}/{key}` (upsert),
//!   `GET {base}/object/{bucket}/{key}`,
//!   `POST {base}/object/list/{bucket}` with `{"prefix": …}`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use contrail_core::RemoteConfig;

use crate::error::{store_io, StoreError};

pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    /// Keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Build the store described by a `remote:` config section.
pub fn open(remote: &RemoteConfig) -> Result<Box<dyn ObjectStore>, StoreError> {
    match remote {
        RemoteConfig::Fs { path } => Ok(Box::new(FsObjectStore::new(path))),
        RemoteConfig::Http {
            base_url,
            bucket,
            token_env,
        } => {
            let token = std::env::var(token_env).map_err(|_| StoreError::MissingToken {
                var: token_env.clone(),
            })?;
            Ok(Box::new(HttpObjectStore::new(base_url, bucket, token)))
        }
    }
}

fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        check_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, part| p.join(part)))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| store_io(parent, e))?;
        }
        let tmp = PathBuf::from(format!("{}.tmp", path.display()));
        std::fs::write(&tmp, bytes).map_err(|e| store_io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(store_io(&path, e));
        }
        tracing::debug!("stored {key} ({} bytes)", bytes.len());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(store_io(&path, e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        collect_keys(&self.root, "", &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn collect_keys(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(store_io(dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| store_io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        let kind = entry.file_type().map_err(|e| store_io(entry.path(), e))?;
        if kind.is_dir() {
            collect_keys(&entry.path(), &key, out)?;
        } else if !name.ends_with(".tmp") {
            out.push(key);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const LIST_LIMIT: usize = 1000;

pub struct HttpObjectStore {
    base_url: String,
    bucket: String,
    token: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, bucket: &str, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token,
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/object/{}/{key}", self.base_url, self.bucket)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

fn http_error(key: &str, err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(404, _) => StoreError::NotFound {
            key: key.to_string(),
        },
        ureq::Error::Status(status, response) => StoreError::Http {
            key: key.to_string(),
            status,
            message: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => StoreError::Transport {
            key: key.to_string(),
            message: transport.to_string(),
        },
    }
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        check_key(key)?;
        let url = self.object_url(key);
        let posted = self
            .agent
            .post(&url)
            .set("Authorization", &self.auth())
            .set("Content-Type", "application/octet-stream")
            .set("x-upsert", "true")
            .send_bytes(bytes);
        match posted {
            Ok(_) => Ok(()),
            // Some servers refuse POST over an existing object; retry as update.
            Err(ureq::Error::Status(400 | 409, _)) => self
                .agent
                .put(&url)
                .set("Authorization", &self.auth())
                .set("Content-Type", "application/octet-stream")
                .send_bytes(bytes)
                .map(drop)
                .map_err(|e| http_error(key, e)),
            Err(e) => Err(http_error(key, e)),
        }
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        check_key(key)?;
        let response = self
            .agent
            .get(&self.object_url(key))
            .set("Authorization", &self.auth())
            .call()
            .map_err(|e| http_error(key, e))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| StoreError::Transport {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(bytes)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // Listing is per folder; names come back relative to it.
        let folder = prefix.trim_end_matches('/');
        let url = format!("{}/object/list/{}", self.base_url, self.bucket);
        let entries: Vec<ListEntry> = self
            .agent
            .post(&url)
            .set("Authorization", &self.auth())
            .send_json(serde_json::json!({ "prefix": folder, "limit": LIST_LIMIT }))
            .map_err(|e| http_error(prefix, e))?
            .into_json()
            .map_err(|e| StoreError::Transport {
                key: prefix.to_string(),
                message: e.to_string(),
            })?;
        let mut keys: Vec<String> = entries
            .into_iter()
            .map(|entry| format!("{folder}/{}", entry.name))
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("p/bundles/1.bundle", true)]
    #[case("", false)]
    #[case("/abs", false)]
    #[case("p/../escape", false)]
    #[case("p//double", false)]
    fn key_validation(#[case] key: &str, #[case] ok: bool) {
        assert_eq!(check_key(key).is_ok(), ok);
    }

    #[test]
    fn fs_put_get_list() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.put("proj/bundles/002.bundle", b"two").unwrap();
        store.put("proj/bundles/001.bundle", b"one").unwrap();
        store.put("other/bundles/001.bundle", b"x").unwrap();

        assert_eq!(store.get("proj/bundles/001.bundle").unwrap(), b"one");
        assert_eq!(
            store.list("proj/bundles/").unwrap(),
            vec!["proj/bundles/001.bundle", "proj/bundles/002.bundle"]
        );
        assert!(!dir.path().join("proj/bundles/001.bundle.tmp").exists());
    }

    #[test]
    fn fs_missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path().join("never-created"));
        assert!(matches!(store.get("a/b"), Err(StoreError::NotFound { .. })));
        assert!(store.list("a/").unwrap().is_empty());
    }

    #[test]
    fn http_store_without_token_is_rejected() {
        let remote = RemoteConfig::Http {
            base_url: "http://127.0.0.1:9".into(),
            bucket: "b".into(),
            token_env: "CONTRAIL_TEST_TOKEN_THAT_IS_NEVER_SET".into(),
        };
        assert!(matches!(open(&remote), Err(StoreError::MissingToken { .. })));
    }
}
