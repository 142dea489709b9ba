use std::path::{Path, PathBuf};

use contrail_core::config::contrail_dir_at;

pub const DAEMON_SOCKET: &str = "daemon.sock";

/// `<home>/.contrail/`
pub fn contrail_root(home: &Path) -> PathBuf {
    contrail_dir_at(home)
}

/// `<home>/.contrail/daemon.sock`
pub fn socket_path(home: &Path) -> PathBuf {
    contrail_root(home).join(DAEMON_SOCKET)
}
