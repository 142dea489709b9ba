pub mod checkout;
pub mod daemon;
pub mod exchange;
pub mod hook;
pub mod hooks;
pub mod init;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use contrail_core::{config, Config, ProjectBinding};
use contrail_sync::ProjectSession;

/// Home directory, configuration and the binding for the repository that
/// contains `path` (the working directory when `None`).
pub struct Project {
    pub home: PathBuf,
    pub session: ProjectSession,
}

impl Project {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load ~/.contrail/config.yaml")?;
        let cwd = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir().context("could not determine working directory")?,
        };
        let binding = ProjectBinding::discover(&cwd, &config, &home)
            .with_context(|| format!("'{}' is not inside a git repository", cwd.display()))?;
        Ok(Self {
            home,
            session: ProjectSession::new(binding, config),
        })
    }

    pub fn binding(&self) -> &ProjectBinding {
        &self.session.binding
    }

    pub fn config(&self) -> &Config {
        &self.session.config
    }
}
