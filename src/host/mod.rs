//! The host environment.
//!
//! The host owns the virtual filesystem, the configuration, and the
//! population of cells. It is the only party holding strong cell
//! handles; scripts inside a cell only ever see the capabilities the
//! host granted at construction.

pub mod vfs;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use crate::cell::{AppCell, CellParams, SessionHandle};
use crate::config::HostConfig;
use crate::error::CellError;
use crate::sanitize::AllowListSanitizer;
use crate::script::MiniInterpreter;

use vfs::{VfsError, VirtualFs};

pub struct Host {
    config: HostConfig,
    vfs: VirtualFs,
    cells: HashMap<Uuid, AppCell>,
    started: Instant,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            vfs: VirtualFs::new(),
            cells: HashMap::new(),
            started: Instant::now(),
        }
    }

    /// Seeds the configured directory layout. Directories are created
    /// in list order, so parents must be listed before their children.
    /// An already existing directory is not an error on restart.
    pub fn init(&mut self) -> Result<(), VfsError> {
        for dir in &self.config.fs.directories {
            match self.vfs.mkdir(dir) {
                Ok(()) => debug!(path = %dir, "created directory"),
                Err(VfsError::AlreadyExists(_)) => {
                    debug!(path = %dir, "directory already present")
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            name = %self.config.host.name,
            directories = self.config.fs.directories.len(),
            "host initialized"
        );
        Ok(())
    }

    /// Builds a cell under this host's sanitizer policy and registers
    /// it. The cell is inert until [`Host::attach`].
    pub fn create_cell(&mut self, params: CellParams) -> Result<Uuid, CellError> {
        let cell = AppCell::with_collaborators(
            params,
            Arc::new(MiniInterpreter::new()),
            Arc::new(AllowListSanitizer::new(self.config.sanitize_policy())),
        )?;
        let id = cell.id();
        info!(cell = %id, "cell created");
        self.cells.insert(id, cell);
        Ok(id)
    }

    /// Inserts the cell into the visible surface: installs its markup
    /// and starts an execution session. Re-attaching supersedes the
    /// previous session.
    pub fn attach(&mut self, id: Uuid) -> Option<SessionHandle> {
        let cell = self.cells.get_mut(&id)?;
        info!(cell = %id, "attaching cell");
        Some(cell.activate())
    }

    /// Cancels a cell's running session without removing it.
    pub fn detach(&mut self, id: Uuid) -> bool {
        match self.cells.get_mut(&id) {
            Some(cell) => {
                info!(cell = %id, "detaching cell");
                cell.deactivate();
                true
            }
            None => false,
        }
    }

    /// Drops a cell entirely. Its session is cancelled and its subtree
    /// and watcher go away with it.
    pub fn remove_cell(&mut self, id: Uuid) -> bool {
        match self.cells.remove(&id) {
            Some(mut cell) => {
                cell.deactivate();
                info!(cell = %id, "cell removed");
                true
            }
            None => false,
        }
    }

    pub fn cell(&self, id: Uuid) -> Option<&AppCell> {
        self.cells.get(&id)
    }

    pub fn cell_mut(&mut self, id: Uuid) -> Option<&mut AppCell> {
        self.cells.get_mut(&id)
    }

    pub fn vfs(&self) -> &VirtualFs {
        &self.vfs
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CodeParams;

    #[tokio::test]
    async fn test_init_seeds_configured_directories() {
        let mut host = Host::new(HostConfig::default());
        host.init().unwrap();
        assert!(host.vfs().is_dir("/system/apps"));
        assert!(host.vfs().is_dir("/user/documents"));
        // Restart tolerates existing directories.
        host.init().unwrap();
    }

    #[tokio::test]
    async fn test_create_and_attach_cell() {
        let mut host = Host::new(HostConfig::default());
        host.init().unwrap();
        let id = host
            .create_cell(CellParams {
                code: CodeParams {
                    markup: "<p>hi</p>".to_string(),
                    scripts: vec![String::new()],
                },
                scopes: Vec::new(),
            })
            .unwrap();

        assert_eq!(host.cell(id).unwrap().content(), "");
        let handle = host.attach(id).expect("cell exists");
        assert!(handle.outcome().await.is_completed());
        assert_eq!(host.cell(id).unwrap().content(), "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_attach_unknown_cell() {
        let mut host = Host::new(HostConfig::default());
        assert!(host.attach(Uuid::new_v4()).is_none());
        assert!(!host.detach(Uuid::new_v4()));
        assert!(!host.remove_cell(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_cell_uses_host_sanitizer_policy() {
        let mut config = HostConfig::default();
        config.sanitizer.allowed_elements = vec!["div".to_string()];
        config.sanitizer.allowed_attributes = vec!["id".to_string()];
        let mut host = Host::new(config);
        let id = host
            .create_cell(CellParams {
                code: CodeParams {
                    markup: "<div id=\"a\" class=\"b\"><p>gone</p>text</div>".to_string(),
                    scripts: vec![String::new()],
                },
                scopes: Vec::new(),
            })
            .unwrap();
        assert_eq!(
            host.cell(id).unwrap().compiled_markup(),
            "<div id=\"a\">text</div>"
        );
    }

    #[tokio::test]
    async fn test_remove_cell_drops_it() {
        let mut host = Host::new(HostConfig::default());
        let id = host.create_cell(CellParams::default()).unwrap();
        assert!(host.remove_cell(id));
        assert!(host.cell(id).is_none());
    }
}
