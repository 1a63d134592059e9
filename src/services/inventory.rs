use async_trait::async_trait;

use crate::error::InventoryError;

/// The only lifecycle state the exporter treats specially.
pub const RUNNING: &str = "running";

/// One container as reported by the runtime at the moment of a scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub name: String,
    /// Runtime lifecycle state, passed through verbatim as a label value.
    pub status: String,
    /// Main process id. Only ever present for running containers.
    pub pid: Option<i64>,
}

impl ContainerRecord {
    pub fn new(name: impl Into<String>, status: impl Into<String>, pid: Option<i64>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            pid,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RUNNING
    }
}

/// Source of the current container inventory.
///
/// Implementations must return every container known to the runtime, regardless of
/// its lifecycle state, in the order the runtime reports them. A failed query is an
/// error, never an empty list.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, InventoryError>;
}
