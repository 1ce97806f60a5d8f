pub mod crictl;
pub mod types;

pub use crictl::Crictl;
pub use types::ContainerRecord;

use crate::Result;
use async_trait::async_trait;

/// Access to the node's container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Ids of the currently running containers.
    ///
    /// Any failure here fails the scrape; it is never reported as an empty
    /// container set.
    async fn list_containers(&self) -> Result<Vec<String>>;

    /// Resolve a container id to its init process and name
    async fn inspect(&self, container_id: &str) -> Result<ContainerRecord>;

    fn name(&self) -> &str;
}
