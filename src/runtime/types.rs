use serde::Serialize;

/// A running container resolved to its init process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    pub container_id: String,
    pub process_id: u32,
    pub name: String,
}
