//! The node-registry seam and a process-local implementation.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AdminError, Result};
use crate::node::{Datanode, DatanodeId, NodeStatus, OperationalState};
use crate::pipeline::PipelineId;

/// Registry of cluster datanodes and their operational state.
///
/// The registry owns operational state; the controller and the drain gates
/// mutate it only through [`set_operational_state`], which the registry
/// must apply atomically per node.
///
/// [`set_operational_state`]: NodeRegistry::set_operational_state
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// All datanodes advertising the given address key (hostname or dotted
    /// IP, depending on cluster configuration). Order is stable for a given
    /// registry and determines which of several multi-homed matches wins.
    async fn nodes_by_address(&self, address: &str) -> Vec<Datanode>;

    /// Current status of a node.
    async fn node_status(&self, id: DatanodeId) -> Result<NodeStatus>;

    /// Moves a node to a new operational state.
    async fn set_operational_state(&self, id: DatanodeId, state: OperationalState)
        -> Result<()>;

    /// Pipelines the node currently participates in; empty when the node is
    /// unknown or has none.
    async fn pipelines(&self, id: DatanodeId) -> HashSet<PipelineId>;
}

/// Container-level queries.
///
/// Reserved seam: the controller accepts a handle at construction but does
/// not call it yet.
pub trait ContainerManager: Send + Sync {}

/// A [`ContainerManager`] for deployments without container-level queries.
#[derive(Debug, Default)]
pub struct NoopContainerManager;

impl ContainerManager for NoopContainerManager {}

#[derive(Debug)]
struct RegisteredNode {
    datanode: Datanode,
    state: OperationalState,
    pipelines: HashSet<PipelineId>,
}

/// Process-local [`NodeRegistry`].
///
/// Nodes are kept in registration order, which is what makes multi-homed
/// address matches deterministic. Also used throughout the test suite.
#[derive(Debug, Default)]
pub struct InMemoryNodeRegistry {
    nodes: RwLock<Vec<RegisteredNode>>,
}

impl InMemoryNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node in the `InService` state with no pipelines.
    pub async fn register(&self, datanode: Datanode) {
        let mut nodes = self.nodes.write().await;
        nodes.push(RegisteredNode {
            datanode,
            state: OperationalState::InService,
            pipelines: HashSet::new(),
        });
    }

    /// Removes a node entirely. Returns false when it was not registered.
    pub async fn deregister(&self, id: DatanodeId) -> bool {
        let mut nodes = self.nodes.write().await;
        let before = nodes.len();
        nodes.retain(|n| n.datanode.id != id);
        nodes.len() != before
    }

    pub async fn add_pipeline(&self, id: DatanodeId, pipeline: PipelineId) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .iter_mut()
            .find(|n| n.datanode.id == id)
            .ok_or(AdminError::NodeNotFound(id))?;
        node.pipelines.insert(pipeline);
        Ok(())
    }

    pub async fn remove_pipeline(&self, id: DatanodeId, pipeline: PipelineId) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .iter_mut()
            .find(|n| n.datanode.id == id)
            .ok_or(AdminError::NodeNotFound(id))?;
        node.pipelines.remove(&pipeline);
        Ok(())
    }

    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }
}

#[async_trait]
impl NodeRegistry for InMemoryNodeRegistry {
    async fn nodes_by_address(&self, address: &str) -> Vec<Datanode> {
        let nodes = self.nodes.read().await;
        nodes
            .iter()
            .filter(|n| {
                n.datanode.hostname == address || n.datanode.ip.to_string() == address
            })
            .map(|n| n.datanode.clone())
            .collect()
    }

    async fn node_status(&self, id: DatanodeId) -> Result<NodeStatus> {
        let nodes = self.nodes.read().await;
        nodes
            .iter()
            .find(|n| n.datanode.id == id)
            .map(|n| NodeStatus::new(n.state))
            .ok_or(AdminError::NodeNotFound(id))
    }

    async fn set_operational_state(
        &self,
        id: DatanodeId,
        state: OperationalState,
    ) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .iter_mut()
            .find(|n| n.datanode.id == id)
            .ok_or(AdminError::NodeNotFound(id))?;
        node.state = state;
        Ok(())
    }

    async fn pipelines(&self, id: DatanodeId) -> HashSet<PipelineId> {
        let nodes = self.nodes.read().await;
        nodes
            .iter()
            .find(|n| n.datanode.id == id)
            .map(|n| n.pipelines.clone())
            .unwrap_or_default()
    }
}
