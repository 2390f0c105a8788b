use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::drain::{PipelineDrainGate, ReplicationDrainGate};
use crate::node::{DatanodeId, NodeStatus};
use crate::pipeline::PipelineId;

/// Pipeline membership reported by a datanode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReportFromDatanode {
    pub datanode_id: DatanodeId,
    pub pipeline_ids: Vec<PipelineId>,
}

/// Replication sufficiency reported for a datanode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReplicationReport {
    pub datanode_id: DatanodeId,
    pub status: NodeStatus,
    /// Total containers hosted on the node.
    pub containers: u64,
    /// Containers whose replica set is healthy without this node's replica.
    pub sufficiently_replicated_containers: u64,
}

impl NodeReplicationReport {
    pub fn is_fully_replicated(&self) -> bool {
        self.sufficiently_replicated_containers == self.containers
    }
}

#[derive(Debug, Clone)]
pub enum AdminEvent {
    PipelineReport(PipelineReportFromDatanode),
    ReplicationReport(NodeReplicationReport),
}

/// Broadcast bus carrying datanode reports to their handlers.
///
/// Delivery is in publish order per subscriber, so reports from a single
/// node are handled in the order they arrived.
pub struct EventBus {
    sender: broadcast::Sender<AdminEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event, returning the number of subscribers that will
    /// see it. Events published with no subscribers are dropped.
    pub fn publish(&self, event: AdminEvent) -> usize {
        if self.sender.receiver_count() == 0 {
            return 0;
        }
        let _ = self.sender.send(event);
        self.sender.receiver_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdminEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Subscribes both drain gates to the bus and dispatches events to them
/// until the bus is dropped.
pub fn spawn_drain_dispatcher(
    bus: &EventBus,
    pipeline_gate: Arc<PipelineDrainGate>,
    replication_gate: Arc<ReplicationDrainGate>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(AdminEvent::PipelineReport(report)) => {
                    pipeline_gate.on_pipeline_report(&report).await;
                }
                Ok(AdminEvent::ReplicationReport(report)) => {
                    replication_gate.on_replication_report(&report).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Drain dispatcher lagged, dropped {} reports", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
