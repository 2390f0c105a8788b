use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::{NodeReplicationReport, PipelineReportFromDatanode};
use crate::node::DatanodeId;
use crate::pipeline::PipelineManager;
use crate::registry::NodeRegistry;
use crate::state::{plan, AdminCommand, Transition};

/// Closes open pipelines on nodes heading into or already in maintenance.
///
/// Pipelines on decommissioning nodes are expected to be closed by the
/// replication machinery; this gate only acts on maintenance nodes.
pub struct PipelineDrainGate {
    registry: Arc<dyn NodeRegistry>,
    pipelines: Arc<dyn PipelineManager>,
}

impl PipelineDrainGate {
    pub fn new(registry: Arc<dyn NodeRegistry>, pipelines: Arc<dyn PipelineManager>) -> Self {
        Self {
            registry,
            pipelines,
        }
    }

    /// Never fails; problems processing a report are logged and the report
    /// is dropped.
    pub async fn on_pipeline_report(&self, report: &PipelineReportFromDatanode) {
        if let Err(e) = self.process(report).await {
            warn!(
                "Cannot process pipeline report from node {}: {}",
                report.datanode_id, e
            );
        }
    }

    async fn process(&self, report: &PipelineReportFromDatanode) -> Result<()> {
        let status = self.registry.node_status(report.datanode_id).await?;
        if !status.is_maintenance() {
            return Ok(());
        }
        for id in &report.pipeline_ids {
            let pipeline = self.pipelines.pipeline(*id).await?;
            if pipeline.is_open() {
                info!(
                    "Closing pipeline {} on maintenance node {}",
                    id, report.datanode_id
                );
                self.pipelines.finalize_and_destroy(&pipeline, true).await?;
            }
        }
        Ok(())
    }
}

/// Advances a draining node to its terminal state once replication has
/// caught up and all of its pipelines have closed.
pub struct ReplicationDrainGate {
    registry: Arc<dyn NodeRegistry>,
}

impl ReplicationDrainGate {
    pub fn new(registry: Arc<dyn NodeRegistry>) -> Self {
        Self { registry }
    }

    pub async fn on_replication_report(&self, report: &NodeReplicationReport) {
        let command = if report.status.is_decommissioning() {
            AdminCommand::CompleteDecommission
        } else if report.status.is_entering_maintenance() {
            AdminCommand::CompleteMaintenanceEntry
        } else {
            return;
        };

        if !report.is_fully_replicated() {
            return;
        }
        // Double check: this gate's sibling only initiates closure, and
        // closure completes asynchronously.
        if !self.pipelines_closed(report.datanode_id).await {
            return;
        }

        if let Err(e) = self.finish(report.datanode_id, command).await {
            warn!(
                "Replication report received for node {} which is no longer registered: {}",
                report.datanode_id, e
            );
        }
    }

    async fn finish(&self, id: DatanodeId, command: AdminCommand) -> Result<()> {
        // Re-read the registry state: the report may predate a recommission,
        // in which case the transition no longer applies.
        let status = self.registry.node_status(id).await?;
        if let Transition::Move(next) = plan(status.operational_state(), command) {
            self.registry.set_operational_state(id, next).await?;
            info!("Node {} fully drained, moving to {}", id, next);
        }
        Ok(())
    }

    async fn pipelines_closed(&self, id: DatanodeId) -> bool {
        let pipelines = self.registry.pipelines(id).await;
        if pipelines.is_empty() {
            true
        } else {
            debug!(
                "Waiting for {} pipelines to close on node {}",
                pipelines.len(),
                id
            );
            false
        }
    }
}
