//! The synchronous command surface for node decommission and maintenance.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use crate::host::{DnsResolver, HostResolver};
use crate::node::Datanode;
use crate::registry::{ContainerManager, NodeRegistry};
use crate::state::{plan, AdminCommand, Transition};

/// Administrative lifecycle controller for cluster datanodes.
///
/// All commands serialize on a single controller-wide lock, so the order
/// of state transitions observed by the registry equals the order in which
/// commands entered the controller. Batch commands resolve the whole host
/// list up front; a bad host string fails the batch before any node is
/// touched, while per-node races and state conflicts are soft failures.
pub struct AdminController {
    registry: Arc<dyn NodeRegistry>,
    resolver: HostResolver,
    config: AdminConfig,
    command_lock: Mutex<()>,
    _containers: Arc<dyn ContainerManager>,
}

impl AdminController {
    pub fn new(
        mut config: AdminConfig,
        registry: Arc<dyn NodeRegistry>,
        dns: Arc<dyn DnsResolver>,
        containers: Arc<dyn ContainerManager>,
    ) -> Self {
        config.sanitize();
        let resolver = HostResolver::new(Arc::clone(&registry), dns, config.use_hostnames);
        Self {
            registry,
            resolver,
            config,
            command_lock: Mutex::new(()),
            _containers: containers,
        }
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn monitor_interval(&self) -> Duration {
        self.config.monitor_interval()
    }

    /// Starts decommissioning every node named by `hosts`.
    ///
    /// Fails only on host-string resolution; a node that vanished since
    /// resolution or is in a conflicting state is logged and skipped.
    pub async fn decommission_nodes(&self, hosts: &[String]) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        let nodes = self.resolver.resolve(hosts).await?;
        for dn in &nodes {
            match self.apply(dn, AdminCommand::StartDecommission).await {
                Ok(()) => {}
                Err(AdminError::NodeNotFound(_)) => {
                    // The host list was validated moments ago, so the node
                    // can only have been removed in the window since.
                    warn!(
                        "Host {} is no longer registered, ignoring the request to decommission it",
                        dn.hostname
                    );
                }
                Err(AdminError::InvalidNodeState { .. }) => {
                    // TODO: collect per-node state conflicts and return them
                    // to the caller instead of relying on the log.
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Returns every node named by `hosts` to service.
    pub async fn recommission_nodes(&self, hosts: &[String]) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        let nodes = self.resolver.resolve(hosts).await?;
        for dn in &nodes {
            match self.apply(dn, AdminCommand::Recommission).await {
                Ok(()) => {}
                Err(AdminError::NodeNotFound(_)) => {
                    warn!(
                        "Host {} is no longer registered, ignoring the request to recommission it",
                        dn.hostname
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Moves every node named by `hosts` towards maintenance.
    pub async fn start_maintenance_nodes(&self, hosts: &[String], end_in_hours: u32) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        let nodes = self.resolver.resolve(hosts).await?;
        for dn in &nodes {
            match self.apply_maintenance(dn, end_in_hours).await {
                Ok(()) => {}
                Err(AdminError::NodeNotFound(_)) => {
                    warn!(
                        "Host {} is no longer registered, ignoring the request to start maintenance on it",
                        dn.hostname
                    );
                }
                Err(AdminError::InvalidNodeState { .. }) => {
                    // TODO: collect per-node state conflicts and return them
                    // to the caller instead of relying on the log.
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Single-node decommission. State conflicts are reported to the caller.
    pub async fn start_decommission(&self, dn: &Datanode) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        self.apply(dn, AdminCommand::StartDecommission).await
    }

    /// Single-node recommission.
    pub async fn recommission(&self, dn: &Datanode) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        self.apply(dn, AdminCommand::Recommission).await
    }

    /// Single-node maintenance start. State conflicts are reported to the
    /// caller.
    pub async fn start_maintenance(&self, dn: &Datanode, end_in_hours: u32) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        self.apply_maintenance(dn, end_in_hours).await
    }

    // TODO: refresh the maintenance end time when the node is already in
    // maintenance.
    async fn apply_maintenance(&self, dn: &Datanode, end_in_hours: u32) -> Result<()> {
        self.apply(dn, AdminCommand::StartMaintenance).await?;
        debug!(
            "Maintenance on node {} requested to end in {} hours",
            dn.hostname, end_in_hours
        );
        Ok(())
    }

    async fn apply(&self, dn: &Datanode, command: AdminCommand) -> Result<()> {
        let status = self.registry.node_status(dn.id).await?;
        let current = status.operational_state();
        match plan(current, command) {
            Transition::Move(next) => {
                self.registry.set_operational_state(dn.id, next).await?;
                info!(
                    "Node {} moved from {} to {}",
                    dn.hostname, current, next
                );
                Ok(())
            }
            Transition::Noop => {
                info!(
                    "Asked to {} node {} in state {}. Nothing to do",
                    command, dn.hostname, current
                );
                Ok(())
            }
            Transition::Reject => {
                error!("Cannot {} node {} in state {}", command, dn.hostname, current);
                Err(AdminError::InvalidNodeState {
                    node: dn.id,
                    state: current,
                    command,
                })
            }
        }
    }
}
