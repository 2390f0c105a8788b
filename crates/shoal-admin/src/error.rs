//! Error types for the admin controller.

use thiserror::Error;

use crate::node::{DatanodeId, OperationalState};
use crate::pipeline::PipelineId;
use crate::state::AdminCommand;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdminError>;

/// Errors surfaced by the administrative lifecycle controller.
#[derive(Debug, Error)]
pub enum AdminError {
    /// An operator-supplied host string could not be mapped to exactly one
    /// registered datanode. Fatal to the whole batch it arrived in.
    #[error("invalid host string {input:?}: {reason}")]
    InvalidHostString {
        /// The verbatim input string.
        input: String,
        /// Why the string was rejected.
        reason: String,
    },

    /// The node is not (or no longer) known to the registry.
    #[error("node {0} is not registered")]
    NodeNotFound(DatanodeId),

    /// The requested command is illegal in the node's current state.
    #[error("cannot {command} node {node} in state {state}")]
    InvalidNodeState {
        /// The node the command was aimed at.
        node: DatanodeId,
        /// The state that made the command illegal.
        state: OperationalState,
        /// The rejected command.
        command: AdminCommand,
    },

    /// The pipeline manager does not know the pipeline.
    #[error("pipeline {0} is not tracked")]
    PipelineNotFound(PipelineId),

    /// I/O failure talking to an external manager.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
