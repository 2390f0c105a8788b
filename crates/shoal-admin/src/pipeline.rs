//! Replication pipelines and the pipeline-manager seam.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Identifier of a replication pipeline.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PipelineId(pub Uuid);

impl PipelineId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Open,
    Closing,
    Closed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Open => write!(f, "open"),
            PipelineState::Closing => write!(f, "closing"),
            PipelineState::Closed => write!(f, "closed"),
        }
    }
}

/// A replication group of datanodes serving writes for a set of containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub state: PipelineState,
}

impl Pipeline {
    pub fn new(id: PipelineId, state: PipelineState) -> Self {
        Self { id, state }
    }

    pub fn is_open(&self) -> bool {
        self.state == PipelineState::Open
    }
}

/// Interface to the cluster's pipeline manager.
///
/// The admin controller only ever looks pipelines up and asks for them to
/// be torn down; creation and leader selection live elsewhere.
#[async_trait]
pub trait PipelineManager: Send + Sync {
    /// Fetch the current view of a pipeline.
    async fn pipeline(&self, id: PipelineId) -> Result<Pipeline>;

    /// Close the pipeline and tear down its replica set.
    ///
    /// `closed_by_command` distinguishes an operator-driven close from a
    /// failure-driven one. Destroying an already-closed pipeline is a no-op.
    async fn finalize_and_destroy(&self, pipeline: &Pipeline, closed_by_command: bool)
        -> Result<()>;
}
