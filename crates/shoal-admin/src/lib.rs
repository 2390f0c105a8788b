//! Administrative node lifecycle control for a shoal storage cluster.
//!
//! Tracks each datanode through the decommission and maintenance
//! lifecycles: operator commands move nodes out of service, and two
//! event-driven drain gates advance them to their terminal drained state
//! once replication has caught up and their pipelines have closed.

pub mod config;
pub mod controller;
pub mod drain;
pub mod error;
pub mod events;
pub mod host;
pub mod node;
pub mod pipeline;
pub mod registry;
pub mod state;

pub use config::AdminConfig;
pub use controller::AdminController;
pub use drain::{PipelineDrainGate, ReplicationDrainGate};
pub use error::{AdminError, Result};
pub use events::{
    spawn_drain_dispatcher, AdminEvent, EventBus, NodeReplicationReport,
    PipelineReportFromDatanode,
};
pub use host::{DnsResolver, HostDefinition, HostResolver, ResolvedHost, SystemDnsResolver};
pub use node::{Datanode, DatanodeId, NodePort, NodeStatus, OperationalState};
pub use pipeline::{Pipeline, PipelineId, PipelineManager, PipelineState};
pub use registry::{
    ContainerManager, InMemoryNodeRegistry, NodeRegistry, NoopContainerManager,
};
pub use state::{plan, AdminCommand, Transition};
