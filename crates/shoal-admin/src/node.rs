//! Datanode identity and administrative lifecycle state.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a datanode.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatanodeId(pub Uuid);

impl DatanodeId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DatanodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named service port advertised by a datanode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePort {
    pub name: String,
    pub value: u16,
}

impl NodePort {
    pub fn new(name: &str, value: u16) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Read-only view of a registered datanode, as handed out by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datanode {
    pub id: DatanodeId,
    pub hostname: String,
    pub ip: IpAddr,
    pub ports: Vec<NodePort>,
}

impl Datanode {
    pub fn uses_port(&self, port: u16) -> bool {
        self.ports.iter().any(|p| p.value == port)
    }
}

/// Administrative lifecycle state of a datanode.
///
/// These are the only states a node can be in; all changes go through the
/// transition rules in [`crate::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationalState {
    InService,
    Decommissioning,
    Decommissioned,
    EnteringMaintenance,
    InMaintenance,
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationalState::InService => write!(f, "in-service"),
            OperationalState::Decommissioning => write!(f, "decommissioning"),
            OperationalState::Decommissioned => write!(f, "decommissioned"),
            OperationalState::EnteringMaintenance => write!(f, "entering-maintenance"),
            OperationalState::InMaintenance => write!(f, "in-maintenance"),
        }
    }
}

/// Operational status of a node at a point in time.
///
/// Derived from the registry's state; never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    operational_state: OperationalState,
}

impl NodeStatus {
    pub fn new(operational_state: OperationalState) -> Self {
        Self { operational_state }
    }

    pub fn operational_state(&self) -> OperationalState {
        self.operational_state
    }

    pub fn is_in_service(&self) -> bool {
        self.operational_state == OperationalState::InService
    }

    /// True for both phases of the decommission lifecycle.
    pub fn is_decommission(&self) -> bool {
        matches!(
            self.operational_state,
            OperationalState::Decommissioning | OperationalState::Decommissioned
        )
    }

    /// True for both phases of the maintenance lifecycle.
    pub fn is_maintenance(&self) -> bool {
        matches!(
            self.operational_state,
            OperationalState::EnteringMaintenance | OperationalState::InMaintenance
        )
    }

    pub fn is_decommissioning(&self) -> bool {
        self.operational_state == OperationalState::Decommissioning
    }

    pub fn is_entering_maintenance(&self) -> bool {
        self.operational_state == OperationalState::EnteringMaintenance
    }

    pub fn is_in_maintenance(&self) -> bool {
        self.operational_state == OperationalState::InMaintenance
    }
}
