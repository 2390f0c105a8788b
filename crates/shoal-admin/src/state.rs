//! Transition rules for the administrative lifecycle of a datanode.
//!
//! Every operational-state change in this crate is planned by [`plan`],
//! so the set of legal lifecycle traces is exactly what this table allows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::OperationalState;

/// An administrative action applied to a node's lifecycle state.
///
/// The first three are operator commands; the two `Complete` variants are
/// issued by the replication drain gate once a node is fully drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminCommand {
    StartDecommission,
    Recommission,
    StartMaintenance,
    CompleteDecommission,
    CompleteMaintenanceEntry,
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminCommand::StartDecommission => write!(f, "decommission"),
            AdminCommand::Recommission => write!(f, "recommission"),
            AdminCommand::StartMaintenance => write!(f, "start maintenance on"),
            AdminCommand::CompleteDecommission => write!(f, "complete decommission of"),
            AdminCommand::CompleteMaintenanceEntry => write!(f, "complete maintenance entry of"),
        }
    }
}

/// Outcome of consulting the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The command moves the node to a new state.
    Move(OperationalState),
    /// The command is already satisfied in the current state.
    Noop,
    /// The command is illegal in the current state.
    Reject,
}

/// The transition table.
///
/// Commands are idempotent within their own lifecycle family: decommission
/// of a node that is already decommissioning or decommissioned is a no-op,
/// and likewise for maintenance. Crossing families requires an explicit
/// recommission first. Recommission never fails.
pub fn plan(current: OperationalState, command: AdminCommand) -> Transition {
    use AdminCommand::*;
    use OperationalState::*;
    use Transition::*;

    match (command, current) {
        (StartDecommission, InService) => Move(Decommissioning),
        (StartDecommission, Decommissioning | Decommissioned) => Noop,
        (StartDecommission, EnteringMaintenance | InMaintenance) => Reject,

        (Recommission, InService) => Noop,
        (
            Recommission,
            Decommissioning | Decommissioned | EnteringMaintenance | InMaintenance,
        ) => Move(InService),

        (StartMaintenance, InService) => Move(EnteringMaintenance),
        (StartMaintenance, EnteringMaintenance | InMaintenance) => Noop,
        (StartMaintenance, Decommissioning | Decommissioned) => Reject,

        (CompleteDecommission, Decommissioning) => Move(Decommissioned),
        (
            CompleteDecommission,
            InService | Decommissioned | EnteringMaintenance | InMaintenance,
        ) => Reject,

        (CompleteMaintenanceEntry, EnteringMaintenance) => Move(InMaintenance),
        (
            CompleteMaintenanceEntry,
            InService | Decommissioning | Decommissioned | InMaintenance,
        ) => Reject,
    }
}
