//! Users, user requests and workflows
//!
//! A user issues user requests against SFCs. Each user request spawns a
//! workflow per attempt: the workflow materializes the ordered request
//! chain along the SFC, and on failure the user request retries with a
//! fresh workflow after its backoff, if retry is enabled.

use crate::entity::{EntityCore, RequestId, SfcId, UserId, UserRequestId, WorkflowId};
use crate::knob::Knob;

#[derive(Debug)]
pub struct User {
    pub entity: EntityCore,
    pub user_requests: Vec<UserRequestId>,
}

/// Workload knobs shared by a user request and the workflows it spawns.
#[derive(Debug, Clone)]
pub struct WorkloadShape {
    pub priority: Knob<i64>,
    pub process_length: Knob<u64>,
    pub packet_size: Knob<u64>,
    pub num_packets: Knob<u64>,
}

impl Default for WorkloadShape {
    fn default() -> Self {
        Self {
            priority: Knob::Fixed(0),
            process_length: Knob::Fixed(100),
            packet_size: Knob::Fixed(65_536),
            num_packets: Knob::Fixed(1),
        }
    }
}

#[derive(Debug)]
pub struct UserRequest {
    pub entity: EntityCore,
    pub user: UserId,
    pub sfc: SfcId,
    pub shape: WorkloadShape,
    pub retry: bool,
    /// Delay before retrying a failed workflow, or re-polling an unready
    /// SFC.
    pub backoff: Knob<f64>,
    pub flows: Vec<WorkflowId>,
}

/// One attempt at satisfying a user request by walking its SFC.
#[derive(Debug)]
pub struct Workflow {
    pub entity: EntityCore,
    pub user: UserId,
    pub user_request: UserRequestId,
    pub sfc: SfcId,
    pub shape: WorkloadShape,
    pub requests: Vec<RequestId>,
}
