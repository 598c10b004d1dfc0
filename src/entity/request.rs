//! Requests: one hop of a workflow across the service chain
//!
//! A request connects two endpoints (user or microservice). Once the
//! request scheduler resolves both endpoints to containers, the request
//! expands into an ordered chain of processes and packets whose terminal
//! element completes it.

use serde::{Deserialize, Serialize};

use crate::entity::{ContainerId, Endpoint, EntityCore, PacketId, ProcessId, WorkflowId};

/// The request verb; shapes the expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Get,
    Post,
    List,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Get => "GET",
            RequestKind::Post => "POST",
            RequestKind::List => "LIST",
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub entity: EntityCore,
    pub source: Endpoint,
    pub target: Endpoint,
    pub flow: Option<WorkflowId>,
    pub kind: RequestKind,
    /// Inherited from the workflow's priority knob; 0 when flow-less.
    pub priority: i64,
    pub processes: Vec<ProcessId>,
    pub packets: Vec<PacketId>,
    /// Resolved by the load balancer at scheduling time.
    pub source_endpoint: Option<ContainerId>,
    pub target_endpoint: Option<ContainerId>,
    /// Last request of its workflow: completing it completes the flow.
    pub completes_workflow: bool,
}

impl Request {
    pub fn new(
        entity: EntityCore,
        source: Endpoint,
        target: Endpoint,
        kind: RequestKind,
        flow: Option<WorkflowId>,
        priority: i64,
    ) -> Self {
        Self {
            entity,
            source,
            target,
            flow,
            kind,
            priority,
            processes: Vec::new(),
            packets: Vec::new(),
            source_endpoint: None,
            target_endpoint: None,
            completes_workflow: false,
        }
    }

    pub fn source_is_user(&self) -> bool {
        matches!(self.source, Endpoint::User(_))
    }

    pub fn target_is_user(&self) -> bool {
        matches!(self.target, Endpoint::User(_))
    }
}
