//! Simulated entities
//!
//! Arenas in [`crate::engine::Simulation`] own every entity; the types
//! here hold per-entity state and the typed index handles used for all
//! cross-references. Handles are plain indices into the owning arena, so
//! relationships that would be cyclic with pointers (container <-> host,
//! request <-> workflow, packet <-> request) stay unidirectional.

pub mod container;
pub mod cpu;
pub mod microservice;
pub mod network_service;
pub mod nic;
pub mod node;
pub mod packet;
pub mod process;
pub mod request;
pub mod service;
pub mod sfc;
pub mod user;
pub mod volume;

use serde::Serialize;

use crate::status::{Status, StatusSet};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// A physical node: host, switch, router or gateway
    NodeId
);
entity_id!(NicId);
entity_id!(ContainerId);
entity_id!(VolumeId);
entity_id!(ProcessId);
entity_id!(PacketId);
entity_id!(RequestId);
entity_id!(MicroserviceId);
entity_id!(NetworkServiceId);
entity_id!(SfcId);
entity_id!(UserId);
entity_id!(UserRequestId);
entity_id!(WorkflowId);

/// A handle to any entity, used for after-dependencies, resource claims
/// and generic lifecycle dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Node(NodeId),
    Nic(NicId),
    Container(ContainerId),
    Volume(VolumeId),
    Process(ProcessId),
    Packet(PacketId),
    Request(RequestId),
    Microservice(MicroserviceId),
    NetworkService(NetworkServiceId),
    Sfc(SfcId),
    User(UserId),
    UserRequest(UserRequestId),
    Workflow(WorkflowId),
}

/// One side of a request: a user outside the cluster or a microservice
/// fronted by its service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    User(UserId),
    Microservice(MicroserviceId),
}

/// Lifecycle state shared by every entity.
#[derive(Debug, Clone)]
pub struct EntityCore {
    pub label: String,
    pub status: StatusSet,
    pub created_at: Option<f64>,
    pub scheduled_at: Option<f64>,
    pub terminated_at: Option<f64>,
}

impl EntityCore {
    pub fn new(label: String) -> Self {
        Self {
            label,
            status: StatusSet::new(),
            created_at: None,
            scheduled_at: None,
            terminated_at: None,
        }
    }

    pub fn created(&self) -> bool {
        self.status.contains(Status::Created)
    }

    pub fn scheduled(&self) -> bool {
        self.status.contains(Status::Scheduled)
    }

    pub fn completed(&self) -> bool {
        self.status.contains(Status::Completed)
    }

    pub fn failed(&self) -> bool {
        self.status.contains(Status::Failed)
    }

    pub fn terminated(&self) -> bool {
        self.status.contains(Status::Terminated)
    }

    pub fn mark_created(&mut self, now: f64) {
        self.status.insert(Status::Created);
        self.created_at = Some(now);
    }

    pub fn mark_scheduled(&mut self, now: f64) {
        self.status.insert(Status::Scheduled);
        self.scheduled_at = Some(now);
    }

    pub fn mark_terminated(&mut self, now: f64) {
        self.status.insert(Status::Terminated);
        self.terminated_at = Some(now);
    }
}
