//! Dispatchable actions
//!
//! Each variant is one kind of state transition the actor queue can
//! perform. Keeping the set closed (instead of boxed closures) makes the
//! dispatch a single match in the engine and keeps actions inspectable in
//! traces and tests.

use crate::entity::{
    ContainerId, EntityRef, MicroserviceId, NicId, NodeId, PacketId, ProcessId, UserRequestId,
    VolumeId,
};

/// What a scheduled actor does when it fires.
#[derive(Debug, Clone)]
pub enum Action {
    /// Run an entity's creation logic and mark it `Created`.
    Create(EntityRef),
    /// Run an entity's termination cascade and mark it `Terminated`.
    Terminate(EntityRef),

    /// Power a physical node on, cascading to its CPU and NICs.
    PowerOn(NodeId),
    /// Power a physical node off, cascading to its CPU and NICs.
    PowerOff(NodeId),
    /// Create the NIC pair and topology edges for one link.
    ConnectDevice {
        a: NodeId,
        b: NodeId,
        bandwidth: u64,
    },

    /// One process-scheduling pass over a node's CPU queue.
    ScheduleCpu(NodeId),
    /// Clear a finished execution chunk from a core.
    ClearInstructions {
        node: NodeId,
        core: usize,
        process: ProcessId,
        chunk: u64,
    },
    /// Mark the process completed when it has run to its full length.
    ProcessCompleteCheck(ProcessId),

    /// One packet-scheduling pass over a node's transmit queue.
    SendPackets(NodeId),
    /// The sending NIC finished pushing a packet onto the wire.
    PacketSent { nic: NicId, packet: PacketId },
    /// The receiving NIC finished pulling a packet off the wire.
    PacketReceived { nic: NicId, packet: PacketId },

    /// Attach a volume to a container.
    AttachVolume {
        volume: VolumeId,
        container: ContainerId,
    },
    /// Detach a volume from its container.
    DetachVolume(VolumeId),

    /// One placement pass of the container scheduler.
    ScheduleContainers,
    /// One placement pass of the volume allocator.
    AllocateVolumes,
    /// One dispatch pass of the request scheduler.
    ScheduleRequests,
    /// Readiness and autoscaling check of one microservice.
    EvaluateMicroservice(MicroserviceId),
    /// Instantiate a replacement for a crashed container, re-attaching
    /// the retained volumes.
    RecoverContainer {
        microservice: MicroserviceId,
        label: String,
        volumes: Vec<VolumeId>,
    },
    /// Power-saving check of one provisioned host.
    EvaluateHost(NodeId),

    /// Spawn a workflow for a user request, backing off while its SFC is
    /// not ready.
    InitWorkflow(UserRequestId),

    /// Periodic host telemetry sample.
    SampleHosts,
    /// Periodic microservice telemetry sample.
    SampleMicroservices,
}
