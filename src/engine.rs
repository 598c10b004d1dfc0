//! The simulation engine
//!
//! One [`Simulation`] value owns the virtual clock, the actor queue, the
//! entity arenas, the control plane and the monitors. All behavior runs
//! single-threaded inside `run`: actors fire one at a time, so every
//! mutation of shared state is linearized by the queue's (time, priority,
//! insertion) order.

use tracing::debug;

use crate::action::Action;
use crate::actor::{priority, ActorQueue, Priority};
use crate::config::SimConfig;
use crate::entity::container::Container;
use crate::entity::microservice::Microservice;
use crate::entity::network_service::NetworkService;
use crate::entity::nic::Nic;
use crate::entity::node::Node;
use crate::entity::packet::Packet;
use crate::entity::process::Process;
use crate::entity::request::Request;
use crate::entity::sfc::Sfc;
use crate::entity::user::{User, UserRequest, Workflow};
use crate::entity::volume::Volume;
use crate::entity::{EntityCore, EntityRef, NodeId};
use crate::error::{SimError, SimResult};
use crate::monitor::Monitors;
use crate::scheduler::container_scheduler::ContainerScheduler;
use crate::scheduler::host_provisioner::HostProvisioner;
use crate::scheduler::request_scheduler::RequestScheduler;
use crate::scheduler::volume_allocator::VolumeAllocator;
use crate::topology::Topology;

/// A complete simulation: physical fabric, virtual workloads, control
/// plane, monitors and the clock driving them.
pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) rng: fastrand::Rng,
    /// Virtual time in quantum ticks.
    pub(crate) clock: u64,
    pub(crate) queue: ActorQueue,
    pub(crate) topology: Topology,

    pub(crate) nodes: Vec<Node>,
    pub(crate) nics: Vec<Nic>,
    pub(crate) containers: Vec<Container>,
    pub(crate) volumes: Vec<Volume>,
    pub(crate) processes: Vec<Process>,
    pub(crate) packets: Vec<Packet>,
    pub(crate) requests: Vec<Request>,
    pub(crate) microservices: Vec<Microservice>,
    pub(crate) network_services: Vec<NetworkService>,
    pub(crate) sfcs: Vec<Sfc>,
    pub(crate) users: Vec<User>,
    pub(crate) user_requests: Vec<UserRequest>,
    pub(crate) workflows: Vec<Workflow>,

    pub(crate) container_scheduler: Option<ContainerScheduler>,
    pub(crate) volume_allocator: Option<VolumeAllocator>,
    pub(crate) host_provisioner: Option<HostProvisioner>,
    pub(crate) request_scheduler: Option<RequestScheduler>,

    pub(crate) gateway: Option<NodeId>,
    pub(crate) gateway_router: Option<NodeId>,
    pub(crate) core_switch: Option<NodeId>,

    /// Next offset into the virtual network pool for service IPs.
    pub(crate) next_service_ip: u32,

    pub(crate) monitors: Monitors,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self::with_seed(config, fastrand::u64(..))
    }

    /// Deterministic construction for scenarios and tests.
    pub fn with_seed(config: SimConfig, seed: u64) -> Self {
        Self {
            config,
            rng: fastrand::Rng::with_seed(seed),
            clock: 0,
            queue: ActorQueue::new(),
            topology: Topology::new(),
            nodes: Vec::new(),
            nics: Vec::new(),
            containers: Vec::new(),
            volumes: Vec::new(),
            processes: Vec::new(),
            packets: Vec::new(),
            requests: Vec::new(),
            microservices: Vec::new(),
            network_services: Vec::new(),
            sfcs: Vec::new(),
            users: Vec::new(),
            user_requests: Vec::new(),
            workflows: Vec::new(),
            container_scheduler: None,
            volume_allocator: None,
            host_provisioner: None,
            request_scheduler: None,
            gateway: None,
            gateway_router: None,
            core_switch: None,
            next_service_ip: 0,
            monitors: Monitors::default(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.config.to_seconds(self.clock)
    }

    /// Advance virtual time to `till` seconds, draining the actor queue.
    ///
    /// Fails fast when the control plane is incomplete; resource
    /// exhaustion during the run never surfaces here, only in telemetry.
    pub fn run(&mut self, till: f64) -> SimResult<()> {
        self.config.validate()?;
        if self.container_scheduler.is_none() {
            return Err(SimError::MissingComponent("container scheduler"));
        }
        if self.volume_allocator.is_none() {
            return Err(SimError::MissingComponent("volume allocator"));
        }
        if self.host_provisioner.is_none() {
            return Err(SimError::MissingComponent("host provisioner"));
        }
        if self.request_scheduler.is_none() {
            return Err(SimError::MissingComponent("request scheduler"));
        }

        let till_ticks = self.config.to_ticks(till);
        while let Some(actor) = self.queue.pop_until(till_ticks) {
            self.clock = actor.at;
            self.dispatch(actor.action)?;
        }
        // The horizon is the only cut-off: unfinished work keeps its
        // current status and shows up as such in the monitors.
        self.clock = self.clock.max(till_ticks);
        Ok(())
    }

    pub(crate) fn dispatch(&mut self, action: Action) -> SimResult<()> {
        debug!(now = self.now(), ?action, "dispatch");
        match action {
            Action::Create(entity) => self.create_entity(entity)?,
            Action::Terminate(entity) => self.terminate_entity(entity),
            Action::PowerOn(node) => self.power_on_now(node),
            Action::PowerOff(node) => self.power_off_now(node),
            Action::ConnectDevice { a, b, bandwidth } => self.connect_now(a, b, bandwidth),
            Action::ScheduleCpu(node) => self.schedule_cpu_pass(node),
            Action::ClearInstructions {
                node,
                core,
                process,
                chunk,
            } => self.clear_instructions(node, core, process, chunk),
            Action::ProcessCompleteCheck(process) => self.complete_process(process),
            Action::SendPackets(node) => self.send_packets_pass(node),
            Action::PacketSent { nic, packet } => self.packet_sent(nic, packet),
            Action::PacketReceived { nic, packet } => self.packet_received(nic, packet),
            Action::AttachVolume { volume, container } => self.attach_volume(volume, container),
            Action::DetachVolume(volume) => self.detach_volume(volume),
            Action::ScheduleContainers => self.schedule_containers_pass(),
            Action::AllocateVolumes => self.allocate_volumes_pass(),
            Action::ScheduleRequests => self.schedule_requests_pass()?,
            Action::EvaluateMicroservice(ms) => self.evaluate_microservice_tick(ms),
            Action::RecoverContainer {
                microservice,
                label,
                volumes,
            } => self.recover_container(microservice, label, volumes),
            Action::EvaluateHost(node) => self.evaluate_host(node),
            Action::InitWorkflow(user_request) => self.init_workflow(user_request),
            Action::SampleHosts => self.sample_hosts(),
            Action::SampleMicroservices => self.sample_microservices(),
        }
        Ok(())
    }

    // ---- scheduling helpers -------------------------------------------

    pub(crate) fn schedule_now(&mut self, priority: Priority, action: Action) {
        self.queue.schedule(self.clock, priority, action);
    }

    pub(crate) fn schedule_in(&mut self, delay: f64, priority: Priority, action: Action) {
        let at = self.clock + self.config.to_ticks(delay);
        self.queue.schedule(at, priority, action);
    }

    pub(crate) fn schedule_at(&mut self, at: f64, priority: Priority, action: Action) {
        let at = self.config.to_ticks(at).max(self.clock);
        self.queue.schedule(at, priority, action);
    }

    /// Schedule gated on the termination of `deps`; already-terminated
    /// dependencies do not gate.
    pub(crate) fn schedule_after(
        &mut self,
        at: f64,
        priority: Priority,
        action: Action,
        deps: &[EntityRef],
    ) {
        let pending: Vec<EntityRef> = deps
            .iter()
            .copied()
            .filter(|&dep| !self.entity_core(dep).terminated())
            .collect();
        let at = self.config.to_ticks(at).max(self.clock);
        self.queue.schedule_gated(at, priority, action, pending);
    }

    /// Activate an entity's terminator.
    pub(crate) fn terminate(&mut self, entity: EntityRef) {
        self.schedule_now(priority::TERMINATION, Action::Terminate(entity));
    }

    // ---- coalesced control-plane nudges -------------------------------

    pub(crate) fn nudge_container_scheduler(&mut self) {
        if let Some(scheduler) = &mut self.container_scheduler {
            if !scheduler.pending {
                scheduler.pending = true;
                self.schedule_now(priority::CONTAINER_SCHEDULER, Action::ScheduleContainers);
            }
        }
    }

    pub(crate) fn nudge_volume_allocator(&mut self) {
        if let Some(allocator) = &mut self.volume_allocator {
            if !allocator.pending {
                allocator.pending = true;
                self.schedule_now(priority::VOLUME_ALLOCATOR, Action::AllocateVolumes);
            }
        }
    }

    pub(crate) fn nudge_request_scheduler(&mut self) {
        if let Some(scheduler) = &mut self.request_scheduler {
            if !scheduler.pending {
                scheduler.pending = true;
                self.schedule_now(priority::REQUEST_SCHEDULER, Action::ScheduleRequests);
            }
        }
    }

    /// Activate an entity's terminator from driver code; the termination
    /// cascade runs at the current tick once `run` resumes.
    pub fn schedule_termination(&mut self, entity: EntityRef) {
        self.terminate(entity);
    }

    // ---- read-only views ----------------------------------------------

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nics(&self) -> &[Nic] {
        &self.nics
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn microservices(&self) -> &[Microservice] {
        &self.microservices
    }

    pub fn network_services(&self) -> &[NetworkService] {
        &self.network_services
    }

    pub fn sfcs(&self) -> &[Sfc] {
        &self.sfcs
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user_requests(&self) -> &[UserRequest] {
        &self.user_requests
    }

    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    // ---- entity access ------------------------------------------------

    pub(crate) fn entity_core(&self, entity: EntityRef) -> &EntityCore {
        match entity {
            EntityRef::Node(id) => &self.nodes[id.index()].entity,
            EntityRef::Nic(id) => &self.nics[id.index()].entity,
            EntityRef::Container(id) => &self.containers[id.index()].entity,
            EntityRef::Volume(id) => &self.volumes[id.index()].entity,
            EntityRef::Process(id) => &self.processes[id.index()].entity,
            EntityRef::Packet(id) => &self.packets[id.index()].entity,
            EntityRef::Request(id) => &self.requests[id.index()].entity,
            EntityRef::Microservice(id) => &self.microservices[id.index()].entity,
            EntityRef::NetworkService(id) => &self.network_services[id.index()].entity,
            EntityRef::Sfc(id) => &self.sfcs[id.index()].entity,
            EntityRef::User(id) => &self.users[id.index()].entity,
            EntityRef::UserRequest(id) => &self.user_requests[id.index()].entity,
            EntityRef::Workflow(id) => &self.workflows[id.index()].entity,
        }
    }

    pub(crate) fn entity_core_mut(&mut self, entity: EntityRef) -> &mut EntityCore {
        match entity {
            EntityRef::Node(id) => &mut self.nodes[id.index()].entity,
            EntityRef::Nic(id) => &mut self.nics[id.index()].entity,
            EntityRef::Container(id) => &mut self.containers[id.index()].entity,
            EntityRef::Volume(id) => &mut self.volumes[id.index()].entity,
            EntityRef::Process(id) => &mut self.processes[id.index()].entity,
            EntityRef::Packet(id) => &mut self.packets[id.index()].entity,
            EntityRef::Request(id) => &mut self.requests[id.index()].entity,
            EntityRef::Microservice(id) => &mut self.microservices[id.index()].entity,
            EntityRef::NetworkService(id) => &mut self.network_services[id.index()].entity,
            EntityRef::Sfc(id) => &mut self.sfcs[id.index()].entity,
            EntityRef::User(id) => &mut self.users[id.index()].entity,
            EntityRef::UserRequest(id) => &mut self.user_requests[id.index()].entity,
            EntityRef::Workflow(id) => &mut self.workflows[id.index()].entity,
        }
    }

}
