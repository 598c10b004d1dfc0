//! Entity lifecycle and failure cascades
//!
//! Creation and termination are actors like everything else. Termination
//! is where cascades run: a crashing container fails its processes and
//! requests, a failed request fails its workflow, and a failed workflow
//! either retries through its user request or fails it for good. Every
//! transition is idempotent; re-failing a failed entity is a no-op.

use tracing::{debug, info, warn};

use crate::action::Action;
use crate::actor::priority;
use crate::engine::Simulation;
use crate::entity::container::{Container, VolumeTemplate};
use crate::entity::process::{Process, ProcessKind, DAEMON_PRIORITY};
use crate::entity::user::Workflow;
use crate::entity::volume::Volume;
use crate::entity::{
    ContainerId, Endpoint, EntityCore, EntityRef, MicroserviceId, PacketId, ProcessId, RequestId,
    SfcId, UserRequestId, VolumeId, WorkflowId,
};
use crate::error::{SimError, SimResult};
use crate::status::Status;

impl Simulation {
    // ---- creation -----------------------------------------------------

    pub(crate) fn create_entity(&mut self, entity: EntityRef) -> SimResult<()> {
        match entity {
            EntityRef::Process(id) => return self.create_process(id),
            EntityRef::Packet(id) => return self.create_packet(id),
            EntityRef::Request(id) => {
                let flow_failed = self.requests[id.index()]
                    .flow
                    .map(|flow| self.workflows[flow.index()].entity.failed())
                    .unwrap_or(false);
                if flow_failed {
                    debug!(
                        request = %self.requests[id.index()].entity.label,
                        "request creation cancelled, workflow failed"
                    );
                    return Ok(());
                }
                self.mark_created(entity);
                self.nudge_request_scheduler();
            }
            EntityRef::Container(_) => {
                self.mark_created(entity);
                self.nudge_container_scheduler();
            }
            EntityRef::Volume(_) => {
                self.mark_created(entity);
                self.nudge_volume_allocator();
            }
            EntityRef::UserRequest(id) => {
                self.mark_created(entity);
                self.schedule_now(priority::CREATION, Action::InitWorkflow(id));
            }
            EntityRef::Workflow(id) => {
                self.mark_created(entity);
                self.initialize_requests(id);
            }
            _ => self.mark_created(entity),
        }
        Ok(())
    }

    fn mark_created(&mut self, entity: EntityRef) {
        let now = self.now();
        let core = self.entity_core_mut(entity);
        core.mark_created(now);
        info!(now, label = %core.label, "created");
    }

    fn create_process(&mut self, id: ProcessId) -> SimResult<()> {
        let request_failed = self.processes[id.index()]
            .request
            .map(|request| self.requests[request.index()].entity.failed())
            .unwrap_or(false);
        if request_failed {
            debug!(
                process = %self.processes[id.index()].entity.label,
                "process creation cancelled, request failed"
            );
            return Ok(());
        }

        if !self.processes[id.index()].is_handler() {
            let platform = self.config.platform;
            let amplifier = self.config.ram_amplifier;
            let (processes, rng) = (&mut self.processes, &mut self.rng);
            processes[id.index()].settle_ram_usage(platform, amplifier, rng);
        }
        self.mark_created(EntityRef::Process(id));

        if !self.processes[id.index()].is_handler() {
            if let Some(container) = self.processes[id.index()].container {
                self.accept_process(container, id);
            }
        }
        Ok(())
    }

    fn create_packet(&mut self, id: PacketId) -> SimResult<()> {
        let request_failed = self.packets[id.index()]
            .request
            .map(|request| self.requests[request.index()].entity.failed())
            .unwrap_or(false);
        if request_failed {
            debug!(
                packet = %self.packets[id.index()].entity.label,
                "packet creation cancelled, request failed"
            );
            return Ok(());
        }

        let (source, destination) = {
            let state = &self.packets[id.index()];
            (state.source, state.destination)
        };
        let path = self
            .topology
            .shortest_path(source, destination)
            .ok_or_else(|| SimError::PathNotFound {
                from: self.nodes[source.index()].entity.label.clone(),
                destination: self.nodes[destination.index()].entity.label.clone(),
            })?;
        self.packets[id.index()].path = path;
        self.mark_created(EntityRef::Packet(id));

        if self.cache_packet(source, id).is_err() {
            self.drop_packet(id);
        }
        Ok(())
    }

    // ---- termination --------------------------------------------------

    pub(crate) fn terminate_entity(&mut self, entity: EntityRef) {
        if self.entity_core(entity).terminated() {
            return;
        }
        let now = self.now();
        {
            let core = self.entity_core_mut(entity);
            core.mark_terminated(now);
            info!(now, label = %core.label, "terminated");
        }

        match entity {
            EntityRef::Container(id) => self.container_termination(id),
            EntityRef::Volume(id) => self.volume_termination(id),
            EntityRef::Process(id) => self.process_termination(id),
            EntityRef::Packet(id) => self.packet_termination(id),
            EntityRef::Request(id) => self.request_termination(id),
            EntityRef::Workflow(id) => self.workflow_termination(id),
            EntityRef::Microservice(id) => self.microservice_termination(id),
            EntityRef::Sfc(id) => self.sfc_termination(id),
            EntityRef::NetworkService(id) => self.network_service_termination(id),
            _ => {}
        }

        // After-dependencies wait on the terminator, so release them only
        // once the cascade above ran.
        self.queue.entity_terminated(entity, self.clock);
    }

    // ---- containers ---------------------------------------------------

    /// Instantiate one container of a microservice, together with the
    /// volumes of the given templates.
    pub(crate) fn spawn_container(
        &mut self,
        microservice: MicroserviceId,
        label: String,
        templates: &[VolumeTemplate],
    ) -> ContainerId {
        let spec = self.microservices[microservice.index()].spec.clone();
        let id = ContainerId(self.containers.len() as u32);
        let mut container = Container::new(EntityCore::new(label.clone()), &spec, microservice);

        for template in templates {
            let volume = VolumeId(self.volumes.len() as u32);
            self.volumes.push(Volume::new(
                EntityCore::new(format!("{label}-{}", template.tag)),
                template.tag.clone(),
                template.path.clone(),
                template.size,
                template.retain,
                spec.taint.clone(),
            ));
            container.volumes.push(volume);
            self.schedule_now(priority::CREATION, Action::Create(EntityRef::Volume(volume)));
            self.schedule_now(
                priority::VOLUME_ATTACH,
                Action::AttachVolume {
                    volume,
                    container: id,
                },
            );
        }

        self.containers.push(container);
        self.microservices[microservice.index()].containers.push(id);
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::Container(id)));
        id
    }

    /// Admit a process into a container, reserving its footprint on the
    /// container and host RAM pools; either failure crashes the
    /// container.
    pub(crate) fn accept_process(&mut self, container: ContainerId, process: ProcessId) {
        if self.containers[container.index()].entity.terminated() {
            warn!(
                container = %self.containers[container.index()].entity.label,
                process = %self.processes[process.index()].entity.label,
                "process offered to a terminated container"
            );
            self.crash_process(process);
            return;
        }

        let now = self.now();
        let claim = EntityRef::Process(process);
        let ram_usage = self.processes[process.index()].ram_usage as f64;

        self.containers[container.index()].processes.push(process);
        {
            let state = &mut self.processes[process.index()];
            state.container = Some(container);
            state.entity.mark_scheduled(now);
        }

        if self.containers[container.index()]
            .ram
            .distribute(claim, ram_usage, now)
            .is_err()
        {
            info!(
                container = %self.containers[container.index()].entity.label,
                process = %self.processes[process.index()].entity.label,
                "container crashed by RAM overload"
            );
            self.crash_container(container);
            return;
        }

        let Some(host) = self.containers[container.index()].host else {
            warn!(
                container = %self.containers[container.index()].entity.label,
                "process offered to an unscheduled container"
            );
            self.crash_process(process);
            return;
        };
        if self.nodes[host.index()]
            .ram
            .distribute(claim, ram_usage, now)
            .is_err()
        {
            info!(
                container = %self.containers[container.index()].entity.label,
                host = %self.nodes[host.index()].entity.label,
                "container crashed by host RAM overload"
            );
            self.crash_container(container);
            return;
        }

        self.nodes[host.index()].processes.push(process);
        self.processes[process.index()].host = Some(host);
        debug!(
            process = %self.processes[process.index()].entity.label,
            container = %self.containers[container.index()].entity.label,
            "process accepted"
        );
        self.cache_process(host, process);
    }

    pub(crate) fn crash_container(&mut self, container: ContainerId) {
        if self.containers[container.index()].entity.failed() {
            return;
        }
        self.containers[container.index()]
            .entity
            .status
            .insert(Status::Failed);
        info!(container = %self.containers[container.index()].entity.label, "container crashed");
        self.terminate(EntityRef::Container(container));
    }

    fn container_termination(&mut self, id: ContainerId) {
        let now = self.now();
        let claim = EntityRef::Container(id);

        // Give back the admission reservations.
        if self.containers[id.index()].entity.scheduled() {
            if let Some(host) = self.containers[id.index()].host {
                let node = &mut self.nodes[host.index()];
                node.rom.release(claim, None, now);
                if let Some(ext) = node.host_mut() {
                    ext.cpu_reservor.release(claim, None, now);
                    ext.ram_reservor.release(claim, None, now);
                    if let Some(position) = ext.containers.iter().position(|&c| c == id) {
                        ext.containers.swap_remove(position);
                    }
                }
            }
        }

        // Retained volumes detach and follow the replacement; the rest
        // die with the container.
        let mut detached: Vec<VolumeId> = Vec::new();
        for volume in self.containers[id.index()].volumes.clone() {
            if self.volumes[volume.index()].retain {
                self.schedule_now(priority::VOLUME_DETACH, Action::DetachVolume(volume));
                detached.push(volume);
            } else {
                self.terminate(EntityRef::Volume(volume));
            }
        }

        for process in self.containers[id.index()].processes.clone() {
            if !self.processes[process.index()].entity.terminated() {
                self.crash_process(process);
            }
        }
        for request in self.containers[id.index()].requests.clone() {
            if !self.requests[request.index()].entity.terminated() {
                self.fail_request(request);
            }
        }

        let microservice = self.containers[id.index()].microservice;
        {
            let containers = &mut self.microservices[microservice.index()].containers;
            if let Some(position) = containers.iter().position(|&c| c == id) {
                containers.remove(position);
            }
        }
        if self.containers[id.index()].entity.failed()
            && !self.microservices[microservice.index()].entity.terminated()
        {
            let label = self.containers[id.index()].entity.label.clone();
            self.schedule_now(
                priority::CREATION,
                Action::RecoverContainer {
                    microservice,
                    label,
                    volumes: detached,
                },
            );
        }
        self.nudge_container_scheduler();
    }

    /// Re-instantiate a crashed container: volume templates covered by a
    /// surviving retained volume are not re-created.
    pub(crate) fn recover_container(
        &mut self,
        microservice: MicroserviceId,
        label: String,
        detached: Vec<VolumeId>,
    ) {
        if self.microservices[microservice.index()].entity.terminated() {
            return;
        }
        let templates: Vec<VolumeTemplate> = self.microservices[microservice.index()]
            .spec
            .volumes
            .iter()
            .filter(|template| {
                !detached.iter().any(|&volume| {
                    let state = &self.volumes[volume.index()];
                    state.tag == template.tag && state.path == template.path
                })
            })
            .cloned()
            .collect();

        let replacement = self.spawn_container(microservice, label, &templates);
        for volume in detached {
            self.containers[replacement.index()].volumes.push(volume);
            self.schedule_now(
                priority::VOLUME_ATTACH,
                Action::AttachVolume {
                    volume,
                    container: replacement,
                },
            );
        }
        info!(
            microservice = %self.microservices[microservice.index()].entity.label,
            container = %self.containers[replacement.index()].entity.label,
            "recovered failed container"
        );
    }

    /// Containers flagged as daemons keep a baseline process running;
    /// it respawns on completion while the container is alive.
    pub(crate) fn init_daemon(&mut self, container: ContainerId) {
        let state = &self.containers[container.index()];
        if !state.daemon || state.entity.failed() || state.entity.terminated() {
            return;
        }
        let Some(host) = state.host else { return };
        let length = (state.cpu_request as f64 / 1000.0
            * self.nodes[host.index()].cpu.single_core_capacity()) as u64;
        let label = format!("{}-daemon", state.entity.label);

        let id = ProcessId(self.processes.len() as u32);
        self.processes.push(Process::new(
            EntityCore::new(label),
            ProcessKind::Daemon,
            length,
            DAEMON_PRIORITY,
            None,
            Some(container),
        ));
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::Process(id)));
    }

    // ---- volumes ------------------------------------------------------

    pub(crate) fn attach_volume(&mut self, volume: VolumeId, container: ContainerId) {
        let state = &mut self.volumes[volume.index()];
        state.container = Some(container);
        state.attached = true;
        info!(
            volume = %state.entity.label,
            container = %self.containers[container.index()].entity.label,
            "volume attached"
        );
    }

    pub(crate) fn detach_volume(&mut self, volume: VolumeId) {
        let state = &mut self.volumes[volume.index()];
        state.container = None;
        state.attached = false;
        info!(volume = %state.entity.label, "volume detached");
    }

    fn volume_termination(&mut self, id: VolumeId) {
        let now = self.now();
        if self.volumes[id.index()].allocated {
            if let Some(host) = self.volumes[id.index()].host {
                let node = &mut self.nodes[host.index()];
                node.rom.release(EntityRef::Volume(id), None, now);
                if let Some(ext) = node.host_mut() {
                    if let Some(position) = ext.volumes.iter().position(|&v| v == id) {
                        ext.volumes.swap_remove(position);
                    }
                }
            }
        }
        self.nudge_volume_allocator();
    }

    // ---- processes ----------------------------------------------------

    pub(crate) fn crash_process(&mut self, process: ProcessId) {
        if self.processes[process.index()].entity.failed() {
            return;
        }
        self.processes[process.index()]
            .entity
            .status
            .insert(Status::Failed);
        info!(process = %self.processes[process.index()].entity.label, "process failed");
        self.terminate(EntityRef::Process(process));

        if let Some(request) = self.processes[process.index()].request {
            if !self.requests[request.index()].entity.failed() {
                self.fail_request(request);
            }
        }
    }

    fn process_termination(&mut self, id: ProcessId) {
        self.release_process_resources(id);

        if self.processes[id.index()].cached() {
            if let Some(host) = self.processes[id.index()].host {
                self.nudge_cpu(host);
            }
        }

        match self.processes[id.index()].kind {
            ProcessKind::Daemon => {
                if !self.processes[id.index()].entity.failed() {
                    if let Some(container) = self.processes[id.index()].container {
                        self.init_daemon(container);
                    }
                }
            }
            ProcessKind::PacketHandler(packet) => {
                self.packets[packet.index()]
                    .entity
                    .status
                    .insert(Status::Decoded);
                debug!(packet = %self.packets[packet.index()].entity.label, "packet decoded");
                if let Some(node) = self.packets[packet.index()].current_hop() {
                    self.nudge_send_packets(node);
                }
            }
            ProcessKind::Regular => {}
        }

        // Terminal POST element: its completion completes the request.
        let state = &self.processes[id.index()];
        if state.completes_request && state.entity.completed() {
            if let Some(request) = state.request {
                if !self.requests[request.index()].entity.failed() {
                    self.complete_request(request);
                }
            }
        }
    }

    fn release_process_resources(&mut self, id: ProcessId) {
        let now = self.now();
        let claim = EntityRef::Process(id);

        if self.processes[id.index()].entity.scheduled() {
            if let Some(container) = self.processes[id.index()].container {
                let state = &mut self.containers[container.index()];
                if let Some(position) = state.processes.iter().position(|&p| p == id) {
                    state.processes.swap_remove(position);
                }
                state.ram.release(claim, None, now);
                state.cpu.release(claim, None, now);
            }
        }

        if self.processes[id.index()].cached() {
            if let Some(host) = self.processes[id.index()].host {
                let node = &mut self.nodes[host.index()];
                if let Some(position) = node.processes.iter().position(|&p| p == id) {
                    node.processes.swap_remove(position);
                }
                node.ram.release(claim, None, now);
                if let Some(position) = node.cpu.queue.iter().position(|&p| p == id) {
                    node.cpu.queue.swap_remove(position);
                }
                for (core_node, core) in self.processes[id.index()].executing_cores.clone() {
                    let core_state = &mut self.nodes[core_node.index()].cpu.cores[core];
                    if let Some(position) = core_state.processes.iter().position(|&p| p == id) {
                        core_state.processes.swap_remove(position);
                    }
                    core_state.computational_power.release(claim, None, now);
                }
                let state = &mut self.processes[id.index()];
                state.executing_cores.clear();
                state.entity.status.remove(Status::Executing);
            }
        }
    }

    // ---- packets ------------------------------------------------------

    fn packet_termination(&mut self, id: PacketId) {
        let now = self.now();
        let state = &self.packets[id.index()];
        let completed = state.entity.completed();
        let dropped = state.dropped();
        let current_hop = state.current_hop();
        let request = state.request;
        let completes_request = state.completes_request;

        if completed {
            if let Some(node) = current_hop {
                if !self.nodes[node.index()].is_gateway() {
                    self.nodes[node.index()]
                        .ram
                        .release(EntityRef::Packet(id), None, now);
                }
                let queue = &mut self.nodes[node.index()].packet_queue;
                if let Some(position) = queue.iter().position(|&p| p == id) {
                    queue.swap_remove(position);
                }
            }
        }
        if dropped {
            if let Some(request) = request {
                self.fail_request(request);
            }
        }

        // Terminal GET/LIST element: its delivery completes the request.
        if completes_request && completed {
            if let Some(request) = request {
                if !self.requests[request.index()].entity.failed() {
                    self.complete_request(request);
                }
            }
        }
    }

    // ---- requests and workflows ---------------------------------------

    pub(crate) fn complete_request(&mut self, request: RequestId) {
        if self.requests[request.index()].entity.completed() {
            return;
        }
        self.requests[request.index()]
            .entity
            .status
            .insert(Status::Completed);
        info!(request = %self.requests[request.index()].entity.label, "request completed");
        self.terminate(EntityRef::Request(request));
    }

    pub(crate) fn fail_request(&mut self, request: RequestId) {
        if self.requests[request.index()].entity.failed() {
            return;
        }
        self.requests[request.index()]
            .entity
            .status
            .insert(Status::Failed);
        info!(request = %self.requests[request.index()].entity.label, "request failed");
        self.terminate(EntityRef::Request(request));

        if let Some(flow) = self.requests[request.index()].flow {
            if !self.workflows[flow.index()].entity.failed() {
                self.fail_workflow(flow);
            }
        }
    }

    fn request_termination(&mut self, id: RequestId) {
        if self.requests[id.index()].entity.scheduled() {
            let endpoints = [
                self.requests[id.index()].source_endpoint,
                self.requests[id.index()].target_endpoint,
            ];
            for container in endpoints.into_iter().flatten() {
                let requests = &mut self.containers[container.index()].requests;
                if let Some(position) = requests.iter().position(|&r| r == id) {
                    requests.swap_remove(position);
                }
            }
        }
        self.nudge_request_scheduler();

        // Last request of the workflow: its completion completes the flow.
        let state = &self.requests[id.index()];
        if state.completes_workflow && state.entity.completed() {
            if let Some(flow) = state.flow {
                if !self.workflows[flow.index()].entity.failed() {
                    self.complete_workflow(flow);
                }
            }
        }
    }

    pub(crate) fn complete_workflow(&mut self, flow: WorkflowId) {
        if self.workflows[flow.index()].entity.completed() {
            return;
        }
        self.workflows[flow.index()]
            .entity
            .status
            .insert(Status::Completed);
        info!(workflow = %self.workflows[flow.index()].entity.label, "workflow completed");
        self.terminate(EntityRef::Workflow(flow));
    }

    pub(crate) fn fail_workflow(&mut self, flow: WorkflowId) {
        let entity = &self.workflows[flow.index()].entity;
        if entity.failed() || entity.terminated() {
            return;
        }
        self.workflows[flow.index()]
            .entity
            .status
            .insert(Status::Failed);
        info!(workflow = %self.workflows[flow.index()].entity.label, "workflow failed");
        self.terminate(EntityRef::Workflow(flow));
    }

    fn workflow_termination(&mut self, id: WorkflowId) {
        let user_request = self.workflows[id.index()].user_request;
        if self.workflows[id.index()].entity.completed() {
            self.complete_user_request(user_request);
        } else if self.workflows[id.index()].entity.failed() {
            self.user_request_attempt_failed(user_request);
        }
    }

    fn complete_user_request(&mut self, user_request: UserRequestId) {
        if self.user_requests[user_request.index()].entity.completed() {
            return;
        }
        self.user_requests[user_request.index()]
            .entity
            .status
            .insert(Status::Completed);
        info!(
            user_request = %self.user_requests[user_request.index()].entity.label,
            "user request completed"
        );
        self.terminate(EntityRef::UserRequest(user_request));
    }

    /// A workflow attempt failed: retry with a fresh workflow after the
    /// backoff, or fail the user request for good.
    fn user_request_attempt_failed(&mut self, user_request: UserRequestId) {
        let state = &self.user_requests[user_request.index()];
        if state.entity.terminated() {
            return;
        }
        if state.retry {
            let backoff = state.backoff.clone();
            let delay = backoff.sample(&mut self.rng);
            info!(
                user_request = %self.user_requests[user_request.index()].entity.label,
                backoff = delay,
                "workflow failed, user request retries"
            );
            self.schedule_in(delay, priority::CREATION, Action::InitWorkflow(user_request));
        } else {
            self.user_requests[user_request.index()]
                .entity
                .status
                .insert(Status::Failed);
            info!(
                user_request = %self.user_requests[user_request.index()].entity.label,
                "user request failed"
            );
            self.terminate(EntityRef::UserRequest(user_request));
        }
    }

    /// Spawn one workflow attempt, backing off while the SFC is not
    /// ready.
    pub(crate) fn init_workflow(&mut self, user_request: UserRequestId) {
        let state = &self.user_requests[user_request.index()];
        if state.entity.terminated() || state.entity.completed() {
            return;
        }
        let sfc = state.sfc;
        if !self.sfcs[sfc.index()].ready() {
            let backoff = state.backoff.clone();
            let delay = backoff.sample(&mut self.rng);
            debug!(
                user_request = %self.user_requests[user_request.index()].entity.label,
                backoff = delay,
                "SFC not ready, workflow initialization backs off"
            );
            self.schedule_in(delay, priority::CREATION, Action::InitWorkflow(user_request));
            return;
        }

        let id = WorkflowId(self.workflows.len() as u32);
        let state = &mut self.user_requests[user_request.index()];
        let label = format!("{}-F-{}", state.entity.label, state.flows.len());
        state.flows.push(id);
        let workflow = Workflow {
            entity: EntityCore::new(label),
            user: state.user,
            user_request,
            sfc,
            shape: state.shape.clone(),
            requests: Vec::new(),
        };
        self.workflows.push(workflow);
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::Workflow(id)));
        info!(
            user_request = %self.user_requests[user_request.index()].entity.label,
            workflow = %self.workflows[id.index()].entity.label,
            "workflow initialized"
        );
    }

    /// Materialize the workflow's ordered request chain along its SFC.
    /// Each request is created after its predecessor terminates.
    fn initialize_requests(&mut self, flow: WorkflowId) {
        let sfc = self.workflows[flow.index()].sfc;
        let user = self.workflows[flow.index()].user;
        let (entry, exit, path, internal) = {
            let state = &self.sfcs[sfc.index()];
            (state.entry, state.exit, state.path.clone(), state.internal)
        };

        let mut previous: Option<RequestId> = None;
        if let Some((microservice, kind)) = entry {
            if !internal {
                previous = Some(self.spawn_workflow_request(
                    flow,
                    Endpoint::User(user),
                    Endpoint::Microservice(microservice),
                    kind,
                    previous,
                ));
            }
        }
        for link in path {
            previous = Some(self.spawn_workflow_request(
                flow,
                Endpoint::Microservice(link.source),
                Endpoint::Microservice(link.target),
                link.kind,
                previous,
            ));
        }
        if let Some((microservice, kind)) = exit {
            if !internal {
                previous = Some(self.spawn_workflow_request(
                    flow,
                    Endpoint::Microservice(microservice),
                    Endpoint::User(user),
                    kind,
                    previous,
                ));
            }
        }

        if let Some(last) = previous {
            self.requests[last.index()].completes_workflow = true;
        }
        info!(workflow = %self.workflows[flow.index()].entity.label, "workflow requests initialized");
    }

    fn spawn_workflow_request(
        &mut self,
        flow: WorkflowId,
        source: Endpoint,
        target: Endpoint,
        kind: crate::entity::request::RequestKind,
        after: Option<RequestId>,
    ) -> RequestId {
        let id = RequestId(self.requests.len() as u32);
        let priority_value = {
            let shape = self.workflows[flow.index()].shape.clone();
            shape.priority.sample(&mut self.rng)
        };
        let label = format!(
            "{}-R-{}",
            self.workflows[flow.index()].entity.label,
            self.workflows[flow.index()].requests.len()
        );
        self.requests.push(crate::entity::request::Request::new(
            EntityCore::new(label),
            source,
            target,
            kind,
            Some(flow),
            priority_value,
        ));
        self.workflows[flow.index()].requests.push(id);

        let deps: Vec<EntityRef> = after.into_iter().map(EntityRef::Request).collect();
        let now = self.now();
        self.schedule_after(
            now,
            priority::CREATION,
            Action::Create(EntityRef::Request(id)),
            &deps,
        );
        id
    }

    // ---- microservices and SFCs ---------------------------------------

    /// Periodic evaluator tick: evaluate and re-arm while the
    /// microservice lives.
    pub(crate) fn evaluate_microservice_tick(&mut self, microservice: MicroserviceId) {
        if self.microservices[microservice.index()].entity.terminated() {
            return;
        }
        self.evaluate_microservice(microservice);
        let interval = self.microservices[microservice.index()].evaluation_interval;
        self.schedule_in(
            interval,
            priority::MICROSERVICE_EVALUATION,
            Action::EvaluateMicroservice(microservice),
        );
    }

    /// Readiness plus horizontal scaling, gated by the cooldown.
    pub(crate) fn evaluate_microservice(&mut self, microservice: MicroserviceId) {
        if self.microservices[microservice.index()].entity.terminated() {
            return;
        }
        let now = self.now();
        let containers = self.microservices[microservice.index()].containers.clone();
        let scheduled = containers
            .iter()
            .filter(|&&c| self.containers[c.index()].entity.scheduled())
            .count();
        let min = self.microservices[microservice.index()].min_containers;
        let max = self.microservices[microservice.index()].max_containers;

        let was_ready = self.microservices[microservice.index()].ready();
        if scheduled >= min {
            if !was_ready {
                self.microservices[microservice.index()]
                    .entity
                    .status
                    .insert(Status::Ready);
                info!(
                    microservice = %self.microservices[microservice.index()].entity.label,
                    "microservice ready"
                );
            }
        } else if was_ready {
            self.microservices[microservice.index()]
                .entity
                .status
                .remove(Status::Ready);
            info!(
                microservice = %self.microservices[microservice.index()].entity.label,
                scheduled,
                min,
                "microservice no longer ready"
            );
        }

        for index in 0..self.sfcs.len() {
            if !self.sfcs[index].ready() {
                self.evaluate_sfc(SfcId(index as u32));
            }
        }

        let cpu_usage = self.microservice_cpu_usage(microservice);
        let ram_usage = self.microservice_ram_usage(microservice);
        let scaling = self.microservices[microservice.index()].scaling.clone();
        let cooling = self.microservices[microservice.index()].cooling_down(now);

        if cpu_usage > scaling.cpu_upper_bound || ram_usage > scaling.ram_upper_bound {
            let unscheduled = containers
                .iter()
                .filter(|&&c| !self.containers[c.index()].entity.scheduled())
                .count();
            if containers.len() < max && unscheduled == 0 && !cooling {
                let state = &mut self.microservices[microservice.index()];
                let label = format!("{}-{}", state.entity.label, state.spawned);
                state.spawned += 1;
                state.last_scale_at = Some(now);
                let templates = state.spec.volumes.clone();
                let spawned = self.spawn_container(microservice, label, &templates);
                info!(
                    microservice = %self.microservices[microservice.index()].entity.label,
                    container = %self.containers[spawned.index()].entity.label,
                    "scaled up"
                );
            }
        } else if cpu_usage < scaling.cpu_lower_bound && ram_usage < scaling.ram_lower_bound {
            if containers.len() > min && !cooling {
                let candidate = containers
                    .iter()
                    .copied()
                    .min_by_key(|&c| self.containers[c.index()].processes.len());
                if let Some(candidate) = candidate {
                    if self.containers[candidate.index()].requests.is_empty() {
                        self.microservices[microservice.index()].last_scale_at = Some(now);
                        info!(
                            microservice = %self.microservices[microservice.index()].entity.label,
                            container = %self.containers[candidate.index()].entity.label,
                            "scaled down"
                        );
                        self.terminate(EntityRef::Container(candidate));
                    } else if !containers
                        .iter()
                        .any(|&c| self.containers[c.index()].cordoned())
                    {
                        self.containers[candidate.index()]
                            .entity
                            .status
                            .insert(Status::Cordon);
                        info!(
                            container = %self.containers[candidate.index()].entity.label,
                            "container cordoned"
                        );
                    }
                }
            }
        }
    }

    pub(crate) fn microservice_cpu_usage(&self, microservice: MicroserviceId) -> f64 {
        let containers = &self.microservices[microservice.index()].containers;
        if containers.is_empty() {
            return 0.0;
        }
        containers
            .iter()
            .map(|&c| self.containers[c.index()].cpu.utilization())
            .sum::<f64>()
            / containers.len() as f64
    }

    pub(crate) fn microservice_ram_usage(&self, microservice: MicroserviceId) -> f64 {
        let containers = &self.microservices[microservice.index()].containers;
        if containers.is_empty() {
            return 0.0;
        }
        containers
            .iter()
            .map(|&c| self.containers[c.index()].ram.utilization())
            .sum::<f64>()
            / containers.len() as f64
    }

    /// An SFC is ready when every participating microservice is.
    pub(crate) fn evaluate_sfc(&mut self, sfc: SfcId) {
        let ready = self.sfcs[sfc.index()]
            .microservices
            .iter()
            .all(|&ms| self.microservices[ms.index()].ready());
        let was_ready = self.sfcs[sfc.index()].ready();
        if ready && !was_ready {
            self.sfcs[sfc.index()].entity.status.insert(Status::Ready);
            info!(sfc = %self.sfcs[sfc.index()].entity.label, "SFC ready");
        } else if !ready && was_ready {
            self.sfcs[sfc.index()].entity.status.remove(Status::Ready);
        }
    }

    fn microservice_termination(&mut self, id: MicroserviceId) {
        for container in self.microservices[id.index()].containers.clone() {
            if !self.containers[container.index()].entity.terminated() {
                self.terminate(EntityRef::Container(container));
            }
        }
    }

    fn sfc_termination(&mut self, id: SfcId) {
        for microservice in self.sfcs[id.index()].microservices.clone() {
            if !self.microservices[microservice.index()].entity.terminated() {
                self.terminate(EntityRef::Microservice(microservice));
            }
        }
    }

    fn network_service_termination(&mut self, id: crate::entity::NetworkServiceId) {
        for microservice in self.network_services[id.index()].microservices.clone() {
            if !self.microservices[microservice.index()].entity.terminated() {
                self.terminate(EntityRef::Microservice(microservice));
            }
        }
        for index in 0..self.sfcs.len() {
            if self.sfcs[index].network_service == Some(id)
                && !self.sfcs[index].entity.terminated()
            {
                self.terminate(EntityRef::Sfc(SfcId(index as u32)));
            }
        }
    }
}
