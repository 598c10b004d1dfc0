//! Request scheduler: endpoint resolution and request expansion
//!
//! Pending requests are dispatched in priority order. Each microservice
//! side resolves to a container through the service's load balancer; when
//! a required endpoint is unavailable the request stays pending for the
//! next pass. A scheduled request expands into its process/packet chain.

use tracing::{debug, info};

use crate::action::Action;
use crate::actor::priority;
use crate::engine::Simulation;
use crate::entity::process::{Process, ProcessKind};
use crate::entity::request::RequestKind;
use crate::entity::service::LoadBalancerKind;
use crate::entity::{
    ContainerId, Endpoint, EntityCore, EntityRef, MicroserviceId, NodeId, PacketId, ProcessId,
    RequestId,
};
use crate::error::{SimError, SimResult};

#[derive(Debug, Default)]
pub struct RequestScheduler {
    pub pending: bool,
}

impl RequestScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Simulation {
    /// One dispatch pass over pending requests, in priority order.
    pub(crate) fn schedule_requests_pass(&mut self) -> SimResult<()> {
        if let Some(scheduler) = &mut self.request_scheduler {
            scheduler.pending = false;
        }

        let mut pending: Vec<RequestId> = (0..self.requests.len() as u32)
            .map(RequestId)
            .filter(|id| {
                let request = &self.requests[id.index()];
                !request.entity.scheduled()
                    && request.entity.created()
                    && !request.entity.terminated()
            })
            .collect();
        pending.sort_by_key(|id| self.requests[id.index()].priority);
        debug!(count = pending.len(), "request scheduler pass");

        for request in pending {
            let (source, target) = {
                let state = &self.requests[request.index()];
                (state.source, state.target)
            };

            let source_endpoint = match source {
                Endpoint::Microservice(ms) => self.balance(ms),
                Endpoint::User(_) => None,
            };
            let target_endpoint = match target {
                Endpoint::Microservice(ms) => self.balance(ms),
                Endpoint::User(_) => None,
            };

            let source_missing =
                matches!(source, Endpoint::Microservice(_)) && source_endpoint.is_none();
            let target_missing =
                matches!(target, Endpoint::Microservice(_)) && target_endpoint.is_none();
            if source_missing || target_missing {
                debug!(
                    request = %self.requests[request.index()].entity.label,
                    "request not schedulable, endpoint unavailable"
                );
                continue;
            }

            let now = self.now();
            let flow = {
                let state = &mut self.requests[request.index()];
                state.entity.mark_scheduled(now);
                state.source_endpoint = source_endpoint;
                state.target_endpoint = target_endpoint;
                state.flow
            };
            // The first scheduled request stamps the workflow; later ones
            // must not overwrite it.
            if let Some(flow) = flow {
                let entity = &mut self.workflows[flow.index()].entity;
                if !entity.scheduled() {
                    entity.mark_scheduled(now);
                }
            }
            if let Some(container) = source_endpoint {
                self.accept_request(container, request);
            }
            if let Some(container) = target_endpoint {
                self.accept_request(container, request);
            }
            self.execute_request(request)?;
        }
        Ok(())
    }

    fn accept_request(&mut self, container: ContainerId, request: RequestId) {
        self.containers[container.index()].requests.push(request);
        debug!(
            container = %self.containers[container.index()].entity.label,
            request = %self.requests[request.index()].entity.label,
            "request accepted"
        );
    }

    /// Pick a serving container of the microservice per its service's
    /// load-balancing discipline; `None` defers the request.
    pub(crate) fn balance(&mut self, ms: MicroserviceId) -> Option<ContainerId> {
        let containers = self.microservices[ms.index()].containers.clone();
        let serving: Vec<ContainerId> = containers
            .iter()
            .copied()
            .filter(|&c| self.containers[c.index()].serving())
            .collect();
        if serving.is_empty() {
            return None;
        }
        match self.microservices[ms.index()].service.balancer {
            LoadBalancerKind::RoundRobin => {
                for _ in 0..containers.len() {
                    let pointer = self.microservices[ms.index()].service.pointer;
                    let candidate = containers[pointer % containers.len()];
                    self.microservices[ms.index()].service.pointer =
                        (pointer + 1) % containers.len();
                    if self.containers[candidate.index()].serving() {
                        return Some(candidate);
                    }
                }
                None
            }
            LoadBalancerKind::BestFit => serving.into_iter().min_by(|&a, &b| {
                let ka = self.balance_key(a);
                let kb = self.balance_key(b);
                ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
            }),
            LoadBalancerKind::WorstFit => serving.into_iter().max_by(|&a, &b| {
                let ka = self.balance_key(a);
                let kb = self.balance_key(b);
                ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
            }),
            LoadBalancerKind::Random => {
                let pick = self.rng.usize(..serving.len());
                Some(serving[pick])
            }
        }
    }

    fn balance_key(&self, container: ContainerId) -> (f64, f64) {
        let state = &self.containers[container.index()];
        (state.cpu.utilization(), state.ram.utilization())
    }

    /// Expand the request into its ordered process/packet chain.
    pub(crate) fn execute_request(&mut self, request: RequestId) -> SimResult<()> {
        let (kind, label, flow) = {
            let state = &self.requests[request.index()];
            (state.kind, state.entity.label.clone(), state.flow)
        };
        info!(request = %label, kind = kind.as_str(), "request executing");

        // Resolve the workflow knobs once per request.
        let (process_length, packet_size, num_packets) = match flow {
            Some(flow) => {
                let shape = self.workflows[flow.index()].shape.clone();
                (
                    shape.process_length.sample(&mut self.rng),
                    shape.packet_size.sample(&mut self.rng),
                    shape.num_packets.sample(&mut self.rng),
                )
            }
            None => (100, 65_536, 1),
        };

        let physical_source = self.physical_side(self.requests[request.index()].source_endpoint)?;
        let physical_target = self.physical_side(self.requests[request.index()].target_endpoint)?;

        match kind {
            // GET and LIST share the one-query / N-replies / one-ack shape.
            RequestKind::Get | RequestKind::List => self.expand_get(
                request,
                physical_source,
                physical_target,
                process_length,
                packet_size,
                num_packets,
            ),
            RequestKind::Post => self.expand_post(
                request,
                physical_source,
                physical_target,
                process_length,
                packet_size,
                num_packets,
            ),
        }
        Ok(())
    }

    /// The physical node behind one side: the endpoint container's host,
    /// or the gateway for a user side.
    fn physical_side(&self, endpoint: Option<ContainerId>) -> SimResult<NodeId> {
        match endpoint {
            Some(container) => {
                self.containers[container.index()]
                    .host
                    .ok_or(SimError::DanglingHandle {
                        kind: "host",
                        index: container.0,
                    })
            }
            None => self
                .gateway
                .ok_or_else(|| SimError::Config("no gateway for user-facing request".into())),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_get(
        &mut self,
        request: RequestId,
        physical_source: NodeId,
        physical_target: NodeId,
        process_length: u64,
        packet_size: u64,
        num_packets: u64,
    ) {
        let (source_endpoint, target_endpoint, source_is_user, target_is_user) = {
            let state = &self.requests[request.index()];
            (
                state.source_endpoint,
                state.target_endpoint,
                state.source_is_user(),
                state.target_is_user(),
            )
        };
        let label = self.requests[request.index()].entity.label.clone();

        let mut group: Vec<EntityRef> = Vec::new();
        if !source_is_user {
            let process = self.spawn_request_process(
                request,
                source_endpoint,
                process_length,
                format!("{label}-get"),
                &group,
                false,
            );
            group = vec![EntityRef::Process(process)];
        }

        let query = self.spawn_request_packet(
            request,
            physical_source,
            physical_target,
            packet_size,
            format!("{label}-get"),
            &group,
            false,
        );
        group = vec![EntityRef::Packet(query)];

        if !target_is_user {
            let process = self.spawn_request_process(
                request,
                target_endpoint,
                process_length,
                format!("{label}-reply"),
                &group,
                false,
            );
            group = vec![EntityRef::Process(process)];
        }

        let mut replies: Vec<EntityRef> = Vec::new();
        for _ in 0..num_packets {
            let reply = self.spawn_request_packet(
                request,
                physical_target,
                physical_source,
                packet_size,
                format!("{label}-reply"),
                &group,
                false,
            );
            replies.push(EntityRef::Packet(reply));
        }
        group = replies;

        if !source_is_user {
            let process = self.spawn_request_process(
                request,
                source_endpoint,
                process_length,
                format!("{label}-ack"),
                &group,
                false,
            );
            group = vec![EntityRef::Process(process)];
        }

        self.spawn_request_packet(
            request,
            physical_target,
            physical_source,
            packet_size,
            format!("{label}-ack"),
            &group,
            true,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_post(
        &mut self,
        request: RequestId,
        physical_source: NodeId,
        physical_target: NodeId,
        process_length: u64,
        packet_size: u64,
        num_packets: u64,
    ) {
        let (source_endpoint, target_endpoint, source_is_user, target_is_user) = {
            let state = &self.requests[request.index()];
            (
                state.source_endpoint,
                state.target_endpoint,
                state.source_is_user(),
                state.target_is_user(),
            )
        };
        let label = self.requests[request.index()].entity.label.clone();

        let mut group: Vec<EntityRef> = Vec::new();
        if !source_is_user {
            let process = self.spawn_request_process(
                request,
                source_endpoint,
                process_length,
                format!("{label}-post"),
                &group,
                false,
            );
            group = vec![EntityRef::Process(process)];
        }

        let mut posts: Vec<EntityRef> = Vec::new();
        for _ in 0..num_packets {
            let post = self.spawn_request_packet(
                request,
                physical_source,
                physical_target,
                packet_size,
                format!("{label}-post"),
                &group,
                false,
            );
            posts.push(EntityRef::Packet(post));
        }
        group = posts;

        if !target_is_user {
            let process = self.spawn_request_process(
                request,
                target_endpoint,
                process_length,
                format!("{label}-ack"),
                &group,
                false,
            );
            group = vec![EntityRef::Process(process)];
        }

        let mut acks: Vec<EntityRef> = Vec::new();
        for index in 0..num_packets {
            // When the source is a user, the last ack packet terminates
            // the request; otherwise a final source-side process does.
            let terminal = source_is_user && index + 1 == num_packets;
            let ack = self.spawn_request_packet(
                request,
                physical_target,
                physical_source,
                packet_size,
                format!("{label}-ack"),
                &group,
                terminal,
            );
            acks.push(EntityRef::Packet(ack));
        }
        group = acks;

        if !source_is_user {
            self.spawn_request_process(
                request,
                source_endpoint,
                process_length,
                format!("{label}-ack"),
                &group,
                true,
            );
        }
    }

    fn spawn_request_process(
        &mut self,
        request: RequestId,
        container: Option<ContainerId>,
        length: u64,
        label: String,
        after: &[EntityRef],
        completes_request: bool,
    ) -> ProcessId {
        let priority_value = self.requests[request.index()].priority;
        let id = ProcessId(self.processes.len() as u32);
        let mut process = Process::new(
            EntityCore::new(label),
            ProcessKind::Regular,
            length,
            priority_value,
            Some(request),
            container,
        );
        process.completes_request = completes_request;
        self.processes.push(process);
        self.requests[request.index()].processes.push(id);
        let now = self.now();
        self.schedule_after(
            now,
            priority::CREATION,
            Action::Create(EntityRef::Process(id)),
            after,
        );
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_request_packet(
        &mut self,
        request: RequestId,
        source: NodeId,
        destination: NodeId,
        size: u64,
        label: String,
        after: &[EntityRef],
        completes_request: bool,
    ) -> PacketId {
        let id = PacketId(self.packets.len() as u32);
        let amplified = size * self.config.packet_size_amplifier;
        let mut packet = crate::entity::packet::Packet::new(
            EntityCore::new(label),
            source,
            destination,
            amplified,
            Some(request),
        );
        packet.completes_request = completes_request;
        self.packets.push(packet);
        self.requests[request.index()].packets.push(id);
        let now = self.now();
        self.schedule_after(
            now,
            priority::CREATION,
            Action::Create(EntityRef::Packet(id)),
            after,
        );
        id
    }
}
