//! Driver API: declaring the simulated world
//!
//! These methods are the setup surface a driver uses before `run`:
//! physical fabric, microservices, service graphs, chains and users.
//! Configuration mistakes (invalid subnets, inconsistent SFC wiring,
//! exhausted IP pools) fail here; nothing fails at run time.

use std::net::Ipv4Addr;

use tracing::info;

use crate::action::Action;
use crate::actor::priority;
use crate::engine::Simulation;
use crate::entity::container::ContainerSpec;
use crate::entity::microservice::{Microservice, ScalingPolicy};
use crate::entity::network_service::NetworkService;
use crate::entity::nic::{Nic, NicKind};
use crate::entity::node::{HostExt, Node, NodeKind, NodeSpec, SwitchExt, MIB};
use crate::entity::request::RequestKind;
use crate::entity::service::{LoadBalancerKind, Service};
use crate::entity::sfc::{Sfc, SfcLink};
use crate::entity::user::{User, UserRequest, WorkloadShape};
use crate::entity::volume::Volume;
use crate::entity::{
    EntityCore, EntityRef, MicroserviceId, NetworkServiceId, NicId, NodeId, SfcId, UserId,
    UserRequestId, VolumeId,
};
use crate::error::{SimError, SimResult};
use crate::knob::{uniform_f64, Knob};
use crate::naming::label_or_random;
use crate::scheduler::{
    ContainerScheduler, HostProvisioner, PlacementStrategy, RequestScheduler, VolumeAllocator,
};

/// Host parameters for [`Simulation::add_host`].
#[derive(Debug, Clone)]
pub struct HostSpec {
    pub label: Option<String>,
    pub num_cpu_cores: usize,
    pub ipc: f64,
    /// MHz
    pub frequency: f64,
    /// GiB
    pub ram: u64,
    /// GiB
    pub rom: u64,
    pub delay: f64,
    pub taint: Option<String>,
    /// Switch to attach to; the core switch when absent.
    pub switch: Option<NodeId>,
    /// Link bandwidth toward the switch, MiB/s.
    pub bandwidth: u64,
    pub at: Option<f64>,
}

impl Default for HostSpec {
    fn default() -> Self {
        Self {
            label: None,
            num_cpu_cores: 1,
            ipc: 1.0,
            frequency: 1000.0,
            ram: 1,
            rom: 1,
            delay: 0.01,
            taint: None,
            switch: None,
            bandwidth: 1000,
            at: None,
        }
    }
}

/// Microservice parameters for [`Simulation::add_microservice`].
#[derive(Debug, Clone)]
pub struct MicroserviceSpec {
    pub label: Option<String>,
    pub spec: ContainerSpec,
    pub min_containers: usize,
    pub max_containers: usize,
    pub evaluation_interval: f64,
    pub scaling: ScalingPolicy,
    pub balancer: LoadBalancerKind,
    pub ports: Vec<u16>,
    pub at: Option<f64>,
}

/// Per-user-request knobs for [`Simulation::request_sfc`].
#[derive(Debug, Clone)]
pub struct RequestSfcOptions {
    pub priority: Knob<i64>,
    pub retry: bool,
    pub backoff: Knob<f64>,
    pub process_length: Knob<u64>,
    pub packet_size: Knob<u64>,
    pub num_packets: Knob<u64>,
    pub at: Option<f64>,
    /// Entities that must terminate before this user request is created.
    pub after: Vec<EntityRef>,
}

impl Default for RequestSfcOptions {
    fn default() -> Self {
        Self {
            priority: Knob::Fixed(0),
            retry: true,
            backoff: uniform_f64(0.0, 1.0),
            process_length: Knob::Fixed(100),
            packet_size: Knob::Fixed(65_536),
            num_packets: Knob::Fixed(1),
            at: None,
            after: Vec::new(),
        }
    }
}

impl Simulation {
    // ---- control plane installation -----------------------------------

    pub fn set_container_scheduler(&mut self, strategy: PlacementStrategy, host_affinity: bool) {
        self.container_scheduler = Some(ContainerScheduler::new(strategy, host_affinity));
    }

    pub fn set_volume_allocator(&mut self, host_affinity: bool) {
        self.volume_allocator = Some(VolumeAllocator::new(host_affinity));
    }

    pub fn set_host_provisioner(
        &mut self,
        power_saving: bool,
        evaluation_interval: f64,
    ) -> SimResult<()> {
        self.host_provisioner = Some(HostProvisioner::new(power_saving, evaluation_interval)?);
        Ok(())
    }

    pub fn set_request_scheduler(&mut self) {
        self.request_scheduler = Some(RequestScheduler::new());
    }

    // ---- physical fabric ----------------------------------------------

    pub fn add_host(&mut self, spec: HostSpec) -> NodeId {
        let label = label_or_random(spec.label.clone(), &mut self.rng);
        let ext = HostExt::new(&label, spec.num_cpu_cores, spec.ram, spec.taint.clone());
        let node_spec = NodeSpec {
            num_cpu_cores: spec.num_cpu_cores,
            ipc: spec.ipc,
            frequency: spec.frequency,
            ram: spec.ram,
            rom: spec.rom,
            delay: spec.delay,
            ..NodeSpec::default()
        };
        let id = self.push_node(label, NodeKind::Host(ext), &node_spec, spec.at);
        if let Some(switch) = spec.switch.or(self.core_switch) {
            self.connect_device(switch, id, spec.bandwidth);
        }
        id
    }

    pub fn add_switch(
        &mut self,
        label: Option<String>,
        spec: NodeSpec,
        subnet: &str,
        at: Option<f64>,
    ) -> SimResult<NodeId> {
        let subnet = subnet
            .parse()
            .map_err(|e| SimError::Config(format!("invalid switch subnet {subnet}: {e}")))?;
        let label = label_or_random(label, &mut self.rng);
        Ok(self.push_node(label, NodeKind::Switch(SwitchExt::new(subnet)), &spec, at))
    }

    pub fn add_router(&mut self, label: Option<String>, spec: NodeSpec, at: Option<f64>) -> NodeId {
        let label = label_or_random(label, &mut self.rng);
        self.push_node(label, NodeKind::Router, &spec, at)
    }

    pub fn add_gateway(&mut self, label: Option<String>) -> NodeId {
        let label = label_or_random(label, &mut self.rng);
        let id = self.push_node(label, NodeKind::Gateway, &NodeSpec::default(), None);
        self.gateway = Some(id);
        id
    }

    fn push_node(
        &mut self,
        label: String,
        kind: NodeKind,
        spec: &NodeSpec,
        at: Option<f64>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(
            EntityCore::new(label),
            kind,
            spec,
            self.config.cpu_acceleration,
        ));
        self.topology.add_node(id);
        let at = at.unwrap_or_else(|| self.now());
        self.schedule_at(at, priority::CREATION, Action::Create(EntityRef::Node(id)));
        id
    }

    /// Wire two devices together with the given link bandwidth (MiB/s).
    /// The NIC pair and the topology edges materialize under CREATION
    /// priority, so routing is stable before any packet resolves a path.
    pub fn connect_device(&mut self, a: NodeId, b: NodeId, bandwidth_mib: u64) {
        self.schedule_now(
            priority::CREATION,
            Action::ConnectDevice {
                a,
                b,
                bandwidth: bandwidth_mib * MIB,
            },
        );
    }

    pub(crate) fn connect_now(&mut self, a: NodeId, b: NodeId, bandwidth: u64) {
        let nic_a = self.attach_nic(a, b, bandwidth);
        let nic_b = self.attach_nic(b, a, bandwidth);
        self.assign_address(nic_a, b);
        self.assign_address(nic_b, a);
        self.topology.connect(a, b, bandwidth);
        info!(
            a = %self.nodes[a.index()].entity.label,
            b = %self.nodes[b.index()].entity.label,
            "devices connected"
        );
    }

    fn attach_nic(&mut self, node: NodeId, peer: NodeId, bandwidth: u64) -> NicId {
        let kind = match self.nodes[node.index()].kind {
            NodeKind::Host(_) | NodeKind::Router => NicKind::Interface,
            NodeKind::Switch(_) | NodeKind::Gateway => NicKind::Port,
        };
        let id = NicId(self.nics.len() as u32);
        let label = match kind {
            NicKind::Interface => format!(
                "{}-eth{}",
                self.nodes[node.index()].entity.label,
                self.nodes[node.index()].nics.len()
            ),
            NicKind::Port => format!(
                "{}-port{}",
                self.nodes[node.index()].entity.label,
                self.nodes[node.index()].nics.len()
            ),
        };
        let mut nic = Nic::new(EntityCore::new(label), node, Some(peer), bandwidth, kind);
        // NICs joining a powered-on node come up immediately.
        if self.nodes[node.index()].powered_on() {
            nic.entity.status.insert(crate::status::Status::PoweredOn);
        }
        self.nics.push(nic);
        self.nodes[node.index()].nics.push(id);
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::Nic(id)));
        id
    }

    /// Interface addressing: switch-attached interfaces draw from the
    /// switch subnet; a router port facing the gateway is unnumbered.
    fn assign_address(&mut self, nic: NicId, peer: NodeId) {
        if self.nics[nic.index()].kind != NicKind::Interface {
            return;
        }
        let address = match &mut self.nodes[peer.index()].kind {
            NodeKind::Switch(ext) => ext.take_address(),
            NodeKind::Gateway => Some(Ipv4Addr::UNSPECIFIED),
            _ => None,
        };
        self.nics[nic.index()].ip = address;
    }

    // ---- virtual workloads --------------------------------------------

    pub fn add_microservice(&mut self, spec: MicroserviceSpec) -> SimResult<MicroserviceId> {
        let label = label_or_random(spec.label.clone(), &mut self.rng);
        let ip = self.allocate_service_ip()?;
        let id = MicroserviceId(self.microservices.len() as u32);
        self.microservices.push(Microservice {
            entity: EntityCore::new(label.clone()),
            spec: spec.spec.clone(),
            min_containers: spec.min_containers,
            max_containers: spec.max_containers,
            evaluation_interval: spec.evaluation_interval,
            containers: Vec::new(),
            service: Service::new(format!("{label}-service"), ip, spec.ports.clone(), spec.balancer),
            scaling: spec.scaling.clone(),
            last_scale_at: None,
            spawned: 0,
        });

        for index in 0..spec.min_containers {
            let templates = spec.spec.volumes.clone();
            self.spawn_container(id, format!("{label}-{index}"), &templates);
        }
        self.microservices[id.index()].spawned = spec.min_containers;

        let at = spec.at.unwrap_or_else(|| self.now());
        self.schedule_at(
            at,
            priority::CREATION,
            Action::Create(EntityRef::Microservice(id)),
        );
        self.schedule_at(
            at,
            priority::MICROSERVICE_EVALUATION,
            Action::EvaluateMicroservice(id),
        );
        Ok(id)
    }

    /// One address per service, drawn sequentially from the virtual
    /// network pool.
    fn allocate_service_ip(&mut self) -> SimResult<Ipv4Addr> {
        let network = self.config.virtual_network;
        let base: u32 = network.network().into();
        let hosts = network.size().saturating_sub(2);
        if self.next_service_ip >= hosts {
            return Err(SimError::Config(format!(
                "virtual network {network} exhausted"
            )));
        }
        let address = Ipv4Addr::from(base + 1 + self.next_service_ip);
        self.next_service_ip += 1;
        Ok(address)
    }

    pub fn add_network_service(
        &mut self,
        label: Option<String>,
        microservices: Vec<MicroserviceId>,
        links: Vec<(MicroserviceId, MicroserviceId)>,
        entry: Vec<MicroserviceId>,
        exit: Vec<MicroserviceId>,
    ) -> SimResult<NetworkServiceId> {
        let label = label_or_random(label, &mut self.rng);
        for &ms in entry.iter().chain(exit.iter()) {
            if !microservices.contains(&ms) {
                return Err(SimError::InvalidNetworkService {
                    label,
                    reason: format!(
                        "{} is not part of the service graph",
                        self.microservices[ms.index()].entity.label
                    ),
                });
            }
        }
        let id = NetworkServiceId(self.network_services.len() as u32);
        self.network_services.push(NetworkService::new(
            EntityCore::new(label),
            microservices,
            links,
            entry,
            exit,
        ));
        self.schedule_now(
            priority::CREATION,
            Action::Create(EntityRef::NetworkService(id)),
        );
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_sfc(
        &mut self,
        label: Option<String>,
        entry: Option<(MicroserviceId, RequestKind)>,
        exit: Option<(MicroserviceId, RequestKind)>,
        path: Vec<SfcLink>,
        network_service: Option<NetworkServiceId>,
        internal: bool,
    ) -> SimResult<SfcId> {
        let label = label_or_random(label, &mut self.rng);

        if let (Some((entry_ms, _)), Some(first)) = (entry, path.first()) {
            if entry_ms != first.source {
                return Err(SimError::InvalidSfc {
                    label,
                    reason: "entry microservice does not open the path".into(),
                });
            }
        }
        if let (Some((exit_ms, _)), Some(last)) = (exit, path.last()) {
            if exit_ms != last.target {
                return Err(SimError::InvalidSfc {
                    label,
                    reason: "exit microservice does not close the path".into(),
                });
            }
        }
        if let Some(ns) = network_service {
            if let Some((entry_ms, _)) = entry {
                if !self.network_services[ns.index()].accepts_entry(entry_ms) {
                    return Err(SimError::InvalidSfc {
                        label,
                        reason: "entry is not an entry of the network service".into(),
                    });
                }
            }
            if let Some((exit_ms, _)) = exit {
                if !self.network_services[ns.index()].accepts_exit(exit_ms) {
                    return Err(SimError::InvalidSfc {
                        label,
                        reason: "exit is not an exit of the network service".into(),
                    });
                }
            }
        }
        let head_and_tail = if internal { (None, None) } else { (entry, exit) };
        if path.is_empty() && head_and_tail.0.is_none() && head_and_tail.1.is_none() {
            return Err(SimError::InvalidSfc {
                label,
                reason: "chain would expand to no requests".into(),
            });
        }

        let microservices = Sfc::participants(entry, exit, &path);
        let id = SfcId(self.sfcs.len() as u32);
        self.sfcs.push(Sfc {
            entity: EntityCore::new(label),
            entry,
            exit,
            path,
            network_service,
            internal,
            microservices,
        });
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::Sfc(id)));
        Ok(id)
    }

    pub fn add_user(&mut self, label: Option<String>) -> UserId {
        let label = label_or_random(label, &mut self.rng);
        let id = UserId(self.users.len() as u32);
        self.users.push(User {
            entity: EntityCore::new(label),
            user_requests: Vec::new(),
        });
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::User(id)));
        id
    }

    /// Issue a user request against an SFC.
    pub fn request_sfc(
        &mut self,
        user: UserId,
        sfc: SfcId,
        options: RequestSfcOptions,
    ) -> UserRequestId {
        let id = UserRequestId(self.user_requests.len() as u32);
        let label = format!(
            "U-{}-R-{}-SFC-{}",
            self.users[user.index()].entity.label,
            self.users[user.index()].user_requests.len(),
            self.sfcs[sfc.index()].entity.label
        );
        self.users[user.index()].user_requests.push(id);
        self.user_requests.push(UserRequest {
            entity: EntityCore::new(label),
            user,
            sfc,
            shape: WorkloadShape {
                priority: options.priority,
                process_length: options.process_length,
                packet_size: options.packet_size,
                num_packets: options.num_packets,
            },
            retry: options.retry,
            backoff: options.backoff,
            flows: Vec::new(),
        });
        let at = options.at.unwrap_or_else(|| self.now());
        self.schedule_after(
            at,
            priority::CREATION,
            Action::Create(EntityRef::UserRequest(id)),
            &options.after,
        );
        id
    }

    /// A standalone volume, placed by the allocator like any other.
    pub fn add_volume(
        &mut self,
        label: Option<String>,
        tag: &str,
        path: &str,
        size_mib: u64,
        retain: bool,
        taint: Option<String>,
    ) -> VolumeId {
        let label = label_or_random(label, &mut self.rng);
        let id = VolumeId(self.volumes.len() as u32);
        self.volumes.push(Volume::new(
            EntityCore::new(label),
            tag.to_string(),
            path.to_string(),
            size_mib,
            retain,
            taint,
        ));
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::Volume(id)));
        id
    }
}
