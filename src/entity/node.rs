//! Physical nodes: hosts, switches, routers and the gateway
//!
//! All four share the same chassis: a CPU, RAM/ROM byte pools, a packet
//! queue and NICs. Hosts additionally carry the admission reservors and
//! the resident containers/volumes; switches own an addressing subnet;
//! the gateway is a RAM-less packet sink/source at the cluster edge.

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

use crate::config::PowerModel;
use crate::entity::cpu::Cpu;
use crate::entity::{ContainerId, EntityCore, NicId, PacketId, ProcessId, VolumeId};
use crate::resource::Resource;

pub const GIB: u64 = 1 << 30;
pub const MIB: u64 = 1 << 20;

/// Host-only state.
#[derive(Debug)]
pub struct HostExt {
    /// Admission pool for container CPU requests, in millicores.
    pub cpu_reservor: Resource,
    /// Admission pool for container RAM requests, in MiB.
    pub ram_reservor: Resource,
    pub taint: Option<String>,
    pub containers: Vec<ContainerId>,
    pub volumes: Vec<VolumeId>,
    /// Sticky once the provisioner first powers the host on.
    pub provisioned: bool,
    /// A power-on actor is in flight.
    pub provision_pending: bool,
}

/// Switch-only state: the subnet its attached devices draw addresses
/// from.
#[derive(Debug)]
pub struct SwitchExt {
    pub subnet: Ipv4Network,
    /// Remaining usable addresses, consumed front to back.
    pub address_pool: Vec<Ipv4Addr>,
}

#[derive(Debug)]
pub enum NodeKind {
    Host(HostExt),
    Switch(SwitchExt),
    Router,
    Gateway,
}

/// A physical node of the topology.
#[derive(Debug)]
pub struct Node {
    pub entity: EntityCore,
    pub kind: NodeKind,
    pub cpu: Cpu,
    /// bytes
    pub ram: Resource,
    /// bytes
    pub rom: Resource,
    /// Packet processing delay in seconds; sizes the packet-handler
    /// process spawned per hop.
    pub delay: f64,
    pub idle_power: f64,
    pub ram_tdp: f64,
    pub nics: Vec<NicId>,
    /// Packets queued for decode/transmit on this node.
    pub packet_queue: Vec<PacketId>,
    pub processes: Vec<ProcessId>,
    /// Singleton flag: at most one send-packets actor pending.
    pub packet_scheduler_pending: bool,
}

/// Chassis parameters shared by all node constructors.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub num_cpu_cores: usize,
    pub ipc: f64,
    /// MHz
    pub frequency: f64,
    /// GiB
    pub ram: u64,
    /// GiB
    pub rom: u64,
    pub delay: f64,
    pub idle_power: f64,
    pub cpu_tdp: f64,
    pub ram_tdp: f64,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            num_cpu_cores: 1,
            ipc: 1.0,
            frequency: 1000.0,
            ram: 1,
            rom: 1,
            delay: 0.01,
            idle_power: 50.0,
            cpu_tdp: 125.0,
            ram_tdp: 50.0,
        }
    }
}

impl Node {
    pub fn new(entity: EntityCore, kind: NodeKind, spec: &NodeSpec, cpu_acceleration: u64) -> Self {
        let label = entity.label.clone();
        Self {
            entity,
            kind,
            cpu: Cpu::new(
                &label,
                spec.ipc,
                spec.frequency,
                spec.num_cpu_cores,
                spec.cpu_tdp,
                cpu_acceleration,
            ),
            ram: Resource::new(format!("{label}-ram"), (spec.ram * GIB) as f64),
            rom: Resource::new(format!("{label}-rom"), (spec.rom * GIB) as f64),
            delay: spec.delay,
            idle_power: spec.idle_power,
            ram_tdp: spec.ram_tdp,
            nics: Vec::new(),
            packet_queue: Vec::new(),
            processes: Vec::new(),
            packet_scheduler_pending: false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Host(_) => "host",
            NodeKind::Switch(_) => "switch",
            NodeKind::Router => "router",
            NodeKind::Gateway => "gateway",
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, NodeKind::Host(_))
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self.kind, NodeKind::Gateway)
    }

    pub fn host(&self) -> Option<&HostExt> {
        match &self.kind {
            NodeKind::Host(ext) => Some(ext),
            _ => None,
        }
    }

    pub fn host_mut(&mut self) -> Option<&mut HostExt> {
        match &mut self.kind {
            NodeKind::Host(ext) => Some(ext),
            _ => None,
        }
    }

    pub fn switch_mut(&mut self) -> Option<&mut SwitchExt> {
        match &mut self.kind {
            NodeKind::Switch(ext) => Some(ext),
            _ => None,
        }
    }

    pub fn powered_on(&self) -> bool {
        self.entity.status.contains(crate::status::Status::PoweredOn)
    }

    pub fn taint(&self) -> Option<&str> {
        self.host().and_then(|ext| ext.taint.as_deref())
    }

    /// Modelled draw in watts over the sampling window.
    pub fn power_usage(&self, window: f64, now: f64, model: PowerModel) -> f64 {
        let cpu_usage = self.cpu.utilization_in_past(window, now) * 100.0;
        let ram_usage = self.ram.utilization_in_past(window, now) * 100.0;
        match model {
            PowerModel::Log => {
                let cpu_power = (cpu_usage + 1.0).ln() / 100f64.ln() * self.cpu.tdp;
                let ram_power = (ram_usage + 1.0).ln() / 100f64.ln() * self.ram_tdp;
                cpu_power + ram_power + self.idle_power
            }
            PowerModel::Linear => {
                cpu_usage * self.cpu.tdp / 100.0 + ram_usage * self.ram_tdp / 100.0
                    + self.idle_power
            }
        }
    }
}

impl HostExt {
    pub fn new(label: &str, num_cpu_cores: usize, ram_gib: u64, taint: Option<String>) -> Self {
        Self {
            cpu_reservor: Resource::new(
                format!("{label}-cpu-reservor"),
                (num_cpu_cores * 1000) as f64,
            ),
            ram_reservor: Resource::new(format!("{label}-ram-reservor"), (ram_gib * 1024) as f64),
            taint,
            containers: Vec::new(),
            volumes: Vec::new(),
            provisioned: false,
            provision_pending: false,
        }
    }
}

impl SwitchExt {
    pub fn new(subnet: Ipv4Network) -> Self {
        // Skip the network address; hand out the rest in order.
        let address_pool = subnet.iter().skip(1).collect();
        Self {
            subnet,
            address_pool,
        }
    }

    pub fn take_address(&mut self) -> Option<Ipv4Addr> {
        if self.address_pool.is_empty() {
            None
        } else {
            Some(self.address_pool.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_reservors_scale_with_chassis() {
        let ext = HostExt::new("h", 4, 16, None);
        assert_eq!(ext.cpu_reservor.capacity(), 4000.0);
        assert_eq!(ext.ram_reservor.capacity(), 16.0 * 1024.0);
    }

    #[test]
    fn switch_hands_out_subnet_addresses_in_order() {
        let mut ext = SwitchExt::new("192.168.0.0/30".parse().unwrap());
        assert_eq!(ext.take_address(), Some(Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(ext.take_address(), Some(Ipv4Addr::new(192, 168, 0, 2)));
    }

    #[test]
    fn idle_host_draws_idle_power() {
        let node = Node::new(
            EntityCore::new("h0".into()),
            NodeKind::Host(HostExt::new("h0", 1, 1, None)),
            &NodeSpec::default(),
            1_000_000,
        );
        let power = node.power_usage(0.1, 1.0, PowerModel::Log);
        assert!((power - node.idle_power).abs() < 1e-9);
    }
}
