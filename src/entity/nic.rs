//! Network interfaces
//!
//! A NIC connects one physical node to at most one peer. Bandwidth is
//! half-duplex in each direction: the uplink pool absorbs receives, the
//! downlink pool absorbs sends, each sized to the link bandwidth.

use std::net::Ipv4Addr;

use crate::entity::{EntityCore, NodeId};
use crate::resource::Resource;

/// Host and router NICs are addressable interfaces; switch and gateway
/// NICs are unaddressed ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicKind {
    Interface,
    Port,
}

#[derive(Debug)]
pub struct Nic {
    pub entity: EntityCore,
    pub node: NodeId,
    pub connected_to: Option<NodeId>,
    /// bytes/s
    pub bandwidth: u64,
    pub kind: NicKind,
    pub ip: Option<Ipv4Addr>,
    pub uplink: Resource,
    pub downlink: Resource,
}

impl Nic {
    pub fn new(
        entity: EntityCore,
        node: NodeId,
        connected_to: Option<NodeId>,
        bandwidth: u64,
        kind: NicKind,
    ) -> Self {
        let label = entity.label.clone();
        Self {
            entity,
            node,
            connected_to,
            bandwidth,
            kind,
            ip: None,
            uplink: Resource::new(format!("{label}-uplink"), bandwidth as f64),
            downlink: Resource::new(format!("{label}-downlink"), bandwidth as f64),
        }
    }

    /// Ports never expose an address, whatever was assigned.
    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self.kind {
            NicKind::Interface => self.ip,
            NicKind::Port => None,
        }
    }

    pub fn uplink_utilization_in_past(&self, window: f64, now: f64) -> f64 {
        self.uplink.utilization_in_past(window, now)
    }

    pub fn downlink_utilization_in_past(&self, window: f64, now: f64) -> f64 {
        self.downlink.utilization_in_past(window, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_hides_assigned_address() {
        let mut nic = Nic::new(
            EntityCore::new("port-0".into()),
            NodeId(0),
            None,
            1000,
            NicKind::Port,
        );
        nic.ip = Some(Ipv4Addr::new(192, 168, 0, 2));
        assert_eq!(nic.ip(), None);

        nic.kind = NicKind::Interface;
        assert_eq!(nic.ip(), Some(Ipv4Addr::new(192, 168, 0, 2)));
    }
}
