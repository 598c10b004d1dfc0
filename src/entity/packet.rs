//! Packets: units of network transfer
//!
//! A packet follows the shortest path between two physical nodes hop by
//! hop. At each hop it holds RAM while queued, is decoded by a
//! packet-handler process, and then competes for link bandwidth to the
//! next hop. The hop index never regresses.

use crate::entity::{EntityCore, NodeId, RequestId};
use crate::status::Status;

#[derive(Debug)]
pub struct Packet {
    pub entity: EntityCore,
    pub source: NodeId,
    pub destination: NodeId,
    /// bytes, already amplified.
    pub size: u64,
    /// Shortest path, resolved at creation; source first.
    pub path: Vec<NodeId>,
    /// Index of the current hop within `path`.
    pub hop: usize,
    pub request: Option<RequestId>,
    /// Terminal element of a request expansion: completing it completes
    /// the request.
    pub completes_request: bool,
}

impl Packet {
    pub fn new(
        entity: EntityCore,
        source: NodeId,
        destination: NodeId,
        size: u64,
        request: Option<RequestId>,
    ) -> Self {
        Self {
            entity,
            source,
            destination,
            size,
            path: Vec::new(),
            hop: 0,
            request,
            completes_request: false,
        }
    }

    pub fn loopback(&self) -> bool {
        self.source == self.destination
    }

    pub fn current_hop(&self) -> Option<NodeId> {
        self.path.get(self.hop).copied()
    }

    pub fn next_hop(&self) -> Option<NodeId> {
        if self.hop + 1 < self.path.len() {
            Some(self.path[self.hop + 1])
        } else {
            // At the destination the next hop is the destination itself.
            self.path.last().copied()
        }
    }

    pub fn at_destination(&self) -> bool {
        self.hop + 1 >= self.path.len() && !self.path.is_empty()
    }

    /// Advance to `node`; the path index is monotonic.
    pub fn advance_to(&mut self, node: NodeId) {
        if let Some(position) = self.path.iter().position(|&n| n == node) {
            debug_assert!(position >= self.hop, "packet hop regressed");
            self.hop = position.max(self.hop);
        }
    }

    pub fn queued(&self) -> bool {
        self.entity.status.contains(Status::Queued)
    }

    pub fn decoded(&self) -> bool {
        self.entity.status.contains(Status::Decoded)
    }

    pub fn transmitting(&self) -> bool {
        self.entity.status.contains(Status::Transmitting)
    }

    pub fn dropped(&self) -> bool {
        self.entity.status.contains(Status::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_on_path(path: Vec<NodeId>) -> Packet {
        let mut packet = Packet::new(
            EntityCore::new("pkt".into()),
            path[0],
            *path.last().unwrap(),
            1500,
            None,
        );
        packet.path = path;
        packet
    }

    #[test]
    fn hop_advances_monotonically() {
        let mut packet = packet_on_path(vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(packet.current_hop(), Some(NodeId(0)));
        assert_eq!(packet.next_hop(), Some(NodeId(1)));

        packet.advance_to(NodeId(1));
        assert_eq!(packet.hop, 1);
        packet.advance_to(NodeId(0));
        assert_eq!(packet.hop, 1, "hop never regresses");

        packet.advance_to(NodeId(2));
        assert!(packet.at_destination());
        assert_eq!(packet.next_hop(), Some(NodeId(2)));
    }

    #[test]
    fn loopback_is_single_node_path() {
        let packet = packet_on_path(vec![NodeId(4)]);
        assert!(packet.at_destination());
    }
}
