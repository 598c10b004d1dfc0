//! Packet transport pipeline
//!
//! A packet holds RAM at each hop while queued, is decoded by a
//! per-hop handler process, then competes for NIC bandwidth toward its
//! next hop. The gateway is a RAM-less sink/source and spawns no
//! handlers. RAM exhaustion at any hop drops the packet.

use tracing::{debug, info};

use crate::action::Action;
use crate::actor::priority;
use crate::engine::Simulation;
use crate::entity::process::{Process, ProcessKind};
use crate::entity::{EntityCore, EntityRef, NicId, NodeId, PacketId, ProcessId};
use crate::status::Status;

impl Simulation {
    /// Queue a packet at a node: reserve RAM for the payload and the
    /// handler, then spawn the handler process that will decode it.
    ///
    /// An `Err` means the node could not take the packet; the caller
    /// drops it.
    pub(crate) fn cache_packet(
        &mut self,
        node_id: NodeId,
        packet: PacketId,
    ) -> crate::error::SimResult<()> {
        let now = self.now();
        let claim = EntityRef::Packet(packet);

        if self.nodes[node_id.index()].is_gateway() {
            self.cache_packet_at_gateway(node_id, packet);
            return Ok(());
        }

        // Loopback shortcut: no RAM, no handler, done on arrival.
        if self.packets[packet.index()].loopback() {
            let state = &mut self.packets[packet.index()];
            if !state.entity.scheduled() {
                state.entity.mark_scheduled(now);
            }
            state.entity.status.insert(Status::Queued);
            state.entity.status.insert(Status::Decoded);
            state.advance_to(node_id);
            self.complete_packet(packet);
            return Ok(());
        }

        let size = self.packets[packet.index()].size as f64;
        let delay = self.nodes[node_id.index()].delay;
        let handler_length =
            (delay * self.nodes[node_id.index()].cpu.single_core_capacity()) as u64;

        // Double debit: payload bytes while queued, handler instruction
        // length while decoding.
        self.nodes[node_id.index()].ram.distribute(claim, size, now)?;

        let handler = ProcessId(self.processes.len() as u32);
        let handler_claim = EntityRef::Process(handler);
        if let Err(err) = self.nodes[node_id.index()].ram.distribute(
            handler_claim,
            handler_length as f64,
            now,
        ) {
            self.nodes[node_id.index()].ram.release(claim, None, now);
            return Err(err);
        }

        {
            let state = &mut self.packets[packet.index()];
            if !state.entity.scheduled() {
                state.entity.mark_scheduled(now);
            }
            state.entity.status.insert(Status::Queued);
            state.advance_to(node_id);
        }
        self.nodes[node_id.index()].packet_queue.push(packet);

        // The handler inherits the packet's priority but not its request:
        // decoding happens even for packets whose request already failed.
        let handler_priority = self.packets[packet.index()]
            .request
            .map(|request| self.requests[request.index()].priority)
            .unwrap_or(0);
        let label = format!("{}-handler", self.packets[packet.index()].entity.label);
        let mut process = Process::new(
            EntityCore::new(label),
            ProcessKind::PacketHandler(packet),
            handler_length,
            handler_priority,
            None,
            None,
        );
        process.host = Some(node_id);
        self.processes.push(process);
        self.nodes[node_id.index()].processes.push(handler);
        self.schedule_now(priority::CREATION, Action::Create(EntityRef::Process(handler)));
        self.cache_process(node_id, handler);

        info!(
            node = %self.nodes[node_id.index()].entity.label,
            packet = %self.packets[packet.index()].entity.label,
            "packet cached"
        );
        Ok(())
    }

    /// The gateway skips RAM accounting and decoding.
    fn cache_packet_at_gateway(&mut self, node_id: NodeId, packet: PacketId) {
        let now = self.now();
        {
            let state = &mut self.packets[packet.index()];
            if !state.entity.scheduled() {
                state.entity.mark_scheduled(now);
            }
            state.entity.status.insert(Status::Queued);
            state.entity.status.insert(Status::Decoded);
            state.advance_to(node_id);
        }
        self.nodes[node_id.index()].packet_queue.push(packet);
        info!(
            node = %self.nodes[node_id.index()].entity.label,
            packet = %self.packets[packet.index()].entity.label,
            "packet cached"
        );
        if self.packets[packet.index()].at_destination() {
            self.complete_packet(packet);
        }
        self.nudge_send_packets(node_id);
    }

    /// Coalesced: at most one send-packets actor pending per node.
    pub(crate) fn nudge_send_packets(&mut self, node: NodeId) {
        let state = &mut self.nodes[node.index()];
        if !state.packet_scheduler_pending {
            state.packet_scheduler_pending = true;
            self.schedule_now(priority::HOST_SCHEDULE_PACKET, Action::SendPackets(node));
        }
    }

    /// One pass over the node's queue: every decoded, idle packet whose
    /// outgoing link has bandwidth for it starts transmitting.
    pub(crate) fn send_packets_pass(&mut self, node_id: NodeId) {
        self.nodes[node_id.index()].packet_scheduler_pending = false;

        let mut queue = self.nodes[node_id.index()].packet_queue.clone();
        if queue.is_empty() {
            return;
        }
        queue.sort_by_key(|&p| {
            self.packets[p.index()]
                .request
                .map(|request| self.requests[request.index()].priority)
                .unwrap_or(0)
        });
        debug!(
            node = %self.nodes[node_id.index()].entity.label,
            queued = queue.len(),
            "packet scheduling pass"
        );

        for packet in queue {
            let state = &self.packets[packet.index()];
            if !state.decoded() || state.entity.terminated() || state.transmitting() {
                continue;
            }
            let Some(next_hop) = state.next_hop() else {
                continue;
            };
            let Some((s_nic, d_nic)) = self.link_between(node_id, next_hop) else {
                continue;
            };
            let size = self.packets[packet.index()].size as f64;
            if self.nics[s_nic.index()].downlink.available() < size
                || self.nics[d_nic.index()].uplink.available() < size
            {
                continue;
            }
            let bandwidth = self.nics[s_nic.index()]
                .bandwidth
                .min(self.nics[d_nic.index()].bandwidth);
            let delay = self.packets[packet.index()].size as f64 / bandwidth as f64;
            self.start_transmission(node_id, packet, s_nic, d_nic, delay);
            info!(
                packet = %self.packets[packet.index()].entity.label,
                from = %self.nodes[node_id.index()].entity.label,
                to = %self.nodes[next_hop.index()].entity.label,
                "packet in transmission"
            );
        }
    }

    /// The NIC pair carrying the link between two adjacent nodes.
    fn link_between(&self, from: NodeId, to: NodeId) -> Option<(NicId, NicId)> {
        let s_nic = self.nodes[from.index()]
            .nics
            .iter()
            .copied()
            .find(|&nic| self.nics[nic.index()].connected_to == Some(to))?;
        let d_nic = self.nodes[to.index()]
            .nics
            .iter()
            .copied()
            .find(|&nic| self.nics[nic.index()].connected_to == Some(from))?;
        Some((s_nic, d_nic))
    }

    fn start_transmission(
        &mut self,
        node_id: NodeId,
        packet: PacketId,
        s_nic: NicId,
        d_nic: NicId,
        delay: f64,
    ) {
        let now = self.now();
        let claim = EntityRef::Packet(packet);
        let size = self.packets[packet.index()].size as f64;

        let _ = self.nics[s_nic.index()].downlink.distribute(claim, size, now);
        let _ = self.nics[d_nic.index()].uplink.distribute(claim, size, now);

        let queue = &mut self.nodes[node_id.index()].packet_queue;
        if let Some(position) = queue.iter().position(|&p| p == packet) {
            queue.swap_remove(position);
        }
        let state = &mut self.packets[packet.index()];
        state.entity.status.insert(Status::Transmitting);
        state.entity.status.remove(Status::Queued);

        self.schedule_in(
            delay,
            priority::CORE_EXECUTE_PROCESS,
            Action::PacketSent {
                nic: s_nic,
                packet,
            },
        );
        self.schedule_in(
            delay,
            priority::CORE_EXECUTE_PROCESS,
            Action::PacketReceived {
                nic: d_nic,
                packet,
            },
        );
    }

    /// The sender's side of a finished transmission: free the downlink
    /// and the payload RAM, then look for more work.
    pub(crate) fn packet_sent(&mut self, nic: NicId, packet: PacketId) {
        let now = self.now();
        let claim = EntityRef::Packet(packet);
        self.nics[nic.index()].downlink.release(claim, None, now);
        let node = self.nics[nic.index()].node;
        if !self.nodes[node.index()].is_gateway() {
            self.nodes[node.index()].ram.release(claim, None, now);
        }
        debug!(packet = %self.packets[packet.index()].entity.label, "packet sent");
        self.nudge_send_packets(node);
    }

    /// The receiver's side: free the uplink and hand the packet to the
    /// node, dropping it when the node's RAM cannot take it.
    pub(crate) fn packet_received(&mut self, nic: NicId, packet: PacketId) {
        let now = self.now();
        let claim = EntityRef::Packet(packet);
        self.nics[nic.index()].uplink.release(claim, None, now);
        {
            let state = &mut self.packets[packet.index()];
            state.entity.status.remove(Status::Transmitting);
            state.entity.status.remove(Status::Decoded);
        }
        let node = self.nics[nic.index()].node;
        if self.cache_packet(node, packet).is_err() {
            info!(
                packet = %self.packets[packet.index()].entity.label,
                node = %self.nodes[node.index()].entity.label,
                "packet dropped"
            );
            self.drop_packet(packet);
        }
    }

    /// A packet completes at its path's last node, unless its request
    /// already failed.
    pub(crate) fn complete_packet(&mut self, packet: PacketId) {
        if self.packets[packet.index()].entity.completed() {
            return;
        }
        let request_failed = self.packets[packet.index()]
            .request
            .map(|request| self.requests[request.index()].entity.failed())
            .unwrap_or(false);
        if !request_failed {
            self.packets[packet.index()]
                .entity
                .status
                .insert(Status::Completed);
        }
        info!(packet = %self.packets[packet.index()].entity.label, "packet reached destination");
        self.terminate(EntityRef::Packet(packet));
    }

    pub(crate) fn drop_packet(&mut self, packet: PacketId) {
        if self.packets[packet.index()].dropped() {
            return;
        }
        self.packets[packet.index()]
            .entity
            .status
            .insert(Status::Dropped);
        self.terminate(EntityRef::Packet(packet));
    }
}
