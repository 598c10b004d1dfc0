//! Volume allocator: first-fit volume placement

use tracing::info;

use crate::engine::Simulation;
use crate::entity::{EntityRef, NodeId, VolumeId};

#[derive(Debug)]
pub struct VolumeAllocator {
    /// When set, a volume only lands on hosts with a matching taint.
    pub host_affinity: bool,
    pub pending: bool,
}

impl VolumeAllocator {
    pub fn new(host_affinity: bool) -> Self {
        Self {
            host_affinity,
            pending: false,
        }
    }
}

impl Simulation {
    /// One first-fit pass over every unallocated volume.
    pub(crate) fn allocate_volumes_pass(&mut self) {
        let affinity = match &mut self.volume_allocator {
            Some(allocator) => {
                allocator.pending = false;
                allocator.host_affinity
            }
            None => return,
        };

        let total = self.volumes.len();
        for index in 0..total {
            let volume = VolumeId(index as u32);
            let state = &self.volumes[index];
            if !state.entity.created() || state.allocated || state.entity.terminated() {
                continue;
            }
            let taint = state.taint.clone();
            let size = state.size as f64;

            let candidate = self.nodes.iter().enumerate().find_map(|(i, node)| {
                let ext = node.host()?;
                if !node.powered_on() {
                    return None;
                }
                if affinity && ext.taint != taint {
                    return None;
                }
                if node.rom.available() < size {
                    return None;
                }
                Some(NodeId(i as u32))
            });

            if let Some(host) = candidate {
                self.allocate_volume(host, volume);
            } else {
                info!(
                    volume = %self.volumes[index].entity.label,
                    "volume cannot be allocated, provisioning a host if possible"
                );
                self.provision_for_taint(taint);
            }
        }
    }

    pub(crate) fn allocate_volume(&mut self, host: NodeId, volume: VolumeId) {
        let now = self.now();
        let size = self.volumes[volume.index()].size as f64;
        let node = &mut self.nodes[host.index()];
        if node
            .rom
            .distribute(EntityRef::Volume(volume), size, now)
            .is_err()
        {
            return;
        }
        if let Some(ext) = node.host_mut() {
            ext.volumes.push(volume);
        }

        let state = &mut self.volumes[volume.index()];
        state.host = Some(host);
        state.allocated = true;
        info!(
            volume = %state.entity.label,
            host = %self.nodes[host.index()].entity.label,
            "volume allocated"
        );
        self.nudge_volume_allocator();
        self.nudge_container_scheduler();
    }
}
