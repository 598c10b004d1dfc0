//! Container scheduler: bin-packing containers onto hosts
//!
//! Candidate hosts are ordered by CPU utilization (RAM as tiebreaker) -
//! ascending for bestfit, descending for worstfit, shuffled for random -
//! and the first with enough reservor and ROM headroom wins. When no
//! powered-on host fits, the provisioner is asked to power one on.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::Simulation;
use crate::entity::{ContainerId, EntityRef, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    BestFit,
    WorstFit,
    Random,
}

#[derive(Debug)]
pub struct ContainerScheduler {
    pub strategy: PlacementStrategy,
    /// When set, a container only lands on hosts with a matching taint.
    pub host_affinity: bool,
    pub pending: bool,
}

impl ContainerScheduler {
    pub fn new(strategy: PlacementStrategy, host_affinity: bool) -> Self {
        Self {
            strategy,
            host_affinity,
            pending: false,
        }
    }
}

impl Simulation {
    /// One placement pass over every unscheduled container.
    pub(crate) fn schedule_containers_pass(&mut self) {
        if let Some(scheduler) = &mut self.container_scheduler {
            scheduler.pending = false;
        }
        let total = self.containers.len();
        for index in 0..total {
            let container = ContainerId(index as u32);
            let state = &self.containers[index];
            if state.entity.scheduled() || state.entity.terminated() {
                continue;
            }
            if !self.container_schedulable(container) {
                continue;
            }

            if let Some(host) = self.find_host_for(container) {
                self.allocate_container(host, container);
            }

            if !self.containers[index].entity.scheduled() {
                info!(
                    container = %self.containers[index].entity.label,
                    "container cannot be scheduled, provisioning a host if possible"
                );
                self.provision_for_taint(self.containers[index].taint.clone());
            }
        }
    }

    /// A container is schedulable once all its volumes are allocated.
    pub(crate) fn container_schedulable(&self, container: ContainerId) -> bool {
        self.containers[container.index()]
            .volumes
            .iter()
            .all(|&volume| self.volumes[volume.index()].allocated)
    }

    fn find_host_for(&mut self, container: ContainerId) -> Option<NodeId> {
        let (strategy, affinity) = {
            let scheduler = self.container_scheduler.as_ref()?;
            (scheduler.strategy, scheduler.host_affinity)
        };
        let taint = self.containers[container.index()].taint.clone();

        let mut candidates: Vec<(NodeId, f64, f64)> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| {
                let ext = node.host()?;
                if !node.powered_on() {
                    return None;
                }
                if affinity && ext.taint != taint {
                    return None;
                }
                Some((
                    NodeId(i as u32),
                    node.cpu.utilization(),
                    node.ram.utilization(),
                ))
            })
            .collect();

        match strategy {
            PlacementStrategy::BestFit => candidates.sort_by(|a, b| {
                (a.1, a.2)
                    .partial_cmp(&(b.1, b.2))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            PlacementStrategy::WorstFit => candidates.sort_by(|a, b| {
                (b.1, b.2)
                    .partial_cmp(&(a.1, a.2))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            PlacementStrategy::Random => self.rng.shuffle(&mut candidates),
        }

        let spec = &self.containers[container.index()];
        let (cpu_request, ram_request, image_size) =
            (spec.cpu_request as f64, spec.ram_request as f64, spec.image_size as f64);

        for (host, _, _) in candidates {
            let node = &self.nodes[host.index()];
            let Some(ext) = node.host() else { continue };
            if ext.cpu_reservor.available() >= cpu_request
                && ext.ram_reservor.available() >= ram_request
                && node.rom.available() >= image_size
            {
                debug!(
                    host = %node.entity.label,
                    container = %self.containers[container.index()].entity.label,
                    "found host for container"
                );
                return Some(host);
            }
        }
        None
    }

    /// Admit a container: reserve its requests and image, then bring up
    /// its daemon and re-evaluate the owning microservice.
    pub(crate) fn allocate_container(&mut self, host: NodeId, container: ContainerId) {
        let now = self.now();
        let claim = EntityRef::Container(container);
        let (cpu_request, ram_request, image_size) = {
            let state = &self.containers[container.index()];
            (
                state.cpu_request as f64,
                state.ram_request as f64,
                state.image_size as f64,
            )
        };

        let node = &mut self.nodes[host.index()];
        if node.rom.distribute(claim, image_size, now).is_err() {
            return;
        }
        let Some(ext) = node.host_mut() else { return };
        if ext.cpu_reservor.distribute(claim, cpu_request, now).is_err()
            || ext.ram_reservor.distribute(claim, ram_request, now).is_err()
        {
            return;
        }
        ext.containers.push(container);

        let state = &mut self.containers[container.index()];
        state.host = Some(host);
        state.entity.mark_scheduled(now);
        info!(
            container = %state.entity.label,
            host = %self.nodes[host.index()].entity.label,
            "container scheduled"
        );

        let microservice = state.microservice;
        self.init_daemon(container);
        self.evaluate_microservice(microservice);
        self.nudge_request_scheduler();
    }
}
