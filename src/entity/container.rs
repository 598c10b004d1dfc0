//! Containers: the schedulable workload unit
//!
//! A container is admitted onto a host against requested quantities (the
//! host reservors) and bounded at runtime by its limits, which back the
//! CPU-time and RAM resources processes draw from.

use crate::entity::node::MIB;
use crate::entity::{EntityCore, MicroserviceId, NodeId, ProcessId, RequestId, VolumeId};
use crate::resource::Resource;
use crate::status::Status;

/// Template for the volumes a container instance mounts.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeTemplate {
    pub tag: String,
    pub path: String,
    /// MiB
    pub size: u64,
    pub retain: bool,
}

/// Per-instance resource shape of a container, shared with the owning
/// microservice.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Requested millicores; admission currency.
    pub cpu_request: u32,
    /// Millicore limit; runtime quota.
    pub cpu_limit: u32,
    /// Requested MiB; admission currency.
    pub ram_request: u64,
    /// MiB limit; runtime pool.
    pub ram_limit: u64,
    /// MiB
    pub image_size: u64,
    pub volumes: Vec<VolumeTemplate>,
    pub daemon: bool,
    pub taint: Option<String>,
}

#[derive(Debug)]
pub struct Container {
    pub entity: EntityCore,
    pub cpu_request: u32,
    /// CPU-time pool in millicore-seconds, capacity = cpu_limit.
    pub cpu: Resource,
    pub ram_request: u64,
    /// bytes, capacity = ram_limit MiB.
    pub ram: Resource,
    /// bytes
    pub image_size: u64,
    pub microservice: MicroserviceId,
    pub host: Option<NodeId>,
    pub volumes: Vec<VolumeId>,
    pub processes: Vec<ProcessId>,
    pub requests: Vec<RequestId>,
    pub daemon: bool,
    pub taint: Option<String>,
}

impl Container {
    pub fn new(entity: EntityCore, spec: &ContainerSpec, microservice: MicroserviceId) -> Self {
        let label = entity.label.clone();
        Self {
            entity,
            cpu_request: spec.cpu_request,
            cpu: Resource::new(format!("{label}-cpu"), spec.cpu_limit as f64),
            ram_request: spec.ram_request,
            ram: Resource::new(format!("{label}-ram"), (spec.ram_limit * MIB) as f64),
            image_size: spec.image_size * MIB,
            microservice,
            host: None,
            volumes: Vec::new(),
            processes: Vec::new(),
            requests: Vec::new(),
            daemon: spec.daemon,
            taint: spec.taint.clone(),
        }
    }

    pub fn cordoned(&self) -> bool {
        self.entity.status.contains(Status::Cordon)
    }

    /// Eligible to receive load-balanced requests.
    pub fn serving(&self) -> bool {
        self.entity.scheduled() && !self.cordoned() && !self.entity.terminated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            cpu_request: 40,
            cpu_limit: 80,
            ram_request: 512,
            ram_limit: 1024,
            image_size: 100,
            volumes: Vec::new(),
            daemon: false,
            taint: None,
        }
    }

    #[test]
    fn limits_back_the_runtime_pools() {
        let container = Container::new(EntityCore::new("c0".into()), &spec(), MicroserviceId(0));
        assert_eq!(container.cpu.capacity(), 80.0);
        assert_eq!(container.ram.capacity(), 1024.0 * MIB as f64);
        assert_eq!(container.image_size, 100 * MIB);
    }

    #[test]
    fn cordoned_container_is_not_serving() {
        let mut container =
            Container::new(EntityCore::new("c0".into()), &spec(), MicroserviceId(0));
        container.entity.mark_scheduled(0.0);
        assert!(container.serving());
        container.entity.status.insert(Status::Cordon);
        assert!(!container.serving());
    }
}
