//! Microservices: scalable container sets behind one service
//!
//! A microservice keeps between `min` and `max` container instances of a
//! shared spec, scaled by a periodic evaluator on CPU/RAM utilization
//! bounds and fronted by its service's load balancer. It is READY while
//! at least `min` instances are scheduled.

use crate::entity::container::ContainerSpec;
use crate::entity::service::Service;
use crate::entity::{ContainerId, EntityCore};
use crate::status::Status;

/// Horizontal autoscaling bounds, as utilization fractions.
#[derive(Debug, Clone)]
pub struct ScalingPolicy {
    pub cpu_lower_bound: f64,
    pub cpu_upper_bound: f64,
    pub ram_lower_bound: f64,
    pub ram_upper_bound: f64,
    /// Minimum gap between consecutive scale events.
    pub cool_down_period: f64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            cpu_lower_bound: 0.2,
            cpu_upper_bound: 0.8,
            ram_lower_bound: 0.2,
            ram_upper_bound: 0.8,
            cool_down_period: 5.0,
        }
    }
}

#[derive(Debug)]
pub struct Microservice {
    pub entity: EntityCore,
    pub spec: ContainerSpec,
    pub min_containers: usize,
    pub max_containers: usize,
    pub evaluation_interval: f64,
    pub containers: Vec<ContainerId>,
    pub service: Service,
    pub scaling: ScalingPolicy,
    pub last_scale_at: Option<f64>,
    /// Instances ever spawned; numbers replacement labels.
    pub spawned: usize,
}

impl Microservice {
    pub fn ready(&self) -> bool {
        self.entity.status.contains(Status::Ready)
    }

    /// The cooldown gate: true while a recent scale event still blocks
    /// another.
    pub fn cooling_down(&self, now: f64) -> bool {
        match self.last_scale_at {
            Some(at) => now - at < self.scaling.cool_down_period,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_gates_consecutive_scale_events() {
        let ms = Microservice {
            entity: EntityCore::new("ms".into()),
            spec: ContainerSpec {
                cpu_request: 50,
                cpu_limit: 100,
                ram_request: 128,
                ram_limit: 256,
                image_size: 100,
                volumes: Vec::new(),
                daemon: false,
                taint: None,
            },
            min_containers: 1,
            max_containers: 3,
            evaluation_interval: 0.01,
            containers: Vec::new(),
            service: Service::new(
                "ms-service".into(),
                std::net::Ipv4Addr::new(10, 0, 0, 1),
                Vec::new(),
                crate::entity::service::LoadBalancerKind::BestFit,
            ),
            scaling: ScalingPolicy::default(),
            last_scale_at: Some(10.0),
            spawned: 1,
        };
        assert!(ms.cooling_down(12.0));
        assert!(!ms.cooling_down(15.0));
    }
}
