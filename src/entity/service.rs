//! Services: the virtual IP and load balancer in front of a microservice

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Load-balancing discipline of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerKind {
    /// Rotating pointer over the container list.
    RoundRobin,
    /// Lowest CPU, then RAM, utilization.
    BestFit,
    /// Highest CPU, then RAM, utilization.
    WorstFit,
    /// Uniform over serving containers.
    Random,
}

/// One service fronts one microservice with a single virtual IP drawn
/// from the simulation's virtual network pool.
#[derive(Debug)]
pub struct Service {
    pub label: String,
    pub ip: Ipv4Addr,
    pub ports: Vec<u16>,
    pub balancer: LoadBalancerKind,
    /// Round-robin rotation state.
    pub pointer: usize,
}

impl Service {
    pub fn new(label: String, ip: Ipv4Addr, ports: Vec<u16>, balancer: LoadBalancerKind) -> Self {
        Self {
            label,
            ip,
            ports,
            balancer,
            pointer: 0,
        }
    }
}
