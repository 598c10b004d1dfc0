//! Declarative scenarios
//!
//! A scenario file describes a whole experiment: global configuration,
//! control plane flavor, physical fabric, microservices, service graphs,
//! chains and the user population with their request programs. The CLI
//! loads one, builds the [`Simulation`] and runs it to the horizon.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::builder::{HostSpec, MicroserviceSpec, RequestSfcOptions};
use crate::config::SimConfig;
use crate::engine::Simulation;
use crate::entity::container::{ContainerSpec, VolumeTemplate};
use crate::entity::microservice::ScalingPolicy;
use crate::entity::request::RequestKind;
use crate::entity::service::LoadBalancerKind;
use crate::entity::sfc::SfcLink;
use crate::entity::{MicroserviceId, SfcId};
use crate::error::{SimError, SimResult};
use crate::knob::{uniform_f64, uniform_u64, Knob};
use crate::scheduler::PlacementStrategy;

/// An integer knob: a fixed value or a uniform range.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum KnobSpec {
    Fixed(u64),
    Range { min: u64, max: u64 },
}

impl KnobSpec {
    fn to_knob(self) -> Knob<u64> {
        match self {
            KnobSpec::Fixed(value) => Knob::Fixed(value),
            KnobSpec::Range { min, max } => uniform_u64(min, max),
        }
    }
}

/// A float knob, used for retry backoff.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum BackoffSpec {
    Fixed(f64),
    Range { min: f64, max: f64 },
}

impl BackoffSpec {
    fn to_knob(self) -> Knob<f64> {
        match self {
            BackoffSpec::Fixed(value) => Knob::Fixed(value),
            BackoffSpec::Range { min, max } => uniform_f64(min, max),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub seed: Option<u64>,
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default)]
    pub control_plane: ControlPlane,
    #[serde(default = "default_gateway_bandwidth")]
    pub gateway_bandwidth: u64,
    #[serde(default)]
    pub hosts: Vec<HostScenario>,
    #[serde(default)]
    pub microservices: Vec<MicroserviceScenario>,
    #[serde(default)]
    pub network_services: Vec<NetworkServiceScenario>,
    #[serde(default)]
    pub sfcs: Vec<SfcScenario>,
    #[serde(default)]
    pub users: Vec<UserScenario>,
    #[serde(default)]
    pub monitors: MonitorScenario,
}

fn default_gateway_bandwidth() -> u64 {
    100_000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlPlane {
    #[serde(default = "default_strategy")]
    pub container_scheduler: PlacementStrategy,
    #[serde(default)]
    pub host_affinity: bool,
    #[serde(default = "default_true")]
    pub power_saving: bool,
    #[serde(default = "default_host_evaluation_interval")]
    pub host_evaluation_interval: f64,
}

fn default_strategy() -> PlacementStrategy {
    PlacementStrategy::BestFit
}

fn default_true() -> bool {
    true
}

fn default_host_evaluation_interval() -> f64 {
    1.0
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self {
            container_scheduler: default_strategy(),
            host_affinity: false,
            power_saving: true,
            host_evaluation_interval: default_host_evaluation_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostScenario {
    pub label: String,
    #[serde(default = "one")]
    pub count: usize,
    pub cpu_cores: usize,
    pub ipc: f64,
    pub frequency: f64,
    /// GiB
    pub ram: u64,
    /// GiB
    pub rom: u64,
    #[serde(default = "default_delay")]
    pub delay: f64,
    /// MiB/s toward the core switch.
    #[serde(default = "default_bandwidth")]
    pub bandwidth: u64,
    pub taint: Option<String>,
}

fn default_bandwidth() -> u64 {
    1000
}

fn one() -> usize {
    1
}

fn default_delay() -> f64 {
    0.01
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeScenario {
    pub tag: String,
    pub path: String,
    /// MiB
    pub size: u64,
    #[serde(default)]
    pub retain: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicroserviceScenario {
    pub label: String,
    /// Requested millicores per container.
    pub cpu: u32,
    pub cpu_limit: u32,
    /// Requested MiB per container.
    pub ram: u64,
    pub ram_limit: u64,
    /// MiB
    pub image_size: u64,
    #[serde(default)]
    pub volumes: Vec<VolumeScenario>,
    pub taint: Option<String>,
    #[serde(default)]
    pub daemon: bool,
    #[serde(default = "one")]
    pub min_containers: usize,
    #[serde(default = "default_max_containers")]
    pub max_containers: usize,
    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval: f64,
    #[serde(default = "default_balancer")]
    pub load_balancer: LoadBalancerKind,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub scaling: ScalingScenario,
}

fn default_max_containers() -> usize {
    3
}

fn default_evaluation_interval() -> f64 {
    0.01
}

fn default_balancer() -> LoadBalancerKind {
    LoadBalancerKind::BestFit
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingScenario {
    #[serde(default = "default_lower")]
    pub cpu_lower_bound: f64,
    #[serde(default = "default_upper")]
    pub cpu_upper_bound: f64,
    #[serde(default = "default_lower")]
    pub ram_lower_bound: f64,
    #[serde(default = "default_upper")]
    pub ram_upper_bound: f64,
    #[serde(default = "default_cool_down")]
    pub cool_down_period: f64,
}

fn default_lower() -> f64 {
    0.2
}

fn default_upper() -> f64 {
    0.8
}

fn default_cool_down() -> f64 {
    5.0
}

impl Default for ScalingScenario {
    fn default() -> Self {
        Self {
            cpu_lower_bound: default_lower(),
            cpu_upper_bound: default_upper(),
            ram_lower_bound: default_lower(),
            ram_upper_bound: default_upper(),
            cool_down_period: default_cool_down(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkServiceScenario {
    pub label: String,
    pub microservices: Vec<String>,
    #[serde(default)]
    pub links: Vec<(String, String)>,
    #[serde(default)]
    pub entry: Vec<String>,
    #[serde(default)]
    pub exit: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointScenario {
    pub microservice: String,
    pub request: RequestKind,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkScenario {
    pub source: String,
    pub target: String,
    pub request: RequestKind,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SfcScenario {
    pub label: String,
    pub entry: Option<EndpointScenario>,
    pub exit: Option<EndpointScenario>,
    #[serde(default)]
    pub path: Vec<LinkScenario>,
    pub network_service: Option<String>,
    #[serde(default)]
    pub internal: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserScenario {
    pub label: String,
    #[serde(default)]
    pub requests: Vec<UserRequestScenario>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRequestScenario {
    pub sfc: String,
    #[serde(default = "one")]
    pub count: usize,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub retry: bool,
    pub backoff: Option<BackoffSpec>,
    pub process_length: Option<KnobSpec>,
    pub packet_size: Option<KnobSpec>,
    pub num_packets: Option<KnobSpec>,
    #[serde(default)]
    pub at: f64,
    /// Chain onto the user's previous request in the list.
    #[serde(default)]
    pub after_previous: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorScenario {
    pub host_interval: Option<f64>,
    pub microservice_interval: Option<f64>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SimError::Scenario(format!("cannot read {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw).map_err(|e| SimError::Scenario(e.to_string()))
    }

    /// Build the simulation this scenario describes.
    pub fn build(&self) -> SimResult<Simulation> {
        self.config.validate()?;
        let seed = self.seed.unwrap_or(0);
        let mut sim = Simulation::with_seed(self.config.clone(), seed);

        sim.set_container_scheduler(
            self.control_plane.container_scheduler,
            self.control_plane.host_affinity,
        );
        sim.set_volume_allocator(self.control_plane.host_affinity);
        sim.set_host_provisioner(
            self.control_plane.power_saving,
            self.control_plane.host_evaluation_interval,
        )?;
        sim.set_request_scheduler();
        sim.bootstrap_core_network(self.gateway_bandwidth)?;

        for host in &self.hosts {
            for index in 0..host.count {
                let label = if host.count == 1 {
                    host.label.clone()
                } else {
                    format!("{}-{index}", host.label)
                };
                sim.add_host(HostSpec {
                    label: Some(label),
                    num_cpu_cores: host.cpu_cores,
                    ipc: host.ipc,
                    frequency: host.frequency,
                    ram: host.ram,
                    rom: host.rom,
                    delay: host.delay,
                    bandwidth: host.bandwidth,
                    taint: host.taint.clone(),
                    ..HostSpec::default()
                });
            }
        }

        let mut microservices: HashMap<&str, MicroserviceId> = HashMap::new();
        for ms in &self.microservices {
            let id = sim.add_microservice(MicroserviceSpec {
                label: Some(ms.label.clone()),
                spec: ContainerSpec {
                    cpu_request: ms.cpu,
                    cpu_limit: ms.cpu_limit,
                    ram_request: ms.ram,
                    ram_limit: ms.ram_limit,
                    image_size: ms.image_size,
                    volumes: ms
                        .volumes
                        .iter()
                        .map(|v| VolumeTemplate {
                            tag: v.tag.clone(),
                            path: v.path.clone(),
                            size: v.size,
                            retain: v.retain,
                        })
                        .collect(),
                    daemon: ms.daemon,
                    taint: ms.taint.clone(),
                },
                min_containers: ms.min_containers,
                max_containers: ms.max_containers,
                evaluation_interval: ms.evaluation_interval,
                scaling: ScalingPolicy {
                    cpu_lower_bound: ms.scaling.cpu_lower_bound,
                    cpu_upper_bound: ms.scaling.cpu_upper_bound,
                    ram_lower_bound: ms.scaling.ram_lower_bound,
                    ram_upper_bound: ms.scaling.ram_upper_bound,
                    cool_down_period: ms.scaling.cool_down_period,
                },
                balancer: ms.load_balancer,
                ports: ms.ports.clone(),
                at: None,
            })?;
            microservices.insert(&ms.label, id);
        }
        let resolve_ms = |name: &str| -> SimResult<MicroserviceId> {
            microservices
                .get(name)
                .copied()
                .ok_or_else(|| SimError::Scenario(format!("unknown microservice {name}")))
        };

        let mut network_services = HashMap::new();
        for ns in &self.network_services {
            let members = ns
                .microservices
                .iter()
                .map(|name| resolve_ms(name))
                .collect::<SimResult<Vec<_>>>()?;
            let links = ns
                .links
                .iter()
                .map(|(a, b)| Ok((resolve_ms(a)?, resolve_ms(b)?)))
                .collect::<SimResult<Vec<_>>>()?;
            let entry = ns
                .entry
                .iter()
                .map(|name| resolve_ms(name))
                .collect::<SimResult<Vec<_>>>()?;
            let exit = ns
                .exit
                .iter()
                .map(|name| resolve_ms(name))
                .collect::<SimResult<Vec<_>>>()?;
            let id =
                sim.add_network_service(Some(ns.label.clone()), members, links, entry, exit)?;
            network_services.insert(ns.label.as_str(), id);
        }

        let mut sfcs: HashMap<&str, SfcId> = HashMap::new();
        for sfc in &self.sfcs {
            let entry = sfc
                .entry
                .as_ref()
                .map(|e| Ok::<_, SimError>((resolve_ms(&e.microservice)?, e.request)))
                .transpose()?;
            let exit = sfc
                .exit
                .as_ref()
                .map(|e| Ok::<_, SimError>((resolve_ms(&e.microservice)?, e.request)))
                .transpose()?;
            let path = sfc
                .path
                .iter()
                .map(|link| {
                    Ok(SfcLink {
                        source: resolve_ms(&link.source)?,
                        target: resolve_ms(&link.target)?,
                        kind: link.request,
                    })
                })
                .collect::<SimResult<Vec<_>>>()?;
            let network_service = sfc
                .network_service
                .as_ref()
                .map(|name| {
                    network_services.get(name.as_str()).copied().ok_or_else(|| {
                        SimError::Scenario(format!("unknown network service {name}"))
                    })
                })
                .transpose()?;
            let id = sim.add_sfc(
                Some(sfc.label.clone()),
                entry,
                exit,
                path,
                network_service,
                sfc.internal,
            )?;
            sfcs.insert(&sfc.label, id);
        }

        for user in &self.users {
            let user_id = sim.add_user(Some(user.label.clone()));
            let mut previous = None;
            for request in &user.requests {
                let sfc = sfcs.get(request.sfc.as_str()).copied().ok_or_else(|| {
                    SimError::Scenario(format!("unknown SFC {}", request.sfc))
                })?;
                for _ in 0..request.count {
                    let mut options = RequestSfcOptions {
                        priority: Knob::Fixed(request.priority),
                        retry: request.retry,
                        at: Some(request.at),
                        ..RequestSfcOptions::default()
                    };
                    if let Some(backoff) = request.backoff {
                        options.backoff = backoff.to_knob();
                    }
                    if let Some(knob) = request.process_length {
                        options.process_length = knob.to_knob();
                    }
                    if let Some(knob) = request.packet_size {
                        options.packet_size = knob.to_knob();
                    }
                    if let Some(knob) = request.num_packets {
                        options.num_packets = knob.to_knob();
                    }
                    if request.after_previous {
                        options.after = previous.into_iter().collect();
                    }
                    let id = sim.request_sfc(user_id, sfc, options);
                    previous = Some(crate::entity::EntityRef::UserRequest(id));
                }
            }
        }

        if let Some(interval) = self.monitors.host_interval {
            sim.enable_host_monitor(interval);
        }
        if let Some(interval) = self.monitors.microservice_interval {
            sim.enable_microservice_monitor(interval);
        }
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
seed: 7
hosts:
  - label: edge
    count: 2
    cpu_cores: 2
    ipc: 1
    frequency: 2000
    ram: 16
    rom: 32
microservices:
  - label: frontend
    cpu: 40
    cpu_limit: 80
    ram: 512
    ram_limit: 1024
    image_size: 100
    min_containers: 2
sfcs:
  - label: fetch
    entry: {microservice: frontend, request: get}
users:
  - label: alice
    requests:
      - sfc: fetch
monitors:
  host_interval: 0.1
"#;

    #[test]
    fn minimal_scenario_builds() {
        let scenario: Scenario = serde_yaml::from_str(MINIMAL).unwrap();
        let sim = scenario.build().unwrap();
        assert_eq!(sim.config().accuracy, 4);
    }

    #[test]
    fn unknown_microservice_is_a_scenario_error() {
        let raw = r#"
sfcs:
  - label: broken
    entry: {microservice: ghost, request: get}
"#;
        let scenario: Scenario = serde_yaml::from_str(raw).unwrap();
        assert!(matches!(scenario.build(), Err(SimError::Scenario(_))));
    }

    #[test]
    fn shipped_core_network_scenario_builds() {
        let scenario =
            Scenario::from_path(Path::new("scenarios/core-network.yaml")).unwrap();
        let sim = scenario.build().unwrap();
        assert_eq!(sim.microservices().len(), 7);
        assert_eq!(sim.sfcs().len(), 7);
    }

    #[test]
    fn knob_specs_parse_both_shapes() {
        let fixed: KnobSpec = serde_yaml::from_str("100").unwrap();
        assert!(matches!(fixed, KnobSpec::Fixed(100)));
        let range: KnobSpec = serde_yaml::from_str("{min: 1, max: 9}").unwrap();
        assert!(matches!(range, KnobSpec::Range { min: 1, max: 9 }));
    }
}
