//! Horizontal autoscaling: daemon load pushes a microservice to its
//! maximum, and an idle one is still bounded below by its minimum.

mod common;

use cumulus::builder::{HostSpec, MicroserviceSpec};
use cumulus::entity::container::ContainerSpec;
use cumulus::entity::microservice::ScalingPolicy;
use cumulus::entity::service::LoadBalancerKind;

fn cluster(sim: &mut cumulus::Simulation) {
    for i in 0..2 {
        sim.add_host(HostSpec {
            label: Some(format!("host-{i}")),
            num_cpu_cores: 2,
            frequency: 2000.0,
            ram: 8,
            rom: 64,
            ..HostSpec::default()
        });
    }
}

#[test]
fn daemon_load_scales_up_to_max_under_cooldown() {
    let mut sim = common::base_sim(13);
    cluster(&mut sim);

    let ms = sim
        .add_microservice(MicroserviceSpec {
            label: Some("worker".into()),
            spec: ContainerSpec {
                cpu_request: 200,
                cpu_limit: 400,
                ram_request: 256,
                ram_limit: 1024,
                image_size: 100,
                volumes: Vec::new(),
                daemon: true,
                taint: None,
            },
            min_containers: 1,
            max_containers: 3,
            evaluation_interval: 0.01,
            scaling: ScalingPolicy {
                cpu_upper_bound: 0.05,
                cpu_lower_bound: 0.01,
                ram_upper_bound: 0.99,
                ram_lower_bound: 0.0,
                cool_down_period: 2.0,
            },
            balancer: LoadBalancerKind::BestFit,
            ports: Vec::new(),
            at: None,
        })
        .expect("microservice");

    sim.run(12.0).expect("run");

    // Daemon CPU pressure crossed the upper bound on every evaluation,
    // but the cooldown spaced the scale events out; two of them fit the
    // horizon, which is exactly what max allows.
    assert_eq!(sim.microservices()[ms.index()].containers.len(), 3);
    assert!(sim.microservices()[ms.index()]
        .containers
        .iter()
        .all(|&c| sim.containers()[c.index()].entity.scheduled()));

    common::assert_invariants(&sim);
}

#[test]
fn idle_microservice_never_shrinks_below_min() {
    let mut sim = common::base_sim(17);
    cluster(&mut sim);

    let ms = sim
        .add_microservice(MicroserviceSpec {
            label: Some("idle".into()),
            spec: ContainerSpec {
                cpu_request: 100,
                cpu_limit: 200,
                ram_request: 128,
                ram_limit: 512,
                image_size: 50,
                volumes: Vec::new(),
                daemon: false,
                taint: None,
            },
            min_containers: 2,
            max_containers: 3,
            evaluation_interval: 0.01,
            scaling: ScalingPolicy {
                cool_down_period: 0.5,
                ..ScalingPolicy::default()
            },
            balancer: LoadBalancerKind::BestFit,
            ports: Vec::new(),
            at: None,
        })
        .expect("microservice");

    sim.run(5.0).expect("run");

    // Zero load keeps the scale-down trigger hot on every evaluation,
    // but min bounds it: both instances must survive.
    let containers = &sim.microservices()[ms.index()].containers;
    assert_eq!(containers.len(), 2);
    assert!(containers
        .iter()
        .all(|&c| !sim.containers()[c.index()].entity.terminated()));

    common::assert_invariants(&sim);
}
