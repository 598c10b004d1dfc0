//! A cluster with no users stays dark: nothing flows and no host powers
//! on without being asked.

mod common;

use cumulus::builder::HostSpec;

#[test]
fn idle_cluster_generates_no_traffic() {
    let mut sim = common::base_sim(1);
    let hosts: Vec<_> = (0..2)
        .map(|i| {
            sim.add_host(HostSpec {
                label: Some(format!("host-{i}")),
                num_cpu_cores: 2,
                frequency: 2000.0,
                ram: 4,
                rom: 32,
                ..HostSpec::default()
            })
        })
        .collect();
    sim.enable_host_monitor(0.1);

    sim.run(10.0).expect("run");

    assert!(sim.packets().is_empty());
    assert!(sim.requests().is_empty());
    assert!(sim.workflows().is_empty());

    for host in &hosts {
        let node = &sim.nodes()[host.index()];
        assert!(!node.powered_on(), "{} powered on unasked", node.entity.label);
        assert!(node.host().map(|ext| !ext.provisioned).unwrap_or(false));
    }

    assert!(!sim.host_samples().is_empty());
    for sample in sim.host_samples() {
        assert_eq!(sample.num_containers, 0);
        assert_eq!(sample.num_processes, 0);
        assert_eq!(sample.cpu_util, 0.0);
    }

    common::assert_invariants(&sim);
}

#[test]
fn placing_a_workload_provisions_a_host() {
    let mut sim = common::base_sim(2);
    let host = sim.add_host(HostSpec {
        label: Some("host-0".into()),
        ram: 4,
        rom: 32,
        ..HostSpec::default()
    });
    // A microservice forces the provisioner's hand.
    let spec = common_ms_spec("solo", 1, 1);
    sim.add_microservice(spec).expect("microservice");

    sim.run(5.0).expect("run");

    let node = &sim.nodes()[host.index()];
    assert!(node.powered_on());
    assert!(node.host().map(|ext| ext.provisioned).unwrap_or(false));
    common::assert_invariants(&sim);
}

fn common_ms_spec(label: &str, min: usize, max: usize) -> cumulus::MicroserviceSpec {
    use cumulus::entity::container::ContainerSpec;
    use cumulus::entity::microservice::ScalingPolicy;
    use cumulus::entity::service::LoadBalancerKind;

    cumulus::MicroserviceSpec {
        label: Some(label.to_string()),
        spec: ContainerSpec {
            cpu_request: 100,
            cpu_limit: 200,
            ram_request: 128,
            ram_limit: 512,
            image_size: 100,
            volumes: Vec::new(),
            daemon: false,
            taint: None,
        },
        min_containers: min,
        max_containers: max,
        evaluation_interval: 0.01,
        scaling: ScalingPolicy::default(),
        balancer: LoadBalancerKind::BestFit,
        ports: Vec::new(),
        at: None,
    }
}
