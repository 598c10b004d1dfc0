//! Power saving: a provisioned host powers back off once its last
//! container is gone, and the power-off cascades to CPU and NICs.

mod common;

use cumulus::builder::{HostSpec, MicroserviceSpec};
use cumulus::entity::container::ContainerSpec;
use cumulus::entity::microservice::ScalingPolicy;
use cumulus::entity::service::LoadBalancerKind;
use cumulus::entity::EntityRef;
use cumulus::status::Status;

#[test]
fn idle_provisioned_host_powers_off_with_its_periphery() {
    let mut sim = common::base_sim(5);
    let host = sim.add_host(HostSpec {
        label: Some("host-0".into()),
        num_cpu_cores: 2,
        frequency: 2000.0,
        ram: 4,
        rom: 32,
        ..HostSpec::default()
    });

    let ms = sim
        .add_microservice(MicroserviceSpec {
            label: Some("batch".into()),
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
            min_containers: 1,
            max_containers: 1,
            evaluation_interval: 0.01,
            scaling: ScalingPolicy::default(),
            balancer: LoadBalancerKind::BestFit,
            ports: Vec::new(),
            at: None,
        })
        .expect("microservice");

    sim.run(2.0).expect("placement phase");
    {
        let node = &sim.nodes()[host.index()];
        assert!(node.powered_on());
        assert!(node.host().map(|ext| ext.provisioned).unwrap_or(false));
        assert_eq!(node.host().map(|ext| ext.containers.len()), Some(1));
    }

    // Retire the workload; the next provisioner check finds the host
    // empty.
    sim.schedule_termination(EntityRef::Microservice(ms));
    sim.run(6.0).expect("power-down phase");

    let node = &sim.nodes()[host.index()];
    assert!(!node.powered_on());
    assert!(node.entity.status.contains(Status::PoweredOff));
    assert!(!node.cpu.powered_on);
    assert!(node.cpu.cores.iter().all(|core| !core.powered_on));
    for &nic in &node.nics {
        let nic = &sim.nics()[nic.index()];
        assert!(nic.entity.status.contains(Status::PoweredOff));
        assert!(!nic.entity.status.contains(Status::PoweredOn));
    }

    // The provisioned mark is sticky across the power cycle.
    assert!(node.host().map(|ext| ext.provisioned).unwrap_or(false));

    common::assert_invariants(&sim);
}
