//! Failure paths: RAM-overload container crashes with recovery, and
//! packet drops on an exhausted host failing their request chain.

mod common;

use cumulus::builder::{HostSpec, MicroserviceSpec, RequestSfcOptions};
use cumulus::config::{Platform, SimConfig};
use cumulus::entity::container::{ContainerSpec, VolumeTemplate};
use cumulus::entity::microservice::ScalingPolicy;
use cumulus::entity::process::ProcessKind;
use cumulus::entity::request::RequestKind;
use cumulus::entity::service::LoadBalancerKind;
use cumulus::entity::sfc::SfcLink;
use cumulus::status::Status;
use cumulus::Knob;

/// A 2 MiB process footprint against a 1 MiB container limit: the
/// container crashes, its processes fail, the microservice recovers one
/// replacement and the retained volume survives the crash.
#[test]
fn ram_overload_crashes_and_recovers_container() {
    let config = SimConfig {
        platform: Platform::Arm,
        ram_amplifier: 1,
        ..SimConfig::default()
    };
    let mut sim = common::base_sim_with_config(config, 31);
    sim.add_host(HostSpec {
        label: Some("host-0".into()),
        num_cpu_cores: 2,
        frequency: 2000.0,
        ram: 4,
        rom: 32,
        ..HostSpec::default()
    });

    let ms = sim
        .add_microservice(MicroserviceSpec {
            label: Some("tiny".into()),
            spec: ContainerSpec {
                cpu_request: 100,
                cpu_limit: 1000,
                ram_request: 1,
                ram_limit: 1,
                image_size: 10,
                volumes: vec![VolumeTemplate {
                    tag: "data".into(),
                    path: "/data".into(),
                    size: 100,
                    retain: true,
                }],
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
    let sfc = sim
        .add_sfc(
            Some("ingest".into()),
            Some((ms, RequestKind::Post)),
            None,
            Vec::new(),
            None,
            false,
        )
        .expect("sfc");

    let user = sim.add_user(None);
    // ARM instructions are 4 bytes: this length is exactly 2 MiB.
    let user_request = sim.request_sfc(
        user,
        sfc,
        RequestSfcOptions {
            process_length: Knob::Fixed(2 * 1024 * 1024 / 4),
            packet_size: Knob::Fixed(1024),
            retry: false,
            backoff: Knob::Fixed(0.1),
            ..RequestSfcOptions::default()
        },
    );

    sim.run(10.0).expect("run");

    let crashed = &sim.containers()[0];
    assert!(crashed.entity.failed());
    assert!(crashed.entity.terminated());

    // Every process the crashed container hosted failed with it.
    let crashed_processes: Vec<_> = sim
        .processes()
        .iter()
        .filter(|p| p.kind == ProcessKind::Regular)
        .collect();
    assert!(!crashed_processes.is_empty());
    assert!(crashed_processes.iter().all(|p| p.entity.failed()));

    // Exactly one replacement, scheduled again.
    let containers = &sim.microservices()[ms.index()].containers;
    assert_eq!(containers.len(), 1);
    assert_ne!(containers[0].index(), 0);
    assert!(sim.containers()[containers[0].index()].entity.scheduled());

    // The retained volume was never re-created and now follows the
    // replacement.
    assert_eq!(sim.volumes().len(), 1);
    let volume = &sim.volumes()[0];
    assert!(volume.allocated);
    assert!(volume.attached);
    assert_eq!(volume.container.map(|c| c.index()), Some(containers[0].index()));

    // The cascade reached the top of the chain.
    assert!(sim.requests().iter().any(|r| r.entity.failed()));
    assert!(sim.workflows().iter().all(|w| w.entity.failed()));
    assert!(sim.user_requests()[user_request.index()]
        .entity
        .status
        .contains(Status::Failed));

    common::assert_invariants(&sim);
}

/// A packet bigger than the destination host's RAM is dropped on
/// arrival; its request fails and the user request retries with a fresh
/// workflow.
#[test]
fn oversized_packet_is_dropped_and_workflow_retries() {
    let mut sim = cumulus::Simulation::with_seed(SimConfig::default(), 47);
    sim.set_container_scheduler(cumulus::PlacementStrategy::BestFit, true);
    sim.set_volume_allocator(true);
    sim.set_host_provisioner(true, 1.0).expect("provisioner");
    sim.set_request_scheduler();
    sim.bootstrap_core_network(100_000).expect("core network");

    // A roomy sender and a starved receiver, pinned by taints.
    sim.add_host(HostSpec {
        label: Some("sender".into()),
        num_cpu_cores: 1,
        frequency: 2000.0,
        ram: 8,
        rom: 32,
        taint: Some("src".into()),
        bandwidth: 10_000,
        ..HostSpec::default()
    });
    sim.add_host(HostSpec {
        label: Some("receiver".into()),
        num_cpu_cores: 1,
        frequency: 2000.0,
        ram: 1,
        rom: 32,
        taint: Some("dst".into()),
        bandwidth: 10_000,
        ..HostSpec::default()
    });

    let make_ms = |label: &str, taint: &str| MicroserviceSpec {
        label: Some(label.to_string()),
        spec: ContainerSpec {
            cpu_request: 100,
            cpu_limit: 500,
            ram_request: 128,
            ram_limit: 4096,
            image_size: 50,
            volumes: Vec::new(),
            daemon: false,
            taint: Some(taint.to_string()),
        },
        min_containers: 1,
        max_containers: 1,
        evaluation_interval: 0.01,
        scaling: ScalingPolicy::default(),
        balancer: LoadBalancerKind::BestFit,
        ports: Vec::new(),
        at: None,
    };
    let producer = sim.add_microservice(make_ms("producer", "src")).expect("producer");
    let consumer = sim.add_microservice(make_ms("consumer", "dst")).expect("consumer");

    let sfc = sim
        .add_sfc(
            Some("bulk-transfer".into()),
            None,
            None,
            vec![SfcLink {
                source: producer,
                target: consumer,
                kind: RequestKind::Post,
            }],
            None,
            true,
        )
        .expect("sfc");

    let user = sim.add_user(None);
    // 2 GiB payload against a 1 GiB receiver.
    let user_request = sim.request_sfc(
        user,
        sfc,
        RequestSfcOptions {
            packet_size: Knob::Fixed(2 * 1024 * 1024 * 1024),
            process_length: Knob::Fixed(10),
            backoff: Knob::Fixed(0.1),
            ..RequestSfcOptions::default()
        },
    );

    sim.run(10.0).expect("run");

    assert!(sim
        .packets()
        .iter()
        .any(|packet| packet.entity.status.contains(Status::Dropped)));
    assert!(sim.requests().iter().any(|r| r.entity.failed()));

    let flows = &sim.user_requests()[user_request.index()].flows;
    assert!(
        flows.len() >= 2,
        "retry should have spawned a fresh workflow, got {}",
        flows.len()
    );
    assert!(!sim.user_requests()[user_request.index()]
        .entity
        .status
        .contains(Status::Completed));

    common::assert_invariants(&sim);
}
