//! Bestfit placement spreads a two-instance microservice over two hosts,
//! and a single user request runs its chain to completion.

mod common;

use cumulus::builder::{HostSpec, MicroserviceSpec, RequestSfcOptions};
use cumulus::entity::container::ContainerSpec;
use cumulus::entity::microservice::ScalingPolicy;
use cumulus::entity::request::RequestKind;
use cumulus::entity::service::LoadBalancerKind;
use cumulus::status::Status;
use cumulus::Knob;

fn two_host_cluster(sim: &mut cumulus::Simulation) -> Vec<cumulus::entity::NodeId> {
    (0..2)
        .map(|i| {
            sim.add_host(HostSpec {
                label: Some(format!("host-{i}")),
                num_cpu_cores: 1,
                frequency: 2000.0,
                ram: 4,
                rom: 32,
                ..HostSpec::default()
            })
        })
        .collect()
}

#[test]
fn post_chain_completes_over_distinct_hosts() {
    let mut sim = common::base_sim(7);
    let hosts = two_host_cluster(&mut sim);

    // Each instance asks for more than half a host's cores, so bestfit
    // has to spread the pair.
    let ms = sim
        .add_microservice(MicroserviceSpec {
            label: Some("api".into()),
            spec: ContainerSpec {
                cpu_request: 600,
                cpu_limit: 1000,
                ram_request: 512,
                ram_limit: 1024,
                image_size: 100,
                volumes: Vec::new(),
                daemon: false,
                taint: None,
            },
            min_containers: 2,
            max_containers: 3,
            evaluation_interval: 0.01,
            scaling: ScalingPolicy::default(),
            balancer: LoadBalancerKind::BestFit,
            ports: vec![8080],
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

    let user = sim.add_user(Some("alice".into()));
    let user_request = sim.request_sfc(
        user,
        sfc,
        RequestSfcOptions {
            process_length: Knob::Fixed(50),
            packet_size: Knob::Fixed(65_536),
            backoff: Knob::Fixed(0.1),
            ..RequestSfcOptions::default()
        },
    );

    sim.run(10.0).expect("run");

    // Both instances scheduled, on different hosts.
    let placements: Vec<_> = sim.microservices()[ms.index()]
        .containers
        .iter()
        .map(|&c| {
            let container = &sim.containers()[c.index()];
            assert!(container.entity.scheduled());
            container.host.expect("scheduled container has a host")
        })
        .collect();
    assert_eq!(placements.len(), 2);
    assert_ne!(placements[0], placements[1]);
    assert!(placements.iter().all(|h| hosts.contains(h)));

    assert!(sim.microservices()[ms.index()].ready());
    assert!(sim.sfcs()[sfc.index()].ready());

    // The request ran to completion and so did the user request.
    assert!(!sim.requests().is_empty());
    assert!(sim
        .requests()
        .iter()
        .all(|request| request.entity.status.contains(Status::Completed)));
    assert!(sim.user_requests()[user_request.index()]
        .entity
        .status
        .contains(Status::Completed));

    common::assert_invariants(&sim);
}

#[test]
fn load_balancer_only_returns_serving_containers() {
    let mut sim = common::base_sim(11);
    two_host_cluster(&mut sim);

    let ms = sim
        .add_microservice(MicroserviceSpec {
            label: Some("api".into()),
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
            max_containers: 2,
            evaluation_interval: 0.01,
            scaling: ScalingPolicy::default(),
            balancer: LoadBalancerKind::RoundRobin,
            ports: Vec::new(),
            at: None,
        })
        .expect("microservice");
    let sfc = sim
        .add_sfc(
            Some("fetch".into()),
            Some((ms, RequestKind::Get)),
            None,
            Vec::new(),
            None,
            false,
        )
        .expect("sfc");
    let user = sim.add_user(None);
    for _ in 0..4 {
        sim.request_sfc(
            user,
            sfc,
            RequestSfcOptions {
                backoff: Knob::Fixed(0.05),
                process_length: Knob::Fixed(20),
                ..RequestSfcOptions::default()
            },
        );
    }

    sim.run(10.0).expect("run");

    // Every endpoint the scheduler resolved was scheduled, uncordoned
    // and alive at resolution time; terminated-later is fine, but a
    // never-scheduled container must never appear.
    for request in sim.requests() {
        for endpoint in [request.source_endpoint, request.target_endpoint]
            .into_iter()
            .flatten()
        {
            assert!(sim.containers()[endpoint.index()].entity.scheduled());
        }
    }
    common::assert_invariants(&sim);
}
