//! A seven-service control-plane-style chain: one user-facing SFC plus
//! six internal ones, issued in order per user. Everything completes
//! within the horizon and no host is ever over-committed.

mod common;

use cumulus::builder::{HostSpec, MicroserviceSpec, RequestSfcOptions};
use cumulus::entity::container::ContainerSpec;
use cumulus::entity::microservice::ScalingPolicy;
use cumulus::entity::request::RequestKind;
use cumulus::entity::service::LoadBalancerKind;
use cumulus::entity::sfc::SfcLink;
use cumulus::entity::EntityRef;
use cumulus::status::Status;
use cumulus::Knob;

#[test]
fn chained_sfcs_complete_within_horizon() {
    let mut sim = common::base_sim(23);
    for i in 0..2 {
        sim.add_host(HostSpec {
            label: Some(format!("host-{i}")),
            num_cpu_cores: 1,
            frequency: 4000.0,
            ram: 4,
            rom: 64,
            ..HostSpec::default()
        });
    }

    let services: Vec<_> = (0..7)
        .map(|i| {
            sim.add_microservice(MicroserviceSpec {
                label: Some(format!("nf-{i}")),
                spec: ContainerSpec {
                    cpu_request: 200,
                    cpu_limit: 400,
                    ram_request: 256,
                    ram_limit: 512,
                    image_size: 100,
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
            .expect("microservice")
        })
        .collect();

    // One user-facing entry chain plus six internal hops.
    let entry_sfc = sim
        .add_sfc(
            Some("attach".into()),
            Some((services[0], RequestKind::Get)),
            None,
            Vec::new(),
            None,
            false,
        )
        .expect("entry sfc");
    let internal_sfcs: Vec<_> = (0..6)
        .map(|i| {
            sim.add_sfc(
                Some(format!("hop-{i}")),
                None,
                None,
                vec![SfcLink {
                    source: services[i],
                    target: services[i + 1],
                    kind: RequestKind::Post,
                }],
                None,
                true,
            )
            .expect("internal sfc")
        })
        .collect();

    let mut user_requests = Vec::new();
    for u in 0..2 {
        let user = sim.add_user(Some(format!("user-{u}")));
        let options = RequestSfcOptions {
            process_length: Knob::Fixed(10),
            packet_size: Knob::Fixed(1024),
            backoff: Knob::Fixed(0.1),
            ..RequestSfcOptions::default()
        };
        let mut previous = sim.request_sfc(user, entry_sfc, options.clone());
        user_requests.push(previous);
        for &sfc in &internal_sfcs {
            let chained = sim.request_sfc(
                user,
                sfc,
                RequestSfcOptions {
                    after: vec![EntityRef::UserRequest(previous)],
                    ..options.clone()
                },
            );
            user_requests.push(chained);
            previous = chained;
        }
    }

    sim.enable_host_monitor(0.01);
    sim.run(10.0).expect("run");

    assert!(!sim.workflows().is_empty());
    for workflow in sim.workflows() {
        assert!(
            workflow.entity.status.contains(Status::Completed),
            "workflow {} did not complete",
            workflow.entity.label
        );
    }
    for user_request in &user_requests {
        assert!(sim.user_requests()[user_request.index()]
            .entity
            .status
            .contains(Status::Completed));
    }

    for sample in sim.host_samples() {
        assert!(
            sample.cpu_util <= 1.0 + 1e-9,
            "{} over 100% cpu at {}",
            sample.host_label,
            sample.time
        );
    }

    common::assert_invariants(&sim);
}

/// Two endpoints of an internal chain landing on the same host exchange
/// loopback packets that never touch the fabric.
#[test]
fn same_host_chain_completes_via_loopback() {
    let mut sim = common::base_sim(29);
    sim.add_host(HostSpec {
        label: Some("host-0".into()),
        num_cpu_cores: 2,
        frequency: 4000.0,
        ram: 8,
        rom: 64,
        ..HostSpec::default()
    });

    let make_ms = |label: &str| MicroserviceSpec {
        label: Some(label.to_string()),
        spec: ContainerSpec {
            cpu_request: 100,
            cpu_limit: 400,
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
    };
    let a = sim.add_microservice(make_ms("svc-a")).expect("svc-a");
    let b = sim.add_microservice(make_ms("svc-b")).expect("svc-b");
    let sfc = sim
        .add_sfc(
            Some("local-hop".into()),
            None,
            None,
            vec![SfcLink {
                source: a,
                target: b,
                kind: RequestKind::Get,
            }],
            None,
            true,
        )
        .expect("sfc");

    let user = sim.add_user(None);
    let user_request = sim.request_sfc(
        user,
        sfc,
        RequestSfcOptions {
            process_length: Knob::Fixed(10),
            packet_size: Knob::Fixed(512),
            backoff: Knob::Fixed(0.1),
            ..RequestSfcOptions::default()
        },
    );

    sim.run(10.0).expect("run");

    assert!(sim.user_requests()[user_request.index()]
        .entity
        .status
        .contains(Status::Completed));
    // Loopback packets resolve to single-node paths.
    assert!(sim.packets().iter().all(|p| p.path.len() == 1));

    common::assert_invariants(&sim);
}
