//! Telemetry export: every table lands as CSV with the expected schema.

mod common;

use cumulus::builder::{HostSpec, MicroserviceSpec, RequestSfcOptions};
use cumulus::entity::container::ContainerSpec;
use cumulus::entity::microservice::ScalingPolicy;
use cumulus::entity::request::RequestKind;
use cumulus::entity::service::LoadBalancerKind;
use cumulus::Knob;

#[test]
fn export_writes_all_tables_with_schema() {
    let mut sim = common::base_sim(3);
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
            Some("fetch".into()),
            Some((ms, RequestKind::Get)),
            None,
            Vec::new(),
            None,
            false,
        )
        .expect("sfc");
    let user = sim.add_user(None);
    sim.request_sfc(
        user,
        sfc,
        RequestSfcOptions {
            process_length: Knob::Fixed(20),
            backoff: Knob::Fixed(0.1),
            ..RequestSfcOptions::default()
        },
    );
    sim.enable_host_monitor(0.1);
    sim.enable_microservice_monitor(0.1);

    sim.run(5.0).expect("run");

    let dir = tempfile::tempdir().expect("tempdir");
    sim.export_telemetry(dir.path()).expect("export");

    let expect_header = |file: &str, header: &str| {
        let raw = std::fs::read_to_string(dir.path().join(file)).expect(file);
        assert_eq!(raw.lines().next(), Some(header), "{file} schema");
        assert!(raw.lines().count() > 1, "{file} has rows");
    };

    expect_header(
        "host.csv",
        "host_id,host_label,time,cpu_util,ram_util,rom_util,bw_in_util,bw_out_util,\
         num_containers,num_processes,power_usage",
    );
    expect_header(
        "microservice.csv",
        "ms,ms_id,time,cpu_util,ram_util,num_containers,num_scheduled_containers,\
         num_non_scheduled_containers",
    );
    expect_header(
        "packet.csv",
        "packet_id,packet_label,request_id,request_label,user_id,user_label,created_at,\
         scheduled_at,terminated_at,successful",
    );
    expect_header(
        "request.csv",
        "request_id,request_label,user_id,user_label,created_at,scheduled_at,terminated_at,\
         successful",
    );
    expect_header(
        "workflow.csv",
        "flow_id,flow_label,sfc_id,created_at,scheduled_at,terminated_at,successful",
    );
    expect_header(
        "user_request.csv",
        "user_request_id,user_request_label,sfc_id,created_at,scheduled_at,terminated_at,\
         successful",
    );

    common::assert_invariants(&sim);
}
