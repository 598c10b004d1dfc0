//! Shared fixtures and invariant checks for the integration scenarios.

use cumulus::config::SimConfig;
use cumulus::status::Status;
use cumulus::Simulation;

/// A simulation with the default control plane and core network.
pub fn base_sim(seed: u64) -> Simulation {
    base_sim_with_config(SimConfig::default(), seed)
}

pub fn base_sim_with_config(config: SimConfig, seed: u64) -> Simulation {
    let mut sim = Simulation::with_seed(config, seed);
    sim.install_default_control_plane(1.0)
        .expect("control plane");
    sim.bootstrap_core_network(100_000).expect("core network");
    sim
}

/// The properties that must hold after any run, whatever the scenario.
pub fn assert_invariants(sim: &Simulation) {
    for node in sim.nodes() {
        assert!(node.ram.conserved(), "{} RAM leaked", node.entity.label);
        assert!(node.rom.conserved(), "{} ROM leaked", node.entity.label);
        for core in &node.cpu.cores {
            assert!(
                core.computational_power.conserved(),
                "core budget leaked on {}",
                node.entity.label
            );
        }
        if let Some(ext) = node.host() {
            assert!(ext.cpu_reservor.conserved());
            assert!(ext.ram_reservor.conserved());
            // Admission never exceeds the reservor capacity.
            let reserved: f64 = ext
                .containers
                .iter()
                .map(|&c| sim.containers()[c.index()].cpu_request as f64)
                .sum();
            assert!(reserved <= ext.cpu_reservor.capacity() + 1e-6);
        }
    }

    for nic in sim.nics() {
        assert!(nic.uplink.conserved());
        assert!(nic.downlink.conserved());
    }

    for container in sim.containers() {
        assert!(container.cpu.conserved());
        assert!(container.ram.conserved());
    }

    for process in sim.processes() {
        assert!(
            process.progress + process.current_scheduled_length <= process.length,
            "{} over-scheduled",
            process.entity.label
        );
    }

    for packet in sim.packets() {
        if !packet.path.is_empty() {
            assert!(packet.hop < packet.path.len());
        }
    }

    for workflow in sim.workflows() {
        let completed = workflow.entity.status.contains(Status::Completed);
        let failed = workflow.entity.status.contains(Status::Failed);
        assert!(!(completed && failed), "workflow both completed and failed");
        if workflow.entity.terminated() {
            assert!(
                completed || failed,
                "terminated workflow with no outcome: {}",
                workflow.entity.label
            );
        }
    }
}
