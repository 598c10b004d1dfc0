//! Default control plane and core network
//!
//! Most drivers want the same skeleton: a bestfit scheduler with a
//! first-fit volume allocator and a power-saving provisioner, plus a
//! gateway fronted by a router that fans into one core switch hosts
//! attach to by default.

use crate::engine::Simulation;
use crate::entity::node::NodeSpec;
use crate::error::SimResult;
use crate::scheduler::PlacementStrategy;

impl Simulation {
    /// Install the default control plane: bestfit container scheduling,
    /// first-fit volume allocation, power-saving host provisioning.
    pub fn install_default_control_plane(&mut self, host_evaluation_interval: f64) -> SimResult<()> {
        self.set_container_scheduler(PlacementStrategy::BestFit, false);
        self.set_volume_allocator(false);
        self.set_host_provisioner(true, host_evaluation_interval)?;
        self.set_request_scheduler();
        Ok(())
    }

    /// Stand up the core network: gateway <-> gateway router <-> core
    /// switch. Hosts created afterwards attach to the core switch unless
    /// they name another one.
    pub fn bootstrap_core_network(&mut self, gateway_bandwidth_mib: u64) -> SimResult<()> {
        let gateway = self.add_gateway(Some("gateway".into()));

        let router_spec = NodeSpec {
            num_cpu_cores: 4,
            ipc: 1.0,
            frequency: 5000.0,
            ram: 16,
            ..NodeSpec::default()
        };
        let router = self.add_router(Some("gateway-router".into()), router_spec.clone(), None);
        self.connect_device(router, gateway, gateway_bandwidth_mib);

        let core_switch = self.add_switch(
            Some("core-switch".into()),
            router_spec,
            "192.168.0.0/24",
            None,
        )?;
        self.connect_device(router, core_switch, 1000);

        self.gateway = Some(gateway);
        self.gateway_router = Some(router);
        self.core_switch = Some(core_switch);
        Ok(())
    }

    pub fn gateway(&self) -> Option<crate::entity::NodeId> {
        self.gateway
    }

    pub fn gateway_router(&self) -> Option<crate::entity::NodeId> {
        self.gateway_router
    }

    pub fn core_switch(&self) -> Option<crate::entity::NodeId> {
        self.core_switch
    }
}
