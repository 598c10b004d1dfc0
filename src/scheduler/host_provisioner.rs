//! Host provisioner: power management
//!
//! Provisioning a host is sticky: once powered on by the provisioner it
//! stays marked provisioned even across power cycles. With power saving
//! enabled, a recurring check powers the host back off when it has no
//! containers left.

use tracing::info;

use crate::action::Action;
use crate::actor::priority;
use crate::engine::Simulation;
use crate::entity::NodeId;
use crate::error::{SimError, SimResult};
use crate::status::Status;

#[derive(Debug)]
pub struct HostProvisioner {
    pub power_saving: bool,
    pub evaluation_interval: f64,
}

impl HostProvisioner {
    pub fn new(power_saving: bool, evaluation_interval: f64) -> SimResult<Self> {
        if evaluation_interval <= 0.0 {
            return Err(SimError::Config(
                "host provisioner evaluation interval must be greater than 0".into(),
            ));
        }
        Ok(Self {
            power_saving,
            evaluation_interval,
        })
    }
}

impl Simulation {
    /// Power a host on and mark it provisioned; both placement loops get
    /// nudged so stuck workloads can land on it. Provisioning a
    /// power-saved host wakes it back up; the provisioned mark itself is
    /// sticky.
    pub(crate) fn provision(&mut self, host: NodeId) {
        let Some(provisioner) = &self.host_provisioner else {
            return;
        };
        let power_saving = provisioner.power_saving;
        let interval = provisioner.evaluation_interval;

        let powered_on = self.nodes[host.index()].powered_on();
        {
            let node = &mut self.nodes[host.index()];
            let Some(ext) = node.host_mut() else { return };
            if powered_on || ext.provision_pending {
                return;
            }
            ext.provisioned = true;
            ext.provision_pending = true;
            node.entity.status.insert(Status::Provisioned);
        }

        self.power_on(host);
        self.nudge_container_scheduler();
        self.nudge_volume_allocator();
        if power_saving {
            self.schedule_in(interval, priority::HOST_EVALUATION, Action::EvaluateHost(host));
        }
    }

    /// Provision the first eligible powered-off host, taint-respecting
    /// when host affinity is enabled.
    pub(crate) fn provision_for_taint(&mut self, taint: Option<String>) {
        let affinity = self
            .container_scheduler
            .as_ref()
            .map(|scheduler| scheduler.host_affinity)
            .unwrap_or(false);
        let candidate = self.nodes.iter().enumerate().find_map(|(i, node)| {
            let ext = node.host()?;
            if node.powered_on() || ext.provision_pending {
                return None;
            }
            if affinity && ext.taint != taint {
                return None;
            }
            Some(NodeId(i as u32))
        });
        if let Some(host) = candidate {
            self.provision(host);
        }
    }

    /// Power-saving check: an idle provisioned host powers off, a busy
    /// one re-arms the check.
    pub(crate) fn evaluate_host(&mut self, host: NodeId) {
        let interval = match &self.host_provisioner {
            Some(provisioner) => provisioner.evaluation_interval,
            None => return,
        };
        let node = &self.nodes[host.index()];
        if !node.powered_on() {
            return;
        }
        let empty = node.host().map(|ext| ext.containers.is_empty()).unwrap_or(true);
        if empty {
            self.power_off(host);
        } else {
            self.schedule_in(interval, priority::HOST_EVALUATION, Action::EvaluateHost(host));
        }
    }

    pub(crate) fn power_on(&mut self, node: NodeId) {
        if !self.nodes[node.index()].powered_on() {
            self.schedule_now(priority::POWERING, Action::PowerOn(node));
        }
    }

    pub(crate) fn power_off(&mut self, node: NodeId) {
        if self.nodes[node.index()].powered_on() {
            self.schedule_now(priority::POWERING, Action::PowerOff(node));
        }
    }

    /// Power-on cascades to the CPU, its cores and every NIC.
    pub(crate) fn power_on_now(&mut self, node_id: NodeId) {
        let node = &mut self.nodes[node_id.index()];
        if node.powered_on() {
            return;
        }
        node.entity.status.insert(Status::PoweredOn);
        node.entity.status.remove(Status::PoweredOff);
        node.cpu.power_on();
        if let Some(ext) = node.host_mut() {
            ext.provision_pending = false;
        }
        info!(node = %node.entity.label, kind = node.kind_name(), "powered on");
        for nic in node.nics.clone() {
            let nic = &mut self.nics[nic.index()];
            nic.entity.status.insert(Status::PoweredOn);
            nic.entity.status.remove(Status::PoweredOff);
        }
    }

    /// Power-off cascades like power-on.
    pub(crate) fn power_off_now(&mut self, node_id: NodeId) {
        let node = &mut self.nodes[node_id.index()];
        if !node.powered_on() {
            return;
        }
        node.entity.status.remove(Status::PoweredOn);
        node.entity.status.insert(Status::PoweredOff);
        node.cpu.power_off();
        info!(node = %node.entity.label, kind = node.kind_name(), "powered off");
        for nic in node.nics.clone() {
            let nic = &mut self.nics[nic.index()];
            nic.entity.status.remove(Status::PoweredOn);
            nic.entity.status.insert(Status::PoweredOff);
        }
    }
}
