//! Telemetry monitors
//!
//! Two periodic samplers (hosts and microservices) append a row per
//! entity per interval during the run; four terminal collectors flatten
//! the packet/request/workflow/user-request populations after it. Every
//! table exports as CSV.

use std::path::Path;

use serde::Serialize;

use crate::action::Action;
use crate::actor::priority;
use crate::engine::Simulation;
use crate::entity::{MicroserviceId, NodeId, RequestId, UserId};
use crate::error::SimResult;
use crate::status::Status;

/// Monitor configuration and the periodic sample tables.
#[derive(Debug, Default)]
pub struct Monitors {
    pub host_interval: Option<f64>,
    pub microservice_interval: Option<f64>,
    pub host_rows: Vec<HostSample>,
    pub microservice_rows: Vec<MicroserviceSample>,
}

/// One infrastructure sample: utilization fractions over the sampling
/// window plus modelled power draw.
#[derive(Debug, Clone, Serialize)]
pub struct HostSample {
    pub host_id: u32,
    pub host_label: String,
    pub time: f64,
    pub cpu_util: f64,
    pub ram_util: f64,
    pub rom_util: f64,
    pub bw_in_util: f64,
    pub bw_out_util: f64,
    pub num_containers: usize,
    pub num_processes: usize,
    pub power_usage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MicroserviceSample {
    pub ms: String,
    pub ms_id: u32,
    pub time: f64,
    pub cpu_util: f64,
    pub ram_util: f64,
    pub num_containers: usize,
    pub num_scheduled_containers: usize,
    pub num_non_scheduled_containers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PacketRecord {
    pub packet_id: u32,
    pub packet_label: String,
    pub request_id: Option<u32>,
    pub request_label: Option<String>,
    pub user_id: Option<u32>,
    pub user_label: Option<String>,
    pub created_at: Option<f64>,
    pub scheduled_at: Option<f64>,
    pub terminated_at: Option<f64>,
    pub successful: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub request_id: u32,
    pub request_label: String,
    pub user_id: Option<u32>,
    pub user_label: Option<String>,
    pub created_at: Option<f64>,
    pub scheduled_at: Option<f64>,
    pub terminated_at: Option<f64>,
    pub successful: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRecord {
    pub flow_id: u32,
    pub flow_label: String,
    pub sfc_id: u32,
    pub created_at: Option<f64>,
    pub scheduled_at: Option<f64>,
    pub terminated_at: Option<f64>,
    pub successful: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRequestRecord {
    pub user_request_id: u32,
    pub user_request_label: String,
    pub sfc_id: u32,
    pub created_at: Option<f64>,
    pub scheduled_at: Option<f64>,
    pub terminated_at: Option<f64>,
    pub successful: bool,
}

impl Simulation {
    /// Sample hosts, switches and routers every `interval` seconds.
    pub fn enable_host_monitor(&mut self, interval: f64) {
        self.monitors.host_interval = Some(interval);
        self.schedule_now(priority::MONITOR, Action::SampleHosts);
    }

    /// Sample microservices every `interval` seconds.
    pub fn enable_microservice_monitor(&mut self, interval: f64) {
        self.monitors.microservice_interval = Some(interval);
        self.schedule_now(priority::MONITOR, Action::SampleMicroservices);
    }

    pub(crate) fn sample_hosts(&mut self) {
        let Some(interval) = self.monitors.host_interval else {
            return;
        };
        let now = self.now();
        let model = self.config.power_model;
        let mut rows = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if !node.entity.created() || node.is_gateway() {
                continue;
            }
            let (bw_in, bw_out) = self.node_bandwidth_utilization(NodeId(index as u32), interval);
            rows.push(HostSample {
                host_id: index as u32,
                host_label: node.entity.label.clone(),
                time: now,
                cpu_util: node.cpu.utilization_in_past(interval, now),
                ram_util: node.ram.utilization_in_past(interval, now),
                rom_util: node.rom.utilization_in_past(interval, now),
                bw_in_util: bw_in,
                bw_out_util: bw_out,
                num_containers: node.host().map(|ext| ext.containers.len()).unwrap_or(0),
                num_processes: node.processes.len(),
                power_usage: node.power_usage(interval, now, model),
            });
        }
        self.monitors.host_rows.extend(rows);
        self.schedule_in(interval, priority::MONITOR, Action::SampleHosts);
    }

    fn node_bandwidth_utilization(&self, node: NodeId, interval: f64) -> (f64, f64) {
        let now = self.now();
        let nics = &self.nodes[node.index()].nics;
        if nics.is_empty() {
            return (0.0, 0.0);
        }
        let uplink: f64 = nics
            .iter()
            .map(|&nic| self.nics[nic.index()].uplink_utilization_in_past(interval, now))
            .sum();
        let downlink: f64 = nics
            .iter()
            .map(|&nic| self.nics[nic.index()].downlink_utilization_in_past(interval, now))
            .sum();
        (uplink / nics.len() as f64, downlink / nics.len() as f64)
    }

    pub(crate) fn sample_microservices(&mut self) {
        let Some(interval) = self.monitors.microservice_interval else {
            return;
        };
        let now = self.now();
        let mut rows = Vec::new();
        for (index, ms) in self.microservices.iter().enumerate() {
            if !ms.entity.created() || ms.entity.terminated() {
                continue;
            }
            let scheduled = ms
                .containers
                .iter()
                .filter(|&&c| self.containers[c.index()].entity.scheduled())
                .count();
            rows.push(MicroserviceSample {
                ms: ms.entity.label.clone(),
                ms_id: index as u32,
                time: now,
                cpu_util: self.microservice_cpu_usage_in_past(MicroserviceId(index as u32), interval),
                ram_util: self.microservice_ram_usage_in_past(MicroserviceId(index as u32), interval),
                num_containers: ms.containers.len(),
                num_scheduled_containers: scheduled,
                num_non_scheduled_containers: ms.containers.len() - scheduled,
            });
        }
        self.monitors.microservice_rows.extend(rows);
        self.schedule_in(interval, priority::MONITOR, Action::SampleMicroservices);
    }

    pub(crate) fn microservice_cpu_usage_in_past(
        &self,
        microservice: MicroserviceId,
        window: f64,
    ) -> f64 {
        let now = self.now();
        let containers = &self.microservices[microservice.index()].containers;
        if containers.is_empty() {
            return 0.0;
        }
        containers
            .iter()
            .filter(|&&c| self.containers[c.index()].entity.scheduled())
            .map(|&c| self.containers[c.index()].cpu.utilization_in_past(window, now))
            .sum::<f64>()
            / containers.len() as f64
    }

    pub(crate) fn microservice_ram_usage_in_past(
        &self,
        microservice: MicroserviceId,
        window: f64,
    ) -> f64 {
        let now = self.now();
        let containers = &self.microservices[microservice.index()].containers;
        if containers.is_empty() {
            return 0.0;
        }
        containers
            .iter()
            .filter(|&&c| self.containers[c.index()].entity.scheduled())
            .map(|&c| self.containers[c.index()].ram.utilization_in_past(window, now))
            .sum::<f64>()
            / containers.len() as f64
    }

    // ---- terminal collectors ------------------------------------------

    fn request_user(&self, request: RequestId) -> Option<UserId> {
        let flow = self.requests[request.index()].flow?;
        Some(self.workflows[flow.index()].user)
    }

    pub fn collect_packets(&self) -> Vec<PacketRecord> {
        self.packets
            .iter()
            .enumerate()
            .map(|(index, packet)| {
                let user = packet.request.and_then(|request| self.request_user(request));
                PacketRecord {
                    packet_id: index as u32,
                    packet_label: packet.entity.label.clone(),
                    request_id: packet.request.map(|r| r.0),
                    request_label: packet
                        .request
                        .map(|r| self.requests[r.index()].entity.label.clone()),
                    user_id: user.map(|u| u.0),
                    user_label: user.map(|u| self.users[u.index()].entity.label.clone()),
                    created_at: packet.entity.created_at,
                    scheduled_at: packet.entity.scheduled_at,
                    terminated_at: packet.entity.terminated_at,
                    successful: packet.entity.status.contains(Status::Completed),
                }
            })
            .collect()
    }

    pub fn collect_requests(&self) -> Vec<RequestRecord> {
        self.requests
            .iter()
            .enumerate()
            .map(|(index, request)| {
                let user = self.request_user(RequestId(index as u32));
                RequestRecord {
                    request_id: index as u32,
                    request_label: request.entity.label.clone(),
                    user_id: user.map(|u| u.0),
                    user_label: user.map(|u| self.users[u.index()].entity.label.clone()),
                    created_at: request.entity.created_at,
                    scheduled_at: request.entity.scheduled_at,
                    terminated_at: request.entity.terminated_at,
                    successful: request.entity.status.contains(Status::Completed),
                }
            })
            .collect()
    }

    pub fn collect_workflows(&self) -> Vec<WorkflowRecord> {
        self.workflows
            .iter()
            .enumerate()
            .map(|(index, flow)| WorkflowRecord {
                flow_id: index as u32,
                flow_label: flow.entity.label.clone(),
                sfc_id: flow.sfc.0,
                created_at: flow.entity.created_at,
                scheduled_at: flow.entity.scheduled_at,
                terminated_at: flow.entity.terminated_at,
                successful: flow.entity.status.contains(Status::Completed),
            })
            .collect()
    }

    pub fn collect_user_requests(&self) -> Vec<UserRequestRecord> {
        self.user_requests
            .iter()
            .enumerate()
            .map(|(index, user_request)| UserRequestRecord {
                user_request_id: index as u32,
                user_request_label: user_request.entity.label.clone(),
                sfc_id: user_request.sfc.0,
                created_at: user_request.entity.created_at,
                scheduled_at: user_request.entity.scheduled_at,
                terminated_at: user_request.entity.terminated_at,
                successful: user_request.entity.status.contains(Status::Completed),
            })
            .collect()
    }

    pub fn host_samples(&self) -> &[HostSample] {
        &self.monitors.host_rows
    }

    pub fn microservice_samples(&self) -> &[MicroserviceSample] {
        &self.monitors.microservice_rows
    }

    /// Write every telemetry table as CSV under `dir`.
    pub fn export_telemetry(&self, dir: &Path) -> SimResult<()> {
        std::fs::create_dir_all(dir)?;
        write_csv(&dir.join("host.csv"), &self.monitors.host_rows)?;
        write_csv(&dir.join("microservice.csv"), &self.monitors.microservice_rows)?;
        write_csv(&dir.join("packet.csv"), &self.collect_packets())?;
        write_csv(&dir.join("request.csv"), &self.collect_requests())?;
        write_csv(&dir.join("workflow.csv"), &self.collect_workflows())?;
        write_csv(&dir.join("user_request.csv"), &self.collect_user_requests())?;
        Ok(())
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> SimResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
