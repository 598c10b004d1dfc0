//! CPU execution pipeline
//!
//! Cached processes are scheduled onto cores in priority order. Each
//! scheduling pass carves the largest chunk allowed by (a) what the
//! process still needs, (b) the container's CPU-time quota and (c) the
//! core's free instruction budget, then reserves it; a clearance actor at
//! the chunk's completion time retires the instructions and re-runs the
//! scheduler. Packet handlers bypass container quotas.

use tracing::{debug, info};

use crate::action::Action;
use crate::actor::priority;
use crate::engine::Simulation;
use crate::entity::{EntityRef, NodeId, ProcessId};
use crate::status::Status;

impl Simulation {
    /// Park a process on the node's CPU queue and arm a scheduling pass.
    pub(crate) fn cache_process(&mut self, node: NodeId, process: ProcessId) {
        if self.processes[process.index()].cached() {
            return;
        }
        self.nodes[node.index()].cpu.queue.push(process);
        self.processes[process.index()]
            .entity
            .status
            .insert(Status::Cached);
        self.nudge_cpu(node);
    }

    /// Coalesced: at most one scheduling actor pending per CPU.
    pub(crate) fn nudge_cpu(&mut self, node: NodeId) {
        let cpu = &mut self.nodes[node.index()].cpu;
        if !cpu.schedule_pending {
            cpu.schedule_pending = true;
            self.schedule_now(priority::CPU_SCHEDULE_PROCESS, Action::ScheduleCpu(node));
        }
    }

    /// One scheduling pass over the CPU queue.
    pub(crate) fn schedule_cpu_pass(&mut self, node: NodeId) {
        self.nodes[node.index()].cpu.schedule_pending = false;

        let mut queue = self.nodes[node.index()].cpu.queue.clone();
        queue.sort_by_key(|&p| self.processes[p.index()].priority);
        debug!(
            node = %self.nodes[node.index()].entity.label,
            queued = queue.len(),
            "cpu scheduling pass"
        );

        let cores = self.nodes[node.index()].cpu.cores.len();
        for process in queue {
            for core in 0..cores {
                let chunk = self.schedulable_chunk(node, core, process);
                if chunk > 0 {
                    self.execute_chunk(node, core, process, chunk);
                }
            }
        }
    }

    /// min(remaining to schedule, container quota, core budget), floored.
    fn schedulable_chunk(&self, node: NodeId, core: usize, process: ProcessId) -> u64 {
        let state = &self.processes[process.index()];
        let remaining =
            (state.remaining().saturating_sub(state.current_scheduled_length)) as f64;
        let core_capacity = self.nodes[node.index()].cpu.cores[core].capacity();

        let container_budget = if state.is_handler() {
            f64::INFINITY
        } else {
            match state.container {
                Some(container) => {
                    self.containers[container.index()].cpu.available() / 1000.0 * core_capacity
                }
                None => f64::INFINITY,
            }
        };
        let core_budget = self.nodes[node.index()].cpu.cores[core].available();

        remaining.min(container_budget).min(core_budget).floor().max(0.0) as u64
    }

    /// Reserve `chunk` instructions on the core and arm the clearance.
    fn execute_chunk(&mut self, node: NodeId, core: usize, process: ProcessId, chunk: u64) {
        let now = self.now();
        let claim = EntityRef::Process(process);
        let core_capacity = self.nodes[node.index()].cpu.cores[core].capacity();

        {
            let core_state = &mut self.nodes[node.index()].cpu.cores[core];
            if core_state
                .computational_power
                .distribute(claim, chunk as f64, now)
                .is_err()
            {
                return;
            }
            core_state.processes.push(process);
        }

        let is_handler = {
            let state = &mut self.processes[process.index()];
            state.executing_cores.push((node, core));
            state.entity.status.insert(Status::Executing);
            state.current_scheduled_length += chunk;
            state.is_handler()
        };

        if !is_handler {
            if let Some(container) = self.processes[process.index()].container {
                let cpu_time = chunk as f64 / core_capacity * 1000.0;
                let _ = self.containers[container.index()]
                    .cpu
                    .distribute(claim, cpu_time, now);
            }
        }

        let execution_time = chunk as f64 / core_capacity;
        debug!(
            process = %self.processes[process.index()].entity.label,
            chunk,
            execution_time,
            "core executing chunk"
        );
        self.schedule_in(
            execution_time,
            priority::CORE_CLEAR_INSTRUCTIONS,
            Action::ClearInstructions {
                node,
                core,
                process,
                chunk,
            },
        );
    }

    /// Retire a finished chunk. A process that failed in the meantime
    /// already had its reservations torn down by the crash path.
    pub(crate) fn clear_instructions(
        &mut self,
        node: NodeId,
        core: usize,
        process: ProcessId,
        chunk: u64,
    ) {
        if self.processes[process.index()].entity.failed() {
            return;
        }
        let now = self.now();
        let claim = EntityRef::Process(process);
        let core_capacity = {
            let core_state = &mut self.nodes[node.index()].cpu.cores[core];
            core_state
                .computational_power
                .release(claim, Some(chunk as f64), now);
            if let Some(position) = core_state.processes.iter().position(|&p| p == process) {
                core_state.processes.swap_remove(position);
            }
            core_state.capacity()
        };

        let is_handler = {
            let state = &mut self.processes[process.index()];
            state.progress += chunk;
            state.current_scheduled_length = state.current_scheduled_length.saturating_sub(chunk);
            if let Some(position) = state
                .executing_cores
                .iter()
                .position(|&(n, c)| n == node && c == core)
            {
                state.executing_cores.swap_remove(position);
            }
            if state.executing_cores.is_empty() {
                state.entity.status.remove(Status::Executing);
            }
            state.is_handler()
        };

        if !is_handler {
            if let Some(container) = self.processes[process.index()].container {
                let cpu_time = chunk as f64 / core_capacity * 1000.0;
                self.containers[container.index()]
                    .cpu
                    .release(claim, Some(cpu_time), now);
            }
        }

        self.schedule_now(
            priority::PROCESS_COMPLETE_CHECK,
            Action::ProcessCompleteCheck(process),
        );
        self.nudge_cpu(node);
    }

    /// A process completes once its full length is retired.
    pub(crate) fn complete_process(&mut self, process: ProcessId) {
        let state = &self.processes[process.index()];
        if state.entity.completed() || state.entity.failed() || state.entity.terminated() {
            return;
        }
        if state.remaining() > 0 {
            return;
        }
        let packet = match state.kind {
            crate::entity::process::ProcessKind::PacketHandler(packet) => Some(packet),
            _ => None,
        };
        self.processes[process.index()]
            .entity
            .status
            .insert(Status::Completed);
        info!(process = %self.processes[process.index()].entity.label, "process completed");
        self.terminate(EntityRef::Process(process));

        // A completed handler at the path's last node delivers the packet.
        if let Some(packet) = packet {
            if self.packets[packet.index()].at_destination() {
                self.complete_packet(packet);
            }
        }
    }
}
