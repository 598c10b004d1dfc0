//! CPU and core execution primitives
//!
//! A core's capacity is `(IPC x frequency) / cpu_acceleration`
//! instructions per simulated second, wrapped as a [`Resource`] so that
//! chunked executions reserve instruction budget and clear it when the
//! chunk's virtual runtime elapses.

use crate::entity::ProcessId;
use crate::resource::Resource;

/// One execution core.
#[derive(Debug)]
pub struct Core {
    pub computational_power: Resource,
    /// Processes with an outstanding chunk on this core.
    pub processes: Vec<ProcessId>,
    pub powered_on: bool,
}

impl Core {
    pub fn capacity(&self) -> f64 {
        self.computational_power.capacity()
    }

    pub fn available(&self) -> f64 {
        self.computational_power.available()
    }
}

/// A CPU: ordered cores plus the cached ready-queue of processes.
#[derive(Debug)]
pub struct Cpu {
    pub ipc: f64,
    /// MHz
    pub frequency: f64,
    pub tdp: f64,
    pub cores: Vec<Core>,
    /// Cached processes awaiting (further) scheduling.
    pub queue: Vec<ProcessId>,
    /// Singleton flag: at most one scheduling actor pending.
    pub schedule_pending: bool,
    pub powered_on: bool,
}

impl Cpu {
    pub fn new(label: &str, ipc: f64, frequency: f64, num_cores: usize, tdp: f64, cpu_acceleration: u64) -> Self {
        let per_core = ipc * frequency * 1_000_000.0 / cpu_acceleration as f64;
        let cores = (0..num_cores)
            .map(|i| Core {
                computational_power: Resource::new(format!("{label}-core-{i}"), per_core),
                processes: Vec::new(),
                powered_on: false,
            })
            .collect();
        Self {
            ipc,
            frequency,
            tdp,
            cores,
            queue: Vec::new(),
            schedule_pending: false,
            powered_on: false,
        }
    }

    /// Instructions per second of one core.
    pub fn single_core_capacity(&self) -> f64 {
        self.cores
            .first()
            .map(Core::capacity)
            .unwrap_or_default()
    }

    pub fn capacity(&self) -> f64 {
        self.cores.iter().map(Core::capacity).sum()
    }

    pub fn available(&self) -> f64 {
        self.cores.iter().map(Core::available).sum()
    }

    /// Instantaneous utilization in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        let capacity = self.capacity();
        if capacity <= 0.0 {
            return 0.0;
        }
        (capacity - self.available()) / capacity
    }

    /// Mean windowed utilization across cores.
    pub fn utilization_in_past(&self, window: f64, now: f64) -> f64 {
        if self.cores.is_empty() {
            return 0.0;
        }
        self.cores
            .iter()
            .map(|core| core.computational_power.utilization_in_past(window, now))
            .sum::<f64>()
            / self.cores.len() as f64
    }

    pub fn power_on(&mut self) {
        self.powered_on = true;
        for core in &mut self.cores {
            core.powered_on = true;
        }
    }

    pub fn power_off(&mut self) {
        self.powered_on = false;
        for core in &mut self.cores {
            core.powered_on = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_capacity_is_quantized_by_acceleration() {
        let cpu = Cpu::new("cpu", 1.0, 2000.0, 2, 125.0, 1_000_000);
        assert_eq!(cpu.single_core_capacity(), 2000.0);
        assert_eq!(cpu.capacity(), 4000.0);
    }

    #[test]
    fn power_cascades_to_cores() {
        let mut cpu = Cpu::new("cpu", 1.0, 1000.0, 4, 50.0, 1_000_000);
        cpu.power_on();
        assert!(cpu.cores.iter().all(|c| c.powered_on));
        cpu.power_off();
        assert!(cpu.cores.iter().all(|c| !c.powered_on));
    }
}
