//! Processes: units of CPU work
//!
//! A process is a synthetic instruction stream executed in chunks across
//! the cores of one host, bounded by its container's CPU-time quota.
//! Daemon processes pin a container's baseline load and respawn while the
//! container lives; packet handlers model per-hop decode cost and bypass
//! container quotas.

use crate::config::Platform;
use crate::entity::{ContainerId, EntityCore, NodeId, PacketId, RequestId};
use crate::status::Status;

/// Daemon processes preempt everything else on the queue.
pub const DAEMON_PRIORITY: i64 = i64::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Regular,
    Daemon,
    PacketHandler(PacketId),
}

#[derive(Debug)]
pub struct Process {
    pub entity: EntityCore,
    pub kind: ProcessKind,
    /// Instruction count.
    pub length: u64,
    /// Lower schedules earlier.
    pub priority: i64,
    /// bytes, amplified; settled at creation from the instruction stream.
    pub ram_usage: u64,
    pub request: Option<RequestId>,
    pub container: Option<ContainerId>,
    pub host: Option<NodeId>,
    /// Instructions retired.
    pub progress: u64,
    /// Instructions reserved on cores but not yet retired.
    pub current_scheduled_length: u64,
    /// (node, core index) pairs currently executing a chunk.
    pub executing_cores: Vec<(NodeId, usize)>,
    /// Terminal element of a POST expansion: completing it completes the
    /// request.
    pub completes_request: bool,
}

impl Process {
    pub fn new(
        entity: EntityCore,
        kind: ProcessKind,
        length: u64,
        priority: i64,
        request: Option<RequestId>,
        container: Option<ContainerId>,
    ) -> Self {
        Self {
            entity,
            kind,
            length,
            priority,
            ram_usage: 0,
            request,
            container,
            host: None,
            progress: 0,
            current_scheduled_length: 0,
            executing_cores: Vec::new(),
            completes_request: false,
        }
    }

    pub fn is_handler(&self) -> bool {
        matches!(self.kind, ProcessKind::PacketHandler(_))
    }

    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.progress)
    }

    pub fn cached(&self) -> bool {
        self.entity.status.contains(Status::Cached)
    }

    pub fn executing(&self) -> bool {
        self.entity.status.contains(Status::Executing)
    }

    /// Amplified footprint of the synthetic instruction stream. x86-64
    /// instructions are 1-16 random bytes, ARM instructions a fixed 4.
    pub fn settle_ram_usage(
        &mut self,
        platform: Platform,
        ram_amplifier: u64,
        rng: &mut fastrand::Rng,
    ) {
        let bytes: u64 = match platform {
            Platform::X86_64 => (0..self.length).map(|_| rng.u64(1..=16)).sum(),
            Platform::Arm => self.length * 4,
        };
        self.ram_usage = bytes * ram_amplifier;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_footprint_is_exact() {
        let mut process = Process::new(
            EntityCore::new("p".into()),
            ProcessKind::Regular,
            100,
            0,
            None,
            None,
        );
        let mut rng = fastrand::Rng::with_seed(3);
        process.settle_ram_usage(Platform::Arm, 10, &mut rng);
        assert_eq!(process.ram_usage, 100 * 4 * 10);
    }

    #[test]
    fn x86_footprint_is_bounded() {
        let mut process = Process::new(
            EntityCore::new("p".into()),
            ProcessKind::Regular,
            100,
            0,
            None,
            None,
        );
        let mut rng = fastrand::Rng::with_seed(3);
        process.settle_ram_usage(Platform::X86_64, 1, &mut rng);
        assert!((100..=1600).contains(&process.ram_usage));
    }

    #[test]
    fn remaining_never_underflows() {
        let mut process = Process::new(
            EntityCore::new("p".into()),
            ProcessKind::Regular,
            10,
            0,
            None,
            None,
        );
        process.progress = 12;
        assert_eq!(process.remaining(), 0);
    }
}
