//! Priority-ordered virtual-time actor queue
//!
//! Every state change in the simulation happens inside an actor fired at
//! a tick of the virtual clock. Within a tick, actors fire in ascending
//! priority order; at equal priority, insertion order breaks ties. An
//! actor can be gated on the termination of other entities
//! (after-dependencies); gated actors are parked outside the heap until
//! the last dependency fires.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::action::Action;
use crate::entity::EntityRef;

/// Actor priority; lower fires first within a tick.
pub type Priority = i8;

/// Priority bands of the simulation, lowest first.
pub mod priority {
    use super::Priority;

    pub const TERMINATION: Priority = -1;
    pub const CREATION: Priority = 0;
    pub const POWERING: Priority = 1;
    pub const HOST_PROVISIONING: Priority = 2;
    pub const VOLUME_ALLOCATION: Priority = 3;
    pub const VOLUME_ALLOCATOR: Priority = 4;
    pub const VOLUME_ATTACH: Priority = 5;
    pub const VOLUME_DETACH: Priority = 5;
    pub const CONTAINER_ALLOCATION: Priority = 6;
    pub const CONTAINER_SCHEDULER: Priority = 7;
    pub const MICROSERVICE_EVALUATION: Priority = 8;
    pub const PROCESS_COMPLETE_CHECK: Priority = 8;
    pub const CORE_CLEAR_INSTRUCTIONS: Priority = 9;
    pub const CORE_EXECUTE_PROCESS: Priority = 10;
    pub const CPU_SCHEDULE_PROCESS: Priority = 11;
    pub const HOST_SCHEDULE_PACKET: Priority = 12;
    pub const REQUEST_SCHEDULER: Priority = 13;
    pub const HOST_EVALUATION: Priority = 14;
    pub const MONITOR: Priority = 15;
}

/// An actor ready to fire: virtual time in ticks, priority, insertion
/// sequence and the action to dispatch.
#[derive(Debug)]
pub struct ScheduledActor {
    pub at: u64,
    pub priority: Priority,
    pub seq: u64,
    pub action: Action,
}

impl PartialEq for ScheduledActor {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ScheduledActor {}

impl PartialOrd for ScheduledActor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledActor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the earliest actor first.
        (other.at, other.priority, other.seq).cmp(&(self.at, self.priority, self.seq))
    }
}

#[derive(Debug)]
struct GatedActor {
    at: u64,
    priority: Priority,
    action: Action,
    remaining: usize,
}

/// The global actor queue.
#[derive(Debug, Default)]
pub struct ActorQueue {
    heap: BinaryHeap<ScheduledActor>,
    seq: u64,
    gated: HashMap<u64, GatedActor>,
    waiters: HashMap<EntityRef, Vec<u64>>,
}

impl ActorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action at the given tick.
    pub fn schedule(&mut self, at: u64, priority: Priority, action: Action) {
        let seq = self.next_seq();
        self.heap.push(ScheduledActor {
            at,
            priority,
            seq,
            action,
        });
    }

    /// Schedule an action gated on the termination of `pending` entities.
    /// The caller must have filtered out dependencies that already
    /// terminated; an empty list schedules immediately.
    pub fn schedule_gated(
        &mut self,
        at: u64,
        priority: Priority,
        action: Action,
        pending: Vec<EntityRef>,
    ) {
        if pending.is_empty() {
            self.schedule(at, priority, action);
            return;
        }
        let seq = self.next_seq();
        self.gated.insert(
            seq,
            GatedActor {
                at,
                priority,
                action,
                remaining: pending.len(),
            },
        );
        for dep in pending {
            self.waiters.entry(dep).or_default().push(seq);
        }
    }

    /// Notify the queue that an entity terminated, releasing actors whose
    /// last dependency this was. Released actors fire no earlier than
    /// `now`.
    pub fn entity_terminated(&mut self, entity: EntityRef, now: u64) {
        let Some(waiting) = self.waiters.remove(&entity) else {
            return;
        };
        for id in waiting {
            let ready = match self.gated.get_mut(&id) {
                Some(gated) => {
                    gated.remaining -= 1;
                    gated.remaining == 0
                }
                None => false,
            };
            if ready {
                if let Some(gated) = self.gated.remove(&id) {
                    self.heap.push(ScheduledActor {
                        at: gated.at.max(now),
                        priority: gated.priority,
                        seq: id,
                        action: gated.action,
                    });
                }
            }
        }
    }

    /// Pop the earliest actor firing at or before `till`.
    pub fn pop_until(&mut self, till: u64) -> Option<ScheduledActor> {
        if self.heap.peek().map(|actor| actor.at) <= Some(till) {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRef, ProcessId};

    fn probe(id: u32) -> Action {
        Action::ProcessCompleteCheck(ProcessId(id))
    }

    fn probe_id(action: &Action) -> u32 {
        match action {
            Action::ProcessCompleteCheck(id) => id.0,
            _ => unreachable!(),
        }
    }

    #[test]
    fn pops_by_time_then_priority_then_insertion() {
        let mut queue = ActorQueue::new();
        queue.schedule(5, priority::MONITOR, probe(0));
        queue.schedule(5, priority::TERMINATION, probe(1));
        queue.schedule(1, priority::MONITOR, probe(2));
        queue.schedule(5, priority::TERMINATION, probe(3));

        let order: Vec<u32> = std::iter::from_fn(|| queue.pop_until(u64::MAX))
            .map(|actor| probe_id(&actor.action))
            .collect();
        assert_eq!(order, vec![2, 1, 3, 0]);
    }

    #[test]
    fn pop_until_respects_horizon() {
        let mut queue = ActorQueue::new();
        queue.schedule(10, priority::CREATION, probe(0));
        assert!(queue.pop_until(9).is_none());
        assert!(queue.pop_until(10).is_some());
    }

    #[test]
    fn gated_actor_waits_for_all_dependencies() {
        let dep_a = EntityRef::Process(ProcessId(100));
        let dep_b = EntityRef::Process(ProcessId(101));
        let mut queue = ActorQueue::new();
        queue.schedule_gated(0, priority::CREATION, probe(7), vec![dep_a, dep_b]);

        assert!(queue.pop_until(u64::MAX).is_none());
        queue.entity_terminated(dep_a, 3);
        assert!(queue.pop_until(u64::MAX).is_none());
        queue.entity_terminated(dep_b, 8);

        let actor = queue.pop_until(u64::MAX).expect("released");
        assert_eq!(actor.at, 8, "fires no earlier than the releasing tick");
        assert_eq!(probe_id(&actor.action), 7);
    }

    #[test]
    fn empty_dependency_list_schedules_immediately() {
        let mut queue = ActorQueue::new();
        queue.schedule_gated(2, priority::CREATION, probe(1), Vec::new());
        assert!(queue.pop_until(2).is_some());
    }
}
