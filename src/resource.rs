//! Capacity-bounded resource pools
//!
//! A [`Resource`] models any reservable quantity in the simulation: core
//! instruction budgets, RAM and ROM byte pools, NIC half-duplex
//! bandwidth, admission reservors. Claims are keyed by the owning entity
//! so a crashing owner can be cleaned up wholesale, and every mutation
//! appends to a utilization history that monitors integrate over.

use std::collections::HashMap;

use crate::entity::EntityRef;
use crate::error::{SimError, SimResult};

/// A reservable quantity with claim tracking and utilization history.
#[derive(Debug, Clone)]
pub struct Resource {
    label: String,
    capacity: f64,
    available: f64,
    claims: HashMap<EntityRef, f64>,
    /// (virtual time, quantity in use); ordered by time.
    samples: Vec<(f64, f64)>,
}

impl Resource {
    pub fn new(label: impl Into<String>, capacity: f64) -> Self {
        Self {
            label: label.into(),
            capacity,
            available: capacity,
            claims: HashMap::new(),
            samples: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn available(&self) -> f64 {
        self.available
    }

    pub fn in_use(&self) -> f64 {
        self.capacity - self.available
    }

    /// Reserve `quantity` for `owner`, failing when the pool cannot cover
    /// it. Callers translate the failure into a domain event (container
    /// crash, packet drop) rather than surfacing it.
    pub fn distribute(&mut self, owner: EntityRef, quantity: f64, now: f64) -> SimResult<()> {
        if quantity > self.available {
            return Err(SimError::CapacityExceeded {
                resource: self.label.clone(),
                requested: quantity,
                available: self.available,
            });
        }
        *self.claims.entry(owner).or_insert(0.0) += quantity;
        self.available -= quantity;
        self.record(now);
        Ok(())
    }

    /// Return `quantity` of `owner`'s claim, or the whole claim when no
    /// quantity is given. Releasing with no outstanding claim is a no-op.
    pub fn release(&mut self, owner: EntityRef, quantity: Option<f64>, now: f64) -> f64 {
        let Some(claimed) = self.claims.get_mut(&owner) else {
            return 0.0;
        };
        let released = match quantity {
            Some(q) => q.min(*claimed),
            None => *claimed,
        };
        *claimed -= released;
        if *claimed <= f64::EPSILON {
            self.claims.remove(&owner);
        }
        self.available = (self.available + released).min(self.capacity);
        self.record(now);
        released
    }

    pub fn claimed_by(&self, owner: EntityRef) -> f64 {
        self.claims.get(&owner).copied().unwrap_or(0.0)
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// Instantaneous utilization in `[0, 1]`.
    pub fn utilization(&self) -> f64 {
        if self.capacity <= 0.0 {
            return 0.0;
        }
        self.in_use() / self.capacity
    }

    /// Time-weighted mean utilization over `[now - window, now]`.
    pub fn utilization_in_past(&self, window: f64, now: f64) -> f64 {
        if self.capacity <= 0.0 {
            return 0.0;
        }
        if window <= 0.0 {
            return self.utilization();
        }
        let start = now - window;
        // Usage is a step function of the samples; the segment before the
        // first sample is zero.
        let mut level = 0.0;
        let mut cursor = start;
        let mut area = 0.0;
        for &(time, in_use) in &self.samples {
            if time <= start {
                level = in_use;
                continue;
            }
            if time >= now {
                break;
            }
            area += level * (time - cursor.max(start));
            cursor = time;
            level = in_use;
        }
        area += level * (now - cursor.max(start));
        area / (window * self.capacity)
    }

    /// Invariant check: available plus outstanding claims equals capacity.
    pub fn conserved(&self) -> bool {
        let claimed: f64 = self.claims.values().sum();
        (self.available + claimed - self.capacity).abs() < 1e-6
    }

    fn record(&mut self, now: f64) {
        let in_use = self.in_use();
        // Coalesce equal-value samples; only the latest sample at a given
        // time matters for the step integral.
        match self.samples.last_mut() {
            Some((time, value)) if (*time - now).abs() < f64::EPSILON => *value = in_use,
            Some((_, value)) if (*value - in_use).abs() < f64::EPSILON => {}
            _ => self.samples.push((now, in_use)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityRef, ProcessId};
    use proptest::prelude::*;

    fn owner(n: u32) -> EntityRef {
        EntityRef::Process(ProcessId(n))
    }

    #[test]
    fn distribute_and_release_round_trip() {
        let mut pool = Resource::new("ram", 100.0);
        pool.distribute(owner(1), 60.0, 0.0).unwrap();
        assert_eq!(pool.available(), 40.0);
        assert!(pool.conserved());

        let released = pool.release(owner(1), None, 1.0);
        assert_eq!(released, 60.0);
        assert_eq!(pool.available(), 100.0);
        assert!(pool.conserved());
    }

    #[test]
    fn over_distribution_fails_without_mutation() {
        let mut pool = Resource::new("ram", 100.0);
        pool.distribute(owner(1), 80.0, 0.0).unwrap();
        assert!(pool.distribute(owner(2), 30.0, 0.0).is_err());
        assert_eq!(pool.available(), 20.0);
        assert_eq!(pool.claimed_by(owner(2)), 0.0);
        assert!(pool.conserved());
    }

    #[test]
    fn partial_release() {
        let mut pool = Resource::new("cpu", 10.0);
        pool.distribute(owner(1), 6.0, 0.0).unwrap();
        assert_eq!(pool.release(owner(1), Some(2.0), 1.0), 2.0);
        assert_eq!(pool.claimed_by(owner(1)), 4.0);
        assert!(pool.conserved());
    }

    #[test]
    fn release_of_unknown_owner_is_noop() {
        let mut pool = Resource::new("cpu", 10.0);
        assert_eq!(pool.release(owner(9), None, 0.0), 0.0);
        assert_eq!(pool.available(), 10.0);
    }

    #[test]
    fn windowed_utilization_integrates_steps() {
        let mut pool = Resource::new("bw", 100.0);
        // Half the pool for the second half of a 2s window.
        pool.distribute(owner(1), 50.0, 1.0).unwrap();
        let util = pool.utilization_in_past(2.0, 2.0);
        assert!((util - 0.25).abs() < 1e-9, "got {util}");
    }

    #[test]
    fn windowed_utilization_sees_prior_level() {
        let mut pool = Resource::new("bw", 100.0);
        pool.distribute(owner(1), 100.0, 0.5, ).unwrap();
        // Fully claimed before the window opens: flat 100% inside it.
        let util = pool.utilization_in_past(1.0, 5.0);
        assert!((util - 1.0).abs() < 1e-9, "got {util}");
    }

    proptest! {
        #[test]
        fn conservation_holds_under_random_traffic(ops in prop::collection::vec((0u32..8, 0.0f64..40.0), 1..64)) {
            let mut pool = Resource::new("pool", 100.0);
            let mut clock = 0.0;
            for (who, qty) in ops {
                clock += 0.1;
                if qty < 20.0 {
                    let _ = pool.distribute(owner(who), qty, clock);
                } else {
                    pool.release(owner(who), Some(qty - 20.0), clock);
                }
                prop_assert!(pool.conserved());
                prop_assert!(pool.available() >= -1e-9);
                prop_assert!(pool.available() <= pool.capacity() + 1e-9);
            }
        }
    }
}
