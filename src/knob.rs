//! Callable workload knobs
//!
//! Workload parameters (process length, packet size, packet count,
//! priority, retry backoff) can be fixed scalars or samplers invoked once
//! per use, so a user population can model jitter without the driver
//! re-issuing requests.

use std::fmt;
use std::rc::Rc;

/// A scalar that is either fixed or sampled on demand.
#[derive(Clone)]
pub enum Knob<T> {
    Fixed(T),
    Dynamic(Rc<dyn Fn(&mut fastrand::Rng) -> T>),
}

impl<T: Copy> Knob<T> {
    /// Resolve the knob to a concrete value.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> T {
        match self {
            Knob::Fixed(value) => *value,
            Knob::Dynamic(sampler) => sampler(rng),
        }
    }
}

impl<T> Knob<T> {
    pub fn dynamic(sampler: impl Fn(&mut fastrand::Rng) -> T + 'static) -> Self {
        Knob::Dynamic(Rc::new(sampler))
    }
}

impl<T: fmt::Debug> fmt::Debug for Knob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Knob::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Knob::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl<T> From<T> for Knob<T> {
    fn from(value: T) -> Self {
        Knob::Fixed(value)
    }
}

/// Uniform range sampler over integers, the common case in scenarios.
pub fn uniform_u64(min: u64, max: u64) -> Knob<u64> {
    Knob::dynamic(move |rng| rng.u64(min..=max))
}

/// Uniform range sampler over floats, used for retry backoff.
pub fn uniform_f64(min: f64, max: f64) -> Knob<f64> {
    Knob::dynamic(move |rng| min + (max - min) * rng.f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_knob_is_constant() {
        let mut rng = fastrand::Rng::with_seed(7);
        let knob = Knob::Fixed(42u64);
        assert_eq!(knob.sample(&mut rng), 42);
        assert_eq!(knob.sample(&mut rng), 42);
    }

    #[test]
    fn uniform_knob_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        let knob = uniform_u64(10, 20);
        for _ in 0..100 {
            let v = knob.sample(&mut rng);
            assert!((10..=20).contains(&v));
        }
    }

    #[test]
    fn backoff_knob_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        let knob = uniform_f64(0.0, 1.0);
        for _ in 0..100 {
            let v = knob.sample(&mut rng);
            assert!((0.0..1.0).contains(&v));
        }
    }
}
