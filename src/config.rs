//! Simulation configuration

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Host CPU architecture; affects only the byte length of the synthetic
/// instructions a process is made of (and therefore its RAM footprint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Variable-length instructions, 1-16 random bytes each
    #[serde(rename = "x86-64")]
    X86_64,
    /// Fixed 4-byte instructions
    #[serde(rename = "ARM", alias = "arm")]
    Arm,
}

/// Host power usage model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerModel {
    /// log(util% + 1, 100) weighted TDP, the default
    Log,
    /// util% weighted TDP
    Linear,
}

/// Global knobs of a simulation run.
///
/// The acceleration/amplifier factors turn physical units into simulated
/// units so that comparative experiments complete quickly; absolute
/// outputs are not physical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "defaults::platform")]
    pub platform: Platform,
    /// Divides core capacity: one simulated instruction stands for this
    /// many physical instructions.
    #[serde(default = "defaults::cpu_acceleration")]
    pub cpu_acceleration: u64,
    /// Multiplies process RAM usage.
    #[serde(default = "defaults::ram_amplifier")]
    pub ram_amplifier: u64,
    /// Multiplies packet sizes.
    #[serde(default = "defaults::packet_size_amplifier")]
    pub packet_size_amplifier: u64,
    /// Pool the per-microservice service IPs are drawn from.
    #[serde(default = "defaults::virtual_network")]
    pub virtual_network: Ipv4Network,
    /// Clock accuracy: the quantum is `10^-accuracy` seconds.
    #[serde(default = "defaults::accuracy")]
    pub accuracy: u32,
    #[serde(default = "defaults::power_model")]
    pub power_model: PowerModel,
}

mod defaults {
    use super::{Platform, PowerModel};
    use ipnetwork::Ipv4Network;
    use std::net::Ipv4Addr;

    pub fn platform() -> Platform {
        Platform::X86_64
    }
    pub fn cpu_acceleration() -> u64 {
        1_000_000
    }
    pub fn ram_amplifier() -> u64 {
        100_000
    }
    pub fn packet_size_amplifier() -> u64 {
        1
    }
    pub fn virtual_network() -> Ipv4Network {
        match Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), 8) {
            Ok(network) => network,
            Err(_) => unreachable!(),
        }
    }
    pub fn accuracy() -> u32 {
        4
    }
    pub fn power_model() -> PowerModel {
        PowerModel::Log
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            platform: defaults::platform(),
            cpu_acceleration: defaults::cpu_acceleration(),
            ram_amplifier: defaults::ram_amplifier(),
            packet_size_amplifier: defaults::packet_size_amplifier(),
            virtual_network: defaults::virtual_network(),
            accuracy: defaults::accuracy(),
            power_model: defaults::power_model(),
        }
    }
}

impl SimConfig {
    /// Parse the virtual network from a CIDR string, failing fast on an
    /// invalid pool.
    pub fn with_virtual_network(mut self, cidr: &str) -> SimResult<Self> {
        self.virtual_network = cidr
            .parse()
            .map_err(|e| SimError::Config(format!("invalid virtual network {cidr}: {e}")))?;
        Ok(self)
    }

    /// Seconds per clock tick.
    pub fn quantum(&self) -> f64 {
        10f64.powi(-(self.accuracy as i32))
    }

    /// Round a duration in seconds to whole ticks.
    pub fn to_ticks(&self, seconds: f64) -> u64 {
        (seconds / self.quantum()).round().max(0.0) as u64
    }

    /// Convert ticks back to seconds.
    pub fn to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * self.quantum()
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.cpu_acceleration == 0 {
            return Err(SimError::Config("cpu_acceleration must be non-zero".into()));
        }
        if self.packet_size_amplifier == 0 {
            return Err(SimError::Config(
                "packet_size_amplifier must be non-zero".into(),
            ));
        }
        if self.accuracy == 0 || self.accuracy > 9 {
            return Err(SimError::Config("accuracy must be within 1..=9".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantum_follows_accuracy() {
        let config = SimConfig {
            accuracy: 4,
            ..SimConfig::default()
        };
        assert!((config.quantum() - 0.0001).abs() < f64::EPSILON);
        assert_eq!(config.to_ticks(1.0), 10_000);
        assert_eq!(config.to_ticks(0.00004), 0);
        assert_eq!(config.to_ticks(0.00006), 1);
    }

    #[test]
    fn invalid_cidr_is_fatal() {
        assert!(SimConfig::default()
            .with_virtual_network("10.0.0.0/33")
            .is_err());
    }

    #[test]
    fn zero_acceleration_rejected() {
        let config = SimConfig {
            cpu_acceleration: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
