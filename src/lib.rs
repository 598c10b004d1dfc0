//! Discrete-event simulator for containerized cloud/edge infrastructure
//!
//! This crate models clusters of hosts running container-based
//! microservice workloads under synthetic user populations:
//! - a priority-ordered virtual-time actor queue drives every state change
//! - CPU cores, RAM/ROM pools and NIC links are capacity-bounded resources
//!   with reservations and utilization history
//! - a control plane places containers and volumes, powers hosts on and
//!   off, autoscales microservices and load-balances requests
//! - requests expand into processes and packets that execute on cores and
//!   traverse the topology hop by hop, with failures cascading up through
//!   requests, workflows and user requests
//!
//! Monitors sample the run into tabular telemetry exported as CSV.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod action;
pub mod actor;
pub mod bootstrap;
pub mod builder;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod knob;
pub mod monitor;
pub mod naming;
pub mod resource;
pub mod scenario;
pub mod scheduler;
pub mod status;
pub mod topology;

mod exec;
mod lifecycle;
mod transport;

pub use builder::{HostSpec, MicroserviceSpec, RequestSfcOptions};
pub use config::{Platform, PowerModel, SimConfig};
pub use engine::Simulation;
pub use error::{SimError, SimResult};
pub use knob::Knob;
pub use scenario::Scenario;
pub use scheduler::PlacementStrategy;
pub use status::{Status, StatusSet};
