//! Error types for the simulator

use thiserror::Error;

/// Result type for simulator operations
pub type SimResult<T> = Result<T, SimError>;

/// Error types for simulator setup and execution
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid simulation configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A control-plane component was not installed before running
    #[error("Missing control plane component: {0}")]
    MissingComponent(&'static str),

    /// Invalid service function chain wiring
    #[error("Invalid SFC {label}: {reason}")]
    InvalidSfc { label: String, reason: String },

    /// Invalid network service graph
    #[error("Invalid network service {label}: {reason}")]
    InvalidNetworkService { label: String, reason: String },

    /// A resource distribution exceeded the available quantity
    #[error("Capacity exceeded on {resource}: requested {requested}, available {available}")]
    CapacityExceeded {
        resource: String,
        requested: f64,
        available: f64,
    },

    /// No network path between two physical entities
    #[error("No path between {from} and {destination}")]
    PathNotFound { from: String, destination: String },

    /// A handle referenced an entity that does not exist
    #[error("Dangling {kind} handle: {index}")]
    DanglingHandle { kind: &'static str, index: u32 },

    /// Scenario parsing or cross-reference error
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// Telemetry export error
    #[error("Telemetry export error: {0}")]
    Export(String),
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Export(err.to_string())
    }
}

impl From<csv::Error> for SimError {
    fn from(err: csv::Error) -> Self {
        SimError::Export(err.to_string())
    }
}
