//! Control plane: placement, power and dispatch
//!
//! Each component keeps a singleton "pending actor" flag so a burst of
//! schedule() nudges collapses into at most one pass per tick.

pub mod container_scheduler;
pub mod host_provisioner;
pub mod request_scheduler;
pub mod volume_allocator;

pub use container_scheduler::{ContainerScheduler, PlacementStrategy};
pub use host_provisioner::HostProvisioner;
pub use request_scheduler::RequestScheduler;
pub use volume_allocator::VolumeAllocator;
