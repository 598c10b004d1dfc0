//! Persistent volumes

use crate::entity::node::MIB;
use crate::entity::{ContainerId, EntityCore, NodeId};

#[derive(Debug)]
pub struct Volume {
    pub entity: EntityCore,
    pub tag: String,
    pub path: String,
    /// bytes
    pub size: u64,
    /// Retained volumes survive their container and re-attach to its
    /// replacement; others terminate with it.
    pub retain: bool,
    pub taint: Option<String>,
    pub container: Option<ContainerId>,
    pub host: Option<NodeId>,
    pub attached: bool,
    pub allocated: bool,
}

impl Volume {
    pub fn new(
        entity: EntityCore,
        tag: String,
        path: String,
        size_mib: u64,
        retain: bool,
        taint: Option<String>,
    ) -> Self {
        Self {
            entity,
            tag,
            path,
            size: size_mib * MIB,
            retain,
            taint,
            container: None,
            host: None,
            attached: false,
            allocated: false,
        }
    }
}
