//! Service function chains

use crate::entity::request::RequestKind;
use crate::entity::{EntityCore, MicroserviceId, NetworkServiceId};
use crate::status::Status;

/// One microservice-to-microservice link of a chain.
#[derive(Debug, Clone, Copy)]
pub struct SfcLink {
    pub source: MicroserviceId,
    pub target: MicroserviceId,
    pub kind: RequestKind,
}

/// An ordered chain of request links, optionally opened and closed by
/// user-facing entry/exit requests and optionally bound to a network
/// service that constrains its endpoints.
#[derive(Debug)]
pub struct Sfc {
    pub entity: EntityCore,
    pub entry: Option<(MicroserviceId, RequestKind)>,
    pub exit: Option<(MicroserviceId, RequestKind)>,
    pub path: Vec<SfcLink>,
    pub network_service: Option<NetworkServiceId>,
    /// Internal chains skip the user-facing head and tail requests.
    pub internal: bool,
    /// Every microservice participating in the chain.
    pub microservices: Vec<MicroserviceId>,
}

impl Sfc {
    pub fn participants(
        entry: Option<(MicroserviceId, RequestKind)>,
        exit: Option<(MicroserviceId, RequestKind)>,
        path: &[SfcLink],
    ) -> Vec<MicroserviceId> {
        let mut microservices = Vec::new();
        let mut push = |ms: MicroserviceId| {
            if !microservices.contains(&ms) {
                microservices.push(ms);
            }
        };
        if let Some((ms, _)) = entry {
            push(ms);
        }
        for link in path {
            push(link.source);
            push(link.target);
        }
        if let Some((ms, _)) = exit {
            push(ms);
        }
        microservices
    }

    pub fn ready(&self) -> bool {
        self.entity.status.contains(Status::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participants_are_deduplicated_in_order() {
        let path = [
            SfcLink {
                source: MicroserviceId(0),
                target: MicroserviceId(1),
                kind: RequestKind::Get,
            },
            SfcLink {
                source: MicroserviceId(1),
                target: MicroserviceId(2),
                kind: RequestKind::Get,
            },
        ];
        let participants = Sfc::participants(
            Some((MicroserviceId(0), RequestKind::Get)),
            Some((MicroserviceId(2), RequestKind::Post)),
            &path,
        );
        assert_eq!(
            participants,
            vec![MicroserviceId(0), MicroserviceId(1), MicroserviceId(2)]
        );
    }
}
