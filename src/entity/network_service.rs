//! Network services: bidirectional microservice graphs

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::entity::{EntityCore, MicroserviceId};

/// A network service groups microservices into a bidirectional graph with
/// designated entry and exit sets; SFCs bound to it must enter and leave
/// through those sets.
#[derive(Debug)]
pub struct NetworkService {
    pub entity: EntityCore,
    pub microservices: Vec<MicroserviceId>,
    pub links: Vec<(MicroserviceId, MicroserviceId)>,
    pub graph: DiGraph<MicroserviceId, ()>,
    pub entry: Vec<MicroserviceId>,
    pub exit: Vec<MicroserviceId>,
}

impl NetworkService {
    pub fn new(
        entity: EntityCore,
        microservices: Vec<MicroserviceId>,
        links: Vec<(MicroserviceId, MicroserviceId)>,
        entry: Vec<MicroserviceId>,
        exit: Vec<MicroserviceId>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<MicroserviceId, NodeIndex> = HashMap::new();
        for &ms in &microservices {
            indices.entry(ms).or_insert_with(|| graph.add_node(ms));
        }
        for &(a, b) in &links {
            if let (Some(&ia), Some(&ib)) = (indices.get(&a), indices.get(&b)) {
                graph.add_edge(ia, ib, ());
                graph.add_edge(ib, ia, ());
            }
        }
        Self {
            entity,
            microservices,
            links,
            graph,
            entry,
            exit,
        }
    }

    pub fn contains(&self, ms: MicroserviceId) -> bool {
        self.microservices.contains(&ms)
    }

    pub fn accepts_entry(&self, ms: MicroserviceId) -> bool {
        self.entry.contains(&ms)
    }

    pub fn accepts_exit(&self, ms: MicroserviceId) -> bool {
        self.exit.contains(&ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_bidirectional() {
        let ns = NetworkService::new(
            EntityCore::new("ns".into()),
            vec![MicroserviceId(0), MicroserviceId(1)],
            vec![(MicroserviceId(0), MicroserviceId(1))],
            vec![MicroserviceId(0)],
            vec![MicroserviceId(1)],
        );
        assert_eq!(ns.graph.edge_count(), 2);
        assert!(ns.accepts_entry(MicroserviceId(0)));
        assert!(!ns.accepts_entry(MicroserviceId(1)));
    }
}
