//! This module performs reachability analysis on a flow graph and uses it to find
//! the join gateway which closes a split.
//!
//! The join is chosen heuristically: among the gateways of the split's kind that every
//! branch reaches and that merge more than one edge, we take the one whose slowest branch
//! arrives first. This is not a post-dominator computation and can pick the wrong gateway
//! when merges criss-cross.

use std::collections::{HashMap, VecDeque};

use super::{FlowGraph, GatewayKind, NodeId, NodeKind};

/// Everything reachable from one node, with the shortest number of edges to get there
#[derive(Debug, Clone)]
pub struct Reach {
    /// Reached nodes in breadth-first discovery order, starting with the origin
    pub order: Vec<NodeId>,
    pub distance: HashMap<NodeId, usize, ahash::RandomState>,
}

impl Reach {
    pub fn contains(&self, id: &NodeId) -> bool {
        self.distance.contains_key(id)
    }
}

impl FlowGraph {
    /// Breadth-first search over successors, recording the shortest distance to every reached node
    pub fn reach(&self, origin: NodeId) -> Reach {
        let mut order = vec![origin];
        let mut distance = HashMap::default();
        distance.insert(origin, 0);
        let mut queue = VecDeque::from([origin]);
        while let Some(node) = queue.pop_front() {
            let next = distance[&node] + 1;
            for &successor in self.successors(node) {
                if !distance.contains_key(&successor) {
                    distance.insert(successor, next);
                    order.push(successor);
                    queue.push_back(successor);
                }
            }
        }
        Reach { order, distance }
    }

    /// Find the gateway where the branches leaving `split` come back together.
    /// Returns `None` if the split has fewer than two successors or the branches never
    /// reconverge at a merging gateway of the same kind.
    pub fn find_join(&self, split: NodeId, kind: GatewayKind) -> Option<NodeId> {
        let outgoing = self.successors(split);
        if outgoing.len() <= 1 {
            return None;
        }
        let branches: Vec<Reach> = outgoing.iter().map(|&origin| self.reach(origin)).collect();

        // Candidates are visited in the first branch's discovery order, so ties go to the nearer node
        let join = branches[0]
            .order
            .iter()
            .copied()
            .filter(|node| branches[1..].iter().all(|branch| branch.contains(node)))
            .filter(|&node| {
                self.kind_of(node) == NodeKind::Gateway(kind) && self.in_degree(node) > 1
            })
            .min_by_key(|node| {
                branches
                    .iter()
                    .map(|branch| branch.distance[node])
                    .max()
                    .unwrap_or(usize::MAX)
            });

        match join {
            Some(join) => log::trace!("split {} joins at {}", self.node(split).id, self.node(join).id),
            None => log::trace!("split {} has no join", self.node(split).id),
        }
        join
    }
}
