use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::gameplay::Move;
use crate::model::{GameState, StateId, get_winning_state_id};

/// Stable handle into the graph's node arena.
pub type NodeId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub target: NodeId,
    pub mv: Move,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub state: GameState,
    pub id: StateId,
    /// Breadth-first distance from the start state; first discovery is final.
    pub distance_from_start: u32,
    /// Breadth-first distance to the winning state over parent edges.
    /// `None` means the win is unreachable from this state.
    pub distance_from_win: Option<u32>,
    pub parents: Vec<Edge>,
    pub children: Vec<Edge>,
}

/// The full reachable state space of one starting configuration: an
/// append-only node arena plus a canonical-id index. Built once per analysis
/// session and read-only afterwards; a new configuration means a new graph.
///
/// Several moves can join the same pair of canonical states; such duplicate
/// edges are kept on purpose, since random-play probabilities weight each
/// move separately.
pub struct ReachabilityGraph {
    nodes: Vec<Node>,
    index: HashMap<StateId, NodeId>,
    start: NodeId,
    winning_id: StateId,
}

impl ReachabilityGraph {
    /// Crawls the whole state space reachable from `start`.
    pub fn build(start: &GameState) -> Self {
        match Self::build_cancelable(start, &AtomicBool::new(false)) {
            Some(graph) => graph,
            None => unreachable!("crawl canceled without a cancel requester"),
        }
    }

    /// Crawls the state space, giving up with `None` once `cancel` is set.
    pub fn build_cancelable(start: &GameState, cancel: &AtomicBool) -> Option<Self> {
        let start_id = start.get_state_id();
        let mut nodes = vec![Node {
            state: start.clone(),
            id: start_id.clone(),
            distance_from_start: 0,
            distance_from_win: None,
            parents: Vec::new(),
            children: Vec::new(),
        }];
        let mut index: HashMap<StateId, NodeId> = HashMap::from([(start_id, 0)]);
        let mut frontier: VecDeque<NodeId> = VecDeque::from([0]);

        while let Some(node_id) = frontier.pop_front() {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let moved_states = nodes[node_id].state.get_valid_moved_states();
            let next_distance = nodes[node_id].distance_from_start + 1;
            for moved in moved_states {
                let child_id = match index.get(&moved.id) {
                    Some(&known) => known,
                    None => {
                        let new_id = nodes.len();
                        index.insert(moved.id.clone(), new_id);
                        nodes.push(Node {
                            state: moved.state,
                            id: moved.id,
                            distance_from_start: next_distance,
                            distance_from_win: None,
                            parents: Vec::new(),
                            children: Vec::new(),
                        });
                        frontier.push_back(new_id);
                        new_id
                    }
                };
                nodes[child_id].parents.push(Edge {
                    target: node_id,
                    mv: moved.mv,
                });
                nodes[node_id].children.push(Edge {
                    target: child_id,
                    mv: moved.mv,
                });
            }
        }

        // The frontier is exhausted; walk parent edges backwards from the
        // winning arrangement to mark which states can still win.
        let winning_id = get_winning_state_id(start.params);
        let mut backwards: VecDeque<(NodeId, u32)> = VecDeque::new();
        if let Some(&win_node) = index.get(&winning_id) {
            backwards.push_back((win_node, 0));
        }
        while let Some((node_id, distance)) = backwards.pop_front() {
            if nodes[node_id].distance_from_win.is_some() {
                continue;
            }
            nodes[node_id].distance_from_win = Some(distance);
            for edge in &nodes[node_id].parents {
                backwards.push_back((edge.target, distance + 1));
            }
        }

        debug!(
            states = nodes.len(),
            winnable = nodes[0].distance_from_win.is_some(),
            "state space crawled"
        );
        Some(Self {
            nodes,
            index,
            start: 0,
            winning_id,
        })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn lookup(&self, id: &StateId) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    /// Resolves an id that the caller asserts belongs to this graph. A miss
    /// is a caller/graph mismatch, not a puzzle-state error.
    pub fn require(&self, id: &StateId) -> NodeId {
        match self.lookup(id) {
            Some(node_id) => node_id,
            None => panic!("state {id} is not part of this reachability graph"),
        }
    }

    /// The id of the solved arrangement for this puzzle's parameters.
    pub fn winning_id(&self) -> &StateId {
        &self.winning_id
    }

    /// The solved arrangement's node, when the crawl discovered it at all.
    pub fn winning_node(&self) -> Option<NodeId> {
        self.lookup(&self.winning_id)
    }

    /// Whether the starting configuration can reach the solved arrangement.
    pub fn is_winnable(&self) -> bool {
        self.nodes[self.start].distance_from_win.is_some()
    }
}
