//! Module defining the [`Graph`] struct, the dense node graph handed to the technology mapper,
//! as well as [`Node`] and [`GateKind`].
//!
//! A graph is built from a host [`Module`](crate::design::Module) by an [`Extraction`], made
//! acyclic by [`Graph::break_loops`] and then encoded with [`crate::blif::write_netlist`].

pub mod dot;
pub mod error;
pub mod extract;
mod integrity;
pub mod loops;
pub mod node;

use std::collections::{HashMap, HashSet};

pub use error::{GraphError, Result};
pub use extract::{ClockDomain, Extraction};
pub use loops::LoopCut;
pub use node::{GateKind, MAX_FANINS, Node, NodeId};

use crate::design::{SigBit, State};

/// A whole graph: one [`Node`] per distinct canonical signal bit referenced by extracted logic.
///
/// The graph works on canonical bits only, canonicalization through the alias map being the
/// job of the caller (see [`Extraction`]).
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<SigBit, NodeId>,
    /// Initial values recorded before extraction, picked up by nodes on creation.
    init: HashMap<SigBit, State>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Graph::default()
    }

    /// Create an empty graph knowing the initial values of some (canonical) bits.
    pub fn with_init(init: HashMap<SigBit, State>) -> Self {
        Graph {
            init,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Retrieves a node from its id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All nodes, in id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The node standing for `bit`, if it has been referenced.
    pub fn node_of(&self, bit: SigBit) -> Option<NodeId> {
        self.index.get(&bit).copied()
    }

    /// References `bit` as a pure input, creating its node on first reference.
    pub fn reference(&mut self, bit: SigBit) -> NodeId {
        if let Some(&id) = self.index.get(&bit) {
            return id;
        }
        let id = self.nodes.len();
        let init = self.init.get(&bit).copied().unwrap_or(State::Sx);
        self.nodes.push(Node::new(id, bit, init));
        self.index.insert(bit, id);
        id
    }

    /// Returns the node of `bit`, creating it on first reference, and unless `kind` is
    /// [`GateKind::None`] records the gate driving it over `fanins`.
    ///
    /// Upserting the same driver twice is fine, upserting a different driver for an already
    /// driven node is a [`GraphError::DuplicateDriver`].
    ///
    /// ```rust
    /// use blifmap::design::{SigBit, State};
    /// use blifmap::graph::{GateKind, Graph};
    /// let mut g = Graph::new();
    /// let a = g.upsert(SigBit::Const(State::S0), GateKind::None, &[]).unwrap();
    /// let b = g.upsert(SigBit::Const(State::S1), GateKind::None, &[]).unwrap();
    /// let y = g.upsert(SigBit::Const(State::Sx), GateKind::And, &[a, b]).unwrap();
    /// assert_eq!((a, b, y), (0, 1, 2));
    /// // Same driver again: simply retrieves the node
    /// assert_eq!(g.upsert(SigBit::Const(State::Sx), GateKind::And, &[a, b]).unwrap(), y);
    /// // Another driver: refused
    /// assert!(g.upsert(SigBit::Const(State::Sx), GateKind::Or, &[a, b]).is_err());
    /// ```
    pub fn upsert(&mut self, bit: SigBit, kind: GateKind, fanins: &[NodeId]) -> Result<NodeId> {
        let id = self.reference(bit);

        if fanins.len() != kind.arity() {
            return Err(GraphError::FaninCount(id, kind.arity(), fanins.len()));
        }
        if let Some(&missing) = fanins.iter().find(|&&f| f >= self.nodes.len()) {
            return Err(GraphError::NodeDoesNotExist(missing));
        }

        let node = &mut self.nodes[id];
        match node.kind {
            _ if kind == GateKind::None => Ok(id),
            GateKind::None => {
                node.kind = kind;
                for (slot, &fanin) in node.fanins.iter_mut().zip(fanins) {
                    *slot = Some(fanin);
                }
                Ok(id)
            }
            existing if existing == kind && node.get_fanins() == fanins => Ok(id),
            _ => Err(GraphError::DuplicateDriver(id)),
        }
    }

    /// Flags the node of `bit` as boundary. Returns false if `bit` has no node or is a
    /// constant: constants are driven inside the netlist and never cross its boundary.
    pub fn mark_boundary(&mut self, bit: SigBit) -> bool {
        if bit.is_const() {
            return false;
        }
        match self.index.get(&bit) {
            Some(&id) => {
                self.nodes[id].is_boundary = true;
                true
            }
            None => false,
        }
    }

    /// Appends a fresh node for `bit`, which must not have been referenced yet.
    pub(crate) fn push_fresh(&mut self, bit: SigBit) -> Result<NodeId> {
        if let Some(&id) = self.index.get(&bit) {
            return Err(GraphError::InvalidState(format!(
                "fresh bit already referenced by node {}",
                id
            )));
        }
        Ok(self.reference(bit))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Returns a topological sort of the combinational nodes (fanins first), will error if a
    /// cycle is detected.
    ///
    /// Primary inputs and flip-flops are sources: they are neither part of the sort nor
    /// followed, so feedback through a flip-flop is not a cycle.
    pub fn topological_sort(&self) -> Result<Vec<NodeId>> {
        let mut sort = Vec::new();
        let mut seen = HashSet::new();
        let mut done = HashSet::new();

        for root in &self.nodes {
            if root.kind.is_source() || done.contains(&root.id) {
                continue;
            }

            let mut stack: Vec<(NodeId, bool)> = vec![(root.id, false)];
            while let Some((id, last_time)) = stack.pop() {
                // Post order
                if last_time {
                    done.insert(id);
                    sort.push(id);
                    continue;
                }

                if done.contains(&id) {
                    continue;
                } else if seen.contains(&id) {
                    return Err(GraphError::InvalidState(format!(
                        "found a cycle through node {}",
                        id
                    )));
                }

                seen.insert(id);
                stack.push((id, true));

                for fanin in self.nodes[id].distinct_fanins() {
                    if !self.nodes[fanin].kind.is_source() && !done.contains(&fanin) {
                        stack.push((fanin, false));
                    }
                }
            }
        }

        Ok(sort)
    }
}
