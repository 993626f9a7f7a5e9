//! Breaking combinational loops.
//!
//! This is a variant of Kahn's topological sort (Kahn, Arthur B. (1962), "Topological
//! sorting of large networks") that does not give up on cycles: when no node is ready
//! anymore, one node with remaining fanouts is cut. Its consumers are moved over to a
//! fresh input node, tied back to the cut node by a host level connection.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::design::{IdAllocator, Module, SigBit};
use crate::graph::{Graph, NodeId, Result, dot};

/// A cut performed by [`Graph::break_loops`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopCut {
    /// The node whose fanouts were severed.
    pub from: NodeId,
    /// The fresh input node now read by the consumers.
    pub to: NodeId,
    /// The consumers, in increasing id order.
    pub consumers: Vec<NodeId>,
}

/// Working state of the loop breaker.
pub(super) struct LoopState {
    /// Remaining fanouts of each node.
    pub(super) edges: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Remaining distinct fanins of each node.
    pub(super) in_count: Vec<usize>,
    /// Nodes ready to be retired.
    pub(super) workpool: BTreeSet<NodeId>,
}

impl LoopState {
    fn new(graph: &Graph) -> Self {
        let mut state = LoopState {
            edges: BTreeMap::new(),
            in_count: vec![0; graph.len()],
            workpool: BTreeSet::new(),
        };
        for node in graph.nodes() {
            if node.kind.is_source() {
                state.workpool.insert(node.id);
                continue;
            }
            for fanin in node.distinct_fanins() {
                state.edges.entry(fanin).or_default().insert(node.id);
                state.in_count[node.id] += 1;
            }
        }
        state
    }

    fn out_degree(&self, id: NodeId) -> usize {
        self.edges.get(&id).map_or(0, BTreeSet::len)
    }

    /// Retires every ready node, and the nodes it makes ready.
    fn drain(&mut self, slides: &mut Option<&mut Vec<String>>, graph: &Graph, module: &Module) {
        while let Some(id) = self.workpool.pop_first() {
            for id2 in self.edges.remove(&id).unwrap_or_default() {
                assert!(
                    self.in_count[id2] > 0,
                    "in-degree underflow on node {}",
                    id2
                );
                self.in_count[id2] -= 1;
                if self.in_count[id2] == 0 {
                    self.workpool.insert(id2);
                }
            }
            if let Some(slides) = slides {
                let nr = slides.len() + 1;
                slides.push(dot::loop_slide(graph, module, self, nr));
            }
        }
    }

    /// Picks the node to cut among the ones still having fanouts.
    ///
    /// Nodes backed by a wire win over constants, then public wires over internal ones,
    /// then the larger out-degree, then the smaller wire name.
    fn select(&self, graph: &Graph, module: &Module) -> Option<NodeId> {
        let mut keys = self.edges.keys().copied();
        let mut id1 = keys.next()?;
        for id2 in keys {
            let w1 = graph.nodes[id1].bit.get_wire().map(|w| module.wire(w));
            let w2 = graph.nodes[id2].bit.get_wire().map(|w| module.wire(w));
            let (w1, w2) = match (w1, w2) {
                (None, _) => {
                    id1 = id2;
                    continue;
                }
                (_, None) => continue,
                (Some(w1), Some(w2)) => (w1, w2),
            };
            if w1.is_internal() && !w2.is_internal() {
                id1 = id2;
            } else if !w1.is_internal() && w2.is_internal() {
                continue;
            } else if self.out_degree(id1) < self.out_degree(id2) {
                id1 = id2;
            } else if self.out_degree(id1) > self.out_degree(id2) {
                continue;
            } else if w2.name < w1.name {
                id1 = id2;
            }
        }
        Some(id1)
    }
}

impl Graph {
    /// Makes the graph acyclic, returning the cuts performed.
    ///
    /// Every cut adds a wire `$<tag>loop$<n>` to `module`, `n` coming from `ids`, driven by
    /// the cut node through a new module connection. The cut node and the fresh node
    /// reading the wire are both flagged boundary.
    ///
    /// The outcome only depends on the graph and the wire names: the same graph is always
    /// cut the same way. An acyclic graph is left untouched.
    ///
    /// ```rust
    /// use blifmap::design::{IdAllocator, Module, SigBit};
    /// use blifmap::graph::{GateKind, Graph};
    /// let mut m = Module::new("top");
    /// let a = SigBit::wire(m.add_wire("a", 1).unwrap(), 0);
    /// let b = SigBit::wire(m.add_wire("$b", 1).unwrap(), 0);
    /// let mut g = Graph::new();
    /// let na = g.reference(a);
    /// let nb = g.upsert(b, GateKind::Not, &[na]).unwrap();
    /// g.upsert(a, GateKind::Not, &[nb]).unwrap();
    ///
    /// let cuts = g.break_loops(&mut m, &mut IdAllocator::new(), "cirkit").unwrap();
    /// assert_eq!(cuts.len(), 1);
    /// // The public wire is the one cut
    /// assert_eq!(cuts[0].from, na);
    /// assert_eq!(g.len(), 3);
    /// assert!(g.topological_sort().is_ok());
    /// assert_eq!(m.connections().len(), 1);
    /// ```
    pub fn break_loops(
        &mut self,
        module: &mut Module,
        ids: &mut IdAllocator,
        tag: &str,
    ) -> Result<Vec<LoopCut>> {
        self.break_loops_traced(module, ids, tag, None)
    }

    /// Same as [`Graph::break_loops`], also rendering the loop breaker state to a Graphviz
    /// slide after each step.
    pub fn break_loops_with_slides(
        &mut self,
        module: &mut Module,
        ids: &mut IdAllocator,
        tag: &str,
    ) -> Result<(Vec<LoopCut>, Vec<String>)> {
        let mut slides = Vec::new();
        let cuts = self.break_loops_traced(module, ids, tag, Some(&mut slides))?;
        Ok((cuts, slides))
    }

    fn break_loops_traced(
        &mut self,
        module: &mut Module,
        ids: &mut IdAllocator,
        tag: &str,
        mut slides: Option<&mut Vec<String>>,
    ) -> Result<Vec<LoopCut>> {
        let mut state = LoopState::new(self);
        let mut cuts = Vec::new();
        if let Some(slides) = &mut slides {
            slides.push(dot::loop_slide(self, module, &state, 1));
        }

        loop {
            state.drain(&mut slides, self, module);

            let Some(id1) = state.select(self, module) else {
                break;
            };
            if state.out_degree(id1) == 0 {
                // Leftover of a node retired or cut earlier
                state.edges.remove(&id1);
                continue;
            }

            assert!(
                !self.nodes[id1].bit.is_const(),
                "cutting node {} which is not backed by a wire",
                id1
            );

            let name = format!("${}loop${}", tag, ids.next_index());
            let wire = module.add_wire(name.as_str(), 1)?;
            let bit3 = SigBit::wire(wire, 0);
            let id3 = self.push_fresh(bit3)?;
            assert_eq!(id3, state.in_count.len());
            state.in_count.push(0);
            self.nodes[id1].is_boundary = true;
            self.nodes[id3].is_boundary = true;

            let consumers = state.edges.remove(&id1).unwrap_or_default();
            for (k, &id2) in consumers.iter().enumerate() {
                let edge = format!(
                    "{} -> {}",
                    module.describe(self.nodes[id1].bit),
                    module.describe(self.nodes[id2].bit)
                );
                if k == 0 {
                    info!("Breaking loop using new signal {}: {}", name, edge);
                } else {
                    info!("{:w$}  {}", "", edge, w = 31 + name.len());
                }
                self.nodes[id2].replace_fanin(id1, id3);
            }

            module.connect(bit3, self.nodes[id1].bit)?;
            cuts.push(LoopCut {
                from: id1,
                to: id3,
                consumers: consumers.iter().copied().collect(),
            });
            state.edges.insert(id3, consumers);
            state.workpool.insert(id3);

            if let Some(slides) = &mut slides {
                let nr = slides.len() + 1;
                slides.push(dot::loop_slide(self, module, &state, nr));
            }
        }

        debug!("Loop breaking done with {} cuts", cuts.len());
        Ok(cuts)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::design::SigSpec;
    use crate::graph::GateKind;

    fn wires(m: &mut Module, names: &[&str]) -> Vec<SigBit> {
        names
            .iter()
            .map(|name| SigBit::wire(m.add_wire(*name, 1).unwrap(), 0))
            .collect()
    }

    #[test]
    fn two_inverters_test() {
        let mut m = Module::new("m");
        let bits = wires(&mut m, &["$a", "b"]);
        let mut g = Graph::new();
        let a = g.reference(bits[0]);
        let b = g.upsert(bits[1], GateKind::Not, &[a]).unwrap();
        g.upsert(bits[0], GateKind::Not, &[b]).unwrap();

        let mut ids = IdAllocator::new();
        let cuts = g.break_loops(&mut m, &mut ids, "cirkit").unwrap();
        assert_eq!(
            cuts,
            vec![LoopCut {
                from: b,
                to: 2,
                consumers: vec![a]
            }]
        );
        assert_eq!(g.len(), 3);
        assert_eq!(g.get_node(a).unwrap().get_fanins(), vec![2]);
        assert!(g.get_node(b).unwrap().is_boundary);
        assert!(g.get_node(2).unwrap().is_boundary);
        assert!(!g.get_node(a).unwrap().is_boundary);
        assert!(g.check_integrity().is_ok());

        let loop_wire = m.wire_by_name("$cirkitloop$1").unwrap();
        assert_eq!(
            m.connections(),
            &[(SigSpec::from(SigBit::wire(loop_wire, 0)), SigSpec::from(bits[1]))]
        );
    }

    #[test]
    fn acyclic_untouched_test() {
        let mut m = Module::new("m");
        let bits = wires(&mut m, &["x", "q", "d"]);
        let mut g = Graph::new();
        let x = g.reference(bits[0]);
        let q = g.reference(bits[1]);
        let d = g.upsert(bits[2], GateKind::And, &[q, x]).unwrap();
        // Feedback through a flip-flop
        g.upsert(bits[1], GateKind::Ff, &[d]).unwrap();
        let before = g.clone();

        let cuts = g.break_loops(&mut m, &mut IdAllocator::new(), "cirkit").unwrap();
        assert!(cuts.is_empty());
        assert_eq!(g.nodes(), before.nodes());
        assert!(m.connections().is_empty());
    }

    #[test]
    fn tie_break_test() {
        // Two loops through c: c = AND(a, b), a = NOT(c), b = NOT(c)
        let mut m = Module::new("m");
        let bits = wires(&mut m, &["$c", "a", "b"]);
        let mut g = Graph::new();
        let c = g.reference(bits[0]);
        let a = g.upsert(bits[1], GateKind::Not, &[c]).unwrap();
        let b = g.upsert(bits[2], GateKind::Not, &[c]).unwrap();
        g.upsert(bits[0], GateKind::And, &[a, b]).unwrap();

        let cuts = g.break_loops(&mut m, &mut IdAllocator::new(), "t").unwrap();
        // c has the larger out-degree but an internal name, a wins over b by name
        assert_eq!(cuts.len(), 2);
        assert_eq!((cuts[0].from, cuts[0].to), (a, 3));
        assert_eq!((cuts[1].from, cuts[1].to), (b, 4));
        assert_eq!(cuts[0].consumers, vec![c]);
        assert!(g.topological_sort().is_ok());
        assert_eq!(g.get_node(c).unwrap().get_fanins(), vec![3, 4]);
        assert!(m.wire_by_name("$tloop$1").is_some());
        assert!(m.wire_by_name("$tloop$2").is_some());
    }

    #[test]
    fn out_degree_tie_break_test() {
        // c feeds both a and b, it is cut before the public names are compared
        let mut m = Module::new("m");
        let bits = wires(&mut m, &["c", "a", "b"]);
        let mut g = Graph::new();
        let c = g.reference(bits[0]);
        let a = g.upsert(bits[1], GateKind::Not, &[c]).unwrap();
        let b = g.upsert(bits[2], GateKind::Not, &[c]).unwrap();
        g.upsert(bits[0], GateKind::Or, &[a, b]).unwrap();

        let cuts = g.break_loops(&mut m, &mut IdAllocator::new(), "t").unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].from, c);
        assert_eq!(cuts[0].consumers, vec![a, b]);
    }

    #[test]
    fn self_loop_test() {
        let mut m = Module::new("m");
        let bits = wires(&mut m, &["y"]);
        let mut g = Graph::new();
        let y = g.reference(bits[0]);
        g.upsert(bits[0], GateKind::And, &[y, y]).unwrap();

        let cuts = g.break_loops(&mut m, &mut IdAllocator::new(), "t").unwrap();
        assert_eq!(cuts.len(), 1);
        assert_eq!(g.get_node(y).unwrap().get_fanins(), vec![1, 1]);
    }

    #[test]
    fn determinism_test() {
        let build = || {
            let mut m = Module::new("m");
            let bits = wires(&mut m, &["$n1", "$n2", "$n3", "p", "$n4"]);
            let mut g = Graph::new();
            let n: Vec<NodeId> = bits.iter().map(|&bit| g.reference(bit)).collect();
            g.upsert(bits[0], GateKind::Xor, &[n[1], n[3]]).unwrap();
            g.upsert(bits[1], GateKind::Nand, &[n[2], n[0]]).unwrap();
            g.upsert(bits[2], GateKind::Mux, &[n[0], n[1], n[4]]).unwrap();
            g.upsert(bits[4], GateKind::Not, &[n[2]]).unwrap();
            (m, g)
        };

        let (mut m1, mut g1) = build();
        let (mut m2, mut g2) = build();
        let mut ids1 = IdAllocator::new();
        let mut ids2 = IdAllocator::new();
        let cuts1 = g1.break_loops(&mut m1, &mut ids1, "t").unwrap();
        let cuts2 = g2.break_loops(&mut m2, &mut ids2, "t").unwrap();
        assert!(!cuts1.is_empty());
        assert_eq!(cuts1, cuts2);
        assert_eq!(g1.nodes(), g2.nodes());
        assert!(g1.check_integrity().is_ok());
    }

    #[test]
    fn slides_test() {
        let mut m = Module::new("m");
        let bits = wires(&mut m, &["a", "b"]);
        let mut g = Graph::new();
        let a = g.reference(bits[0]);
        let b = g.upsert(bits[1], GateKind::Buf, &[a]).unwrap();
        g.upsert(bits[0], GateKind::Not, &[b]).unwrap();

        let (cuts, slides) = g
            .break_loops_with_slides(&mut m, &mut IdAllocator::new(), "t")
            .unwrap();
        assert_eq!(cuts.len(), 1);
        // Initial state, the cut, then one per retired node
        assert_eq!(slides.len(), 5);
        assert!(slides[0].starts_with("digraph \"slide1\""));
        assert!(slides[1].contains("ys__n2"));
    }
}
