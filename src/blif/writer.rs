use std::fmt::Write;

use crate::blif::{MODEL_NAME, node_name};
use crate::design::{Module, SigBit, State};
use crate::graph::{GateKind, Graph, Node, NodeId};

/// A graph encoded as BLIF, plus what is needed to make sense of the mapper's answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedNetlist {
    /// The BLIF text.
    pub text: String,
    /// Boundary inputs, in `.inputs` order, with their host signal.
    pub inputs: Vec<(NodeId, String)>,
    /// Boundary outputs, in `.outputs` order, with their host signal.
    pub outputs: Vec<(NodeId, String)>,
    /// Number of driven nodes (gates and flip-flops).
    pub gate_count: usize,
    /// Some flip-flop has a known initial value.
    pub has_init: bool,
}

fn latch_init(init: State) -> u8 {
    match init {
        State::S0 => 0,
        State::S1 => 1,
        State::Sx => 2,
    }
}

fn write_node(text: &mut String, node: &Node) -> std::fmt::Result {
    match node.kind {
        GateKind::None => Ok(()),
        GateKind::Ff => {
            let fanins = node.get_fanins();
            writeln!(
                text,
                ".latch {} {} {}",
                node_name(fanins[0]),
                node_name(node.id),
                latch_init(node.init)
            )
        }
        kind => {
            write!(text, ".names")?;
            for fanin in node.get_fanins() {
                write!(text, " {}", node_name(fanin))?;
            }
            writeln!(text, " {}", node_name(node.id))?;
            for cube in kind.cubes() {
                writeln!(text, "{} 1", cube)?;
            }
            Ok(())
        }
    }
}

/// Encodes `graph` as a BLIF `netlist` model. The graph must be acyclic, see
/// [`Graph::break_loops`].
///
/// Boundary nodes without driver are the model inputs (`dummy_input` when there is none),
/// driven boundary nodes are its outputs. `module` only provides the signal names written
/// in comments.
///
/// ```rust
/// use blifmap::blif::write_netlist;
/// use blifmap::design::{Module, SigBit};
/// use blifmap::graph::{GateKind, Graph};
///
/// let mut m = Module::new("top");
/// let a = SigBit::wire(m.add_wire("a", 1).unwrap(), 0);
/// let y = SigBit::wire(m.add_wire("y", 1).unwrap(), 0);
/// let mut g = Graph::new();
/// let na = g.reference(a);
/// g.upsert(y, GateKind::Not, &[na]).unwrap();
/// g.mark_boundary(a);
/// g.mark_boundary(y);
///
/// let netlist = write_netlist(&g, &m);
/// assert!(netlist.text.contains(".names ys__n0 ys__n1\n0 1\n"));
/// assert_eq!(netlist.inputs, vec![(0, "a".to_string())]);
/// ```
pub fn write_netlist(graph: &Graph, module: &Module) -> EncodedNetlist {
    let mut netlist = EncodedNetlist::default();
    // Writing to a String cannot fail
    let _ = write_text(graph, module, &mut netlist);
    netlist
}

fn write_text(graph: &Graph, module: &Module, netlist: &mut EncodedNetlist) -> std::fmt::Result {
    let text = &mut netlist.text;
    writeln!(text, ".model {}", MODEL_NAME)?;

    write!(text, ".inputs")?;
    for node in graph.nodes() {
        if node.is_boundary && !node.is_driven() {
            write!(text, " {}", node_name(node.id))?;
            netlist.inputs.push((node.id, module.describe(node.bit)));
        }
    }
    if netlist.inputs.is_empty() {
        write!(text, " dummy_input")?;
    }
    writeln!(text)?;

    write!(text, ".outputs")?;
    for node in graph.nodes() {
        if node.is_boundary && node.is_driven() {
            write!(text, " {}", node_name(node.id))?;
            netlist.outputs.push((node.id, module.describe(node.bit)));
        }
    }
    writeln!(text)?;

    for node in graph.nodes() {
        writeln!(text, "# {:<10} {}", node_name(node.id), module.describe(node.bit))?;
    }

    for node in graph.nodes() {
        if let SigBit::Const(state) = node.bit {
            writeln!(text, ".names {}", node_name(node.id))?;
            if state == State::S1 {
                writeln!(text, "1")?;
            }
        }
    }

    for node in graph.nodes() {
        write_node(text, node)?;
        if node.is_driven() {
            netlist.gate_count += 1;
        }
        if node.kind == GateKind::Ff && node.init != State::Sx {
            netlist.has_init = true;
        }
    }

    writeln!(text, ".end")
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn xor_test() {
        let mut m = Module::new("m");
        let w = m.add_wire("w", 13).unwrap();
        let mut g = Graph::new();
        let ids: Vec<NodeId> = (0..13).map(|i| g.reference(SigBit::wire(w, i))).collect();
        g.upsert(SigBit::wire(w, 12), GateKind::Xor, &[ids[5], ids[7]])
            .unwrap();

        let text = write_netlist(&g, &m).text;
        assert!(text.contains(".names ys__n5 ys__n7 ys__n12\n01 1\n10 1\n"));
    }

    #[test]
    fn whole_netlist_test() {
        let mut m = Module::new("m");
        let q = SigBit::wire(m.add_wire("q", 1).unwrap(), 0);
        let d = SigBit::wire(m.add_wire("d", 1).unwrap(), 0);
        let mut g = Graph::new();
        let one = g.reference(SigBit::Const(State::S1));
        let nq = g.reference(q);
        let nd = g.upsert(d, GateKind::And, &[nq, one]).unwrap();
        g.upsert(q, GateKind::Ff, &[nd]).unwrap();
        g.mark_boundary(q);

        let netlist = write_netlist(&g, &m);
        let expected = "\
.model netlist
.inputs dummy_input
.outputs ys__n1
# ys__n0     1'1
# ys__n1     q
# ys__n2     d
.names ys__n0
1
.latch ys__n2 ys__n1 2
.names ys__n1 ys__n0 ys__n2
11 1
.end
";
        assert_eq!(netlist.text, expected);
        assert!(netlist.inputs.is_empty());
        assert_eq!(netlist.outputs, vec![(1, "q".to_string())]);
        assert_eq!(netlist.gate_count, 2);
        assert!(!netlist.has_init);
    }

    #[test]
    fn boundary_completeness_test() {
        let mut m = Module::new("m");
        let w = m.add_wire("w", 6).unwrap();
        let mut g = Graph::new();
        let n: Vec<NodeId> = (0..4).map(|i| g.reference(SigBit::wire(w, i))).collect();
        g.upsert(SigBit::wire(w, 4), GateKind::Aoi4, &n).unwrap();
        g.upsert(SigBit::wire(w, 5), GateKind::Ff, &[4]).unwrap();
        for i in 0..6 {
            g.mark_boundary(SigBit::wire(w, i));
        }

        let netlist = write_netlist(&g, &m);
        let inputs: Vec<NodeId> = netlist.inputs.iter().map(|(id, _)| *id).collect();
        let outputs: Vec<NodeId> = netlist.outputs.iter().map(|(id, _)| *id).collect();
        assert_eq!(inputs, vec![0, 1, 2, 3]);
        assert_eq!(outputs, vec![4, 5]);
        assert!(netlist.text.contains(".inputs ys__n0 ys__n1 ys__n2 ys__n3\n"));
        assert!(netlist.text.contains(".outputs ys__n4 ys__n5\n"));
        assert!(netlist.text.contains("-0-0 1\n-00- 1\n0--0 1\n0-0- 1\n"));
    }

    #[test]
    fn latch_init_test() {
        let mut m = Module::new("m");
        let w = m.add_wire("w", 2).unwrap();
        let mut g = Graph::with_init([(SigBit::wire(w, 1), State::S0)].into());
        let d = g.reference(SigBit::wire(w, 0));
        g.upsert(SigBit::wire(w, 1), GateKind::Ff, &[d]).unwrap();
        let netlist = write_netlist(&g, &m);
        assert!(netlist.text.contains(".latch ys__n0 ys__n1 0\n"));
        assert!(netlist.has_init);
    }
}
