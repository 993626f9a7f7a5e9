//! Graphviz rendering of graphs, and of the loop breaker state for troubleshooting.
//!
//! ```rust
//! use blifmap::design::{Module, SigBit};
//! use blifmap::graph::{GateKind, Graph};
//! use blifmap::graph::dot::GraphvizStyle;
//!
//! let mut m = Module::new("top");
//! let a = SigBit::wire(m.add_wire("a", 1).unwrap(), 0);
//! let y = SigBit::wire(m.add_wire("y", 1).unwrap(), 0);
//! let mut g = Graph::new();
//! let na = g.reference(a);
//! g.upsert(y, GateKind::Not, &[na]).unwrap();
//! println!("{}", g.to_dot(&m, GraphvizStyle::default()));
//! ```
//!
//! You can then render the graphs using the DOT engine.

use std::fmt::Display;

use crate::design::Module;
use crate::graph::{GateKind, Graph, Node, loops::LoopState};

// Defining default global style.
const DEFAULT_RANKDIR: &str = "BT";

// Defining default style for nodes.
const DEFAULT_INPUT_NODE_FORMAT: &str = "[shape=box]";
const DEFAULT_FF_NODE_FORMAT: &str = "[shape=diamond]";
const DEFAULT_GATE_NODE_FORMAT: &str = "[shape=circle]";
const DEFAULT_BOUNDARY_NODE_FORMAT: &str = "[peripheries=2]";

// Defining default style for edges.
const DEFAULT_EDGE_ALL_FORMAT: &str = "[arrowsize=0.3]";
const DEFAULT_EDGE_FF_FORMAT: &str = "[style=\"dashed\"]";

/// String containing a graphviz style (you must manually include square brackets).
#[derive(Debug, Clone)]
pub struct GraphvizAttr(String);

impl Display for GraphvizAttr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GraphvizAttr {
    fn from(value: &str) -> Self {
        GraphvizAttr(value.to_string())
    }
}

/// Parameters for Graphviz rendering.
///
/// ### Nodes
/// - primary inputs (`input`), flip-flops (`ff`) and combinational gates (`gate`)
/// - `boundary` is added on top of the above for boundary nodes.
///
/// ### Edges
/// All edges implement the `edge_all` style, edges pointing at a flip-flop also get `edge_ff`.
#[derive(Debug, Clone)]
pub struct GraphvizStyle {
    pub rankdir: String,
    pub input: GraphvizAttr,
    pub ff: GraphvizAttr,
    pub gate: GraphvizAttr,
    pub boundary: GraphvizAttr,
    pub edge_all: GraphvizAttr,
    pub edge_ff: GraphvizAttr,
}

impl Default for GraphvizStyle {
    fn default() -> Self {
        GraphvizStyle {
            rankdir: DEFAULT_RANKDIR.to_string(),
            input: DEFAULT_INPUT_NODE_FORMAT.into(),
            ff: DEFAULT_FF_NODE_FORMAT.into(),
            gate: DEFAULT_GATE_NODE_FORMAT.into(),
            boundary: DEFAULT_BOUNDARY_NODE_FORMAT.into(),
            edge_all: DEFAULT_EDGE_ALL_FORMAT.into(),
            edge_ff: DEFAULT_EDGE_FF_FORMAT.into(),
        }
    }
}

/// Quoting for labels, host names may contain anything.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn graphviz_id(node: &Node) -> String {
    format!("ys__n{}", node.id)
}

impl Graph {
    /// Returns a DOT representation of the graph, labelling nodes with the host signals of
    /// `module`.
    pub fn to_dot(&self, module: &Module, style: GraphvizStyle) -> String {
        let mut decl_nodes = String::new();
        let mut decl_edges = String::new();

        for node in &self.nodes {
            let shape = match node.kind {
                GateKind::None => &style.input,
                GateKind::Ff => &style.ff,
                _ => &style.gate,
            };
            let boundary = if node.is_boundary {
                style.boundary.to_string()
            } else {
                String::new()
            };
            decl_nodes.push_str(&format!(
                "    {} {}{} [label=\"{}\\n{:?}\"]\n",
                graphviz_id(node),
                shape,
                boundary,
                escape(&module.describe(node.bit)),
                node.kind
            ));
            for fanin in node.distinct_fanins() {
                let edge_style = if node.kind == GateKind::Ff {
                    style.edge_ff.to_string()
                } else {
                    String::new()
                };
                decl_edges.push_str(&format!(
                    "    ys__n{} -> {} {}\n",
                    fanin,
                    graphviz_id(node),
                    edge_style
                ));
            }
        }

        format!(
            "strict digraph {{\n    rankdir=\"{}\"\n    edge {}\n{}{}}}\n",
            style.rankdir, style.edge_all, decl_nodes, decl_edges
        )
    }
}

/// One slide of the loop breaker: the nodes still having edges, their remaining in-degree,
/// ready nodes drawn as boxes.
pub(super) fn loop_slide(graph: &Graph, module: &Module, state: &LoopState, nr: usize) -> String {
    let mut slide = format!(
        "digraph \"slide{}\" {{\n  label=\"slide{}\";\n  rankdir=\"TD\";\n",
        nr, nr
    );

    let mut nodes = std::collections::BTreeSet::new();
    for (from, to) in &state.edges {
        nodes.insert(*from);
        nodes.extend(to.iter().copied());
    }

    for n in nodes {
        slide.push_str(&format!(
            "  ys__n{} [label=\"{}\\nid={}, count={}\"{}];\n",
            n,
            escape(&module.describe(graph.nodes[n].bit)),
            n,
            state.in_count[n],
            if state.workpool.contains(&n) {
                ", shape=box"
            } else {
                ""
            }
        ));
    }

    for (from, to) in &state.edges {
        for n in to {
            slide.push_str(&format!("  ys__n{} -> ys__n{};\n", from, n));
        }
    }

    slide.push_str("}\n");
    slide
}
