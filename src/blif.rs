//! The BLIF interchange format spoken with the technology mapper.
//!
//! [`write_netlist`] encodes an acyclic [`Graph`](crate::graph::Graph) as a single
//! `netlist` model whose nets are named `ys__n<id>` after the graph nodes.
//! [`parse_netlist`] reads the mapped netlist back.

pub mod error;
pub mod parser;
pub mod writer;

pub use error::{BlifError, Result};
pub use parser::{BlifItem, BlifModel, BlifNetlist, parse_netlist, read_netlist};
pub use writer::{EncodedNetlist, write_netlist};

/// Name of the single model exchanged with the mapper.
pub const MODEL_NAME: &str = "netlist";

/// Prefix of the net names derived from node ids.
pub const NODE_PREFIX: &str = "ys__n";

/// Net name of a graph node.
///
/// ```rust
/// assert_eq!(blifmap::blif::node_name(12), "ys__n12");
/// ```
pub fn node_name(id: crate::graph::NodeId) -> String {
    format!("{}{}", NODE_PREFIX, id)
}
