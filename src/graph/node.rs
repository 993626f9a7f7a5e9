use crate::design::{CellKind, SigBit, State};

/// A node id.
///
/// Ids are dense: they are handed out in first-reference order starting at 0 and index
/// directly into [`Graph`](super::Graph) storage.
pub type NodeId = usize;

/// Maximum number of fanins of a node.
pub const MAX_FANINS: usize = 4;

/// What drives a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    /// Not driven by any extracted logic: a primary input of the graph.
    None,
    /// A flip-flop, its only fanin being its data input.
    Ff,
    Buf,
    Not,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
    AndNot,
    OrNot,
    /// `Y = S ? B : A`, fanins ordered A, B, S.
    Mux,
    /// `Y = !((A & B) | C)`.
    Aoi3,
    /// `Y = !((A | B) & C)`.
    Oai3,
    /// `Y = !((A & B) | (C & D))`.
    Aoi4,
    /// `Y = !((A | B) & (C | D))`.
    Oai4,
}

impl GateKind {
    /// Number of fanins the gate reads.
    pub fn arity(self) -> usize {
        match self {
            GateKind::None => 0,
            GateKind::Ff | GateKind::Buf | GateKind::Not => 1,
            GateKind::And
            | GateKind::Nand
            | GateKind::Or
            | GateKind::Nor
            | GateKind::Xor
            | GateKind::Xnor
            | GateKind::AndNot
            | GateKind::OrNot => 2,
            GateKind::Mux | GateKind::Aoi3 | GateKind::Oai3 => 3,
            GateKind::Aoi4 | GateKind::Oai4 => 4,
        }
    }

    /// Sources are resolved without looking at their fanins: primary inputs and flip-flops.
    pub fn is_source(self) -> bool {
        matches!(self, GateKind::None | GateKind::Ff)
    }

    /// Truth table of a combinational gate as on-set cubes over its fanins.
    ///
    /// Each cube is one character per fanin: `1`, `0` or `-` (don't care).
    /// Sources have no table.
    pub fn cubes(self) -> &'static [&'static str] {
        match self {
            GateKind::None | GateKind::Ff => &[],
            GateKind::Buf => &["1"],
            GateKind::Not => &["0"],
            GateKind::And => &["11"],
            GateKind::Nand => &["0-", "-0"],
            GateKind::Or => &["-1", "1-"],
            GateKind::Nor => &["00"],
            GateKind::Xor => &["01", "10"],
            GateKind::Xnor => &["00", "11"],
            GateKind::AndNot => &["10"],
            GateKind::OrNot => &["1-", "-0"],
            GateKind::Mux => &["1-0", "-11"],
            GateKind::Aoi3 => &["-00", "0-0"],
            GateKind::Oai3 => &["00-", "--0"],
            GateKind::Aoi4 => &["-0-0", "-00-", "0--0", "0-0-"],
            GateKind::Oai4 => &["00--", "--00"],
        }
    }

    /// The graph gate implementing a host cell kind, if the extractor supports it.
    pub fn from_cell_kind(kind: &CellKind) -> Option<Self> {
        match kind {
            CellKind::Buf => Some(GateKind::Buf),
            CellKind::Not => Some(GateKind::Not),
            CellKind::And => Some(GateKind::And),
            CellKind::Nand => Some(GateKind::Nand),
            CellKind::Or => Some(GateKind::Or),
            CellKind::Nor => Some(GateKind::Nor),
            CellKind::Xor => Some(GateKind::Xor),
            CellKind::Xnor => Some(GateKind::Xnor),
            CellKind::AndNot => Some(GateKind::AndNot),
            CellKind::OrNot => Some(GateKind::OrNot),
            CellKind::Mux => Some(GateKind::Mux),
            CellKind::Aoi3 => Some(GateKind::Aoi3),
            CellKind::Oai3 => Some(GateKind::Oai3),
            CellKind::Aoi4 => Some(GateKind::Aoi4),
            CellKind::Oai4 => Some(GateKind::Oai4),
            CellKind::Dff { .. } | CellKind::Dffe { .. } => Some(GateKind::Ff),
            _ => None,
        }
    }
}

/// A graph node: one canonical signal bit and what drives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub kind: GateKind,
    /// Ordered fanins, unused slots are `None`.
    pub fanins: [Option<NodeId>; MAX_FANINS],
    /// The value crosses the boundary of the extracted logic.
    pub is_boundary: bool,
    /// The canonical bit this node stands for.
    pub bit: SigBit,
    /// Initial value, only meaningful for flip-flops.
    pub init: State,
}

impl Node {
    pub(super) fn new(id: NodeId, bit: SigBit, init: State) -> Self {
        Node {
            id,
            kind: GateKind::None,
            fanins: [None; MAX_FANINS],
            is_boundary: false,
            bit,
            init,
        }
    }

    /// The used fanins, in order.
    pub fn get_fanins(&self) -> Vec<NodeId> {
        self.fanins.iter().flatten().copied().collect()
    }

    /// The fanins with duplicates removed, first occurrence kept.
    pub fn distinct_fanins(&self) -> Vec<NodeId> {
        let mut distinct = Vec::with_capacity(MAX_FANINS);
        for fanin in self.fanins.iter().flatten() {
            if !distinct.contains(fanin) {
                distinct.push(*fanin);
            }
        }
        distinct
    }

    pub fn is_driven(&self) -> bool {
        self.kind != GateKind::None
    }

    /// Rewrites every fanin slot equal to `old` to `new`. Returns whether anything changed.
    pub(super) fn replace_fanin(&mut self, old: NodeId, new: NodeId) -> bool {
        let mut found = false;
        for slot in self.fanins.iter_mut() {
            if *slot == Some(old) {
                *slot = Some(new);
                found = true;
            }
        }
        found
    }
}
