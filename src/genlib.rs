//! The gate library handed to the mapper (`genlib` format), and the optional LUT cost table.
//!
//! ```rust
//! use blifmap::genlib::{GateLibrary, LibraryGate};
//! let mut library = GateLibrary::default();
//! library.enabled.insert(LibraryGate::Nand);
//! let text = library.to_genlib();
//! assert!(text.contains("GATE NAND"));
//! assert!(!text.contains("GATE XOR"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::str::FromStr;

use crate::design::CellKind;

/// A gate of the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LibraryGate {
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
    Aoi3,
    Oai3,
    Aoi4,
    Oai4,
    Mux,
    Mux4,
    Mux8,
    Mux16,
}

/// The gates that can be disabled, in library order.
pub const OPTIONAL_GATES: [LibraryGate; 13] = [
    LibraryGate::And,
    LibraryGate::Nand,
    LibraryGate::Or,
    LibraryGate::Nor,
    LibraryGate::Xor,
    LibraryGate::Xnor,
    LibraryGate::AndNot,
    LibraryGate::OrNot,
    LibraryGate::Aoi3,
    LibraryGate::Oai3,
    LibraryGate::Aoi4,
    LibraryGate::Oai4,
    LibraryGate::Mux,
];

impl LibraryGate {
    /// Name of the gate in the library and in the mapped netlist.
    pub fn name(self) -> &'static str {
        match self {
            LibraryGate::Buf => "BUF",
            LibraryGate::Not => "NOT",
            LibraryGate::And => "AND",
            LibraryGate::Nand => "NAND",
            LibraryGate::Or => "OR",
            LibraryGate::Nor => "NOR",
            LibraryGate::Xor => "XOR",
            LibraryGate::Xnor => "XNOR",
            LibraryGate::AndNot => "ANDNOT",
            LibraryGate::OrNot => "ORNOT",
            LibraryGate::Aoi3 => "AOI3",
            LibraryGate::Oai3 => "OAI3",
            LibraryGate::Aoi4 => "AOI4",
            LibraryGate::Oai4 => "OAI4",
            LibraryGate::Mux => "MUX",
            LibraryGate::Mux4 => "MUX4",
            LibraryGate::Mux8 => "MUX8",
            LibraryGate::Mux16 => "MUX16",
        }
    }

    fn expression(self) -> &'static str {
        match self {
            LibraryGate::Buf => "A",
            LibraryGate::Not => "!A",
            LibraryGate::And => "A*B",
            LibraryGate::Nand => "!(A*B)",
            LibraryGate::Or => "A+B",
            LibraryGate::Nor => "!(A+B)",
            LibraryGate::Xor => "(A*!B)+(!A*B)",
            LibraryGate::Xnor => "(A*B)+(!A*!B)",
            LibraryGate::AndNot => "A*!B",
            LibraryGate::OrNot => "A+!B",
            LibraryGate::Aoi3 => "!((A*B)+C)",
            LibraryGate::Oai3 => "!((A+B)*C)",
            LibraryGate::Aoi4 => "!((A*B)+(C*D))",
            LibraryGate::Oai4 => "!((A+B)*(C+D))",
            LibraryGate::Mux => "(A*B)+(S*B)+(!S*A)",
            LibraryGate::Mux4 => "(!S*!T*A)+(S*!T*B)+(!S*T*C)+(S*T*D)",
            LibraryGate::Mux8 => {
                "(!S*!T*!U*A)+(S*!T*!U*B)+(!S*T*!U*C)+(S*T*!U*D)+\
                 (!S*!T*U*E)+(S*!T*U*F)+(!S*T*U*G)+(S*T*U*H)"
            }
            LibraryGate::Mux16 => {
                "(!S*!T*!U*!V*A)+(S*!T*!U*!V*B)+(!S*T*!U*!V*C)+(S*T*!U*!V*D)+\
                 (!S*!T*U*!V*E)+(S*!T*U*!V*F)+(!S*T*U*!V*G)+(S*T*U*!V*H)+\
                 (!S*!T*!U*V*I)+(S*!T*!U*V*J)+(!S*T*!U*V*K)+(S*T*!U*V*L)+\
                 (!S*!T*U*V*M)+(S*!T*U*V*N)+(!S*T*U*V*O)+(S*T*U*V*P)"
            }
        }
    }

    fn phase(self) -> &'static str {
        match self {
            LibraryGate::Buf | LibraryGate::And | LibraryGate::Or => "NONINV",
            LibraryGate::Not
            | LibraryGate::Nand
            | LibraryGate::Nor
            | LibraryGate::Aoi3
            | LibraryGate::Oai3
            | LibraryGate::Aoi4
            | LibraryGate::Oai4 => "INV",
            _ => "UNKNOWN",
        }
    }

    /// The host cell implementing the gate.
    pub fn cell_kind(self) -> CellKind {
        match self {
            LibraryGate::Buf => CellKind::Buf,
            LibraryGate::Not => CellKind::Not,
            LibraryGate::And => CellKind::And,
            LibraryGate::Nand => CellKind::Nand,
            LibraryGate::Or => CellKind::Or,
            LibraryGate::Nor => CellKind::Nor,
            LibraryGate::Xor => CellKind::Xor,
            LibraryGate::Xnor => CellKind::Xnor,
            LibraryGate::AndNot => CellKind::AndNot,
            LibraryGate::OrNot => CellKind::OrNot,
            LibraryGate::Aoi3 => CellKind::Aoi3,
            LibraryGate::Oai3 => CellKind::Oai3,
            LibraryGate::Aoi4 => CellKind::Aoi4,
            LibraryGate::Oai4 => CellKind::Oai4,
            LibraryGate::Mux => CellKind::Mux,
            LibraryGate::Mux4 => CellKind::Mux4,
            LibraryGate::Mux8 => CellKind::Mux8,
            LibraryGate::Mux16 => CellKind::Mux16,
        }
    }
}

impl Display for LibraryGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LibraryGate {
    type Err = String;

    /// Case insensitive, e.g. `and` or `AOI3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LibraryGate::Buf, LibraryGate::Not]
            .into_iter()
            .chain(OPTIONAL_GATES)
            .chain([LibraryGate::Mux4, LibraryGate::Mux8, LibraryGate::Mux16])
            .find(|gate| gate.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown gate type `{}`", s))
    }
}

/// Cost of each library gate. Wide muxes are not listed, they cost a multiple of
/// [`LibraryGate::Mux`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostTable(BTreeMap<LibraryGate, u32>);

impl Default for CostTable {
    fn default() -> Self {
        CostTable(BTreeMap::from([
            (LibraryGate::Buf, 1),
            (LibraryGate::Not, 2),
            (LibraryGate::And, 4),
            (LibraryGate::Nand, 4),
            (LibraryGate::Or, 4),
            (LibraryGate::Nor, 4),
            (LibraryGate::Xor, 8),
            (LibraryGate::Xnor, 8),
            (LibraryGate::AndNot, 4),
            (LibraryGate::OrNot, 4),
            (LibraryGate::Aoi3, 6),
            (LibraryGate::Oai3, 6),
            (LibraryGate::Aoi4, 8),
            (LibraryGate::Oai4, 8),
            (LibraryGate::Mux, 4),
        ]))
    }
}

impl CostTable {
    pub fn get(&self, gate: LibraryGate) -> u32 {
        match gate {
            LibraryGate::Mux4 => 2 * self.get(LibraryGate::Mux),
            LibraryGate::Mux8 => 4 * self.get(LibraryGate::Mux),
            LibraryGate::Mux16 => 8 * self.get(LibraryGate::Mux),
            _ => self.0.get(&gate).copied().unwrap_or(1),
        }
    }

    /// Overrides the cost of a gate.
    pub fn set(&mut self, gate: LibraryGate, cost: u32) {
        self.0.insert(gate, cost);
    }
}

/// The library offered to the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GateLibrary {
    /// Optional gates offered, empty meaning all of them. Buffers and inverters are always
    /// offered.
    pub enabled: BTreeSet<LibraryGate>,
    pub mux4: bool,
    pub mux8: bool,
    pub mux16: bool,
    pub costs: CostTable,
}

impl GateLibrary {
    fn is_enabled(&self, gate: LibraryGate) -> bool {
        self.enabled.is_empty() || self.enabled.contains(&gate)
    }

    /// The gates offered, in library order.
    pub fn gates(&self) -> Vec<LibraryGate> {
        let mut gates = vec![LibraryGate::Buf, LibraryGate::Not];
        gates.extend(OPTIONAL_GATES.into_iter().filter(|&g| self.is_enabled(g)));
        for (wide, gate) in [
            (self.mux4, LibraryGate::Mux4),
            (self.mux8, LibraryGate::Mux8),
            (self.mux16, LibraryGate::Mux16),
        ] {
            if wide {
                gates.push(gate);
            }
        }
        gates
    }

    /// The library in `genlib` format.
    pub fn to_genlib(&self) -> String {
        let mut text = String::new();
        text.push_str("GATE ZERO   1 Y=CONST0;\n");
        text.push_str("GATE ONE    1 Y=CONST1;\n");
        for gate in self.gates() {
            text.push_str(&format!(
                "GATE {:<6} {} {:<20} PIN * {:<7} 1 999 1 0 1 0\n",
                gate.name(),
                self.costs.get(gate),
                format!("Y={};", gate.expression()),
                gate.phase()
            ));
        }
        text
    }
}

/// The LUT cost table, `costs[i]` being the cost of a LUT with `i + 1` inputs.
pub fn lut_definitions(costs: &[u32]) -> String {
    costs
        .iter()
        .enumerate()
        .map(|(i, cost)| format!("{} {}.00 1.00\n", i + 1, cost))
        .collect()
}
