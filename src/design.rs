//! The host circuit: designs, modules, wires, cells and connections.
//!
//! This is the circuit representation the technology mapping pass extracts gates from and
//! writes the mapped result back into. It is deliberately small: wires are bit vectors with
//! a few typed attributes, cells are typed instances with named ports, and connections
//! are plain `lhs <- rhs` assignments resolved by the [`SigMap`] alias map.

mod cell;
pub mod error;
pub mod sig;
pub mod sigmap;

use std::collections::{BTreeMap, HashMap};

pub use cell::{Cell, CellKind};
pub use error::{DesignError, Result};
pub use sig::{SigBit, SigSpec, State};
pub use sigmap::SigMap;

/// Index of a wire in its [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireId(pub(crate) usize);

/// Typed wire attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    /// The wire must survive optimizations and is visible outside any extracted logic.
    pub keep: bool,
    /// Initial value of the bits of the wire, LSB first.
    pub init: Option<Vec<State>>,
    /// Source location.
    pub src: Option<String>,
    /// Run index of the technology mapping run that created this wire (markgroups).
    pub group: Option<usize>,
}

/// A named bit vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub name: String,
    pub width: u32,
    /// Position in the module port list, 0 when the wire is not a port.
    pub port_id: u32,
    pub attributes: Attributes,
}

impl Wire {
    /// Internal names start with `$`, public ones don't.
    pub fn is_internal(&self) -> bool {
        self.name.starts_with('$')
    }

    /// The name without the leading `$` of internal names.
    pub fn unescaped_name(&self) -> &str {
        self.name.strip_prefix('$').unwrap_or(&self.name)
    }

    pub fn is_port(&self) -> bool {
        self.port_id > 0
    }
}

/// Hands out process-unique indices for generated names.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: usize,
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator { next: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator::default()
    }

    /// Returns a fresh index.
    pub fn next_index(&mut self) -> usize {
        let idx = self.next;
        self.next += 1;
        idx
    }
}

/// A module: wires, cells and connections.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    wires: Vec<Wire>,
    wire_index: HashMap<String, WireId>,
    cells: BTreeMap<String, Cell>,
    connections: Vec<(SigSpec, SigSpec)>,
    /// Number of behavioural processes; the extractor does not handle modules having some.
    pub processes: usize,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a new wire. Fails if the name is already taken.
    pub fn add_wire(&mut self, name: impl Into<String>, width: u32) -> Result<WireId> {
        let name = name.into();
        if self.wire_index.contains_key(&name) {
            return Err(DesignError::DuplicateWire(name));
        }
        let id = WireId(self.wires.len());
        self.wire_index.insert(name.clone(), id);
        self.wires.push(Wire {
            name,
            width,
            port_id: 0,
            attributes: Attributes::default(),
        });
        Ok(id)
    }

    /// Creates a new wire and registers it as the next module port.
    pub fn add_port(&mut self, name: impl Into<String>, width: u32) -> Result<WireId> {
        let port_id = self.wires.iter().map(|w| w.port_id).max().unwrap_or(0) + 1;
        let id = self.add_wire(name, width)?;
        self.wires[id.0].port_id = port_id;
        Ok(id)
    }

    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.0]
    }

    pub fn wire_mut(&mut self, id: WireId) -> &mut Wire {
        &mut self.wires[id.0]
    }

    pub fn wire_by_name(&self, name: &str) -> Option<WireId> {
        self.wire_index.get(name).copied()
    }

    pub fn wire_ids(&self) -> impl Iterator<Item = WireId> + use<> {
        (0..self.wires.len()).map(WireId)
    }

    /// All the bits of a wire, LSB first.
    pub fn wire_sig(&self, id: WireId) -> SigSpec {
        (0..self.wire(id).width)
            .map(|offset| SigBit::wire(id, offset))
            .collect()
    }

    pub fn add_cell(&mut self, cell: Cell) -> Result<()> {
        if self.cells.contains_key(&cell.name) {
            return Err(DesignError::DuplicateCell(cell.name));
        }
        self.cells.insert(cell.name.clone(), cell);
        Ok(())
    }

    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.cells.get(name)
    }

    /// Cells sorted by name.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn cell_names(&self) -> Vec<String> {
        self.cells.keys().cloned().collect()
    }

    pub fn remove_cell(&mut self, name: &str) -> Result<Cell> {
        self.cells
            .remove(name)
            .ok_or_else(|| DesignError::UnknownCell(name.to_string()))
    }

    /// Drives `lhs` with `rhs`.
    pub fn connect(&mut self, lhs: impl Into<SigSpec>, rhs: impl Into<SigSpec>) -> Result<()> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        if lhs.len() != rhs.len() {
            return Err(DesignError::ConnectionWidth(lhs.len(), rhs.len()));
        }
        self.connections.push((lhs, rhs));
        Ok(())
    }

    pub fn connections(&self) -> &[(SigSpec, SigSpec)] {
        &self.connections
    }

    /// Human readable text for a bit, e.g. `data[3]`, `clk` or `1'x`.
    pub fn describe(&self, bit: SigBit) -> String {
        match bit {
            SigBit::Const(state) => format!("1'{}", state),
            SigBit::Wire { wire, offset } => {
                let wire = self.wire(wire);
                if wire.width == 1 {
                    wire.name.clone()
                } else {
                    format!("{}[{}]", wire.name, offset)
                }
            }
        }
    }
}

/// A set of modules plus the generator for unique generated names.
#[derive(Debug, Clone, Default)]
pub struct Design {
    pub modules: Vec<Module>,
    pub autoidx: IdAllocator,
}

impl Design {
    pub fn new() -> Self {
        Design::default()
    }

    pub fn add_module(&mut self, module: Module) -> &mut Module {
        self.modules.push(module);
        let last = self.modules.len() - 1;
        &mut self.modules[last]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_wire_test() {
        let mut m = Module::new("m");
        let a = m.add_wire("a", 4).unwrap();
        assert!(matches!(m.add_wire("a", 1), Err(DesignError::DuplicateWire(_))));
        assert_eq!(m.wire_by_name("a"), Some(a));
        assert_eq!(m.wire_by_name("b"), None);
        assert_eq!(m.wire_sig(a).len(), 4);
        assert_eq!(m.describe(SigBit::wire(a, 2)), "a[2]");
        assert_eq!(m.describe(SigBit::Const(State::Sx)), "1'x");

        let p = m.add_port("p", 1).unwrap();
        let q = m.add_port("q", 1).unwrap();
        assert_eq!(m.wire(p).port_id, 1);
        assert_eq!(m.wire(q).port_id, 2);
        assert!(!m.wire(a).is_port());
    }

    #[test]
    fn names_test() {
        let mut m = Module::new("m");
        let t = m.add_wire("$auto$12", 1).unwrap();
        let a = m.add_wire("a", 1).unwrap();
        assert!(m.wire(t).is_internal());
        assert_eq!(m.wire(t).unescaped_name(), "auto$12");
        assert!(!m.wire(a).is_internal());
        assert_eq!(m.wire(a).unescaped_name(), "a");
    }

    #[test]
    fn cells_and_connections_test() {
        let mut m = Module::new("m");
        let a = m.add_wire("a", 2).unwrap();
        let y = m.add_wire("y", 1).unwrap();
        m.add_cell(Cell::new("g", CellKind::Not)).unwrap();
        assert!(m.add_cell(Cell::new("g", CellKind::And)).is_err());
        assert!(m.connect(m.wire_sig(a), SigBit::wire(y, 0)).is_err());
        m.connect(SigBit::wire(y, 0), SigBit::wire(a, 1)).unwrap();
        assert_eq!(m.connections().len(), 1);
        assert_eq!(m.remove_cell("g").unwrap().kind, CellKind::Not);
        assert!(m.remove_cell("g").is_err());
    }

    #[test]
    fn autoidx_test() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_index(), 1);
        assert_eq!(ids.next_index(), 2);
    }
}
