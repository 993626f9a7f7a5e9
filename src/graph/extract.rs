//! Building a [`Graph`] out of the cells of a host [`Module`], and flagging its boundary.

use std::collections::HashMap;

use log::{debug, info};

use crate::design::{Cell, CellKind, Module, SigBit, SigMap, SigSpec, State};
use crate::graph::{GateKind, Graph, NodeId, Result};

/// The clock (and optional enable) of the flip-flops extracted in one run.
///
/// Bits are canonical. A polarity of `true` means rising edge / active high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDomain {
    pub clk: SigBit,
    pub clk_pol: bool,
    pub en: Option<(SigBit, bool)>,
}

impl ClockDomain {
    /// Resolves a `[!]clk[,[!]en]` descriptor against the wires of `module`, using bit 0
    /// of the named wires.
    ///
    /// Returns `None` when the clock wire does not exist: no flip-flop can then be
    /// extracted. A missing enable wire simply leaves the domain without enable.
    ///
    /// ```rust
    /// use blifmap::design::{Module, SigBit, SigMap};
    /// use blifmap::graph::ClockDomain;
    /// let mut m = Module::new("top");
    /// let clk = m.add_wire("clk", 1).unwrap();
    /// let en = m.add_wire("en", 1).unwrap();
    /// let sigmap = SigMap::from_module(&m);
    /// let domain = ClockDomain::parse("!clk,en", &m, &sigmap).unwrap();
    /// assert_eq!(domain.clk, SigBit::wire(clk, 0));
    /// assert!(!domain.clk_pol);
    /// assert_eq!(domain.en, Some((SigBit::wire(en, 0), true)));
    /// assert!(ClockDomain::parse("nope", &m, &sigmap).is_none());
    /// ```
    pub fn parse(descriptor: &str, module: &Module, sigmap: &SigMap) -> Option<Self> {
        let (clk_str, en_str) = match descriptor.split_once(',') {
            Some((clk, en)) => (clk, Some(en)),
            None => (descriptor, None),
        };

        let resolve = |desc: &str| -> Option<(SigBit, bool)> {
            let (name, pol) = match desc.strip_prefix('!') {
                Some(name) => (name, false),
                None => (desc, true),
            };
            let wire = module.wire_by_name(name)?;
            Some((sigmap.apply(SigBit::wire(wire, 0)), pol))
        };

        let (clk, clk_pol) = resolve(clk_str)?;
        Some(ClockDomain {
            clk,
            clk_pol,
            en: en_str.and_then(resolve),
        })
    }

    fn matches(&self, clk: SigBit, clk_pol: bool, en: Option<(SigBit, bool)>) -> bool {
        self.clk == clk && self.clk_pol == clk_pol && self.en == en
    }
}

/// Initial values of the bits of every wire carrying an `init` attribute, canonicalized.
/// Undefined bits are not recorded.
pub fn collect_init(module: &Module, sigmap: &SigMap) -> HashMap<SigBit, State> {
    let mut init = HashMap::new();
    for id in module.wire_ids() {
        let Some(values) = &module.wire(id).attributes.init else {
            continue;
        };
        for (offset, &value) in values.iter().enumerate() {
            if value != State::Sx {
                init.insert(sigmap.apply(SigBit::wire(id, offset as u32)), value);
            }
        }
    }
    init
}

/// State of one extraction run over a module: the alias map, the graph being built and
/// the clock domain of the run.
///
/// A fresh context is built for every run, so that node ids always start at 0.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub sigmap: SigMap,
    pub graph: Graph,
    pub clock: Option<ClockDomain>,
    keepff: bool,
}

impl Extraction {
    /// Starts a run over `module`. Initial values are collected right away.
    pub fn new(module: &Module, clock: Option<ClockDomain>, keepff: bool) -> Self {
        let sigmap = SigMap::from_module(module);
        let graph = Graph::with_init(collect_init(module, &sigmap));
        Extraction {
            sigmap,
            graph,
            clock,
            keepff,
        }
    }

    fn canonical_bit(&self, cell: &Cell, port: &str) -> Result<SigBit> {
        Ok(self.sigmap.apply(cell.port_bit(port)?))
    }

    fn flip_flop_matches(&self, cell: &Cell) -> Result<bool> {
        let Some(clock) = &self.clock else {
            return Ok(false);
        };
        let clk = self.canonical_bit(cell, "C")?;
        Ok(match cell.kind {
            CellKind::Dff { clk_pol } => clock.matches(clk, clk_pol, None),
            CellKind::Dffe { clk_pol, en_pol } => {
                let en = self.canonical_bit(cell, "E")?;
                clock.matches(clk, clk_pol, Some((en, en_pol)))
            }
            _ => false,
        })
    }

    /// Moves the cell `name` into the graph. Returns whether it was extracted.
    ///
    /// Unsupported cells and flip-flops outside the clock domain of the run are left in
    /// the module.
    pub fn extract_cell(&mut self, module: &mut Module, name: &str) -> Result<bool> {
        let Some(cell) = module.cell(name) else {
            return Ok(false);
        };
        let Some(kind) = GateKind::from_cell_kind(&cell.kind) else {
            return Ok(false);
        };

        let Some(output) = cell.kind.output_port() else {
            return Ok(false);
        };
        let inputs: &[&str] = if kind == GateKind::Ff {
            if !self.flip_flop_matches(cell)? {
                debug!("Leaving {} outside of the clock domain", name);
                return Ok(false);
            }
            &["D"]
        } else {
            cell.kind.input_ports()
        };

        let raw_output = cell.port_bit(output)?;
        let input_bits = inputs
            .iter()
            .map(|port| self.canonical_bit(cell, port))
            .collect::<Result<Vec<_>>>()?;

        let fanins: Vec<NodeId> = input_bits
            .into_iter()
            .map(|bit| self.graph.reference(bit))
            .collect();
        self.graph
            .upsert(self.sigmap.apply(raw_output), kind, &fanins)?;

        if kind == GateKind::Ff && self.keepff {
            if let Some(wire) = raw_output.get_wire() {
                module.wire_mut(wire).attributes.keep = true;
            }
        }

        module.remove_cell(name)?;
        Ok(true)
    }

    /// Extracts every supported cell of `module`, in name order. Returns the number of
    /// extracted cells.
    pub fn extract_all(&mut self, module: &mut Module) -> Result<usize> {
        let mut count = 0;
        for name in module.cell_names() {
            if self.extract_cell(module, &name)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn mark_sig(&mut self, sig: &SigSpec) {
        for &bit in sig {
            self.graph.mark_boundary(self.sigmap.apply(bit));
        }
    }

    /// Flags as boundary every node seen from outside the graph: module ports, `keep`
    /// wires, ports of the cells left in the module and the clock domain signals.
    pub fn mark_boundaries(&mut self, module: &Module) {
        for id in module.wire_ids() {
            let wire = module.wire(id);
            if wire.is_port() || wire.attributes.keep {
                self.mark_sig(&module.wire_sig(id));
            }
        }

        for cell in module.cells() {
            for sig in cell.connections.values() {
                self.mark_sig(sig);
            }
        }

        if let Some(clock) = self.clock {
            self.graph.mark_boundary(clock.clk);
            if let Some((en, _)) = clock.en {
                self.graph.mark_boundary(en);
            }
        }

        info!(
            "Marked {} boundary nodes out of {}",
            self.graph.nodes().iter().filter(|n| n.is_boundary).count(),
            self.graph.len()
        );
    }
}
