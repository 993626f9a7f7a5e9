//! Writing the mapped netlist back into the host module.
//!
//! Every net of the mapped model becomes a fresh one-bit wire, named after the host wire
//! of the node it comes from when it still carries a `ys__n<id>` name. Gates become host
//! cells or plain connections, and every boundary node is tied to its mapped
//! counterpart: driven nodes are driven by the mapped net, the others drive it.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use log::{debug, info};

use crate::blif::{BlifItem, BlifModel, NODE_PREFIX, node_name};
use crate::design::{Cell, CellKind, DesignError, Module, SigBit, SigSpec, State, WireId};
use crate::error::{Result, TechmapError};
use crate::genlib::LibraryGate;
use crate::graph::{ClockDomain, Graph, NodeId};

/// Widest `.names` turned into a LUT cell.
pub const MAX_LUT_INPUTS: usize = 16;

/// What a run brought back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappingStats {
    /// Mapped cells per type, as named in the mapped netlist (`$lut` for covers).
    pub cells: BTreeMap<String, usize>,
    /// Graph nodes that did not cross the boundary.
    pub internal: usize,
    pub inputs: usize,
    pub outputs: usize,
}

/// The mapped nets and the host wires they became.
struct Nets(HashMap<String, WireId>);

impl Nets {
    fn wire(&self, net: &str) -> Result<WireId> {
        self.0
            .get(net)
            .copied()
            .ok_or_else(|| TechmapError::MissingNet(net.to_string()))
    }

    fn bit(&self, net: &str) -> Result<SigBit> {
        Ok(SigBit::wire(self.wire(net)?, 0))
    }

    fn pin(&self, cell: &str, pins: &[(String, String)], pin: &str) -> Result<SigBit> {
        let (_, net) = pins
            .iter()
            .find(|(name, _)| name == pin)
            .ok_or_else(|| DesignError::MissingPort(cell.to_string(), pin.to_string()))?;
        self.bit(net)
    }
}

fn split_id(text: &str) -> Option<(NodeId, &str)> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let id = text[..end].parse().ok()?;
    Some((id, &text[end..]))
}

fn constant(cover: &[(String, char)]) -> State {
    if cover.iter().any(|(_, value)| *value == '1') {
        State::S1
    } else {
        State::S0
    }
}

/// `table[i]` is the output for the input value `i`, the first input being the LSB.
fn truth_table(inputs: usize, cover: &[(String, char)]) -> Vec<bool> {
    // A cover lists either the onset or the offset
    let onset = cover.first().is_none_or(|(_, value)| *value == '1');
    (0..1usize << inputs)
        .map(|i| {
            let hit = cover.iter().any(|(cube, _)| {
                cube.chars().enumerate().all(|(j, c)| {
                    let bit = (i >> j) & 1 == 1;
                    match c {
                        '1' => bit,
                        '0' => !bit,
                        _ => true,
                    }
                })
            });
            hit == onset
        })
        .collect()
}

/// One run's worth of context to bring a mapped netlist back.
#[derive(Debug, Clone)]
pub struct Reintegration<'a> {
    /// The graph that was encoded.
    pub graph: &'a Graph,
    /// Clock domain of the extracted flip-flops, needed as soon as the result has any.
    pub clock: Option<ClockDomain>,
    pub tag: &'a str,
    pub run_idx: usize,
    /// Tag every created wire and cell with the run index.
    pub markgroups: bool,
    /// Latch initial values are carried over to the host.
    pub recover_init: bool,
}

impl<'a> Reintegration<'a> {
    /// Host name of a mapped net, and the host wire it stems from if any.
    ///
    /// `ys__n<id><postfix>` names of nodes backed by a wire become
    /// `$<tag>$<run>$<wire>[<offset>]<postfix>`, the offset being left out for one-bit
    /// wires. A `new_` prefix turns into a `_new` suffix before the postfix. Anything
    /// else becomes `$<tag>$<run>$<name>`.
    ///
    /// ```rust
    /// use blifmap::design::{Module, SigBit};
    /// use blifmap::graph::Graph;
    /// use blifmap::reintegrate::Reintegration;
    ///
    /// let mut m = Module::new("top");
    /// let bus = m.add_wire("bus", 8).unwrap();
    /// let mut g = Graph::new();
    /// g.reference(SigBit::wire(bus, 3));
    /// let re = Reintegration {
    ///     graph: &g,
    ///     clock: None,
    ///     tag: "cirkit",
    ///     run_idx: 4,
    ///     markgroups: false,
    ///     recover_init: false,
    /// };
    /// assert_eq!(re.remap_name(&m, "ys__n0"), ("$cirkit$4$bus[3]".to_string(), Some(bus)));
    /// assert_eq!(re.remap_name(&m, "new_ys__n0").0, "$cirkit$4$bus[3]_new");
    /// assert_eq!(re.remap_name(&m, "n42"), ("$cirkit$4$n42".to_string(), None));
    /// ```
    pub fn remap_name(&self, module: &Module, name: &str) -> (String, Option<WireId>) {
        let prefix = format!("${}${}$", self.tag, self.run_idx);
        let (stripped, is_new) = match name.strip_prefix("new_") {
            Some(rest) => (rest, true),
            None => (name, false),
        };

        let origin = stripped
            .strip_prefix(NODE_PREFIX)
            .and_then(split_id)
            .and_then(|(id, postfix)| Some((self.graph.get_node(id)?.bit, postfix)));
        if let Some((SigBit::Wire { wire, offset }, postfix)) = origin {
            let orig = module.wire(wire);
            let mut remapped = format!("{}{}", prefix, orig.unescaped_name());
            if orig.width != 1 {
                remapped.push_str(&format!("[{}]", offset));
            }
            if is_new {
                remapped.push_str("_new");
            }
            remapped.push_str(postfix);
            return (remapped, Some(wire));
        }

        (format!("{}{}", prefix, name), None)
    }

    fn add_cell(&self, module: &mut Module, mut cell: Cell) -> Result<()> {
        if self.markgroups {
            cell.group = Some(self.run_idx);
        }
        debug!("Adding {} cell {}", cell.kind.type_name(), cell.name);
        Ok(module.add_cell(cell)?)
    }

    fn add_flip_flop(&self, module: &mut Module, name: String, d: SigBit, q: SigBit) -> Result<()> {
        let Some(clock) = &self.clock else {
            panic!("the mapped netlist has flip-flops but no clock domain was extracted");
        };
        let kind = match clock.en {
            None => CellKind::Dff {
                clk_pol: clock.clk_pol,
            },
            Some((_, en_pol)) => CellKind::Dffe {
                clk_pol: clock.clk_pol,
                en_pol,
            },
        };
        let mut cell = Cell::new(name, kind)
            .with_port("C", clock.clk)
            .with_port("D", d)
            .with_port("Q", q);
        if let Some((en, _)) = clock.en {
            cell.set_port("E", en);
        }
        self.add_cell(module, cell)
    }

    fn add_gate(
        &self,
        module: &mut Module,
        nets: &Nets,
        name: String,
        kind: &str,
        pins: &[(String, String)],
    ) -> Result<()> {
        match kind {
            "ZERO" => module.connect(nets.pin(&name, pins, "Y")?, SigBit::Const(State::S0))?,
            "ONE" => module.connect(nets.pin(&name, pins, "Y")?, SigBit::Const(State::S1))?,
            "DFF" => {
                let d = nets.pin(&name, pins, "D")?;
                let q = nets.pin(&name, pins, "Q")?;
                self.add_flip_flop(module, name, d, q)?;
            }
            _ => match LibraryGate::from_str(kind) {
                Ok(LibraryGate::Buf) => {
                    module.connect(nets.pin(&name, pins, "Y")?, nets.pin(&name, pins, "A")?)?
                }
                Ok(gate) => {
                    let kind = gate.cell_kind();
                    let mut cell = Cell::new(name, kind.clone());
                    for port in kind.input_ports().iter().chain(&["Y"]) {
                        let bit = nets.pin(&cell.name, pins, port)?;
                        cell.set_port(*port, bit);
                    }
                    self.add_cell(module, cell)?;
                }
                Err(_) => {
                    let mut cell = Cell::new(name, CellKind::Other(kind.to_string()));
                    for (pin, net) in pins {
                        cell.set_port(pin.clone(), nets.bit(net)?);
                    }
                    self.add_cell(module, cell)?;
                }
            },
        }
        Ok(())
    }

    fn add_names(
        &self,
        module: &mut Module,
        nets: &Nets,
        name: String,
        inputs: &[String],
        output: &str,
        cover: &[(String, char)],
    ) -> Result<()> {
        let y = nets.bit(output)?;
        if inputs.len() > MAX_LUT_INPUTS {
            return Err(TechmapError::LutTooWide(output.to_string(), inputs.len()));
        }
        let a = inputs
            .iter()
            .map(|input| nets.bit(input))
            .collect::<Result<SigSpec>>()?;
        let table = truth_table(inputs.len(), cover);
        if table == [false, true] {
            module.connect(y, a)?;
            return Ok(());
        }
        let cell = Cell::new(name, CellKind::Lut { table })
            .with_port("A", a)
            .with_port("Y", y);
        self.add_cell(module, cell)
    }

    /// Rebuilds the mapped `model` into `module` and ties it to the boundary of the graph.
    ///
    /// Fails when a boundary node has no net in the model, or when the model does not
    /// fit in the module.
    pub fn reintegrate(&self, module: &mut Module, model: &BlifModel) -> Result<MappingStats> {
        let mut nets = Nets(HashMap::new());
        for net in model.nets() {
            let (name, orig) = self.remap_name(module, net);
            let wire = module.add_wire(name, 1)?;
            let src = orig.and_then(|orig| module.wire(orig).attributes.src.clone());
            let attributes = &mut module.wire_mut(wire).attributes;
            attributes.src = src;
            if self.markgroups {
                attributes.group = Some(self.run_idx);
            }
            nets.0.insert(net.to_string(), wire);
        }

        let mut stats = MappingStats::default();
        for (k, item) in model.items.iter().enumerate() {
            let name = self.remap_name(module, &format!("cell{}", k)).0;
            match item {
                BlifItem::Names {
                    inputs,
                    output,
                    cover,
                } => {
                    if inputs.is_empty() {
                        module.connect(nets.bit(output)?, SigBit::Const(constant(cover)))?;
                        continue;
                    }
                    *stats.cells.entry("$lut".to_string()).or_default() += 1;
                    self.add_names(module, &nets, name, inputs, output, cover)?;
                }
                BlifItem::Gate { kind, pins } => {
                    *stats.cells.entry(kind.clone()).or_default() += 1;
                    self.add_gate(module, &nets, name, kind, pins)?;
                }
                BlifItem::Latch {
                    input,
                    output,
                    init,
                } => {
                    *stats.cells.entry("DFF".to_string()).or_default() += 1;
                    let q = nets.wire(output)?;
                    self.add_flip_flop(module, name, nets.bit(input)?, SigBit::wire(q, 0))?;
                    if self.recover_init && *init != State::Sx {
                        let attributes = &mut module.wire_mut(q).attributes;
                        assert!(
                            attributes.init.is_none(),
                            "mapped wire {} already has an initial value",
                            output
                        );
                        attributes.init = Some(vec![*init]);
                    }
                }
                BlifItem::Conn { lhs, rhs } => module.connect(nets.bit(lhs)?, nets.bit(rhs)?)?,
            }
        }

        for (kind, count) in &stats.cells {
            info!("RESULTS: {:>15} cells: {:>8}", kind, count);
        }

        for node in self.graph.nodes().iter().filter(|node| node.is_boundary) {
            let mapped = nets.bit(&node_name(node.id))?;
            if node.is_driven() {
                module.connect(node.bit, mapped)?;
                stats.outputs += 1;
            } else {
                module.connect(mapped, node.bit)?;
                stats.inputs += 1;
            }
        }
        stats.internal = self.graph.len() - stats.inputs - stats.outputs;

        info!("RESULTS:        internal signals: {:>8}", stats.internal);
        info!("RESULTS:           input signals: {:>8}", stats.inputs);
        info!("RESULTS:          output signals: {:>8}", stats.outputs);
        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::blif::parse_netlist;
    use crate::graph::GateKind;

    fn reintegration(graph: &Graph, clock: Option<ClockDomain>) -> Reintegration<'_> {
        Reintegration {
            graph,
            clock,
            tag: "cirkit",
            run_idx: 3,
            markgroups: true,
            recover_init: true,
        }
    }

    fn wire(module: &Module, name: &str) -> SigBit {
        SigBit::wire(module.wire_by_name(name).unwrap(), 0)
    }

    fn has_connection(module: &Module, lhs: SigBit, rhs: SigBit) -> bool {
        module
            .connections()
            .contains(&(SigSpec::from(lhs), SigSpec::from(rhs)))
    }

    #[test]
    fn remap_name_test() {
        let mut m = Module::new("m");
        let a = m.add_wire("a", 1).unwrap();
        let bus = m.add_wire("bus", 4).unwrap();
        let t = m.add_wire("$t", 1).unwrap();
        let mut g = Graph::new();
        g.reference(SigBit::wire(a, 0));
        g.reference(SigBit::wire(bus, 2));
        g.reference(SigBit::wire(t, 0));
        g.reference(SigBit::Const(State::S1));
        let re = reintegration(&g, None);

        let remap = |name: &str| re.remap_name(&m, name);
        assert_eq!(remap("ys__n0"), ("$cirkit$3$a".to_string(), Some(a)));
        assert_eq!(remap("new_ys__n0"), ("$cirkit$3$a_new".to_string(), Some(a)));
        assert_eq!(remap("ys__n1_2"), ("$cirkit$3$bus[2]_2".to_string(), Some(bus)));
        assert_eq!(remap("new_ys__n1_2").0, "$cirkit$3$bus[2]_new_2");
        assert_eq!(remap("ys__n2"), ("$cirkit$3$t".to_string(), Some(t)));
        assert_eq!(remap("ys__n3"), ("$cirkit$3$ys__n3".to_string(), None));
        assert_eq!(remap("ys__n99"), ("$cirkit$3$ys__n99".to_string(), None));
        assert_eq!(remap("ys__nx"), ("$cirkit$3$ys__nx".to_string(), None));
        assert_eq!(remap("new_n12"), ("$cirkit$3$new_n12".to_string(), None));
    }

    #[test]
    fn truth_table_test() {
        let cover = |rows: &[(&str, char)]| -> Vec<(String, char)> {
            rows.iter().map(|(c, v)| (c.to_string(), *v)).collect()
        };
        assert_eq!(
            truth_table(2, &cover(&[("11", '1')])),
            vec![false, false, false, true]
        );
        assert_eq!(
            truth_table(2, &cover(&[("1-", '1')])),
            vec![false, true, false, true]
        );
        assert_eq!(
            truth_table(2, &cover(&[("00", '0')])),
            vec![false, true, true, true]
        );
        assert_eq!(truth_table(1, &[]), vec![false, false]);
    }

    #[test]
    fn gates_test() {
        let mut m = Module::new("m");
        let a = SigBit::wire(m.add_port("a", 1).unwrap(), 0);
        let b = SigBit::wire(m.add_port("b", 1).unwrap(), 0);
        let y = SigBit::wire(m.add_port("y", 1).unwrap(), 0);
        m.wire_mut(a.get_wire().unwrap()).attributes.src = Some("top.v:3".to_string());
        let mut g = Graph::new();
        let na = g.reference(a);
        let nb = g.reference(b);
        g.upsert(y, GateKind::And, &[na, nb]).unwrap();
        for bit in [a, b, y] {
            g.mark_boundary(bit);
        }

        let netlist = parse_netlist(
            ".model netlist
.inputs ys__n0 ys__n1
.outputs ys__n2
.gate NAND A=ys__n0 B=ys__n1 Y=new_n4
.gate NOT A=new_n4 Y=ys__n2
.end
",
        )
        .unwrap();
        let stats = reintegration(&g, None)
            .reintegrate(&mut m, netlist.model("netlist").unwrap())
            .unwrap();

        assert_eq!(
            stats.cells,
            BTreeMap::from([("NAND".to_string(), 1), ("NOT".to_string(), 1)])
        );
        assert_eq!((stats.inputs, stats.outputs, stats.internal), (2, 1, 0));

        let ma = wire(&m, "$cirkit$3$a");
        let mb = wire(&m, "$cirkit$3$b");
        let my = wire(&m, "$cirkit$3$y");
        let n4 = wire(&m, "$cirkit$3$new_n4");
        let src = &m.wire(ma.get_wire().unwrap()).attributes;
        assert_eq!(src.src.as_deref(), Some("top.v:3"));
        assert_eq!(src.group, Some(3));

        let nand = m.cell("$cirkit$3$cell0").unwrap();
        assert_eq!(nand.kind, CellKind::Nand);
        assert_eq!(nand.group, Some(3));
        assert_eq!(nand.get_port("A"), Some(&SigSpec::from(ma)));
        assert_eq!(nand.get_port("B"), Some(&SigSpec::from(mb)));
        assert_eq!(nand.get_port("Y"), Some(&SigSpec::from(n4)));
        let not = m.cell("$cirkit$3$cell1").unwrap();
        assert_eq!(not.kind, CellKind::Not);
        assert_eq!(not.get_port("Y"), Some(&SigSpec::from(my)));

        assert!(has_connection(&m, ma, a));
        assert!(has_connection(&m, mb, b));
        assert!(has_connection(&m, y, my));
    }

    #[test]
    fn misc_items_test() {
        let mut m = Module::new("m");
        let clk = SigBit::wire(m.add_port("clk", 1).unwrap(), 0);
        let en = SigBit::wire(m.add_port("en", 1).unwrap(), 0);
        let x = SigBit::wire(m.add_port("x", 1).unwrap(), 0);
        let q = SigBit::wire(m.add_port("q", 1).unwrap(), 0);
        let mut g = Graph::new();
        let nx = g.reference(x);
        g.upsert(q, GateKind::Ff, &[nx]).unwrap();
        g.mark_boundary(x);
        g.mark_boundary(q);
        let clock = ClockDomain {
            clk,
            clk_pol: true,
            en: Some((en, false)),
        };

        let netlist = parse_netlist(
            ".model netlist
.inputs ys__n0
.outputs ys__n1
.names zero
.names one
1
.names ys__n0 buf
1 1
.names ys__n0 one lut
11 1
.gate FOO X=buf Z=lut
.subckt ZERO Y=z2
.latch ys__n0 ys__n1 1
.conn alias ys__n1
.end
",
        )
        .unwrap();
        let stats = reintegration(&g, Some(clock))
            .reintegrate(&mut m, netlist.model("netlist").unwrap())
            .unwrap();
        assert_eq!(
            stats.cells,
            BTreeMap::from([
                ("$lut".to_string(), 2),
                ("DFF".to_string(), 1),
                ("FOO".to_string(), 1),
                ("ZERO".to_string(), 1),
            ])
        );

        let mx = wire(&m, "$cirkit$3$x");
        let mq = wire(&m, "$cirkit$3$q");
        let one = wire(&m, "$cirkit$3$one");
        assert!(has_connection(&m, wire(&m, "$cirkit$3$zero"), SigBit::Const(State::S0)));
        assert!(has_connection(&m, one, SigBit::Const(State::S1)));
        assert!(has_connection(&m, wire(&m, "$cirkit$3$buf"), mx));
        assert!(has_connection(&m, wire(&m, "$cirkit$3$z2"), SigBit::Const(State::S0)));
        assert!(has_connection(&m, wire(&m, "$cirkit$3$alias"), mq));
        assert!(has_connection(&m, mx, x));
        assert!(has_connection(&m, q, mq));

        let lut = m.cell("$cirkit$3$cell3").unwrap();
        assert_eq!(
            lut.kind,
            CellKind::Lut {
                table: vec![false, false, false, true]
            }
        );
        assert_eq!(lut.get_port("A"), Some(&SigSpec::from(vec![mx, one])));

        let foo = m.cell("$cirkit$3$cell4").unwrap();
        assert_eq!(foo.kind, CellKind::Other("FOO".to_string()));
        assert_eq!(foo.connections.len(), 2);

        let ff = m.cell("$cirkit$3$cell6").unwrap();
        assert_eq!(
            ff.kind,
            CellKind::Dffe {
                clk_pol: true,
                en_pol: false
            }
        );
        assert_eq!(ff.get_port("C"), Some(&SigSpec::from(clk)));
        assert_eq!(ff.get_port("E"), Some(&SigSpec::from(en)));
        assert_eq!(ff.get_port("D"), Some(&SigSpec::from(mx)));
        assert_eq!(
            m.wire(mq.get_wire().unwrap()).attributes.init,
            Some(vec![State::S1])
        );
    }

    #[test]
    fn missing_net_test() {
        let mut m = Module::new("m");
        let a = SigBit::wire(m.add_port("a", 1).unwrap(), 0);
        let mut g = Graph::new();
        g.reference(a);
        g.mark_boundary(a);

        let netlist = parse_netlist(".model netlist\n.inputs other\n.end\n").unwrap();
        let res = reintegration(&g, None).reintegrate(&mut m, netlist.model("netlist").unwrap());
        assert!(matches!(res, Err(TechmapError::MissingNet(net)) if net == "ys__n0"));
    }

    #[test]
    #[should_panic]
    fn latch_without_clock_test() {
        let mut m = Module::new("m");
        let g = Graph::new();
        let netlist = parse_netlist(".model netlist\n.latch a b\n.end\n").unwrap();
        let _ = reintegration(&g, None).reintegrate(&mut m, netlist.model("netlist").unwrap());
    }
}
