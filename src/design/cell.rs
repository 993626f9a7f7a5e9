//! Host cells and their closed set of kinds.

use std::collections::BTreeMap;

use super::{DesignError, Result, SigBit, SigSpec};

/// The kind of a host cell.
///
/// Every fine-grained gate the extractor understands has its own variant; anything else
/// is kept as [`CellKind::Other`] and never touched by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKind {
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
    Mux,
    Mux4,
    Mux8,
    Mux16,
    Aoi3,
    Oai3,
    Aoi4,
    Oai4,
    /// Flip-flop clocked on the rising (`clk_pol = true`) or falling edge of `C`.
    Dff { clk_pol: bool },
    /// Flip-flop with an enable `E` active high (`en_pol = true`) or low.
    Dffe { clk_pol: bool, en_pol: bool },
    /// Look-up table over the `A` port, `table[i]` being the output for input value `i`.
    Lut { table: Vec<bool> },
    /// Anything else, named by its type.
    Other(String),
}

const fn pol_char(pol: bool) -> char {
    if pol { 'P' } else { 'N' }
}

impl CellKind {
    /// Conventional type name, e.g. `$_AND_` or `$_DFFE_PN_`.
    pub fn type_name(&self) -> String {
        match self {
            CellKind::Buf => "$_BUF_".to_string(),
            CellKind::Not => "$_NOT_".to_string(),
            CellKind::And => "$_AND_".to_string(),
            CellKind::Nand => "$_NAND_".to_string(),
            CellKind::Or => "$_OR_".to_string(),
            CellKind::Nor => "$_NOR_".to_string(),
            CellKind::Xor => "$_XOR_".to_string(),
            CellKind::Xnor => "$_XNOR_".to_string(),
            CellKind::AndNot => "$_ANDNOT_".to_string(),
            CellKind::OrNot => "$_ORNOT_".to_string(),
            CellKind::Mux => "$_MUX_".to_string(),
            CellKind::Mux4 => "$_MUX4_".to_string(),
            CellKind::Mux8 => "$_MUX8_".to_string(),
            CellKind::Mux16 => "$_MUX16_".to_string(),
            CellKind::Aoi3 => "$_AOI3_".to_string(),
            CellKind::Oai3 => "$_OAI3_".to_string(),
            CellKind::Aoi4 => "$_AOI4_".to_string(),
            CellKind::Oai4 => "$_OAI4_".to_string(),
            CellKind::Dff { clk_pol } => format!("$_DFF_{}_", pol_char(*clk_pol)),
            CellKind::Dffe { clk_pol, en_pol } => {
                format!("$_DFFE_{}{}_", pol_char(*clk_pol), pol_char(*en_pol))
            }
            CellKind::Lut { .. } => "$lut".to_string(),
            CellKind::Other(name) => name.clone(),
        }
    }

    /// Input pins in order, output pin excluded. Empty for [`CellKind::Other`].
    pub fn input_ports(&self) -> &'static [&'static str] {
        match self {
            CellKind::Buf | CellKind::Not => &["A"],
            CellKind::And
            | CellKind::Nand
            | CellKind::Or
            | CellKind::Nor
            | CellKind::Xor
            | CellKind::Xnor
            | CellKind::AndNot
            | CellKind::OrNot => &["A", "B"],
            CellKind::Mux => &["A", "B", "S"],
            CellKind::Mux4 => &["A", "B", "C", "D", "S", "T"],
            CellKind::Mux8 => &["A", "B", "C", "D", "E", "F", "G", "H", "S", "T", "U"],
            CellKind::Mux16 => &[
                "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P",
                "S", "T", "U", "V",
            ],
            CellKind::Aoi3 | CellKind::Oai3 => &["A", "B", "C"],
            CellKind::Aoi4 | CellKind::Oai4 => &["A", "B", "C", "D"],
            CellKind::Dff { .. } => &["C", "D"],
            CellKind::Dffe { .. } => &["C", "D", "E"],
            CellKind::Lut { .. } => &["A"],
            CellKind::Other(_) => &[],
        }
    }

    /// Output pin name.
    pub fn output_port(&self) -> Option<&'static str> {
        match self {
            CellKind::Dff { .. } | CellKind::Dffe { .. } => Some("Q"),
            CellKind::Other(_) => None,
            _ => Some("Y"),
        }
    }

    pub fn is_flip_flop(&self) -> bool {
        matches!(self, CellKind::Dff { .. } | CellKind::Dffe { .. })
    }
}

/// A cell instance of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub name: String,
    pub kind: CellKind,
    pub connections: BTreeMap<String, SigSpec>,
    /// Run index of the technology mapping run that created this cell (markgroups).
    pub group: Option<usize>,
}

impl Cell {
    pub fn new(name: impl Into<String>, kind: CellKind) -> Self {
        Cell {
            name: name.into(),
            kind,
            connections: BTreeMap::new(),
            group: None,
        }
    }

    pub fn set_port(&mut self, port: impl Into<String>, sig: impl Into<SigSpec>) {
        self.connections.insert(port.into(), sig.into());
    }

    /// Builder flavour of [`Cell::set_port`].
    pub fn with_port(mut self, port: impl Into<String>, sig: impl Into<SigSpec>) -> Self {
        self.set_port(port, sig);
        self
    }

    pub fn get_port(&self, port: &str) -> Option<&SigSpec> {
        self.connections.get(port)
    }

    /// The single bit connected to a one-bit port.
    pub fn port_bit(&self, port: &str) -> Result<SigBit> {
        let sig = self
            .connections
            .get(port)
            .ok_or_else(|| DesignError::MissingPort(self.name.clone(), port.to_string()))?;
        sig.as_bit().ok_or_else(|| DesignError::PortWidth {
            cell: self.name.clone(),
            port: port.to_string(),
            expected: 1,
            got: sig.len(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::{State, WireId};

    #[test]
    fn type_name_test() {
        assert_eq!(CellKind::Mux16.type_name(), "$_MUX16_");
        assert_eq!(CellKind::Dff { clk_pol: false }.type_name(), "$_DFF_N_");
        assert_eq!(CellKind::Dffe { clk_pol: false, en_pol: true }.type_name(), "$_DFFE_NP_");
        assert_eq!(CellKind::Other("$_SR_PP_".to_string()).type_name(), "$_SR_PP_");

        assert_eq!(CellKind::Oai4.output_port(), Some("Y"));
        assert_eq!(CellKind::Dff { clk_pol: true }.output_port(), Some("Q"));
        assert_eq!(CellKind::Other("$mem".to_string()).output_port(), None);
    }

    #[test]
    fn port_bit_test() {
        let w = WireId(0);
        let cell = Cell::new("c", CellKind::Not)
            .with_port("A", SigBit::wire(w, 0))
            .with_port(
                "Y",
                SigSpec::from(vec![SigBit::Const(State::S0), SigBit::Const(State::S1)]),
            );
        assert_eq!(cell.port_bit("A").unwrap(), SigBit::wire(w, 0));
        assert!(matches!(cell.port_bit("Y"), Err(DesignError::PortWidth { got: 2, .. })));
        assert!(matches!(cell.port_bit("B"), Err(DesignError::MissingPort(..))));
    }
}
