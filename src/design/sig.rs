//! Signal bits and vectors of the host circuit.

use std::fmt::Display;

use super::WireId;

/// A single logic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum State {
    S0,
    S1,
    /// Undefined / unknown.
    #[default]
    Sx,
}

impl State {
    /// Returns `Some(value)` for defined states, `None` for [`State::Sx`].
    pub fn as_bool(self) -> Option<bool> {
        match self {
            State::S0 => Some(false),
            State::S1 => Some(true),
            State::Sx => None,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        if value { State::S1 } else { State::S0 }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::S0 => write!(f, "0"),
            State::S1 => write!(f, "1"),
            State::Sx => write!(f, "x"),
        }
    }
}

/// An atomic addressable point of the wiring: one bit of a wire, or a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SigBit {
    Const(State),
    Wire { wire: WireId, offset: u32 },
}

impl SigBit {
    pub fn wire(wire: WireId, offset: u32) -> Self {
        SigBit::Wire { wire, offset }
    }

    /// The wire backing this bit, if it is not a constant.
    pub fn get_wire(&self) -> Option<WireId> {
        match self {
            SigBit::Wire { wire, .. } => Some(*wire),
            SigBit::Const(_) => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, SigBit::Const(_))
    }
}

impl From<State> for SigBit {
    fn from(value: State) -> Self {
        SigBit::Const(value)
    }
}

/// An ordered vector of signal bits, LSB first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SigSpec(Vec<SigBit>);

impl SigSpec {
    pub fn new() -> Self {
        SigSpec(Vec::new())
    }

    pub fn bits(&self) -> &[SigBit] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, bit: SigBit) {
        self.0.push(bit);
    }

    /// Returns the only bit of a one-bit signal.
    pub fn as_bit(&self) -> Option<SigBit> {
        match self.0.as_slice() {
            [bit] => Some(*bit),
            _ => None,
        }
    }

    pub fn is_fully_const(&self) -> bool {
        self.0.iter().all(SigBit::is_const)
    }
}

impl From<SigBit> for SigSpec {
    fn from(value: SigBit) -> Self {
        SigSpec(vec![value])
    }
}

impl From<Vec<SigBit>> for SigSpec {
    fn from(value: Vec<SigBit>) -> Self {
        SigSpec(value)
    }
}

impl FromIterator<SigBit> for SigSpec {
    fn from_iter<T: IntoIterator<Item = SigBit>>(iter: T) -> Self {
        SigSpec(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SigSpec {
    type Item = &'a SigBit;
    type IntoIter = std::slice::Iter<'a, SigBit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn as_bit_test() {
        let w = WireId(3);
        assert_eq!(
            SigSpec::from(SigBit::wire(w, 1)).as_bit(),
            Some(SigBit::wire(w, 1))
        );
        assert_eq!(SigSpec::new().as_bit(), None);
        let two: SigSpec = [SigBit::wire(w, 0), SigBit::wire(w, 1)].into_iter().collect();
        assert_eq!(two.as_bit(), None);
        assert!(!two.is_fully_const());
        assert!(SigSpec::from(SigBit::Const(State::S1)).is_fully_const());
    }
}
